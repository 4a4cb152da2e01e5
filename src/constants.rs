pub const MAX_NAME_LENGTH: usize = 255;
pub const MIN_PASSWORD_LENGTH: usize = 5;

// NUMERIC(5, 2) semantics for recipe prices
pub const PRICE_MAX_EXCLUSIVE: f64 = 1000.0;
pub const PRICE_DECIMAL_PLACES: i32 = 2;

pub const RECIPE_IMAGE_DIR: &str = "uploads/recipe";
pub const IMAGE_FIELD: &str = "image";

pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8000";
pub const DEFAULT_MEDIA_ROOT: &str = "./media";
pub const DEFAULT_MEDIA_URL: &str = "/media/";
pub const DEFAULT_TOKEN_LIFETIME_HOURS: i64 = 24;
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 5 * 1024 * 1024;
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;
pub const MAX_JSON_BODY_BYTES: u64 = 64 * 1024;

pub const REQUIRED_FIELD: &str = "This field is required.";
pub const BLANK_FIELD: &str = "This field may not be blank.";
pub const INVALID_IMAGE: &str =
    "Upload a valid image. The file you uploaded was either not an image or a corrupted image.";
pub const MISSING_FILE: &str = "No file was submitted.";
pub const INVALID_CREDENTIALS: &str = "Unable to authenticate with provided credentials";
pub const INVALID_TOKEN: &str = "Invalid token.";
