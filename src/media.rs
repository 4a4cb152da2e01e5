use std::path::{Component, Path, PathBuf};

use image::ImageFormat;
use log::{debug, error, warn};
use uuid::Uuid;

use crate::{
    constants::{IMAGE_FIELD, INVALID_IMAGE, RECIPE_IMAGE_DIR},
    error::{Error, HtmlError},
};

/// Upload whose content decoded as an image.
#[derive(Debug, Clone)]
pub struct ValidatedImage {
    bytes: Vec<u8>,
    format: ImageFormat,
}

impl ValidatedImage {
    pub fn format(&self) -> ImageFormat {
        self.format
    }

    fn extension(&self) -> &'static str {
        self.format().extensions_str().first().copied().unwrap_or("img")
    }
}

/// Sniffs the format from the content and decodes the whole image.
///
/// The file name and declared content type of the upload are never consulted.
pub fn validate_image(bytes: Vec<u8>) -> Result<ValidatedImage, Error> {
    let invalid = || Error::field(IMAGE_FIELD, INVALID_IMAGE);

    let format = image::guess_format(&bytes).map_err(|e| {
        debug!("upload is not a known image format: {e}");
        invalid()
    })?;
    image::load_from_memory_with_format(&bytes, format).map_err(|e| {
        debug!("upload failed to decode as {format:?}: {e}");
        invalid()
    })?;

    Ok(ValidatedImage { bytes, format })
}

/// Filesystem blob store for uploaded images.
///
/// Rows keep paths relative to `root`; clients see them prefixed with `url`.
#[derive(Debug, Clone)]
pub struct MediaStorage {
    root: PathBuf,
    url: String,
}

impl MediaStorage {
    pub fn new(root: impl Into<PathBuf>, url: &str) -> Self {
        let mut url = url.to_string();
        if !url.ends_with('/') {
            url.push('/');
        }

        Self {
            root: root.into(),
            url,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn ensure_root(&self) -> Result<(), Error> {
        tokio::fs::create_dir_all(self.root.join(RECIPE_IMAGE_DIR))
            .await
            .map_err(|e| io_error("create media root", &self.root, e))
    }

    pub fn url_for(&self, path: &str) -> String {
        format!("{}{}", self.url, path)
    }

    /// Resolves a stored relative path, refusing anything that escapes the root.
    pub fn absolute(&self, path: &str) -> Option<PathBuf> {
        let relative = Path::new(path);
        let contained = relative
            .components()
            .all(|component| matches!(component, Component::Normal(_)));

        if contained && !path.is_empty() {
            Some(self.root.join(relative))
        } else {
            None
        }
    }

    /// Writes the image under a fresh name and returns its relative path.
    ///
    /// The bytes go to a temporary file first and are renamed into place, so
    /// the returned path never names a partially written file.
    pub async fn store_image(&self, image: &ValidatedImage) -> Result<String, Error> {
        let name = format!("{}.{}", Uuid::new_v4(), image.extension());
        let relative = format!("{RECIPE_IMAGE_DIR}/{name}");

        let directory = self.root.join(RECIPE_IMAGE_DIR);
        tokio::fs::create_dir_all(&directory)
            .await
            .map_err(|e| io_error("create image directory", &directory, e))?;

        let target = directory.join(&name);
        let partial = directory.join(format!(".{name}.part"));

        tokio::fs::write(&partial, &image.bytes)
            .await
            .map_err(|e| io_error("write image", &partial, e))?;
        if let Err(e) = tokio::fs::rename(&partial, &target).await {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(io_error("move image into place", &target, e));
        }

        Ok(relative)
    }

    /// Deletes a stored blob. Failures are logged, never surfaced.
    pub async fn release(&self, path: &str) {
        let absolute = match self.absolute(path) {
            Some(absolute) => absolute,
            None => {
                warn!("refusing to release media path outside the root: {path}");
                return;
            }
        };

        match tokio::fs::remove_file(&absolute).await {
            Ok(()) => debug!("released {}", absolute.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("{} was already gone", absolute.display())
            }
            Err(e) => error!("failed to release {}: {e}", absolute.display()),
        }
    }
}

fn io_error(action: &str, path: &Path, e: std::io::Error) -> Error {
    error!("failed to {action} at {}: {e}", path.display());
    HtmlError::InternalServerError.default()
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use image::{ImageBuffer, Rgb};
    use tempfile::tempdir;

    use super::*;

    fn jpeg() -> Vec<u8> {
        let img: ImageBuffer<Rgb<u8>, Vec<u8>> = ImageBuffer::new(10, 10);
        let mut bytes = Cursor::new(Vec::new());
        img.write_to(&mut bytes, ImageFormat::Jpeg).unwrap();
        bytes.into_inner()
    }

    #[test]
    fn decodable_images_pass_validation() {
        let image = validate_image(jpeg()).unwrap();
        assert_eq!(image.format(), ImageFormat::Jpeg);
        assert_eq!(image.extension(), "jpg");
    }

    #[test]
    fn arbitrary_bytes_are_rejected() {
        let error = validate_image(b"notimage".to_vec()).unwrap_err();
        assert_eq!(error.code, 400);
        assert_eq!(error.fields.unwrap()[IMAGE_FIELD], vec![INVALID_IMAGE.to_string()]);
    }

    #[test]
    fn truncated_images_are_rejected() {
        let mut bytes = jpeg();
        bytes.truncate(20);
        assert!(validate_image(bytes).is_err());
    }

    #[test]
    fn paths_outside_the_root_do_not_resolve() {
        let storage = MediaStorage::new("/srv/media", "/media");

        assert_eq!(
            storage.absolute("uploads/recipe/a.jpg"),
            Some(PathBuf::from("/srv/media/uploads/recipe/a.jpg"))
        );
        assert_eq!(storage.absolute("../etc/passwd"), None);
        assert_eq!(storage.absolute("/etc/passwd"), None);
        assert_eq!(storage.absolute(""), None);
        assert_eq!(storage.url_for("uploads/recipe/a.jpg"), "/media/uploads/recipe/a.jpg");
    }

    #[tokio::test]
    async fn stored_images_exist_until_released() {
        let root = tempdir().unwrap();
        let storage = MediaStorage::new(root.path(), "/media/");
        let image = validate_image(jpeg()).unwrap();

        let path = storage.store_image(&image).await.unwrap();
        assert!(path.starts_with(RECIPE_IMAGE_DIR));
        assert!(path.ends_with(".jpg"));

        let absolute = storage.absolute(&path).unwrap();
        assert_eq!(std::fs::read(&absolute).unwrap(), jpeg());

        storage.release(&path).await;
        assert!(!absolute.exists());

        // releasing twice is harmless
        storage.release(&path).await;
    }
}
