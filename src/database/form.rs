use std::{collections::HashSet, str::FromStr};

use serde_json::{Map, Value};

use crate::{
    constants::{
        BLANK_FIELD, MAX_NAME_LENGTH, MIN_PASSWORD_LENGTH, PRICE_DECIMAL_PLACES,
        PRICE_MAX_EXCLUSIVE, REQUIRED_FIELD,
    },
    error::{Error, FieldErrors},
    schema::Id,
};

pub type FormData = Map<String, Value>;

/// How absent keys are treated when a payload is read.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriteMode {
    /// POST: required keys must be present, absent optional keys take their defaults.
    Create,
    /// PUT: same as create, so absent relations end up empty.
    Replace,
    /// PATCH: nothing is required, absent keys are left untouched.
    Merge,
}

impl WriteMode {
    fn requires_all(self) -> bool {
        !matches!(self, WriteMode::Merge)
    }
}

pub struct Form {
    inner: FormData,
    errors: FieldErrors,
}

impl Form {
    pub fn from_data(data: FormData) -> Self {
        Self {
            inner: data,
            errors: FieldErrors::new(),
        }
    }

    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(data) => Self::from_data(data),
            _ => {
                let mut form = Self::from_data(FormData::new());
                form.reject(
                    "non_field_errors",
                    "Invalid data. Expected a dictionary.".to_string(),
                );
                form
            }
        }
    }

    fn reject(&mut self, key: &str, message: String) {
        self.errors.entry(key.to_string()).or_default().push(message);
    }

    fn missing(&mut self, key: &str, required: bool) {
        if required {
            self.reject(key, REQUIRED_FIELD.to_string());
        }
    }

    /// Reads a string, rejecting non-strings and, if `allow_blank` is false, empty strings.
    pub fn get_str(&mut self, key: &str, required: bool, allow_blank: bool) -> Option<String> {
        let value = match self.inner.get(key) {
            Some(value) => value.clone(),
            None => {
                self.missing(key, required);
                return None;
            }
        };

        let value = match value {
            Value::String(value) => value,
            Value::Number(value) => value.to_string(),
            Value::Null => {
                self.reject(key, "This field may not be null.".to_string());
                return None;
            }
            _ => {
                self.reject(key, "Not a valid string.".to_string());
                return None;
            }
        };

        let trimmed = value.trim().to_string();
        if trimmed.is_empty() && !allow_blank {
            self.reject(key, BLANK_FIELD.to_string());
            return None;
        }
        if trimmed.chars().count() > MAX_NAME_LENGTH {
            self.reject(
                key,
                format!("Ensure this field has no more than {MAX_NAME_LENGTH} characters."),
            );
            return None;
        }

        Some(trimmed)
    }

    /// Reads a number given either as a JSON number or as a numeric string.
    pub fn get_number<T>(&mut self, key: &str, required: bool, message: &str) -> Option<T>
    where
        T: FromStr,
    {
        let parsed = match self.inner.get(key) {
            Some(Value::Number(value)) => value.to_string().parse().ok(),
            Some(Value::String(value)) => value.trim().parse().ok(),
            Some(_) => None,
            None => {
                self.missing(key, required);
                return None;
            }
        };

        if parsed.is_none() {
            self.reject(key, message.to_string());
        }
        parsed
    }

    /// Reads a list of primary keys. Duplicates are dropped, order is kept.
    pub fn get_id_list(&mut self, key: &str) -> Option<Vec<Id>> {
        let items = match self.inner.get(key) {
            Some(Value::Array(items)) => items.clone(),
            Some(Value::Null) => {
                self.reject(key, "This field may not be null.".to_string());
                return None;
            }
            Some(other) => {
                self.reject(
                    key,
                    format!(
                        "Expected a list of items but got type \"{}\".",
                        json_type(other)
                    ),
                );
                return None;
            }
            None => return None,
        };

        let mut seen = HashSet::new();
        let mut ids = Vec::with_capacity(items.len());
        for item in items {
            let id = match &item {
                Value::Number(value) => value.as_i64().and_then(|v| Id::try_from(v).ok()),
                Value::String(value) => value.trim().parse::<Id>().ok(),
                _ => None,
            };

            match id {
                Some(id) => {
                    if seen.insert(id) {
                        ids.push(id);
                    }
                }
                None => {
                    self.reject(
                        key,
                        format!(
                            "Incorrect type. Expected pk value, received {}.",
                            json_type(&item)
                        ),
                    );
                    return None;
                }
            }
        }

        Some(ids)
    }

    pub fn ensure_non_negative(&mut self, key: &str, value: f64) -> bool {
        if value < 0.0 {
            self.reject(
                key,
                "Ensure this value is greater than or equal to 0.".to_string(),
            );
            return false;
        }
        true
    }

    /// Consumes the form, failing with every collected field error.
    pub fn finish(self) -> Result<(), Error> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(Error::fields(self.errors))
        }
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "int",
        Value::String(_) => "str",
        Value::Array(_) => "list",
        Value::Object(_) => "dict",
    }
}

/// Validated tag or ingredient body.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributePayload {
    pub name: String,
}

impl AttributePayload {
    pub fn from_form(mut form: Form) -> Result<Self, Error> {
        let name = form.get_str("name", true, false);
        form.finish()?;

        Ok(Self {
            name: name.unwrap_or_default(),
        })
    }
}

/// Validated recipe body. `None` means "leave as stored".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecipePayload {
    pub title: Option<String>,
    pub time_minutes: Option<i32>,
    pub price: Option<f64>,
    pub link: Option<String>,
    pub tags: Option<Vec<Id>>,
    pub ingredients: Option<Vec<Id>>,
}

impl RecipePayload {
    pub fn from_form(mut form: Form, mode: WriteMode) -> Result<Self, Error> {
        let required = mode.requires_all();

        let title = form.get_str("title", required, false);

        let time_minutes = form
            .get_number::<i32>("time_minutes", required, "A valid integer is required.")
            .filter(|minutes| form.ensure_non_negative("time_minutes", *minutes as f64));

        let price = form
            .get_number::<f64>("price", required, "A valid number is required.")
            .filter(|price| validate_price(&mut form, *price));

        let mut link = form.get_str("link", false, true);
        let mut tags = form.get_id_list("tags");
        let mut ingredients = form.get_id_list("ingredients");

        form.finish()?;

        if required {
            link = link.or_else(|| Some(String::new()));
            tags = tags.or_else(|| Some(Vec::new()));
            ingredients = ingredients.or_else(|| Some(Vec::new()));
        }

        Ok(Self {
            title,
            time_minutes,
            price,
            link,
            tags,
            ingredients,
        })
    }
}

fn validate_price(form: &mut Form, price: f64) -> bool {
    if !price.is_finite() {
        form.reject("price", "A valid number is required.".to_string());
        return false;
    }
    if !form.ensure_non_negative("price", price) {
        return false;
    }
    if price >= PRICE_MAX_EXCLUSIVE {
        form.reject(
            "price",
            "Ensure that there are no more than 5 digits in total.".to_string(),
        );
        return false;
    }

    let scale = 10f64.powi(PRICE_DECIMAL_PLACES);
    if ((price * scale).round() - price * scale).abs() > 1e-6 {
        form.reject(
            "price",
            format!("Ensure that there are no more than {PRICE_DECIMAL_PLACES} decimal places."),
        );
        return false;
    }
    true
}

/// Body of the user registration endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct UserPayload {
    pub email: String,
    pub password: String,
    pub name: String,
}

impl UserPayload {
    pub fn from_form(mut form: Form) -> Result<Self, Error> {
        let email = form
            .get_str("email", true, false)
            .and_then(|email| validate_email(&mut form, &email));
        let password = validate_password(&mut form, true);
        let name = form.get_str("name", true, false);
        form.finish()?;

        Ok(Self {
            email: email.unwrap_or_default(),
            password: password.unwrap_or_default(),
            name: name.unwrap_or_default(),
        })
    }
}

/// Body of `PUT`/`PATCH /api/user/me`. The email is not writable here.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfilePayload {
    pub password: Option<String>,
    pub name: Option<String>,
}

impl ProfilePayload {
    pub fn from_form(mut form: Form, mode: WriteMode) -> Result<Self, Error> {
        let required = mode.requires_all();
        let password = validate_password(&mut form, required);
        let name = form.get_str("name", required, false);
        form.finish()?;

        Ok(Self { password, name })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CredentialsPayload {
    pub email: String,
    pub password: String,
}

impl CredentialsPayload {
    pub fn from_form(mut form: Form) -> Result<Self, Error> {
        let email = form.get_str("email", true, false);
        let password = form.get_str("password", true, false);
        form.finish()?;

        Ok(Self {
            email: normalize_email(&email.unwrap_or_default()),
            password: password.unwrap_or_default(),
        })
    }
}

fn validate_password(form: &mut Form, required: bool) -> Option<String> {
    let password = form.get_str("password", required, false)?;
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        form.reject(
            "password",
            format!("Ensure this field has at least {MIN_PASSWORD_LENGTH} characters."),
        );
        return None;
    }
    Some(password)
}

fn validate_email(form: &mut Form, email: &str) -> Option<String> {
    let valid = match email.rsplit_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.contains(char::is_whitespace)
        }
        None => false,
    };

    if !valid {
        form.reject("email", "Enter a valid email address.".to_string());
        return None;
    }
    Some(normalize_email(email))
}

/// Lower-cases the domain part, leaves the local part as given.
pub fn normalize_email(email: &str) -> String {
    match email.trim().rsplit_once('@') {
        Some((local, domain)) => format!("{}@{}", local, domain.to_lowercase()),
        None => email.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn form(value: Value) -> Form {
        Form::from_value(value)
    }

    #[test]
    fn create_requires_core_fields_and_defaults_relations() {
        let payload = RecipePayload::from_form(
            form(json!({"title": "Chocolate cheesecake", "time_minutes": 30, "price": 5.00})),
            WriteMode::Create,
        )
        .unwrap();

        assert_eq!(payload.title.as_deref(), Some("Chocolate cheesecake"));
        assert_eq!(payload.time_minutes, Some(30));
        assert_eq!(payload.price, Some(5.0));
        assert_eq!(payload.link.as_deref(), Some(""));
        assert_eq!(payload.tags, Some(vec![]));
        assert_eq!(payload.ingredients, Some(vec![]));
    }

    #[test]
    fn create_reports_every_missing_field() {
        let error = RecipePayload::from_form(form(json!({})), WriteMode::Create).unwrap_err();
        let fields = error.fields.unwrap();

        assert_eq!(error.code, 400);
        for key in ["title", "time_minutes", "price"] {
            assert_eq!(fields[key], vec![REQUIRED_FIELD.to_string()]);
        }
    }

    #[test]
    fn merge_leaves_absent_keys_unset() {
        let payload =
            RecipePayload::from_form(form(json!({"title": "X"})), WriteMode::Merge).unwrap();

        assert_eq!(payload.title.as_deref(), Some("X"));
        assert_eq!(payload.tags, None);
        assert_eq!(payload.ingredients, None);
        assert_eq!(payload.price, None);
        assert_eq!(payload.link, None);
    }

    #[test]
    fn replace_clears_omitted_relations() {
        let payload = RecipePayload::from_form(
            form(json!({"title": "Spaghetti carbonara", "time_minutes": 25, "price": "5.00"})),
            WriteMode::Replace,
        )
        .unwrap();

        assert_eq!(payload.tags, Some(vec![]));
        assert_eq!(payload.price, Some(5.0));
    }

    #[test]
    fn ownership_keys_in_the_payload_are_ignored() {
        let payload = RecipePayload::from_form(
            form(json!({"title": "T", "time_minutes": 1, "price": 1, "user": 99, "id": 7})),
            WriteMode::Create,
        )
        .unwrap();

        assert_eq!(payload.title.as_deref(), Some("T"));
    }

    #[test]
    fn negative_values_are_rejected() {
        let error = RecipePayload::from_form(
            form(json!({"title": "T", "time_minutes": -1, "price": -2.5})),
            WriteMode::Create,
        )
        .unwrap_err();
        let fields = error.fields.unwrap();

        assert!(fields.contains_key("time_minutes"));
        assert!(fields.contains_key("price"));
    }

    #[test]
    fn price_precision_is_bounded() {
        let too_precise = RecipePayload::from_form(
            form(json!({"title": "T", "time_minutes": 1, "price": 1.234})),
            WriteMode::Create,
        )
        .unwrap_err();
        assert!(too_precise.fields.unwrap()["price"][0].contains("decimal places"));

        let too_large = RecipePayload::from_form(
            form(json!({"title": "T", "time_minutes": 1, "price": 1000})),
            WriteMode::Create,
        )
        .unwrap_err();
        assert!(too_large.fields.unwrap()["price"][0].contains("5 digits"));
    }

    #[test]
    fn id_lists_are_deduplicated_and_typed() {
        let payload = RecipePayload::from_form(
            form(json!({"tags": [3, "1", 3]})),
            WriteMode::Merge,
        )
        .unwrap();
        assert_eq!(payload.tags, Some(vec![3, 1]));

        let error =
            RecipePayload::from_form(form(json!({"tags": ["a"]})), WriteMode::Merge).unwrap_err();
        assert!(error.fields.unwrap()["tags"][0].starts_with("Incorrect type"));

        let error =
            RecipePayload::from_form(form(json!({"tags": "1,2"})), WriteMode::Merge).unwrap_err();
        assert!(error.fields.unwrap()["tags"][0].starts_with("Expected a list"));
    }

    #[test]
    fn attribute_names_must_not_be_blank_or_too_long() {
        let error = AttributePayload::from_form(form(json!({"name": "  "}))).unwrap_err();
        assert_eq!(error.fields.unwrap()["name"], vec![BLANK_FIELD.to_string()]);

        let long = "x".repeat(MAX_NAME_LENGTH + 1);
        assert!(AttributePayload::from_form(form(json!({ "name": long }))).is_err());

        let payload = AttributePayload::from_form(form(json!({"name": "Vegan"}))).unwrap();
        assert_eq!(payload.name, "Vegan");
    }

    #[test]
    fn user_payload_validates_email_and_password() {
        let payload = UserPayload::from_form(form(json!({
            "email": "Test@LondonAppDev.COM",
            "password": "testpass",
            "name": "Test name"
        })))
        .unwrap();
        assert_eq!(payload.email, "Test@londonappdev.com");

        let error = UserPayload::from_form(form(json!({
            "email": "not-an-email",
            "password": "pw",
            "name": "Test"
        })))
        .unwrap_err();
        let fields = error.fields.unwrap();
        assert!(fields.contains_key("email"));
        assert!(fields.contains_key("password"));
    }

    #[test]
    fn non_object_bodies_are_rejected() {
        let error = AttributePayload::from_form(form(json!([1, 2]))).unwrap_err();
        assert!(error.fields.unwrap().contains_key("non_field_errors"));
    }
}
