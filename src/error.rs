use std::{
    collections::BTreeMap,
    fmt::{self, Display},
};

use serde::Serialize;
use warp::{
    http::StatusCode,
    reject::Reject,
    reply::{self, Reply, Response},
};

/// Field name -> list of messages, rendered as the body of a 400.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

#[derive(Debug, Clone)]
pub struct Error {
    pub code: u16,
    pub info: Option<String>,
    pub fields: Option<FieldErrors>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HtmlError {
    InvalidRequest,
    InvalidSession,
    Unauthorized,
    NotFound,
    MethodNotAllowed,
    PayloadTooLarge,
    UnsupportedMediaType,
    InternalServerError,
}

impl HtmlError {
    pub fn code(self) -> u16 {
        match self {
            HtmlError::InvalidRequest => 400,
            HtmlError::InvalidSession => 401,
            HtmlError::Unauthorized => 403,
            HtmlError::NotFound => 404,
            HtmlError::MethodNotAllowed => 405,
            HtmlError::PayloadTooLarge => 413,
            HtmlError::UnsupportedMediaType => 415,
            HtmlError::InternalServerError => 500,
        }
    }

    fn default_info(self) -> &'static str {
        match self {
            HtmlError::InvalidRequest => "Bad request.",
            HtmlError::InvalidSession => "Authentication credentials were not provided.",
            HtmlError::Unauthorized => "You do not have permission to perform this action.",
            HtmlError::NotFound => "Not found.",
            HtmlError::MethodNotAllowed => "Method not allowed.",
            HtmlError::PayloadTooLarge => "Request body is too large.",
            HtmlError::UnsupportedMediaType => "Unsupported media type in request.",
            HtmlError::InternalServerError => "A server error occurred.",
        }
    }

    pub fn new(self, info: &str) -> Error {
        Error {
            code: self.code(),
            info: Some(info.to_string()),
            fields: None,
        }
    }

    pub fn default(self) -> Error {
        self.new(self.default_info())
    }
}

impl Error {
    /// 400 carrying per-field messages.
    pub fn fields(fields: FieldErrors) -> Self {
        Self {
            code: HtmlError::InvalidRequest.code(),
            info: None,
            fields: Some(fields),
        }
    }

    pub fn field(name: &str, message: &str) -> Self {
        let mut fields = FieldErrors::new();
        fields.insert(name.to_string(), vec![message.to_string()]);
        Self::fields(fields)
    }

    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    pub fn is_server_error(&self) -> bool {
        self.code >= 500
    }
}

#[derive(Serialize)]
struct Detail<'a> {
    detail: &'a str,
}

impl Reply for Error {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match (&self.fields, &self.info) {
            (Some(fields), _) => reply::json(fields),
            (None, Some(info)) => reply::json(&Detail { detail: info }),
            (None, None) => reply::json(&Detail { detail: "" }),
        };

        reply::with_status(body, status).into_response()
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.info, &self.fields) {
            (Some(info), _) => write!(f, "{} ({})", info, self.code),
            (None, Some(fields)) => write!(f, "invalid fields {:?} ({})", fields, self.code),
            (None, None) => write!(f, "({})", self.code),
        }
    }
}

impl std::error::Error for Error {}

impl Reject for Error {}

#[cfg(test)]
mod tests {
    use warp::reject::Rejection;

    use super::*;

    fn reject_with(error: Error) -> Result<(), Rejection> {
        let result: Result<(), Error> = Err(error);
        result?;
        Ok(())
    }

    #[test]
    fn errors_travel_as_custom_rejections() {
        let rejection = reject_with(HtmlError::NotFound.default()).unwrap_err();
        let found = rejection.find::<Error>().unwrap();

        assert_eq!(found.code, 404);
        assert!(!rejection.is_not_found());
    }

    #[test]
    fn default_messages_follow_the_variant() {
        let error = HtmlError::NotFound.default();
        assert_eq!(error.code, 404);
        assert_eq!(error.info.as_deref(), Some("Not found."));
        assert!(error.fields.is_none());
    }

    #[test]
    fn field_errors_are_bad_requests() {
        let error = Error::field("title", "This field is required.");
        assert_eq!(error.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            error.fields.unwrap().get("title").unwrap(),
            &vec!["This field is required.".to_string()]
        );
    }

    #[tokio::test]
    async fn replies_render_fields_or_detail() {
        let response = Error::field("price", "Ensure this value is greater than or equal to 0.")
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = warp::hyper::body::to_bytes(response.into_body()).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(
            json["price"][0],
            "Ensure this value is greater than or equal to 0."
        );

        let response = HtmlError::InvalidSession.new("Invalid token.").into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = warp::hyper::body::to_bytes(response.into_body()).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["detail"], "Invalid token.");
    }
}
