use std::convert::Infallible;

use log::{debug, error};
use warp::{
    body::BodyDeserializeError,
    reject::{
        InvalidHeader, InvalidQuery, LengthRequired, MethodNotAllowed, MissingHeader,
        PayloadTooLarge, Rejection, UnsupportedMediaType,
    },
    Reply,
};

use crate::error::{Error, HtmlError};

fn rejection_error(err: &Rejection) -> Error {
    if let Some(error) = err.find::<Error>() {
        return error.clone();
    }
    if err.is_not_found() {
        return HtmlError::NotFound.default();
    }
    if let Some(e) = err.find::<BodyDeserializeError>() {
        return HtmlError::InvalidRequest.new(&format!("JSON parse error - {e}"));
    }
    if let Some(e) = err.find::<InvalidQuery>() {
        return HtmlError::InvalidRequest.new(&e.to_string());
    }
    if let Some(e) = err.find::<MissingHeader>() {
        return HtmlError::InvalidRequest.new(&e.to_string());
    }
    if let Some(e) = err.find::<InvalidHeader>() {
        return HtmlError::InvalidRequest.new(&e.to_string());
    }
    if err.find::<LengthRequired>().is_some() {
        return HtmlError::InvalidRequest.new("A content-length header is required.");
    }
    if err.find::<PayloadTooLarge>().is_some() {
        return HtmlError::PayloadTooLarge.default();
    }
    if err.find::<UnsupportedMediaType>().is_some() {
        return HtmlError::UnsupportedMediaType.default();
    }
    if err.find::<MethodNotAllowed>().is_some() {
        return HtmlError::MethodNotAllowed.default();
    }

    error!("unhandled rejection: {:?}", err);
    HtmlError::InternalServerError.default()
}

/// Turns every rejection into a json error body with a matching status.
pub async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let error = rejection_error(&err);
    if error.is_server_error() {
        error!("request failed: {}", error);
    } else {
        debug!("request rejected: {}", error);
    }

    Ok(error)
}
