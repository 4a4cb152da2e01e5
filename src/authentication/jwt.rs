use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use jwt::SignWithKey;
use jwt::VerifyWithKey;
use log::{debug, error};
use serde::Deserialize;
use serde::Serialize;
use sha2::Sha256;

use crate::constants::INVALID_TOKEN;
use crate::database::schema::{Id, User};
use crate::error::{Error, HtmlError};

use super::permissions::OwnerScope;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct JwtSessionData {
    pub user_id: Id,
    pub email: String,
    iat: i64,
    exp: i64,
}

impl JwtSessionData {
    pub fn new(id: Id, email: String, lifetime_hours: i64) -> Self {
        let now = Utc::now();
        let iat = now.timestamp();
        let exp = (now + Duration::hours(lifetime_hours)).timestamp();

        Self {
            user_id: id,
            email,
            iat,
            exp,
        }
    }

    pub fn expires_at(&self) -> i64 {
        self.exp
    }
}

/// The identity a request runs as, resolved from a verified token and a live user row.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct SessionData {
    pub user_id: Id,
    pub email: String,
    pub is_staff: bool,
}

impl SessionData {
    pub fn scope(&self) -> OwnerScope {
        OwnerScope::new(self.user_id)
    }
}

impl From<&User> for SessionData {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.id,
            email: user.email.to_owned(),
            is_staff: user.is_staff,
        }
    }
}

fn signing_key(secret: &[u8]) -> Result<Hmac<Sha256>, Error> {
    Hmac::new_from_slice(secret).map_err(|e| {
        error!("invalid signing key: {e}");
        HtmlError::InternalServerError.default()
    })
}

pub fn generate_jwt_session(
    user: &User,
    secret: &[u8],
    lifetime_hours: i64,
) -> Result<String, Error> {
    let key = signing_key(secret)?;
    let claims = JwtSessionData::new(user.id, user.email.to_owned(), lifetime_hours);

    claims.sign_with_key(&key).map_err(|e| {
        error!("failed to sign session: {e}");
        HtmlError::InternalServerError.default()
    })
}

pub fn verify_jwt_session(token: &str, secret: &[u8]) -> Result<JwtSessionData, Error> {
    let key = signing_key(secret)?;

    let session: JwtSessionData = token.verify_with_key(&key).map_err(|e| {
        debug!("rejected session token: {e}");
        HtmlError::InvalidSession.new(INVALID_TOKEN)
    })?;

    let now = Utc::now().timestamp();
    if session.expires_at() < now {
        debug!("rejected expired session for user {}", session.user_id);
        return Err(HtmlError::InvalidSession.new(INVALID_TOKEN));
    }

    Ok(session)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> User {
        User {
            id: 7,
            email: "test@test.com".to_string(),
            password: String::new(),
            name: "Test".to_string(),
            is_active: true,
            is_staff: false,
        }
    }

    #[test]
    fn signed_sessions_verify_with_the_same_secret() {
        let token = generate_jwt_session(&user(), b"secret", 1).unwrap();
        let session = verify_jwt_session(&token, b"secret").unwrap();

        assert_eq!(session.user_id, 7);
        assert_eq!(session.email, "test@test.com");
        assert!(session.expires_at() > Utc::now().timestamp());
    }

    #[test]
    fn foreign_secrets_and_garbage_are_rejected() {
        let token = generate_jwt_session(&user(), b"secret", 1).unwrap();

        let error = verify_jwt_session(&token, b"other").unwrap_err();
        assert_eq!(error.code, 401);
        assert_eq!(error.info.as_deref(), Some(INVALID_TOKEN));

        assert!(verify_jwt_session("not-a-token", b"secret").is_err());
    }

    #[test]
    fn expired_sessions_are_rejected() {
        let token = generate_jwt_session(&user(), b"secret", -1).unwrap();
        let error = verify_jwt_session(&token, b"secret").unwrap_err();

        assert_eq!(error.code, 401);
    }

    #[test]
    fn sessions_scope_to_their_user() {
        let session = SessionData::from(&user());
        assert_eq!(session.scope().user_id(), 7);
    }
}
