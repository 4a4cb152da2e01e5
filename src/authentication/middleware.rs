use log::debug;
use warp::{reject::Rejection, Filter};

use crate::{
    actions::get_user_by_id,
    constants::INVALID_TOKEN,
    error::{Error, HtmlError},
    server::state::{with_state, AppState},
};

use super::jwt::{verify_jwt_session, SessionData};

const TOKEN_SCHEMES: &[&str] = &["Token", "Bearer"];

/// Extracts the token from `Authorization: Token <jwt>` (or `Bearer <jwt>`).
pub fn parse_authorization(header: Option<&str>) -> Result<&str, Error> {
    let header = match header {
        Some(header) if !header.trim().is_empty() => header.trim(),
        _ => return Err(HtmlError::InvalidSession.default()),
    };

    let (scheme, token) = header.split_once(' ').unwrap_or((header, ""));
    if !TOKEN_SCHEMES
        .iter()
        .any(|known| known.eq_ignore_ascii_case(scheme))
    {
        return Err(HtmlError::InvalidSession.default());
    }

    let token = token.trim();
    if token.is_empty() || token.contains(' ') {
        return Err(HtmlError::InvalidSession.new(INVALID_TOKEN));
    }
    Ok(token)
}

/// Resolves the requesting identity. Tokens of deleted or deactivated users are refused.
pub async fn authenticate(header: Option<&str>, state: &AppState) -> Result<SessionData, Error> {
    let token = parse_authorization(header)?;
    let claims = verify_jwt_session(token, state.secret())?;

    match get_user_by_id(&state.pool, claims.user_id).await? {
        Some(user) if user.is_active => Ok(SessionData::from(&user)),
        _ => {
            debug!("session for missing or inactive user {}", claims.user_id);
            Err(HtmlError::InvalidSession.new(INVALID_TOKEN))
        }
    }
}

pub fn with_session(
    state: AppState,
) -> impl Filter<Extract = (SessionData,), Error = Rejection> + Clone {
    warp::header::optional::<String>("authorization")
        .and(with_state(state))
        .and_then(|header: Option<String>, state: AppState| async move {
            authenticate(header.as_deref(), &state)
                .await
                .map_err(Rejection::from)
        })
}
