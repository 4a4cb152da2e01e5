use warp::{http::StatusCode, reject::Rejection, reply, Reply};

use crate::{
    actions::{get_user_by_id, login_user, register_user, update_profile},
    error::HtmlError,
    form::{CredentialsPayload, Form, ProfilePayload, UserPayload, WriteMode},
    jwt::SessionData,
    server::{
        representation::{TokenBody, UserBody},
        state::AppState,
    },
};

pub async fn create_user(form: Form, state: AppState) -> Result<impl Reply, Rejection> {
    let payload = UserPayload::from_form(form)?;
    let user = register_user(&payload, &state.pool).await?;

    Ok(reply::with_status(
        reply::json(&UserBody::from(&user)),
        StatusCode::CREATED,
    ))
}

pub async fn create_token(form: Form, state: AppState) -> Result<impl Reply, Rejection> {
    let credentials = CredentialsPayload::from_form(form)?;
    let token = login_user(
        &credentials,
        state.secret(),
        state.config.token_lifetime_hours,
        &state.pool,
    )
    .await?;

    Ok(reply::json(&TokenBody { token }))
}

pub async fn get_profile(session: SessionData, state: AppState) -> Result<impl Reply, Rejection> {
    let user = get_user_by_id(&state.pool, session.user_id)
        .await?
        .ok_or_else(|| HtmlError::NotFound.default())?;

    Ok(reply::json(&UserBody::from(&user)))
}

pub async fn edit_profile(
    mode: WriteMode,
    session: SessionData,
    form: Form,
    state: AppState,
) -> Result<impl Reply, Rejection> {
    let payload = ProfilePayload::from_form(form, mode)?;
    let user = update_profile(session.user_id, &payload, &state.pool).await?;

    Ok(reply::json(&UserBody::from(&user)))
}
