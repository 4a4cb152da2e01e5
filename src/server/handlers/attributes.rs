use warp::{http::StatusCode, reject::Rejection, reply, Reply};

use crate::{
    actions::{create_attribute, list_attributes},
    form::{AttributePayload, Form},
    jwt::SessionData,
    schema::AttributeKind,
    server::state::AppState,
};

pub async fn list_attribute_handler(
    kind: AttributeKind,
    session: SessionData,
    state: AppState,
) -> Result<impl Reply, Rejection> {
    let rows = list_attributes(kind, &session.scope(), &state.pool).await?;

    Ok(reply::json(&rows))
}

pub async fn create_attribute_handler(
    kind: AttributeKind,
    session: SessionData,
    form: Form,
    state: AppState,
) -> Result<impl Reply, Rejection> {
    let payload = AttributePayload::from_form(form)?;
    let row = create_attribute(kind, &payload, &session.scope(), &state.pool).await?;

    Ok(reply::with_status(reply::json(&row), StatusCode::CREATED))
}
