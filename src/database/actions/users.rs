use log::{debug, info};
use sqlx::{Pool, Postgres, QueryBuilder};

use crate::{
    constants::INVALID_CREDENTIALS,
    cryptography::{hash_password, verify_password},
    database::error::QueryError,
    error::{Error, HtmlError},
    form::{CredentialsPayload, ProfilePayload, UserPayload},
    jwt::generate_jwt_session,
    schema::{Id, User},
};

pub async fn get_user_by_email(pool: &Pool<Postgres>, email: &str) -> Result<Option<User>, Error> {
    let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE email = $1")
        .bind(email)
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(row)
}

pub async fn get_user_by_id(pool: &Pool<Postgres>, user_id: Id) -> Result<Option<User>, Error> {
    let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(row)
}

/// Creates a user, storing only the argon2 hash of the password.
pub async fn register_user(payload: &UserPayload, pool: &Pool<Postgres>) -> Result<User, Error> {
    let password = hash_password(&payload.password)?;

    let user: User = sqlx::query_as(
        "
        INSERT INTO users (email, password, name)
        VALUES ($1, $2, $3)
        RETURNING *
    ",
    )
    .bind(&payload.email)
    .bind(password)
    .bind(&payload.name)
    .fetch_one(pool)
    .await
    .map_err(|e| {
        let e = QueryError::from(e);
        if e.is_unique_violation() {
            Error::field("email", "user with this email already exists.")
        } else {
            e.into()
        }
    })?;

    info!("registered user {}", user.id);
    Ok(user)
}

/// Exchanges credentials for a session token.
pub async fn login_user(
    credentials: &CredentialsPayload,
    secret: &[u8],
    lifetime_hours: i64,
    pool: &Pool<Postgres>,
) -> Result<String, Error> {
    let user = get_user_by_email(pool, &credentials.email)
        .await?
        .filter(|user| user.is_active && verify_password(&credentials.password, &user.password));

    match user {
        Some(user) => generate_jwt_session(&user, secret, lifetime_hours),
        None => {
            debug!("rejected credentials for {}", credentials.email);
            Err(Error::field("non_field_errors", INVALID_CREDENTIALS))
        }
    }
}

pub async fn update_profile(
    user_id: Id,
    payload: &ProfilePayload,
    pool: &Pool<Postgres>,
) -> Result<User, Error> {
    let password = payload.password.as_deref().map(hash_password).transpose()?;

    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE users SET ");
    let mut assignments = builder.separated(", ");
    // keeps the statement valid when the payload changes nothing
    assignments.push("id = id");
    if let Some(name) = &payload.name {
        assignments.push("name = ").push_bind_unseparated(name.to_owned());
    }
    if let Some(password) = password {
        assignments.push("password = ").push_bind_unseparated(password);
    }
    builder
        .push(" WHERE id = ")
        .push_bind(user_id)
        .push(" RETURNING *");

    let user: Option<User> = builder
        .build_query_as()
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    user.ok_or_else(|| HtmlError::NotFound.default())
}
