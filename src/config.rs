use std::{env, fmt::Display, net::SocketAddr, path::PathBuf, str::FromStr};

use log::{info, warn};

use crate::{
    constants::{
        DEFAULT_BIND_ADDRESS, DEFAULT_MAX_CONNECTIONS, DEFAULT_MAX_UPLOAD_BYTES,
        DEFAULT_MEDIA_ROOT, DEFAULT_MEDIA_URL, DEFAULT_TOKEN_LIFETIME_HOURS,
    },
    database::error::TypeError,
};

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub database_max_connections: u32,
    pub bind_address: SocketAddr,
    pub jwt_secret: String,
    pub token_lifetime_hours: i64,
    pub media_root: PathBuf,
    pub media_url: String,
    pub max_upload_bytes: u64,
}

impl Config {
    /// Reads the process environment. `main` merges a `.env` file in first.
    pub fn from_env() -> Result<Self, TypeError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, TypeError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let token_lifetime_hours = try_load(
            &lookup,
            "TOKEN_LIFETIME_HOURS",
            DEFAULT_TOKEN_LIFETIME_HOURS,
        )?;
        if token_lifetime_hours <= 0 {
            return Err(TypeError::new("TOKEN_LIFETIME_HOURS must be positive"));
        }

        Ok(Self {
            database_url: require(&lookup, "DATABASE_URL")?,
            database_max_connections: try_load(
                &lookup,
                "DATABASE_MAX_CONNECTIONS",
                DEFAULT_MAX_CONNECTIONS,
            )?,
            bind_address: try_load(
                &lookup,
                "BIND_ADDRESS",
                DEFAULT_BIND_ADDRESS
                    .parse()
                    .map_err(|_| TypeError::new("Invalid default bind address"))?,
            )?,
            jwt_secret: require(&lookup, "JWT_SECRET")?,
            token_lifetime_hours,
            media_root: PathBuf::from(try_load(
                &lookup,
                "MEDIA_ROOT",
                DEFAULT_MEDIA_ROOT.to_string(),
            )?),
            media_url: try_load(&lookup, "MEDIA_URL", DEFAULT_MEDIA_URL.to_string())?,
            max_upload_bytes: try_load(&lookup, "MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?,
        })
    }
}

fn require<F>(lookup: &F, key: &str) -> Result<String, TypeError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| TypeError::new(&format!("Environment variable {key} is required")))
}

fn try_load<F, T>(lookup: &F, key: &str, default: T) -> Result<T, TypeError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + Display,
    T::Err: Display,
{
    match lookup(key) {
        Some(value) => value.trim().parse().map_err(|e| {
            warn!("Invalid {key} value: {e}");
            TypeError::new(&format!("Invalid {key} value: {e}"))
        }),
        None => {
            info!("{key} not set, using default: {default}");
            Ok(default)
        }
    }
}
