use std::{convert::Infallible, sync::Arc};

use log::info;
use sqlx::{postgres::PgPoolOptions, Pool, Postgres};
use warp::Filter;

use crate::{
    config::Config,
    database::error::QueryError,
    error::{Error, HtmlError},
    media::MediaStorage,
};

/// Shared by every request: the pool, the configuration and the blob store.
#[derive(Clone)]
pub struct AppState {
    pub pool: Pool<Postgres>,
    pub config: Arc<Config>,
    pub media: MediaStorage,
}

impl AppState {
    pub fn new(pool: Pool<Postgres>, config: Config) -> Self {
        let media = MediaStorage::new(config.media_root.clone(), &config.media_url);

        Self {
            pool,
            config: Arc::new(config),
            media,
        }
    }

    /// Connects, applies pending migrations and prepares the media root.
    pub async fn connect(config: Config) -> Result<Self, Error> {
        info!("Connecting to database...");
        let pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .connect(&config.database_url)
            .await
            .map_err(QueryError::from)?;

        info!("Applying migrations...");
        sqlx::migrate!("./migrations").run(&pool).await.map_err(|e| {
            log::error!("migration failed: {e}");
            HtmlError::InternalServerError.new("Migration failed")
        })?;

        let state = Self::new(pool, config);
        state.media.ensure_root().await?;
        info!("Media stored under {}", state.media.root().display());

        Ok(state)
    }

    pub fn secret(&self) -> &[u8] {
        self.config.jwt_secret.as_bytes()
    }
}

pub fn with_state(state: AppState) -> impl Filter<Extract = (AppState,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}
