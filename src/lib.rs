mod database {
    pub mod actions;
    pub mod error;
    pub mod form;
    pub mod query;
    pub mod schema;
}
mod authentication {
    pub mod cryptography;
    pub mod jwt;
    pub mod middleware;
    pub mod permissions;
}
pub mod server {
    pub mod handlers;
    pub mod recover;
    pub mod representation;
    pub mod routes;
    pub mod state;
}
pub mod config;
pub mod constants;
pub mod error;
pub mod media;

pub use authentication::*;
pub use database::*;
pub use server::{routes::routes, state::AppState};
