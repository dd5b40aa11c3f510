pub mod dto;
pub mod handlers;
pub mod repo;
pub mod repo_types;
pub mod services;

use crate::state::AppState;
use axum::Router;

pub use repo::{PgUserRepository, UserRepository};

pub fn router(upload_limit_bytes: usize) -> Router<AppState> {
    Router::new().merge(handlers::user_routes(upload_limit_bytes))
}
