use crate::{rate_limit::RateLimits, state::AppState};
use axum::Router;

mod claims;
pub mod dto;
pub(crate) mod extractors;
pub mod handlers;
pub mod password;
pub mod repo;
pub mod repo_types;
pub mod services;

pub fn router(limits: &RateLimits) -> Router<AppState> {
    handlers::auth_routes(limits)
}
