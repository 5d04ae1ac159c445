pub mod dto;
pub mod export;
pub mod handlers;
pub mod repo;
pub mod repo_types;
pub mod services;

use crate::{rate_limit::RateLimits, state::AppState};
use axum::Router;

pub fn router(limits: &RateLimits) -> Router<AppState> {
    handlers::booking_routes(limits)
}
