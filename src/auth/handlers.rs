use axum::{
    extract::{rejection::JsonRejection, FromRef, State},
    handler::Handler,
    middleware,
    routing::post,
    Json, Router,
};
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{AuthResponse, JwtKeys, LoginRequest, RegisterRequest},
        password::{check_password_policy, hash_password, verify_password},
        repo_types::NewUser,
        services::{is_valid_email, normalize_email},
    },
    common::ApiResponse,
    error::{AppError, AppResult},
    rate_limit::{self, RateLimits},
    state::AppState,
};

const INVALID_CREDENTIALS: &str = "Invalid email or password";

pub fn auth_routes(limits: &RateLimits) -> Router<AppState> {
    Router::new()
        .route(
            "/register",
            post(register.layer(middleware::from_fn_with_state(
                limits.register.clone(),
                rate_limit::enforce,
            ))),
        )
        .route(
            "/login",
            post(login.layer(middleware::from_fn_with_state(
                limits.login.clone(),
                rate_limit::enforce,
            ))),
        )
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> AppResult<Json<ApiResponse<AuthResponse>>> {
    let Json(payload) = payload?;

    let (Some(name), Some(email), Some(password)) = (
        payload.name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()),
        payload.email.map(|e| normalize_email(&e)).filter(|e| !e.is_empty()),
        payload.password.filter(|p| !p.is_empty()),
    ) else {
        return Err(AppError::validation(
            "Name, email, and password are required",
        ));
    };

    if !is_valid_email(&email) {
        warn!(email = %email, "invalid email");
        return Err(AppError::validation("Invalid email"));
    }

    check_password_policy(&password)?;

    // Ensure email is not taken
    if state.users.find_by_email(&email).await?.is_some() {
        warn!(email = %email, "email already registered");
        return Err(AppError::conflict("User with this email already exists"));
    }

    let password_hash = hash_password(&password)?;
    let new_user = NewUser {
        name,
        email,
        password_hash,
        role: payload.role.unwrap_or_default(),
    };

    // The unique index still catches a concurrent registration of the same email.
    let Some(user) = state.users.create(new_user).await? else {
        return Err(AppError::conflict("User with this email already exists"));
    };

    let token = JwtKeys::from_ref(&state).sign(user.id)?;

    info!(user_id = %user.id, email = %user.email, role = ?user.role, "user registered");
    Ok(ApiResponse::new(
        "User registered successfully",
        AuthResponse {
            user: user.into(),
            token,
        },
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> AppResult<Json<ApiResponse<AuthResponse>>> {
    let Json(payload) = payload?;

    let (Some(email), Some(password)) = (
        payload.email.map(|e| normalize_email(&e)).filter(|e| !e.is_empty()),
        payload.password.filter(|p| !p.is_empty()),
    ) else {
        return Err(AppError::validation("Email and password are required"));
    };

    let Some(user) = state.users.find_by_email(&email).await? else {
        warn!(email = %email, "login unknown email");
        return Err(AppError::unauthenticated(INVALID_CREDENTIALS));
    };

    if !verify_password(&password, &user.password_hash)? {
        warn!(email = %email, user_id = %user.id, "login invalid password");
        return Err(AppError::unauthenticated(INVALID_CREDENTIALS));
    }

    let token = JwtKeys::from_ref(&state).sign(user.id)?;

    info!(user_id = %user.id, email = %user.email, "user logged in");
    Ok(ApiResponse::new(
        "Login successful",
        AuthResponse {
            user: user.into(),
            token,
        },
    ))
}
