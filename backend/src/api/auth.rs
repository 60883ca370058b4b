use axum::extract::State;
use axum::http::StatusCode;
use axum::http::header::SET_COOKIE;
use axum::response::IntoResponse;

use super::{ApiJson, ApiResponse, acknowledged};
use crate::auth::{ADMIN_COOKIE, AdminAuth, STUDENT_COOKIE, StudentAuth, clear_cookie, session_cookie};
use crate::error::AppError;
use crate::models::{Admin, LoginRequest, RegisterRequest, UpdateProfileRequest};
use crate::services::accounts::{self, AdminSession, StudentProfile, StudentSession};
use crate::services::{SubscriptionStatus, subscription};
use crate::state::AppState;

pub async fn register(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    let session = accounts::register(&state.db, &state.config.jwt_secret, req).await?;
    let cookie = session_cookie(STUDENT_COOKIE, &session.token, state.config.cookie_secure);

    Ok((
        StatusCode::CREATED,
        [(SET_COOKIE, cookie)],
        ApiResponse::<StudentSession>::with_message(session, "Registration successful"),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let session = accounts::login(&state.db, &state.config.jwt_secret, req).await?;
    let cookie = session_cookie(STUDENT_COOKIE, &session.token, state.config.cookie_secure);

    Ok(([(SET_COOKIE, cookie)], ApiResponse::ok(session)))
}

pub async fn logout() -> impl IntoResponse {
    ([(SET_COOKIE, clear_cookie(STUDENT_COOKIE))], acknowledged("Logged out"))
}

pub async fn me(
    State(state): State<AppState>,
    StudentAuth(claims): StudentAuth,
) -> Result<ApiResponse<StudentProfile>, AppError> {
    Ok(ApiResponse::ok(accounts::profile(&state.db, &claims.sub).await?))
}

pub async fn update_me(
    State(state): State<AppState>,
    StudentAuth(claims): StudentAuth,
    ApiJson(req): ApiJson<UpdateProfileRequest>,
) -> Result<ApiResponse<StudentProfile>, AppError> {
    let profile = accounts::update_profile(&state.db, &claims.sub, req).await?;
    Ok(ApiResponse::with_message(profile, "Profile updated"))
}

pub async fn subscription(
    State(state): State<AppState>,
    StudentAuth(claims): StudentAuth,
) -> Result<ApiResponse<SubscriptionStatus>, AppError> {
    Ok(ApiResponse::ok(subscription::resolve(&state.db, &claims.sub).await?))
}

pub async fn admin_login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let session = accounts::admin_login(&state.db, &state.config.jwt_secret, req).await?;
    let cookie = session_cookie(ADMIN_COOKIE, &session.token, state.config.cookie_secure);

    Ok(([(SET_COOKIE, cookie)], ApiResponse::<AdminSession>::ok(session)))
}

pub async fn admin_logout() -> impl IntoResponse {
    ([(SET_COOKIE, clear_cookie(ADMIN_COOKIE))], acknowledged("Logged out"))
}

pub async fn admin_me(
    State(state): State<AppState>,
    AdminAuth(claims): AdminAuth,
) -> Result<ApiResponse<Admin>, AppError> {
    Ok(ApiResponse::ok(accounts::admin_profile(&state.db, &claims.sub).await?))
}
