use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use chrono::Utc;

use super::{ApiJson, ApiResponse, acknowledged};
use crate::auth::AdminAuth;
use crate::db::promo_codes;
use crate::error::AppError;
use crate::models::{
    Course, NewCourseRequest, NewPromoCodeRequest, NewTopicRequest, Order, OrderFilter, PromoCode,
    ReorderTopicsRequest, Topic, UpdateCourseRequest, UpdatePromoCodeRequest, UpdateTopicRequest,
};
use crate::services::reports::{self, DashboardStats, StudentOverview};
use crate::services::{catalog, promo};
use crate::state::AppState;

pub async fn create_course(
    State(state): State<AppState>,
    _admin: AdminAuth,
    ApiJson(req): ApiJson<NewCourseRequest>,
) -> Result<impl IntoResponse, AppError> {
    let course = catalog::create_course(&state.db, req).await?;
    Ok((StatusCode::CREATED, ApiResponse::<Course>::ok(course)))
}

pub async fn update_course(
    State(state): State<AppState>,
    _admin: AdminAuth,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<UpdateCourseRequest>,
) -> Result<ApiResponse<Course>, AppError> {
    Ok(ApiResponse::ok(catalog::update_course(&state.db, &id, req).await?))
}

pub async fn delete_course(
    State(state): State<AppState>,
    _admin: AdminAuth,
    Path(id): Path<String>,
) -> Result<ApiResponse<()>, AppError> {
    catalog::delete_course(&state.db, &id).await?;
    Ok(acknowledged("Course deleted"))
}

pub async fn create_topic(
    State(state): State<AppState>,
    _admin: AdminAuth,
    Path(course_id): Path<String>,
    ApiJson(req): ApiJson<NewTopicRequest>,
) -> Result<impl IntoResponse, AppError> {
    let topic = catalog::create_topic(&state.db, &course_id, req).await?;
    Ok((StatusCode::CREATED, ApiResponse::<Topic>::ok(topic)))
}

pub async fn reorder_topics(
    State(state): State<AppState>,
    _admin: AdminAuth,
    Path(course_id): Path<String>,
    ApiJson(req): ApiJson<ReorderTopicsRequest>,
) -> Result<ApiResponse<Vec<Topic>>, AppError> {
    Ok(ApiResponse::ok(
        catalog::reorder_topics(&state.db, &course_id, &req.topic_ids).await?,
    ))
}

pub async fn update_topic(
    State(state): State<AppState>,
    _admin: AdminAuth,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<UpdateTopicRequest>,
) -> Result<ApiResponse<Topic>, AppError> {
    Ok(ApiResponse::ok(catalog::update_topic(&state.db, &id, req).await?))
}

pub async fn delete_topic(
    State(state): State<AppState>,
    _admin: AdminAuth,
    Path(id): Path<String>,
) -> Result<ApiResponse<()>, AppError> {
    catalog::delete_topic(&state.db, &id).await?;
    Ok(acknowledged("Topic deleted"))
}

pub async fn list_promo_codes(
    State(state): State<AppState>,
    _admin: AdminAuth,
) -> Result<ApiResponse<Vec<PromoCode>>, AppError> {
    Ok(ApiResponse::ok(promo_codes::fetch_promo_codes(&state.db).await?))
}

pub async fn create_promo_code(
    State(state): State<AppState>,
    _admin: AdminAuth,
    ApiJson(req): ApiJson<NewPromoCodeRequest>,
) -> Result<impl IntoResponse, AppError> {
    let promo = promo::create_promo_code(&state.db, req).await?;
    Ok((StatusCode::CREATED, ApiResponse::<PromoCode>::ok(promo)))
}

pub async fn update_promo_code(
    State(state): State<AppState>,
    _admin: AdminAuth,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<UpdatePromoCodeRequest>,
) -> Result<ApiResponse<PromoCode>, AppError> {
    Ok(ApiResponse::ok(promo::update_promo_code(&state.db, &id, req).await?))
}

pub async fn delete_promo_code(
    State(state): State<AppState>,
    _admin: AdminAuth,
    Path(id): Path<String>,
) -> Result<ApiResponse<()>, AppError> {
    if !promo_codes::delete_promo_code(&state.db, &id).await? {
        return Err(AppError::not_found("Promo code"));
    }
    Ok(acknowledged("Promo code deleted"))
}

pub async fn stats(
    State(state): State<AppState>,
    _admin: AdminAuth,
) -> Result<ApiResponse<DashboardStats>, AppError> {
    Ok(ApiResponse::ok(reports::dashboard(&state.db, Utc::now()).await?))
}

pub async fn students(
    State(state): State<AppState>,
    _admin: AdminAuth,
) -> Result<ApiResponse<Vec<StudentOverview>>, AppError> {
    Ok(ApiResponse::ok(reports::students(&state.db, Utc::now()).await?))
}

pub async fn orders(
    State(state): State<AppState>,
    _admin: AdminAuth,
    Query(filter): Query<OrderFilter>,
) -> Result<ApiResponse<Vec<Order>>, AppError> {
    Ok(ApiResponse::ok(reports::list_orders(&state.db, filter.status).await?))
}
