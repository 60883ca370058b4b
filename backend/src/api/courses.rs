use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tracing::info;

use super::{ApiResponse, acknowledged};
use crate::auth::StudentAuth;
use crate::db::{enrollments, topics};
use crate::error::AppError;
use crate::models::{Course, CourseFilter, Enrollment};
use crate::services::access::{CourseContent, CourseWithAccess, StudentAccess, TopicView, topic_accessible};
use crate::services::catalog;
use crate::state::AppState;
use crate::streaming;

/// Signed-in students get the access level of every course.
#[derive(Serialize)]
#[serde(untagged)]
pub enum CourseListing {
    Public(Vec<Course>),
    Student(Vec<CourseWithAccess>),
}

pub async fn list_courses(
    State(state): State<AppState>,
    student: Option<StudentAuth>,
    Query(filter): Query<CourseFilter>,
) -> Result<ApiResponse<CourseListing>, AppError> {
    let listing = match student {
        Some(StudentAuth(claims)) => {
            CourseListing::Student(catalog::courses_with_access(&state.db, &claims.sub, &filter).await?)
        }
        None => CourseListing::Public(catalog::list_courses(&state.db, &filter).await?),
    };
    Ok(ApiResponse::ok(listing))
}

pub async fn get_course(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<ApiResponse<Course>, AppError> {
    Ok(ApiResponse::ok(catalog::get_course(&state.db, &id).await?))
}

pub async fn list_topics(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<ApiResponse<Vec<TopicView>>, AppError> {
    Ok(ApiResponse::ok(catalog::public_topics(&state.db, &id).await?))
}

pub async fn content(
    State(state): State<AppState>,
    StudentAuth(claims): StudentAuth,
    Path(id): Path<String>,
) -> Result<ApiResponse<CourseContent>, AppError> {
    Ok(ApiResponse::ok(
        catalog::content_for_student(&state.db, &claims.sub, &id).await?,
    ))
}

pub async fn enroll(
    State(state): State<AppState>,
    StudentAuth(claims): StudentAuth,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let enrollment = catalog::enroll(&state.db, &claims.sub, &id).await?;
    Ok((
        StatusCode::CREATED,
        ApiResponse::with_message(enrollment, "Enrolled"),
    ))
}

pub async fn unenroll(
    State(state): State<AppState>,
    StudentAuth(claims): StudentAuth,
    Path(id): Path<String>,
) -> Result<ApiResponse<()>, AppError> {
    catalog::unenroll(&state.db, &claims.sub, &id).await?;
    Ok(acknowledged("Enrollment cancelled"))
}

pub async fn enrollments(
    State(state): State<AppState>,
    StudentAuth(claims): StudentAuth,
) -> Result<ApiResponse<Vec<Enrollment>>, AppError> {
    Ok(ApiResponse::ok(
        enrollments::fetch_enrollments_for_user(&state.db, &claims.sub).await?,
    ))
}

pub async fn stream_topic(
    State(state): State<AppState>,
    StudentAuth(claims): StudentAuth,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let topic = topics::find_topic_by_id(&state.db, &id)
        .await?
        .ok_or_else(|| AppError::not_found("Topic"))?;
    let course = catalog::get_course(&state.db, &topic.course_id).await?;

    let access = StudentAccess::load(&state.db, &claims.sub).await?;
    if !topic_accessible(access.course(&course), &topic) {
        return Err(AppError::Forbidden(
            "Subscribe or purchase this course to watch this topic".to_string(),
        ));
    }

    info!("streaming topic {} to user {}", topic.id, claims.sub);
    streaming::proxy_video(&state.http, &topic.video_url, &headers).await
}
