use sqlx::SqlitePool;
use tracing::info;

use crate::db::{courses, enrollments, topics};
use crate::error::AppError;
use crate::models::{
    Course, CourseFilter, Enrollment, NewCourseRequest, NewTopicRequest, Topic,
    UpdateCourseRequest, UpdateTopicRequest,
};
use crate::services::access::{CourseContent, CourseWithAccess, StudentAccess, TopicView, course_content};

fn require(field: &str, value: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::BadRequest(format!("{} is required", field)));
    }
    Ok(())
}

fn check_price(is_free: bool, price: i64) -> Result<(), AppError> {
    if price < 0 {
        return Err(AppError::BadRequest("price cannot be negative".to_string()));
    }
    if !is_free && price == 0 {
        return Err(AppError::BadRequest(
            "Paid courses need a price greater than zero".to_string(),
        ));
    }
    Ok(())
}

fn clean_tags(tags: Vec<String>) -> Vec<String> {
    tags.into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

pub async fn list_courses(db: &SqlitePool, filter: &CourseFilter) -> Result<Vec<Course>, AppError> {
    Ok(courses::fetch_courses(db, filter).await?)
}

pub async fn get_course(db: &SqlitePool, id: &str) -> Result<Course, AppError> {
    courses::find_course_by_id(db, id)
        .await?
        .ok_or_else(|| AppError::not_found("Course"))
}

pub async fn create_course(db: &SqlitePool, mut req: NewCourseRequest) -> Result<Course, AppError> {
    require("subject", &req.subject)?;
    require("class", &req.class)?;
    check_price(req.is_free, req.price)?;

    req.subject = req.subject.trim().to_string();
    req.class = req.class.trim().to_string();
    req.tags = clean_tags(req.tags);

    let course = courses::insert_course(db, req).await?;
    info!("course {} created ({} / class {})", course.id, course.subject, course.class);
    Ok(course)
}

pub async fn update_course(
    db: &SqlitePool,
    id: &str,
    mut req: UpdateCourseRequest,
) -> Result<Course, AppError> {
    let current = get_course(db, id).await?;

    if let Some(subject) = &req.subject {
        require("subject", subject)?;
    }
    if let Some(class) = &req.class {
        require("class", class)?;
    }
    let is_free = req.is_free.unwrap_or(current.is_free);
    let price = if is_free { 0 } else { req.price.unwrap_or(current.price) };
    check_price(is_free, price)?;

    req.tags = req.tags.map(clean_tags);

    courses::update_course(db, id, req)
        .await?
        .ok_or_else(|| AppError::not_found("Course"))
}

pub async fn delete_course(db: &SqlitePool, id: &str) -> Result<(), AppError> {
    if !courses::delete_course(db, id).await? {
        return Err(AppError::not_found("Course"));
    }
    info!("course {} deleted", id);
    Ok(())
}

/// Topic outline for anonymous visitors; no video URLs.
pub async fn public_topics(db: &SqlitePool, course_id: &str) -> Result<Vec<TopicView>, AppError> {
    get_course(db, course_id).await?;
    let topics = topics::fetch_topics(db, course_id).await?;
    Ok(topics.into_iter().map(TopicView::public).collect())
}

pub async fn courses_with_access(
    db: &SqlitePool,
    user_id: &str,
    filter: &CourseFilter,
) -> Result<Vec<CourseWithAccess>, AppError> {
    let access = StudentAccess::load(db, user_id).await?;
    let courses = courses::fetch_courses(db, filter).await?;

    Ok(courses
        .into_iter()
        .map(|course| CourseWithAccess {
            access: access.course(&course),
            course,
        })
        .collect())
}

pub async fn content_for_student(
    db: &SqlitePool,
    user_id: &str,
    course_id: &str,
) -> Result<CourseContent, AppError> {
    let course = get_course(db, course_id).await?;
    let access = StudentAccess::load(db, user_id).await?;
    let topics = topics::fetch_topics(db, course_id).await?;

    Ok(course_content(&access, course, topics))
}

/// Enrolling only records the course in the student's list; it needs
/// access to the course already.
pub async fn enroll(db: &SqlitePool, user_id: &str, course_id: &str) -> Result<Enrollment, AppError> {
    let course = get_course(db, course_id).await?;
    let access = StudentAccess::load(db, user_id).await?;

    if !access.course(&course).is_open() {
        return Err(AppError::Forbidden(
            "Subscribe or purchase this course to enroll".to_string(),
        ));
    }

    let enrollment = enrollments::upsert_active_enrollment(db, user_id, course_id).await?;
    info!("user {} enrolled in course {}", user_id, course_id);
    Ok(enrollment)
}

pub async fn unenroll(db: &SqlitePool, user_id: &str, course_id: &str) -> Result<(), AppError> {
    if !enrollments::cancel_enrollment(db, user_id, course_id).await? {
        return Err(AppError::not_found("Enrollment"));
    }
    Ok(())
}

pub async fn create_topic(
    db: &SqlitePool,
    course_id: &str,
    mut req: NewTopicRequest,
) -> Result<Topic, AppError> {
    get_course(db, course_id).await?;
    require("title", &req.title)?;
    require("video_url", &req.video_url)?;
    if req.duration_seconds < 0 {
        return Err(AppError::BadRequest("duration_seconds cannot be negative".to_string()));
    }

    req.title = req.title.trim().to_string();
    req.video_url = req.video_url.trim().to_string();

    Ok(topics::insert_topic(db, course_id, req).await?)
}

pub async fn update_topic(
    db: &SqlitePool,
    id: &str,
    req: UpdateTopicRequest,
) -> Result<Topic, AppError> {
    if let Some(title) = &req.title {
        require("title", title)?;
    }
    if let Some(url) = &req.video_url {
        require("video_url", url)?;
    }
    if req.duration_seconds.is_some_and(|d| d < 0) {
        return Err(AppError::BadRequest("duration_seconds cannot be negative".to_string()));
    }

    topics::update_topic(db, id, req)
        .await?
        .ok_or_else(|| AppError::not_found("Topic"))
}

pub async fn delete_topic(db: &SqlitePool, id: &str) -> Result<(), AppError> {
    if !topics::delete_topic(db, id).await? {
        return Err(AppError::not_found("Topic"));
    }
    Ok(())
}

pub async fn reorder_topics(
    db: &SqlitePool,
    course_id: &str,
    topic_ids: &[String],
) -> Result<Vec<Topic>, AppError> {
    get_course(db, course_id).await?;
    if topic_ids.is_empty() {
        return Err(AppError::BadRequest("topic_ids cannot be empty".to_string()));
    }

    let moved = topics::reorder_topics(db, course_id, topic_ids).await?;
    if moved as usize != topic_ids.len() {
        info!(
            "reorder of course {} skipped {} unknown topic ids",
            course_id,
            topic_ids.len() - moved as usize
        );
    }

    Ok(topics::fetch_topics(db, course_id).await?)
}
