use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::models::{Enrollment, EnrollmentStatus};

pub async fn fetch_enrollments_for_user(
    db: &SqlitePool,
    user_id: &str,
) -> Result<Vec<Enrollment>, sqlx::Error> {
    sqlx::query_as::<_, Enrollment>(
        "SELECT id, user_id, course_id, status, created_at FROM enrollments \
         WHERE user_id = ? AND status = 'active' ORDER BY created_at DESC",
    )
    .bind(user_id)
    .fetch_all(db)
    .await
}

pub async fn find_enrollment(
    db: &SqlitePool,
    user_id: &str,
    course_id: &str,
) -> Result<Option<Enrollment>, sqlx::Error> {
    sqlx::query_as::<_, Enrollment>(
        "SELECT id, user_id, course_id, status, created_at FROM enrollments \
         WHERE user_id = ? AND course_id = ?",
    )
    .bind(user_id)
    .bind(course_id)
    .fetch_optional(db)
    .await
}

/// Creates the enrollment or reactivates a cancelled one.
pub async fn upsert_active_enrollment(
    db: &SqlitePool,
    user_id: &str,
    course_id: &str,
) -> Result<Enrollment, sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO enrollments (id, user_id, course_id, status, created_at)
        VALUES (?1, ?2, ?3, 'active', ?4)
        ON CONFLICT (user_id, course_id) DO UPDATE SET status = 'active'
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(user_id)
    .bind(course_id)
    .bind(Utc::now())
    .execute(db)
    .await?;

    find_enrollment(db, user_id, course_id)
        .await?
        .ok_or(sqlx::Error::RowNotFound)
}

pub async fn cancel_enrollment(
    db: &SqlitePool,
    user_id: &str,
    course_id: &str,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE enrollments SET status = ?1 WHERE user_id = ?2 AND course_id = ?3",
    )
    .bind(EnrollmentStatus::Cancelled)
    .bind(user_id)
    .bind(course_id)
    .execute(db)
    .await?
    .rows_affected();

    Ok(result > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{connect_in_memory, courses, users};
    use crate::models::NewCourseRequest;

    async fn seed(pool: &SqlitePool) -> (String, String) {
        let user = users::insert_user(
            pool,
            users::NewUser {
                email: "learner@example.com".to_string(),
                password_hash: "hash".to_string(),
                name: "Learner".to_string(),
                phone: None,
                class: None,
            },
        )
        .await
        .expect("user");
        let course = courses::insert_course(
            pool,
            NewCourseRequest {
                subject: "Biology".to_string(),
                class: "9".to_string(),
                description: String::new(),
                tags: Vec::new(),
                is_free: true,
                price: 0,
                cover_image_url: None,
            },
        )
        .await
        .expect("course");
        (user.id, course.id)
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent() {
        let pool = connect_in_memory().await.expect("db");
        let (user_id, course_id) = seed(&pool).await;

        let first = upsert_active_enrollment(&pool, &user_id, &course_id).await.expect("first");
        let second = upsert_active_enrollment(&pool, &user_id, &course_id).await.expect("second");
        assert_eq!(first.id, second.id);

        let mine = fetch_enrollments_for_user(&pool, &user_id).await.expect("fetch");
        assert_eq!(mine.len(), 1);
    }

    #[tokio::test]
    async fn test_cancel_and_reactivate() {
        let pool = connect_in_memory().await.expect("db");
        let (user_id, course_id) = seed(&pool).await;
        upsert_active_enrollment(&pool, &user_id, &course_id).await.expect("enroll");

        assert!(cancel_enrollment(&pool, &user_id, &course_id).await.expect("cancel"));
        assert!(fetch_enrollments_for_user(&pool, &user_id).await.expect("fetch").is_empty());

        let again = upsert_active_enrollment(&pool, &user_id, &course_id).await.expect("again");
        assert_eq!(again.status, EnrollmentStatus::Active);
    }
}
