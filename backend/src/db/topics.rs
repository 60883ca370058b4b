use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::models::{NewTopicRequest, Topic, UpdateTopicRequest};

const TOPIC_COLUMNS: &str = "id, course_id, title, description, video_url, thumbnail_url, \
     duration_seconds, sequence_order, is_free, created_at, updated_at";

pub async fn fetch_topics(db: &SqlitePool, course_id: &str) -> Result<Vec<Topic>, sqlx::Error> {
    sqlx::query_as::<_, Topic>(&format!(
        "SELECT {TOPIC_COLUMNS} FROM topics WHERE course_id = ? ORDER BY sequence_order, created_at"
    ))
    .bind(course_id)
    .fetch_all(db)
    .await
}

pub async fn find_topic_by_id(db: &SqlitePool, id: &str) -> Result<Option<Topic>, sqlx::Error> {
    sqlx::query_as::<_, Topic>(&format!("SELECT {TOPIC_COLUMNS} FROM topics WHERE id = ?"))
        .bind(id)
        .fetch_optional(db)
        .await
}

async fn next_sequence_order(db: &SqlitePool, course_id: &str) -> Result<i64, sqlx::Error> {
    let max: Option<i64> =
        sqlx::query_scalar("SELECT MAX(sequence_order) FROM topics WHERE course_id = ?")
            .bind(course_id)
            .fetch_one(db)
            .await?;

    Ok(max.map_or(1, |m| m + 1))
}

pub async fn insert_topic(
    db: &SqlitePool,
    course_id: &str,
    req: NewTopicRequest,
) -> Result<Topic, sqlx::Error> {
    let id = Uuid::new_v4().to_string();
    let now = Utc::now();
    let sequence_order = match req.sequence_order {
        Some(order) => order,
        None => next_sequence_order(db, course_id).await?,
    };

    sqlx::query(
        r#"
        INSERT INTO topics
            (id, course_id, title, description, video_url, thumbnail_url,
            duration_seconds, sequence_order, is_free, created_at, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)
        "#,
    )
    .bind(&id)
    .bind(course_id)
    .bind(&req.title)
    .bind(&req.description)
    .bind(&req.video_url)
    .bind(&req.thumbnail_url)
    .bind(req.duration_seconds)
    .bind(sequence_order)
    .bind(req.is_free)
    .bind(now)
    .execute(db)
    .await?;

    Ok(Topic {
        id,
        course_id: course_id.to_string(),
        title: req.title,
        description: req.description,
        video_url: req.video_url,
        thumbnail_url: req.thumbnail_url,
        duration_seconds: req.duration_seconds,
        sequence_order,
        is_free: req.is_free,
        created_at: now,
        updated_at: now,
    })
}

pub async fn update_topic(
    db: &SqlitePool,
    id: &str,
    req: UpdateTopicRequest,
) -> Result<Option<Topic>, sqlx::Error> {
    let mut current = match find_topic_by_id(db, id).await? {
        Some(t) => t,
        None => return Ok(None),
    };

    if let Some(title) = req.title {
        current.title = title;
    }
    if let Some(description) = req.description {
        current.description = Some(description);
    }
    if let Some(video_url) = req.video_url {
        current.video_url = video_url;
    }
    if let Some(thumbnail_url) = req.thumbnail_url {
        current.thumbnail_url = Some(thumbnail_url);
    }
    if let Some(duration) = req.duration_seconds {
        current.duration_seconds = duration;
    }
    if let Some(order) = req.sequence_order {
        current.sequence_order = order;
    }
    if let Some(is_free) = req.is_free {
        current.is_free = is_free;
    }
    current.updated_at = Utc::now();

    sqlx::query(
        r#"
        UPDATE topics
        SET title = ?1,
            description = ?2,
            video_url = ?3,
            thumbnail_url = ?4,
            duration_seconds = ?5,
            sequence_order = ?6,
            is_free = ?7,
            updated_at = ?8
        WHERE id = ?9
        "#,
    )
    .bind(&current.title)
    .bind(&current.description)
    .bind(&current.video_url)
    .bind(&current.thumbnail_url)
    .bind(current.duration_seconds)
    .bind(current.sequence_order)
    .bind(current.is_free)
    .bind(current.updated_at)
    .bind(id)
    .execute(db)
    .await?;

    Ok(Some(current))
}

pub async fn delete_topic(db: &SqlitePool, id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM topics WHERE id = ?")
        .bind(id)
        .execute(db)
        .await?
        .rows_affected();

    Ok(result > 0)
}

/// Assigns `sequence_order` 1..n following `topic_ids`. Ids that do not
/// belong to the course are left untouched; returns how many rows moved.
pub async fn reorder_topics(
    db: &SqlitePool,
    course_id: &str,
    topic_ids: &[String],
) -> Result<u64, sqlx::Error> {
    let mut tx = db.begin().await?;
    let now = Utc::now();
    let mut moved = 0;

    for (position, topic_id) in topic_ids.iter().enumerate() {
        moved += sqlx::query(
            "UPDATE topics SET sequence_order = ?1, updated_at = ?2 WHERE id = ?3 AND course_id = ?4",
        )
        .bind(position as i64 + 1)
        .bind(now)
        .bind(topic_id)
        .bind(course_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();
    }

    tx.commit().await?;
    Ok(moved)
}
