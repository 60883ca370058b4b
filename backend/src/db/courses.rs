use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqlitePool, types::Json};
use uuid::Uuid;

use crate::models::{Course, CourseFilter, NewCourseRequest, UpdateCourseRequest};

const COURSE_COLUMNS: &str =
    "id, subject, class, description, tags, is_free, price, cover_image_url, created_at, updated_at";

pub async fn fetch_courses(
    db: &SqlitePool,
    filter: &CourseFilter,
) -> Result<Vec<Course>, sqlx::Error> {
    let mut qb: QueryBuilder<Sqlite> =
        QueryBuilder::new(format!("SELECT {COURSE_COLUMNS} FROM courses WHERE 1 = 1"));

    if let Some(class) = &filter.class {
        qb.push(" AND class = ").push_bind(class.clone());
    }
    if let Some(subject) = &filter.subject {
        qb.push(" AND LOWER(subject) = LOWER(").push_bind(subject.clone()).push(")");
    }
    if let Some(is_free) = filter.is_free {
        qb.push(" AND is_free = ").push_bind(is_free);
    }
    if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", escape_like(&search.to_lowercase()));
        qb.push(" AND (LOWER(subject) LIKE ")
            .push_bind(pattern.clone())
            .push(" ESCAPE '\\' OR LOWER(description) LIKE ")
            .push_bind(pattern.clone())
            .push(" ESCAPE '\\' OR LOWER(tags) LIKE ")
            .push_bind(pattern)
            .push(" ESCAPE '\\')");
    }
    qb.push(" ORDER BY class, subject");

    qb.build_query_as::<Course>().fetch_all(db).await
}

/// Escapes LIKE wildcards so search text matches literally.
fn escape_like(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

pub async fn find_course_by_id(db: &SqlitePool, id: &str) -> Result<Option<Course>, sqlx::Error> {
    sqlx::query_as::<_, Course>(&format!("SELECT {COURSE_COLUMNS} FROM courses WHERE id = ?"))
        .bind(id)
        .fetch_optional(db)
        .await
}

pub async fn insert_course(db: &SqlitePool, req: NewCourseRequest) -> Result<Course, sqlx::Error> {
    let id = Uuid::new_v4().to_string();
    let now = Utc::now();
    let price = if req.is_free { 0 } else { req.price };

    sqlx::query(
        r#"
        INSERT INTO courses
            (id, subject, class, description, tags, is_free, price, cover_image_url,
            created_at, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)
        "#,
    )
    .bind(&id)
    .bind(&req.subject)
    .bind(&req.class)
    .bind(&req.description)
    .bind(Json(&req.tags))
    .bind(req.is_free)
    .bind(price)
    .bind(&req.cover_image_url)
    .bind(now)
    .execute(db)
    .await?;

    Ok(Course {
        id,
        subject: req.subject,
        class: req.class,
        description: req.description,
        tags: Json(req.tags),
        is_free: req.is_free,
        price,
        cover_image_url: req.cover_image_url,
        created_at: now,
        updated_at: now,
    })
}

pub async fn update_course(
    db: &SqlitePool,
    id: &str,
    req: UpdateCourseRequest,
) -> Result<Option<Course>, sqlx::Error> {
    let mut current = match find_course_by_id(db, id).await? {
        Some(c) => c,
        None => return Ok(None),
    };

    if let Some(subject) = req.subject {
        current.subject = subject;
    }
    if let Some(class) = req.class {
        current.class = class;
    }
    if let Some(description) = req.description {
        current.description = description;
    }
    if let Some(tags) = req.tags {
        current.tags = Json(tags);
    }
    if let Some(is_free) = req.is_free {
        current.is_free = is_free;
    }
    if let Some(price) = req.price {
        current.price = price;
    }
    if let Some(cover) = req.cover_image_url {
        current.cover_image_url = Some(cover);
    }
    if current.is_free {
        current.price = 0;
    }
    current.updated_at = Utc::now();

    sqlx::query(
        r#"
        UPDATE courses
        SET subject = ?1,
            class = ?2,
            description = ?3,
            tags = ?4,
            is_free = ?5,
            price = ?6,
            cover_image_url = ?7,
            updated_at = ?8
        WHERE id = ?9
        "#,
    )
    .bind(&current.subject)
    .bind(&current.class)
    .bind(&current.description)
    .bind(&current.tags)
    .bind(current.is_free)
    .bind(current.price)
    .bind(&current.cover_image_url)
    .bind(current.updated_at)
    .bind(id)
    .execute(db)
    .await?;

    Ok(Some(current))
}

pub async fn delete_course(db: &SqlitePool, id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM courses WHERE id = ?")
        .bind(id)
        .execute(db)
        .await?
        .rows_affected();

    Ok(result > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::connect_in_memory;

    fn physics(is_free: bool) -> NewCourseRequest {
        NewCourseRequest {
            subject: "Physics".to_string(),
            class: "11".to_string(),
            description: "Mechanics and waves".to_string(),
            tags: vec!["jee".to_string(), "mechanics".to_string()],
            is_free,
            price: 49900,
            cover_image_url: None,
        }
    }

    #[tokio::test]
    async fn test_insert_and_fetch_course() {
        let pool = connect_in_memory().await.expect("db");

        let course = insert_course(&pool, physics(false)).await.expect("Failed to insert course");
        assert_eq!(course.price, 49900);

        let courses = fetch_courses(&pool, &CourseFilter::default()).await.expect("fetch");
        assert_eq!(courses.len(), 1);
        assert_eq!(courses[0].id, course.id);
        assert_eq!(courses[0].tags.0, vec!["jee", "mechanics"]);
    }

    #[tokio::test]
    async fn test_free_course_has_zero_price() {
        let pool = connect_in_memory().await.expect("db");

        let course = insert_course(&pool, physics(true)).await.expect("insert");
        assert_eq!(course.price, 0);

        let stored = find_course_by_id(&pool, &course.id).await.expect("q").expect("course");
        assert!(stored.is_free);
        assert_eq!(stored.price, 0);
    }

    #[tokio::test]
    async fn test_filter_courses() {
        let pool = connect_in_memory().await.expect("db");

        insert_course(&pool, physics(false)).await.expect("insert");
        let mut chem = physics(true);
        chem.subject = "Chemistry".to_string();
        chem.class = "12".to_string();
        chem.tags = vec!["organic".to_string()];
        insert_course(&pool, chem).await.expect("insert");

        let class_12 = fetch_courses(
            &pool,
            &CourseFilter {
                class: Some("12".to_string()),
                ..Default::default()
            },
        )
        .await
        .expect("fetch");
        assert_eq!(class_12.len(), 1);
        assert_eq!(class_12[0].subject, "Chemistry");

        let tagged = fetch_courses(
            &pool,
            &CourseFilter {
                search: Some("ORGANIC".to_string()),
                ..Default::default()
            },
        )
        .await
        .expect("fetch");
        assert_eq!(tagged.len(), 1);

        let free = fetch_courses(
            &pool,
            &CourseFilter {
                is_free: Some(false),
                ..Default::default()
            },
        )
        .await
        .expect("fetch");
        assert_eq!(free.len(), 1);
        assert_eq!(free[0].subject, "Physics");
    }

    #[tokio::test]
    async fn test_update_and_delete_course() {
        let pool = connect_in_memory().await.expect("db");
        let course = insert_course(&pool, physics(false)).await.expect("insert");

        let updated = update_course(
            &pool,
            &course.id,
            UpdateCourseRequest {
                description: Some("Updated".to_string()),
                is_free: Some(true),
                ..Default::default()
            },
        )
        .await
        .expect("update")
        .expect("course missing");
        assert_eq!(updated.description, "Updated");
        assert_eq!(updated.price, 0);

        assert!(delete_course(&pool, &course.id).await.expect("delete"));
        assert!(!delete_course(&pool, &course.id).await.expect("delete"));
    }

    #[tokio::test]
    async fn test_search_treats_wildcards_literally() {
        let pool = connect_in_memory().await.expect("db");

        insert_course(&pool, physics(false)).await.expect("insert");
        let mut maths = physics(false);
        maths.subject = "Maths".to_string();
        maths.description = "Score 100% in boards".to_string();
        maths.tags = Vec::new();
        insert_course(&pool, maths).await.expect("insert");

        let search = |text: &str| CourseFilter {
            search: Some(text.to_string()),
            ..Default::default()
        };

        let percent = fetch_courses(&pool, &search("100%")).await.expect("fetch");
        assert_eq!(percent.len(), 1);
        assert_eq!(percent[0].subject, "Maths");

        // `_` would otherwise match the "e" in "Mechanics".
        let underscore = fetch_courses(&pool, &search("m_c")).await.expect("fetch");
        assert!(underscore.is_empty());

        let plain = fetch_courses(&pool, &search("MECH")).await.expect("fetch");
        assert_eq!(plain.len(), 1);
    }
}
