use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::models::{UpdateProfileRequest, User};

const USER_COLUMNS: &str = "id, email, password_hash, name, phone, class, subscription_active, \
     subscription_start_date, subscription_end_date, created_at, updated_at";

pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub name: String,
    pub phone: Option<String>,
    pub class: Option<String>,
}

pub async fn insert_user(db: &SqlitePool, new: NewUser) -> Result<User, sqlx::Error> {
    let id = Uuid::new_v4().to_string();
    let now = Utc::now();

    sqlx::query(
        r#"
        INSERT INTO users
            (id, email, password_hash, name, phone, class,
            subscription_active, subscription_start_date, subscription_end_date,
            created_at, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, NULL, NULL, ?7, ?7)
        "#,
    )
    .bind(&id)
    .bind(&new.email)
    .bind(&new.password_hash)
    .bind(&new.name)
    .bind(&new.phone)
    .bind(&new.class)
    .bind(now)
    .execute(db)
    .await?;

    Ok(User {
        id,
        email: new.email,
        password_hash: new.password_hash,
        name: new.name,
        phone: new.phone,
        class: new.class,
        subscription_active: false,
        subscription_start_date: None,
        subscription_end_date: None,
        created_at: now,
        updated_at: now,
    })
}

pub async fn find_user_by_id(db: &SqlitePool, id: &str) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"))
        .bind(id)
        .fetch_optional(db)
        .await
}

pub async fn find_user_by_email(
    db: &SqlitePool,
    email: &str,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?"))
        .bind(email)
        .fetch_optional(db)
        .await
}

pub async fn fetch_users(db: &SqlitePool) -> Result<Vec<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users ORDER BY created_at DESC"
    ))
    .fetch_all(db)
    .await
}

pub async fn update_profile(
    db: &SqlitePool,
    id: &str,
    req: UpdateProfileRequest,
) -> Result<Option<User>, sqlx::Error> {
    let mut current = match find_user_by_id(db, id).await? {
        Some(u) => u,
        None => return Ok(None),
    };

    if let Some(name) = req.name {
        current.name = name;
    }
    if let Some(phone) = req.phone {
        current.phone = Some(phone);
    }
    if let Some(class) = req.class {
        current.class = Some(class);
    }
    current.updated_at = Utc::now();

    sqlx::query(
        r#"
        UPDATE users
        SET name = ?1,
            phone = ?2,
            class = ?3,
            updated_at = ?4
        WHERE id = ?5
        "#,
    )
    .bind(&current.name)
    .bind(&current.phone)
    .bind(&current.class)
    .bind(current.updated_at)
    .bind(id)
    .execute(db)
    .await?;

    Ok(Some(current))
}

/// Overwrites the subscription window stored on the user row.
pub async fn set_subscription(
    db: &SqlitePool,
    id: &str,
    active: bool,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE users
        SET subscription_active = ?1,
            subscription_start_date = ?2,
            subscription_end_date = ?3,
            updated_at = ?4
        WHERE id = ?5
        "#,
    )
    .bind(active)
    .bind(start)
    .bind(end)
    .bind(Utc::now())
    .bind(id)
    .execute(db)
    .await?
    .rows_affected();

    Ok(result > 0)
}

/// Clears the active flag on users whose subscription window has closed.
/// Returns the ids that were switched off.
pub async fn deactivate_expired(
    db: &SqlitePool,
    now: DateTime<Utc>,
) -> Result<Vec<String>, sqlx::Error> {
    let active: Vec<User> = sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE subscription_active = 1"
    ))
    .fetch_all(db)
    .await?;

    let mut expired = Vec::new();
    for user in active {
        let lapsed = user.subscription_end_date.is_none_or(|end| end <= now);
        if !lapsed {
            continue;
        }
        if deactivate_if_unchanged(db, &user.id, user.subscription_end_date, now).await? {
            expired.push(user.id);
        }
    }

    Ok(expired)
}

/// Clears the active flag only if the end date still matches `seen_end`,
/// so a renewal committed after the read is left alone.
pub async fn deactivate_if_unchanged(
    db: &SqlitePool,
    id: &str,
    seen_end: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE users SET subscription_active = 0, updated_at = ?1 \
         WHERE id = ?2 AND subscription_active = 1 AND subscription_end_date IS ?3",
    )
    .bind(now)
    .bind(id)
    .bind(seen_end)
    .execute(db)
    .await?;

    Ok(result.rows_affected() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::connect_in_memory;
    use chrono::Duration;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            email: email.to_string(),
            password_hash: "hash".to_string(),
            name: "Asha".to_string(),
            phone: None,
            class: Some("10".to_string()),
        }
    }

    #[tokio::test]
    async fn test_insert_and_find_user() {
        let pool = connect_in_memory().await.expect("db");

        let user = insert_user(&pool, new_user("asha@example.com"))
            .await
            .expect("Failed to insert user");
        assert!(!user.subscription_active);

        let by_email = find_user_by_email(&pool, "asha@example.com")
            .await
            .expect("query")
            .expect("user missing");
        assert_eq!(by_email.id, user.id);
        assert_eq!(by_email.class.as_deref(), Some("10"));

        let by_id = find_user_by_id(&pool, &user.id).await.expect("query");
        assert!(by_id.is_some());
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected_by_schema() {
        let pool = connect_in_memory().await.expect("db");

        insert_user(&pool, new_user("dup@example.com")).await.expect("first");
        let second = insert_user(&pool, new_user("dup@example.com")).await;
        assert!(second.is_err());
    }

    #[tokio::test]
    async fn test_update_profile() {
        let pool = connect_in_memory().await.expect("db");
        let user = insert_user(&pool, new_user("p@example.com")).await.expect("insert");

        let updated = update_profile(
            &pool,
            &user.id,
            UpdateProfileRequest {
                name: Some("Asha K".to_string()),
                phone: Some("99999".to_string()),
                class: None,
            },
        )
        .await
        .expect("update")
        .expect("user missing");

        assert_eq!(updated.name, "Asha K");
        assert_eq!(updated.phone.as_deref(), Some("99999"));
        assert_eq!(updated.class.as_deref(), Some("10"));

        let missing = update_profile(&pool, "nope", UpdateProfileRequest {
            name: None,
            phone: None,
            class: None,
        })
        .await
        .expect("update");
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_deactivate_expired() {
        let pool = connect_in_memory().await.expect("db");
        let now = Utc::now();

        let lapsed = insert_user(&pool, new_user("old@example.com")).await.expect("insert");
        set_subscription(&pool, &lapsed.id, true, Some(now - Duration::days(400)), Some(now - Duration::days(1)))
            .await
            .expect("set");

        let current = insert_user(&pool, new_user("new@example.com")).await.expect("insert");
        set_subscription(&pool, &current.id, true, Some(now), Some(now + Duration::days(30)))
            .await
            .expect("set");

        let switched = deactivate_expired(&pool, now).await.expect("sweep");
        assert_eq!(switched, vec![lapsed.id.clone()]);

        let reloaded = find_user_by_id(&pool, &lapsed.id).await.expect("q").expect("user");
        assert!(!reloaded.subscription_active);
        let still = find_user_by_id(&pool, &current.id).await.expect("q").expect("user");
        assert!(still.subscription_active);
    }

    #[tokio::test]
    async fn test_deactivate_skips_renewed_subscription() {
        let pool = connect_in_memory().await.expect("db");
        let now = Utc::now();
        let user = insert_user(&pool, new_user("renew@example.com")).await.expect("insert");

        let seen_end = now - Duration::days(1);
        set_subscription(&pool, &user.id, true, Some(now - Duration::days(366)), Some(seen_end))
            .await
            .expect("set");
        // Renewed between the sweep's read and its write.
        let renewed_end = now + Duration::days(365);
        set_subscription(&pool, &user.id, true, Some(now - Duration::days(366)), Some(renewed_end))
            .await
            .expect("renew");

        assert!(!deactivate_if_unchanged(&pool, &user.id, Some(seen_end), now).await.expect("stale"));
        let reloaded = find_user_by_id(&pool, &user.id).await.expect("q").expect("user");
        assert!(reloaded.subscription_active);

        assert!(deactivate_if_unchanged(&pool, &user.id, Some(renewed_end), now).await.expect("current"));
        let reloaded = find_user_by_id(&pool, &user.id).await.expect("q").expect("user");
        assert!(!reloaded.subscription_active);
    }

    #[tokio::test]
    async fn test_deactivate_active_flag_without_end_date() {
        let pool = connect_in_memory().await.expect("db");
        let now = Utc::now();
        let user = insert_user(&pool, new_user("noend@example.com")).await.expect("insert");
        set_subscription(&pool, &user.id, true, None, None).await.expect("set");

        let switched = deactivate_expired(&pool, now).await.expect("sweep");
        assert_eq!(switched, vec![user.id]);
    }
}
