use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::models::Admin;

pub async fn insert_admin(
    db: &SqlitePool,
    email: &str,
    password_hash: &str,
    name: &str,
) -> Result<Admin, sqlx::Error> {
    let admin = Admin {
        id: Uuid::new_v4().to_string(),
        email: email.to_string(),
        password_hash: password_hash.to_string(),
        name: name.to_string(),
        created_at: Utc::now(),
    };

    sqlx::query(
        "INSERT INTO admins (id, email, password_hash, name, created_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&admin.id)
    .bind(&admin.email)
    .bind(&admin.password_hash)
    .bind(&admin.name)
    .bind(admin.created_at)
    .execute(db)
    .await?;

    Ok(admin)
}

pub async fn find_admin_by_email(
    db: &SqlitePool,
    email: &str,
) -> Result<Option<Admin>, sqlx::Error> {
    sqlx::query_as::<_, Admin>(
        "SELECT id, email, password_hash, name, created_at FROM admins WHERE email = ?",
    )
    .bind(email)
    .fetch_optional(db)
    .await
}

pub async fn find_admin_by_id(db: &SqlitePool, id: &str) -> Result<Option<Admin>, sqlx::Error> {
    sqlx::query_as::<_, Admin>(
        "SELECT id, email, password_hash, name, created_at FROM admins WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(db)
    .await
}
