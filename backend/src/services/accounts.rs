use chrono::Utc;
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::info;

use crate::auth::{MIN_PASSWORD_LEN, Role, hash_password, issue_token, verify_password};
use crate::db::{admins, users};
use crate::error::AppError;
use crate::models::{Admin, LoginRequest, RegisterRequest, UpdateProfileRequest, User};
use crate::services::subscription::{self, SubscriptionStatus};

/// Student profile with its resolved subscription.
#[derive(Debug, Clone, Serialize)]
pub struct StudentProfile {
    #[serde(flatten)]
    pub user: User,
    pub subscription: SubscriptionStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct StudentSession {
    pub token: String,
    pub user: StudentProfile,
}

#[derive(Debug, Clone, Serialize)]
pub struct AdminSession {
    pub token: String,
    pub admin: Admin,
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn invalid_credentials() -> AppError {
    AppError::Unauthorized("Invalid email or password".to_string())
}

pub async fn register(
    db: &SqlitePool,
    jwt_secret: &str,
    req: RegisterRequest,
) -> Result<StudentSession, AppError> {
    let email = normalize_email(&req.email);
    let name = req.name.trim().to_string();

    if email.is_empty() || !email.contains('@') {
        return Err(AppError::BadRequest("A valid email is required".to_string()));
    }
    if name.is_empty() {
        return Err(AppError::BadRequest("name is required".to_string()));
    }
    if req.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::BadRequest(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }

    if users::find_user_by_email(db, &email).await?.is_some() {
        return Err(AppError::Conflict("Email is already registered".to_string()));
    }

    let user = users::insert_user(
        db,
        users::NewUser {
            email,
            password_hash: hash_password(&req.password)?,
            name,
            phone: non_blank(req.phone),
            class: non_blank(req.class),
        },
    )
    .await?;
    info!("registered student {}", user.id);

    let token = issue_token(jwt_secret, &user.id, &user.email, Role::Student)?;
    let subscription = subscription::evaluate_user(&user, Utc::now());

    Ok(StudentSession {
        token,
        user: StudentProfile { user, subscription },
    })
}

pub async fn login(
    db: &SqlitePool,
    jwt_secret: &str,
    req: LoginRequest,
) -> Result<StudentSession, AppError> {
    let email = normalize_email(&req.email);
    let mut user = users::find_user_by_email(db, &email)
        .await?
        .ok_or_else(invalid_credentials)?;

    if !verify_password(&req.password, &user.password_hash) {
        return Err(invalid_credentials());
    }

    let token = issue_token(jwt_secret, &user.id, &user.email, Role::Student)?;
    let subscription = subscription::resolve_for_user(db, &user, Utc::now()).await?;
    subscription.apply_to(&mut user);

    Ok(StudentSession {
        token,
        user: StudentProfile { user, subscription },
    })
}

pub async fn profile(db: &SqlitePool, user_id: &str) -> Result<StudentProfile, AppError> {
    let mut user = users::find_user_by_id(db, user_id)
        .await?
        .ok_or_else(|| AppError::not_found("User"))?;
    let subscription = subscription::resolve_for_user(db, &user, Utc::now()).await?;
    subscription.apply_to(&mut user);

    Ok(StudentProfile { user, subscription })
}

pub async fn update_profile(
    db: &SqlitePool,
    user_id: &str,
    mut req: UpdateProfileRequest,
) -> Result<StudentProfile, AppError> {
    if let Some(name) = req.name.as_mut() {
        *name = name.trim().to_string();
        if name.is_empty() {
            return Err(AppError::BadRequest("name cannot be empty".to_string()));
        }
    }

    let user = users::update_profile(db, user_id, req)
        .await?
        .ok_or_else(|| AppError::not_found("User"))?;
    let subscription = subscription::evaluate_user(&user, Utc::now());

    Ok(StudentProfile { user, subscription })
}

pub async fn admin_login(
    db: &SqlitePool,
    jwt_secret: &str,
    req: LoginRequest,
) -> Result<AdminSession, AppError> {
    let email = normalize_email(&req.email);
    let admin = admins::find_admin_by_email(db, &email)
        .await?
        .ok_or_else(invalid_credentials)?;

    if !verify_password(&req.password, &admin.password_hash) {
        return Err(invalid_credentials());
    }

    let token = issue_token(jwt_secret, &admin.id, &admin.email, Role::Admin)?;
    Ok(AdminSession { token, admin })
}

pub async fn admin_profile(db: &SqlitePool, admin_id: &str) -> Result<Admin, AppError> {
    admins::find_admin_by_id(db, admin_id)
        .await?
        .ok_or_else(|| AppError::not_found("Admin"))
}

/// Creates the configured admin account on first start. Existing accounts
/// are left untouched.
pub async fn bootstrap_admin(
    db: &SqlitePool,
    email: &str,
    password: &str,
) -> Result<Option<Admin>, AppError> {
    let email = normalize_email(email);
    if admins::find_admin_by_email(db, &email).await?.is_some() {
        return Ok(None);
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::BadRequest(format!(
            "ADMIN_PASSWORD must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }

    let admin = admins::insert_admin(db, &email, &hash_password(password)?, "Administrator").await?;
    info!("bootstrapped admin account {}", admin.email);
    Ok(Some(admin))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::verify_token;
    use crate::db::orders::{self, NewOrder};
    use crate::db::connect_in_memory;
    use crate::models::OrderKind;
    use chrono::Duration;
    use crate::services::subscription::SubscriptionState;

    const SECRET: &str = "accounts-secret";

    fn registration(email: &str) -> RegisterRequest {
        RegisterRequest {
            email: email.to_string(),
            password: "hunter22".to_string(),
            name: " Ravi ".to_string(),
            phone: Some("  ".to_string()),
            class: Some("9".to_string()),
        }
    }

    #[tokio::test]
    async fn test_register_then_login() {
        let pool = connect_in_memory().await.expect("db");

        let session = register(&pool, SECRET, registration("  Ravi@Example.COM "))
            .await
            .expect("register");
        assert_eq!(session.user.user.email, "ravi@example.com");
        assert_eq!(session.user.user.name, "Ravi");
        assert_eq!(session.user.user.phone, None);
        assert_eq!(session.user.subscription.state, SubscriptionState::Trial);

        let claims = verify_token(SECRET, &session.token).expect("token");
        assert_eq!(claims.role, Role::Student);
        assert_eq!(claims.sub, session.user.user.id);

        let login_session = login(
            &pool,
            SECRET,
            LoginRequest {
                email: "RAVI@example.com".to_string(),
                password: "hunter22".to_string(),
            },
        )
        .await
        .expect("login");
        assert_eq!(login_session.user.user.id, session.user.user.id);
    }

    #[tokio::test]
    async fn test_register_validation() {
        let pool = connect_in_memory().await.expect("db");

        let mut short = registration("a@example.com");
        short.password = "123".to_string();
        assert!(matches!(register(&pool, SECRET, short).await, Err(AppError::BadRequest(_))));

        let mut no_name = registration("a@example.com");
        no_name.name = "   ".to_string();
        assert!(matches!(register(&pool, SECRET, no_name).await, Err(AppError::BadRequest(_))));

        register(&pool, SECRET, registration("a@example.com")).await.expect("first");
        assert!(matches!(
            register(&pool, SECRET, registration("A@example.com")).await,
            Err(AppError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_login_rejects_bad_credentials() {
        let pool = connect_in_memory().await.expect("db");
        register(&pool, SECRET, registration("b@example.com")).await.expect("register");

        let wrong = login(
            &pool,
            SECRET,
            LoginRequest {
                email: "b@example.com".to_string(),
                password: "nope-nope".to_string(),
            },
        )
        .await;
        assert!(matches!(wrong, Err(AppError::Unauthorized(_))));

        let unknown = login(
            &pool,
            SECRET,
            LoginRequest {
                email: "ghost@example.com".to_string(),
                password: "hunter22".to_string(),
            },
        )
        .await;
        assert!(matches!(unknown, Err(AppError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn test_admin_bootstrap_and_login() {
        let pool = connect_in_memory().await.expect("db");

        let created = bootstrap_admin(&pool, "Admin@Example.com", "s3cret-pass")
            .await
            .expect("bootstrap");
        assert!(created.is_some());
        assert!(bootstrap_admin(&pool, "admin@example.com", "other-pass")
            .await
            .expect("second bootstrap")
            .is_none());

        let session = admin_login(
            &pool,
            SECRET,
            LoginRequest {
                email: "admin@example.com".to_string(),
                password: "s3cret-pass".to_string(),
            },
        )
        .await
        .expect("admin login");
        assert_eq!(verify_token(SECRET, &session.token).expect("token").role, Role::Admin);

        let profile = admin_profile(&pool, &session.admin.id).await.expect("profile");
        assert_eq!(profile.email, "admin@example.com");
    }

    #[tokio::test]
    async fn test_update_profile_rejects_blank_name() {
        let pool = connect_in_memory().await.expect("db");
        let session = register(&pool, SECRET, registration("c@example.com")).await.expect("register");

        let result = update_profile(
            &pool,
            &session.user.user.id,
            UpdateProfileRequest {
                name: Some(" ".to_string()),
                phone: None,
                class: None,
            },
        )
        .await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));

        let updated = update_profile(
            &pool,
            &session.user.user.id,
            UpdateProfileRequest {
                name: None,
                phone: Some("98765".to_string()),
                class: Some("10".to_string()),
            },
        )
        .await
        .expect("update");
        assert_eq!(updated.user.class.as_deref(), Some("10"));
    }

    #[tokio::test]
    async fn test_profile_reflects_repaired_subscription() {
        let pool = connect_in_memory().await.expect("db");
        let session = register(&pool, SECRET, registration("d@example.com")).await.expect("register");
        let user_id = session.user.user.id.clone();
        let now = Utc::now();

        let order = orders::insert_order(
            &pool,
            orders::new_order_id(),
            NewOrder {
                user_id: user_id.clone(),
                kind: OrderKind::Subscription,
                course_id: None,
                amount: 99900,
                original_amount: 99900,
                discount: 0,
                promo_code: None,
            },
            None,
        )
        .await
        .expect("order");
        sqlx::query(
            "UPDATE orders SET status = 'paid', subscription_start_date = ?1, subscription_end_date = ?2 WHERE id = ?3",
        )
        .bind(now)
        .bind(now + Duration::days(30))
        .bind(&order.id)
        .execute(&pool)
        .await
        .expect("mark paid");

        let refreshed = profile(&pool, &user_id).await.expect("profile");
        assert!(refreshed.subscription.subscription_active);
        assert_eq!(refreshed.user.subscription_active, refreshed.subscription.subscription_active);
        assert_eq!(refreshed.user.subscription_end_date, refreshed.subscription.subscription_end_date);

        let login_session = login(
            &pool,
            SECRET,
            LoginRequest {
                email: "d@example.com".to_string(),
                password: "hunter22".to_string(),
            },
        )
        .await
        .expect("login");
        assert!(login_session.user.user.subscription_active);
        assert_eq!(login_session.user.subscription.state, SubscriptionState::Active);
    }
}
