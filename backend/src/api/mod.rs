mod admin;
mod auth;
mod courses;
mod payments;

use axum::extract::{FromRequest, State};
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderValue, Method};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::Serialize;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

use crate::error::AppError;
use crate::state::AppState;

/// JSON body extractor whose rejections use the API error envelope.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
            message: None,
        }
    }

    pub fn with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            data,
            message: Some(message.into()),
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

pub fn router(state: AppState) -> Router {
    let cors = cors_layer(state.config.cors_origin.as_deref());

    let api = Router::new()
        .route("/health", get(health))
        // student auth
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/me", get(auth::me).put(auth::update_me))
        .route("/auth/subscription", get(auth::subscription))
        // admin auth
        .route("/admin/auth/login", post(auth::admin_login))
        .route("/admin/auth/logout", post(auth::admin_logout))
        .route("/admin/auth/me", get(auth::admin_me))
        // catalog
        .route("/courses", get(courses::list_courses))
        .route("/courses/{id}", get(courses::get_course))
        .route("/courses/{id}/topics", get(courses::list_topics))
        .route("/courses/{id}/content", get(courses::content))
        .route(
            "/courses/{id}/enroll",
            post(courses::enroll).delete(courses::unenroll),
        )
        .route("/enrollments", get(courses::enrollments))
        .route("/topics/{id}/stream", get(courses::stream_topic))
        // payments
        .route("/promo-codes/validate", post(payments::validate_promo))
        .route(
            "/payments/orders",
            get(payments::my_orders).post(payments::create_order),
        )
        .route("/payments/verify", post(payments::verify))
        .route("/payments/webhook", post(payments::webhook))
        // admin
        .route("/admin/courses", post(admin::create_course))
        .route(
            "/admin/courses/{id}",
            put(admin::update_course).delete(admin::delete_course),
        )
        .route("/admin/courses/{id}/topics", post(admin::create_topic))
        .route("/admin/courses/{id}/topics/order", put(admin::reorder_topics))
        .route(
            "/admin/topics/{id}",
            put(admin::update_topic).delete(admin::delete_topic),
        )
        .route(
            "/admin/promo-codes",
            get(admin::list_promo_codes).post(admin::create_promo_code),
        )
        .route(
            "/admin/promo-codes/{id}",
            put(admin::update_promo_code).delete(admin::delete_promo_code),
        )
        .route("/admin/stats", get(admin::stats))
        .route("/admin/students", get(admin::students))
        .route("/admin/orders", get(admin::orders));

    Router::new()
        .nest("/api/v1", api)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn cors_layer(origin: Option<&str>) -> CorsLayer {
    let Some(origin) = origin else {
        return CorsLayer::permissive();
    };

    match origin.parse::<HeaderValue>() {
        Ok(origin) => CorsLayer::new()
            .allow_origin(AllowOrigin::exact(origin))
            .allow_credentials(true)
            .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
            .allow_headers([AUTHORIZATION, CONTENT_TYPE]),
        Err(e) => {
            warn!("CORS_ORIGIN {:?} is not a valid header value ({}); cross-origin requests disabled", origin, e);
            CorsLayer::new()
        }
    }
}

#[derive(Serialize)]
struct Health {
    status: &'static str,
}

async fn health(State(state): State<AppState>) -> Result<ApiResponse<Health>, AppError> {
    sqlx::query("select 1").execute(&state.db).await.map_err(|err| {
        error!("health check failed: {}", err);
        AppError::Database(err)
    })?;
    Ok(ApiResponse::ok(Health { status: "ok" }))
}

/// Acknowledgement body for endpoints that return no data.
fn acknowledged(message: &str) -> ApiResponse<()> {
    ApiResponse::with_message((), message)
}
