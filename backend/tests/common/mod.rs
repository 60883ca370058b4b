#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{HeaderMap, Method, Request, StatusCode};
use edustream::api::router;
use edustream::config::Config;
use edustream::db::connect_in_memory;
use edustream::payment::MockPaymentGateway;
use edustream::services::accounts;
use edustream::state::AppState;
use serde_json::{Value, json};
use sqlx::SqlitePool;
use tower::ServiceExt;

pub const ADMIN_EMAIL: &str = "admin@edustream.test";
pub const ADMIN_PASSWORD: &str = "admin-pass-123";

pub struct TestApp {
    pub app: Router,
    pub db: SqlitePool,
    pub gateway: Arc<MockPaymentGateway>,
    pub config: Config,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestApp {
    pub async fn new() -> Self {
        let db = connect_in_memory().await.expect("Failed to create database");
        accounts::bootstrap_admin(&db, ADMIN_EMAIL, ADMIN_PASSWORD)
            .await
            .expect("Failed to bootstrap admin");

        let config = Config::for_tests();
        let gateway = Arc::new(MockPaymentGateway::new());
        let state = AppState {
            db: db.clone(),
            config: Arc::new(config.clone()),
            gateway: gateway.clone(),
            http: reqwest::Client::new(),
        };

        Self {
            app: router(state),
            db,
            gateway,
            config,
        }
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        self.send(builder.body(body).expect("request")).await
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.app.clone().oneshot(request).await.expect("response");
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };

        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> TestResponse {
        self.request(Method::GET, uri, token, None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> TestResponse {
        self.request(Method::POST, uri, token, Some(body)).await
    }

    /// Registers a student and returns its token.
    pub async fn student_token(&self, email: &str) -> String {
        let res = self
            .post(
                "/api/v1/auth/register",
                None,
                json!({ "email": email, "password": "student-pass", "name": "Test Student" }),
            )
            .await;
        assert_eq!(res.status, StatusCode::CREATED, "register failed: {}", res.body);
        res.body["data"]["token"].as_str().expect("token").to_string()
    }

    pub async fn admin_token(&self) -> String {
        let res = self
            .post(
                "/api/v1/admin/auth/login",
                None,
                json!({ "email": ADMIN_EMAIL, "password": ADMIN_PASSWORD }),
            )
            .await;
        assert_eq!(res.status, StatusCode::OK, "admin login failed: {}", res.body);
        res.body["data"]["token"].as_str().expect("token").to_string()
    }

    /// Creates a course through the admin API and returns its id.
    pub async fn create_course(&self, admin: &str, subject: &str, is_free: bool, price: i64) -> String {
        let res = self
            .post(
                "/api/v1/admin/courses",
                Some(admin),
                json!({
                    "subject": subject,
                    "class": "10",
                    "description": format!("{subject} for class 10"),
                    "tags": ["boards"],
                    "is_free": is_free,
                    "price": price
                }),
            )
            .await;
        assert_eq!(res.status, StatusCode::CREATED, "create course failed: {}", res.body);
        res.body["data"]["id"].as_str().expect("id").to_string()
    }
}
