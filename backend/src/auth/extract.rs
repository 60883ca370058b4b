use axum::extract::{FromRequestParts, OptionalFromRequestParts};
use axum::http::header::{AUTHORIZATION, COOKIE};
use axum::http::request::Parts;

use crate::auth::token::{Claims, Role, TOKEN_TTL_HOURS, verify_token};
use crate::error::AppError;
use crate::state::AppState;

pub const STUDENT_COOKIE: &str = "token";
pub const ADMIN_COOKIE: &str = "admin_token";

/// Authenticated student, from a bearer token or the `token` cookie.
#[derive(Debug, Clone)]
pub struct StudentAuth(pub Claims);

/// Authenticated admin, from a bearer token or the `admin_token` cookie.
#[derive(Debug, Clone)]
pub struct AdminAuth(pub Claims);

impl FromRequestParts<AppState> for StudentAuth {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let claims = authenticate(parts, state, STUDENT_COOKIE)?;
        if claims.role != Role::Student {
            return Err(AppError::Forbidden("Student access required".to_string()));
        }
        Ok(StudentAuth(claims))
    }
}

impl FromRequestParts<AppState> for AdminAuth {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let claims = authenticate(parts, state, ADMIN_COOKIE)?;
        if claims.role != Role::Admin {
            return Err(AppError::Forbidden("Admin access required".to_string()));
        }
        Ok(AdminAuth(claims))
    }
}

/// Anonymous callers and non-student tokens both yield `None`.
impl OptionalFromRequestParts<AppState> for StudentAuth {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Option<Self>, Self::Rejection> {
        Ok(authenticate(parts, state, STUDENT_COOKIE)
            .ok()
            .filter(|claims| claims.role == Role::Student)
            .map(StudentAuth))
    }
}

fn authenticate(parts: &Parts, state: &AppState, cookie_name: &str) -> Result<Claims, AppError> {
    let token = bearer_token(parts)
        .or_else(|| cookie_value(parts, cookie_name))
        .ok_or_else(|| AppError::Unauthorized("Missing authentication token".to_string()))?;

    verify_token(&state.config.jwt_secret, &token)
}

fn bearer_token(parts: &Parts) -> Option<String> {
    let value = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    let token = value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))?
        .trim();
    (!token.is_empty()).then(|| token.to_string())
}

fn cookie_value(parts: &Parts, name: &str) -> Option<String> {
    parts
        .headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|header| header.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, value)| *key == name && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

/// `Set-Cookie` value carrying a freshly issued token.
pub fn session_cookie(name: &str, token: &str, secure: bool) -> String {
    let mut cookie = format!(
        "{}={}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}",
        name,
        token,
        TOKEN_TTL_HOURS * 3600
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// `Set-Cookie` value that expires the named cookie.
pub fn clear_cookie(name: &str) -> String {
    format!("{}=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0", name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts(headers: &[(&str, &str)]) -> Parts {
        let mut builder = Request::builder().uri("/");
        for (k, v) in headers {
            builder = builder.header(*k, *v);
        }
        builder.body(()).expect("request").into_parts().0
    }

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(
            bearer_token(&parts(&[("authorization", "Bearer abc.def")])).as_deref(),
            Some("abc.def")
        );
        assert_eq!(bearer_token(&parts(&[("authorization", "Basic xyz")])), None);
        assert_eq!(bearer_token(&parts(&[("authorization", "Bearer ")])), None);
        assert_eq!(bearer_token(&parts(&[])), None);
    }

    #[test]
    fn test_cookie_parsing() {
        let p = parts(&[("cookie", "theme=dark; token=jwt123; admin_token=adm")]);
        assert_eq!(cookie_value(&p, STUDENT_COOKIE).as_deref(), Some("jwt123"));
        assert_eq!(cookie_value(&p, ADMIN_COOKIE).as_deref(), Some("adm"));
        assert_eq!(cookie_value(&p, "missing"), None);
    }

    #[test]
    fn test_session_cookie_flags() {
        let cookie = session_cookie(STUDENT_COOKIE, "abc", true);
        assert!(cookie.starts_with("token=abc;"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("Max-Age=86400"));
        assert!(cookie.ends_with("; Secure"));

        assert!(clear_cookie(ADMIN_COOKIE).contains("Max-Age=0"));
    }
}
