use axum::{
    Json,
    extract::{Request, State},
    http::{HeaderMap, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use serde_json::json;

use super::{Accounts, CurrentUser, Role};
use crate::handler::AppState;

pub const SESSION_COOKIE: &str = "athenaeum_session";

pub fn session_token(headers: &HeaderMap) -> Option<String> {
    let raw = headers.get(header::COOKIE)?.to_str().ok()?;
    for pair in raw.split(';') {
        if let Some((name, value)) = pair.trim().split_once('=') {
            if name == SESSION_COOKIE {
                return Some(value.to_string());
            }
        }
    }
    None
}

pub fn session_cookie(token: &str, ttl_minutes: i64) -> String {
    format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        SESSION_COOKIE,
        token,
        ttl_minutes * 60
    )
}

pub fn clear_session_cookie() -> String {
    format!("{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0", SESSION_COOKIE)
}

/// Resolves the session cookie to a [`CurrentUser`] and stores it in request
/// extensions. API callers without a valid session get a 401; page requests
/// are redirected to the login form.
pub async fn require_auth(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let user = match session_token(req.headers()) {
        Some(token) => {
            let accounts = Accounts::new(state.db.connection());
            match accounts.session_user(&token).await {
                Ok(user) => user,
                Err(e) => {
                    tracing::error!("session lookup failed: {}", e);
                    None
                }
            }
        }
        None => None,
    };

    match user {
        Some(user) => {
            req.extensions_mut().insert(user);
            next.run(req).await
        }
        None => unauthorized(req.uri().path()),
    }
}

fn unauthorized(path: &str) -> Response {
    if path.starts_with("/api") {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "authentication required" })),
        )
            .into_response()
    } else {
        Redirect::to("/login").into_response()
    }
}

pub fn require_admin(user: &CurrentUser) -> Result<(), Response> {
    if user.role == Role::Admin {
        Ok(())
    } else {
        Err((
            StatusCode::FORBIDDEN,
            Json(json!({ "error": "admin access required" })),
        )
            .into_response())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn extracts_token_among_other_cookies() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; athenaeum_session=abc-123; lang=en"),
        );
        assert_eq!(session_token(&headers).as_deref(), Some("abc-123"));
    }

    #[test]
    fn missing_cookie_is_none() {
        let headers = HeaderMap::new();
        assert!(session_token(&headers).is_none());

        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("theme=dark"));
        assert!(session_token(&headers).is_none());
    }

    #[test]
    fn admin_gate() {
        let admin = CurrentUser {
            id: 1,
            username: "root".into(),
            role: Role::Admin,
            member_id: None,
        };
        let member = CurrentUser {
            id: 2,
            username: "reader".into(),
            role: Role::Member,
            member_id: Some(7),
        };
        assert!(require_admin(&admin).is_ok());
        assert!(require_admin(&member).is_err());
    }

    #[test]
    fn cookie_strings() {
        let set = session_cookie("tok", 60);
        assert!(set.contains("athenaeum_session=tok"));
        assert!(set.contains("Max-Age=3600"));
        assert!(set.contains("HttpOnly"));
        assert!(clear_session_cookie().contains("Max-Age=0"));
    }
}
