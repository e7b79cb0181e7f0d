//! Shared harness for route tests: an in-memory database behind the real
//! router, plus helpers to seed rows and plant a signed-in session.
#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{HeaderMap, Request, StatusCode, header},
};
use chrono::{Duration, Utc};
use http_body_util::BodyExt;
use tower::ServiceExt;
use uuid::Uuid;

use warbler_api::middleware::SESSION_COOKIE;
use warbler_api::{AppState, AppStateInner, router};
use warbler_db::Database;

pub struct Response {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl Response {
    pub fn location(&self) -> Option<&str> {
        self.headers.get(header::LOCATION).and_then(|v| v.to_str().ok())
    }

    /// `name=value` of the session cookie set by this response, if any.
    pub fn session_cookie(&self) -> Option<String> {
        self.headers
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .filter_map(|v| v.split(';').next())
            .find(|pair| pair.starts_with(&format!("{}=", SESSION_COOKIE)))
            .map(str::to_string)
    }

    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).expect("response body is JSON")
    }
}

pub struct TestApp {
    pub state: AppState,
    router: Router,
}

impl TestApp {
    pub fn new() -> Self {
        let state: AppState = Arc::new(AppStateInner {
            db: Database::open_in_memory().expect("in-memory database"),
            secure_cookie: false,
        });
        let router = router(state.clone());
        Self { state, router }
    }

    pub fn db(&self) -> &Database {
        &self.state.db
    }

    /// Insert a user directly. The stored hash is not a real argon2 hash, so
    /// this user cannot log in through /login.
    pub fn seed_user(&self, username: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.db()
            .create_user(
                id,
                username,
                &format!("{}@test.com", username),
                "HASHED_PASSWORD",
                "/static/images/default-pic.png",
            )
            .expect("seed user");
        id
    }

    pub fn seed_message(&self, author: Uuid, text: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.db().insert_message(id, author, text).expect("seed message");
        id
    }

    /// Cookie header value for a fresh session signed in as `user_id`.
    pub fn session_for(&self, user_id: Uuid) -> String {
        self.session_expiring(user_id, Duration::days(1))
    }

    /// Cookie header value for a session that expires `ttl` from now
    /// (a negative `ttl` plants one that has already expired).
    pub fn session_expiring(&self, user_id: Uuid, ttl: Duration) -> String {
        let sid = Uuid::new_v4();
        self.db()
            .create_session(sid, user_id, Utc::now() + ttl)
            .expect("seed session");
        format!("{}={}", SESSION_COOKIE, sid)
    }

    pub async fn get(&self, uri: &str, cookie: Option<&str>) -> Response {
        let mut req = Request::builder().method("GET").uri(uri);
        if let Some(cookie) = cookie {
            req = req.header(header::COOKIE, cookie);
        }
        self.send(req.body(Body::empty()).unwrap()).await
    }

    pub async fn post_form(&self, uri: &str, form: &[(&str, &str)], cookie: Option<&str>) -> Response {
        let body = serde_urlencoded::to_string(form).expect("form encodes");

        let mut req = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(cookie) = cookie {
            req = req.header(header::COOKIE, cookie);
        }
        self.send(req.body(Body::from(body)).unwrap()).await
    }

    async fn send(&self, req: Request<Body>) -> Response {
        let resp = self.router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let headers = resp.headers().clone();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        Response {
            status,
            headers,
            body: String::from_utf8_lossy(&bytes).into_owned(),
        }
    }
}
