#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use rolegate::auth::IpExtractor;
use rolegate::clock::ManualClock;
use rolegate::db::{AuditLogRecord, Database};
use rolegate::{SecurityPolicy, ServerConfig, create_app};
use serde_json::{Value, json};
use tower::ServiceExt;

pub const JWT_SECRET: &[u8] = b"test-jwt-secret-that-is-long-enough";
pub const IP_HEADER: &str = "x-forwarded-for";

pub struct TestApp {
    pub router: Router,
    pub db: Database,
    pub clock: Arc<ManualClock>,
    next_ip: AtomicU32,
}

pub async fn test_app() -> TestApp {
    test_app_with(SecurityPolicy::default()).await
}

pub async fn test_app_with(policy: SecurityPolicy) -> TestApp {
    let clock = Arc::new(ManualClock::new());
    let db = Database::open_with_clock(":memory:", clock.clone())
        .await
        .expect("Failed to open test database");

    let config = ServerConfig {
        db: db.clone(),
        jwt_secret: JWT_SECRET.to_vec(),
        policy,
        ip_extractor: Some(IP_HEADER.parse::<IpExtractor>().unwrap()),
        clock: clock.clone(),
    };

    TestApp {
        router: create_app(&config),
        db,
        clock,
        next_ip: AtomicU32::new(1),
    }
}

impl TestApp {
    /// A client address no other request in this test has used, so the
    /// login rate limit never gets in the way of unrelated tests.
    pub fn fresh_ip(&self) -> String {
        let n = self.next_ip.fetch_add(1, Ordering::SeqCst);
        format!("10.0.{}.{}", n / 256, n % 256)
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    pub async fn request(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
        ip: &str,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(IP_HEADER, ip)
            .header("user-agent", "rolegate-tests");
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.send(request).await
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        let ip = self.fresh_ip();
        self.request("GET", uri, token, None, &ip).await
    }

    pub async fn put(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        let ip = self.fresh_ip();
        self.request("PUT", uri, token, None, &ip).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        let ip = self.fresh_ip();
        self.request("POST", uri, token, Some(body), &ip).await
    }

    pub async fn register(&self, name: &str, email: &str, password: &str) -> (StatusCode, Value) {
        self.post(
            "/api/auth/register",
            None,
            json!({ "name": name, "email": email, "password": password }),
        )
        .await
    }

    pub async fn register_admin(&self, email: &str, password: &str) -> (StatusCode, Value) {
        self.post(
            "/api/auth/register",
            None,
            json!({ "name": "Admin", "email": email, "password": password, "role": "ADMIN" }),
        )
        .await
    }

    pub async fn login(&self, email: &str, password: &str) -> (StatusCode, Value) {
        self.post(
            "/api/auth/login",
            None,
            json!({ "email": email, "password": password }),
        )
        .await
    }

    /// Log in and return the access token, panicking on failure.
    pub async fn token(&self, email: &str, password: &str) -> String {
        let (status, body) = self.login(email, password).await;
        assert_eq!(status, StatusCode::OK, "login failed: {}", body);
        body["accessToken"].as_str().unwrap().to_string()
    }

    /// Wait for fire-and-forget audit writes to land.
    pub async fn audit_logs_eventually(&self, at_least: usize) -> Vec<AuditLogRecord> {
        let mut records = Vec::new();
        for _ in 0..100 {
            records = self.db.audit_logs().list_all().await.unwrap();
            if records.len() >= at_least {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        records
    }
}
