mod common;

use std::time::Duration;

use axum::http::StatusCode;
use common::{TestApp, test_app};
use serde_json::Value;

/// Register an admin and a regular user; return (admin token, user token).
async fn setup(app: &TestApp) -> (String, String) {
    app.register_admin("root@x.com", "rootpw1").await;
    app.register("Alice", "alice@x.com", "secret1").await;
    (
        app.token("root@x.com", "rootpw1").await,
        app.token("alice@x.com", "secret1").await,
    )
}

async fn alice_id(app: &TestApp, admin: &str) -> String {
    let (_, users) = app.get("/api/admin/users", Some(admin)).await;
    users
        .as_array()
        .unwrap()
        .iter()
        .find(|u| u["email"] == "alice@x.com")
        .and_then(|u| u["id"].as_str())
        .unwrap()
        .to_string()
}

#[tokio::test]
async fn test_admin_endpoints_require_auth() {
    let app = test_app().await;

    for uri in ["/api/admin/dashboard", "/api/admin/users", "/api/admin/audit-logs"] {
        let (status, body) = app.get(uri, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{}", uri);
        assert_eq!(body["path"], uri);
    }
    let (status, _) = app.put("/api/admin/users/some-id/lock", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_endpoints_require_admin_role() {
    let app = test_app().await;
    let (_admin, user) = setup(&app).await;

    let (status, body) = app.get("/api/admin/users", Some(&user)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Forbidden");
    assert_eq!(
        body["message"],
        "You do not have permission to access this resource"
    );

    let (status, _) = app.get("/api/admin/dashboard", Some(&user)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app.put("/api/admin/users/x/unlock", Some(&user)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_admin_can_use_user_endpoints() {
    let app = test_app().await;
    let (admin, _user) = setup(&app).await;

    let (status, body) = app.get("/api/user/profile", Some(&admin)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["role"], "ADMIN");
}

#[tokio::test]
async fn test_list_users() {
    let app = test_app().await;
    let (admin, _user) = setup(&app).await;

    let (status, body) = app.get("/api/admin/users", Some(&admin)).await;
    assert_eq!(status, StatusCode::OK);

    let users = body.as_array().unwrap();
    assert_eq!(users.len(), 2);
    let alice = users.iter().find(|u| u["email"] == "alice@x.com").unwrap();
    assert_eq!(alice["name"], "Alice");
    assert_eq!(alice["role"], "USER");
    assert_eq!(alice["accountLocked"], false);
    assert!(alice.get("passwordHash").is_none());
}

#[tokio::test]
async fn test_lock_and_unlock() {
    let app = test_app().await;
    let (admin, _user) = setup(&app).await;
    let id = alice_id(&app, &admin).await;

    let (status, body) = app
        .put(&format!("/api/admin/users/{}/lock", id), Some(&admin))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "User account locked successfully");

    let (status, body) = app.login("alice@x.com", "secret1").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(
        body["message"],
        "Account locked due to multiple failed attempts. Try again later."
    );

    let (_, dashboard) = app.get("/api/admin/dashboard", Some(&admin)).await;
    assert_eq!(
        dashboard,
        serde_json::json!({ "totalUsers": 2, "activeUsers": 1, "lockedUsers": 1 })
    );

    let (status, body) = app
        .put(&format!("/api/admin/users/{}/unlock", id), Some(&admin))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "User account unlocked successfully");

    let (status, _) = app.login("alice@x.com", "secret1").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_admin_lock_outlasts_lock_duration() {
    let app = test_app().await;
    let (admin, _user) = setup(&app).await;
    let id = alice_id(&app, &admin).await;
    app.put(&format!("/api/admin/users/{}/lock", id), Some(&admin))
        .await;

    app.clock.advance(Duration::from_secs(60 * 60));
    let (status, _) = app.login("alice@x.com", "secret1").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // The first admin token has expired by now.
    let admin = app.token("root@x.com", "rootpw1").await;
    let (status, _) = app
        .put(&format!("/api/admin/users/{}/unlock", id), Some(&admin))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.login("alice@x.com", "secret1").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_unlock_clears_automatic_lock() {
    let app = test_app().await;
    let (admin, _user) = setup(&app).await;
    for _ in 0..5 {
        app.login("alice@x.com", "wrong-pw").await;
    }
    let id = alice_id(&app, &admin).await;

    let (status, _) = app
        .put(&format!("/api/admin/users/{}/unlock", id), Some(&admin))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.login("alice@x.com", "secret1").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_lock_unknown_user() {
    let app = test_app().await;
    let (admin, _user) = setup(&app).await;

    let (status, body) = app
        .put("/api/admin/users/does-not-exist/lock", Some(&admin))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "User not found");
    assert_eq!(body["path"], "/api/admin/users/does-not-exist/lock");
}

#[tokio::test]
async fn test_audit_logs_with_filters() {
    let app = test_app().await;
    let (admin, _user) = setup(&app).await;
    let id = alice_id(&app, &admin).await;
    app.put(&format!("/api/admin/users/{}/lock", id), Some(&admin))
        .await;

    // 2 registrations, 2 logins, 1 admin lock
    app.audit_logs_eventually(5).await;

    let (status, body) = app.get("/api/admin/audit-logs", Some(&admin)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 5);

    let (_, body) = app
        .get("/api/admin/audit-logs?action=ADMIN_LOCK", Some(&admin))
        .await;
    let records = body.as_array().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["username"], "root@x.com");
    assert_eq!(
        records[0]["endpoint"],
        Value::String(format!("/api/admin/users/{}/lock", id))
    );

    let (_, body) = app
        .get("/api/admin/audit-logs?username=alice@x.com", Some(&admin))
        .await;
    let mut actions: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|r| r["action"].as_str())
        .collect();
    actions.sort_unstable();
    assert_eq!(actions, vec!["LOGIN_SUCCESS", "REGISTER_SUCCESS"]);
}

#[tokio::test]
async fn test_audit_logs_reject_unknown_action() {
    let app = test_app().await;
    let (admin, _user) = setup(&app).await;

    let (status, body) = app
        .get("/api/admin/audit-logs?action=NOT_AN_ACTION", Some(&admin))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Validation Error");
    assert_eq!(body["message"], "action: unknown audit action NOT_AN_ACTION");
    assert_eq!(body["path"], "/api/admin/audit-logs");

    let (status, _) = app
        .get("/api/admin/audit-logs?action=login_success", Some(&admin))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
