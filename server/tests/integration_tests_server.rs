use std::sync::Arc;
use std::time::Duration as StdDuration;

use axum::{
    Router,
    body::Body,
    http::{HeaderMap, Request, StatusCode, header},
};
use chrono::{Duration, TimeZone, Utc};
use http_body_util::BodyExt; // For `collect`
use planner_server::config::Config;
use planner_server::database::in_memory_pool;
use planner_server::mailer::MemoryMailer;
use planner_server::routes::create_router;
use planner_server::state::{AppState, FixedClock};
use planner_server::storage::LocalStorage;
use serde_json::{Value, json};
use tempfile::TempDir;
use tower::ServiceExt; // For `oneshot`

struct TestApp {
    router: Router,
    mailer: Arc<MemoryMailer>,
    clock: Arc<FixedClock>,
    _uploads: TempDir,
}

/// Fresh router over an in-memory database, a temporary upload directory and
/// a clock pinned to Wednesday 2024-03-06 12:00 UTC.
async fn setup_app() -> TestApp {
    let pool = in_memory_pool().await.expect("Failed to open in-memory database");
    let uploads = tempfile::tempdir().expect("Failed to create upload dir");

    let mut config = Config::default();
    config.auth.argon2_memory_kib = 1024;
    config.auth.argon2_iterations = 1;
    config.auth.max_login_attempts = 3;

    let clock = Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2024, 3, 6, 12, 0, 0).unwrap()));
    let mailer = Arc::new(MemoryMailer::default());
    let storage = Arc::new(LocalStorage::new(uploads.path()));

    let state = AppState::new(pool, config, clock.clone(), storage, mailer.clone());
    TestApp {
        router: create_router(state),
        mailer,
        clock,
        _uploads: uploads,
    }
}

async fn send(
    app: &TestApp,
    method: &str,
    uri: &str,
    cookie: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, HeaderMap, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, headers, json)
}

/// `name=value` part of the session cookie set by a response.
fn session_cookie(headers: &HeaderMap) -> String {
    let raw = headers
        .get(header::SET_COOKIE)
        .expect("response should set a cookie")
        .to_str()
        .unwrap();
    raw.split(';').next().unwrap().to_string()
}

async fn register(app: &TestApp, email: &str, password: &str) -> String {
    let (status, headers, body) = send(
        app,
        "POST",
        "/api/auth/register",
        None,
        Some(json!({ "email": email, "username": "Tester", "password": password })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["user"]["email"], email);
    session_cookie(&headers)
}

async fn create_event(app: &TestApp, cookie: &str, payload: Value) -> Value {
    let (status, _, body) = send(app, "POST", "/api/events", Some(cookie), Some(payload)).await;
    assert_eq!(status, StatusCode::CREATED, "unexpected body: {}", body);
    body["event"].clone()
}

#[tokio::test]
async fn test_register_and_me() {
    let app = setup_app().await;
    let cookie = register(&app, "ada@example.org", "secret123").await;

    let (status, _, body) = send(&app, "GET", "/api/auth/me", Some(&cookie), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["email"], "ada@example.org");
    assert_eq!(body["username"], "Tester");

    let (status, _, _) = send(&app, "GET", "/api/auth/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_register_rejects_duplicates_and_weak_passwords() {
    let app = setup_app().await;
    register(&app, "ada@example.org", "secret123").await;

    let (status, _, _) = send(
        &app,
        "POST",
        "/api/auth/register",
        None,
        Some(json!({ "email": "ADA@example.org", "username": "Other", "password": "secret123" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _, body) = send(
        &app,
        "POST",
        "/api/auth/register",
        None,
        Some(json!({ "email": "bob@example.org", "username": "Bob", "password": "onlyletters" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("digit"));
}

#[tokio::test]
async fn test_login_lockout() {
    let app = setup_app().await;
    register(&app, "ada@example.org", "secret123").await;

    for _ in 0..3 {
        let (status, _, _) = send(
            &app,
            "POST",
            "/api/auth/login",
            None,
            Some(json!({ "email": "ada@example.org", "password": "wrong1234" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    let good = json!({ "email": "ada@example.org", "password": "secret123", "remember": true });
    let (status, _, _) = send(&app, "POST", "/api/auth/login", None, Some(good.clone())).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);

    app.clock.advance(Duration::seconds(901));
    let (status, headers, body) = send(&app, "POST", "/api/auth/login", None, Some(good)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["email"], "ada@example.org");
    assert!(
        headers
            .get(header::SET_COOKIE)
            .unwrap()
            .to_str()
            .unwrap()
            .contains("Max-Age")
    );
}

#[tokio::test]
async fn test_event_lifecycle_through_trash() {
    let app = setup_app().await;
    let cookie = register(&app, "ada@example.org", "secret123").await;

    let event = create_event(
        &app,
        &cookie,
        json!({ "title": "Write report", "date": "2024-03-05", "start_time": "09:00", "end_time": "10:30" }),
    )
    .await;
    let id = event["id"].as_i64().unwrap();
    assert_eq!(event["color"], "#6c5ce7");
    assert_eq!(event["priority"], 2);
    assert_eq!(event["col_type"], "plan");

    // No range given: the current Monday-to-Sunday week.
    let (status, _, listed) = send(&app, "GET", "/api/events", Some(&cookie), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed.as_array().unwrap().len(), 1);

    let (status, _, updated) = send(
        &app,
        "PUT",
        &format!("/api/events/{}", id),
        Some(&cookie),
        Some(json!({ "title": "Write report v2", "date": "2024-03-05", "start_time": "09:00", "end_time": "11:00", "completed": true })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["title"], "Write report v2");
    assert_eq!(updated["completed"], true);

    let (status, _, stats) = send(&app, "GET", "/api/stats?date=2024-03-05", Some(&cookie), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["total"], 1);
    assert_eq!(stats["completion_rate"], 100);
    assert_eq!(stats["total_hours"], 2.0);

    let (status, _, _) = send(&app, "DELETE", &format!("/api/events/{}", id), Some(&cookie), None).await;
    assert_eq!(status, StatusCode::OK);
    let (_, _, listed) = send(&app, "GET", "/api/events", Some(&cookie), None).await;
    assert!(listed.as_array().unwrap().is_empty());

    let (_, _, trash) = send(&app, "GET", "/api/trash", Some(&cookie), None).await;
    let entries = trash.as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["title"], "Write report v2");

    let trash_id = entries[0]["id"].as_i64().unwrap();
    let (status, _, restored) = send(
        &app,
        "POST",
        &format!("/api/trash/{}/restore", trash_id),
        Some(&cookie),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(restored["title"], "Write report v2");

    let (_, _, listed) = send(&app, "GET", "/api/events", Some(&cookie), None).await;
    assert_eq!(listed.as_array().unwrap().len(), 1);
    let (_, _, trash) = send(&app, "GET", "/api/trash", Some(&cookie), None).await;
    assert!(trash.as_array().unwrap().is_empty());

    let (status, _, _) = send(&app, "POST", "/api/trash/999/restore", Some(&cookie), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_invalid_event_is_rejected() {
    let app = setup_app().await;
    let cookie = register(&app, "ada@example.org", "secret123").await;

    let (status, _, body) = send(
        &app,
        "POST",
        "/api/events",
        Some(&cookie),
        Some(json!({ "title": "Backwards", "date": "2024-03-05", "start_time": "11:00", "end_time": "10:00" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_events_are_private() {
    let app = setup_app().await;
    let ada = register(&app, "ada@example.org", "secret123").await;
    let bob = register(&app, "bob@example.org", "secret123").await;

    let event = create_event(
        &app,
        &ada,
        json!({ "title": "Private", "date": "2024-03-05", "start_time": "09:00", "end_time": "10:00" }),
    )
    .await;

    let (status, _, _) = send(
        &app,
        "DELETE",
        &format!("/api/events/{}", event["id"]),
        Some(&bob),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (_, _, listed) = send(&app, "GET", "/api/events", Some(&bob), None).await;
    assert!(listed.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_generate_recurring_is_idempotent() {
    let app = setup_app().await;
    let cookie = register(&app, "ada@example.org", "secret123").await;

    create_event(
        &app,
        &cookie,
        json!({ "title": "Weekly sync", "date": "2024-03-04", "start_time": "10:00", "end_time": "10:30", "recur_rule": "weekly" }),
    )
    .await;

    let range = json!({ "start": "2024-03-01", "end": "2024-03-22" });
    let (status, _, body) = send(
        &app,
        "POST",
        "/api/events/generate-recurring",
        Some(&cookie),
        Some(range.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["created"], 2);

    let (_, _, body) = send(&app, "POST", "/api/events/generate-recurring", Some(&cookie), Some(range)).await;
    assert_eq!(body["created"], 0);

    let (_, _, listed) = send(
        &app,
        "GET",
        "/api/events?start=2024-03-01&end=2024-03-22",
        Some(&cookie),
        None,
    )
    .await;
    let dates: Vec<&str> = listed
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["date"].as_str().unwrap())
        .collect();
    assert_eq!(dates, vec!["2024-03-04", "2024-03-11", "2024-03-18"]);
}

#[tokio::test]
async fn test_restored_series_is_not_regenerated() {
    let app = setup_app().await;
    let cookie = register(&app, "ada@example.org", "secret123").await;

    let template = create_event(
        &app,
        &cookie,
        json!({ "title": "Weekly sync", "date": "2024-03-04", "start_time": "10:00", "end_time": "10:30", "recur_rule": "weekly" }),
    )
    .await;
    let range = json!({ "start": "2024-03-01", "end": "2024-03-22" });
    let (_, _, body) = send(
        &app,
        "POST",
        "/api/events/generate-recurring",
        Some(&cookie),
        Some(range.clone()),
    )
    .await;
    assert_eq!(body["created"], 2);

    let (status, _, body) = send(
        &app,
        "DELETE",
        &format!("/api/events/{}?series=true", template["id"]),
        Some(&cookie),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["archived"], 3);

    let (_, _, trash) = send(&app, "GET", "/api/trash", Some(&cookie), None).await;
    for entry in trash.as_array().unwrap() {
        let (status, _, _) = send(
            &app,
            "POST",
            &format!("/api/trash/{}/restore", entry["id"]),
            Some(&cookie),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (_, _, body) = send(&app, "POST", "/api/events/generate-recurring", Some(&cookie), Some(range)).await;
    assert_eq!(body["created"], 0);

    let (_, _, listed) = send(
        &app,
        "GET",
        "/api/events?start=2024-03-01&end=2024-03-22",
        Some(&cookie),
        None,
    )
    .await;
    let listed = listed.as_array().unwrap();
    assert_eq!(listed.len(), 3);
    for event in listed.iter().filter(|e| e["id"] != template["id"]) {
        assert_eq!(event["recur_parent_id"], template["id"]);
    }
}

#[tokio::test]
async fn test_search_events() {
    let app = setup_app().await;
    let cookie = register(&app, "ada@example.org", "secret123").await;

    for (title, start, end) in [("Team standup", "09:00", "09:15"), ("Lunch", "12:00", "13:00")] {
        create_event(
            &app,
            &cookie,
            json!({ "title": title, "date": "2024-03-05", "start_time": start, "end_time": end }),
        )
        .await;
    }

    let (status, _, found) = send(&app, "GET", "/api/events/search?q=STAND", Some(&cookie), None).await;
    assert_eq!(status, StatusCode::OK);
    let found = found.as_array().unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0]["title"], "Team standup");

    let (_, _, found) = send(
        &app,
        "GET",
        "/api/events/search?q=STAND&case_sensitive=1",
        Some(&cookie),
        None,
    )
    .await;
    assert!(found.as_array().unwrap().is_empty());

    let (status, _, body) = send(&app, "GET", "/api/events/search?q=(&regex=1", Some(&cookie), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_password_reset_flow() {
    let app = setup_app().await;
    let old_cookie = register(&app, "ada@example.org", "secret123").await;

    let (status, _, _) = send(
        &app,
        "POST",
        "/api/auth/forgot-password",
        None,
        Some(json!({ "email": "ada@example.org" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // Unknown addresses get the same answer.
    let (status, _, _) = send(
        &app,
        "POST",
        "/api/auth/forgot-password",
        None,
        Some(json!({ "email": "nobody@example.org" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let mut code = None;
    for _ in 0..50 {
        code = app.mailer.last_code_for("ada@example.org");
        if code.is_some() {
            break;
        }
        tokio::time::sleep(StdDuration::from_millis(10)).await;
    }
    let code = code.expect("a code should have been mailed");
    assert!(app.mailer.last_code_for("nobody@example.org").is_none());

    let (status, _, _) = send(
        &app,
        "POST",
        "/api/auth/reset-password",
        None,
        Some(json!({ "password": "newpass456" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, headers, _) = send(
        &app,
        "POST",
        "/api/auth/verify-code",
        None,
        Some(json!({ "email": "ada@example.org", "code": code })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let reset_cookie = session_cookie(&headers);

    let (status, _, _) = send(
        &app,
        "POST",
        "/api/auth/reset-password",
        Some(&reset_cookie),
        Some(json!({ "password": "newpass456" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // Sessions opened before the reset are gone.
    let (status, _, _) = send(&app, "GET", "/api/auth/me", Some(&old_cookie), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _, _) = send(
        &app,
        "POST",
        "/api/auth/login",
        None,
        Some(json!({ "email": "ada@example.org", "password": "newpass456" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // The code is single use.
    let (status, _, _) = send(
        &app,
        "POST",
        "/api/auth/verify-code",
        None,
        Some(json!({ "email": "ada@example.org", "code": code })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_device_sessions() {
    let app = setup_app().await;
    let first = register(&app, "ada@example.org", "secret123").await;
    let (_, headers, _) = send(
        &app,
        "POST",
        "/api/auth/login",
        None,
        Some(json!({ "email": "ada@example.org", "password": "secret123" })),
    )
    .await;
    let second = session_cookie(&headers);

    let (status, _, devices) = send(&app, "GET", "/api/auth/sessions", Some(&second), None).await;
    assert_eq!(status, StatusCode::OK);
    let devices = devices.as_array().unwrap();
    assert_eq!(devices.len(), 2);
    assert_eq!(devices.iter().filter(|d| d["is_current"] == true).count(), 1);

    let (status, _, _) = send(&app, "DELETE", "/api/auth/sessions/all-others", Some(&second), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _, _) = send(&app, "GET", "/api/auth/me", Some(&first), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _, _) = send(&app, "GET", "/api/auth/me", Some(&second), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _, _) = send(&app, "POST", "/api/auth/logout", Some(&second), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _, _) = send(&app, "GET", "/api/auth/me", Some(&second), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_notes_and_timer() {
    let app = setup_app().await;
    let cookie = register(&app, "ada@example.org", "secret123").await;

    let (status, _, note) = send(
        &app,
        "PUT",
        "/api/notes",
        Some(&cookie),
        Some(json!({ "date": "2024-03-05", "content": "Remember the milk" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (_, _, again) = send(
        &app,
        "PUT",
        "/api/notes",
        Some(&cookie),
        Some(json!({ "date": "2024-03-05", "content": "Remember the bread" })),
    )
    .await;
    assert_eq!(again["id"], note["id"]);

    let (_, _, notes) = send(&app, "GET", "/api/notes?date=2024-03-05", Some(&cookie), None).await;
    assert_eq!(notes.as_array().unwrap().len(), 1);
    assert_eq!(notes[0]["content"], "Remember the bread");

    let (_, _, dates) = send(&app, "GET", "/api/notes/dates", Some(&cookie), None).await;
    assert_eq!(dates, json!(["2024-03-05"]));

    let (status, _, record) = send(
        &app,
        "POST",
        "/api/timer/records",
        Some(&cookie),
        Some(json!({ "task_name": "Focus", "planned_minutes": 25, "actual_seconds": 1500, "date": "2024-03-06", "completed": true })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(record["task_name"], "Focus");

    let (_, _, stats) = send(&app, "GET", "/api/timer/stats", Some(&cookie), None).await;
    assert_eq!(stats, json!({ "total": 1, "completed": 1, "total_seconds": 1500 }));
}

#[tokio::test]
async fn test_avatar_upload_and_serving() {
    let app = setup_app().await;
    let cookie = register(&app, "ada@example.org", "secret123").await;

    let boundary = "XBOUNDARYX";
    let body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"avatar\"; filename=\"me.PNG\"\r\nContent-Type: image/png\r\n\r\nfake-png\r\n--{b}--\r\n",
        b = boundary
    );
    let request = Request::builder()
        .method("POST")
        .uri("/api/user/avatar")
        .header(header::COOKIE, &cookie)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", boundary),
        )
        .body(Body::from(body))
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let uploaded: Value = serde_json::from_slice(&bytes).unwrap();
    let name = uploaded["avatar"].as_str().unwrap().to_string();
    assert!(name.ends_with(".png"));

    let request = Request::builder()
        .uri(format!("/api/user/avatar/{}", name))
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], b"fake-png");
}

#[tokio::test]
async fn test_export_and_delete_account() {
    let app = setup_app().await;
    let cookie = register(&app, "ada@example.org", "secret123").await;
    create_event(
        &app,
        &cookie,
        json!({ "title": "Logged", "date": "2024-03-05", "start_time": "09:00", "end_time": "10:00", "col_type": "actual" }),
    )
    .await;

    let (status, headers, export) = send(&app, "GET", "/api/user/export", Some(&cookie), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(headers[header::CONTENT_DISPOSITION].to_str().unwrap().contains("attachment"));
    assert_eq!(export["events"].as_array().unwrap().len(), 1);
    assert!(export["events"][0].get("id").is_none());

    let request = Request::builder()
        .uri("/api/user/export/ical")
        .header(header::COOKIE, &cookie)
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let calendar = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(calendar.starts_with("BEGIN:VCALENDAR"));
    assert!(calendar.contains("SUMMARY:Logged"));

    let (status, _, _) = send(
        &app,
        "POST",
        "/api/user/delete-account",
        Some(&cookie),
        Some(json!({ "password": "wrong1234" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _, _) = send(
        &app,
        "POST",
        "/api/user/delete-account",
        Some(&cookie),
        Some(json!({ "password": "secret123" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _, _) = send(&app, "GET", "/api/auth/me", Some(&cookie), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _, _) = send(
        &app,
        "POST",
        "/api/auth/login",
        None,
        Some(json!({ "email": "ada@example.org", "password": "secret123" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
