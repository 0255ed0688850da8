//! HTTP client tests against a mock focus backend.

use std::sync::Arc;
use std::time::Duration;

use deepfocus_core::session::{SessionOutcome, SessionStatus, StartSession};
use deepfocus_core::{ApiError, FocusApi, HttpFocusApi, SessionManager};
use mockito::Matcher;
use serde_json::json;

fn client(server: &mockito::Server, token: Option<&str>) -> HttpFocusApi {
    HttpFocusApi::new(
        &server.url(),
        token.map(str::to_string),
        Duration::from_secs(5),
    )
    .unwrap()
}

fn start_request() -> StartSession {
    StartSession {
        task_id: Some("task-7".into()),
        goal_id: None,
        duration: 25,
        ambient_mode: "brown".into(),
    }
}

#[tokio::test]
async fn start_posts_camel_case_body_with_bearer_token() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/focus/start")
        .match_header("authorization", "Bearer secret")
        .match_body(Matcher::Json(json!({
            "taskId": "task-7",
            "duration": 25,
            "ambientMode": "brown"
        })))
        .with_status(201)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "id": "abc",
                "taskId": "task-7",
                "startTime": "2026-10-19T09:00:00Z",
                "plannedDuration": 25,
                "ambientMode": "brown",
                "status": "active"
            })
            .to_string(),
        )
        .create_async()
        .await;

    let api = client(&server, Some("secret"));
    let session = api.start(start_request()).await.unwrap();

    mock.assert_async().await;
    assert_eq!(session.id, "abc");
    assert_eq!(session.status, SessionStatus::Active);
    assert_eq!(session.planned_duration, 25);
}

#[tokio::test]
async fn complete_sends_duration_and_reads_points() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("PUT", "/focus/abc/complete")
        .match_body(Matcher::Json(json!({"completedDuration": 25})))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "dpEarned": 15,
                "id": "abc",
                "status": "completed",
                "completedDuration": 25
            })
            .to_string(),
        )
        .create_async()
        .await;

    let completed = client(&server, None).complete("abc", 25).await.unwrap();

    mock.assert_async().await;
    assert_eq!(completed.dp_earned, 15);
    assert_eq!(completed.session.completed_duration, Some(25));
}

#[tokio::test]
async fn error_status_keeps_code_and_message() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/focus/start")
        .with_status(500)
        .with_body("database down")
        .create_async()
        .await;

    let err = client(&server, None).start(start_request()).await.unwrap_err();
    match err {
        ApiError::Status { status, message } => {
            assert_eq!(status, 500);
            assert_eq!(message, "database down");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn unanswered_request_times_out() {
    // Accepts connections into the backlog but never replies.
    let silent = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let base = format!("http://{}", silent.local_addr().unwrap());
    let api = HttpFocusApi::new(&base, None, Duration::from_millis(200)).unwrap();

    let err = api.start(start_request()).await.unwrap_err();
    assert!(matches!(err, ApiError::Timeout { .. }), "unexpected error: {err}");
    assert!(err.to_string().starts_with("Request timed out"));
}

#[tokio::test]
async fn malformed_json_is_a_decode_error() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/focus/history")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body("{not json")
        .create_async()
        .await;

    let err = client(&server, None).history().await.unwrap_err();
    assert!(matches!(err, ApiError::Decode(_)));
}

#[tokio::test]
async fn history_and_stats_parse() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/focus/history")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!([
                {"id": 1, "startTime": "2026-10-18T09:00:00Z", "duration": 25, "status": "completed"},
                {"id": 2, "startTime": "2026-10-19T09:00:00Z", "duration": 25, "status": "abandoned"}
            ])
            .to_string(),
        )
        .create_async()
        .await;
    server
        .mock("GET", "/focus/stats")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "totalSessions": 12,
                "totalMinutes": 300,
                "totalDP": 120,
                "averageSessionLength": 25.0,
                "streak": 4
            })
            .to_string(),
        )
        .create_async()
        .await;

    let api = client(&server, None);
    let history = api.history().await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].id, "1");
    assert_eq!(history[1].status, SessionStatus::Abandoned);

    let stats = api.stats().await.unwrap();
    assert_eq!(stats.total_sessions, 12);
    assert_eq!(stats.total_dp, 120);
}

#[tokio::test]
async fn manager_round_trip_over_http() {
    let mut server = mockito::Server::new_async().await;
    let start = server
        .mock("POST", "/focus/start")
        .with_status(201)
        .with_header("content-type", "application/json")
        .with_body(json!({"id": "s-42", "duration": 25}).to_string())
        .expect(1)
        .create_async()
        .await;
    let complete = server
        .mock("PUT", "/focus/s-42/complete")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({"dpEarned": 9, "id": "s-42", "status": "completed"}).to_string())
        .expect(1)
        .create_async()
        .await;
    server
        .mock("GET", "/focus/history")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body("[]")
        .create_async()
        .await;

    let api: Arc<dyn FocusApi> = Arc::new(client(&server, None));
    let mut sessions = SessionManager::new(Some(api));
    sessions.start_session(start_request());
    // Completion before the start reply is held, then sent with the real id.
    sessions.complete_session(25);
    let outcomes = sessions.settle().await;

    start.assert_async().await;
    complete.assert_async().await;
    assert!(outcomes.contains(&SessionOutcome::Completed {
        id: "s-42".into(),
        points_earned: 9
    }));
    assert_eq!(sessions.points_earned(), 9);
}
