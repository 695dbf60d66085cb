// Integration tests for the operator console

use anyhow::Result;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use listening_effort::http::{create_router, AppState, OperatorCommand};
use listening_effort::session::{SessionState, SessionStatus};
use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tower::ServiceExt;

fn status(state: SessionState) -> SessionStatus {
    SessionStatus {
        state,
        ..Default::default()
    }
}

async fn body_json(response: axum::response::Response) -> Result<Value> {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
    Ok(serde_json::from_slice(&bytes)?)
}

fn post(uri: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn test_health_check() -> Result<()> {
    let (tx, _rx) = mpsc::channel(4);
    let (_status_tx, status_rx) = watch::channel(SessionStatus::default());
    let app = create_router(AppState::new(tx, status_rx));

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty())?)
        .await?;

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
    assert_eq!(&bytes[..], b"OK");
    Ok(())
}

#[tokio::test]
async fn test_status_reflects_latest_snapshot() -> Result<()> {
    let (tx, _rx) = mpsc::channel(4);
    let (status_tx, status_rx) = watch::channel(SessionStatus::default());
    let app = create_router(AppState::new(tx, status_rx));

    status_tx.send_replace(SessionStatus {
        state: SessionState::PlayingVideo,
        session_label: Some("2024-05-01_10-00-00_cafe".to_string()),
        challenge_number: Some(2),
        challenge_total: 5,
        videos_playing: 3,
        is_recording: true,
        ..Default::default()
    });

    let response = app
        .oneshot(Request::builder().uri("/session/status").body(Body::empty())?)
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await?;
    assert_eq!(json["state"], "PlayingVideo");
    assert_eq!(json["challenge_number"], 2);
    assert_eq!(json["challenge_total"], 5);
    assert_eq!(json["videos_playing"], 3);
    assert_eq!(json["is_recording"], true);
    Ok(())
}

#[tokio::test]
async fn test_ready_is_forwarded_when_waiting() -> Result<()> {
    let (tx, mut rx) = mpsc::channel(4);
    let (_status_tx, status_rx) = watch::channel(status(SessionState::WaitingForChallenges));
    let app = create_router(AppState::new(tx, status_rx));

    let response = app.oneshot(post("/session/ready")).await?;
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let json = body_json(response).await?;
    assert_eq!(json["command"], "ready");
    assert_eq!(json["status"], "queued");
    assert_eq!(rx.try_recv()?, OperatorCommand::Ready);
    Ok(())
}

#[tokio::test]
async fn test_commands_in_wrong_state_are_refused() -> Result<()> {
    let (tx, mut rx) = mpsc::channel(4);
    let (_status_tx, status_rx) = watch::channel(status(SessionState::PlayingVideo));
    let app = create_router(AppState::new(tx, status_rx));

    let response = app.clone().oneshot(post("/session/ready")).await?;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let json = body_json(response).await?;
    assert!(json["error"].as_str().unwrap().contains("PlayingVideo"));

    let response = app.oneshot(post("/session/stop-recording")).await?;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    assert!(rx.try_recv().is_err());
    Ok(())
}

#[tokio::test]
async fn test_stop_recording_without_loop_is_unavailable() -> Result<()> {
    let (tx, rx) = mpsc::channel(4);
    drop(rx);
    let (_status_tx, status_rx) = watch::channel(status(SessionState::RecordingResponse));
    let app = create_router(AppState::new(tx, status_rx));

    let response = app.oneshot(post("/session/stop-recording")).await?;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    Ok(())
}
