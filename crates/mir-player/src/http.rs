use crate::core::PlayerEvent;
use crate::view::ViewManager;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::get,
    Router,
};
use mir_proto::protocol::{Command, HistoryEntry, PlayerView, API_VERSION};
use serde::Serialize;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tower_http::cors::CorsLayer;
use tracing::{error, info};

#[derive(Clone)]
pub struct HttpState {
    view: Arc<ViewManager>,
    event_tx: mpsc::Sender<PlayerEvent>,
}

#[derive(Serialize)]
struct ApiState {
    api_version: u32,
    #[serde(flatten)]
    view: PlayerView,
}

pub fn router(view: Arc<ViewManager>, event_tx: mpsc::Sender<PlayerEvent>) -> Router {
    let app_state = HttpState { view, event_tx };

    Router::new()
        .route("/api/state", get(get_state))
        .route("/api/history", get(get_history))
        .route("/api/toggle", get(toggle).post(toggle))
        .route("/api/volume/:percent", get(set_volume).post(set_volume))
        .route("/api/skip/back", get(skip_back).post(skip_back))
        .route("/api/skip/forward", get(skip_forward).post(skip_forward))
        .route("/api/history/toggle", get(toggle_history).post(toggle_history))
        .route("/api/close", get(close).post(close))
        .layer(CorsLayer::permissive())
        .with_state(app_state)
}

pub fn start_server(
    bind_address: String,
    port: u16,
    view: Arc<ViewManager>,
    event_tx: mpsc::Sender<PlayerEvent>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let app = router(view, event_tx);

        let addr = format!("{}:{}", bind_address, port);
        let listener = match TcpListener::bind(&addr).await {
            Ok(l) => l,
            Err(e) => {
                error!("Failed to bind HTTP server to {}: {}", addr, e);
                return;
            }
        };

        info!("HTTP API server listening on http://{}", addr);

        if let Err(e) = axum::serve(listener, app).await {
            error!("HTTP server error: {}", e);
        }
    })
}

async fn forward(state: &HttpState, cmd: Command) -> StatusCode {
    info!("HTTP API: {:?}", cmd);
    if state.event_tx.send(PlayerEvent::Command(cmd)).await.is_err() {
        error!("Failed to forward command, player loop is gone");
        return StatusCode::SERVICE_UNAVAILABLE;
    }
    StatusCode::OK
}

async fn get_state(State(state): State<HttpState>) -> Json<ApiState> {
    Json(ApiState {
        api_version: API_VERSION,
        view: state.view.snapshot().await,
    })
}

async fn get_history(State(state): State<HttpState>) -> Json<Vec<HistoryEntry>> {
    Json(state.view.history().await)
}

async fn toggle(State(state): State<HttpState>) -> StatusCode {
    forward(&state, Command::TogglePlay).await
}

async fn set_volume(State(state): State<HttpState>, Path(percent): Path<u8>) -> StatusCode {
    if percent > 100 {
        return StatusCode::BAD_REQUEST;
    }
    forward(&state, Command::SetVolume { percent }).await
}

async fn skip_back(State(state): State<HttpState>) -> StatusCode {
    forward(&state, Command::SkipBack).await
}

async fn skip_forward(State(state): State<HttpState>) -> StatusCode {
    forward(&state, Command::SkipForward).await
}

async fn toggle_history(State(state): State<HttpState>) -> StatusCode {
    forward(&state, Command::ToggleHistory).await
}

async fn close(State(state): State<HttpState>) -> StatusCode {
    forward(&state, Command::Close).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn app() -> (Router, mpsc::Receiver<PlayerEvent>) {
        let view = Arc::new(ViewManager::new("Radio MIR", "Live broadcast", 60));
        let (tx, rx) = mpsc::channel(8);
        (router(view, tx), rx)
    }

    fn req(method: &str, uri: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn test_state_returns_view_json() {
        let (app, _rx) = app();
        let resp = app.oneshot(req("GET", "/api/state")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["api_version"], API_VERSION);
        assert_eq!(json["title"], "Radio MIR");
        assert_eq!(json["volume_label"], "60%");
    }

    #[tokio::test]
    async fn test_commands_are_forwarded() {
        let (app, mut rx) = app();
        let cases = [
            ("POST", "/api/toggle", Command::TogglePlay),
            ("GET", "/api/volume/35", Command::SetVolume { percent: 35 }),
            ("POST", "/api/skip/back", Command::SkipBack),
            ("POST", "/api/skip/forward", Command::SkipForward),
            ("GET", "/api/history/toggle", Command::ToggleHistory),
            ("POST", "/api/close", Command::Close),
        ];
        for (method, uri, expected) in cases {
            let resp = app.clone().oneshot(req(method, uri)).await.unwrap();
            assert_eq!(resp.status(), StatusCode::OK, "{} {}", method, uri);
            match rx.recv().await {
                Some(PlayerEvent::Command(cmd)) => assert_eq!(cmd, expected),
                other => panic!("unexpected event {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn test_volume_out_of_range_is_rejected() {
        let (app, mut rx) = app();
        let resp = app.oneshot(req("POST", "/api/volume/150")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_closed_player_loop_is_unavailable() {
        let (app, rx) = app();
        drop(rx);
        let resp = app.oneshot(req("POST", "/api/toggle")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
