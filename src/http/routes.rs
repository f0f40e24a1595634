//! HTTP route definitions

use axum::{
    extract::State,
    http::{header, Method},
    response::Json,
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::app::AppState;
use crate::util::time::uptime_secs;
use crate::ws::handler::ws_handler;

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    let router = Router::new()
        .route("/health", get(health_handler))
        .route("/ws", get(ws_handler))
        .layer(TraceLayer::new_for_http());

    // CORS only when origins are configured (comma-separated in CLIENT_ORIGIN)
    let router = match state.config.client_origin.as_deref() {
        Some(origins) => router.layer(cors_layer(origins)),
        None => router,
    };

    router.with_state(state)
}

fn cors_layer(origins: &str) -> CorsLayer {
    let allowed_origins: Vec<header::HeaderValue> = origins
        .split(',')
        .filter_map(|s| s.trim().parse::<header::HeaderValue>().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_secs: u64,
    pub active_rooms: usize,
    pub queue_size: usize,
    pub connected_players: usize,
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        uptime_secs: uptime_secs(),
        active_rooms: state.registry.active_rooms(),
        queue_size: state.lifecycle.queue_size(),
        connected_players: state.lifecycle.connected_players(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::matchmaking::PlayerIdentity;
    use crate::store::ResultRecorder;
    use crate::ws::protocol::ClientMsg;
    use tokio::net::TcpListener;
    use tokio::sync::mpsc;

    async fn serve(state: AppState) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let router = build_router(state);
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn state() -> AppState {
        let config = Config::from_lookup(|key| match key {
            "JWT_SECRET" => Some("test-secret".to_string()),
            "CLIENT_ORIGIN" => Some("http://localhost:3000".to_string()),
            _ => None,
        })
        .unwrap();
        let (recorder, _results) = ResultRecorder::channel();
        AppState::new(config, recorder)
    }

    #[tokio::test]
    async fn test_health_reports_counts() {
        let state = state();

        let (tx, _rx) = mpsc::channel(8);
        let connection = state.lifecycle.connect(
            PlayerIdentity {
                player_id: 1,
                display_name: "ada".to_string(),
            },
            tx,
        );
        state
            .lifecycle
            .handle(1, connection, ClientMsg::JoinQueue)
            .await
            .unwrap();

        let base = serve(state).await;
        let health: HealthResponse = reqwest::get(format!("{base}/health"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();

        assert_eq!(health.status, "ok");
        assert_eq!(health.active_rooms, 0);
        assert_eq!(health.queue_size, 1);
        assert_eq!(health.connected_players, 1);
    }

    #[tokio::test]
    async fn test_ws_requires_upgrade() {
        let base = serve(state()).await;
        let response = reqwest::get(format!("{base}/ws?token=abc")).await.unwrap();
        assert!(response.status().is_client_error());
    }
}
