use crate::credentials::{self, SecurityScheme};
use crate::mic_level::MicLevelMonitor;
use crate::network_connect::{self, ConnectPage, ConnectRequest, SubmitOutcome};
use crate::signal::{self, ConnectivityReading};
use crate::traits::{ConnectionHandler, ConnectivitySource, NotificationBus, UiAssetProvider};
use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

// The shared state for our web server.
// By using `Arc<dyn Trait>`, we can inject any implementation
// that satisfies the trait bounds.
pub type WebServerState = State<Arc<AppState>>;

pub struct AppState {
    pub bus: Arc<dyn NotificationBus>,
    pub handler: Arc<dyn ConnectionHandler>,
    pub connectivity: Arc<dyn ConnectivitySource>,
    pub frontend: Arc<dyn UiAssetProvider>,
    pub mic: Option<MicLevelMonitor>,
}

/// Builds the router used by the display shell.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/network/validate", post(api_validate))
        .route("/api/network/connect", post(api_connect))
        .route("/api/network/back", post(api_back))
        .route("/api/network/strength", get(api_strength))
        .route("/api/mic/level", get(api_mic_level))
        .route("/api/mic/listening", post(api_mic_listening))
        .route("/api/mic/listening/end", post(api_mic_listening_end))
        .fallback(get(serve_static_asset))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Starts the Axum web server and serves until it fails.
pub async fn run_server(addr: SocketAddr, state: Arc<AppState>) -> crate::Result<()> {
    let app = router(state);
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("🌐 Web server listening on {}", addr);
    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}

// --- Route Handlers ---

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ValidateRequest {
    security_type: SecurityScheme,
    password: String,
}

/// Lets the password field check input while the user types.
async fn api_validate(Json(payload): Json<ValidateRequest>) -> impl IntoResponse {
    let reason = credentials::rejection_reason(payload.security_type, &payload.password);
    Json(serde_json::json!({ "valid": reason.is_none(), "reason": reason }))
}

#[derive(Deserialize)]
struct ConnectBody {
    #[serde(flatten)]
    page: ConnectRequest,
    password: String,
}

/// 处理连接请求
/// 使用"发送并忘记"(Fire and Forget) 模式：校验通过后立即返回，
/// 实际的连接工作由处理器在后台完成。
async fn api_connect(
    State(state): WebServerState,
    Json(payload): Json<ConnectBody>,
) -> impl IntoResponse {
    tracing::debug!(connection = %payload.page.connection_name, "Handling /api/network/connect");
    let page = ConnectPage::new(payload.page, state.bus.clone(), state.handler.clone());
    match page.submit(&payload.password) {
        SubmitOutcome::Accepted => {
            (StatusCode::OK, Json(serde_json::json!({ "status": "connecting" }))).into_response()
        }
        SubmitOutcome::Rejected => {
            let reason = credentials::rejection_reason(page.security(), &payload.password)
                .unwrap_or("invalid password");
            (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(serde_json::json!({ "error": reason })),
            )
                .into_response()
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BackBody {
    #[serde(default)]
    is_start_up: bool,
}

async fn api_back(State(state): WebServerState, Json(payload): Json<BackBody>) -> impl IntoResponse {
    let navigated = network_connect::navigate_back(state.bus.as_ref(), payload.is_start_up);
    Json(serde_json::json!({ "navigated": navigated }))
}

#[derive(Deserialize)]
struct StrengthQuery {
    status: Option<String>,
}

/// Maps an explicit `status`, or the live reading, to the indicator values.
async fn api_strength(
    State(state): WebServerState,
    Query(query): Query<StrengthQuery>,
) -> impl IntoResponse {
    let reading = match query.status.as_deref() {
        Some(status) => ConnectivityReading::parse_lossy(status),
        None => state.connectivity.reading().await.unwrap_or_else(|e| {
            tracing::warn!("Connectivity reading failed: {}", e);
            ConnectivityReading::Unknown
        }),
    };
    let presentation = signal::present_strength(reading);
    Json(serde_json::json!({
        "status": reading.to_string(),
        "length": presentation.length,
        "opacity": presentation.opacity,
    }))
}

async fn api_mic_level(State(state): WebServerState) -> impl IntoResponse {
    let level = state.mic.as_ref().map_or(0, MicLevelMonitor::level);
    Json(serde_json::json!({ "level": level }))
}

/// Recording began: start polling the mic level.
async fn api_mic_listening(State(state): WebServerState) -> impl IntoResponse {
    if let Some(mic) = &state.mic {
        mic.listening_started();
    }
    StatusCode::NO_CONTENT
}

/// Recording ended: stop polling.
async fn api_mic_listening_end(State(state): WebServerState) -> impl IntoResponse {
    if let Some(mic) = &state.mic {
        mic.listening_ended();
    }
    StatusCode::NO_CONTENT
}

/// 处理静态资产的 Fallback 处理器
async fn serve_static_asset(State(state): WebServerState, uri: Uri) -> impl IntoResponse {
    let mut path = uri.path().trim_start_matches('/').to_string();

    // 如果路径为空 (即请求根目录 "/"), 则服务 "index.html"
    if path.is_empty() {
        path = "index.html".to_string();
    }

    match state.frontend.get_asset(&path).await {
        Ok((data, mime)) => Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, mime)
            .body(Body::from(data))
            .unwrap_or_else(|_| {
                (StatusCode::INTERNAL_SERVER_ERROR, "Failed to build response").into_response()
            }),
        Err(e) => {
            tracing::warn!("Failed to get asset: {} (Error: {})", path, e);
            (StatusCode::NOT_FOUND, "Not Found").into_response()
        }
    }
}
