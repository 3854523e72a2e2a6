mod runner;

use anyhow::Context;
use faceplate_core::config::{self, AppConfig};
use faceplate_core::traits::{ConnectionHandler, ConnectivitySource, UiAssetProvider};
use std::sync::Arc;

// 如果没有选择任何连接处理器，编译失败
#[cfg(not(any(feature = "handler_mock", feature = "handler_nmdbus")))]
compile_error!("No handler feature selected. Please choose one, e.g., --features handler_nmdbus");

type Handler = (Arc<dyn ConnectionHandler>, Arc<dyn ConnectivitySource>);

// --- 1. 选择连接处理器 (NetworkManager 优先) ---
#[cfg(feature = "handler_nmdbus")]
fn get_handler(config: &AppConfig) -> Handler {
    tracing::info!("🚀 Using NetworkManager D-Bus handler on {}", config.interface_name);
    let handler = Arc::new(faceplate_core::handlers::nmdbus::NmDbusHandler::new(
        config.interface_name.clone(),
    ));
    (handler.clone(), handler)
}

#[cfg(all(feature = "handler_mock", not(feature = "handler_nmdbus")))]
fn get_handler(_config: &AppConfig) -> Handler {
    tracing::info!("🚀 Using Mock handler");
    let handler = Arc::new(faceplate_core::handlers::mock::MockHandler::new());
    (handler.clone(), handler)
}

// --- 2. 选择前端实现 ---
#[cfg(feature = "frontend_disk")]
fn get_frontend() -> Arc<dyn UiAssetProvider> {
    tracing::info!("💿 Frontend: Disk Provider selected (for local development)");
    Arc::new(faceplate_core::frontends::provider_disk::DiskFrontend::new("ui"))
}

#[cfg(not(feature = "frontend_disk"))]
fn get_frontend() -> Arc<dyn UiAssetProvider> {
    tracing::info!("📦 Frontend: Embed Provider selected");
    Arc::new(faceplate_core::frontends::provider_embed::EmbedFrontend::new())
}

/// Loads the file named by `FACEPLATE_CONFIG`, or the built-in default.
async fn load_config() -> anyhow::Result<AppConfig> {
    match std::env::var("FACEPLATE_CONFIG") {
        Ok(path) => {
            let text = tokio::fs::read_to_string(&path)
                .await
                .with_context(|| format!("Failed to read config file {}", path))?;
            config::load_config_from_toml_str(&text)
                .with_context(|| format!("Failed to parse config file {}", path))
        }
        Err(_) => config::default_config().context("Built-in config is invalid"),
    }
}

async fn run() -> anyhow::Result<()> {
    let config = load_config().await?;
    let (handler, connectivity) = get_handler(&config);
    let frontend = get_frontend();
    runner::run_settings_server(config, handler, connectivity, frontend).await
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. 初始化日志（这是入口点的职责）
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // 2. 处理顶层错误
    if let Err(e) = run().await {
        tracing::error!("❌ Faceplate settings failed: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}
