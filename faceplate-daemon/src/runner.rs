use faceplate_core::{
    config::AppConfig,
    mic_level::MicLevelMonitor,
    notifications::LogBus,
    traits::{ConnectionHandler, ConnectivitySource, UiAssetProvider},
    web_server::{self, AppState},
};
use std::sync::Arc;

/// 启动麦克风电平轮询，然后运行 Web 服务器直到出错
pub async fn run_settings_server(
    config: AppConfig,
    handler: Arc<dyn ConnectionHandler>,
    connectivity: Arc<dyn ConnectivitySource>,
    frontend: Arc<dyn UiAssetProvider>,
) -> anyhow::Result<()> {
    let (mic, mic_task) =
        MicLevelMonitor::spawn(config.mic.level_path.clone(), config.mic.poll_interval());

    let state = Arc::new(AppState {
        bus: Arc::new(LogBus),
        handler,
        connectivity,
        frontend,
        mic: Some(mic),
    });

    tracing::info!("📡 Runner: starting settings server...");
    let result = web_server::run_server(config.bind_addr, state).await;
    mic_task.abort();
    result?;
    Ok(())
}
