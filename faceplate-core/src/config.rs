use crate::{Error, Result};
use once_cell::sync::Lazy;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// 内置的默认配置文件
pub const DEFAULT_CONFIG_TOML: &str = include_str!("../../configs/faceplate.toml");

static DEFAULT_CONFIG: Lazy<Result<AppConfig>> =
    Lazy::new(|| load_config_from_toml_str(DEFAULT_CONFIG_TOML));

/// 顶层应用配置
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub interface_name: String,
    pub mic: MicConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MicConfig {
    pub level_path: PathBuf,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl MicConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

fn default_poll_interval_ms() -> u64 {
    50
}

/// 用于解析 TOML 的临时结构
#[derive(Deserialize)]
struct AppConfigFile {
    server: ServerToml,
    network: NetworkToml,
    mic: MicConfig,
}

#[derive(Deserialize)]
struct ServerToml {
    bind_addr: String,
}

#[derive(Deserialize)]
struct NetworkToml {
    interface_name: String,
}

impl TryFrom<AppConfigFile> for AppConfig {
    type Error = Error;

    fn try_from(t: AppConfigFile) -> Result<Self> {
        let bind_addr = SocketAddr::from_str(&t.server.bind_addr).map_err(|e| {
            Error::InvalidConfig(format!("bind_addr '{}': {}", t.server.bind_addr, e))
        })?;
        if t.network.interface_name.trim().is_empty() {
            return Err(Error::InvalidConfig("interface_name must not be empty".into()));
        }
        Ok(AppConfig {
            bind_addr,
            interface_name: t.network.interface_name,
            mic: t.mic,
        })
    }
}

/// 从 TOML 字符串加载应用配置
pub fn load_config_from_toml_str(s: &str) -> Result<AppConfig> {
    let parsed: AppConfigFile = toml::from_str(s)?;
    AppConfig::try_from(parsed)
}

/// The configuration compiled into the binary.
pub fn default_config() -> Result<AppConfig> {
    DEFAULT_CONFIG
        .as_ref()
        .map(Clone::clone)
        .map_err(|e| Error::InvalidConfig(e.to_string()))
}
