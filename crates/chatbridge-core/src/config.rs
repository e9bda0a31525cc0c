//! Bridge configuration persistence and service endpoints.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

pub const DEFAULT_HOST_URL: &str = "https://chat.openai.com";
pub const DEFAULT_MODEL: &str = "text-davinci-002-render";
pub const DEFAULT_PORT: u16 = 3003;

/// Google rejects sign-in from embedded webviews, so the embedded session
/// presents itself as a mobile browser.
pub const ANDROID_USER_AGENT: &str = "Mozilla/5.0 (Linux; Android 13; SM-N981B Build/TP1A.220624.014) AppleWebKit/537.36 (KHTML, like Gecko) Version/4.0 Chrome/108.0.5359.128 Mobile Safari/537.36 [FB_IAB/Orca-Android;FBAV/392.0.0.12.106;]";
pub const IOS_USER_AGENT: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 10_3 like Mac OS X) AppleWebKit/602.1.50 (KHTML, like Gecko) CriOS/90.0.2924.75 Mobile/14E5239e Safari/602.1";

/// Mobile user agent matching the platform family of `os`
/// (a `std::env::consts::OS` value).
pub fn user_agent_for(os: &str) -> &'static str {
    match os {
        "ios" | "macos" => IOS_USER_AGENT,
        _ => ANDROID_USER_AGENT,
    }
}

/// URLs of the chat service, all derived from one host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub host: String,
    pub chat_page: String,
    pub login_page: String,
    pub prompt_endpoint: String,
}

impl Endpoints {
    pub fn new(host_url: &str) -> Self {
        let host = host_url.trim_end_matches('/').to_string();
        Self {
            chat_page: format!("{}/chat", host),
            login_page: format!("{}/auth/login", host),
            prompt_endpoint: format!("{}/backend-api/conversation", host),
            host,
        }
    }
}

impl Default for Endpoints {
    fn default() -> Self {
        Self::new(DEFAULT_HOST_URL)
    }
}

/// Stored bridge configuration (persisted to `chatbridge.json`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub host_url: String,
    pub model: String,
    pub user_agent: String,
    /// Deadline for direct (host-side) prompt requests.
    pub request_timeout_ms: u64,
    /// Deadline for streamed prompt requests, enforced inside the page.
    pub streamed_request_timeout_ms: u64,
    pub animation_duration_ms: u64,
    /// The capacity notice renders after load, so the affordance is removed late.
    pub theme_switcher_delay_ms: u64,
    pub capacity_recheck_delay_ms: u64,
    /// `None` keeps retrying for as long as the capacity notice reappears.
    pub capacity_retry_limit: Option<u32>,
    pub port: u16,
    /// Credential file; relative paths resolve against the data directory.
    pub credential_file: PathBuf,
    /// Path to config file (not serialized).
    #[serde(skip)]
    pub config_path: PathBuf,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            host_url: DEFAULT_HOST_URL.into(),
            model: DEFAULT_MODEL.into(),
            user_agent: user_agent_for(std::env::consts::OS).into(),
            request_timeout_ms: 30_000,
            streamed_request_timeout_ms: 15_000,
            animation_duration_ms: 600,
            theme_switcher_delay_ms: 200,
            capacity_recheck_delay_ms: 3_000,
            capacity_retry_limit: None,
            port: DEFAULT_PORT,
            credential_file: PathBuf::from("credential.json"),
            config_path: PathBuf::new(),
        }
    }
}

impl BridgeConfig {
    /// Load config from `chatbridge.json` in `data_dir`, falling back to
    /// defaults, then apply environment overrides.
    pub fn load(data_dir: &Path) -> Self {
        Self::load_file(&data_dir.join("chatbridge.json"))
    }

    /// Load an explicit config file. Relative paths inside it resolve
    /// against the file's directory.
    pub fn load_file(config_path: &Path) -> Self {
        let data_dir = config_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let mut config: BridgeConfig = std::fs::read_to_string(config_path)
            .ok()
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default();

        config.config_path = config_path.to_path_buf();
        if config.credential_file.is_relative() {
            config.credential_file = data_dir.join(&config.credential_file);
        }
        config.apply_env();
        config
    }

    fn apply_env(&mut self) {
        if let Ok(host) = std::env::var("CHATBRIDGE_HOST_URL") {
            self.host_url = host;
        }
        if let Ok(model) = std::env::var("CHATBRIDGE_MODEL") {
            self.model = model;
        }
        if let Some(ms) = env_u64("CHATBRIDGE_REQUEST_TIMEOUT_MS") {
            self.request_timeout_ms = ms;
        }
        if let Some(ms) = env_u64("CHATBRIDGE_STREAM_TIMEOUT_MS") {
            self.streamed_request_timeout_ms = ms;
        }
        if let Some(port) = std::env::var("PORT").ok().and_then(|p| p.parse().ok()) {
            self.port = port;
        }
    }

    /// Save config to disk.
    pub fn save(&self) -> Result<(), std::io::Error> {
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        std::fs::write(&self.config_path, json)?;
        info!("Saved bridge config to {}", self.config_path.display());
        Ok(())
    }

    pub fn endpoints(&self) -> Endpoints {
        Endpoints::new(&self.host_url)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn streamed_request_timeout(&self) -> Duration {
        Duration::from_millis(self.streamed_request_timeout_ms)
    }

    pub fn animation_duration(&self) -> Duration {
        Duration::from_millis(self.animation_duration_ms)
    }

    pub fn theme_switcher_delay(&self) -> Duration {
        Duration::from_millis(self.theme_switcher_delay_ms)
    }

    pub fn capacity_recheck_delay(&self) -> Duration {
        Duration::from_millis(self.capacity_recheck_delay_ms)
    }
}

fn env_u64(key: &str) -> Option<u64> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}
