//! Configuration types and loading.
//!
//! Config is loaded from a JSON file (e.g. `~/.linebridge/config.json`) and environment.
//! Secrets may live in the file but are normally supplied through environment variables.
//! [`RelaySettings`] is the resolved, validated form handed to the gateway and the relay.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_BACKEND_ENDPOINT: &str = "https://chat.intern-ai.org.cn/api/v1/chat/completions";
const DEFAULT_BACKEND_MODEL: &str = "internlm3-latest";
const DEFAULT_LINE_API_BASE: &str = "https://api.line.me";
const DEFAULT_LINE_DATA_API_BASE: &str = "https://api-data.line.me";
const DEFAULT_DESCRIBE_PROMPT: &str = "describe this image";

/// Accepted range for the content fetch and OCR timeouts, in seconds.
const TIMEOUT_RANGE_SECS: std::ops::RangeInclusive<u64> = 1..=120;

/// Accepted range for the backend call timeout, in seconds.
const BACKEND_TIMEOUT_RANGE_SECS: std::ops::RangeInclusive<u64> = 20..=30;

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Listener settings.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Messaging platform settings (LINE).
    #[serde(default)]
    pub channels: ChannelsConfig,

    /// Chat-completion backend settings.
    #[serde(default)]
    pub backend: BackendConfig,

    /// Image handling: which extraction strategy is deployed and its options.
    #[serde(default)]
    pub vision: VisionConfig,
}

/// Gateway bind, port, and webhook path.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayConfig {
    /// Port for HTTP (default 5000).
    #[serde(default = "default_gateway_port")]
    pub port: u16,

    /// Bind address (default "0.0.0.0"; the platform must be able to reach the webhook).
    #[serde(default = "default_gateway_bind")]
    pub bind: String,

    /// Path the platform POSTs webhook callbacks to (default "/callback").
    #[serde(default = "default_callback_path")]
    pub callback_path: String,
}

fn default_gateway_port() -> u16 {
    5000
}

fn default_gateway_bind() -> String {
    "0.0.0.0".to_string()
}

fn default_callback_path() -> String {
    "/callback".to_string()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_gateway_port(),
            bind: default_gateway_bind(),
            callback_path: default_callback_path(),
        }
    }
}

/// Per-channel config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelsConfig {
    #[serde(default)]
    pub line: LineChannelConfig,
}

/// LINE Messaging API config.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineChannelConfig {
    /// Channel secret used to verify X-Line-Signature. Overridden by LINE_CHANNEL_SECRET env.
    pub channel_secret: Option<String>,
    /// Channel access token for the reply and content APIs. Overridden by LINE_CHANNEL_ACCESS_TOKEN env.
    pub channel_access_token: Option<String>,
    #[serde(default = "default_line_api_base")]
    pub api_base: String,
    /// Host serving message content (images).
    #[serde(default = "default_line_data_api_base")]
    pub data_api_base: String,
    #[serde(default = "default_timeout_secs")]
    pub fetch_timeout_secs: u64,
}

fn default_line_api_base() -> String {
    DEFAULT_LINE_API_BASE.to_string()
}

fn default_line_data_api_base() -> String {
    DEFAULT_LINE_DATA_API_BASE.to_string()
}

fn default_timeout_secs() -> u64 {
    20
}

impl Default for LineChannelConfig {
    fn default() -> Self {
        Self {
            channel_secret: None,
            channel_access_token: None,
            api_base: default_line_api_base(),
            data_api_base: default_line_data_api_base(),
            fetch_timeout_secs: default_timeout_secs(),
        }
    }
}

/// Chat-completion backend (OpenAI-compatible `chat/completions`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendConfig {
    /// Full URL of the chat-completion endpoint.
    #[serde(default = "default_backend_endpoint")]
    pub endpoint: String,
    /// Bearer token. Overridden by BACKEND_API_TOKEN (or INTERNLM_API_TOKEN) env.
    pub api_token: Option<String>,
    /// Model id sent with every request.
    #[serde(default = "default_backend_model")]
    pub model: String,
    /// Request timeout in seconds (default 20).
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_backend_endpoint() -> String {
    DEFAULT_BACKEND_ENDPOINT.to_string()
}

fn default_backend_model() -> String {
    DEFAULT_BACKEND_MODEL.to_string()
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            endpoint: default_backend_endpoint(),
            api_token: None,
            model: default_backend_model(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// How images are turned into backend input. Fixed per deployment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ExtractionStrategyKind {
    /// Run local OCR and send the recognized text to the backend.
    #[default]
    LocalOcr,
    /// Send the image inline to a multimodal backend model and ask for a description.
    RemoteDescribe,
}

/// Vision / extraction config.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisionConfig {
    #[serde(default)]
    pub strategy: ExtractionStrategyKind,
    /// OCR binary (tesseract-compatible CLI). Used only with localOcr.
    #[serde(default = "default_ocr_command")]
    pub ocr_command: String,
    /// Recognition languages, `+`-separated (tesseract `-l` syntax).
    #[serde(default = "default_ocr_languages")]
    pub ocr_languages: String,
    #[serde(default = "default_ocr_timeout_secs")]
    pub ocr_timeout_secs: u64,
    /// Instruction sent along with the image. Used only with remoteDescribe.
    #[serde(default = "default_describe_prompt")]
    pub describe_prompt: String,
    /// Model for image requests; falls back to backend.model when unset.
    #[serde(default)]
    pub model: Option<String>,
}

fn default_ocr_command() -> String {
    "tesseract".to_string()
}

fn default_ocr_languages() -> String {
    "chi_sim+eng".to_string()
}

fn default_ocr_timeout_secs() -> u64 {
    30
}

fn default_describe_prompt() -> String {
    DEFAULT_DESCRIBE_PROMPT.to_string()
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            strategy: ExtractionStrategyKind::default(),
            ocr_command: default_ocr_command(),
            ocr_languages: default_ocr_languages(),
            ocr_timeout_secs: default_ocr_timeout_secs(),
            describe_prompt: default_describe_prompt(),
            model: None,
        }
    }
}

/// Read a non-empty, trimmed env var.
fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key).ok().and_then(|s| {
        let t = s.trim();
        if t.is_empty() {
            None
        } else {
            Some(t.to_string())
        }
    })
}

fn config_non_empty(value: Option<&String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Resolve the LINE channel secret: env LINE_CHANNEL_SECRET overrides config.
pub fn resolve_line_channel_secret(config: &Config) -> Option<String> {
    env_non_empty("LINE_CHANNEL_SECRET")
        .or_else(|| config_non_empty(config.channels.line.channel_secret.as_ref()))
}

/// Resolve the LINE channel access token: env LINE_CHANNEL_ACCESS_TOKEN overrides config.
pub fn resolve_line_access_token(config: &Config) -> Option<String> {
    env_non_empty("LINE_CHANNEL_ACCESS_TOKEN")
        .or_else(|| config_non_empty(config.channels.line.channel_access_token.as_ref()))
}

/// Resolve the backend bearer token: env BACKEND_API_TOKEN, then INTERNLM_API_TOKEN, then config.
pub fn resolve_backend_token(config: &Config) -> Option<String> {
    env_non_empty("BACKEND_API_TOKEN")
        .or_else(|| env_non_empty("INTERNLM_API_TOKEN"))
        .or_else(|| config_non_empty(config.backend.api_token.as_ref()))
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var("LINEBRIDGE_CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::home_dir()
                .map(|h| h.join(".linebridge").join("config.json"))
                .unwrap_or_else(|| PathBuf::from("config.json"))
        })
}

/// Load config from the given path, the default path, or LINEBRIDGE_CONFIG_PATH. Missing file => default config.
/// Returns the config and the path that was used.
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = path.unwrap_or_else(default_config_path);
    let config = if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        Config::default()
    } else {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        serde_json::from_str(&s)
            .with_context(|| format!("parsing config from {}", path.display()))?
    };
    Ok((config, path))
}

/// Resolved backend settings.
#[derive(Debug, Clone)]
pub struct BackendSettings {
    pub endpoint: String,
    pub api_token: String,
    pub model: String,
    pub timeout: Duration,
}

impl BackendSettings {
    /// Validate the backend section of `config` with the given token.
    pub fn resolve(config: &Config, api_token: String) -> Result<Self> {
        let model = config.backend.model.trim().to_string();
        if model.is_empty() {
            anyhow::bail!("backend.model must not be empty");
        }
        Ok(Self {
            endpoint: config.backend.endpoint.trim().to_string(),
            api_token,
            model,
            timeout: checked_timeout(
                "backend.timeoutSecs",
                config.backend.timeout_secs,
                &BACKEND_TIMEOUT_RANGE_SECS,
            )?,
        })
    }
}

/// Resolved LINE settings.
#[derive(Debug, Clone)]
pub struct LineSettings {
    pub channel_secret: String,
    pub channel_access_token: String,
    pub api_base: String,
    pub data_api_base: String,
    pub fetch_timeout: Duration,
}

/// Resolved extraction settings.
#[derive(Debug, Clone)]
pub struct VisionSettings {
    pub strategy: ExtractionStrategyKind,
    pub ocr_command: String,
    pub ocr_languages: String,
    pub ocr_timeout: Duration,
    pub describe_prompt: String,
    /// Model used for image-derived requests.
    pub model: String,
}

/// Deployment settings, resolved once at startup and shared read-only (behind `Arc`) by every event task.
#[derive(Debug, Clone)]
pub struct RelaySettings {
    pub backend: BackendSettings,
    pub line: LineSettings,
    pub vision: VisionSettings,
}

fn checked_timeout(
    name: &str,
    secs: u64,
    range: &std::ops::RangeInclusive<u64>,
) -> Result<Duration> {
    if !range.contains(&secs) {
        anyhow::bail!(
            "{} must be between {} and {} seconds (got {})",
            name,
            range.start(),
            range.end(),
            secs
        );
    }
    Ok(Duration::from_secs(secs))
}

impl RelaySettings {
    /// Resolve secrets (env over file) and validate. Fails when a required secret is missing
    /// or a timeout is out of range.
    pub fn from_config(config: &Config) -> Result<Self> {
        let channel_secret = resolve_line_channel_secret(config).context(
            "LINE channel secret not configured (set LINE_CHANNEL_SECRET or channels.line.channelSecret)",
        )?;
        let channel_access_token = resolve_line_access_token(config).context(
            "LINE channel access token not configured (set LINE_CHANNEL_ACCESS_TOKEN or channels.line.channelAccessToken)",
        )?;
        let api_token = resolve_backend_token(config).context(
            "backend API token not configured (set BACKEND_API_TOKEN or backend.apiToken)",
        )?;
        Self::with_secrets(config, channel_secret, channel_access_token, api_token)
    }

    /// Build settings from config with explicitly supplied secrets (no env lookup).
    pub fn with_secrets(
        config: &Config,
        channel_secret: String,
        channel_access_token: String,
        api_token: String,
    ) -> Result<Self> {
        let backend = BackendSettings::resolve(config, api_token)?;
        let vision_model = config
            .vision
            .model
            .as_ref()
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| backend.model.clone());
        Ok(Self {
            backend,
            line: LineSettings {
                channel_secret,
                channel_access_token,
                api_base: config.channels.line.api_base.trim_end_matches('/').to_string(),
                data_api_base: config
                    .channels
                    .line
                    .data_api_base
                    .trim_end_matches('/')
                    .to_string(),
                fetch_timeout: checked_timeout(
                    "channels.line.fetchTimeoutSecs",
                    config.channels.line.fetch_timeout_secs,
                    &TIMEOUT_RANGE_SECS,
                )?,
            },
            vision: VisionSettings {
                strategy: config.vision.strategy,
                ocr_command: config.vision.ocr_command.clone(),
                ocr_languages: config.vision.ocr_languages.clone(),
                ocr_timeout: checked_timeout(
                    "vision.ocrTimeoutSecs",
                    config.vision.ocr_timeout_secs,
                    &TIMEOUT_RANGE_SECS,
                )?,
                describe_prompt: config.vision.describe_prompt.clone(),
                model: vision_model,
            },
        })
    }
}
