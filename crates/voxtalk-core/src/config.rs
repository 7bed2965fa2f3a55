use crate::error::ConfigError;
use serde::Deserialize;
use std::path::Path;
use url::Url;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub audio: AudioConfig,

    #[serde(default)]
    pub agent: AgentConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GeneralConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AudioConfig {
    #[serde(default = "default_device_name")]
    pub input_device: String,

    #[serde(default = "default_device_name")]
    pub output_device: String,

    /// Wire sample rate for both directions (linear16 mono).
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    /// Capture callback size in frames at the wire rate.
    #[serde(default = "default_buffer_size")]
    pub buffer_size: u32,

    /// Trailing interval after agent playback during which mic audio stays
    /// suppressed, covering device and network latency.
    #[serde(default = "default_grace_period_ms")]
    pub grace_period_ms: u64,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            input_device: default_device_name(),
            output_device: default_device_name(),
            sample_rate: default_sample_rate(),
            buffer_size: default_buffer_size(),
            grace_period_ms: default_grace_period_ms(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AgentConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Name of the environment variable holding the service API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_keepalive_secs")]
    pub keepalive_secs: u64,

    #[serde(default)]
    pub listen: ListenConfig,

    #[serde(default)]
    pub think: ThinkConfig,

    #[serde(default)]
    pub speak: SpeakConfig,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            api_key_env: default_api_key_env(),
            keepalive_secs: default_keepalive_secs(),
            listen: ListenConfig::default(),
            think: ThinkConfig::default(),
            speak: SpeakConfig::default(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ListenConfig {
    #[serde(default = "default_listen_model")]
    pub model: String,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            model: default_listen_model(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ThinkConfig {
    #[serde(default = "default_think_provider")]
    pub provider: String,

    #[serde(default = "default_think_model")]
    pub model: String,

    #[serde(default = "default_instructions")]
    pub instructions: String,
}

impl Default for ThinkConfig {
    fn default() -> Self {
        Self {
            provider: default_think_provider(),
            model: default_think_model(),
            instructions: default_instructions(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SpeakConfig {
    #[serde(default = "default_voice")]
    pub voice: String,
}

impl Default for SpeakConfig {
    fn default() -> Self {
        Self {
            voice: default_voice(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_device_name() -> String {
    "default".to_string()
}

fn default_sample_rate() -> u32 {
    16000
}

fn default_buffer_size() -> u32 {
    800 // 50 ms at 16 kHz
}

fn default_grace_period_ms() -> u64 {
    1500
}

fn default_endpoint() -> String {
    "wss://agent.deepgram.com/v1/agent/converse".to_string()
}

fn default_api_key_env() -> String {
    "DEEPGRAM_API_KEY".to_string()
}

fn default_keepalive_secs() -> u64 {
    8
}

fn default_listen_model() -> String {
    "nova-2".to_string()
}

fn default_think_provider() -> String {
    "open_ai".to_string()
}

fn default_think_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_instructions() -> String {
    "You are a helpful voice assistant. Keep answers short and conversational.".to_string()
}

fn default_voice() -> String {
    "aura-asteria-en".to_string()
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a TOML string (for testing).
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let url = Url::parse(&self.agent.endpoint)
            .map_err(|e| ConfigError::InvalidEndpoint(e.to_string()))?;
        match url.scheme() {
            "ws" | "wss" => Ok(()),
            other => Err(ConfigError::InvalidEndpoint(format!(
                "unsupported scheme '{}' in {}",
                other, self.agent.endpoint
            ))),
        }
    }

    /// Resolve the service API key from the configured environment variable.
    /// Called before any device or socket is opened so a missing credential
    /// fails the session fast.
    pub fn resolve_api_key(&self) -> Result<String, ConfigError> {
        match std::env::var(&self.agent.api_key_env) {
            Ok(key) if !key.trim().is_empty() => Ok(key),
            _ => Err(ConfigError::EnvVarNotFound(self.agent.api_key_env.clone())),
        }
    }
}
