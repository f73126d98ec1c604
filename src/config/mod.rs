mod credentials;

pub use credentials::{Credentials, read_key_source};

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use tracing::debug;

use crate::paths::Paths;
use crate::scene::SnapshotDetail;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Resolved XDG-compliant paths (not serialized)
    #[serde(skip)]
    pub paths: Paths,

    #[serde(default)]
    pub agent: AgentConfig,

    #[serde(default)]
    pub providers: ProvidersConfig,

    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    #[serde(default)]
    pub scene: SceneConfig,

    #[serde(default)]
    pub iteration: IterationConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "default_model")]
    pub model: String,

    /// Maximum tokens for the model response
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Retries after a transient failure (timeout, 429, 5xx)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// First backoff delay; doubled on every retry
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Most recent chat turns sent with each request (0 = none)
    #[serde(default = "default_max_history_turns")]
    pub max_history_turns: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub openai: Option<OpenAIConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAIConfig {
    #[serde(default)]
    pub api_key: String,

    #[serde(default = "default_openai_base_url")]
    pub base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_max_requests")]
    pub max_requests: usize,

    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneConfig {
    /// "full" or "low"
    #[serde(default)]
    pub snapshot_detail: SnapshotDetail,

    /// Token budget for the serialized scene in the system prompt
    #[serde(default = "default_max_snapshot_tokens")]
    pub max_snapshot_tokens: usize,

    /// Half-width of the square random placements are drawn from
    #[serde(default = "default_placement_extent")]
    pub placement_extent: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IterationConfig {
    /// Delay between iteration ticks in milliseconds
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit one JSON object per log line
    #[serde(default)]
    pub json: bool,
}

// Default value functions
fn default_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_max_tokens() -> u32 {
    4096
}
fn default_temperature() -> f32 {
    0.7
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_max_retries() -> u32 {
    3
}
fn default_retry_backoff_ms() -> u64 {
    1000
}
fn default_max_history_turns() -> usize {
    20
}
fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_max_requests() -> usize {
    120
}
fn default_window_secs() -> u64 {
    60
}
fn default_max_snapshot_tokens() -> usize {
    2000
}
fn default_placement_extent() -> f32 {
    10.0
}
fn default_tick_ms() -> u64 {
    1000
}
fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
            max_history_turns: default_max_history_turns(),
        }
    }
}

impl Default for OpenAIConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_openai_base_url(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: default_max_requests(),
            window_secs: default_window_secs(),
        }
    }
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            snapshot_detail: SnapshotDetail::default(),
            max_snapshot_tokens: default_max_snapshot_tokens(),
            placement_extent: default_placement_extent(),
        }
    }
}

impl Default for IterationConfig {
    fn default() -> Self {
        Self {
            tick_ms: default_tick_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let paths = Paths::resolve()?;
        paths.ensure_dirs()?;
        Self::load_from(paths)
    }

    /// Load config.toml under the given paths, creating it from the
    /// template on first run.
    pub fn load_from(paths: Paths) -> Result<Self> {
        let path = paths.config_file();

        if !path.exists() {
            let config = Config {
                paths,
                ..Config::default()
            };
            config.save_with_template()?;
            return Ok(config);
        }

        let content = fs::read_to_string(&path)?;
        let mut config: Config = toml::from_str(&content)?;
        config.paths = paths;
        config.expand_env_vars();

        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let path = self.paths.config_file();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(&path, content)?;

        Ok(())
    }

    /// Save config with a helpful template (for first-time setup)
    pub fn save_with_template(&self) -> Result<()> {
        let path = self.paths.config_file();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(&path, DEFAULT_CONFIG_TEMPLATE)?;
        eprintln!("Created default config at {}", path.display());

        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let paths = Paths::resolve()?;
        Ok(paths.config_file())
    }

    fn expand_env_vars(&mut self) {
        if let Some(ref mut openai) = self.providers.openai {
            openai.api_key = expand_env(&openai.api_key);
        }
    }

    pub fn openai_base_url(&self) -> String {
        self.providers
            .openai
            .as_ref()
            .map(|o| o.base_url.clone())
            .unwrap_or_else(default_openai_base_url)
    }

    /// Resolve the API key: config file, then credentials.json, then
    /// `OPENAI_API_KEY`. `None` means the session runs without a key.
    pub fn resolve_api_key(&self) -> Option<String> {
        if let Some(ref openai) = self.providers.openai {
            let key = openai.api_key.trim();
            if !key.is_empty() && !key.starts_with('$') {
                return Some(key.to_string());
            }
        }

        match Credentials::load(&self.paths.credentials_file()) {
            Ok(Some(creds)) if !creds.openai_api_key.is_empty() => {
                return Some(creds.openai_api_key);
            }
            Ok(_) => {}
            Err(e) => debug!("Ignoring unreadable credentials file: {}", e),
        }

        std::env::var("OPENAI_API_KEY")
            .ok()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
    }

    pub fn get_value(&self, key: &str) -> Result<String> {
        let parts: Vec<&str> = key.split('.').collect();

        match parts.as_slice() {
            ["agent", "model"] => Ok(self.agent.model.clone()),
            ["agent", "max_tokens"] => Ok(self.agent.max_tokens.to_string()),
            ["agent", "temperature"] => Ok(self.agent.temperature.to_string()),
            ["agent", "timeout_secs"] => Ok(self.agent.timeout_secs.to_string()),
            ["agent", "max_retries"] => Ok(self.agent.max_retries.to_string()),
            ["agent", "retry_backoff_ms"] => Ok(self.agent.retry_backoff_ms.to_string()),
            ["agent", "max_history_turns"] => Ok(self.agent.max_history_turns.to_string()),
            ["providers", "openai", "base_url"] => Ok(self.openai_base_url()),
            ["rate_limit", "max_requests"] => Ok(self.rate_limit.max_requests.to_string()),
            ["rate_limit", "window_secs"] => Ok(self.rate_limit.window_secs.to_string()),
            ["scene", "snapshot_detail"] => Ok(self.scene.snapshot_detail.as_str().to_string()),
            ["scene", "max_snapshot_tokens"] => Ok(self.scene.max_snapshot_tokens.to_string()),
            ["scene", "placement_extent"] => Ok(self.scene.placement_extent.to_string()),
            ["iteration", "tick_ms"] => Ok(self.iteration.tick_ms.to_string()),
            ["logging", "level"] => Ok(self.logging.level.clone()),
            ["logging", "json"] => Ok(self.logging.json.to_string()),
            _ => anyhow::bail!("Unknown config key: {}", key),
        }
    }

    pub fn set_value(&mut self, key: &str, value: &str) -> Result<()> {
        let parts: Vec<&str> = key.split('.').collect();

        match parts.as_slice() {
            ["agent", "model"] => self.agent.model = value.to_string(),
            ["agent", "max_tokens"] => self.agent.max_tokens = value.parse()?,
            ["agent", "temperature"] => self.agent.temperature = value.parse()?,
            ["agent", "timeout_secs"] => self.agent.timeout_secs = value.parse()?,
            ["agent", "max_retries"] => self.agent.max_retries = value.parse()?,
            ["agent", "retry_backoff_ms"] => self.agent.retry_backoff_ms = value.parse()?,
            ["agent", "max_history_turns"] => self.agent.max_history_turns = value.parse()?,
            ["providers", "openai", "base_url"] => {
                self.providers
                    .openai
                    .get_or_insert_with(OpenAIConfig::default)
                    .base_url = value.trim_end_matches('/').to_string();
            }
            ["rate_limit", "max_requests"] => self.rate_limit.max_requests = value.parse()?,
            ["rate_limit", "window_secs"] => self.rate_limit.window_secs = value.parse()?,
            ["scene", "snapshot_detail"] => self.scene.snapshot_detail = value.parse()?,
            ["scene", "max_snapshot_tokens"] => self.scene.max_snapshot_tokens = value.parse()?,
            ["scene", "placement_extent"] => self.scene.placement_extent = value.parse()?,
            ["iteration", "tick_ms"] => self.iteration.tick_ms = value.parse()?,
            ["logging", "level"] => self.logging.level = value.to_string(),
            ["logging", "json"] => self.logging.json = value.parse()?,
            _ => anyhow::bail!("Unknown config key: {}", key),
        }

        Ok(())
    }
}

fn expand_env(s: &str) -> String {
    if let Some(var_name) = s.strip_prefix("${").and_then(|s| s.strip_suffix('}')) {
        std::env::var(var_name).unwrap_or_else(|_| s.to_string())
    } else if let Some(var_name) = s.strip_prefix('$') {
        std::env::var(var_name).unwrap_or_else(|_| s.to_string())
    } else {
        s.to_string()
    }
}

/// Default config template with helpful comments (used for first-time setup)
pub const DEFAULT_CONFIG_TEMPLATE: &str = r#"# SceneGPT Configuration
# Auto-created on first run. Edit as needed.

[agent]
model = "gpt-4o-mini"
max_tokens = 4096
temperature = 0.7
timeout_secs = 30
max_retries = 3
retry_backoff_ms = 1000
max_history_turns = 20

# OpenAI-compatible API. The key may also live in credentials.json
# (see `scenegpt config set-key`) or the OPENAI_API_KEY variable.
# [providers.openai]
# api_key = "${OPENAI_API_KEY}"
# base_url = "https://api.openai.com/v1"

[rate_limit]
max_requests = 120
window_secs = 60

[scene]
snapshot_detail = "full"        # full | low
max_snapshot_tokens = 2000
placement_extent = 10.0

[iteration]
tick_ms = 1000

[logging]
level = "warn"               # error | warn | info | debug | trace
json = false
"#;
