use std::str::FromStr;
use std::time::Duration;

use sdbot_comfyui::WorkflowSettings;
use sdbot_core::modes::{DispatchMode, ReplyMode};
use sdbot_dingtalk::{Credentials, Endpoints, DEFAULT_API_URL, DEFAULT_OAPI_URL};
use sdbot_pipeline::queue::DEFAULT_CAPACITY;
use sdbot_pipeline::worker::{DEFAULT_GENERATION_TIMEOUT, DEFAULT_STEPS};
use sdbot_pipeline::WorkerSettings;

use crate::telemetry::LogFormat;

pub const DEFAULT_COMFYUI_URL: &str = "http://127.0.0.1:8188";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} environment variable is required")]
    Missing(&'static str),

    #[error("{var}={value:?} is invalid: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Bot configuration loaded once at startup.
#[derive(Debug, Clone)]
pub struct BotConfig {
    pub credentials: Credentials,
    pub endpoints: Endpoints,
    pub reply_mode: ReplyMode,
    pub dispatch_mode: DispatchMode,
    pub queue_capacity: usize,
    /// Images per job, 1 or 4.
    pub image_count: u32,
    pub generation_steps: u32,
    /// `None` disables the generation deadline.
    pub generation_timeout: Option<Duration>,
    pub progress_min_interval: Duration,
    pub http_timeout: Duration,
    pub shutdown_timeout: Duration,
    pub comfyui_url: String,
    pub workflow: WorkflowSettings,
    pub log_format: LogFormat,
}

impl BotConfig {
    /// Load configuration from environment variables.
    ///
    /// | Env Var                     | Default                           |
    /// |-----------------------------|-----------------------------------|
    /// | `DINGTALK_CLIENT_ID`        | required                          |
    /// | `DINGTALK_CLIENT_SECRET`    | required                          |
    /// | `DINGTALK_API_URL`          | `https://api.dingtalk.com`        |
    /// | `DINGTALK_OAPI_URL`         | `https://oapi.dingtalk.com`       |
    /// | `REPLY_MODE`                | `card` (`card` \| `markdown`)     |
    /// | `DISPATCH_MODE`             | `async` (`async` \| `sync`)       |
    /// | `QUEUE_CAPACITY`            | `32`                              |
    /// | `IMAGE_COUNT`               | `1` (1 or 4)                      |
    /// | `GENERATION_STEPS`          | `50`                              |
    /// | `GENERATION_TIMEOUT_SECS`   | `600` (`0` disables)              |
    /// | `PROGRESS_MIN_INTERVAL_MS`  | `0`                               |
    /// | `HTTP_TIMEOUT_SECS`         | `10`                              |
    /// | `SHUTDOWN_TIMEOUT_SECS`     | `30`                              |
    /// | `COMFYUI_URL`               | `http://127.0.0.1:8188`           |
    /// | `COMFYUI_CHECKPOINT`        | `v1-5-pruned-emaonly.safetensors` |
    /// | `IMAGE_WIDTH`               | `512`                             |
    /// | `IMAGE_HEIGHT`              | `512`                             |
    /// | `LOG_FORMAT`                | `text` (`text` \| `json`)         |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through `lookup`, which returns a variable's
    /// value or `None` when unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let env = Env { lookup: &lookup };

        let credentials = Credentials {
            client_id: env.required("DINGTALK_CLIENT_ID")?,
            client_secret: env.required("DINGTALK_CLIENT_SECRET")?,
        };
        let endpoints = Endpoints {
            api_url: env.string("DINGTALK_API_URL", DEFAULT_API_URL),
            oapi_url: env.string("DINGTALK_OAPI_URL", DEFAULT_OAPI_URL),
        };

        let queue_capacity: usize = env.parsed("QUEUE_CAPACITY", DEFAULT_CAPACITY)?;
        if queue_capacity == 0 {
            return Err(env.invalid("QUEUE_CAPACITY", "must be at least 1"));
        }

        let image_count: u32 = env.parsed("IMAGE_COUNT", 1)?;
        if image_count != 1 && image_count != 4 {
            return Err(env.invalid("IMAGE_COUNT", "must be 1 or 4"));
        }

        let generation_steps: u32 = env.parsed("GENERATION_STEPS", DEFAULT_STEPS)?;
        if generation_steps == 0 {
            return Err(env.invalid("GENERATION_STEPS", "must be positive"));
        }

        let timeout_secs: u64 =
            env.parsed("GENERATION_TIMEOUT_SECS", DEFAULT_GENERATION_TIMEOUT.as_secs())?;
        let generation_timeout = (timeout_secs > 0).then(|| Duration::from_secs(timeout_secs));

        let defaults = WorkflowSettings::default();
        let workflow = WorkflowSettings {
            checkpoint: env.string("COMFYUI_CHECKPOINT", &defaults.checkpoint),
            width: env.parsed("IMAGE_WIDTH", defaults.width)?,
            height: env.parsed("IMAGE_HEIGHT", defaults.height)?,
            ..defaults
        };

        Ok(Self {
            credentials,
            endpoints,
            reply_mode: env.parsed("REPLY_MODE", ReplyMode::default())?,
            dispatch_mode: env.parsed("DISPATCH_MODE", DispatchMode::default())?,
            queue_capacity,
            image_count,
            generation_steps,
            generation_timeout,
            progress_min_interval: Duration::from_millis(env.parsed("PROGRESS_MIN_INTERVAL_MS", 0)?),
            http_timeout: Duration::from_secs(env.parsed("HTTP_TIMEOUT_SECS", 10)?),
            shutdown_timeout: Duration::from_secs(env.parsed("SHUTDOWN_TIMEOUT_SECS", 30)?),
            comfyui_url: env.string("COMFYUI_URL", DEFAULT_COMFYUI_URL),
            workflow,
            log_format: env.parsed("LOG_FORMAT", LogFormat::default())?,
        })
    }

    pub fn worker_settings(&self) -> WorkerSettings {
        WorkerSettings {
            steps: self.generation_steps,
            generation_timeout: self.generation_timeout,
            progress_min_interval: self.progress_min_interval,
        }
    }
}

struct Env<'a> {
    lookup: &'a dyn Fn(&str) -> Option<String>,
}

impl Env<'_> {
    /// Unset and blank values both count as absent.
    fn get(&self, name: &str) -> Option<String> {
        (self.lookup)(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn required(&self, name: &'static str) -> Result<String, ConfigError> {
        self.get(name).ok_or(ConfigError::Missing(name))
    }

    fn string(&self, name: &str, default: &str) -> String {
        self.get(name).unwrap_or_else(|| default.to_string())
    }

    fn parsed<T>(&self, name: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get(name) {
            None => Ok(default),
            Some(value) => value.parse().map_err(|e: T::Err| ConfigError::Invalid {
                var: name,
                reason: e.to_string(),
                value,
            }),
        }
    }

    fn invalid(&self, name: &'static str, reason: &str) -> ConfigError {
        ConfigError::Invalid {
            var: name,
            value: self.get(name).unwrap_or_default(),
            reason: reason.to_string(),
        }
    }
}
