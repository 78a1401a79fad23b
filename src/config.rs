//! # Configuration Management
//!
//! This module handles loading and managing application configuration from
//! multiple sources:
//! - TOML configuration files (config.toml)
//! - Environment variables (with APP_ prefix)
//! - Default values (built into the code)
//!
//! ## Configuration Priority (highest to lowest):
//! 1. Environment variables (APP_SERVER_HOST, APP_RECOGNIZER_LANGUAGE, etc.)
//! 2. Configuration file (config.toml)
//! 3. Default values (defined in the Default impl)
//!
//! Pool sizing and warm-up cadence are deliberately configuration, not
//! constants: the right numbers depend on traffic shape and how the process
//! is scheduled (long-lived server vs on-demand function).

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;

/// Main application configuration that contains all settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub recognizer: RecognizerConfig,
    pub warmup: WarmupConfig,
    pub storage: StorageConfig,
}

/// Server-specific configuration settings.
///
/// ## Common values:
/// - `host = "127.0.0.1"`: Only accept connections from localhost (development)
/// - `host = "0.0.0.0"`: Accept connections from any IP address (production)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Recognition backend and pool settings.
///
/// ## Fields:
/// - `language`: BCP-47 language hint sent with every recognition request
/// - `api_endpoint` / `api_key`: where the speech API lives and how to talk to it
/// - `initial_handles`: recognizer handles created eagerly at startup
/// - `max_retained_handles`: idle handles the pool keeps; returns beyond this
///   are discarded
/// - `request_timeout_secs`: hard bound on one recognition call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecognizerConfig {
    pub language: String,
    pub api_endpoint: String,
    pub api_key: String,
    pub initial_handles: usize,
    pub max_retained_handles: usize,
    pub request_timeout_secs: u64,
}

/// Warm-up scheduler settings.
///
/// ## Fields:
/// - `periodic`: run the background warm-up loop (disable where background
///   tasks are not reliably scheduled; health checks still trigger warm-ups)
/// - `interval_secs`: minimum gap between warm-up passes
/// - `handle_timeout_secs`: per-handle bound so one stuck handle cannot stall
///   a pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarmupConfig {
    pub periodic: bool,
    pub interval_secs: u64,
    pub handle_timeout_secs: u64,
}

/// Scratch storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub scratch_dir: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
            },
            recognizer: RecognizerConfig {
                language: "vi-VN".to_string(),
                api_endpoint: "http://www.google.com/speech-api/v2/recognize".to_string(),
                api_key: String::new(),
                initial_handles: 2,
                max_retained_handles: 4,
                request_timeout_secs: 15,
            },
            warmup: WarmupConfig {
                periodic: true,
                interval_secs: 240, // 4 minutes
                handle_timeout_secs: 5,
            },
            storage: StorageConfig {
                scratch_dir: "/tmp".to_string(),
            },
        }
    }
}

impl AppConfig {
    /// Load configuration from multiple sources in priority order.
    ///
    /// ## Environment Variable Examples:
    /// - `APP_SERVER_HOST=0.0.0.0`: Override server host
    /// - `APP_RECOGNIZER_LANGUAGE=en-US`: Override the language hint
    /// - `HOST` / `PORT`: Special cases for deployment platforms
    pub fn load() -> Result<Self> {
        let mut settings = config::Config::builder()
            // 1. Start with built-in defaults
            .add_source(config::Config::try_from(&AppConfig::default())?)
            // 2. Load from config.toml if present
            .add_source(config::File::with_name("config").required(false))
            // 3. Environment variables with APP_ prefix
            .add_source(config::Environment::with_prefix("APP").separator("_"));

        // Deployment platforms commonly inject bare HOST/PORT
        if let Ok(host) = env::var("HOST") {
            settings = settings.set_override("server.host", host)?;
        }

        if let Ok(port) = env::var("PORT") {
            settings = settings.set_override("server.port", port)?;
        }

        let config = settings.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Validate that the configuration values make sense.
    ///
    /// Catching bad values here means a clear startup error instead of a
    /// confusing runtime failure (a pool that retains nothing, a recognition
    /// call with no bound, etc.).
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(anyhow::anyhow!("Server port cannot be 0"));
        }

        if self.recognizer.max_retained_handles == 0 {
            return Err(anyhow::anyhow!("Max retained handles must be greater than 0"));
        }

        if self.recognizer.initial_handles > self.recognizer.max_retained_handles {
            return Err(anyhow::anyhow!(
                "Initial handles ({}) cannot exceed max retained handles ({})",
                self.recognizer.initial_handles,
                self.recognizer.max_retained_handles
            ));
        }

        if self.recognizer.request_timeout_secs == 0 {
            return Err(anyhow::anyhow!("Recognition timeout must be greater than 0"));
        }

        if self.recognizer.language.is_empty() {
            return Err(anyhow::anyhow!("Recognizer language cannot be empty"));
        }

        if self.warmup.interval_secs == 0 {
            return Err(anyhow::anyhow!("Warm-up interval must be greater than 0"));
        }

        if self.warmup.handle_timeout_secs == 0 {
            return Err(anyhow::anyhow!("Warm-up handle timeout must be greater than 0"));
        }

        Ok(())
    }

    /// Update configuration from a JSON string (used for runtime config updates).
    ///
    /// Only the fields present in the JSON are updated; everything else keeps
    /// its current value. Pool sizes and the scratch dir are deliberately not
    /// updatable at runtime — they are baked into resources built at startup.
    pub fn update_from_json(&mut self, json_str: &str) -> Result<()> {
        let partial: serde_json::Value = serde_json::from_str(json_str)?;

        if let Some(server) = partial.get("server") {
            if let Some(host) = server.get("host").and_then(|v| v.as_str()) {
                self.server.host = host.to_string();
            }
            if let Some(port) = server.get("port").and_then(|v| v.as_u64()) {
                self.server.port = port as u16;
            }
        }

        if let Some(recognizer) = partial.get("recognizer") {
            if let Some(language) = recognizer.get("language").and_then(|v| v.as_str()) {
                self.recognizer.language = language.to_string();
            }
            if let Some(timeout) = recognizer
                .get("request_timeout_secs")
                .and_then(|v| v.as_u64())
            {
                self.recognizer.request_timeout_secs = timeout;
            }
        }

        if let Some(warmup) = partial.get("warmup") {
            if let Some(interval) = warmup.get("interval_secs").and_then(|v| v.as_u64()) {
                self.warmup.interval_secs = interval;
            }
            if let Some(timeout) = warmup.get("handle_timeout_secs").and_then(|v| v.as_u64()) {
                self.warmup.handle_timeout_secs = timeout;
            }
        }

        self.validate()?;
        Ok(())
    }
}
