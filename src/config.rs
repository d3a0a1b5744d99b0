//! Configuration file handling.
//!
//! Settings come from `.smartassess.toml`; CLI flags override them.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::insight::{ProviderConfig, INSIGHT_SYSTEM_PROMPT};
use crate::report::aggregator::default_start_date;
use crate::report::Framework;

/// Default configuration file name.
pub const CONFIG_FILE: &str = ".smartassess.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,

    /// Text-generation service settings.
    #[serde(default)]
    pub model: ModelConfig,

    #[serde(default)]
    pub report: ReportConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// JSON datastore path.
    #[serde(default = "default_data_file")]
    pub data_file: String,

    /// Teacher whose records the CLI operates on.
    #[serde(default = "default_teacher_id")]
    pub teacher_id: String,

    /// Students processed at once in a batch.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_file: default_data_file(),
            teacher_id: default_teacher_id(),
            concurrency: default_concurrency(),
        }
    }
}

fn default_data_file() -> String {
    "smartassess.json".to_string()
}

fn default_teacher_id() -> String {
    "default".to_string()
}

fn default_concurrency() -> usize {
    4
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_model")]
    pub name: String,

    /// Base URL of the chat-completion API.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Bearer token. Usually supplied through `OPENROUTER_API_KEY` instead.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Request timeout in seconds. 0 disables the timeout.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    #[serde(default = "default_insight_system_prompt")]
    pub insight_system_prompt: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: default_model(),
            api_url: default_api_url(),
            api_key: None,
            timeout_seconds: default_timeout(),
            insight_system_prompt: default_insight_system_prompt(),
        }
    }
}

fn default_model() -> String {
    "x-ai/grok-4-fast".to_string()
}

fn default_api_url() -> String {
    "https://openrouter.ai/api/v1".to_string()
}

fn default_timeout() -> u64 {
    300
}

fn default_insight_system_prompt() -> String {
    INSIGHT_SYSTEM_PROMPT.to_string()
}

/// Cohort report settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Framework the narrative is aligned to.
    #[serde(default = "default_framework")]
    pub framework: String,

    #[serde(default = "default_framework_dimensions")]
    pub framework_dimensions: Vec<String>,

    /// `HTTP-Referer` header sent with the narrative call.
    #[serde(default = "default_referer")]
    pub referer: String,

    /// `X-Title` header sent with the narrative call.
    #[serde(default = "default_title")]
    pub title: String,

    /// Window start when a report names none.
    #[serde(default = "default_start_date")]
    pub start_date: DateTime<Utc>,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            framework: default_framework(),
            framework_dimensions: default_framework_dimensions(),
            referer: default_referer(),
            title: default_title(),
            start_date: default_start_date(),
        }
    }
}

fn default_framework() -> String {
    Framework::default().name
}

fn default_framework_dimensions() -> Vec<String> {
    Framework::default().dimensions
}

fn default_referer() -> String {
    "https://smartassess.app".to_string()
}

fn default_title() -> String {
    "SmartAssess Report Generator".to_string()
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// Only values the CLI actually provides override the file.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref data_file) = args.data_file {
            self.general.data_file = data_file.display().to_string();
        }
        if let Some(ref teacher) = args.teacher {
            self.general.teacher_id = teacher.clone();
        }
        if let Some(concurrency) = args.concurrency {
            self.general.concurrency = concurrency;
        }

        if let Some(ref model) = args.model {
            self.model.name = model.clone();
        }
        if let Some(ref api_url) = args.api_url {
            self.model.api_url = api_url.clone();
        }
        if let Some(ref api_key) = args.api_key {
            self.model.api_key = Some(api_key.clone());
        }
        if let Some(timeout) = args.timeout {
            self.model.timeout_seconds = timeout;
        }
    }

    /// Provider settings for per-assessment insights.
    pub fn insight_provider(&self) -> ProviderConfig {
        ProviderConfig {
            api_url: self.model.api_url.clone(),
            api_key: self.model.api_key.clone(),
            model_name: self.model.name.clone(),
            timeout_seconds: (self.model.timeout_seconds > 0).then_some(self.model.timeout_seconds),
            referer: None,
            title: None,
        }
    }

    /// Provider settings for the report narrative, with the extra headers.
    pub fn narrative_provider(&self) -> ProviderConfig {
        ProviderConfig {
            referer: Some(self.report.referer.clone()).filter(|r| !r.is_empty()),
            title: Some(self.report.title.clone()).filter(|t| !t.is_empty()),
            ..self.insight_provider()
        }
    }

    pub fn framework(&self) -> Framework {
        Framework {
            name: self.report.framework.clone(),
            dimensions: self.report.framework_dimensions.clone(),
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
