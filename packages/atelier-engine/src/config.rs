use crate::retry::RetryPolicy;
use anyhow::{Context, Result};
use jsonschema::JSONSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

const CONFIG_SCHEMA: &str = include_str!("../schemas/config.schema.json");

/// Default file name looked up by the CLI.
pub const CONFIG_FILE: &str = "atelier.json";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub jitter: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 200,
            max_delay_ms: 5_000,
            jitter: 0.5,
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        RetryPolicy::new(config.max_attempts)
            .with_base_delay(Duration::from_millis(config.base_delay_ms))
            .with_max_delay(Duration::from_millis(config.max_delay_ms))
            .with_jitter(config.jitter)
    }
}

/// Sampling temperature per kind of oracle call.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Temperatures {
    pub single_pass: f32,
    pub template: f32,
    pub candidates: f32,
    pub critique: f32,
    pub variants: f32,
}

impl Default for Temperatures {
    fn default() -> Self {
        Self {
            single_pass: 0.3,
            template: 0.3,
            candidates: 0.9,
            critique: 0.2,
            variants: 0.7,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct VariantsConfig {
    pub enabled: bool,
}

impl Default for VariantsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    #[serde(rename = "$schema", skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    pub model: String,
    pub retry: RetryConfig,
    pub temperatures: Temperatures,
    pub call_timeout_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_timeout_ms: Option<u64>,
    pub variants: VariantsConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archetypes_path: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            schema: None,
            model: "gemini-2.5-flash".to_string(),
            retry: RetryConfig::default(),
            temperatures: Temperatures::default(),
            call_timeout_ms: 60_000,
            request_timeout_ms: None,
            variants: VariantsConfig::default(),
            archetypes_path: None,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        let instance = serde_json::to_value(self)?;
        validate_value(&instance)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::from(&self.retry)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }
}

fn validate_value(instance: &Value) -> Result<()> {
    let schema_val: Value = serde_json::from_str(CONFIG_SCHEMA)?;
    let compiled = JSONSchema::compile(&schema_val)
        .map_err(|e| anyhow::anyhow!("Failed to compile config schema: {}", e))?;

    if let Err(errors) = compiled.validate(instance) {
        let error_msgs: Vec<String> = errors
            .map(|e| format!("{} at '{}'", e, e.instance_path))
            .collect();
        anyhow::bail!("Config validation failed: {}", error_msgs.join(", "));
    }
    Ok(())
}

/// Reads and validates a config file. A missing file yields the defaults.
pub async fn load_config(path: &Path) -> Result<EngineConfig> {
    if !path.exists() {
        return Ok(EngineConfig::default());
    }

    let content = fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read config {:?}", path))?;
    let value: Value = serde_json::from_str(&content)
        .with_context(|| format!("Config {:?} is not valid JSON", path))?;
    validate_value(&value).with_context(|| format!("Failed to validate {:?}", path))?;

    let mut config: EngineConfig = serde_json::from_value(value)?;

    // relative archetype paths are resolved against the config file
    if let (Some(archetypes), Some(parent)) = (config.archetypes_path.as_ref(), path.parent()) {
        if archetypes.is_relative() {
            config.archetypes_path = Some(parent.join(archetypes));
        }
    }

    Ok(config)
}
