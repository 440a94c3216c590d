use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, info, warn};

/// Structured event types for one outfit generation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum LogEventType {
    GenerationStart,
    StrategySelected,
    PromptSent,
    ResponseReceived,
    RetryScheduled,
    StageTransition,
    ValidationResult,
    GenerationEnd,
    VariantDelivered,
    VariantFailed,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// A single structured log entry, serialized as one JSON line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEvent {
    pub timestamp: String,
    pub event_type: LogEventType,
    pub level: LogLevel,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl LogEvent {
    pub fn new(
        event_type: LogEventType,
        level: LogLevel,
        message: impl Into<String>,
        details: Option<serde_json::Value>,
    ) -> Self {
        Self {
            timestamp: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            event_type,
            level,
            message: message.into(),
            details,
        }
    }

    pub fn info(event_type: LogEventType, message: impl Into<String>) -> Self {
        Self::new(event_type, LogLevel::Info, message, None)
    }

    pub fn info_with_details(
        event_type: LogEventType,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self::new(event_type, LogLevel::Info, message, Some(details))
    }

    pub fn debug_with_details(
        event_type: LogEventType,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self::new(event_type, LogLevel::Debug, message, Some(details))
    }

    pub fn warn_with_details(
        event_type: LogEventType,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self::new(event_type, LogLevel::Warn, message, Some(details))
    }

    pub fn error_with_details(message: impl Into<String>, details: serde_json::Value) -> Self {
        Self::new(LogEventType::Error, LogLevel::Error, message, Some(details))
    }
}

/// Destination for generation telemetry.
#[async_trait]
pub trait TelemetrySink: Send + Sync {
    async fn record(&self, event: LogEvent) -> Result<()>;
}

/// Appends events to `<dir>/logs/generation.jsonl`, one JSON object per line.
pub struct JsonlSink {
    log_file_path: PathBuf,
}

impl JsonlSink {
    /// Creates the `logs/` subdirectory if it doesn't exist.
    pub async fn new(dir: &Path) -> Result<Self> {
        let logs_dir = dir.join("logs");
        tokio::fs::create_dir_all(&logs_dir)
            .await
            .context("Failed to create logs directory")?;

        Ok(Self {
            log_file_path: logs_dir.join("generation.jsonl"),
        })
    }

    pub fn log_file_path(&self) -> &Path {
        &self.log_file_path
    }
}

#[async_trait]
impl TelemetrySink for JsonlSink {
    /// Each call opens/appends/flushes so concurrent variant tasks and a
    /// crashed process both leave whole lines behind.
    async fn record(&self, event: LogEvent) -> Result<()> {
        let mut line = serde_json::to_string(&event).context("Failed to serialize log event")?;
        line.push('\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_file_path)
            .await
            .context("Failed to open log file")?;

        file.write_all(line.as_bytes()).await?;
        file.flush().await?;

        Ok(())
    }
}

/// Forwards events to `tracing`. Used when no log directory is configured.
#[derive(Debug, Default, Clone)]
pub struct TracingSink;

#[async_trait]
impl TelemetrySink for TracingSink {
    async fn record(&self, event: LogEvent) -> Result<()> {
        let details = event
            .details
            .as_ref()
            .map(|d| d.to_string())
            .unwrap_or_default();
        match event.level {
            LogLevel::Debug => debug!(event = ?event.event_type, %details, "{}", event.message),
            LogLevel::Info => info!(event = ?event.event_type, %details, "{}", event.message),
            LogLevel::Warn => warn!(event = ?event.event_type, %details, "{}", event.message),
            LogLevel::Error => error!(event = ?event.event_type, %details, "{}", event.message),
        }
        Ok(())
    }
}

/// Per-generation handle over a sink. Every event carries the generation
/// id; sink failures are logged and otherwise ignored.
#[derive(Clone)]
pub struct GenerationLog {
    sink: Arc<dyn TelemetrySink>,
    generation_id: String,
}

impl GenerationLog {
    pub fn new(sink: Arc<dyn TelemetrySink>, generation_id: impl Into<String>) -> Self {
        Self {
            sink,
            generation_id: generation_id.into(),
        }
    }

    pub fn generation_id(&self) -> &str {
        &self.generation_id
    }

    pub async fn log(&self, mut event: LogEvent) {
        let details = event.details.get_or_insert_with(|| json!({}));
        if let Some(map) = details.as_object_mut() {
            map.insert("generation_id".to_string(), json!(self.generation_id));
        }
        if let Err(e) = self.sink.record(event).await {
            warn!(error = %e, "failed to record telemetry event");
        }
    }

    pub async fn log_generation_start(&self, intent: &str, items: usize) {
        self.log(LogEvent::info_with_details(
            LogEventType::GenerationStart,
            format!("Generating outfit for '{}'", intent),
            json!({ "intent": intent, "projected_items": items }),
        ))
        .await
    }

    pub async fn log_strategy_selected(&self, strategy: &str, archetype: Option<&str>) {
        self.log(LogEvent::info_with_details(
            LogEventType::StrategySelected,
            format!("Strategy: {}", strategy),
            json!({ "strategy": strategy, "archetype": archetype }),
        ))
        .await
    }

    pub async fn log_prompt_sent(&self, stage: &str, prompt: &str, temperature: f32) {
        self.log(LogEvent::debug_with_details(
            LogEventType::PromptSent,
            format!("Prompt sent for {}", stage),
            json!({
                "stage": stage,
                "prompt": prompt,
                "prompt_length": prompt.len(),
                "temperature": temperature,
            }),
        ))
        .await
    }

    pub async fn log_response_received(&self, stage: &str, response: &serde_json::Value) {
        self.log(LogEvent::debug_with_details(
            LogEventType::ResponseReceived,
            format!("Response received for {}", stage),
            json!({ "stage": stage, "response": response }),
        ))
        .await
    }

    pub async fn log_retries(&self, stage: &str, attempts: u32, succeeded: bool) {
        self.log(LogEvent::warn_with_details(
            LogEventType::RetryScheduled,
            format!("{} needed {} attempt(s)", stage, attempts),
            json!({
                "stage": stage,
                "attempts": attempts,
                "retries": attempts.saturating_sub(1),
                "succeeded": succeeded,
            }),
        ))
        .await
    }

    pub async fn log_stage_transition(&self, from: &str, to: &str) {
        self.log(LogEvent::info_with_details(
            LogEventType::StageTransition,
            format!("{} -> {}", from, to),
            json!({ "from": from, "to": to }),
        ))
        .await
    }

    pub async fn log_validation(&self, target: &str, passed: bool, error: Option<&str>) {
        let (level, msg) = if passed {
            (LogLevel::Info, format!("Validation passed for {}", target))
        } else {
            (LogLevel::Warn, format!("Validation failed for {}", target))
        };
        self.log(LogEvent::new(
            LogEventType::ValidationResult,
            level,
            msg,
            Some(json!({ "target": target, "passed": passed, "error": error })),
        ))
        .await
    }

    pub async fn log_generation_end(&self, outfit: [&str; 3], confidence: f64, elapsed_ms: u128) {
        self.log(LogEvent::info_with_details(
            LogEventType::GenerationEnd,
            format!("Outfit {} / {} / {}", outfit[0], outfit[1], outfit[2]),
            json!({
                "outfit": outfit,
                "confidence_score": confidence,
                "elapsed_ms": elapsed_ms as u64,
            }),
        ))
        .await
    }

    pub async fn log_variant_delivered(&self, variation: &str, outfit: [&str; 3]) {
        self.log(LogEvent::info_with_details(
            LogEventType::VariantDelivered,
            format!("Variant delivered: {}", variation),
            json!({ "variation": variation, "outfit": outfit }),
        ))
        .await
    }

    pub async fn log_variant_failed(&self, variation: &str, reason: &str) {
        self.log(LogEvent::warn_with_details(
            LogEventType::VariantFailed,
            format!("Variant failed: {}", variation),
            json!({ "variation": variation, "reason": reason }),
        ))
        .await
    }

    pub async fn log_error(&self, code: &str, message: &str) {
        self.log(LogEvent::error_with_details(
            message,
            json!({ "code": code }),
        ))
        .await
    }
}

// Exposed for e2e and integration testing
pub mod mocks {
    use super::*;
    use std::sync::Mutex;

    /// Keeps every recorded event in memory.
    #[derive(Clone, Default)]
    pub struct MemorySink {
        events: Arc<Mutex<Vec<LogEvent>>>,
    }

    impl MemorySink {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn events(&self) -> Vec<LogEvent> {
            self.events.lock().unwrap().clone()
        }

        pub fn of_type(&self, event_type: LogEventType) -> Vec<LogEvent> {
            self.events()
                .into_iter()
                .filter(|e| e.event_type == event_type)
                .collect()
        }
    }

    #[async_trait]
    impl TelemetrySink for MemorySink {
        async fn record(&self, event: LogEvent) -> Result<()> {
            self.events.lock().unwrap().push(event);
            Ok(())
        }
    }
}
