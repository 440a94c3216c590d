use crate::error::{FitError, OracleError};
use crate::retry::{RetryError, RetryPolicy, retry_with_backoff};
use async_trait::async_trait;
use jsonschema::JSONSchema;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

pub mod gemini;
pub mod schema;

/// One structured-generation call.
#[derive(Debug, Clone, PartialEq)]
pub struct OracleRequest {
    pub system_instruction: String,
    pub user_instruction: String,
    pub response_schema: Value,
    pub temperature: f32,
}

/// Abstract interface for the remote text-generation endpoint.
#[async_trait]
pub trait GenerativeTransport: Send + Sync {
    /// Sends the request and returns the raw response text.
    async fn generate(&self, request: &OracleRequest) -> Result<String, OracleError>;
}

/// Issues requests through a transport, retries transient failures and
/// enforces the response schema.
#[derive(Clone)]
pub struct OracleClient {
    transport: Arc<dyn GenerativeTransport>,
    retry: RetryPolicy,
    call_timeout: Duration,
}

impl OracleClient {
    pub fn new(transport: Arc<dyn GenerativeTransport>) -> Self {
        Self {
            transport,
            retry: RetryPolicy::default(),
            call_timeout: Duration::from_secs(60),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Sends the request and returns the response decoded as `T`.
    ///
    /// Transport failures are retried per the retry policy. A response that
    /// is empty, not JSON, or does not match `request.response_schema` is a
    /// [`FitError::SchemaViolation`] and is never retried.
    pub async fn generate<T: DeserializeOwned>(
        &self,
        request: &OracleRequest,
        cancel: &CancellationToken,
    ) -> Result<T, FitError> {
        self.generate_counted(request, cancel)
            .await
            .map(|(value, _)| value)
    }

    /// Like [`OracleClient::generate`], also returning how many transport
    /// attempts the successful call took.
    pub async fn generate_counted<T: DeserializeOwned>(
        &self,
        request: &OracleRequest,
        cancel: &CancellationToken,
    ) -> Result<(T, u32), FitError> {
        let (text, attempts) = self.call_with_retry(request, cancel).await?;
        let value = parse_response(&text)?;
        enforce_schema(&request.response_schema, &value)?;
        let decoded = serde_json::from_value(value)
            .map_err(|e| FitError::SchemaViolation(format!("response does not decode: {}", e)))?;
        Ok((decoded, attempts))
    }

    async fn call_with_retry(
        &self,
        request: &OracleRequest,
        cancel: &CancellationToken,
    ) -> Result<(String, u32), FitError> {
        let timeout = self.call_timeout;
        let mut attempts_made = 0;
        let outcome = retry_with_backoff(&self.retry, cancel, OracleError::is_transient, |attempt| {
            attempts_made = attempt;
            let transport = self.transport.clone();
            async move {
                debug!(attempt, temperature = request.temperature, "calling oracle");
                match tokio::time::timeout(timeout, transport.generate(request)).await {
                    Ok(result) => result,
                    Err(_) => Err(OracleError::Timeout(timeout)),
                }
            }
        })
        .await;

        match outcome {
            Ok(text) => Ok((text, attempts_made)),
            Err(RetryError::Exhausted { attempts, last }) => {
                warn!(attempts, error = %last, "oracle retries exhausted");
                Err(FitError::Oracle {
                    attempts,
                    source: last,
                })
            }
            Err(RetryError::Fatal {
                error: OracleError::MalformedResponse(message),
                ..
            }) => Err(FitError::SchemaViolation(message)),
            Err(RetryError::Fatal { attempts, error }) => Err(FitError::Oracle {
                attempts,
                source: error,
            }),
            Err(RetryError::Cancelled { .. }) => Err(FitError::Cancelled),
        }
    }
}

/// Strips a surrounding markdown code fence, if any.
fn clean_response(input: &str) -> &str {
    let trimmed = input.trim();
    if let Some(start) = trimmed.find("```") {
        let after = &trimmed[start + 3..];
        // Skip the language identifier line ("json")
        let content_start = after.find('\n').map(|n| n + 1).unwrap_or(0);
        if let Some(end) = after[content_start..].find("```") {
            return after[content_start..content_start + end].trim();
        }
    }
    trimmed
}

fn parse_response(text: &str) -> Result<Value, FitError> {
    let cleaned = clean_response(text);
    if cleaned.is_empty() {
        return Err(FitError::SchemaViolation("empty response".to_string()));
    }
    serde_json::from_str(cleaned).map_err(|e| {
        FitError::SchemaViolation(format!(
            "response is not valid JSON ({}): {}",
            e,
            cleaned.chars().take(200).collect::<String>()
        ))
    })
}

pub(crate) fn enforce_schema(schema: &Value, instance: &Value) -> Result<(), FitError> {
    let compiled = JSONSchema::compile(schema)
        .map_err(|e| FitError::Configuration(format!("invalid response schema: {}", e)))?;

    if let Err(errors) = compiled.validate(instance) {
        let messages: Vec<String> = errors
            .map(|e| format!("{} at '{}'", e, e.instance_path))
            .collect();
        return Err(FitError::SchemaViolation(messages.join("; ")));
    }
    Ok(())
}

// Exposed for e2e and integration testing
pub mod mocks {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    type MockResponseAction =
        Box<dyn Fn(&OracleRequest) -> Result<String, OracleError> + Send + Sync>;

    /// Scripted transport: each call pops the next queued action. Every
    /// request is recorded so tests can inspect the prompts.
    #[derive(Clone, Default)]
    pub struct MockTransport {
        responses: Arc<Mutex<VecDeque<MockResponseAction>>>,
        requests: Arc<Mutex<Vec<OracleRequest>>>,
        calls: Arc<AtomicUsize>,
    }

    impl MockTransport {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn add_response(&self, response: impl Into<String>) {
            let response = response.into();
            self.add_action(move |_| Ok(response.clone()));
        }

        pub fn add_json(&self, value: Value) {
            self.add_response(value.to_string());
        }

        pub fn add_error(&self, error: OracleError) {
            self.add_action(move |_| Err(error.clone()));
        }

        pub fn add_action<F>(&self, action: F)
        where
            F: Fn(&OracleRequest) -> Result<String, OracleError> + Send + Sync + 'static,
        {
            self.responses.lock().unwrap().push_back(Box::new(action));
        }

        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        pub fn requests(&self) -> Vec<OracleRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl GenerativeTransport for MockTransport {
        async fn generate(&self, request: &OracleRequest) -> Result<String, OracleError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.requests.lock().unwrap().push(request.clone());

            let action = self.responses.lock().unwrap().pop_front();
            match action {
                Some(action) => action(request),
                None => Err(OracleError::Rejected {
                    status: None,
                    message: "no scripted response left".to_string(),
                }),
            }
        }
    }
}
