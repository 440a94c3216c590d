use crate::domain::types::{FitResult, StrategyKind};
use crate::error::FitError;
use crate::inventory::ProjectedInventory;
use crate::logging::GenerationLog;
use crate::oracle::{OracleClient, OracleRequest};
use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

pub mod multi_stage;
pub mod prompt;
pub mod single_pass;
pub mod template;

/// Everything a strategy needs for one generation.
pub struct StrategyContext<'a> {
    pub intent: &'a str,
    pub inventory: &'a ProjectedInventory,
    pub log: &'a GenerationLog,
    pub cancel: &'a CancellationToken,
}

/// One way of turning an intent and a projected inventory into a verified
/// outfit.
#[async_trait]
pub trait OutfitStrategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    async fn generate(&self, ctx: &StrategyContext<'_>) -> Result<FitResult, FitError>;
}

/// Sends one request and records it in the generation log: prompt, retries,
/// decoded response or failure.
pub(crate) async fn call_oracle<T>(
    oracle: &OracleClient,
    request: &OracleRequest,
    stage: &str,
    ctx: &StrategyContext<'_>,
) -> Result<T, FitError>
where
    T: DeserializeOwned + Serialize,
{
    ctx.log
        .log_prompt_sent(
            stage,
            &format!("{}\n\n{}", request.system_instruction, request.user_instruction),
            request.temperature,
        )
        .await;

    match oracle.generate_counted::<T>(request, ctx.cancel).await {
        Ok((value, attempts)) => {
            if attempts > 1 {
                ctx.log.log_retries(stage, attempts, true).await;
            }
            let raw = serde_json::to_value(&value).unwrap_or_default();
            ctx.log.log_response_received(stage, &raw).await;
            debug!(stage, attempts, "oracle response decoded");
            Ok(value)
        }
        Err(e) => {
            if let FitError::Oracle { attempts, .. } = &e {
                if *attempts > 1 {
                    ctx.log.log_retries(stage, *attempts, false).await;
                }
            }
            warn!(stage, error = %e, "oracle call failed");
            ctx.log.log_error(e.code(), &e.to_string()).await;
            Err(e)
        }
    }
}

/// Turns a decoded value into a trusted one and records the outcome.
pub(crate) async fn record_validation<T>(
    stage: &str,
    ctx: &StrategyContext<'_>,
    outcome: Result<T, FitError>,
) -> Result<T, FitError> {
    match &outcome {
        Ok(_) => ctx.log.log_validation(stage, true, None).await,
        Err(e) => {
            warn!(stage, error = %e, "validation failed");
            ctx.log
                .log_validation(stage, false, Some(&e.to_string()))
                .await
        }
    }
    outcome
}
