//! Supplementary outfits generated after the primary result has been
//! returned. Nothing here can fail the primary request.

use crate::domain::types::FitResult;
use crate::error::FitError;
use crate::inventory::ProjectedInventory;
use crate::logging::GenerationLog;
use crate::oracle::OracleClient;
use crate::strategies::StrategyContext;
use crate::strategies::prompt::Variation;
use crate::strategies::single_pass::{SinglePassStrategy, propose};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, info, warn};

/// The variations requested for every primary result, in spawn order.
pub const VARIATIONS: [&str; 2] = ["different color combination", "different style"];

/// How a background variant ended.
#[derive(Debug)]
pub enum VariantOutcome {
    Delivered(FitResult),
    Failed { variation: String, error: FitError },
    /// The oracle answered with the primary combination again.
    Duplicate { variation: String },
    Cancelled,
}

/// Telemetry reason for a variant that repeated the primary outfit.
pub const DUPLICATE_REASON: &str = "duplicate_of_primary";

/// Receiving end for background variants. Yields only verified results;
/// dropping it cancels the variants still running.
pub struct AlternateOutfits {
    rx: Option<mpsc::Receiver<FitResult>>,
    _guard: Option<DropGuard>,
}

impl AlternateOutfits {
    /// No variants will arrive.
    pub fn disabled() -> Self {
        Self {
            rx: None,
            _guard: None,
        }
    }

    /// Next delivered variant, or `None` once every variant has finished.
    pub async fn next(&mut self) -> Option<FitResult> {
        match self.rx.as_mut() {
            Some(rx) => rx.recv().await,
            None => None,
        }
    }

    /// Waits for all variants and returns the ones that succeeded.
    pub async fn collect(mut self) -> Vec<FitResult> {
        let mut delivered = Vec::new();
        while let Some(result) = self.next().await {
            delivered.push(result);
        }
        delivered
    }
}

/// Spawns the low-priority variant requests.
#[derive(Clone)]
pub struct VariantGenerator {
    oracle: OracleClient,
    temperature: f32,
}

impl VariantGenerator {
    pub fn new(oracle: OracleClient, temperature: f32) -> Self {
        Self { oracle, temperature }
    }

    /// Starts one detached task per entry of [`VARIATIONS`]. The tasks
    /// observe a child of `session`.
    pub fn spawn(
        &self,
        intent: &str,
        inventory: Arc<ProjectedInventory>,
        primary: &FitResult,
        log: GenerationLog,
        session: &CancellationToken,
    ) -> AlternateOutfits {
        let token = session.child_token();
        let (tx, rx) = mpsc::channel(VARIATIONS.len());

        for label in VARIATIONS {
            let variation = Variation::new(label, primary.outfit_ids());
            let primary_ids = variation.avoid.clone();
            let generator = self.clone();
            let intent = intent.to_string();
            let inventory = inventory.clone();
            let log = log.clone();
            let token = token.clone();
            let tx = tx.clone();

            tokio::spawn(async move {
                // let the primary path run first
                tokio::task::yield_now().await;

                let outcome = generator
                    .run(&intent, &inventory, &variation, &primary_ids, &log, &token)
                    .await;
                match outcome {
                    VariantOutcome::Delivered(result) => {
                        info!(variation = %variation.label, "variant delivered");
                        log.log_variant_delivered(&variation.label, result.outfit_ids())
                            .await;
                        if tx.send(result).await.is_err() {
                            debug!(variation = %variation.label, "variant receiver dropped");
                        }
                    }
                    VariantOutcome::Failed { variation, error } => {
                        warn!(variation = %variation, error = %error, "variant failed");
                        log.log_variant_failed(&variation, error.code()).await;
                    }
                    VariantOutcome::Duplicate { variation } => {
                        info!(variation = %variation, "variant repeated the primary outfit");
                        log.log_variant_failed(&variation, DUPLICATE_REASON).await;
                    }
                    VariantOutcome::Cancelled => {
                        debug!(variation = %variation.label, "variant cancelled");
                    }
                }
            });
        }

        AlternateOutfits {
            rx: Some(rx),
            _guard: Some(token.drop_guard()),
        }
    }

    async fn run(
        &self,
        intent: &str,
        inventory: &ProjectedInventory,
        variation: &Variation,
        primary_ids: &[String; 3],
        log: &GenerationLog,
        cancel: &CancellationToken,
    ) -> VariantOutcome {
        if cancel.is_cancelled() {
            return VariantOutcome::Cancelled;
        }

        let ctx = StrategyContext {
            intent,
            inventory,
            log,
            cancel,
        };
        let request = SinglePassStrategy::build_request(
            intent,
            inventory,
            None,
            Some(variation),
            self.temperature,
        );
        let stage = format!("variant: {}", variation.label);

        match propose(&self.oracle, &request, &stage, &ctx).await {
            Ok(result) if result.outfit_ids() == primary_ids.each_ref().map(String::as_str) => {
                VariantOutcome::Duplicate {
                    variation: variation.label.clone(),
                }
            }
            Ok(result) => VariantOutcome::Delivered(result),
            Err(FitError::Cancelled) => VariantOutcome::Cancelled,
            Err(error) => VariantOutcome::Failed {
                variation: variation.label.clone(),
                error,
            },
        }
    }
}
