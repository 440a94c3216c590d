use crate::archetypes::ArchetypeCatalog;
use crate::config::EngineConfig;
use crate::domain::types::{ClothingItem, FitResult, StrategyKind};
use crate::error::FitError;
use crate::inventory::project;
use crate::logging::{GenerationLog, TelemetrySink, TracingSink};
use crate::oracle::{GenerativeTransport, OracleClient};
use crate::strategies::multi_stage::MultiStageStrategy;
use crate::strategies::single_pass::SinglePassStrategy;
use crate::strategies::template::TemplateStrategy;
use crate::strategies::{OutfitStrategy, StrategyContext};
use crate::variants::{AlternateOutfits, VariantGenerator};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

/// One outfit request.
#[derive(Debug, Clone)]
pub struct OutfitRequest {
    pub intent: String,
    pub inventory: Vec<ClothingItem>,
    /// Garments lent by someone else, appended after the caller's own.
    pub borrowed: Vec<ClothingItem>,
    pub strategy: StrategyKind,
}

impl OutfitRequest {
    pub fn new(intent: impl Into<String>, inventory: Vec<ClothingItem>, strategy: StrategyKind) -> Self {
        Self {
            intent: intent.into(),
            inventory,
            borrowed: Vec::new(),
            strategy,
        }
    }

    pub fn with_borrowed(mut self, borrowed: Vec<ClothingItem>) -> Self {
        self.borrowed = borrowed;
        self
    }
}

/// The verified primary outfit plus the stream of background alternates.
pub struct OutfitGeneration {
    pub generation_id: Uuid,
    pub result: FitResult,
    pub alternates: AlternateOutfits,
}

pub struct OutfitOrchestrator {
    catalog: Arc<ArchetypeCatalog>,
    config: EngineConfig,
    telemetry: Arc<dyn TelemetrySink>,
    single_pass: SinglePassStrategy,
    multi_stage: MultiStageStrategy,
    template: TemplateStrategy,
    variants: VariantGenerator,
}

impl OutfitOrchestrator {
    pub fn new(
        transport: Arc<dyn GenerativeTransport>,
        catalog: Arc<ArchetypeCatalog>,
        config: EngineConfig,
    ) -> Self {
        let oracle = OracleClient::new(transport)
            .with_retry(config.retry_policy())
            .with_call_timeout(config.call_timeout());
        let t = &config.temperatures;

        Self {
            single_pass: SinglePassStrategy::new(oracle.clone(), t.single_pass),
            multi_stage: MultiStageStrategy::new(oracle.clone(), t.candidates, t.critique),
            template: TemplateStrategy::new(oracle.clone(), catalog.clone(), t.template),
            variants: VariantGenerator::new(oracle, t.variants),
            catalog,
            config,
            telemetry: Arc::new(TracingSink),
        }
    }

    pub fn with_telemetry(mut self, telemetry: Arc<dyn TelemetrySink>) -> Self {
        self.telemetry = telemetry;
        self
    }

    pub fn catalog(&self) -> &ArchetypeCatalog {
        &self.catalog
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn strategy(&self, kind: StrategyKind) -> &dyn OutfitStrategy {
        match kind {
            StrategyKind::SinglePass => &self.single_pass,
            StrategyKind::MultiStage => &self.multi_stage,
            StrategyKind::Template => &self.template,
        }
    }

    /// Generates an outfit from the caller's own inventory.
    pub async fn generate_outfit(
        &self,
        intent: &str,
        inventory: &[ClothingItem],
        strategy: StrategyKind,
    ) -> Result<OutfitGeneration, FitError> {
        let request = OutfitRequest::new(intent, inventory.to_vec(), strategy);
        self.generate(&request, &CancellationToken::new()).await
    }

    /// Projects the inventory, runs the selected strategy and starts the
    /// background variants. `cancel` aborts the primary path and the
    /// variants alike.
    pub async fn generate(
        &self,
        request: &OutfitRequest,
        cancel: &CancellationToken,
    ) -> Result<OutfitGeneration, FitError> {
        let generation_id = Uuid::new_v4();
        let log = GenerationLog::new(self.telemetry.clone(), generation_id.to_string());
        let started = Instant::now();
        info!(%generation_id, strategy = %request.strategy, "outfit requested");

        let inventory = match project(&request.inventory, &request.borrowed) {
            Ok(inventory) => inventory,
            Err(e) => {
                warn!(error = %e, "inventory rejected");
                log.log_error(e.code(), &e.to_string()).await;
                return Err(e);
            }
        };
        info!(items = inventory.len(), borrowed = request.borrowed.len(), "inventory projected");
        log.log_generation_start(&request.intent, inventory.len()).await;
        if request.strategy != StrategyKind::Template {
            log.log_strategy_selected(&request.strategy.to_string(), None)
                .await;
        }

        let ctx = StrategyContext {
            intent: &request.intent,
            inventory: &inventory,
            log: &log,
            cancel,
        };
        let strategy = self.strategy(request.strategy);
        let outcome = match self.config.request_timeout() {
            Some(budget) => tokio::time::timeout(budget, strategy.generate(&ctx))
                .await
                .unwrap_or(Err(FitError::DeadlineExceeded { budget })),
            None => strategy.generate(&ctx).await,
        };

        let result = match outcome {
            Ok(result) => result,
            Err(e) => {
                warn!(%generation_id, code = e.code(), error = %e, "generation failed");
                if matches!(e, FitError::DeadlineExceeded { .. }) {
                    log.log_error(e.code(), &e.to_string()).await;
                }
                return Err(e);
            }
        };

        log.log_generation_end(
            result.outfit_ids(),
            result.confidence_score(),
            started.elapsed().as_millis(),
        )
        .await;
        info!(
            %generation_id,
            top = result.top_id(),
            bottom = result.bottom_id(),
            shoes = result.shoes_id(),
            "outfit generated"
        );

        let alternates = if self.config.variants.enabled {
            self.variants.spawn(
                &request.intent,
                Arc::new(inventory),
                &result,
                log,
                cancel,
            )
        } else {
            AlternateOutfits::disabled()
        };

        Ok(OutfitGeneration {
            generation_id,
            result,
            alternates,
        })
    }
}
