use crate::archetypes::OccasionArchetype;
use crate::domain::types::{FitResult, OutfitProposal, StrategyKind};
use crate::error::FitError;
use crate::inventory::ProjectedInventory;
use crate::oracle::{OracleClient, OracleRequest, schema};
use crate::strategies::prompt::{self, Variation};
use crate::strategies::{OutfitStrategy, StrategyContext, call_oracle, record_validation};
use async_trait::async_trait;
use tracing::info;

/// One call with the full inventory, worked examples, explicit reasoning
/// steps and the id rules stated twice.
pub struct SinglePassStrategy {
    oracle: OracleClient,
    temperature: f32,
}

impl SinglePassStrategy {
    pub fn new(oracle: OracleClient, temperature: f32) -> Self {
        Self { oracle, temperature }
    }

    /// The request this strategy sends. `archetype` adds hard constraints to
    /// the system instruction, `variation` asks for a different outfit.
    pub fn build_request(
        intent: &str,
        inventory: &ProjectedInventory,
        archetype: Option<&OccasionArchetype>,
        variation: Option<&Variation>,
        temperature: f32,
    ) -> OracleRequest {
        OracleRequest {
            system_instruction: prompt::stylist_system_instruction(archetype),
            user_instruction: prompt::single_outfit_user_instruction(intent, inventory, variation),
            response_schema: schema::outfit_proposal(),
            temperature,
        }
    }
}

/// Sends a single-outfit request and verifies the answer against the
/// inventory it was built from.
pub(crate) async fn propose(
    oracle: &OracleClient,
    request: &OracleRequest,
    stage: &str,
    ctx: &StrategyContext<'_>,
) -> Result<FitResult, FitError> {
    let proposal: OutfitProposal = call_oracle(oracle, request, stage, ctx).await?;
    record_validation(stage, ctx, FitResult::verified(proposal, ctx.inventory)).await
}

#[async_trait]
impl OutfitStrategy for SinglePassStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::SinglePass
    }

    async fn generate(&self, ctx: &StrategyContext<'_>) -> Result<FitResult, FitError> {
        info!(items = ctx.inventory.len(), "single-pass generation");
        let request = Self::build_request(ctx.intent, ctx.inventory, None, None, self.temperature);
        propose(&self.oracle, &request, "single_pass", ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::{Category, ClothingItem};
    use crate::inventory::project;
    use crate::logging::GenerationLog;
    use crate::logging::mocks::MemorySink;
    use crate::logging::LogEventType;
    use crate::oracle::mocks::MockTransport;
    use serde_json::json;
    use std::sync::Arc;
    use tokio_util::sync::CancellationToken;

    fn inventory() -> ProjectedInventory {
        project(
            &[
                ClothingItem::new("w-tee", Category::Top).with_color("white"),
                ClothingItem::new("b-jeans", Category::Bottom).with_color("blue"),
                ClothingItem::new("w-sneak", Category::Shoes).with_color("white"),
            ],
            &[],
        )
        .unwrap()
    }

    fn answer(bottom: &str) -> serde_json::Value {
        json!({
            "top_id": "w-tee",
            "bottom_id": bottom,
            "shoes_id": "w-sneak",
            "explanation": "Easy and clean.",
            "reasoning": {
                "color_harmony": "white and blue",
                "style_coherence": "casual",
                "occasion_fit": "relaxed"
            },
            "confidence_score": 78
        })
    }

    #[tokio::test]
    async fn test_single_call_verified_result() {
        let transport = MockTransport::new();
        transport.add_json(answer("b-jeans"));
        let sink = MemorySink::new();
        let log = GenerationLog::new(Arc::new(sink.clone()), "g");
        let inventory = inventory();
        let cancel = CancellationToken::new();
        let ctx = StrategyContext {
            intent: "coffee",
            inventory: &inventory,
            log: &log,
            cancel: &cancel,
        };

        let strategy = SinglePassStrategy::new(OracleClient::new(Arc::new(transport.clone())), 0.3);
        let result = strategy.generate(&ctx).await.unwrap();

        assert_eq!(result.outfit_ids(), ["w-tee", "b-jeans", "w-sneak"]);
        assert_eq!(transport.call_count(), 1);
        let request = &transport.requests()[0];
        assert_eq!(request.temperature, 0.3);
        assert!(request.user_instruction.contains("OCCASION: coffee"));
        assert_eq!(sink.of_type(LogEventType::PromptSent).len(), 1);
        assert_eq!(sink.of_type(LogEventType::ValidationResult).len(), 1);
    }

    #[tokio::test]
    async fn test_hallucinated_id_is_surfaced_without_retry() {
        let transport = MockTransport::new();
        transport.add_json(answer("grey-chinos"));
        transport.add_json(answer("b-jeans"));
        let log = GenerationLog::new(Arc::new(MemorySink::new()), "g");
        let inventory = inventory();
        let cancel = CancellationToken::new();
        let ctx = StrategyContext {
            intent: "coffee",
            inventory: &inventory,
            log: &log,
            cancel: &cancel,
        };

        let strategy = SinglePassStrategy::new(OracleClient::new(Arc::new(transport.clone())), 0.3);
        let err = strategy.generate(&ctx).await.unwrap_err();

        assert!(matches!(err, FitError::HallucinatedReference { ref offending_id, .. } if offending_id == "grey-chinos"));
        assert_eq!(transport.call_count(), 1);
    }
}
