use crate::archetypes::ArchetypeCatalog;
use crate::domain::types::{FitResult, StrategyKind};
use crate::error::FitError;
use crate::oracle::OracleClient;
use crate::strategies::single_pass::{SinglePassStrategy, propose};
use crate::strategies::{OutfitStrategy, StrategyContext};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

/// Classifies the intent into an occasion archetype and runs the single-pass
/// flow with that archetype's constraints.
pub struct TemplateStrategy {
    oracle: OracleClient,
    catalog: Arc<ArchetypeCatalog>,
    temperature: f32,
}

impl TemplateStrategy {
    pub fn new(oracle: OracleClient, catalog: Arc<ArchetypeCatalog>, temperature: f32) -> Self {
        Self {
            oracle,
            catalog,
            temperature,
        }
    }
}

#[async_trait]
impl OutfitStrategy for TemplateStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Template
    }

    async fn generate(&self, ctx: &StrategyContext<'_>) -> Result<FitResult, FitError> {
        let archetype = self.catalog.classify(ctx.intent);
        info!(archetype = %archetype.name, "intent classified");
        ctx.log
            .log_strategy_selected("template", Some(&archetype.name))
            .await;

        // custom carries no constraints, so the prompt is the plain single-pass one
        let constraints = (!archetype.is_unconstrained()).then_some(archetype);
        let request = SinglePassStrategy::build_request(
            ctx.intent,
            ctx.inventory,
            constraints,
            None,
            self.temperature,
        );
        propose(&self.oracle, &request, "template", ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::{Category, ClothingItem};
    use crate::inventory::project;
    use crate::logging::GenerationLog;
    use crate::logging::mocks::MemorySink;
    use crate::oracle::mocks::MockTransport;
    use serde_json::json;
    use tokio_util::sync::CancellationToken;

    async fn run(intent: &str) -> (MockTransport, MemorySink) {
        let transport = MockTransport::new();
        transport.add_json(json!({
            "top_id": "shirt",
            "bottom_id": "trousers",
            "shoes_id": "oxfords",
            "explanation": "Sharp and appropriate.",
            "reasoning": { "color_harmony": "a", "style_coherence": "b", "occasion_fit": "c" },
            "confidence_score": 90
        }));
        let inventory = project(
            &[
                ClothingItem::new("shirt", Category::Top),
                ClothingItem::new("trousers", Category::Bottom),
                ClothingItem::new("oxfords", Category::Shoes),
            ],
            &[],
        )
        .unwrap();
        let sink = MemorySink::new();
        let log = GenerationLog::new(Arc::new(sink.clone()), "g");
        let cancel = CancellationToken::new();
        let ctx = StrategyContext {
            intent,
            inventory: &inventory,
            log: &log,
            cancel: &cancel,
        };
        let strategy = TemplateStrategy::new(
            OracleClient::new(Arc::new(transport.clone())),
            Arc::new(ArchetypeCatalog::builtin().unwrap()),
            0.3,
        );
        strategy.generate(&ctx).await.unwrap();
        (transport, sink)
    }

    #[tokio::test]
    async fn test_work_meeting_constraints_reach_the_prompt() {
        let (transport, sink) = run("reunión de trabajo importante").await;
        let system = &transport.requests()[0].system_instruction;
        assert!(system.contains("OCCASION ARCHETYPE: work-meeting"));
        assert!(system.contains("closed-toe shoes"));

        let selected = sink.of_type(crate::logging::LogEventType::StrategySelected);
        assert_eq!(selected[0].details.as_ref().unwrap()["archetype"], "work-meeting");
    }

    #[tokio::test]
    async fn test_unmatched_intent_uses_unconstrained_prompt() {
        let (transport, _) = run("something unusual").await;
        assert!(!transport.requests()[0]
            .system_instruction
            .contains("OCCASION ARCHETYPE"));
    }
}
