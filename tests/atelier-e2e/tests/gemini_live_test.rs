#![cfg(feature = "e2e")]

use anyhow::Result;
use atelier_engine::oracle::gemini::GeminiTransport;
use atelier_engine::{ArchetypeCatalog, ClothingItem, EngineConfig, OutfitOrchestrator, StrategyKind};
use std::path::PathBuf;
use std::sync::Arc;

#[tokio::test]
async fn test_live_multi_stage_generation() -> Result<()> {
    let Ok(api_key) = std::env::var("GEMINI_API_KEY") else {
        println!("GEMINI_API_KEY not set, skipping");
        return Ok(());
    };

    let manifest_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    let content = std::fs::read_to_string(manifest_dir.join("fixtures/wardrobe.json"))?;
    let wardrobe: Vec<ClothingItem> = serde_json::from_str(&content)?;

    let mut config = EngineConfig::default();
    config.variants.enabled = false;
    let transport = GeminiTransport::new(api_key).with_model(config.model.clone());
    let orchestrator = OutfitOrchestrator::new(
        Arc::new(transport),
        Arc::new(ArchetypeCatalog::builtin()?),
        config,
    );

    let generation = orchestrator
        .generate_outfit("client meeting downtown", &wardrobe, StrategyKind::MultiStage)
        .await?;

    let result = &generation.result;
    println!("{}", serde_json::to_string_pretty(result)?);
    for id in result.outfit_ids() {
        assert!(wardrobe.iter().any(|item| item.id == id), "unknown id {}", id);
    }
    assert!((0.0..=100.0).contains(&result.confidence_score()));

    Ok(())
}
