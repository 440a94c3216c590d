use anyhow::Result;
use atelier_engine::config::load_config;
use atelier_engine::logging::{JsonlSink, LogEvent, LogEventType};
use atelier_engine::oracle::mocks::MockTransport;
use atelier_engine::{
    ArchetypeCatalog, ClothingItem, EngineConfig, FitError, OracleError, OutfitOrchestrator,
    OutfitRequest, StrategyKind,
};
use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::tempdir;
use tokio_util::sync::CancellationToken;

fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures")
}

fn wardrobe() -> Result<Vec<ClothingItem>> {
    let content = std::fs::read_to_string(fixtures_dir().join("wardrobe.json"))?;
    Ok(serde_json::from_str(&content)?)
}

fn outfit(ids: [&str; 3], confidence: u32) -> Value {
    json!({
        "top_id": ids[0],
        "bottom_id": ids[1],
        "shoes_id": ids[2],
        "explanation": "Tailored navy over charcoal keeps it sharp.",
        "reasoning": {
            "color_harmony": "Navy, charcoal and brown are calm together.",
            "style_coherence": "All smart, tailored pieces.",
            "occasion_fit": "Right level of polish for the room."
        },
        "confidence_score": confidence
    })
}

fn candidate(ordinal: u32, ids: [&str; 3], score: u32) -> Value {
    json!({
        "ordinal": ordinal,
        "top_id": ids[0],
        "bottom_id": ids[1],
        "shoes_id": ids[2],
        "rationale": format!("Option {} balances the wardrobe.", ordinal),
        "score": score,
        "reasoning": { "color_harmony": "ok", "style_coherence": "ok", "occasion_fit": "ok" }
    })
}

async fn read_events(path: &Path) -> Result<Vec<LogEvent>> {
    let content = tokio::fs::read_to_string(path).await?;
    content
        .lines()
        .map(|line| serde_json::from_str::<LogEvent>(line).map_err(anyhow::Error::from))
        .collect()
}

#[tokio::test]
async fn test_template_flow_with_custom_catalog_and_jsonl_log() -> Result<()> {
    let tmp = tempdir()?;
    let catalog = ArchetypeCatalog::load(&fixtures_dir().join("archetypes.json")).await?;
    let sink = Arc::new(JsonlSink::new(tmp.path()).await?);

    let transport = MockTransport::new();
    transport.add_json(outfit(
        ["8f2c-navy-blazer", "55e1-charcoal-trousers", "d4c8-brown-derbies"],
        86,
    ));
    transport.add_json(outfit(
        ["1a7d-white-oxford", "9b04-dark-jeans", "d4c8-brown-derbies"],
        72,
    ));
    // the second variant invents a garment and is dropped
    transport.add_json(outfit(
        ["8f2c-navy-blazer", "9b04-dark-jeans", "velvet-slippers"],
        65,
    ));

    let orchestrator = OutfitOrchestrator::new(
        Arc::new(transport.clone()),
        Arc::new(catalog),
        EngineConfig::default(),
    )
    .with_telemetry(sink.clone());

    let generation = orchestrator
        .generate_outfit("Vernissage at a small gallery", &wardrobe()?, StrategyKind::Template)
        .await?;

    assert_eq!(
        generation.result.outfit_ids(),
        ["8f2c-navy-blazer", "55e1-charcoal-trousers", "d4c8-brown-derbies"]
    );
    let system = &transport.requests()[0].system_instruction;
    assert!(system.contains("OCCASION ARCHETYPE: gallery-opening"));
    assert!(system.contains("sportswear; hoodies"));

    // non-prompt attributes never reach the oracle
    let user = &transport.requests()[0].user_instruction;
    assert!(!user.contains("Tailor & Co"));
    assert!(!user.contains("fabric"));

    let generation_id = generation.generation_id.to_string();
    let alternates = generation.alternates.collect().await;
    assert_eq!(alternates.len(), 1);
    assert_eq!(alternates[0].top_id(), "1a7d-white-oxford");

    let events = read_events(sink.log_file_path()).await?;
    assert!(
        events
            .iter()
            .all(|e| e.details.as_ref().unwrap()["generation_id"] == generation_id.as_str())
    );

    let types: Vec<&LogEventType> = events.iter().map(|e| &e.event_type).collect();
    assert_eq!(types[0], &LogEventType::GenerationStart);
    for expected in [
        LogEventType::StrategySelected,
        LogEventType::PromptSent,
        LogEventType::ResponseReceived,
        LogEventType::ValidationResult,
        LogEventType::GenerationEnd,
        LogEventType::VariantDelivered,
        LogEventType::VariantFailed,
    ] {
        assert!(types.contains(&&expected), "missing {:?} in {:?}", expected, types);
    }
    let failed = events
        .iter()
        .find(|e| e.event_type == LogEventType::VariantFailed)
        .unwrap();
    assert_eq!(failed.details.as_ref().unwrap()["reason"], "hallucinated_reference");

    Ok(())
}

#[tokio::test]
async fn test_multi_stage_flow_with_config_file() -> Result<()> {
    let config = load_config(&fixtures_dir().join("atelier.json")).await?;
    assert_eq!(config.retry.max_attempts, 4);
    assert!(!config.variants.enabled);
    let catalog = ArchetypeCatalog::load(config.archetypes_path.as_deref().unwrap()).await?;

    let transport = MockTransport::new();
    transport.add_error(OracleError::RateLimited("quota".into()));
    transport.add_json(json!({ "candidates": [
        candidate(1, ["8f2c-navy-blazer", "55e1-charcoal-trousers", "d4c8-brown-derbies"], 88),
        candidate(2, ["1a7d-white-oxford", "9b04-dark-jeans", "d4c8-brown-derbies"], 74),
        candidate(3, ["c310-grey-hoodie", "9b04-dark-jeans", "7e66-white-sneakers"], 40)
    ]}));
    transport.add_json(json!({
        "critiques": [
            { "ordinal": 1, "strengths": "polished", "weaknesses": "predictable" },
            { "ordinal": 2, "strengths": "relaxed", "weaknesses": "less formal" },
            { "ordinal": 3, "strengths": "comfortable", "weaknesses": "too casual" }
        ],
        "selected_ordinal": 2,
        "rationale": "Smart enough while still approachable.",
        "missing_piece_suggestion": "A knit tie"
    }));

    let tmp = tempdir()?;
    let sink = Arc::new(JsonlSink::new(tmp.path()).await?);
    let orchestrator =
        OutfitOrchestrator::new(Arc::new(transport.clone()), Arc::new(catalog), config)
            .with_telemetry(sink.clone());

    let request = OutfitRequest::new("client meeting", wardrobe()?, StrategyKind::MultiStage);
    let generation = orchestrator.generate(&request, &CancellationToken::new()).await?;
    let result = &generation.result;

    assert_eq!(
        result.outfit_ids(),
        ["1a7d-white-oxford", "9b04-dark-jeans", "d4c8-brown-derbies"]
    );
    assert_eq!(result.confidence_score(), 74.0);
    assert_eq!(
        result.alternative_items().unwrap().top_id.as_deref(),
        Some("8f2c-navy-blazer")
    );
    assert_eq!(result.missing_piece_suggestion(), Some("A knit tie"));
    assert!(generation.alternates.collect().await.is_empty());

    let requests = transport.requests();
    assert_eq!(requests.len(), 3);
    assert_eq!(requests[1].temperature, 1.0);
    assert_eq!(requests[2].temperature, 0.1);

    let events = read_events(sink.log_file_path()).await?;
    let retry = events
        .iter()
        .find(|e| e.event_type == LogEventType::RetryScheduled)
        .unwrap();
    assert_eq!(retry.details.as_ref().unwrap()["attempts"], 2);
    let stages: Vec<&str> = events
        .iter()
        .filter(|e| e.event_type == LogEventType::StageTransition)
        .map(|e| e.details.as_ref().unwrap()["to"].as_str().unwrap())
        .collect();
    assert_eq!(stages, vec!["generating_candidates", "critiquing", "selected"]);

    Ok(())
}

#[tokio::test]
async fn test_failed_generation_is_logged_and_surfaced() -> Result<()> {
    let tmp = tempdir()?;
    let sink = Arc::new(JsonlSink::new(tmp.path()).await?);
    let transport = MockTransport::new();
    transport.add_response("I think the navy blazer would look great!");

    let orchestrator = OutfitOrchestrator::new(
        Arc::new(transport.clone()),
        Arc::new(ArchetypeCatalog::builtin()?),
        EngineConfig::default(),
    )
    .with_telemetry(sink.clone());

    let err = orchestrator
        .generate_outfit("dinner", &wardrobe()?, StrategyKind::SinglePass)
        .await
        .err()
        .unwrap();

    assert!(matches!(err, FitError::SchemaViolation(_)));
    assert_eq!(transport.call_count(), 1);

    let events = read_events(sink.log_file_path()).await?;
    let error = events
        .iter()
        .find(|e| e.event_type == LogEventType::Error)
        .unwrap();
    assert_eq!(error.details.as_ref().unwrap()["code"], "schema_violation");
    assert!(events.iter().all(|e| e.event_type != LogEventType::GenerationEnd));

    Ok(())
}
