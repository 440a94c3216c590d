use anyhow::{Context, Result};
use atelier_engine::config::{self, CONFIG_FILE, EngineConfig};
use atelier_engine::logging::{JsonlSink, TelemetrySink, TracingSink};
use atelier_engine::oracle::gemini::GeminiTransport;
use atelier_engine::{
    ArchetypeCatalog, ClothingItem, FitResult, OccasionArchetype, OutfitOrchestrator,
    OutfitRequest, StrategyKind,
};
use clap::{Args, Parser, Subcommand};
use console::style;
use dialoguer::{Input, theme::ColorfulTheme};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Parser, Debug)]
#[command(name = "atelier", version, about = "Outfit recommendations from your own wardrobe", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Recommend an outfit for an occasion
    Generate(GenerateArgs),
    /// Show which occasion archetype an intent maps to
    Classify {
        intent: String,
        /// Archetype catalog (JSON); defaults to the built-in one
        #[arg(long)]
        archetypes: Option<PathBuf>,
    },
    /// List the occasion archetypes
    Archetypes {
        #[arg(long)]
        archetypes: Option<PathBuf>,
    },
}

#[derive(Args, Debug)]
struct GenerateArgs {
    /// Inventory file: a JSON array of clothing items
    #[arg(short, long)]
    inventory: PathBuf,

    /// Borrowed items, same format as the inventory
    #[arg(long)]
    borrowed: Option<PathBuf>,

    /// Occasion (prompts for it when omitted)
    #[arg(short = 'q', long)]
    intent: Option<String>,

    /// single-pass, multi-stage or template
    #[arg(short, long, default_value = "single-pass")]
    strategy: StrategyKind,

    /// Engine config (default: ./atelier.json when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Model override
    #[arg(long)]
    model: Option<String>,

    /// Skip the background alternates
    #[arg(long)]
    no_variants: bool,

    /// Write the JSONL generation log under <dir>/logs/
    #[arg(long)]
    log_dir: Option<PathBuf>,
}

fn setup_logging(debug: bool) {
    let filter = if debug {
        EnvFilter::new("info,atelier=debug,atelier_engine=debug")
    } else {
        EnvFilter::new("warn,atelier=info,atelier_engine=info")
    };

    fmt::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}

fn step_header(text: &str) {
    println!("\n{}", style(text).bold().cyan());
}

fn spinner(msg: &str) -> indicatif::ProgressBar {
    let spinner = indicatif::ProgressBar::new_spinner();
    spinner.set_message(msg.to_string());
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

async fn read_items(path: &Path) -> Result<Vec<ClothingItem>> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {:?}", path))?;
    serde_json::from_str(&content).with_context(|| format!("{:?} is not a JSON array of clothing items", path))
}

async fn load_catalog(path: Option<&Path>) -> Result<ArchetypeCatalog> {
    match path {
        Some(path) => ArchetypeCatalog::load(path).await,
        None => ArchetypeCatalog::builtin(),
    }
}

async fn resolve_config(args: &GenerateArgs) -> Result<EngineConfig> {
    let path = args
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(CONFIG_FILE));
    let mut config = config::load_config(&path).await?;

    if let Some(model) = &args.model {
        config.model = model.clone();
    }
    if args.no_variants {
        config.variants.enabled = false;
    }
    config.validate().context("Invalid configuration after overrides")?;
    Ok(config)
}

fn slot_line(slot: &str, id: &str, description: &str) -> String {
    format!("  {} {}{}", style(format!("{:<6}", slot)).dim(), id, description)
}

fn render_outfit(title: &str, result: &FitResult, inventory: &[ClothingItem]) {
    let describe = |id: &str| {
        inventory
            .iter()
            .find(|item| item.id == id)
            .and_then(|item| {
                let attrs = &item.attributes;
                match (&attrs.color, &attrs.subcategory) {
                    (Some(c), Some(s)) => Some(format!("{} {}", c, s)),
                    (Some(c), None) => Some(c.clone()),
                    (None, Some(s)) => Some(s.clone()),
                    (None, None) => None,
                }
            })
            .map(|d| format!(" ({})", d))
            .unwrap_or_default()
    };

    println!("\n{}", style(title).bold().green());
    for (slot, id) in ["top", "bottom", "shoes"].into_iter().zip(result.outfit_ids()) {
        println!("{}", slot_line(slot, id, &describe(id)));
    }
    println!("  {} {:.0}", style("confidence").dim(), result.confidence_score());
    println!("\n  {}", result.explanation());

    let reasoning = result.reasoning();
    println!("  {} {}", style("color").dim(), reasoning.color_harmony);
    println!("  {} {}", style("style").dim(), reasoning.style_coherence);
    println!("  {} {}", style("occasion").dim(), reasoning.occasion_fit);

    if let Some(alt) = result.alternative_items() {
        let swaps: Vec<String> = [
            ("top", alt.top_id.as_deref()),
            ("bottom", alt.bottom_id.as_deref()),
            ("shoes", alt.shoes_id.as_deref()),
        ]
        .iter()
        .filter_map(|(slot, id)| id.map(|id| format!("{}: {}", slot, id)))
        .collect();
        println!("  {} {}", style("swaps").dim(), swaps.join(", "));
    }
    if let Some(missing) = result.missing_piece_suggestion() {
        println!("  {} {}", style("consider adding").yellow(), missing);
    }
}

fn render_archetype(archetype: &OccasionArchetype) {
    println!("{}", style(&archetype.name).bold().cyan());
    if archetype.is_unconstrained() {
        println!("  {}", style("no constraints").dim());
        return;
    }
    if !archetype.keywords.is_empty() {
        println!("  {} {}", style("keywords").dim(), archetype.keywords.join(", "));
    }
    println!("  {} {}", style("style").dim(), archetype.style_guidelines);
    println!("  {} {}", style("colors").dim(), archetype.color_preferences);
    if !archetype.must_haves.is_empty() {
        println!("  {} {}", style("must have").dim(), archetype.must_haves.join("; "));
    }
    if !archetype.avoidances.is_empty() {
        println!("  {} {}", style("avoid").dim(), archetype.avoidances.join("; "));
    }
}

async fn run_generate(args: GenerateArgs) -> Result<()> {
    let config = resolve_config(&args).await?;
    let catalog = load_catalog(config.archetypes_path.as_deref()).await?;

    let inventory = read_items(&args.inventory).await?;
    let borrowed = match &args.borrowed {
        Some(path) => read_items(path).await?,
        None => Vec::new(),
    };

    let intent = match &args.intent {
        Some(intent) => intent.clone(),
        None => Input::with_theme(&ColorfulTheme::default())
            .with_prompt("What's the occasion?")
            .interact_text()?,
    };

    let api_key = std::env::var("GEMINI_API_KEY").context("GEMINI_API_KEY is not set")?;
    let transport = GeminiTransport::new(api_key).with_model(config.model.clone());

    let telemetry: Arc<dyn TelemetrySink> = match &args.log_dir {
        Some(dir) => Arc::new(JsonlSink::new(dir).await?),
        None => Arc::new(TracingSink),
    };

    let variants_enabled = config.variants.enabled;
    let orchestrator = OutfitOrchestrator::new(Arc::new(transport), Arc::new(catalog), config)
        .with_telemetry(telemetry);

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, cancelling");
            ctrl_c.cancel();
        }
    });

    step_header(&format!("Styling: {}", intent));
    info!(strategy = %args.strategy, items = inventory.len(), "starting generation");

    let mut all_items = inventory.clone();
    all_items.extend(borrowed.iter().cloned());
    let request = OutfitRequest::new(intent, inventory, args.strategy).with_borrowed(borrowed);

    let progress = spinner(&format!("Asking the stylist ({})...", args.strategy));
    let outcome = orchestrator.generate(&request, &cancel).await;
    progress.finish_and_clear();

    let mut generation = match outcome {
        Ok(generation) => generation,
        Err(e) => {
            println!("{}", style(format!("✘ {}", e)).red());
            return Err(e.into());
        }
    };

    render_outfit("Your outfit", &generation.result, &all_items);

    if variants_enabled {
        let progress = spinner("Looking for alternates...");
        let mut index = 0;
        while let Some(alternate) = generation.alternates.next().await {
            index += 1;
            progress.suspend(|| {
                render_outfit(&format!("Alternate {}", index), &alternate, &all_items)
            });
        }
        progress.finish_and_clear();
        if index == 0 {
            println!("\n{}", style("No alternates this time.").dim());
        }
    }

    Ok(())
}

async fn run_classify(intent: &str, archetypes: Option<&Path>) -> Result<()> {
    let catalog = load_catalog(archetypes).await?;
    let archetype = catalog.classify(intent);
    println!("{} → ", style(intent).italic());
    render_archetype(archetype);
    Ok(())
}

async fn run_archetypes(archetypes: Option<&Path>) -> Result<()> {
    let catalog = load_catalog(archetypes).await?;
    for archetype in catalog.iter() {
        render_archetype(archetype);
        println!();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.debug);

    match cli.command {
        Command::Generate(args) => run_generate(args).await,
        Command::Classify { intent, archetypes } => run_classify(&intent, archetypes.as_deref()).await,
        Command::Archetypes { archetypes } => run_archetypes(archetypes.as_deref()).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_generate() {
        let cli = Cli::try_parse_from([
            "atelier",
            "generate",
            "--inventory",
            "wardrobe.json",
            "--strategy",
            "multi-stage",
            "-q",
            "coffee date",
            "--no-variants",
        ])
        .unwrap();
        match cli.command {
            Command::Generate(args) => {
                assert_eq!(args.strategy, StrategyKind::MultiStage);
                assert_eq!(args.intent.as_deref(), Some("coffee date"));
                assert!(args.no_variants);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_rejects_unknown_strategy() {
        assert!(
            Cli::try_parse_from(["atelier", "generate", "-i", "w.json", "-s", "best"]).is_err()
        );
    }

    #[test]
    fn test_slot_lines_align() {
        let lines: Vec<String> = [("top", "tee-01"), ("bottom", "jeans-01"), ("shoes", "boots-01")]
            .iter()
            .map(|(slot, id)| console::strip_ansi_codes(&slot_line(slot, id, "")).to_string())
            .collect();
        assert_eq!(lines[0], "  top    tee-01");
        assert_eq!(lines[1], "  bottom jeans-01");
        assert_eq!(lines[2], "  shoes  boots-01");
        assert_eq!(
            console::strip_ansi_codes(&slot_line("bottom", "jeans-01", " (blue jeans)")),
            "  bottom jeans-01 (blue jeans)"
        );
    }

    #[tokio::test]
    async fn test_read_items() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("wardrobe.json");
        tokio::fs::write(
            &path,
            r#"[{"id": "t1", "category": "top", "attributes": {"color": "navy"}}]"#,
        )
        .await
        .unwrap();

        let items = read_items(&path).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].attributes.color.as_deref(), Some("navy"));

        tokio::fs::write(&path, r#"{"id": "t1"}"#).await.unwrap();
        assert!(read_items(&path).await.is_err());
    }

    #[tokio::test]
    async fn test_config_overrides() {
        let tmp = tempfile::tempdir().unwrap();
        let args = GenerateArgs {
            inventory: tmp.path().join("w.json"),
            borrowed: None,
            intent: None,
            strategy: StrategyKind::Template,
            config: Some(tmp.path().join(CONFIG_FILE)),
            model: Some("gemini-2.0-flash".to_string()),
            no_variants: true,
            log_dir: None,
        };
        let config = resolve_config(&args).await.unwrap();
        assert_eq!(config.model, "gemini-2.0-flash");
        assert!(!config.variants.enabled);
    }

    #[tokio::test]
    async fn test_builtin_catalog_when_no_path() {
        let catalog = load_catalog(None).await.unwrap();
        assert_eq!(catalog.classify("reunión de trabajo").name, "work-meeting");
    }
}
