pub mod archetypes;
pub mod config;
pub mod domain;
pub mod error;
pub mod gates;
pub mod inventory;
pub mod logging;
pub mod oracle;
pub mod orchestrator;
pub mod retry;
pub mod strategies;
pub mod variants;

pub use archetypes::{ArchetypeCatalog, OccasionArchetype};
pub use config::EngineConfig;
pub use domain::types::{
    AlternativeItems, Category, ClothingItem, FitResult, ItemAttributes, OutfitCandidate,
    OutfitProposal, ProjectedItem, Reasoning, StrategyKind,
};
pub use error::{FitError, OracleError};
pub use orchestrator::{OutfitGeneration, OutfitOrchestrator, OutfitRequest};
pub use variants::AlternateOutfits;
