use crate::error::FitError;
use crate::gates::reference::ReferenceGate;
use crate::inventory::ProjectedInventory;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Wardrobe slot of a garment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    Top,
    Bottom,
    Shoes,
    Outerwear,
    OnePiece,
    Accessory,
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Category::Top => "top",
            Category::Bottom => "bottom",
            Category::Shoes => "shoes",
            Category::Outerwear => "outerwear",
            Category::OnePiece => "one-piece",
            Category::Accessory => "accessory",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemAttributes {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subcategory: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub style_tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub seasons: Vec<String>,
    /// Anything else the inventory stores (brand, fabric, photo urls...).
    /// Never sent to the oracle.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A garment from the caller's inventory. Read-only for the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClothingItem {
    pub id: String,
    pub category: Category,
    #[serde(default)]
    pub attributes: ItemAttributes,
}

impl ClothingItem {
    pub fn new(id: impl Into<String>, category: Category) -> Self {
        Self {
            id: id.into(),
            category,
            attributes: ItemAttributes::default(),
        }
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.attributes.color = Some(color.into());
        self
    }

    pub fn with_subcategory(mut self, subcategory: impl Into<String>) -> Self {
        self.attributes.subcategory = Some(subcategory.into());
        self
    }

    pub fn with_style_tags(mut self, tags: &[&str]) -> Self {
        self.attributes.style_tags = tags.iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn with_seasons(mut self, seasons: &[&str]) -> Self {
        self.attributes.seasons = seasons.iter().map(|s| s.to_string()).collect();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectedAttributes {
    pub category: Category,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subcategory: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub style_tags: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub seasons: Vec<String>,
}

/// The minimal view of a garment that goes into a prompt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectedItem {
    pub id: String,
    pub attributes: ProjectedAttributes,
}

impl From<&ClothingItem> for ProjectedItem {
    fn from(item: &ClothingItem) -> Self {
        Self {
            id: item.id.clone(),
            attributes: ProjectedAttributes {
                category: item.category,
                color: item.attributes.color.clone(),
                subcategory: item.attributes.subcategory.clone(),
                style_tags: item.attributes.style_tags.clone(),
                seasons: item.attributes.seasons.clone(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reasoning {
    pub color_harmony: String,
    pub style_coherence: String,
    pub occasion_fit: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlternativeItems {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bottom_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shoes_id: Option<String>,
}

impl AlternativeItems {
    pub fn is_empty(&self) -> bool {
        self.top_id.is_none() && self.bottom_id.is_none() && self.shoes_id.is_none()
    }
}

/// Wire shape of a single outfit as the oracle returns it. Untrusted until
/// it has been turned into a [`FitResult`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutfitProposal {
    pub top_id: String,
    pub bottom_id: String,
    pub shoes_id: String,
    pub explanation: String,
    pub reasoning: Reasoning,
    pub confidence_score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alternative_items: Option<AlternativeItems>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub missing_piece_suggestion: Option<String>,
}

/// One proposal of the multi-stage strategy's generation phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutfitCandidate {
    pub ordinal: u32,
    pub top_id: String,
    pub bottom_id: String,
    pub shoes_id: String,
    pub rationale: String,
    pub score: f64,
    pub reasoning: Reasoning,
}

impl OutfitCandidate {
    pub fn slots(&self) -> [&str; 3] {
        [&self.top_id, &self.bottom_id, &self.shoes_id]
    }
}

/// A recommendation whose item ids have all been checked against the
/// inventory of the request that produced it.
///
/// There is no `Deserialize` impl and no public constructor
/// other than [`FitResult::verified`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FitResult {
    top_id: String,
    bottom_id: String,
    shoes_id: String,
    explanation: String,
    reasoning: Reasoning,
    confidence_score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    alternative_items: Option<AlternativeItems>,
    #[serde(skip_serializing_if = "Option::is_none")]
    missing_piece_suggestion: Option<String>,
}

impl FitResult {
    /// Builds a result from an oracle proposal, rejecting unknown item ids,
    /// an out-of-range confidence and an empty explanation.
    pub fn verified(
        proposal: OutfitProposal,
        inventory: &ProjectedInventory,
    ) -> Result<Self, FitError> {
        ReferenceGate::verify(&proposal, inventory)?;

        if !(0.0..=100.0).contains(&proposal.confidence_score) {
            return Err(FitError::SchemaViolation(format!(
                "confidence_score {} outside 0-100",
                proposal.confidence_score
            )));
        }
        if proposal.explanation.trim().is_empty() {
            return Err(FitError::SchemaViolation(
                "explanation must not be empty".to_string(),
            ));
        }

        Ok(Self {
            top_id: proposal.top_id,
            bottom_id: proposal.bottom_id,
            shoes_id: proposal.shoes_id,
            explanation: proposal.explanation,
            reasoning: proposal.reasoning,
            confidence_score: proposal.confidence_score,
            alternative_items: proposal.alternative_items.filter(|alt| !alt.is_empty()),
            missing_piece_suggestion: proposal
                .missing_piece_suggestion
                .filter(|s| !s.trim().is_empty()),
        })
    }

    pub fn top_id(&self) -> &str {
        &self.top_id
    }

    pub fn bottom_id(&self) -> &str {
        &self.bottom_id
    }

    pub fn shoes_id(&self) -> &str {
        &self.shoes_id
    }

    pub fn explanation(&self) -> &str {
        &self.explanation
    }

    pub fn reasoning(&self) -> &Reasoning {
        &self.reasoning
    }

    pub fn confidence_score(&self) -> f64 {
        self.confidence_score
    }

    pub fn alternative_items(&self) -> Option<&AlternativeItems> {
        self.alternative_items.as_ref()
    }

    pub fn missing_piece_suggestion(&self) -> Option<&str> {
        self.missing_piece_suggestion.as_deref()
    }

    pub fn outfit_ids(&self) -> [&str; 3] {
        [&self.top_id, &self.bottom_id, &self.shoes_id]
    }
}

/// Which generation strategy the orchestrator runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    SinglePass,
    MultiStage,
    Template,
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            StrategyKind::SinglePass => "single_pass",
            StrategyKind::MultiStage => "multi_stage",
            StrategyKind::Template => "template",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for StrategyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "single_pass" => Ok(Self::SinglePass),
            "multi_stage" => Ok(Self::MultiStage),
            "template" => Ok(Self::Template),
            other => Err(format!(
                "unknown strategy '{}' (expected single-pass, multi-stage or template)",
                other
            )),
        }
    }
}
