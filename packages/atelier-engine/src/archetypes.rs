use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

const BUILTIN_CATALOG: &str = include_str!("../data/archetypes.json");

/// Name of the archetype returned when no keyword matches.
pub const CUSTOM_ARCHETYPE: &str = "custom";

/// A named occasion with the styling constraints the template strategy
/// injects into its prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OccasionArchetype {
    pub name: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub style_guidelines: String,
    #[serde(default)]
    pub color_preferences: String,
    #[serde(default)]
    pub must_haves: Vec<String>,
    #[serde(default)]
    pub avoidances: Vec<String>,
}

impl OccasionArchetype {
    fn custom() -> Self {
        Self {
            name: CUSTOM_ARCHETYPE.to_string(),
            keywords: Vec::new(),
            style_guidelines: String::new(),
            color_preferences: String::new(),
            must_haves: Vec::new(),
            avoidances: Vec::new(),
        }
    }

    pub fn is_custom(&self) -> bool {
        self.name == CUSTOM_ARCHETYPE
    }

    /// True when the archetype carries no constraint at all.
    pub fn is_unconstrained(&self) -> bool {
        self.style_guidelines.trim().is_empty()
            && self.color_preferences.trim().is_empty()
            && self.must_haves.is_empty()
            && self.avoidances.is_empty()
    }

    fn matches(&self, lowered_intent: &str) -> bool {
        self.keywords
            .iter()
            .any(|k| !k.is_empty() && lowered_intent.contains(k.as_str()))
    }
}

/// Ordered, read-only set of archetypes. Classification walks them in
/// declaration order.
#[derive(Debug, Clone)]
pub struct ArchetypeCatalog {
    archetypes: Vec<OccasionArchetype>,
    fallback: OccasionArchetype,
}

impl ArchetypeCatalog {
    /// The catalog embedded in the crate.
    pub fn builtin() -> Result<Self> {
        Self::from_json(BUILTIN_CATALOG).context("Built-in archetype catalog is invalid")
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let entries: Vec<OccasionArchetype> =
            serde_json::from_str(json).context("Failed to parse archetype catalog")?;
        Self::from_archetypes(entries)
    }

    /// Reads a JSON array of archetypes from disk.
    pub async fn load(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read archetypes from {:?}", path))?;
        Self::from_json(&content).with_context(|| format!("Invalid archetype catalog {:?}", path))
    }

    pub fn from_archetypes(entries: Vec<OccasionArchetype>) -> Result<Self> {
        let mut seen = HashSet::new();
        let mut archetypes = Vec::with_capacity(entries.len());
        let mut fallback = None;

        for mut archetype in entries {
            let name = archetype.name.trim().to_string();
            if name.is_empty() {
                bail!("Archetype with empty name");
            }
            if !seen.insert(name.clone()) {
                bail!("Duplicate archetype '{}'", name);
            }
            archetype.name = name;
            archetype.keywords = archetype
                .keywords
                .iter()
                .map(|k| k.trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect();

            if archetype.is_custom() {
                fallback = Some(archetype);
                continue;
            }
            if archetype.keywords.is_empty() {
                bail!("Archetype '{}' has no keywords", archetype.name);
            }
            archetypes.push(archetype);
        }

        Ok(Self {
            archetypes,
            fallback: fallback.unwrap_or_else(OccasionArchetype::custom),
        })
    }

    /// First archetype, in declaration order, with a keyword contained in the
    /// lowercased intent. Falls back to `custom`.
    pub fn classify(&self, intent: &str) -> &OccasionArchetype {
        let lowered = intent.to_lowercase();
        self.archetypes
            .iter()
            .find(|a| a.matches(&lowered))
            .unwrap_or(&self.fallback)
    }

    pub fn get(&self, name: &str) -> Option<&OccasionArchetype> {
        if name == self.fallback.name {
            return Some(&self.fallback);
        }
        self.archetypes.iter().find(|a| a.name == name)
    }

    /// Keyword-bearing archetypes in classification order, followed by the
    /// fallback.
    pub fn iter(&self) -> impl Iterator<Item = &OccasionArchetype> {
        self.archetypes.iter().chain(std::iter::once(&self.fallback))
    }

    pub fn len(&self) -> usize {
        self.archetypes.len() + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}
