//! Prompt text shared by the generation strategies.

use crate::archetypes::OccasionArchetype;
use crate::domain::types::OutfitCandidate;
use crate::inventory::ProjectedInventory;

/// Stated in the system instruction and restated in every user instruction.
pub const ID_RULES: &str = "\
RULES FOR ITEM IDS:
1. Use ONLY ids that appear in the INVENTORY list. Copy them character for character.
2. Never invent, translate, shorten or describe an id. An id is not a garment name.
3. top_id must be a top, bottom_id a bottom, shoes_id shoes, when the inventory allows it.
4. If nothing fits perfectly, pick the closest item from the inventory and say what is missing in missing_piece_suggestion.";

const REASONING_STEPS: &str = "\
Before answering, reason step by step:
1. Color harmony: which colors in the inventory work together for this occasion?
2. Style coherence: which pieces share a style so the outfit reads as one look?
3. Occasion fit: does the combination suit the stated occasion, season and setting?
Only then write the JSON answer. Put the conclusion of each step in reasoning.color_harmony, reasoning.style_coherence and reasoning.occasion_fit.";

const FEW_SHOT_EXAMPLES: &str = r#"EXAMPLE
Inventory: [{"id":"a91f","attributes":{"category":"top","color":"white","subcategory":"oxford shirt"}},{"id":"c22e","attributes":{"category":"bottom","color":"navy","subcategory":"chinos"}},{"id":"77b0","attributes":{"category":"shoes","color":"brown","subcategory":"loafers"}},{"id":"e013","attributes":{"category":"shoes","color":"white","subcategory":"sneakers"}}]
Occasion: "lunch with my team"
Answer: {"top_id":"a91f","bottom_id":"c22e","shoes_id":"77b0","explanation":"A white oxford with navy chinos and brown loafers is smart without being stiff.","reasoning":{"color_harmony":"White and navy are a classic pair; brown adds warmth.","style_coherence":"All three pieces are smart-casual staples.","occasion_fit":"Polished enough for colleagues, relaxed enough for lunch."},"confidence_score":82,"alternative_items":{"shoes_id":"e013"}}
Note that every id in the answer ("a91f", "c22e", "77b0", "e013") is copied exactly from the inventory."#;

/// A request for an outfit that differs from one already given.
#[derive(Debug, Clone, PartialEq)]
pub struct Variation {
    pub label: String,
    pub avoid: [String; 3],
}

impl Variation {
    pub fn new(label: impl Into<String>, avoid: [&str; 3]) -> Self {
        Self {
            label: label.into(),
            avoid: avoid.map(str::to_string),
        }
    }
}

pub fn stylist_system_instruction(archetype: Option<&OccasionArchetype>) -> String {
    let mut out = String::from(
        "You are a personal stylist. You build complete outfits (one top, one bottom, one pair of shoes) \
         exclusively from the user's own wardrobe inventory.\n\n",
    );
    out.push_str(ID_RULES);
    out.push_str("\n\n");
    out.push_str(REASONING_STEPS);
    if let Some(archetype) = archetype {
        out.push_str("\n\n");
        out.push_str(&archetype_constraints(archetype));
    }
    out.push_str("\n\nRespond with JSON only.");
    out
}

/// Hard constraints for a classified occasion, injected verbatim.
pub fn archetype_constraints(archetype: &OccasionArchetype) -> String {
    let mut out = format!("OCCASION ARCHETYPE: {}\nThese are hard constraints:\n", archetype.name);
    if !archetype.style_guidelines.is_empty() {
        out.push_str(&format!("- Style guidelines: {}\n", archetype.style_guidelines));
    }
    if !archetype.color_preferences.is_empty() {
        out.push_str(&format!("- Color preferences: {}\n", archetype.color_preferences));
    }
    if !archetype.must_haves.is_empty() {
        out.push_str(&format!("- Must have: {}\n", archetype.must_haves.join("; ")));
    }
    if !archetype.avoidances.is_empty() {
        out.push_str(&format!("- Avoid: {}\n", archetype.avoidances.join("; ")));
    }
    out
}

fn inventory_block(inventory: &ProjectedInventory) -> String {
    format!(
        "INVENTORY ({} items):\n{}",
        inventory.len(),
        inventory.to_prompt_json()
    )
}

pub fn single_outfit_user_instruction(
    intent: &str,
    inventory: &ProjectedInventory,
    variation: Option<&Variation>,
) -> String {
    let mut out = format!("{}\n\n{}\n\nOCCASION: {}\n", FEW_SHOT_EXAMPLES, inventory_block(inventory), intent);

    if let Some(variation) = variation {
        out.push_str(&format!(
            "\nVARIATION: propose a {} than the outfit already suggested. \
             Do not repeat the combination top_id={}, bottom_id={}, shoes_id={}; change at least two of the three.\n",
            variation.label, variation.avoid[0], variation.avoid[1], variation.avoid[2]
        ));
    }

    out.push_str("\nPick one top, one bottom and one pair of shoes for this occasion. \
                  Optionally name alternative_items (single swaps) and a missing_piece_suggestion.\n\n");
    out.push_str(ID_RULES);
    out
}

pub fn candidates_system_instruction() -> String {
    format!(
        "You are a personal stylist generating several distinct outfit options from the user's wardrobe.\n\n{}\n\n\
         Score each candidate from 0 to 100 with these weights: color harmony 30, style coherence 30, \
         occasion fit 25, originality 15.\n\nRespond with JSON only.",
        ID_RULES
    )
}

pub fn candidates_user_instruction(intent: &str, inventory: &ProjectedInventory, count: usize) -> String {
    format!(
        "{}\n\nOCCASION: {}\n\nPropose exactly {} candidate outfits numbered with ordinal 1 to {}. \
         Any two candidates must differ in at least two of top, bottom and shoes. \
         Give each a rationale, a score and the reasoning triple.\n\n{}",
        inventory_block(inventory),
        intent,
        count,
        count,
        ID_RULES
    )
}

pub fn critique_system_instruction() -> String {
    "You are a demanding fashion editor. Critique each candidate outfit honestly, listing strengths and \
     weaknesses, then select the single best one by its ordinal. If the wardrobe lacks a piece that would \
     clearly improve the chosen outfit, name it in missing_piece_suggestion. Respond with JSON only."
        .to_string()
}

pub fn critique_user_instruction(
    intent: &str,
    inventory: &ProjectedInventory,
    candidates: &[OutfitCandidate],
) -> String {
    let candidates_json = serde_json::to_string_pretty(candidates).unwrap_or_default();
    let ordinals: Vec<String> = candidates.iter().map(|c| c.ordinal.to_string()).collect();
    format!(
        "{}\n\nOCCASION: {}\n\nCANDIDATES:\n{}\n\nselected_ordinal must be one of: {}.",
        inventory_block(inventory),
        intent,
        candidates_json,
        ordinals.join(", ")
    )
}
