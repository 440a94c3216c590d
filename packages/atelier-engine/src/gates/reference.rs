use crate::domain::types::{AlternativeItems, FitResult, OutfitCandidate, OutfitProposal};
use crate::error::FitError;
use crate::inventory::ProjectedInventory;

/// Anything that points at inventory items by id.
pub trait ItemReferences {
    /// `(field, id)` pairs, in the order they should be checked.
    fn item_references(&self) -> Vec<(&'static str, &str)>;
}

fn push_alternatives<'a>(refs: &mut Vec<(&'static str, &'a str)>, alt: Option<&'a AlternativeItems>) {
    if let Some(alt) = alt {
        if let Some(id) = alt.top_id.as_deref() {
            refs.push(("alternative_items.top_id", id));
        }
        if let Some(id) = alt.bottom_id.as_deref() {
            refs.push(("alternative_items.bottom_id", id));
        }
        if let Some(id) = alt.shoes_id.as_deref() {
            refs.push(("alternative_items.shoes_id", id));
        }
    }
}

impl ItemReferences for OutfitProposal {
    fn item_references(&self) -> Vec<(&'static str, &str)> {
        let mut refs = vec![
            ("top_id", self.top_id.as_str()),
            ("bottom_id", self.bottom_id.as_str()),
            ("shoes_id", self.shoes_id.as_str()),
        ];
        push_alternatives(&mut refs, self.alternative_items.as_ref());
        refs
    }
}

impl ItemReferences for FitResult {
    fn item_references(&self) -> Vec<(&'static str, &str)> {
        let mut refs = vec![
            ("top_id", self.top_id()),
            ("bottom_id", self.bottom_id()),
            ("shoes_id", self.shoes_id()),
        ];
        push_alternatives(&mut refs, self.alternative_items());
        refs
    }
}

impl ItemReferences for OutfitCandidate {
    fn item_references(&self) -> Vec<(&'static str, &str)> {
        vec![
            ("top_id", self.top_id.as_str()),
            ("bottom_id", self.bottom_id.as_str()),
            ("shoes_id", self.shoes_id.as_str()),
        ]
    }
}

/// The trust boundary between oracle output and the caller: every id the
/// oracle mentions must exist in the inventory the prompt was built from.
#[derive(Debug, Default)]
pub struct ReferenceGate;

impl ReferenceGate {
    pub fn verify(subject: &impl ItemReferences, inventory: &ProjectedInventory) -> Result<(), FitError> {
        for (field, id) in subject.item_references() {
            if !inventory.contains(id) {
                return Err(FitError::HallucinatedReference {
                    field: field.to_string(),
                    offending_id: id.to_string(),
                });
            }
        }
        Ok(())
    }
}
