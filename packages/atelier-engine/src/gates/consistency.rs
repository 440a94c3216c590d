use crate::domain::types::OutfitCandidate;
use crate::error::FitError;
use crate::gates::reference::ReferenceGate;
use crate::inventory::ProjectedInventory;
use std::collections::HashSet;

/// Two candidates count as distinct when they differ in at least this many
/// of the three slots.
pub const MIN_DIFFERING_SLOTS: usize = 2;

#[derive(Debug, Default)]
pub struct CandidateValidator;

impl CandidateValidator {
    /// Checks the candidate set produced by the generation stage: exact
    /// count, unique ordinals, known ids and pairwise distinctness.
    pub fn check_candidates(
        candidates: &[OutfitCandidate],
        expected: usize,
        inventory: &ProjectedInventory,
    ) -> Result<(), FitError> {
        if candidates.len() != expected {
            return Err(FitError::SchemaViolation(format!(
                "expected {} candidates, got {}",
                expected,
                candidates.len()
            )));
        }

        let mut ordinals = HashSet::new();
        for candidate in candidates {
            if !ordinals.insert(candidate.ordinal) {
                return Err(FitError::SchemaViolation(format!(
                    "candidate ordinal {} appears more than once",
                    candidate.ordinal
                )));
            }
            ReferenceGate::verify(candidate, inventory)?;
        }

        for (i, a) in candidates.iter().enumerate() {
            for b in &candidates[i + 1..] {
                let differing = Self::differing_slots(a, b);
                if differing < MIN_DIFFERING_SLOTS {
                    return Err(FitError::SchemaViolation(format!(
                        "candidates {} and {} differ in {} item(s), at least {} required",
                        a.ordinal, b.ordinal, differing, MIN_DIFFERING_SLOTS
                    )));
                }
            }
        }

        Ok(())
    }

    /// Resolves the critique's choice against the candidate set.
    pub fn check_selection(
        candidates: &[OutfitCandidate],
        selected: u32,
    ) -> Result<&OutfitCandidate, FitError> {
        candidates
            .iter()
            .find(|c| c.ordinal == selected)
            .ok_or_else(|| FitError::StageMismatch {
                selected,
                available: candidates.iter().map(|c| c.ordinal).collect(),
            })
    }

    pub fn differing_slots(a: &OutfitCandidate, b: &OutfitCandidate) -> usize {
        a.slots()
            .iter()
            .zip(b.slots().iter())
            .filter(|(x, y)| x != y)
            .count()
    }
}
