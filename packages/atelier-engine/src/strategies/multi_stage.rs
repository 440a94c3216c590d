use crate::domain::types::{AlternativeItems, FitResult, OutfitCandidate, OutfitProposal, StrategyKind};
use crate::error::FitError;
use crate::gates::consistency::CandidateValidator;
use crate::oracle::schema::{self, CANDIDATE_COUNT};
use crate::oracle::{OracleClient, OracleRequest};
use crate::strategies::prompt;
use crate::strategies::{OutfitStrategy, StrategyContext, call_oracle, record_validation};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MultiStagePhase {
    GeneratingCandidates,
    Critiquing,
    Selected,
    Failed,
}

impl MultiStagePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            MultiStagePhase::GeneratingCandidates => "generating_candidates",
            MultiStagePhase::Critiquing => "critiquing",
            MultiStagePhase::Selected => "selected",
            MultiStagePhase::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateSet {
    pub candidates: Vec<OutfitCandidate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateCritique {
    pub ordinal: u32,
    pub strengths: String,
    pub weaknesses: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CritiqueVerdict {
    #[serde(default)]
    pub critiques: Vec<CandidateCritique>,
    pub selected_ordinal: u32,
    pub rationale: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub missing_piece_suggestion: Option<String>,
}

/// Generate three candidates, critique them, select one.
pub struct MultiStageStrategy {
    oracle: OracleClient,
    candidate_temperature: f32,
    critique_temperature: f32,
}

impl MultiStageStrategy {
    pub fn new(oracle: OracleClient, candidate_temperature: f32, critique_temperature: f32) -> Self {
        Self {
            oracle,
            candidate_temperature,
            critique_temperature,
        }
    }

    async fn transition(phase: &mut MultiStagePhase, next: MultiStagePhase, ctx: &StrategyContext<'_>) {
        info!(from = phase.as_str(), to = next.as_str(), "multi-stage transition");
        ctx.log.log_stage_transition(phase.as_str(), next.as_str()).await;
        *phase = next;
    }

    async fn generate_candidates(&self, ctx: &StrategyContext<'_>) -> Result<Vec<OutfitCandidate>, FitError> {
        let request = OracleRequest {
            system_instruction: prompt::candidates_system_instruction(),
            user_instruction: prompt::candidates_user_instruction(ctx.intent, ctx.inventory, CANDIDATE_COUNT),
            response_schema: schema::candidate_set(),
            temperature: self.candidate_temperature,
        };
        let set: CandidateSet = call_oracle(&self.oracle, &request, "candidates", ctx).await?;
        let checked = CandidateValidator::check_candidates(&set.candidates, CANDIDATE_COUNT, ctx.inventory)
            .map(|_| set.candidates);
        record_validation("candidates", ctx, checked).await
    }

    async fn critique(
        &self,
        candidates: &[OutfitCandidate],
        ctx: &StrategyContext<'_>,
    ) -> Result<CritiqueVerdict, FitError> {
        let request = OracleRequest {
            system_instruction: prompt::critique_system_instruction(),
            user_instruction: prompt::critique_user_instruction(ctx.intent, ctx.inventory, candidates),
            response_schema: schema::critique_verdict(),
            temperature: self.critique_temperature,
        };
        call_oracle(&self.oracle, &request, "critique", ctx).await
    }

    async fn run(&self, phase: &mut MultiStagePhase, ctx: &StrategyContext<'_>) -> Result<FitResult, FitError> {
        let candidates = self.generate_candidates(ctx).await?;

        Self::transition(phase, MultiStagePhase::Critiquing, ctx).await;
        let verdict = self.critique(&candidates, ctx).await?;
        let selected = record_validation(
            "critique",
            ctx,
            CandidateValidator::check_selection(&candidates, verdict.selected_ordinal),
        )
        .await?;

        let proposal = selection_proposal(selected, &candidates, verdict);
        let result = record_validation("selection", ctx, FitResult::verified(proposal, ctx.inventory)).await?;
        Self::transition(phase, MultiStagePhase::Selected, ctx).await;
        Ok(result)
    }
}

/// Builds the final proposal: the selected candidate's ids and score, both
/// rationales, and the best-scoring runner-up as the alternative.
fn selection_proposal(
    selected: &OutfitCandidate,
    candidates: &[OutfitCandidate],
    verdict: CritiqueVerdict,
) -> OutfitProposal {
    let runner_up = candidates
        .iter()
        .filter(|c| c.ordinal != selected.ordinal)
        .max_by(|a, b| a.score.total_cmp(&b.score));

    OutfitProposal {
        top_id: selected.top_id.clone(),
        bottom_id: selected.bottom_id.clone(),
        shoes_id: selected.shoes_id.clone(),
        explanation: format!("{} {}", selected.rationale.trim(), verdict.rationale.trim()),
        reasoning: selected.reasoning.clone(),
        confidence_score: selected.score,
        alternative_items: runner_up.map(|c| AlternativeItems {
            top_id: Some(c.top_id.clone()),
            bottom_id: Some(c.bottom_id.clone()),
            shoes_id: Some(c.shoes_id.clone()),
        }),
        missing_piece_suggestion: verdict.missing_piece_suggestion,
    }
}

#[async_trait]
impl OutfitStrategy for MultiStageStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::MultiStage
    }

    async fn generate(&self, ctx: &StrategyContext<'_>) -> Result<FitResult, FitError> {
        let mut phase = MultiStagePhase::GeneratingCandidates;
        ctx.log.log_stage_transition("start", phase.as_str()).await;

        let outcome = self.run(&mut phase, ctx).await;
        if outcome.is_err() {
            Self::transition(&mut phase, MultiStagePhase::Failed, ctx).await;
        }
        outcome
    }
}
