//! Response schemas sent with each request and enforced on each response.

use serde_json::{Value, json};

/// Number of candidates the multi-stage strategy asks for.
pub const CANDIDATE_COUNT: usize = 3;

fn reasoning() -> Value {
    json!({
        "type": "object",
        "required": ["color_harmony", "style_coherence", "occasion_fit"],
        "properties": {
            "color_harmony": { "type": "string", "minLength": 1 },
            "style_coherence": { "type": "string", "minLength": 1 },
            "occasion_fit": { "type": "string", "minLength": 1 }
        }
    })
}

/// A single outfit proposal (single-pass, template and variant calls).
pub fn outfit_proposal() -> Value {
    json!({
        "type": "object",
        "required": [
            "top_id",
            "bottom_id",
            "shoes_id",
            "explanation",
            "reasoning",
            "confidence_score"
        ],
        "properties": {
            "top_id": { "type": "string", "minLength": 1 },
            "bottom_id": { "type": "string", "minLength": 1 },
            "shoes_id": { "type": "string", "minLength": 1 },
            "explanation": { "type": "string", "minLength": 1 },
            "reasoning": reasoning(),
            "confidence_score": { "type": "number", "minimum": 0, "maximum": 100 },
            "alternative_items": {
                "type": "object",
                "properties": {
                    "top_id": { "type": "string" },
                    "bottom_id": { "type": "string" },
                    "shoes_id": { "type": "string" }
                }
            },
            "missing_piece_suggestion": { "type": "string" }
        }
    })
}

/// Stage one of the multi-stage strategy.
pub fn candidate_set() -> Value {
    json!({
        "type": "object",
        "required": ["candidates"],
        "properties": {
            "candidates": {
                "type": "array",
                "minItems": CANDIDATE_COUNT,
                "maxItems": CANDIDATE_COUNT,
                "items": {
                    "type": "object",
                    "required": [
                        "ordinal",
                        "top_id",
                        "bottom_id",
                        "shoes_id",
                        "rationale",
                        "score",
                        "reasoning"
                    ],
                    "properties": {
                        "ordinal": { "type": "integer", "minimum": 1 },
                        "top_id": { "type": "string", "minLength": 1 },
                        "bottom_id": { "type": "string", "minLength": 1 },
                        "shoes_id": { "type": "string", "minLength": 1 },
                        "rationale": { "type": "string", "minLength": 1 },
                        "score": { "type": "number", "minimum": 0, "maximum": 100 },
                        "reasoning": reasoning()
                    }
                }
            }
        }
    })
}

/// Stage two of the multi-stage strategy.
pub fn critique_verdict() -> Value {
    json!({
        "type": "object",
        "required": ["critiques", "selected_ordinal", "rationale"],
        "properties": {
            "critiques": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["ordinal", "strengths", "weaknesses"],
                    "properties": {
                        "ordinal": { "type": "integer" },
                        "strengths": { "type": "string" },
                        "weaknesses": { "type": "string" }
                    }
                }
            },
            "selected_ordinal": { "type": "integer" },
            "rationale": { "type": "string", "minLength": 1 },
            "missing_piece_suggestion": { "type": "string" }
        }
    })
}
