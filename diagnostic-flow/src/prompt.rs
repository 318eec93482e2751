use serde_json::{Value, json};

use crate::{ladder::CostLadder, types::RecommendationRequest};

pub const SYSTEM_PREAMBLE: &str = "You are a medical decision-support assistant. \
Respond with VALID JSON only (no text outside JSON). \
Do NOT give treatment or definitive diagnoses.";

fn constraints(min_cost: i64, ladder: &CostLadder) -> Vec<String> {
    vec![
        "Always consider common diseases before rare ones.".to_string(),
        "Prefer low-cost, non-invasive screening tests first; escalate only if needed.".to_string(),
        "Balance information gain with low cost and common prevalence.".to_string(),
        format!("Only suggest tests with a cost strictly greater than min_cost ({min_cost})."),
        format!("Pick cost_weight from COST_SCALE = {:?}.", ladder.rungs()),
        "Choose a cost_weight from COST_SCALE that is clinically reasonable given the context; \
         it must be strictly greater than min_cost."
            .to_string(),
        "Never jump to expensive/specialized tests unless emergency red flags are present."
            .to_string(),
        "Return STRICT JSON with fields: test_name, description, cost_weight, \
         diseases (array of exactly two short names)."
            .to_string(),
    ]
}

/// JSON payload sent as the user message for a single recommendation
pub fn build_user_payload(request: &RecommendationRequest, ladder: &CostLadder) -> Value {
    let prior_summary: Vec<Value> = request
        .previous_tests
        .iter()
        .map(|t| {
            json!({
                "test_name": t.test_name,
                "result": t.result,
                "cost_weight": t.cost_weight,
            })
        })
        .collect();

    json!({
        "symptoms": request.symptoms,
        "previous_tests": prior_summary,
        "min_cost": request.min_cost,
        "constraints": constraints(request.min_cost, ladder),
        "format": {
            "type": "object",
            "example": {
                "test_name": "Pulse oximetry",
                "description": "Non-invasive estimate of oxygen saturation.",
                "cost_weight": 5,
                "diseases": ["Influenza", "Common cold"],
            },
        },
    })
}
