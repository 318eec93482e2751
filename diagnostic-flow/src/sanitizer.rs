//! Turns one raw model reply into a [`Recommendation`] the rest of the system can trust.
//!
//! The model is asked for strict JSON but nothing enforces it, so every field is
//! coerced rather than validated:
//!
//! * stray prose around the object is cut back to the outermost braces,
//! * `cost_weight` goes through a cast chain and is then snapped onto the ladder,
//!   strictly above the (possibly red-flag escalated) floor,
//! * a test the patient already had is renamed as a follow-up,
//! * `diseases` is forced to exactly two entries.

use std::collections::HashSet;

use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::{
    error::{FlowError, Result},
    ladder::CostLadder,
    types::{Recommendation, RecommendationRequest, value_text},
};

pub const FOLLOW_UP_PREFIX: &str = "Follow-up: ";
pub const UNDIFFERENTIATED: &str = "Undifferentiated";

/// Cut the text down to its outermost `{ ... }`. Returns `"{}"` when either brace is missing.
pub fn trim_to_braces(raw: &str) -> &str {
    let mut text = raw.trim();
    if !text.starts_with('{') {
        text = match text.find('{') {
            Some(start) => &text[start..],
            None => return "{}",
        };
    }
    if !text.ends_with('}') {
        text = match text.rfind('}') {
            Some(end) => &text[..=end],
            None => return "{}",
        };
    }
    text
}

/// Best-effort integer from whatever the model put in `cost_weight`; 0 when nothing fits.
pub fn coerce_cost(value: &Value) -> i64 {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.trunc() as i64))
            .unwrap_or(0),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| {
                    s.parse::<f64>()
                        .ok()
                        .filter(|f| f.is_finite())
                        .map(|f| f.trunc() as i64)
                })
                .unwrap_or(0)
        }
        Value::Bool(b) => i64::from(*b),
        _ => 0,
    }
}

/// Exactly two trimmed, non-empty disease names, padded with [`UNDIFFERENTIATED`].
pub fn normalize_diseases(value: Option<&Value>) -> [String; 2] {
    let mut names = value
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .map(|d| value_text(d).trim().to_string())
        .filter(|d| !d.is_empty());

    let first = names.next().unwrap_or_else(|| UNDIFFERENTIATED.to_string());
    let second = names.next().unwrap_or_else(|| UNDIFFERENTIATED.to_string());
    [first, second]
}

fn text_field(data: &Map<String, Value>, key: &str) -> String {
    data.get(key)
        .map(value_text)
        .unwrap_or_default()
        .trim()
        .to_string()
}

/// Sanitize a raw model reply against the request that produced it.
pub fn sanitize(
    raw: &str,
    request: &RecommendationRequest,
    ladder: &CostLadder,
) -> Result<Recommendation> {
    let text = trim_to_braces(raw);
    let parsed: Value = serde_json::from_str(text)
        .map_err(|e| FlowError::Parse(format!("{}. Raw response: {}", e, raw)))?;
    let Value::Object(data) = parsed else {
        return Err(FlowError::Parse(format!(
            "expected a JSON object. Raw response: {}",
            raw
        )));
    };

    let mut test_name = text_field(&data, "test_name");
    let description = text_field(&data, "description");

    let raw_cost = data.get("cost_weight").map(coerce_cost).unwrap_or(0);
    let floor = ladder.effective_floor(request.min_cost, &request.symptoms);
    let cost_weight = if !ladder.contains(raw_cost) || raw_cost <= floor {
        let snapped = ladder.next_allowed_cost(floor);
        debug!(raw_cost, floor, snapped, "Snapping cost_weight onto the ladder");
        snapped
    } else {
        raw_cost
    };

    let seen: HashSet<String> = request
        .previous_tests
        .iter()
        .map(|t| t.test_name.trim().to_lowercase())
        .collect();
    if seen.contains(&test_name.to_lowercase()) {
        info!(test_name = %test_name, "Repeated test, marking as follow-up");
        test_name = format!("{FOLLOW_UP_PREFIX}{test_name}");
    }

    Ok(Recommendation {
        test_name,
        description,
        cost_weight,
        diseases: normalize_diseases(data.get("diseases")),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PreviousTest;
    use serde_json::json;

    fn request(symptoms: &[&str], min_cost: i64) -> RecommendationRequest {
        RecommendationRequest {
            symptoms: symptoms.iter().map(|s| s.to_string()).collect(),
            previous_tests: Vec::new(),
            min_cost,
        }
    }

    fn reply(cost: Value, diseases: Value) -> String {
        json!({
            "test_name": "Chest X-ray",
            "description": "Imaging of the lungs.",
            "cost_weight": cost,
            "diseases": diseases,
        })
        .to_string()
    }

    #[test]
    fn trims_prose_around_the_object() {
        assert_eq!(trim_to_braces("Sure! {\"a\": 1} Hope that helps"), "{\"a\": 1}");
        assert_eq!(trim_to_braces("```json\n{\"a\": {}}\n```"), "{\"a\": {}}");
        assert_eq!(trim_to_braces("  {\"a\": 1}  "), "{\"a\": 1}");
        assert_eq!(trim_to_braces("no json here"), "{}");
        assert_eq!(trim_to_braces("{ unterminated"), "{}");
    }

    #[test]
    fn cost_coercion_chain() {
        assert_eq!(coerce_cost(&json!(15)), 15);
        assert_eq!(coerce_cost(&json!(15.9)), 15);
        assert_eq!(coerce_cost(&json!(" 30 ")), 30);
        assert_eq!(coerce_cost(&json!("50.0")), 50);
        assert_eq!(coerce_cost(&json!("cheap")), 0);
        assert_eq!(coerce_cost(&json!("NaN")), 0);
        assert_eq!(coerce_cost(&json!(null)), 0);
        assert_eq!(coerce_cost(&json!([10])), 0);
        assert_eq!(coerce_cost(&json!(true)), 1);
    }

    #[test]
    fn cost_is_always_a_rung_above_the_floor() {
        let ladder = CostLadder::default();
        let costs = [
            json!(0),
            json!(5),
            json!(7),
            json!(10),
            json!("30"),
            json!(150),
            json!(null),
            json!(-4),
        ];
        for floor in [-1, 0, 4, 5, 9, 10, 14, 29, 30, 49, 149] {
            for cost in &costs {
                let rec = sanitize(
                    &reply(cost.clone(), json!(["Flu", "Cold"])),
                    &request(&["cough"], floor),
                    &ladder,
                )
                .unwrap();
                assert!(ladder.contains(rec.cost_weight), "floor {floor} cost {cost}");
                assert!(rec.cost_weight > floor, "floor {floor} cost {cost}");
            }
        }
    }

    #[test]
    fn valid_cost_above_floor_is_kept() {
        let rec = sanitize(
            &reply(json!(50), json!([])),
            &request(&["cough"], 10),
            &CostLadder::default(),
        )
        .unwrap();
        assert_eq!(rec.cost_weight, 50);
    }

    #[test]
    fn red_flags_escalate_past_emergency_minimum() {
        let ladder = CostLadder::default();
        for cost in [json!(5), json!(30), json!("abc"), json!(150)] {
            let rec = sanitize(
                &reply(cost, json!([])),
                &request(&["sudden chest pain", "sweating"], 0),
                &ladder,
            )
            .unwrap();
            assert!(rec.cost_weight > ladder.emergency_min());
        }
    }

    #[test]
    fn diseases_always_has_two_entries() {
        let ladder = CostLadder::default();
        let cases = [
            (json!([]), ["Undifferentiated", "Undifferentiated"]),
            (json!(["Flu"]), ["Flu", "Undifferentiated"]),
            (json!(["Flu", "Cold"]), ["Flu", "Cold"]),
            (json!(["Flu", "Cold", "COVID-19"]), ["Flu", "Cold"]),
            (json!(["  ", " Flu ", ""]), ["Flu", "Undifferentiated"]),
            (json!([null, "Flu"]), ["Flu", "Undifferentiated"]),
            (json!([42, "Flu"]), ["42", "Flu"]),
            (json!("Flu"), ["Undifferentiated", "Undifferentiated"]),
        ];
        for (diseases, expected) in cases {
            let rec = sanitize(&reply(json!(5), diseases), &request(&["cough"], 0), &ladder)
                .unwrap();
            assert_eq!(rec.diseases, expected.map(String::from));
        }
    }

    #[test]
    fn repeated_test_is_marked_as_follow_up() {
        let mut req = request(&["cough"], 0);
        req.previous_tests.push(PreviousTest {
            test_name: "  chest x-RAY ".to_string(),
            result: "clear".to_string(),
            cost_weight: None,
        });

        let rec = sanitize(&reply(json!(15), json!([])), &req, &CostLadder::default()).unwrap();
        assert_eq!(rec.test_name, "Follow-up: Chest X-ray");
    }

    #[test]
    fn missing_fields_still_produce_a_result() {
        let rec = sanitize("I cannot help with that.", &request(&["cough"], 12), &CostLadder::default())
            .unwrap();
        assert_eq!(rec.test_name, "");
        assert_eq!(rec.description, "");
        assert_eq!(rec.cost_weight, 15);
        assert_eq!(rec.diseases, [UNDIFFERENTIATED, UNDIFFERENTIATED].map(String::from));
    }

    #[test]
    fn null_text_fields_read_as_empty() {
        let raw = json!({ "test_name": null, "description": 7, "cost_weight": 5 }).to_string();
        let rec = sanitize(&raw, &request(&["cough"], 0), &CostLadder::default()).unwrap();
        assert_eq!(rec.test_name, "");
        assert_eq!(rec.description, "7");
    }

    #[test]
    fn broken_json_is_a_parse_error() {
        let err = sanitize(
            "{\"test_name\": \"CBC\", }",
            &request(&["cough"], 0),
            &CostLadder::default(),
        )
        .unwrap_err();
        assert!(matches!(err, FlowError::Parse(_)));
    }
}
