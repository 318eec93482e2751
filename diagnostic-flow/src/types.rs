use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A test the patient already had, as reported by the caller
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PreviousTest {
    #[serde(default)]
    pub test_name: String,
    #[serde(default)]
    pub result: String,
    /// Passed through to the model untouched, whatever the caller sent
    #[serde(default)]
    pub cost_weight: Option<Value>,
}

impl PreviousTest {
    /// Lenient conversion from an arbitrary JSON entry. Non-objects yield `None`
    /// and are skipped by callers.
    pub fn from_value(value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        Some(Self {
            test_name: object.get("test_name").map(value_text).unwrap_or_default(),
            result: object.get("result").map(value_text).unwrap_or_default(),
            cost_weight: object.get("cost_weight").cloned(),
        })
    }
}

/// Everything the model needs to suggest the next test
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecommendationRequest {
    pub symptoms: Vec<String>,
    pub previous_tests: Vec<PreviousTest>,
    pub min_cost: i64,
}

/// A sanitized model recommendation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendation {
    pub test_name: String,
    pub description: String,
    pub cost_weight: i64,
    pub diseases: [String; 2],
}

/// Wire shape of a recommended test
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecommendedTest {
    pub test_name: String,
    pub test_description: String,
    pub cost_weight: i64,
}

impl From<&Recommendation> for RecommendedTest {
    fn from(rec: &Recommendation) -> Self {
        Self {
            test_name: rec.test_name.clone(),
            test_description: rec.description.clone(),
            cost_weight: rec.cost_weight,
        }
    }
}

/// Text form of a JSON value: strings verbatim, null as empty, everything else as JSON.
pub fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
