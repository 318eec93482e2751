use diagnostic_flow::{
    FlowError, Keywords, PreviousTest, RecommendationRequest, RecommendedTest, SymptomSession,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Upper bound on tests requested in one call
pub const MAX_TESTS_PER_REQUEST: usize = 5;
pub const DEFAULT_TESTS_PER_REQUEST: usize = 2;

pub const SYMPTOMS_REQUIRED: &str = "Provide symptoms: string[]";
pub const PREVIOUS_TESTS_NOT_ARRAY: &str = "previous_tests must be an array";
pub const MIN_COST_NOT_NUMBER: &str = "min_cost must be a number";
pub const N_OUT_OF_RANGE: &str = "n must be an integer between 1 and 5";
pub const SESSION_ID_NOT_STRING: &str = "session_id must be a string";
pub const EXPECTED_STRING_ARRAY: &str = "Expected JSON array of strings";
pub const NO_KEYWORDS: &str = "No keywords provided";

#[derive(Debug, Serialize, Deserialize)]
pub struct ReceiveResponse {
    pub status: String,
    pub received_count: usize,
    pub processed: Vec<String>,
}

/// Validated body of `POST /api/next-test`
#[derive(Debug, Clone, PartialEq)]
pub struct NextTestRequest {
    pub symptoms: Vec<String>,
    pub previous_tests: Vec<PreviousTest>,
    pub min_cost: i64,
    pub n: usize,
    pub session_id: Option<String>,
}

impl NextTestRequest {
    pub fn recommendation_request(&self) -> RecommendationRequest {
        RecommendationRequest {
            symptoms: self.symptoms.clone(),
            previous_tests: self.previous_tests.clone(),
            min_cost: self.min_cost,
        }
    }
}

fn validation(message: &str) -> FlowError {
    FlowError::Validation(message.to_string())
}

fn parse_symptoms(value: Option<&Value>) -> Result<Vec<String>, FlowError> {
    let items = value
        .and_then(Value::as_array)
        .filter(|items| !items.is_empty())
        .ok_or_else(|| validation(SYMPTOMS_REQUIRED))?;

    items
        .iter()
        .map(|s| s.as_str().map(String::from))
        .collect::<Option<Vec<_>>>()
        .ok_or_else(|| validation(SYMPTOMS_REQUIRED))
}

fn parse_previous_tests(value: Option<&Value>) -> Result<Vec<PreviousTest>, FlowError> {
    match value {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => Ok(items.iter().filter_map(PreviousTest::from_value).collect()),
        Some(_) => Err(validation(PREVIOUS_TESTS_NOT_ARRAY)),
    }
}

fn parse_min_cost(value: Option<&Value>) -> Result<i64, FlowError> {
    match value {
        None => Ok(0),
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.trunc() as i64))
            .ok_or_else(|| validation(MIN_COST_NOT_NUMBER)),
        Some(_) => Err(validation(MIN_COST_NOT_NUMBER)),
    }
}

fn parse_n(value: Option<&Value>) -> Result<usize, FlowError> {
    let n = match value {
        None | Some(Value::Null) => return Ok(DEFAULT_TESTS_PER_REQUEST),
        Some(Value::Number(n)) => n.as_f64().map(f64::trunc),
        Some(_) => None,
    };
    match n {
        Some(n) if (1.0..=MAX_TESTS_PER_REQUEST as f64).contains(&n) => Ok(n as usize),
        _ => Err(validation(N_OUT_OF_RANGE)),
    }
}

fn parse_session_id(value: Option<&Value>) -> Result<Option<String>, FlowError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(id)) => {
            let id = id.trim();
            Ok((!id.is_empty()).then(|| id.to_string()))
        }
        Some(_) => Err(validation(SESSION_ID_NOT_STRING)),
    }
}

impl TryFrom<Value> for NextTestRequest {
    type Error = FlowError;

    /// Field checks run in a fixed order so the first problem reported is stable.
    fn try_from(body: Value) -> Result<Self, Self::Error> {
        let empty = serde_json::Map::new();
        let fields = body.as_object().unwrap_or(&empty);

        Ok(Self {
            symptoms: parse_symptoms(fields.get("symptoms"))?,
            previous_tests: parse_previous_tests(fields.get("previous_tests"))?,
            min_cost: parse_min_cost(fields.get("min_cost"))?,
            n: parse_n(fields.get("n"))?,
            session_id: parse_session_id(fields.get("session_id"))?,
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NextTestResponse {
    pub session_id: String,
    pub all_symptoms: Vec<String>,
    pub diseases: Vec<String>,
    pub tests: Vec<RecommendedTest>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LiteratureRequest {
    #[serde(default)]
    pub keywords: Option<Keywords>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionResponse {
    pub session_id: String,
    pub symptoms: Vec<String>,
    pub symptom_count: usize,
    pub created_at: String,
    pub updated_at: String,
}

impl From<SymptomSession> for SessionResponse {
    fn from(session: SymptomSession) -> Self {
        Self {
            session_id: session.id,
            symptom_count: session.symptoms.len(),
            symptoms: session.symptoms,
            created_at: session.created_at.to_rfc3339(),
            updated_at: session.updated_at.to_rfc3339(),
        }
    }
}
