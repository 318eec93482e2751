use serde::Deserialize;
use tracing::debug;

use crate::error::{FlowError, Result};

/// Allowed price tiers for a recommended test, cheapest first
pub const DEFAULT_COST_SCALE: [i64; 6] = [5, 10, 15, 30, 50, 150];

/// Floor applied whenever the symptoms carry a red flag
pub const DEFAULT_EMERGENCY_MIN_COST: i64 = 30;

/// Symptom phrases that escalate the cost floor to the emergency minimum
pub const RED_FLAG_PATTERNS: &[&str] = &[
    "heart attack",
    "chest pain",
    "heart pain",
    "shortness of breath at rest",
    "severe shortness of breath",
    "blue lips",
    "confusion",
    "fainting",
    "seizure",
    "stiff neck with fever",
    "fever over 103",
    "severe headache with fever",
    "focal weakness",
    "one-sided weakness",
];

/// Returns true if any red-flag phrase appears anywhere in the symptom text.
///
/// Symptoms are joined with a space before matching, so a phrase split across
/// two adjacent entries still counts.
pub fn has_red_flags<S: AsRef<str>>(symptoms: &[S]) -> bool {
    let text = symptoms
        .iter()
        .map(|s| s.as_ref())
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    RED_FLAG_PATTERNS.iter().any(|p| text.contains(p))
}

/// Ascending set of allowed `cost_weight` values plus the emergency floor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CostLadder {
    rungs: Vec<i64>,
    emergency_min: i64,
}

#[derive(Deserialize)]
struct LadderFile {
    cost_scale: Vec<i64>,
    #[serde(default = "default_emergency_min")]
    emergency_min_cost: i64,
}

fn default_emergency_min() -> i64 {
    DEFAULT_EMERGENCY_MIN_COST
}

impl CostLadder {
    pub fn new(rungs: impl IntoIterator<Item = i64>, emergency_min: i64) -> Result<Self> {
        let mut rungs: Vec<i64> = rungs.into_iter().collect();
        rungs.sort_unstable();
        rungs.dedup();
        if rungs.is_empty() {
            return Err(FlowError::Config(
                "cost ladder must contain at least one rung".to_string(),
            ));
        }
        let top = rungs[rungs.len() - 1];
        if emergency_min >= top {
            return Err(FlowError::Config(format!(
                "emergency minimum {} must be below the top rung {}",
                emergency_min, top
            )));
        }
        Ok(Self {
            rungs,
            emergency_min,
        })
    }

    /// Parse a ladder from YAML of the form `cost_scale: [..]` with an optional
    /// `emergency_min_cost`.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let file: LadderFile = serde_yaml::from_str(yaml)
            .map_err(|e| FlowError::Config(format!("invalid cost ladder file: {}", e)))?;
        Self::new(file.cost_scale, file.emergency_min_cost)
    }

    pub fn rungs(&self) -> &[i64] {
        &self.rungs
    }

    pub fn emergency_min(&self) -> i64 {
        self.emergency_min
    }

    pub fn contains(&self, cost: i64) -> bool {
        self.rungs.binary_search(&cost).is_ok()
    }

    pub fn top(&self) -> i64 {
        // new() rejects empty ladders
        self.rungs[self.rungs.len() - 1]
    }

    /// Smallest rung strictly greater than `floor`, or the top rung when the
    /// floor is already at or above it.
    pub fn next_allowed_cost(&self, floor: i64) -> i64 {
        self.rungs
            .iter()
            .copied()
            .find(|&c| c > floor)
            .unwrap_or_else(|| self.top())
    }

    /// The caller's floor, raised to the emergency minimum when red flags are present.
    pub fn effective_floor<S: AsRef<str>>(&self, min_cost: i64, symptoms: &[S]) -> i64 {
        if has_red_flags(symptoms) {
            debug!(
                min_cost,
                emergency_min = self.emergency_min,
                "Red flag present, raising cost floor"
            );
            min_cost.max(self.emergency_min)
        } else {
            min_cost
        }
    }
}

impl Default for CostLadder {
    fn default() -> Self {
        Self {
            rungs: DEFAULT_COST_SCALE.to_vec(),
            emergency_min: DEFAULT_EMERGENCY_MIN_COST,
        }
    }
}
