use std::collections::HashSet;
use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::{
    advisor::TestAdvisor,
    error::Result,
    ladder::CostLadder,
    prompt::{SYSTEM_PREAMBLE, build_user_payload},
    sanitizer::{UNDIFFERENTIATED, sanitize},
    types::{Recommendation, RecommendationRequest},
};

/// Model calls allowed per `recommend_tests` before falling back to the placeholder
pub const DEFAULT_MAX_TRIES: usize = 8;

pub const PLACEHOLDER_TEST_NAME: &str = "Polymerase chain reaction (PCR) test";
pub const PLACEHOLDER_TEST_DESCRIPTION: &str =
    "A highly sensitive test that detects viral genetic material in respiratory specimens.";

/// Asks a [`TestAdvisor`] for tests and sanitizes every reply
#[derive(Clone)]
pub struct Recommender {
    advisor: Arc<dyn TestAdvisor>,
    ladder: CostLadder,
    max_tries: usize,
}

impl Recommender {
    pub fn new(advisor: Arc<dyn TestAdvisor>, ladder: CostLadder) -> Self {
        Self {
            advisor,
            ladder,
            max_tries: DEFAULT_MAX_TRIES,
        }
    }

    pub fn with_max_tries(mut self, max_tries: usize) -> Self {
        self.max_tries = max_tries;
        self
    }

    pub fn ladder(&self) -> &CostLadder {
        &self.ladder
    }

    /// One model call, sanitized.
    pub async fn recommend_next_test(
        &self,
        request: &RecommendationRequest,
    ) -> Result<Recommendation> {
        let payload = build_user_payload(request, &self.ladder);
        let raw = self.advisor.advise(SYSTEM_PREAMBLE, &payload).await?;
        sanitize(&raw, request, &self.ladder)
    }

    /// Exactly `n` recommendations with distinct names.
    ///
    /// Failed or duplicate attempts count against `max_tries`; whatever is still
    /// missing afterwards is filled with the placeholder test.
    #[instrument(skip_all, fields(n = n, symptoms = request.symptoms.len(), min_cost = request.min_cost))]
    pub async fn recommend_tests(
        &self,
        request: &RecommendationRequest,
        n: usize,
    ) -> Vec<Recommendation> {
        let mut results = Vec::with_capacity(n);
        let mut seen = HashSet::new();
        let mut tries = 0;

        while results.len() < n && tries < self.max_tries {
            tries += 1;
            match self.recommend_next_test(request).await {
                Ok(rec) => {
                    let key = rec.test_name.trim().to_lowercase();
                    if !key.is_empty() && seen.insert(key) {
                        info!(test_name = %rec.test_name, cost_weight = rec.cost_weight, "Accepted recommendation");
                        results.push(rec);
                    } else {
                        info!(test_name = %rec.test_name, "Skipping empty or duplicate recommendation");
                    }
                }
                Err(e) => {
                    warn!(attempt = tries, error = %e, "Recommendation attempt failed");
                }
            }
        }

        if results.len() < n {
            warn!(
                missing = n - results.len(),
                tries, "Padding recommendations with placeholder test"
            );
            let placeholder = self.placeholder(request);
            results.resize(n, placeholder);
        }

        results
    }

    fn placeholder(&self, request: &RecommendationRequest) -> Recommendation {
        let floor = self
            .ladder
            .effective_floor(request.min_cost, &request.symptoms);
        Recommendation {
            test_name: PLACEHOLDER_TEST_NAME.to_string(),
            description: PLACEHOLDER_TEST_DESCRIPTION.to_string(),
            cost_weight: self.ladder.next_allowed_cost(floor),
            diseases: [UNDIFFERENTIATED.to_string(), UNDIFFERENTIATED.to_string()],
        }
    }
}
