use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

/// Source of raw model replies for a recommendation prompt
#[async_trait]
pub trait TestAdvisor: Send + Sync {
    /// Send the system preamble and JSON payload, return the model's raw text.
    async fn advise(&self, system: &str, payload: &Value) -> Result<String>;
}

#[cfg(feature = "rig")]
pub use rig_advisor::{DEFAULT_MODEL, RigAdvisor};

#[cfg(feature = "rig")]
mod rig_advisor {
    use async_trait::async_trait;
    use rig::{agent::Agent, client::CompletionClient, completion::Prompt, providers::openrouter};
    use serde_json::{Value, json};
    use tracing::{debug, instrument};

    use super::TestAdvisor;
    use crate::error::{FlowError, Result};

    pub const DEFAULT_MODEL: &str = "openai/gpt-4o-mini";

    /// [`TestAdvisor`] backed by an OpenRouter-hosted chat model
    #[derive(Clone)]
    pub struct RigAdvisor {
        api_key: String,
        model: String,
    }

    impl RigAdvisor {
        pub fn new(api_key: impl Into<String>) -> Self {
            Self {
                api_key: api_key.into(),
                model: DEFAULT_MODEL.to_string(),
            }
        }

        pub fn from_env() -> Result<Self> {
            let api_key = std::env::var("OPENROUTER_API_KEY")
                .map_err(|_| FlowError::Config("OPENROUTER_API_KEY not set".to_string()))?;
            Ok(Self::new(api_key))
        }

        pub fn with_model(mut self, model: impl Into<String>) -> Self {
            self.model = model.into();
            self
        }

        pub fn model(&self) -> &str {
            &self.model
        }

        fn agent(&self, preamble: &str) -> Agent<openrouter::CompletionModel> {
            let client = openrouter::Client::new(&self.api_key);
            client
                .agent(&self.model)
                .preamble(preamble)
                .temperature(0.0)
                .additional_params(json!({ "response_format": { "type": "json_object" } }))
                .build()
        }
    }

    #[async_trait]
    impl TestAdvisor for RigAdvisor {
        #[instrument(skip_all, fields(model = %self.model))]
        async fn advise(&self, system: &str, payload: &Value) -> Result<String> {
            let agent = self.agent(system);
            let response = agent
                .prompt(payload.to_string())
                .await
                .map_err(|e| FlowError::Upstream(format!("LLM prompt failed: {}", e)))?;
            debug!(response = %response, "Model replied");
            Ok(response)
        }
    }
}
