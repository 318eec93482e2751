pub mod advisor;
pub mod error;
pub mod ladder;
pub mod literature;
pub mod prompt;
pub mod recommender;
pub mod sanitizer;
pub mod storage;
pub mod types;

// Re-export commonly used types
pub use advisor::TestAdvisor;
#[cfg(feature = "rig")]
pub use advisor::RigAdvisor;
pub use error::{FlowError, Result};
pub use ladder::{CostLadder, has_red_flags};
#[cfg(feature = "europepmc")]
pub use literature::EuropePmcClient;
pub use literature::{Article, Keywords, LiteratureSource, deduplicate_articles};
pub use recommender::Recommender;
pub use sanitizer::sanitize;
pub use storage::{InMemorySessionStorage, SessionStorage, SymptomSession};
pub use types::{PreviousTest, Recommendation, RecommendationRequest, RecommendedTest};
