use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context as _, Result};
use diagnostic_flow::{
    CostLadder, advisor::DEFAULT_MODEL, literature::DEFAULT_MAX_RESULTS,
    storage::{DEFAULT_HISTORY_LIMIT, DEFAULT_MAX_SESSIONS},
};
use tracing::{info, warn};

pub const DEFAULT_PORT: u16 = 5050;

/// Configuration for the diagnosis service, read from the environment
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub host: String,
    pub port: u16,
    pub openrouter_api_key: String,
    pub model: String,
    pub literature_max_results: usize,
    pub http_timeout: Duration,
    pub session_history_limit: usize,
    pub max_sessions: usize,
    pub cost_ladder_path: Option<PathBuf>,
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from any key lookup; `from_env` passes `std::env::var`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let openrouter_api_key = lookup("OPENROUTER_API_KEY")
            .filter(|k| !k.trim().is_empty())
            .context("OPENROUTER_API_KEY environment variable is required")?;

        Ok(Self {
            host: lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_or(&lookup, "PORT", DEFAULT_PORT)?,
            openrouter_api_key,
            model: lookup("OPENROUTER_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            literature_max_results: parse_or(
                &lookup,
                "LITERATURE_MAX_RESULTS",
                DEFAULT_MAX_RESULTS,
            )?,
            http_timeout: Duration::from_secs(parse_or(&lookup, "HTTP_TIMEOUT_SECS", 30)?),
            session_history_limit: parse_or(
                &lookup,
                "SESSION_HISTORY_LIMIT",
                DEFAULT_HISTORY_LIMIT,
            )?,
            max_sessions: parse_or(&lookup, "SESSION_MAX_COUNT", DEFAULT_MAX_SESSIONS)?,
            cost_ladder_path: lookup("COST_LADDER_CONFIG").map(PathBuf::from),
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn cost_ladder(&self) -> CostLadder {
        load_cost_ladder(self.cost_ladder_path.as_deref())
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("invalid value for {}: {:?}", key, raw)),
        None => Ok(default),
    }
}

/// Load the cost ladder from a YAML file, falling back to the built-in ladder
/// when the file is missing or unusable.
pub fn load_cost_ladder(path: Option<&Path>) -> CostLadder {
    let Some(path) = path else {
        return CostLadder::default();
    };

    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Cannot read cost ladder file, using defaults");
            return CostLadder::default();
        }
    };

    match CostLadder::from_yaml_str(&contents) {
        Ok(ladder) => {
            info!(path = %path.display(), rungs = ?ladder.rungs(), "Loaded cost ladder");
            ladder
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Invalid cost ladder file, using defaults");
            CostLadder::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = ServiceConfig::from_lookup(lookup(&[("OPENROUTER_API_KEY", "sk-test")])).unwrap();

        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.bind_addr(), "0.0.0.0:5050");
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.literature_max_results, 3);
        assert_eq!(config.http_timeout, Duration::from_secs(30));
        assert_eq!(config.session_history_limit, DEFAULT_HISTORY_LIMIT);
        assert_eq!(config.max_sessions, DEFAULT_MAX_SESSIONS);
        assert!(config.cost_ladder_path.is_none());
        assert_eq!(config.cost_ladder(), CostLadder::default());
    }

    #[test]
    fn api_key_is_required() {
        assert!(ServiceConfig::from_lookup(lookup(&[])).is_err());
        assert!(ServiceConfig::from_lookup(lookup(&[("OPENROUTER_API_KEY", " ")])).is_err());
    }

    #[test]
    fn malformed_numbers_are_rejected() {
        let result = ServiceConfig::from_lookup(lookup(&[
            ("OPENROUTER_API_KEY", "sk-test"),
            ("PORT", "fifty"),
        ]));
        assert!(result.is_err());
    }

    #[test]
    fn missing_ladder_file_falls_back_to_defaults() {
        let ladder = load_cost_ladder(Some(Path::new("/nonexistent/ladder.yaml")));
        assert_eq!(ladder, CostLadder::default());
    }

    #[test]
    fn ladder_file_overrides_defaults() {
        let path = std::env::temp_dir().join(format!("ladder-{}.yaml", std::process::id()));
        std::fs::write(&path, "cost_scale: [2, 4, 8]\nemergency_min_cost: 4\n").unwrap();

        let ladder = load_cost_ladder(Some(path.as_path()));
        std::fs::remove_file(&path).ok();

        assert_eq!(ladder.rungs(), &[2, 4, 8]);
        assert_eq!(ladder.emergency_min(), 4);
    }

    #[test]
    fn ladder_without_room_above_emergency_minimum_falls_back() {
        let path = std::env::temp_dir().join(format!("flat-ladder-{}.yaml", std::process::id()));
        std::fs::write(&path, "cost_scale: [1, 2, 4]\nemergency_min_cost: 4\n").unwrap();

        let ladder = load_cost_ladder(Some(path.as_path()));
        std::fs::remove_file(&path).ok();

        assert_eq!(ladder, CostLadder::default());
    }
}
