use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::partition::{PlanSettings, DEFAULT_CHILD_AREA, DEFAULT_MAX_DEPTH};

const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";
const DEFAULT_LLM_TIMEOUT_SECS: u64 = 60;

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub openrouter_api_key: String,
    pub openrouter_base_url: String,
    pub port: u16,
    pub rust_log: String,
    pub llm_timeout: Duration,
    pub plan_default_area: f64,
    pub plan_max_depth: usize,
    pub plan_strict_leaves: bool,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let openrouter_api_key = require_env("OPENROUTER_API_KEY")?;
        if !openrouter_api_key.trim().starts_with("sk-or-") {
            bail!("OPENROUTER_API_KEY must be an OpenRouter key (starting with 'sk-or-')");
        }

        let plan_default_area: f64 = parse_env("PLAN_DEFAULT_AREA", DEFAULT_CHILD_AREA)?;
        if !(plan_default_area >= 0.0 && plan_default_area.is_finite()) {
            bail!("PLAN_DEFAULT_AREA must be a non-negative number");
        }

        Ok(Config {
            openrouter_api_key,
            openrouter_base_url: std::env::var("OPENROUTER_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
            port: parse_env("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            llm_timeout: Duration::from_secs(parse_env("LLM_TIMEOUT_SECS", DEFAULT_LLM_TIMEOUT_SECS)?),
            plan_default_area,
            plan_max_depth: parse_env("PLAN_MAX_DEPTH", DEFAULT_MAX_DEPTH)?,
            plan_strict_leaves: parse_env("PLAN_STRICT_LEAVES", false)?,
        })
    }

    pub fn plan_settings(&self) -> PlanSettings {
        PlanSettings {
            default_area: self.plan_default_area,
            max_depth: self.plan_max_depth,
            strict_leaves: self.plan_strict_leaves,
        }
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("Environment variable '{key}' has an invalid value '{raw}'")),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_env_uses_default_when_unset() {
        let depth: usize = parse_env("FLOORPLAN_TEST_UNSET_DEPTH", 7).unwrap();
        assert_eq!(depth, 7);
    }

    #[test]
    fn test_parse_env_reports_invalid_value() {
        std::env::set_var("FLOORPLAN_TEST_BAD_PORT", "eighty");
        let err = parse_env::<u16>("FLOORPLAN_TEST_BAD_PORT", 8080).unwrap_err();
        assert!(err.to_string().contains("FLOORPLAN_TEST_BAD_PORT"));
    }

    #[test]
    fn test_plan_settings_mirror_config() {
        let config = Config {
            openrouter_api_key: "sk-or-test".to_string(),
            openrouter_base_url: DEFAULT_BASE_URL.to_string(),
            port: 8080,
            rust_log: "info".to_string(),
            llm_timeout: Duration::from_secs(60),
            plan_default_area: 50.0,
            plan_max_depth: 4,
            plan_strict_leaves: true,
        };
        let settings = config.plan_settings();
        assert_eq!(settings.default_area, 50.0);
        assert_eq!(settings.max_depth, 4);
        assert!(settings.strict_leaves);
    }
}
