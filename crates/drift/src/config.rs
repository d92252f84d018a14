use crate::engine::{DriftThresholds, ReferenceCriteria};
use crate::stats::{DEFAULT_KS_THRESHOLD, DEFAULT_PSI_THRESHOLD};
use std::env;

pub use common::Environment;

#[derive(Debug, Clone)]
pub struct DriftConfig {
    pub environment: Environment,
    pub store_url: String,
    pub workspace_url: String,
    pub workspace_project: String,
    pub workspace_api_key: Option<String>,
    pub reference_name: String,
    pub class_filter: String,
    pub min_confidence: f64,
    pub reference_limit: usize,
    pub window_days: i64,
    pub psi_threshold: f64,
    pub ks_threshold: f64,
}

impl DriftConfig {
    /// Load configuration from environment variables with sensible defaults
    pub fn from_env() -> anyhow::Result<Self> {
        let environment = Environment::from_env();

        let store_url =
            env::var("TRACE_STORE_URL").unwrap_or_else(|_| "http://localhost:8123".to_string());
        let workspace_url =
            env::var("WORKSPACE_URL").unwrap_or_else(|_| "http://localhost:8200".to_string());
        let workspace_project =
            env::var("WORKSPACE_PROJECT").unwrap_or_else(|_| "object-detection".to_string());
        let workspace_api_key = env::var("WORKSPACE_API_KEY").ok();

        let reference_name =
            env::var("REFERENCE_NAME").unwrap_or_else(|_| "reference-dataset".to_string());
        let class_filter = env::var("REFERENCE_CLASS").unwrap_or_else(|_| "car".to_string());

        let min_confidence = env::var("REFERENCE_MIN_CONFIDENCE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(0.85);

        let reference_limit = env::var("REFERENCE_LIMIT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(10);

        let window_days = env::var("WINDOW_DAYS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(7);

        let psi_threshold = env::var("PSI_THRESHOLD")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_PSI_THRESHOLD);

        let ks_threshold = env::var("KS_THRESHOLD")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_KS_THRESHOLD);

        let config = Self {
            environment,
            store_url,
            workspace_url,
            workspace_project,
            workspace_api_key,
            reference_name,
            class_filter,
            min_confidence,
            reference_limit,
            window_days,
            psi_threshold,
            ks_threshold,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(self.reference_limit >= 1, "REFERENCE_LIMIT must be at least 1");
        anyhow::ensure!(self.window_days >= 1, "WINDOW_DAYS must be at least 1");
        anyhow::ensure!(
            (0.0..=1.0).contains(&self.min_confidence),
            "REFERENCE_MIN_CONFIDENCE must be within [0, 1]"
        );
        Ok(())
    }

    pub fn reference_criteria(&self) -> ReferenceCriteria {
        ReferenceCriteria {
            class_filter: self.class_filter.clone(),
            min_confidence: self.min_confidence,
            limit: self.reference_limit,
        }
    }

    pub fn thresholds(&self) -> DriftThresholds {
        DriftThresholds {
            psi: self.psi_threshold,
            ks: self.ks_threshold,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_reference_recipe() {
        let config = DriftConfig::from_env().expect("defaults are valid");
        let criteria = config.reference_criteria();
        assert_eq!(criteria.class_filter, "car");
        assert_eq!(criteria.limit, 10);
        assert!((criteria.min_confidence - 0.85).abs() < 1e-9);
        assert_eq!(config.window_days, 7);
    }
}
