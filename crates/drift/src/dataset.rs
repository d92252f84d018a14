use chrono::{DateTime, Duration, Utc};
use schema::FeatureRow;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Half-open-ended time window the current population is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentWindow {
    pub since: DateTime<Utc>,
    pub until: DateTime<Utc>,
}

impl CurrentWindow {
    /// The trailing `days` ending now.
    pub fn trailing_days(days: i64) -> Self {
        let until = Utc::now();
        Self {
            since: until - Duration::days(days),
            until,
        }
    }
}

impl fmt::Display for CurrentWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} .. {}",
            self.since.to_rfc3339(),
            self.until.to_rfc3339()
        )
    }
}

/// A frozen set of analysis rows. Reference datasets are created once and
/// never mutated; current datasets are frozen per analysis run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dataset {
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub rows: Vec<FeatureRow>,
}

impl Dataset {
    pub fn freeze(name: impl Into<String>, rows: Vec<FeatureRow>) -> Self {
        Self {
            name: name.into(),
            created_at: Utc::now(),
            rows,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn class_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for row in &self.rows {
            *counts.entry(row.class_name.clone()).or_insert(0) += 1;
        }
        counts
    }

    pub fn confidences(&self) -> Vec<f64> {
        self.rows.iter().map(|row| row.confidence).collect()
    }

    pub fn processing_times(&self) -> Vec<f64> {
        self.rows.iter().map(|row| row.processing_time).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DriftMethod {
    PopulationStabilityIndex,
    KolmogorovSmirnov,
}

/// Score for one feature column.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureDrift {
    pub feature: String,
    pub method: DriftMethod,
    pub score: f64,
    pub threshold: f64,
    pub drifted: bool,
}

/// Outcome of one analysis run: per-feature scores plus the overall
/// verdict. `report_url` is filled in once the workspace has persisted it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriftReport {
    pub generated_at: DateTime<Utc>,
    pub reference_name: String,
    pub current_name: String,
    pub reference_rows: usize,
    pub current_rows: usize,
    pub features: Vec<FeatureDrift>,
    pub drift_detected: bool,
    pub report_url: Option<String>,
}

impl DriftReport {
    pub fn drifted_features(&self) -> impl Iterator<Item = &FeatureDrift> {
        self.features.iter().filter(|feature| feature.drifted)
    }
}
