use crate::dataset::{CurrentWindow, Dataset, DriftMethod, DriftReport, FeatureDrift};
use crate::error::DriftError;
use crate::stats::{
    DEFAULT_KS_THRESHOLD, DEFAULT_PSI_THRESHOLD, ks_statistic, population_stability_index,
};
use crate::workspace::{Workspace, WorkspaceError};
use chrono::Utc;
use schema::flatten_events;
use telemetry::{EventFilter, TraceStore};

/// Row filter defining which detections qualify for the reference dataset.
#[derive(Debug, Clone)]
pub struct ReferenceCriteria {
    pub class_filter: String,
    /// Exclusive lower bound: a detection at exactly this confidence does
    /// not qualify.
    pub min_confidence: f64,
    /// Exact number of qualifying rows frozen into the reference.
    pub limit: usize,
}

impl Default for ReferenceCriteria {
    fn default() -> Self {
        Self {
            class_filter: "car".to_string(),
            min_confidence: 0.85,
            limit: 10,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DriftThresholds {
    pub psi: f64,
    pub ks: f64,
}

impl Default for DriftThresholds {
    fn default() -> Self {
        Self {
            psi: DEFAULT_PSI_THRESHOLD,
            ks: DEFAULT_KS_THRESHOLD,
        }
    }
}

/// Reads prediction events out of the trace store, freezes them into
/// datasets and scores the current population against the reference.
pub struct DriftEngine<S, W> {
    store: S,
    workspace: W,
    thresholds: DriftThresholds,
}

impl<S: TraceStore, W: Workspace> DriftEngine<S, W> {
    pub fn new(store: S, workspace: W) -> Self {
        Self::with_thresholds(store, workspace, DriftThresholds::default())
    }

    pub fn with_thresholds(store: S, workspace: W, thresholds: DriftThresholds) -> Self {
        Self {
            store,
            workspace,
            thresholds,
        }
    }

    /// Freeze a reference dataset from the most recent qualifying
    /// detections and persist it to the workspace.
    ///
    /// Fails without persisting anything when fewer than `criteria.limit`
    /// detections qualify.
    pub async fn create_reference(
        &self,
        name: &str,
        criteria: &ReferenceCriteria,
    ) -> Result<Dataset, DriftError> {
        let events = self.store.query_events(&EventFilter::predictions()).await?;

        // Events arrive newest first, so the first `limit` qualifying rows
        // are the most recent ones.
        let mut rows: Vec<_> = flatten_events(&events)
            .into_iter()
            .filter(|row| {
                row.class_name == criteria.class_filter && row.confidence > criteria.min_confidence
            })
            .collect();

        if rows.len() < criteria.limit {
            return Err(DriftError::InsufficientData {
                required: criteria.limit,
                found: rows.len(),
            });
        }
        rows.truncate(criteria.limit);

        let dataset = Dataset::freeze(name, rows);
        self.workspace.upload_dataset(&dataset).await?;
        tracing::info!(
            name,
            rows = dataset.len(),
            class = %criteria.class_filter,
            "reference dataset created"
        );
        Ok(dataset)
    }

    /// Score the current window against a stored reference.
    ///
    /// Persists the frozen current dataset and the report; each run is a
    /// fresh snapshot, so repeating a run adds a new dataset and report
    /// rather than replacing the previous ones.
    pub async fn analyze(
        &self,
        reference_name: &str,
        window: CurrentWindow,
    ) -> Result<DriftReport, DriftError> {
        let reference = match self.workspace.load_dataset(reference_name).await {
            Ok(dataset) => dataset,
            Err(WorkspaceError::DatasetNotFound(name)) => {
                return Err(DriftError::ReferenceNotFound(name));
            }
            Err(e) => return Err(e.into()),
        };

        let filter = EventFilter::predictions().within(window.since, window.until);
        let events = self.store.query_events(&filter).await?;
        let rows = flatten_events(&events);
        if rows.is_empty() {
            return Err(DriftError::EmptyCurrentWindow(window));
        }

        let current_name = format!("current-{}", window.until.format("%Y%m%dT%H%M%SZ"));
        let current = Dataset::freeze(current_name, rows);

        let features = vec![
            self.categorical_drift("class_name", &reference, &current),
            self.continuous_drift("confidence", reference.confidences(), current.confidences()),
            self.continuous_drift(
                "processing_time",
                reference.processing_times(),
                current.processing_times(),
            ),
        ];
        let drift_detected = features.iter().any(|feature| feature.drifted);

        let mut report = DriftReport {
            generated_at: Utc::now(),
            reference_name: reference.name.clone(),
            current_name: current.name.clone(),
            reference_rows: reference.len(),
            current_rows: current.len(),
            features,
            drift_detected,
            report_url: None,
        };

        self.workspace.upload_dataset(&current).await?;
        let url = self.workspace.upload_report(&report).await?;
        report.report_url = Some(url);

        tracing::info!(
            reference = %report.reference_name,
            current = %report.current_name,
            drift_detected,
            "drift analysis complete"
        );
        Ok(report)
    }

    fn categorical_drift(
        &self,
        feature: &str,
        reference: &Dataset,
        current: &Dataset,
    ) -> FeatureDrift {
        let score = population_stability_index(&reference.class_counts(), &current.class_counts());
        FeatureDrift {
            feature: feature.to_string(),
            method: DriftMethod::PopulationStabilityIndex,
            score,
            threshold: self.thresholds.psi,
            drifted: score > self.thresholds.psi,
        }
    }

    fn continuous_drift(&self, feature: &str, reference: Vec<f64>, current: Vec<f64>) -> FeatureDrift {
        let score = ks_statistic(&reference, &current);
        FeatureDrift {
            feature: feature.to_string(),
            method: DriftMethod::KolmogorovSmirnov,
            score,
            threshold: self.thresholds.ks,
            drifted: score > self.thresholds.ks,
        }
    }
}
