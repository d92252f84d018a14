use crate::dataset::{Dataset, DriftReport};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Mutex;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WorkspaceError {
    #[error("workspace transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("workspace returned status {0}")]
    Status(u16),

    #[error("dataset {0} not found in workspace")]
    DatasetNotFound(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatasetSummary {
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub rows: usize,
}

/// Cloud workspace persisting reference datasets and rendered reports.
/// External to this system; only the persistence contract is modeled.
pub trait Workspace: Send + Sync {
    fn upload_dataset(
        &self,
        dataset: &Dataset,
    ) -> impl Future<Output = Result<(), WorkspaceError>> + Send;

    fn load_dataset(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<Dataset, WorkspaceError>> + Send;

    fn list_datasets(&self)
    -> impl Future<Output = Result<Vec<DatasetSummary>, WorkspaceError>> + Send;

    /// Persist a report and return the URL it is viewable at.
    fn upload_report(
        &self,
        report: &DriftReport,
    ) -> impl Future<Output = Result<String, WorkspaceError>> + Send;
}

impl<W: Workspace> Workspace for std::sync::Arc<W> {
    async fn upload_dataset(&self, dataset: &Dataset) -> Result<(), WorkspaceError> {
        W::upload_dataset(self, dataset).await
    }

    async fn load_dataset(&self, name: &str) -> Result<Dataset, WorkspaceError> {
        W::load_dataset(self, name).await
    }

    async fn list_datasets(&self) -> Result<Vec<DatasetSummary>, WorkspaceError> {
        W::list_datasets(self).await
    }

    async fn upload_report(&self, report: &DriftReport) -> Result<String, WorkspaceError> {
        W::upload_report(self, report).await
    }
}

/// JSON-over-HTTP workspace client, scoped to one project.
pub struct HttpWorkspace {
    client: reqwest::Client,
    base_url: String,
    project: String,
    api_key: Option<String>,
}

impl HttpWorkspace {
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        project: impl Into<String>,
        api_key: Option<String>,
    ) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            client,
            base_url,
            project: project.into(),
            api_key,
        }
    }

    fn url(&self, suffix: &str) -> String {
        format!("{}/v2/projects/{}/{suffix}", self.base_url, self.project)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }
}

impl Workspace for HttpWorkspace {
    async fn upload_dataset(&self, dataset: &Dataset) -> Result<(), WorkspaceError> {
        let response = self
            .authorize(self.client.post(self.url("datasets")))
            .json(dataset)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(WorkspaceError::Status(response.status().as_u16()));
        }
        Ok(())
    }

    async fn load_dataset(&self, name: &str) -> Result<Dataset, WorkspaceError> {
        let response = self
            .authorize(self.client.get(self.url(&format!("datasets/{name}"))))
            .send()
            .await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(WorkspaceError::DatasetNotFound(name.to_string()));
        }
        if !response.status().is_success() {
            return Err(WorkspaceError::Status(response.status().as_u16()));
        }
        Ok(response.json::<Dataset>().await?)
    }

    async fn list_datasets(&self) -> Result<Vec<DatasetSummary>, WorkspaceError> {
        let response = self
            .authorize(self.client.get(self.url("datasets")))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(WorkspaceError::Status(response.status().as_u16()));
        }
        Ok(response.json::<Vec<DatasetSummary>>().await?)
    }

    async fn upload_report(&self, report: &DriftReport) -> Result<String, WorkspaceError> {
        #[derive(Deserialize)]
        struct ReportLocation {
            url: String,
        }

        let response = self
            .authorize(self.client.post(self.url("reports")))
            .json(report)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(WorkspaceError::Status(response.status().as_u16()));
        }
        Ok(response.json::<ReportLocation>().await?.url)
    }
}

/// In-process workspace used by tests and local runs.
#[derive(Default)]
pub struct InMemoryWorkspace {
    datasets: Mutex<Vec<Dataset>>,
    reports: Mutex<Vec<DriftReport>>,
}

impl InMemoryWorkspace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dataset_names(&self) -> Vec<String> {
        self.datasets
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|dataset| dataset.name.clone())
            .collect()
    }

    pub fn reports(&self) -> Vec<DriftReport> {
        self.reports
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl Workspace for InMemoryWorkspace {
    async fn upload_dataset(&self, dataset: &Dataset) -> Result<(), WorkspaceError> {
        let mut datasets = self.datasets.lock().unwrap_or_else(|e| e.into_inner());
        // Re-uploading a name replaces it, matching the HTTP workspace.
        datasets.retain(|existing| existing.name != dataset.name);
        datasets.push(dataset.clone());
        Ok(())
    }

    async fn load_dataset(&self, name: &str) -> Result<Dataset, WorkspaceError> {
        self.datasets
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .find(|dataset| dataset.name == name)
            .cloned()
            .ok_or_else(|| WorkspaceError::DatasetNotFound(name.to_string()))
    }

    async fn list_datasets(&self) -> Result<Vec<DatasetSummary>, WorkspaceError> {
        Ok(self
            .datasets
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|dataset| DatasetSummary {
                name: dataset.name.clone(),
                created_at: dataset.created_at,
                rows: dataset.rows.len(),
            })
            .collect())
    }

    async fn upload_report(&self, report: &DriftReport) -> Result<String, WorkspaceError> {
        let mut reports = self.reports.lock().unwrap_or_else(|e| e.into_inner());
        reports.push(report.clone());
        Ok(format!("memory://reports/{}", reports.len()))
    }
}
