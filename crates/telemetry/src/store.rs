use crate::errors::StoreError;
use chrono::{DateTime, Utc};
use schema::{PREDICTION_EVENT_NAME, PredictionEvent};

/// Time-range and attribute-filtered read contract against the trace store.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    pub event_name: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

impl EventFilter {
    /// Filter matching every prediction event ever exported.
    pub fn predictions() -> Self {
        Self {
            event_name: Some(PREDICTION_EVENT_NAME.to_string()),
            ..Self::default()
        }
    }

    pub fn within(mut self, since: DateTime<Utc>, until: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self.until = Some(until);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Columnar, time-indexed event store the exporter writes to and the drift
/// job reads from. Export is one network operation per batch; queries
/// return events newest first.
pub trait TraceStore: Send + Sync {
    fn export_batch(
        &self,
        events: &[PredictionEvent],
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn query_events(
        &self,
        filter: &EventFilter,
    ) -> impl Future<Output = Result<Vec<PredictionEvent>, StoreError>> + Send;
}

impl<S: TraceStore> TraceStore for std::sync::Arc<S> {
    async fn export_batch(&self, events: &[PredictionEvent]) -> Result<(), StoreError> {
        S::export_batch(self, events).await
    }

    async fn query_events(&self, filter: &EventFilter) -> Result<Vec<PredictionEvent>, StoreError> {
        S::query_events(self, filter).await
    }
}

/// JSON-over-HTTP trace store client.
///
/// `POST {base}/v1/events` with a JSON array exports a batch;
/// `GET {base}/v1/events` with `event_name`/`since`/`until`/`limit` query
/// parameters reads one back.
#[derive(Clone)]
pub struct HttpTraceStore {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTraceStore {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self { client, base_url }
    }
}

impl TraceStore for HttpTraceStore {
    async fn export_batch(&self, events: &[PredictionEvent]) -> Result<(), StoreError> {
        let response = self
            .client
            .post(format!("{}/v1/events", self.base_url))
            .json(events)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(StoreError::Status(response.status().as_u16()));
        }
        Ok(())
    }

    async fn query_events(&self, filter: &EventFilter) -> Result<Vec<PredictionEvent>, StoreError> {
        let mut request = self.client.get(format!("{}/v1/events", self.base_url));

        if let Some(name) = &filter.event_name {
            request = request.query(&[("event_name", name.as_str())]);
        }
        if let Some(since) = filter.since {
            request = request.query(&[("since", since.to_rfc3339())]);
        }
        if let Some(until) = filter.until {
            request = request.query(&[("until", until.to_rfc3339())]);
        }
        if let Some(limit) = filter.limit {
            request = request.query(&[("limit", limit.to_string())]);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(StoreError::Status(response.status().as_u16()));
        }

        Ok(response.json::<Vec<PredictionEvent>>().await?)
    }
}
