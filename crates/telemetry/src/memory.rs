use crate::errors::StoreError;
use crate::store::{EventFilter, TraceStore};
use schema::PredictionEvent;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

/// In-process trace store used by tests and local runs.
///
/// Honors the same query contract as the HTTP store: time-window and limit
/// filtering, newest first. `set_unavailable` makes every export and query
/// fail, for exercising the best-effort paths.
#[derive(Default)]
pub struct InMemoryTraceStore {
    events: Mutex<Vec<PredictionEvent>>,
    unavailable: AtomicBool,
}

impl InMemoryTraceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Everything exported so far, in export order.
    pub fn recorded(&self) -> Vec<PredictionEvent> {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable(
                "in-memory store marked unavailable".to_string(),
            ))
        } else {
            Ok(())
        }
    }
}

impl TraceStore for InMemoryTraceStore {
    async fn export_batch(&self, events: &[PredictionEvent]) -> Result<(), StoreError> {
        self.check_available()?;
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .extend_from_slice(events);
        Ok(())
    }

    async fn query_events(&self, filter: &EventFilter) -> Result<Vec<PredictionEvent>, StoreError> {
        self.check_available()?;
        let events = self.events.lock().unwrap_or_else(|e| e.into_inner());

        let mut matched: Vec<PredictionEvent> = events
            .iter()
            .filter(|event| {
                filter.since.is_none_or(|since| event.timestamp >= since)
                    && filter.until.is_none_or(|until| event.timestamp <= until)
            })
            .cloned()
            .collect();

        matched.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        if let Some(limit) = filter.limit {
            matched.truncate(limit);
        }
        Ok(matched)
    }
}
