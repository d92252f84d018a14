use crate::store::TraceStore;
use schema::PredictionEvent;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Queue and flush tuning for the batch exporter.
#[derive(Debug, Clone)]
pub struct ExporterConfig {
    /// Bounded queue capacity between emitters and the export task.
    pub queue_capacity: usize,
    /// Flush as soon as this many events are buffered.
    pub batch_size: usize,
    /// Flush whatever is buffered at least this often.
    pub flush_interval: Duration,
    /// Upper bound on a single export network operation.
    pub export_timeout: Duration,
}

impl Default for ExporterConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 256,
            batch_size: 32,
            flush_interval: Duration::from_millis(1000),
            export_timeout: Duration::from_millis(3000),
        }
    }
}

/// Outcome of a bounded enqueue attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueStatus {
    Queued,
    Dropped,
}

/// Producer handle to the export task.
///
/// `enqueue` is wait-free: when the queue is full the new event is dropped
/// (drop-newest policy) so the serving path never stalls on the store.
/// Exports happen on an independent schedule; a failed or timed-out export
/// discards the batch and is never retried.
#[derive(Clone)]
pub struct BatchExporter {
    tx: mpsc::Sender<PredictionEvent>,
}

impl BatchExporter {
    /// Start the export task against `store` and return the producer handle.
    ///
    /// The task drains and flushes remaining events when every handle has
    /// been dropped.
    pub fn spawn<S>(store: S, config: ExporterConfig) -> (Self, JoinHandle<()>)
    where
        S: TraceStore + 'static,
    {
        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
        let task = tokio::spawn(run_export_loop(rx, store, config));
        (Self { tx }, task)
    }

    pub fn enqueue(&self, event: PredictionEvent) -> EnqueueStatus {
        match self.tx.try_send(event) {
            Ok(()) => EnqueueStatus::Queued,
            Err(mpsc::error::TrySendError::Full(event)) => {
                tracing::debug!(
                    prediction_id = %event.prediction_id,
                    "telemetry queue full, dropping event"
                );
                EnqueueStatus::Dropped
            }
            Err(mpsc::error::TrySendError::Closed(event)) => {
                tracing::debug!(
                    prediction_id = %event.prediction_id,
                    "telemetry exporter stopped, dropping event"
                );
                EnqueueStatus::Dropped
            }
        }
    }
}

async fn run_export_loop<S: TraceStore>(
    mut rx: mpsc::Receiver<PredictionEvent>,
    store: S,
    config: ExporterConfig,
) {
    let mut batch: Vec<PredictionEvent> = Vec::with_capacity(config.batch_size);
    let mut ticker = tokio::time::interval(config.flush_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            received = rx.recv() => match received {
                Some(event) => {
                    batch.push(event);
                    if batch.len() >= config.batch_size {
                        flush(&store, &mut batch, config.export_timeout).await;
                        ticker.reset();
                    }
                }
                None => {
                    // All emitter handles dropped: final drain, then stop.
                    flush(&store, &mut batch, config.export_timeout).await;
                    return;
                }
            },
            _ = ticker.tick() => {
                if !batch.is_empty() {
                    flush(&store, &mut batch, config.export_timeout).await;
                }
            }
        }
    }
}

/// One export attempt for the buffered events. The batch is consumed
/// whether the export succeeds or not: telemetry is best-effort.
async fn flush<S: TraceStore>(store: &S, batch: &mut Vec<PredictionEvent>, timeout: Duration) {
    if batch.is_empty() {
        return;
    }
    let events = std::mem::take(batch);

    match tokio::time::timeout(timeout, store.export_batch(&events)).await {
        Ok(Ok(())) => {
            tracing::debug!(events = events.len(), "exported telemetry batch");
        }
        Ok(Err(e)) => {
            tracing::warn!(
                error = %e,
                events = events.len(),
                "telemetry export failed, discarding batch"
            );
        }
        Err(_) => {
            tracing::warn!(
                timeout_ms = timeout.as_millis() as u64,
                events = events.len(),
                "telemetry export timed out, discarding batch"
            );
        }
    }
}
