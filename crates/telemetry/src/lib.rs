pub mod emitter;
pub mod errors;
pub mod exporter;
pub mod memory;
pub mod store;

pub use emitter::{RecordMeta, TelemetryEmitter};
pub use errors::StoreError;
pub use exporter::{BatchExporter, EnqueueStatus, ExporterConfig};
pub use memory::InMemoryTraceStore;
pub use store::{EventFilter, HttpTraceStore, TraceStore};
