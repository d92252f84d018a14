use common::{Environment, LogLevel};
use inference::PoolConfig;
use serde::Deserialize;
use std::time::Duration;
use telemetry::ExporterConfig;

#[derive(Deserialize)]
pub struct Settings {
    pub log_level: LogLevel,
    pub environment: Environment,
    pub application: ApplicationSettings,
    pub model: ModelSettings,
    pub pool: PoolSettings,
    pub telemetry: TelemetrySettings,
}

#[derive(Deserialize)]
pub struct ApplicationSettings {
    pub host: String,
    pub port: u16,
}

#[derive(Deserialize)]
pub struct ModelSettings {
    /// Registry artifact reference, e.g. `team/detector:v2`. When unset the
    /// bundled default model is used directly.
    pub artifact: Option<String>,
    pub registry_url: Option<String>,
    pub cache_dir: String,
    pub fallback_path: String,
    pub confidence_threshold: f32,
}

#[derive(Deserialize)]
pub struct PoolSettings {
    pub min_replicas: usize,
    pub max_replicas: usize,
    pub admission_timeout_ms: u64,
    pub infer_timeout_ms: u64,
    pub autoscale_interval_ms: u64,
}

impl PoolSettings {
    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig {
            min_replicas: self.min_replicas,
            max_replicas: self.max_replicas,
            admission_timeout: Duration::from_millis(self.admission_timeout_ms),
            infer_timeout: Duration::from_millis(self.infer_timeout_ms),
            autoscale_interval: Duration::from_millis(self.autoscale_interval_ms),
        }
    }
}

#[derive(Deserialize)]
pub struct TelemetrySettings {
    /// Trace store base URL. When unset, prediction telemetry is disabled.
    pub store_url: Option<String>,
    pub queue_capacity: usize,
    pub batch_size: usize,
    pub flush_interval_ms: u64,
    pub export_timeout_ms: u64,
    /// OTLP collector endpoint for the service's own traces and metrics.
    pub otel_endpoint: Option<String>,
}

impl TelemetrySettings {
    pub fn exporter_config(&self) -> ExporterConfig {
        ExporterConfig {
            queue_capacity: self.queue_capacity,
            batch_size: self.batch_size,
            flush_interval: Duration::from_millis(self.flush_interval_ms),
            export_timeout: Duration::from_millis(self.export_timeout_ms),
        }
    }
}

pub fn get_configuration() -> Result<Settings, config::ConfigError> {
    let config = config::Config::builder()
        .set_default("log_level", "info")?
        .set_default("environment", "development")?
        .set_default("application.host", "0.0.0.0")?
        .set_default("application.port", 8000)?
        .set_default("model.cache_dir", "/tmp/model-cache")?
        .set_default("model.fallback_path", "models/detector.onnx")?
        .set_default("model.confidence_threshold", 0.5)?
        .set_default("pool.min_replicas", 1)?
        .set_default("pool.max_replicas", 2)?
        .set_default("pool.admission_timeout_ms", 500)?
        .set_default("pool.infer_timeout_ms", 10_000)?
        .set_default("pool.autoscale_interval_ms", 2_000)?
        .set_default("telemetry.queue_capacity", 256)?
        .set_default("telemetry.batch_size", 32)?
        .set_default("telemetry.flush_interval_ms", 1_000)?
        .set_default("telemetry.export_timeout_ms", 3_000)?
        .add_source(
            config::Environment::with_prefix("GATEWAY")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    config.try_deserialize::<Settings>()
}
