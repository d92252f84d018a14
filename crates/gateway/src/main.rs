use common::{TelemetryGuard, setup_logging};
use gateway::config::get_configuration;
use gateway::state::{AppState, init_metrics};
use inference::backend::{ObjectDetector, OrtDetector};
use inference::pool::InstanceLoader;
use inference::registry::HttpModelRegistry;
use inference::{WorkerPool, resolve_model};
use std::path::Path;
use std::sync::Arc;
use telemetry::{BatchExporter, HttpTraceStore, TelemetryEmitter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = get_configuration()?;

    // TelemetryGuard installs the tracing subscriber itself, so only fall
    // back to plain logging when no OTLP collector is configured.
    let _telemetry_guard = match settings.telemetry.otel_endpoint.as_deref() {
        Some(endpoint) => Some(TelemetryGuard::init(
            "gateway",
            endpoint,
            settings.environment,
        )?),
        None => {
            setup_logging(settings.log_level, settings.environment);
            None
        }
    };

    // Shared client for image fetches, registry downloads and trace-store
    // exports; the timeout bounds every outbound request.
    let http = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(10))
        .build()?;

    let registry = settings.model.registry_url.as_ref().map(|url| {
        HttpModelRegistry::new(http.clone(), url.clone(), settings.model.cache_dir.clone().into())
    });
    let source = resolve_model(
        registry.as_ref(),
        settings.model.artifact.as_deref(),
        Path::new(&settings.model.fallback_path),
    )
    .await;
    tracing::info!(
        model = %source.model_name,
        origin = ?source.origin,
        "model resolved"
    );

    let threshold = settings.model.confidence_threshold;
    let loader: Box<InstanceLoader> = Box::new(move |path| {
        Ok(Arc::new(OrtDetector::load_with_threshold(path, threshold)?)
            as Arc<dyn ObjectDetector>)
    });
    let model_name: Arc<str> = source.model_name.clone().into();
    let pool = WorkerPool::build_with_loader(loader, source, settings.pool.pool_config())?;
    let _autoscaler = pool.spawn_autoscaler();

    let emitter = match settings.telemetry.store_url.as_ref() {
        Some(url) => {
            let store = HttpTraceStore::new(http.clone(), url.clone());
            let (exporter, _task) =
                BatchExporter::spawn(store, settings.telemetry.exporter_config());
            TelemetryEmitter::new(exporter)
        }
        None => {
            tracing::warn!("no trace store configured, prediction telemetry disabled");
            TelemetryEmitter::disabled()
        }
    };

    let state = AppState {
        pool,
        emitter: Arc::new(emitter),
        http,
        model_name,
        metrics: Arc::new(init_metrics("gateway")),
    };

    let address = format!(
        "{}:{}",
        settings.application.host, settings.application.port
    );
    let listener = tokio::net::TcpListener::bind(&address).await?;
    tracing::info!(%address, "gateway listening");

    axum::serve(listener, gateway::app(state)).await?;
    Ok(())
}
