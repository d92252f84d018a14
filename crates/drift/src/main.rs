use common::{LogLevel, setup_logging};
use drift::config::DriftConfig;
use drift::dataset::CurrentWindow;
use drift::engine::DriftEngine;
use drift::workspace::HttpWorkspace;
use telemetry::HttpTraceStore;

#[tokio::main]
async fn main() {
    let config = match DriftConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("invalid configuration: {e}");
            std::process::exit(2);
        }
    };
    setup_logging(LogLevel::Info, config.environment);

    let command = std::env::args().nth(1);
    let outcome = match command.as_deref() {
        Some("create-reference") => create_reference(&config).await,
        Some("analyze") => analyze(&config).await,
        _ => {
            eprintln!("usage: drift <create-reference|analyze>");
            std::process::exit(2);
        }
    };

    if let Err(e) = outcome {
        tracing::error!(error = %e, "drift run failed");
        std::process::exit(1);
    }
}

fn build_engine(config: &DriftConfig) -> DriftEngine<HttpTraceStore, HttpWorkspace> {
    let client = reqwest::Client::new();
    let store = HttpTraceStore::new(client.clone(), config.store_url.clone());
    let workspace = HttpWorkspace::new(
        client,
        config.workspace_url.clone(),
        config.workspace_project.clone(),
        config.workspace_api_key.clone(),
    );
    DriftEngine::with_thresholds(store, workspace, config.thresholds())
}

async fn create_reference(config: &DriftConfig) -> anyhow::Result<()> {
    let engine = build_engine(config);
    let dataset = engine
        .create_reference(&config.reference_name, &config.reference_criteria())
        .await?;
    tracing::info!(name = %dataset.name, rows = dataset.len(), "reference dataset stored");
    Ok(())
}

async fn analyze(config: &DriftConfig) -> anyhow::Result<()> {
    let engine = build_engine(config);
    let window = CurrentWindow::trailing_days(config.window_days);
    let report = engine.analyze(&config.reference_name, window).await?;

    for feature in &report.features {
        tracing::info!(
            feature = %feature.feature,
            method = ?feature.method,
            score = feature.score,
            threshold = feature.threshold,
            drifted = feature.drifted,
            "feature scored"
        );
    }
    tracing::info!(
        drift_detected = report.drift_detected,
        report_url = report.report_url.as_deref().unwrap_or("-"),
        "analysis stored"
    );
    Ok(())
}
