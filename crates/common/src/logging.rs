use crate::config::{Environment, LogLevel};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber: pretty output in development,
/// JSON in production.
///
/// `RUST_LOG` overrides the configured log level when set. An
/// OpenTelemetry layer is always installed so spans bridge to OTel once a
/// tracer provider exists (see [`crate::telemetry::TelemetryGuard`]).
///
/// Call this *or* `TelemetryGuard::init`, not both; each installs the
/// global subscriber.
pub fn setup_logging(log_level: LogLevel, environment: Environment) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level.as_str()));

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_opentelemetry::layer());

    match environment {
        Environment::Production => {
            registry
                .with(tracing_subscriber::fmt::layer().json().with_level(true))
                .init();
        }
        Environment::Development => {
            registry
                .with(tracing_subscriber::fmt::layer().pretty().with_ansi(true))
                .init();
        }
    }
}
