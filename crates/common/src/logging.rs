use crate::config::{Environment, LogLevel};
use tracing::Subscriber;
use tracing_subscriber::{
    EnvFilter, Layer, layer::SubscriberExt, registry::LookupSpan, util::SubscriberInitExt,
};

/// Initialize tracing subscriber with pretty formatting for development
/// and JSON formatting for production.
///
/// `RUST_LOG` takes precedence over `log_level` when it is set.
///
/// Also adds an OpenTelemetry layer that exports traces if a global tracer provider
/// has been initialized (see [`crate::telemetry::TelemetryGuard`]).
pub fn setup_logging(log_level: LogLevel, environment: Environment) {
    tracing_subscriber::registry()
        .with(env_filter(log_level))
        .with(tracing_opentelemetry::layer())
        .with(fmt_layer(environment))
        .init();
}

pub(crate) fn env_filter(log_level: LogLevel) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level.as_str()))
}

pub(crate) fn fmt_layer<S>(environment: Environment) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    match environment {
        Environment::Production => tracing_subscriber::fmt::layer()
            .json()
            .with_level(true)
            .boxed(),
        Environment::Development => tracing_subscriber::fmt::layer()
            .pretty()
            .with_ansi(true)
            .boxed(),
    }
}
