#[cfg(not(feature = "ort-backend"))]
compile_error!("The gateway binary needs an inference backend. Enable the `ort-backend` feature.");

use common::TelemetryGuard;
use gateway::{
    config::get_configuration, logging::setup_logging, server::run_server, state::AppState,
};
use inference::{Detector, ModelDetector, backend::ort::OrtBackend};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = get_configuration()?;

    let _telemetry = match config.otel_endpoint.as_deref() {
        Some(endpoint) => Some(TelemetryGuard::init(
            "gateway",
            endpoint,
            config.log_level,
            config.environment,
        )?),
        None => {
            setup_logging(&config);
            None
        }
    };

    tracing::info!(
        environment = config.environment.as_str(),
        address = %config.bind_address(),
        "Starting object detection gateway"
    );

    let detector: Arc<dyn Detector> =
        Arc::new(ModelDetector::<OrtBackend>::load(config.inference.clone())?);
    tracing::info!(classes = detector.labels().len(), "Detector ready");

    let state = AppState::new(detector);

    run_server(&config, state).await
}
