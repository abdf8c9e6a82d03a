use inference::Detector;
use opentelemetry::{
    KeyValue, global,
    metrics::{Counter, Histogram},
};
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
pub struct AppState {
    pub detector: Arc<dyn Detector>,
    pub metrics: DetectMetrics,
}

impl AppState {
    pub fn new(detector: Arc<dyn Detector>) -> Self {
        Self {
            detector,
            metrics: DetectMetrics::init(),
        }
    }
}

/// Request-level instruments. No-ops unless a meter provider is installed.
#[derive(Clone)]
pub struct DetectMetrics {
    duration: Histogram<f64>,
    detections: Counter<u64>,
    failures: Counter<u64>,
}

impl DetectMetrics {
    fn init() -> Self {
        let meter = global::meter("gateway");

        Self {
            duration: meter
                .f64_histogram("detect_duration_seconds")
                .with_description("Time spent decoding and running detection on one upload")
                .with_unit("s")
                .build(),
            detections: meter
                .u64_counter("detections_total")
                .with_description("Objects returned across all requests")
                .build(),
            failures: meter
                .u64_counter("detect_failures_total")
                .with_description("Uploads that could not be processed")
                .build(),
        }
    }

    pub fn record_success(&self, elapsed: Duration, detections: usize) {
        self.duration
            .record(elapsed.as_secs_f64(), &[KeyValue::new("outcome", "ok")]);
        self.detections.add(detections as u64, &[]);
    }

    pub fn record_failure(&self, elapsed: Duration, reason: &'static str) {
        self.duration
            .record(elapsed.as_secs_f64(), &[KeyValue::new("outcome", "error")]);
        self.failures.add(1, &[KeyValue::new("reason", reason)]);
    }
}
