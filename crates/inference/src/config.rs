use serde::Deserialize;

/// Location of the exported detector, relative to the working directory.
pub const MODEL_PATH: &str = "model/best.onnx";

/// Class names for the detector, one per line, in class-id order.
pub const LABELS_PATH: &str = "model/labels.txt";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionProvider {
    Cpu,
    Cuda,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    pub input_width: u32,
    pub input_height: u32,
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
    pub max_detections: usize,
    pub execution_provider: ExecutionProvider,
    pub intra_threads: usize,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            input_width: 640,
            input_height: 640,
            confidence_threshold: 0.25,
            iou_threshold: 0.7,
            max_detections: 300,
            execution_provider: ExecutionProvider::Cpu,
            intra_threads: 4,
        }
    }
}

impl InferenceConfig {
    pub fn input_size(&self) -> (u32, u32) {
        (self.input_width, self.input_height)
    }

    /// Reject settings the detector cannot run with.
    pub fn validate(&self) -> anyhow::Result<()> {
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            anyhow::bail!(
                "confidence_threshold must be within [0, 1], got {}",
                self.confidence_threshold
            );
        }
        if !(0.0..=1.0).contains(&self.iou_threshold) {
            anyhow::bail!(
                "iou_threshold must be within [0, 1], got {}",
                self.iou_threshold
            );
        }
        if self.max_detections == 0 {
            anyhow::bail!("max_detections must be greater than 0");
        }
        // YOLO heads downsample by 32
        for (name, value) in [
            ("input_width", self.input_width),
            ("input_height", self.input_height),
        ] {
            if value == 0 || value % 32 != 0 {
                anyhow::bail!("{} must be a positive multiple of 32, got {}", name, value);
            }
        }
        if self.intra_threads == 0 {
            anyhow::bail!("intra_threads must be greater than 0");
        }
        Ok(())
    }
}
