use crate::config::InferenceConfig;
use ndarray::{Array, IxDyn};

#[cfg(feature = "ort-backend")]
pub mod ort;

pub trait InferenceBackend {
    fn load_model(path: &str, config: &InferenceConfig) -> anyhow::Result<Self>
    where
        Self: Sized;

    /// Run inference on a single preprocessed NCHW image
    fn infer(&mut self, images: &Array<f32, IxDyn>) -> anyhow::Result<InferenceOutput>;
}

pub struct InferenceOutput {
    /// Either `[1, 4 + num_classes, N]` (raw head, cxcywh in input pixels)
    /// or `[1, N, 6]` (end-to-end export, xyxy + score + class id)
    pub predictions: ndarray::ArrayD<f32>,
}
