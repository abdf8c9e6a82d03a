use crate::{
    backend::{InferenceBackend, InferenceOutput},
    config::{InferenceConfig, LABELS_PATH, MODEL_PATH},
    decode::decode_image,
    error::DetectError,
    labels::LabelVocabulary,
    postprocessing::{BoundingBox, PostProcessor, TransformParams},
};
use ndarray::{Array, IxDyn};
use preprocess::{CpuPreProcessor, Preprocess};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

/// One detected object in original image pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub score: f32,
    pub label: String,
}

impl Detection {
    fn from_box(bbox: &BoundingBox, label: &str) -> Self {
        Self {
            x: bbox.x1,
            y: bbox.y1,
            width: bbox.x2 - bbox.x1,
            height: bbox.y2 - bbox.y1,
            score: bbox.confidence,
            label: label.to_string(),
        }
    }
}

/// Turns one encoded image into the objects found in it.
pub trait Detector: Send + Sync {
    fn detect(&self, image: &[u8]) -> Result<Vec<Detection>, DetectError>;

    fn labels(&self) -> &LabelVocabulary;
}

/// Detector backed by a model loaded once at startup.
///
/// The backend sits behind a mutex because inference sessions need exclusive
/// access while running. Decoding and pre/post-processing run outside the lock.
pub struct ModelDetector<B: InferenceBackend> {
    backend: Mutex<B>,
    labels: LabelVocabulary,
    postprocessor: PostProcessor,
    config: InferenceConfig,
}

impl<B: InferenceBackend> ModelDetector<B> {
    pub fn new(backend: B, labels: LabelVocabulary, config: InferenceConfig) -> Self {
        let postprocessor = PostProcessor::new(&config, labels.len());
        Self {
            backend: Mutex::new(backend),
            labels,
            postprocessor,
            config,
        }
    }

    /// Load the model and label vocabulary from their fixed locations.
    ///
    /// Fails if either artifact is missing or the model output does not match
    /// the vocabulary, so the service never starts without a usable model.
    pub fn load(config: InferenceConfig) -> anyhow::Result<Self> {
        Self::load_from(MODEL_PATH, LABELS_PATH, config)
    }

    pub fn load_from(
        model_path: &str,
        labels_path: &str,
        config: InferenceConfig,
    ) -> anyhow::Result<Self> {
        config.validate()?;

        let labels = LabelVocabulary::load(labels_path)?;
        tracing::info!(path = labels_path, labels = labels.len(), "Label vocabulary loaded");
        tracing::debug!(classes = ?labels.iter().collect::<Vec<_>>(), "Detector classes");

        tracing::info!(path = model_path, "Loading inference model");
        let backend = B::load_model(model_path, &config)?;

        let detector = Self::new(backend, labels, config);
        detector.warm_up()?;
        tracing::info!("Model loaded successfully");

        Ok(detector)
    }

    /// Run one inference on a blank input and check the output layout.
    pub fn warm_up(&self) -> anyhow::Result<()> {
        let _s = common::span!("warm_up");

        let (width, height) = self.config.input_size();
        let blank = Array::<f32, IxDyn>::zeros(IxDyn(&[1, 3, height as usize, width as usize]));

        let InferenceOutput { predictions } = self.run_backend(&blank)?;
        let layout = self.postprocessor.layout(predictions.shape())?;

        tracing::debug!(layout = ?layout, shape = ?predictions.shape(), "Warm-up inference complete");
        Ok(())
    }

    fn run_backend(&self, input: &Array<f32, IxDyn>) -> Result<InferenceOutput, DetectError> {
        let mut backend = self
            .backend
            .lock()
            .map_err(|_| DetectError::Unavailable("inference backend lock poisoned".to_string()))?;

        let _infer_span = tracing::info_span!("model_inference").entered();
        backend.infer(input).map_err(DetectError::Inference)
    }

    fn resolve(&self, bbox: &BoundingBox) -> Result<Detection, DetectError> {
        let label = self
            .labels
            .resolve(bbox.class_id)
            .ok_or(DetectError::UnknownLabel {
                index: bbox.class_id,
                vocabulary_size: self.labels.len(),
            })?;

        Ok(Detection::from_box(bbox, label))
    }
}

impl<B: InferenceBackend + Send> Detector for ModelDetector<B> {
    #[tracing::instrument(skip_all, fields(image_bytes = image.len()))]
    fn detect(&self, image: &[u8]) -> Result<Vec<Detection>, DetectError> {
        let rgb = decode_image(image)?;
        let (width, height) = rgb.dimensions();

        let mut preprocessor = CpuPreProcessor::new(self.config.input_size());
        let prepared = preprocessor
            .preprocess(rgb.as_raw(), width, height)
            .map_err(DetectError::Preprocess)?;

        let InferenceOutput { predictions } = self.run_backend(&prepared.input)?;

        let transform = TransformParams {
            orig_width: width,
            orig_height: height,
            scale: prepared.scale,
            offset_x: prepared.offset_x,
            offset_y: prepared.offset_y,
        };

        let boxes = self
            .postprocessor
            .parse_detections(&predictions.view(), &transform)
            .map_err(DetectError::Inference)?;

        let detections = boxes
            .iter()
            .map(|bbox| self.resolve(bbox))
            .collect::<Result<Vec<_>, _>>()?;

        tracing::debug!(width, height, detections = detections.len(), "Image processed");
        Ok(detections)
    }

    fn labels(&self) -> &LabelVocabulary {
        &self.labels
    }
}
