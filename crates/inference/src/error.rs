use thiserror::Error;

/// Failure of a single detection request.
#[derive(Error, Debug)]
pub enum DetectError {
    #[error("Failed to decode image: {0}")]
    Decode(#[from] image::ImageError),

    #[error("Preprocessing failed: {0}")]
    Preprocess(anyhow::Error),

    #[error("Inference failed: {0}")]
    Inference(anyhow::Error),

    #[error("Class index {index} is outside the label vocabulary ({vocabulary_size} labels)")]
    UnknownLabel {
        index: usize,
        vocabulary_size: usize,
    },

    #[error("Inference backend unavailable: {0}")]
    Unavailable(String),
}
