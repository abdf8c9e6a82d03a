pub mod backend;
pub mod config;
pub mod decode;
pub mod detector;
pub mod error;
pub mod labels;
pub mod postprocessing;

// Re-export commonly used types for convenience
pub use backend::{InferenceBackend, InferenceOutput};
pub use config::{ExecutionProvider, InferenceConfig};
pub use decode::decode_image;
pub use detector::{Detection, Detector, ModelDetector};
pub use error::DetectError;
pub use labels::{LabelError, LabelVocabulary};
