use image::{ImageFormat, Rgb, RgbImage};
use inference::{
    DetectError, Detector, InferenceBackend, InferenceConfig, InferenceOutput, LabelVocabulary,
    ModelDetector,
};
use ndarray::{Array, IxDyn};
use std::io::{Cursor, Write};
use std::sync::Arc;
use std::thread;
use tempfile::NamedTempFile;

/// Backend that returns a canned prediction tensor regardless of input
struct FixedBackend {
    predictions: Array<f32, IxDyn>,
}

impl FixedBackend {
    /// Raw `[1, 4 + num_classes, n]` output from (cx, cy, w, h, class_id, score) tuples
    fn raw(num_classes: usize, candidates: &[(f32, f32, f32, f32, usize, f32)]) -> Self {
        let n = candidates.len().max(1);
        let mut predictions = Array::<f32, IxDyn>::zeros(IxDyn(&[1, 4 + num_classes, n]));
        for (i, &(cx, cy, w, h, class_id, score)) in candidates.iter().enumerate() {
            predictions[[0, 0, i]] = cx;
            predictions[[0, 1, i]] = cy;
            predictions[[0, 2, i]] = w;
            predictions[[0, 3, i]] = h;
            predictions[[0, 4 + class_id, i]] = score;
        }
        Self { predictions }
    }

    /// End-to-end `[1, n, 6]` output from (x1, y1, x2, y2, score, class_id) rows
    fn end_to_end(rows: &[[f32; 6]]) -> Self {
        let data: Vec<f32> = rows.iter().flatten().copied().collect();
        let predictions = Array::from_shape_vec(IxDyn(&[1, rows.len(), 6]), data).unwrap();
        Self { predictions }
    }
}

impl InferenceBackend for FixedBackend {
    fn load_model(_path: &str, _config: &InferenceConfig) -> anyhow::Result<Self> {
        // 80-class head, used to exercise vocabulary mismatch on startup
        Ok(Self::raw(80, &[]))
    }

    fn infer(&mut self, images: &Array<f32, IxDyn>) -> anyhow::Result<InferenceOutput> {
        assert_eq!(images.shape(), &[1, 3, 640, 640], "Backend expects NCHW input");
        Ok(InferenceOutput {
            predictions: self.predictions.clone(),
        })
    }
}

/// Backend that reports one full-frame object whose class depends on the image color:
/// class 0 when the red channel dominates, class 1 otherwise.
struct ColorBackend;

impl InferenceBackend for ColorBackend {
    fn load_model(_path: &str, _config: &InferenceConfig) -> anyhow::Result<Self> {
        Ok(Self)
    }

    fn infer(&mut self, images: &Array<f32, IxDyn>) -> anyhow::Result<InferenceOutput> {
        let red = images[[0, 0, 320, 320]];
        let blue = images[[0, 2, 320, 320]];
        let class_id = if red > blue { 0 } else { 1 };

        let mut predictions = Array::<f32, IxDyn>::zeros(IxDyn(&[1, 6, 1]));
        predictions[[0, 0, 0]] = 320.0;
        predictions[[0, 1, 0]] = 320.0;
        predictions[[0, 2, 0]] = 200.0;
        predictions[[0, 3, 0]] = 200.0;
        predictions[[0, 4 + class_id, 0]] = 0.9;
        Ok(InferenceOutput { predictions })
    }
}

fn vocabulary(labels: &[&str]) -> LabelVocabulary {
    labels.iter().copied().collect()
}

fn encode_png(width: u32, height: u32, color: [u8; 3]) -> Vec<u8> {
    let image = RgbImage::from_pixel(width, height, Rgb(color));
    let mut bytes = Cursor::new(Vec::new());
    image.write_to(&mut bytes, ImageFormat::Png).unwrap();
    bytes.into_inner()
}

/// One cat at (10,20)-(110,220) with confidence 0.87
#[test]
fn test_single_object_detection() {
    let backend = FixedBackend::raw(2, &[(60.0, 120.0, 100.0, 200.0, 1, 0.87)]);
    let detector = ModelDetector::new(
        backend,
        vocabulary(&["dog", "cat"]),
        InferenceConfig::default(),
    );

    let detections = detector.detect(&encode_png(640, 640, [90, 90, 90])).unwrap();

    assert_eq!(detections.len(), 1);
    let cat = &detections[0];
    assert_eq!(cat.label, "cat");
    assert_eq!(cat.x, 10.0);
    assert_eq!(cat.y, 20.0);
    assert_eq!(cat.width, 100.0);
    assert_eq!(cat.height, 200.0);
    assert_eq!(cat.score, 0.87);
}

#[test]
fn test_no_objects_is_empty_success() {
    let backend = FixedBackend::raw(2, &[(60.0, 120.0, 100.0, 200.0, 0, 0.05)]);
    let detector = ModelDetector::new(
        backend,
        vocabulary(&["dog", "cat"]),
        InferenceConfig::default(),
    );

    let detections = detector.detect(&encode_png(64, 48, [0, 0, 0])).unwrap();

    assert!(detections.is_empty(), "No objects should not be an error");
}

#[test]
fn test_non_image_bytes_fail_to_decode() {
    let backend = FixedBackend::raw(2, &[(60.0, 120.0, 100.0, 200.0, 0, 0.9)]);
    let detector = ModelDetector::new(
        backend,
        vocabulary(&["dog", "cat"]),
        InferenceConfig::default(),
    );

    let result = detector.detect(b"%PDF-1.4 this is not an image");

    assert!(
        matches!(result, Err(DetectError::Decode(_))),
        "Expected decode failure, got {:?}",
        result
    );
}

#[test]
fn test_boxes_mapped_to_upload_pixels() {
    // 1280x640 upload: scale 0.5, offset_y = (640 - 320) / 2 = 160
    // Input-space box (100, 200)-(300, 400) -> original (200, 80)-(600, 480)
    let backend = FixedBackend::raw(1, &[(200.0, 300.0, 200.0, 200.0, 0, 0.8)]);
    let detector = ModelDetector::new(
        backend,
        vocabulary(&["elephant"]),
        InferenceConfig::default(),
    );

    let detections = detector.detect(&encode_png(1280, 640, [10, 200, 10])).unwrap();

    assert_eq!(detections.len(), 1);
    let d = &detections[0];
    assert!((d.x - 200.0).abs() < 1e-3, "x = {}", d.x);
    assert!((d.y - 80.0).abs() < 1e-3, "y = {}", d.y);
    assert!((d.width - 400.0).abs() < 1e-3, "width = {}", d.width);
    assert!((d.height - 400.0).abs() < 1e-3, "height = {}", d.height);
}

#[test]
fn test_detection_invariants_hold() {
    let candidates = [
        (100.0, 100.0, 80.0, 60.0, 0, 0.95),
        (300.0, 200.0, 40.0, 90.0, 1, 0.60),
        (500.0, 500.0, 300.0, 300.0, 2, 0.40), // spills past the image edge
        (50.0, 600.0, 20.0, 20.0, 1, 0.30),
    ];
    let backend = FixedBackend::raw(3, &candidates);
    let labels = vocabulary(&["person", "car", "dog"]);
    let detector = ModelDetector::new(backend, labels.clone(), InferenceConfig::default());

    let detections = detector.detect(&encode_png(640, 640, [1, 2, 3])).unwrap();

    assert_eq!(detections.len(), candidates.len());
    for d in &detections {
        assert!(d.width >= 0.0, "width must be non-negative: {:?}", d);
        assert!(d.height >= 0.0, "height must be non-negative: {:?}", d);
        assert!((0.0..=1.0).contains(&d.score), "score out of range: {:?}", d);
        assert!(
            labels.iter().any(|label| label == d.label),
            "unknown label: {:?}",
            d
        );
    }
}

#[test]
fn test_out_of_range_class_is_explicit_error() {
    let backend = FixedBackend::end_to_end(&[[10.0, 10.0, 50.0, 50.0, 0.9, 5.0]]);
    let detector = ModelDetector::new(
        backend,
        vocabulary(&["dog", "cat"]),
        InferenceConfig::default(),
    );

    let result = detector.detect(&encode_png(640, 640, [0, 0, 0]));

    match result {
        Err(DetectError::UnknownLabel {
            index,
            vocabulary_size,
        }) => {
            assert_eq!(index, 5);
            assert_eq!(vocabulary_size, 2);
        }
        other => panic!("Expected UnknownLabel, got {:?}", other),
    }
}

#[test]
fn test_concurrent_requests_do_not_leak() {
    let detector = Arc::new(ModelDetector::new(
        ColorBackend,
        vocabulary(&["red", "blue"]),
        InferenceConfig::default(),
    ));

    let red = encode_png(320, 240, [250, 0, 0]);
    let blue = encode_png(240, 320, [0, 0, 250]);

    thread::scope(|scope| {
        for i in 0..16 {
            let detector = Arc::clone(&detector);
            let (image, expected) = if i % 2 == 0 {
                (&red, "red")
            } else {
                (&blue, "blue")
            };

            scope.spawn(move || {
                for _ in 0..4 {
                    let detections = detector.detect(image).unwrap();
                    assert_eq!(detections.len(), 1);
                    assert_eq!(detections[0].label, expected);
                }
            });
        }
    });
}

#[test]
fn test_load_rejects_vocabulary_mismatch() {
    let mut labels_file = NamedTempFile::new().unwrap();
    writeln!(labels_file, "dog\ncat").unwrap();

    // FixedBackend::load_model produces an 80-class head
    let result = ModelDetector::<FixedBackend>::load_from(
        "unused.onnx",
        labels_file.path().to_str().unwrap(),
        InferenceConfig::default(),
    );

    let err = result.err().expect("Mismatched model must fail at startup");
    assert!(
        err.to_string().contains("Unexpected prediction shape"),
        "Got: {}",
        err
    );
}

#[test]
fn test_load_accepts_matching_vocabulary() {
    let mut labels_file = NamedTempFile::new().unwrap();
    for i in 0..80 {
        writeln!(labels_file, "class_{}", i).unwrap();
    }

    let detector = ModelDetector::<FixedBackend>::load_from(
        "unused.onnx",
        labels_file.path().to_str().unwrap(),
        InferenceConfig::default(),
    )
    .unwrap();

    assert_eq!(detector.labels().len(), 80);
    assert_eq!(detector.labels().resolve(79), Some("class_79"));
}

#[test]
fn test_load_fails_without_labels() {
    let result = ModelDetector::<FixedBackend>::load_from(
        "unused.onnx",
        "/nonexistent/labels.txt",
        InferenceConfig::default(),
    );

    assert!(result.is_err(), "Missing label file must fail at startup");
}
