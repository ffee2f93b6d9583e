//! OCR pipeline orchestration
//!
//! detect → extract boxes → crop → recognize → decode → records, then
//! optionally field inference on the records.

use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use image::RgbImage;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{AppConfig, DetectionConfig, RecognitionConfig};
use crate::error::Result;
use crate::invoice::{FieldInferenceEngine, InvoiceFields};
use crate::vision::boxes::BoxExtractor;
use crate::vision::ctc::{CharDictionary, CtcDecoder};
use crate::vision::models::{ModelPaths, OnnxDetector, OnnxRecognizer, TextDetector, TextRecognizer};
use crate::vision::preprocess::{crop_box, prepare_detection, prepare_recognition};
use crate::vision::{TextBox, TextRecord};

/// Fields inferred from one image together with the records they came from
#[derive(Debug, Clone, Serialize)]
pub struct InvoiceReport {
    pub fields: InvoiceFields,
    pub records: Vec<TextRecord>,
    /// Wall time of the whole run in milliseconds
    pub elapsed_ms: u64,
}

/// Stateless OCR pipeline over shared detector/recognizer capabilities
///
/// Safe to share across threads; each call owns its working buffers.
pub struct OcrPipeline {
    detector: Arc<dyn TextDetector>,
    recognizer: Arc<dyn TextRecognizer>,
    extractor: BoxExtractor,
    decoder: CtcDecoder,
    detection: DetectionConfig,
    recognition: RecognitionConfig,
    engine: FieldInferenceEngine,
}

impl OcrPipeline {
    /// Create a pipeline over the given capabilities
    pub fn new(
        detector: Arc<dyn TextDetector>,
        recognizer: Arc<dyn TextRecognizer>,
        config: &AppConfig,
        dictionary: CharDictionary,
    ) -> Self {
        Self {
            detector,
            recognizer,
            extractor: BoxExtractor::new(&config.detection, config.expansion),
            decoder: CtcDecoder::new(dictionary),
            detection: config.detection.clone(),
            recognition: config.recognition,
            engine: FieldInferenceEngine::new(config.keywords.clone()),
        }
    }

    /// Load the ONNX models and dictionary named by the configuration
    pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let paths = ModelPaths::resolve(&config.models)?;
        info!(
            "Using detector {:?}, recognizer {:?}",
            paths.detector, paths.recognizer
        );

        let threads = config.models.intra_threads;
        let detector = OnnxDetector::new(&paths.detector, threads)
            .with_context(|| format!("Failed to load detector {:?}", paths.detector))?;
        let recognizer = OnnxRecognizer::new(&paths.recognizer, threads)
            .with_context(|| format!("Failed to load recognizer {:?}", paths.recognizer))?;

        let dictionary = match &paths.dictionary {
            Some(path) => CharDictionary::from_file(path)?,
            None => CharDictionary::default(),
        };

        Ok(Self::new(Arc::new(detector), Arc::new(recognizer), config, dictionary))
    }

    /// Run detection and box extraction only
    pub fn detect_boxes(&self, image: &RgbImage) -> Result<Vec<TextBox>> {
        let input = prepare_detection(
            image,
            self.detection.resize_long,
            &self.detection.mean,
            &self.detection.std,
        )?;
        debug!(
            "Detection input {:?} (resized {:?}, offset {:?})",
            input.tensor.shape(),
            input.resized,
            input.offset
        );

        let output = self.detector.detect(&input.tensor)?;
        Ok(self.extractor.extract(output.view(), image.dimensions()))
    }

    /// Run the full OCR pipeline
    ///
    /// Returns one record per extracted box, in extraction order. Boxes whose
    /// crop is empty or fails recognition yield an empty-text record.
    pub fn run(&self, image: &RgbImage) -> Result<Vec<TextRecord>> {
        let start = Instant::now();
        let boxes = self.detect_boxes(image)?;

        let records: Vec<TextRecord> = boxes
            .into_iter()
            .map(|text_box| TextRecord::new(text_box, self.recognize_box(image, &text_box)))
            .collect();

        info!(
            "OCR found {} text regions in {:?}",
            records.len(),
            start.elapsed()
        );

        Ok(records)
    }

    /// Recognize a single box, degrading to empty text on failure
    fn recognize_box(&self, image: &RgbImage, text_box: &TextBox) -> String {
        let Some(crop) = crop_box(image, text_box) else {
            debug!("Empty crop for box {:?}", text_box.coords());
            return String::new();
        };

        let decoded = prepare_recognition(
            &crop,
            self.recognition.target_height,
            self.recognition.target_width,
        )
        .and_then(|tensor| self.recognizer.recognize(&tensor))
        .and_then(|scores| self.decoder.decode(scores.view()));

        match decoded {
            Ok(text) => text,
            Err(e) => {
                warn!("Recognition failed for box {:?}: {}", text_box.coords(), e);
                String::new()
            }
        }
    }

    /// Infer invoice fields from records
    pub fn infer(&self, records: &[TextRecord]) -> InvoiceFields {
        self.engine.infer(records)
    }

    /// Run OCR and field inference on one image
    pub fn extract_invoice(&self, image: &RgbImage) -> Result<InvoiceReport> {
        let start = Instant::now();

        let records = self.run(image)?;
        let fields = self.infer(&records);

        let elapsed_ms = start.elapsed().as_millis() as u64;
        info!(
            "Invoice extracted in {}ms: supplier={:?}, total={:?}, currency={:?}",
            elapsed_ms, fields.supplier_name, fields.total, fields.currency
        );

        Ok(InvoiceReport {
            fields,
            records,
            elapsed_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OcrError;
    use image::Rgb;
    use ndarray::{Array2, Array4, ArrayD, IxDyn};

    /// Emits a fixed direct-box output regardless of input
    struct FixedDetector(ArrayD<f32>);

    impl TextDetector for FixedDetector {
        fn detect(&self, _input: &Array4<f32>) -> Result<ArrayD<f32>> {
            Ok(self.0.clone())
        }
    }

    struct FailingDetector;

    impl TextDetector for FailingDetector {
        fn detect(&self, _input: &Array4<f32>) -> Result<ArrayD<f32>> {
            Err(OcrError::Inference("session crashed".to_string()))
        }
    }

    /// Always decodes to the digit "7"
    struct SevenRecognizer;

    impl TextRecognizer for SevenRecognizer {
        fn recognize(&self, input: &Array4<f32>) -> Result<Array2<f32>> {
            assert_eq!(input.shape(), &[1, 3, 48, 320]);
            let mut scores = Array2::<f32>::zeros((4, 84));
            scores[[0, 8]] = 1.0;
            scores[[1, 8]] = 1.0;
            scores[[2, 0]] = 1.0;
            scores[[3, 0]] = 1.0;
            Ok(scores)
        }
    }

    struct FailingRecognizer;

    impl TextRecognizer for FailingRecognizer {
        fn recognize(&self, _input: &Array4<f32>) -> Result<Array2<f32>> {
            Err(OcrError::DecodeFailure("bad crop".to_string()))
        }
    }

    fn direct_output(rows: &[[f32; 5]]) -> ArrayD<f32> {
        let flat: Vec<f32> = rows.iter().flatten().copied().collect();
        ArrayD::from_shape_vec(IxDyn(&[1, rows.len(), 5]), flat).unwrap()
    }

    fn pipeline(detector: impl TextDetector + 'static, recognizer: impl TextRecognizer + 'static) -> OcrPipeline {
        OcrPipeline::new(
            Arc::new(detector),
            Arc::new(recognizer),
            &AppConfig::default(),
            CharDictionary::default(),
        )
    }

    fn white_image(w: u32, h: u32) -> RgbImage {
        RgbImage::from_pixel(w, h, Rgb([255, 255, 255]))
    }

    #[test]
    fn test_run_assembles_records_in_box_order() {
        let output = direct_output(&[[10.0, 10.0, 60.0, 30.0, 0.9], [70.0, 40.0, 150.0, 70.0, 0.8]]);
        let pipe = pipeline(FixedDetector(output), SevenRecognizer);

        let records = pipe.run(&white_image(200, 100)).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].text, "7");
        assert_eq!(records[0].text_box.coords(), [6, 6, 64, 34]);
        assert!((records[1].confidence - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_recognition_failure_yields_empty_text() {
        let output = direct_output(&[[10.0, 10.0, 60.0, 30.0, 0.9]]);
        let pipe = pipeline(FixedDetector(output), FailingRecognizer);

        let records = pipe.run(&white_image(200, 100)).unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].text, "");
    }

    #[test]
    fn test_detector_failure_aborts_run() {
        let pipe = pipeline(FailingDetector, SevenRecognizer);
        let result = pipe.run(&white_image(64, 64));
        assert!(matches!(result, Err(OcrError::Inference(_))));
    }

    #[test]
    fn test_empty_image_is_invalid_input() {
        let pipe = pipeline(FixedDetector(direct_output(&[])), SevenRecognizer);
        let result = pipe.run(&RgbImage::new(0, 0));
        assert!(matches!(result, Err(OcrError::InvalidInput(_))));
    }

    #[test]
    fn test_unsupported_output_yields_no_records() {
        let output = ArrayD::<f32>::zeros(IxDyn(&[1, 8, 16, 16]));
        let pipe = pipeline(FixedDetector(output), SevenRecognizer);

        let report = pipe.extract_invoice(&white_image(64, 64)).unwrap();

        assert!(report.records.is_empty());
        assert_eq!(report.fields.supplier_name, None);
        assert_eq!(report.fields.total, None);
        assert_eq!(report.fields.currency.as_deref(), Some("VND"));
    }
}
