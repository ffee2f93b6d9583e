//! Detector and recognizer capabilities
//!
//! The pipeline only depends on the [`TextDetector`] and [`TextRecognizer`]
//! traits. The ONNX Runtime implementations load a model file once and are
//! shared read-only across threads; inference on one session is serialized
//! by a lock.

use anyhow::Context;
use ndarray::{Array2, Array4, ArrayD, Axis, Ix2};
use ort::{
    inputs,
    session::{Session, builder::GraphOptimizationLevel},
    value::TensorRef,
};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::config::ModelsConfig;
use crate::error::{OcrError, Result};

/// Text detection capability
///
/// Takes a normalized `[1, 3, H, W]` tensor and returns the raw output tensor
/// (a probability heatmap or a list of box rows).
pub trait TextDetector: Send + Sync {
    fn detect(&self, input: &Array4<f32>) -> Result<ArrayD<f32>>;
}

/// Text recognition capability
///
/// Takes a normalized `[1, 3, H, W]` word crop and returns a
/// `[timesteps, symbols]` score matrix.
pub trait TextRecognizer: Send + Sync {
    fn recognize(&self, input: &Array4<f32>) -> Result<Array2<f32>>;
}

/// Resolved model file locations
#[derive(Debug, Clone, PartialEq)]
pub struct ModelPaths {
    pub detector: PathBuf,
    pub recognizer: PathBuf,
    pub dictionary: Option<PathBuf>,
}

impl ModelPaths {
    /// Resolve configured paths; relative ones are joined onto the models directory
    ///
    /// The models directory is `models_dir` when set, else `<data dir>/models`.
    pub fn resolve(config: &ModelsConfig) -> anyhow::Result<Self> {
        let models_dir = match &config.models_dir {
            Some(dir) => dir.clone(),
            None => crate::config::get_data_dir()?.join("models"),
        };
        Ok(Self::resolve_in(config, &models_dir))
    }

    /// Resolve against an explicit models directory
    pub fn resolve_in(config: &ModelsConfig, models_dir: &Path) -> Self {
        let join = |p: &Path| {
            if p.is_absolute() {
                p.to_path_buf()
            } else {
                models_dir.join(p)
            }
        };

        Self {
            detector: join(&config.detector_path),
            recognizer: join(&config.recognizer_path),
            dictionary: config.dictionary_path.as_deref().map(join),
        }
    }

    /// Check that both model files exist
    pub fn are_models_ready(&self) -> bool {
        self.detector.is_file() && self.recognizer.is_file()
    }
}

/// Build an optimized session for a model file
fn build_session(model_path: &Path, intra_threads: usize) -> anyhow::Result<Session> {
    info!("Loading ONNX model from {:?}", model_path);

    let session = Session::builder()?
        .with_optimization_level(GraphOptimizationLevel::Level3)?
        .with_intra_threads(intra_threads)?
        .commit_from_file(model_path)
        .context("Failed to load ONNX model")?;

    let input_names: Vec<String> = session.inputs.iter().map(|input| input.name.clone()).collect();
    let output_names: Vec<String> = session.outputs.iter().map(|output| output.name.clone()).collect();

    info!(
        "Model loaded. Inputs: {:?}, Outputs: {:?}",
        input_names, output_names
    );

    Ok(session)
}

/// Run a single-input session and return its first output as an owned array
fn run_session(session: &Mutex<Session>, input: &Array4<f32>) -> Result<ArrayD<f32>> {
    let input_ref = TensorRef::from_array_view(input)
        .map_err(|e| OcrError::Inference(format!("Failed to bind input tensor: {e}")))?;

    let mut session = session.lock();
    let outputs = session
        .run(inputs![input_ref])
        .map_err(|e| OcrError::Inference(e.to_string()))?;

    let output = outputs[0]
        .try_extract_array::<f32>()
        .map_err(|e| OcrError::Inference(format!("Failed to extract output tensor: {e}")))?;

    Ok(output.into_owned())
}

/// ONNX Runtime text detector (DBNet-style or box-regression models)
pub struct OnnxDetector {
    session: Mutex<Session>,
}

impl OnnxDetector {
    pub fn new(model_path: &Path, intra_threads: usize) -> Result<Self> {
        let session = build_session(model_path, intra_threads)
            .map_err(|e| OcrError::ModelLoad(format!("{:#}", e)))?;
        Ok(Self {
            session: Mutex::new(session),
        })
    }
}

impl TextDetector for OnnxDetector {
    fn detect(&self, input: &Array4<f32>) -> Result<ArrayD<f32>> {
        let output = run_session(&self.session, input)?;
        debug!("Detector output shape: {:?}", output.shape());
        Ok(output)
    }
}

/// ONNX Runtime CTC text recognizer
pub struct OnnxRecognizer {
    session: Mutex<Session>,
}

impl OnnxRecognizer {
    pub fn new(model_path: &Path, intra_threads: usize) -> Result<Self> {
        let session = build_session(model_path, intra_threads)
            .map_err(|e| OcrError::ModelLoad(format!("{:#}", e)))?;
        Ok(Self {
            session: Mutex::new(session),
        })
    }
}

impl TextRecognizer for OnnxRecognizer {
    fn recognize(&self, input: &Array4<f32>) -> Result<Array2<f32>> {
        let output = run_session(&self.session, input)?;
        squeeze_scores(output)
    }
}

/// Reduce a `[1, T, C]` (or `[T, C]`) recognizer output to `[T, C]`
pub fn squeeze_scores(output: ArrayD<f32>) -> Result<Array2<f32>> {
    let shape = output.shape().to_vec();
    let scores = match output.ndim() {
        3 if shape[0] == 1 => output.index_axis_move(Axis(0), 0),
        2 => output,
        _ => return Err(OcrError::UnsupportedOutputShape(shape)),
    };

    scores
        .into_dimensionality::<Ix2>()
        .map_err(|e| OcrError::DecodeFailure(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::IxDyn;

    #[test]
    fn test_resolve_relative_and_absolute_paths() {
        let config = ModelsConfig {
            detector_path: PathBuf::from("det.onnx"),
            recognizer_path: PathBuf::from("/opt/models/rec.onnx"),
            dictionary_path: Some(PathBuf::from("dict.txt")),
            models_dir: None,
            intra_threads: 2,
        };

        let paths = ModelPaths::resolve_in(&config, Path::new("/data/models"));

        assert_eq!(paths.detector, PathBuf::from("/data/models/det.onnx"));
        assert_eq!(paths.recognizer, PathBuf::from("/opt/models/rec.onnx"));
        assert_eq!(paths.dictionary, Some(PathBuf::from("/data/models/dict.txt")));
    }

    #[test]
    fn test_resolve_uses_configured_models_dir() {
        let dir = tempfile::tempdir().unwrap();
        let config = ModelsConfig {
            models_dir: Some(dir.path().to_path_buf()),
            ..Default::default()
        };

        let paths = ModelPaths::resolve(&config).unwrap();
        assert_eq!(paths.detector, dir.path().join("det.onnx"));
        assert!(!paths.are_models_ready());

        std::fs::write(&paths.detector, b"").unwrap();
        std::fs::write(&paths.recognizer, b"").unwrap();
        assert!(paths.are_models_ready());
    }

    #[test]
    fn test_squeeze_scores() {
        let batched = ArrayD::<f32>::zeros(IxDyn(&[1, 25, 84]));
        assert_eq!(squeeze_scores(batched).unwrap().dim(), (25, 84));

        let flat = ArrayD::<f32>::zeros(IxDyn(&[25, 84]));
        assert_eq!(squeeze_scores(flat).unwrap().dim(), (25, 84));

        let multi = ArrayD::<f32>::zeros(IxDyn(&[2, 25, 84]));
        assert!(matches!(
            squeeze_scores(multi),
            Err(OcrError::UnsupportedOutputShape(_))
        ));
    }

    #[test]
    fn test_missing_model_file() {
        let result = OnnxDetector::new(Path::new("/nonexistent/det.onnx"), 1);
        assert!(matches!(result, Err(OcrError::ModelLoad(_))));
    }

    #[test]
    #[ignore = "requires det.onnx and rec.onnx in the models directory"]
    fn test_onnx_models_load() {
        let paths = ModelPaths::resolve(&ModelsConfig::default()).unwrap();
        let detector = OnnxDetector::new(&paths.detector, 1).unwrap();
        let recognizer = OnnxRecognizer::new(&paths.recognizer, 1).unwrap();

        let output = detector.detect(&Array4::zeros((1, 3, 64, 64))).unwrap();
        assert!(output.ndim() >= 2);

        let scores = recognizer.recognize(&Array4::zeros((1, 3, 48, 320))).unwrap();
        assert!(scores.dim().1 > 1);
    }
}
