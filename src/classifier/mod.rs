mod onnx;

pub use onnx::OnnxClassifier;

use thiserror::Error;

use crate::preprocess::{self, ModelInput, PreprocessError};

/// Probabilities strictly above this value are reported as watermarked.
pub const WATERMARK_THRESHOLD: f32 = 0.5;

#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("failed to load model from {path}: {message}")]
    Load { path: String, message: String },
    #[error("model expects rows of {expected} values, got {actual}")]
    InputShape { expected: usize, actual: usize },
    #[error("inference failed: {0}")]
    Inference(String),
    #[error("model produced a non-finite probability")]
    NonFinite,
}

/// A binary image classifier returning the probability that an image carries
/// a watermark.
pub trait Classifier: Send + Sync {
    fn input_width(&self) -> usize;

    fn predict(&self, input: &ModelInput) -> Result<f32, ClassifierError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Watermarked,
    NotWatermarked,
}

impl Verdict {
    pub fn from_probability(probability: f32) -> Self {
        if probability > WATERMARK_THRESHOLD {
            Verdict::Watermarked
        } else {
            Verdict::NotWatermarked
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Verdict::Watermarked => "Watermarked",
            Verdict::NotWatermarked => "Not Watermarked",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Classification {
    pub probability: f32,
    pub verdict: Verdict,
}

#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error(transparent)]
    Preprocess(#[from] PreprocessError),
    #[error(transparent)]
    Model(#[from] ClassifierError),
}

/// Runs the full preprocess-then-predict pipeline on raw image bytes.
///
/// CPU bound; call from a blocking context.
pub fn classify_image(
    classifier: &dyn Classifier,
    bytes: &[u8],
) -> Result<Classification, ClassifyError> {
    let input = preprocess::preprocess(bytes, classifier.input_width())?;
    let probability = classifier.predict(&input)?;
    if !probability.is_finite() {
        return Err(ClassifierError::NonFinite.into());
    }

    Ok(Classification {
        probability,
        verdict: Verdict::from_probability(probability),
    })
}
