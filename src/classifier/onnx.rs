use std::path::Path;

use tract_onnx::prelude::*;
use tracing::info;

use super::{Classifier, ClassifierError};
use crate::preprocess::{self, FLAT_LEN, ModelInput};

type OnnxPlan = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// Watermark classifier backed by an ONNX graph executed with tract.
///
/// The graph is loaded and optimized once, with its input pinned to
/// `[rows, input_width]` f32.
pub struct OnnxClassifier {
    plan: OnnxPlan,
    input_width: usize,
    rows: usize,
}

impl OnnxClassifier {
    pub fn load(path: &Path, input_width: usize) -> Result<Self, ClassifierError> {
        let load_error = |message: String| ClassifierError::Load {
            path: path.display().to_string(),
            message,
        };

        preprocess::validate_row_width(input_width).map_err(|err| load_error(err.to_string()))?;
        let rows = FLAT_LEN / input_width;

        let plan = tract_onnx::onnx()
            .model_for_path(path)
            .and_then(|model| {
                model.with_input_fact(
                    0,
                    InferenceFact::dt_shape(f32::datum_type(), tvec!(rows, input_width)),
                )
            })
            .and_then(|model| model.into_optimized())
            .and_then(|model| model.into_runnable())
            .map_err(|err| load_error(format!("{err:#}")))?;

        info!(path = %path.display(), rows, input_width, "loaded watermark model");

        Ok(Self {
            plan,
            input_width,
            rows,
        })
    }
}

impl Classifier for OnnxClassifier {
    fn input_width(&self) -> usize {
        self.input_width
    }

    fn predict(&self, input: &ModelInput) -> Result<f32, ClassifierError> {
        if input.row_width() != self.input_width || input.rows() != self.rows {
            return Err(ClassifierError::InputShape {
                expected: self.input_width,
                actual: input.row_width(),
            });
        }

        let tensor = tract_ndarray::Array2::from_shape_vec(
            (self.rows, self.input_width),
            input.values().to_vec(),
        )
        .map_err(|err| ClassifierError::Inference(err.to_string()))?;

        let outputs = self
            .plan
            .run(tvec!(Tensor::from(tensor).into()))
            .map_err(|err| ClassifierError::Inference(format!("{err:#}")))?;

        let output = outputs
            .first()
            .ok_or_else(|| ClassifierError::Inference("model returned no outputs".to_string()))?;
        let view = output
            .to_array_view::<f32>()
            .map_err(|err| ClassifierError::Inference(format!("{err:#}")))?;

        // The first row's score is the image's score.
        view.iter()
            .next()
            .copied()
            .ok_or_else(|| ClassifierError::Inference("model returned an empty output".to_string()))
    }
}
