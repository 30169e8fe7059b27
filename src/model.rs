//! Dense feed-forward regression network
//!
//! The exported network is a stack of fully-connected layers with `relu` or
//! `linear` activations. Weights are stored `[out][in]`.

use crate::error::{BloomError, BloomResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    Relu,
    Linear,
}

impl Activation {
    #[inline]
    fn apply(self, x: f64) -> f64 {
        match self {
            Activation::Relu => x.max(0.0),
            Activation::Linear => x,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenseLayer {
    pub weights: Vec<Vec<f64>>,
    pub bias: Vec<f64>,
    pub activation: Activation,
}

impl DenseLayer {
    pub fn input_dim(&self) -> usize {
        self.weights.first().map(|row| row.len()).unwrap_or(0)
    }

    pub fn output_dim(&self) -> usize {
        self.weights.len()
    }

    fn forward(&self, input: &[f64]) -> Vec<f64> {
        self.weights
            .iter()
            .zip(&self.bias)
            .map(|(row, b)| {
                let z: f64 = row.iter().zip(input).map(|(w, x)| w * x).sum::<f64>() + b;
                self.activation.apply(z)
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionModel {
    pub input_dim: usize,
    pub layers: Vec<DenseLayer>,
}

impl RegressionModel {
    /// Validated construction
    pub fn new(input_dim: usize, layers: Vec<DenseLayer>) -> BloomResult<Self> {
        let model = Self { input_dim, layers };
        model.validate()?;
        Ok(model)
    }

    pub fn load(path: &Path) -> BloomResult<Self> {
        if !path.exists() {
            return Err(BloomError::ArtifactsNotFound {
                path: path.to_path_buf(),
            });
        }
        let artifact_error = |reason: String| BloomError::ArtifactLoad {
            path: path.to_path_buf(),
            reason,
        };
        let text = std::fs::read_to_string(path).map_err(|e| artifact_error(e.to_string()))?;
        let model: RegressionModel = serde_json::from_str(&text).map_err(|e| artifact_error(e.to_string()))?;
        model.validate().map_err(|e| artifact_error(e.to_string()))?;
        Ok(model)
    }

    /// Layer shapes must chain from `input_dim` to a single output
    fn validate(&self) -> BloomResult<()> {
        if self.layers.is_empty() {
            return Err(BloomError::Model("model has no layers".to_string()));
        }

        let mut expected = self.input_dim;
        for (i, layer) in self.layers.iter().enumerate() {
            if layer.output_dim() == 0 || layer.bias.len() != layer.output_dim() {
                return Err(BloomError::Model(format!(
                    "layer {} has {} weight rows and {} biases",
                    i,
                    layer.output_dim(),
                    layer.bias.len()
                )));
            }
            if layer.weights.iter().any(|row| row.len() != expected) {
                return Err(BloomError::Model(format!(
                    "layer {} expects input width {}",
                    i, expected
                )));
            }
            expected = layer.output_dim();
        }

        if expected != 1 {
            return Err(BloomError::Model(format!(
                "model output width is {}, expected 1",
                expected
            )));
        }
        Ok(())
    }

    /// Single forward pass
    pub fn predict(&self, input: &[f64]) -> BloomResult<f64> {
        if input.len() != self.input_dim {
            return Err(BloomError::Model(format!(
                "model expects {} inputs, got {}",
                self.input_dim,
                input.len()
            )));
        }

        let mut activations = input.to_vec();
        for layer in &self.layers {
            activations = layer.forward(&activations);
        }
        activations
            .first()
            .copied()
            .ok_or_else(|| BloomError::Model("model produced no output".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn tiny_model() -> RegressionModel {
        RegressionModel::new(
            2,
            vec![
                DenseLayer {
                    weights: vec![vec![1.0, -1.0], vec![0.5, 0.5]],
                    bias: vec![0.0, 1.0],
                    activation: Activation::Relu,
                },
                DenseLayer {
                    weights: vec![vec![2.0, 1.0]],
                    bias: vec![-0.5],
                    activation: Activation::Linear,
                },
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_forward_pass() {
        let model = tiny_model();
        // hidden = relu([1 - 3, 0.5 + 1.5 + 1]) = [0, 3]; out = 3 - 0.5
        assert_relative_eq!(model.predict(&[1.0, 3.0]).unwrap(), 2.5);
        // hidden = relu([2, 3]) = [2, 3]; out = 4 + 3 - 0.5
        assert_relative_eq!(model.predict(&[3.0, 1.0]).unwrap(), 6.5);
    }

    #[test]
    fn test_input_width_checked() {
        assert!(matches!(tiny_model().predict(&[1.0]), Err(BloomError::Model(_))));
    }

    #[test]
    fn test_shape_validation() {
        let bad_chain = RegressionModel::new(
            3,
            vec![DenseLayer {
                weights: vec![vec![1.0, 1.0]],
                bias: vec![0.0],
                activation: Activation::Linear,
            }],
        );
        assert!(bad_chain.is_err());

        let two_outputs = RegressionModel::new(
            1,
            vec![DenseLayer {
                weights: vec![vec![1.0], vec![1.0]],
                bias: vec![0.0, 0.0],
                activation: Activation::Linear,
            }],
        );
        assert!(two_outputs.is_err());
    }

    #[test]
    fn test_json_layout() {
        let json = r#"{
            "input_dim": 1,
            "layers": [{"weights": [[2.0]], "bias": [1.0], "activation": "linear"}]
        }"#;
        let model: RegressionModel = serde_json::from_str(json).unwrap();
        assert_relative_eq!(model.predict(&[4.0]).unwrap(), 9.0);
    }

    #[test]
    fn test_corrupt_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(RegressionModel::load(&path), Err(BloomError::ArtifactLoad { .. })));
    }
}
