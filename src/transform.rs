//! Fitted Yeo-Johnson power transform
//!
//! Parameters are fitted offline and only ever applied here: `lambdas` per
//! feature, then optional standardization with the fitted `mean` and `scale`.

use crate::error::{BloomError, BloomResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Lambdas closer than this to 0 or 2 take the logarithmic branch
const LAMBDA_EPS: f64 = f64::EPSILON;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PowerTransform {
    pub lambdas: Vec<f64>,
    #[serde(default)]
    pub mean: Vec<f64>,
    #[serde(default)]
    pub scale: Vec<f64>,
    #[serde(default = "default_standardize")]
    pub standardize: bool,
}

fn default_standardize() -> bool {
    true
}

impl PowerTransform {
    /// Validated construction
    pub fn new(lambdas: Vec<f64>, mean: Vec<f64>, scale: Vec<f64>, standardize: bool) -> BloomResult<Self> {
        let transform = Self {
            lambdas,
            mean,
            scale,
            standardize,
        };
        transform.validate()?;
        Ok(transform)
    }

    /// Load from a JSON artifact
    pub fn load(path: &Path) -> BloomResult<Self> {
        if !path.exists() {
            return Err(BloomError::ArtifactsNotFound {
                path: path.to_path_buf(),
            });
        }
        let text = std::fs::read_to_string(path).map_err(|e| BloomError::ArtifactLoad {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let transform: PowerTransform = serde_json::from_str(&text).map_err(|e| BloomError::ArtifactLoad {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        transform.validate().map_err(|e| BloomError::ArtifactLoad {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Ok(transform)
    }

    fn validate(&self) -> BloomResult<()> {
        let n = self.lambdas.len();
        if n == 0 {
            return Err(BloomError::Model("power transform has no lambdas".to_string()));
        }
        if self.standardize {
            if self.mean.len() != n || self.scale.len() != n {
                return Err(BloomError::Model(format!(
                    "power transform has {} lambdas but {} means and {} scales",
                    n,
                    self.mean.len(),
                    self.scale.len()
                )));
            }
            if self.scale.iter().any(|s| *s == 0.0 || !s.is_finite()) {
                return Err(BloomError::Model("power transform scale must be finite and non-zero".to_string()));
            }
        }
        Ok(())
    }

    /// Number of features the transform was fitted on
    pub fn dim(&self) -> usize {
        self.lambdas.len()
    }

    fn check_dim(&self, len: usize) -> BloomResult<()> {
        if len != self.dim() {
            return Err(BloomError::Model(format!(
                "power transform expects {} values, got {}",
                self.dim(),
                len
            )));
        }
        Ok(())
    }

    pub fn transform(&self, values: &[f64]) -> BloomResult<Vec<f64>> {
        self.check_dim(values.len())?;
        Ok(values
            .iter()
            .enumerate()
            .map(|(i, &x)| {
                let y = yeo_johnson(x, self.lambdas[i]);
                if self.standardize {
                    (y - self.mean[i]) / self.scale[i]
                } else {
                    y
                }
            })
            .collect())
    }

    pub fn inverse_transform(&self, values: &[f64]) -> BloomResult<Vec<f64>> {
        self.check_dim(values.len())?;
        Ok(values
            .iter()
            .enumerate()
            .map(|(i, &z)| {
                let y = if self.standardize {
                    z * self.scale[i] + self.mean[i]
                } else {
                    z
                };
                yeo_johnson_inverse(y, self.lambdas[i])
            })
            .collect())
    }

    /// Inverse for a single-output transform
    pub fn inverse_scalar(&self, value: f64) -> BloomResult<f64> {
        let out = self.inverse_transform(&[value])?;
        Ok(out[0])
    }
}

/// Forward Yeo-Johnson for one value
pub fn yeo_johnson(x: f64, lambda: f64) -> f64 {
    if x >= 0.0 {
        if lambda.abs() < LAMBDA_EPS {
            x.ln_1p()
        } else {
            ((x + 1.0).powf(lambda) - 1.0) / lambda
        }
    } else if (lambda - 2.0).abs() < LAMBDA_EPS {
        -(-x).ln_1p()
    } else {
        -((-x + 1.0).powf(2.0 - lambda) - 1.0) / (2.0 - lambda)
    }
}

/// Inverse Yeo-Johnson for one value
pub fn yeo_johnson_inverse(y: f64, lambda: f64) -> f64 {
    if y >= 0.0 {
        if lambda.abs() < LAMBDA_EPS {
            y.exp_m1()
        } else {
            (y * lambda + 1.0).powf(1.0 / lambda) - 1.0
        }
    } else if (lambda - 2.0).abs() < LAMBDA_EPS {
        -(-y).exp_m1()
    } else {
        1.0 - (-(2.0 - lambda) * y + 1.0).powf(1.0 / (2.0 - lambda))
    }
}
