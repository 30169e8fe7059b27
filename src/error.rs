//! Error taxonomy for the bloom prediction core
//!
//! Missing satellite observations are NOT errors: they are carried as `None`
//! all the way into the feature vector. The variants below are the only
//! failure paths a caller has to handle.

use chrono::NaiveDate;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Crate-wide result alias
pub type BloomResult<T> = std::result::Result<T, BloomError>;

/// How a caller should react to a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The request itself is malformed (ordering, schema, parcel)
    FixInput,
    /// Transient: a collaborator or a deploy race, retry later
    TryAgainLater,
    /// Deployment/configuration defect, needs an operator
    Defect,
}

#[derive(Debug, Error)]
pub enum BloomError {
    #[error("timestamp {current} is not after previously processed timestamp {previous}")]
    InputOrdering {
        previous: NaiveDate,
        current: NaiveDate,
    },

    #[error("feature record is missing required columns: {}", missing.join(", "))]
    SchemaMismatch { missing: Vec<String> },

    #[error("feature record has null values for columns: {}", columns.join(", "))]
    MissingValues { columns: Vec<String> },

    #[error("invalid parcel: {0}")]
    InvalidParcel(String),

    #[error("invalid date range: {0}")]
    InvalidRange(String),

    #[error("insufficient history: {0}")]
    InsufficientHistory(String),

    #[error("model artifact not found at {}; train and deploy the model artifacts first", path.display())]
    ArtifactsNotFound { path: PathBuf },

    #[error("failed to load model artifact {}: {reason}", path.display())]
    ArtifactLoad { path: PathBuf, reason: String },

    #[error("artifact loading exceeded {0:?}")]
    ArtifactLoadTimeout(Duration),

    #[error("geospatial source error: {0}")]
    Source(String),

    #[error("narrative service error: {0}")]
    ExternalService(String),

    #[error("model error: {0}")]
    Model(String),
}

impl BloomError {
    pub fn kind(&self) -> FailureKind {
        match self {
            BloomError::InputOrdering { .. }
            | BloomError::SchemaMismatch { .. }
            | BloomError::MissingValues { .. }
            | BloomError::InvalidParcel(_)
            | BloomError::InvalidRange(_)
            | BloomError::InsufficientHistory(_) => FailureKind::FixInput,
            BloomError::ArtifactLoadTimeout(_)
            | BloomError::Source(_)
            | BloomError::ExternalService(_) => FailureKind::TryAgainLater,
            BloomError::ArtifactsNotFound { .. }
            | BloomError::ArtifactLoad { .. }
            | BloomError::Model(_) => FailureKind::Defect,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_mismatch_lists_all_columns() {
        let err = BloomError::SchemaMismatch {
            missing: vec!["ET_estimate".to_string(), "water_balance_90d".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("ET_estimate"));
        assert!(msg.contains("water_balance_90d"));
        assert_eq!(err.kind(), FailureKind::FixInput);
    }

    #[test]
    fn test_artifacts_not_found_names_path() {
        let err = BloomError::ArtifactsNotFound {
            path: PathBuf::from("artifacts/pt_x.json"),
        };
        assert!(err.to_string().contains("artifacts/pt_x.json"));
        assert_eq!(err.kind(), FailureKind::Defect);
    }

    #[test]
    fn test_transient_failures() {
        assert_eq!(
            BloomError::Source("timeout".into()).kind(),
            FailureKind::TryAgainLater
        );
        assert_eq!(
            BloomError::ArtifactLoadTimeout(Duration::from_secs(5)).kind(),
            FailureKind::TryAgainLater
        );
    }
}
