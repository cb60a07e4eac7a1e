//! Typed errors raised across the library boundary.

use thiserror::Error;

/// Failure of a batch aggregation.
#[derive(Debug, Error)]
pub enum AggregateError {
    /// The cleaned table lacks columns the grouping needs.
    #[error("{grouping}: expected columns not found: {}", .missing.join(", "))]
    MissingColumns {
        grouping: String,
        missing: Vec<String>,
    },
}

/// Failure reading or writing the processed snapshot.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("JSON error in {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

impl SnapshotError {
    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        SnapshotError::Io {
            path: path.display().to_string(),
            source,
        }
    }

    pub(crate) fn json(path: &std::path::Path, source: serde_json::Error) -> Self {
        SnapshotError::Json {
            path: path.display().to_string(),
            source,
        }
    }

    /// `true` when the underlying cause is a missing file.
    pub fn is_not_found(&self) -> bool {
        matches!(self, SnapshotError::Io { source, .. } if source.kind() == std::io::ErrorKind::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_columns_message_names_every_column() {
        let err = AggregateError::MissingColumns {
            grouping: "by_region".into(),
            missing: vec!["academie".into(), "salaire".into()],
        };
        assert_eq!(
            err.to_string(),
            "by_region: expected columns not found: academie, salaire"
        );
    }

    #[test]
    fn test_is_not_found() {
        let err = SnapshotError::io(
            std::path::Path::new("x.json"),
            std::io::Error::from(std::io::ErrorKind::NotFound),
        );
        assert!(err.is_not_found());
    }
}
