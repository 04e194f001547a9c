//! Error types for vecindad operations.
//!
//! The taxonomy separates fatal conditions (bad configuration, metric
//! failures, degenerate data) from the one recoverable condition
//! (a classifier failing inside a cross-validation fold).

use std::fmt;

/// Main error type for vecindad operations.
///
/// Fatal variants (`MetricComputation`, `Configuration`, `DegenerateData`,
/// `Io`, `Serialization`) propagate and terminate the run for a dataset.
/// `ClassifierFailure` is recovered by the cross-validation engine: the
/// failing (classifier, fold) combination is recorded as missing and the
/// run continues.
///
/// # Examples
///
/// ```
/// use vecindad::error::VecindadError;
///
/// let err = VecindadError::Configuration {
///     message: "k must be smaller than the number of points".to_string(),
/// };
/// assert!(err.to_string().contains("Invalid configuration"));
/// ```
#[derive(Debug)]
pub enum VecindadError {
    /// The distance metric failed for a specific pair of points.
    MetricComputation {
        /// First point index
        index_a: usize,
        /// Second point index
        index_b: usize,
        /// Failure description
        message: String,
    },

    /// Invalid parameters: bad `k`, bad fold counts, mismatched lengths.
    Configuration {
        /// Constraint violation description
        message: String,
    },

    /// Stratified fold generation could not satisfy class-coverage
    /// constraints within the retry bound.
    DegenerateData {
        /// Which constraint could not be met
        message: String,
    },

    /// A classifier failed during training or classification.
    ClassifierFailure {
        /// Name of the failing classifier
        classifier: String,
        /// Underlying failure description
        message: String,
    },

    /// I/O error (file not found, permission denied, etc.).
    Io(std::io::Error),

    /// Serialization/deserialization error.
    Serialization(String),

    /// Generic error with string message.
    Other(String),
}

impl fmt::Display for VecindadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VecindadError::MetricComputation {
                index_a,
                index_b,
                message,
            } => {
                write!(
                    f,
                    "Metric computation failed for pair ({index_a}, {index_b}): {message}"
                )
            }
            VecindadError::Configuration { message } => {
                write!(f, "Invalid configuration: {message}")
            }
            VecindadError::DegenerateData { message } => {
                write!(f, "Degenerate data: {message}")
            }
            VecindadError::ClassifierFailure {
                classifier,
                message,
            } => {
                write!(f, "Classifier '{classifier}' failed: {message}")
            }
            VecindadError::Io(e) => write!(f, "I/O error: {e}"),
            VecindadError::Serialization(msg) => write!(f, "Serialization error: {msg}"),
            VecindadError::Other(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for VecindadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            VecindadError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for VecindadError {
    fn from(err: std::io::Error) -> Self {
        VecindadError::Io(err)
    }
}

impl From<&str> for VecindadError {
    fn from(msg: &str) -> Self {
        VecindadError::Other(msg.to_string())
    }
}

impl From<String> for VecindadError {
    fn from(msg: String) -> Self {
        VecindadError::Other(msg)
    }
}

impl From<serde_json::Error> for VecindadError {
    fn from(err: serde_json::Error) -> Self {
        VecindadError::Serialization(err.to_string())
    }
}

impl VecindadError {
    /// Create a configuration error with a formatted message.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a length-mismatch configuration error.
    #[must_use]
    pub fn length_mismatch(context: &str, expected: usize, actual: usize) -> Self {
        Self::Configuration {
            message: format!("{context}: expected length {expected}, got {actual}"),
        }
    }

    /// Wrap a classifier's failure, recording which classifier failed.
    #[must_use]
    pub fn classifier_failure(classifier: &str, err: &VecindadError) -> Self {
        Self::ClassifierFailure {
            classifier: classifier.to_string(),
            message: err.to_string(),
        }
    }
}

/// Convenience type alias for Results.
pub type Result<T> = std::result::Result<T, VecindadError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_computation_display() {
        let err = VecindadError::MetricComputation {
            index_a: 3,
            index_b: 17,
            message: "non-finite distance".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("(3, 17)"));
        assert!(msg.contains("non-finite distance"));
    }

    #[test]
    fn test_configuration_display() {
        let err = VecindadError::configuration("k = 10 but n = 5");
        assert!(err.to_string().contains("Invalid configuration"));
        assert!(err.to_string().contains("k = 10 but n = 5"));
    }

    #[test]
    fn test_degenerate_data_display() {
        let err = VecindadError::DegenerateData {
            message: "class 2 has a single member".to_string(),
        };
        assert!(err.to_string().contains("Degenerate data"));
        assert!(err.to_string().contains("class 2"));
    }

    #[test]
    fn test_classifier_failure_display() {
        let inner = VecindadError::Other("singular vote matrix".to_string());
        let err = VecindadError::classifier_failure("hw-knn", &inner);
        let msg = err.to_string();
        assert!(msg.contains("hw-knn"));
        assert!(msg.contains("singular vote matrix"));
    }

    #[test]
    fn test_length_mismatch_helper() {
        let err = VecindadError::length_mismatch("labels", 100, 96);
        let msg = err.to_string();
        assert!(msg.contains("labels"));
        assert!(msg.contains("100"));
        assert!(msg.contains("96"));
    }

    #[test]
    fn test_from_str() {
        let err: VecindadError = "test error".into();
        assert!(matches!(err, VecindadError::Other(_)));
        assert_eq!(err.to_string(), "test error");
    }

    #[test]
    fn test_from_string() {
        let err: VecindadError = "test error".to_string().into();
        assert!(matches!(err, VecindadError::Other(_)));
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "fold file missing");
        let err: VecindadError = io_err.into();
        assert!(matches!(err, VecindadError::Io(_)));
        assert!(err.to_string().contains("fold file missing"));
    }

    #[test]
    fn test_error_source_io() {
        use std::error::Error;
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err = VecindadError::Io(io_err);
        assert!(err.source().is_some());
    }

    #[test]
    fn test_error_source_other() {
        use std::error::Error;
        let err = VecindadError::Other("test".to_string());
        assert!(err.source().is_none());
    }
}
