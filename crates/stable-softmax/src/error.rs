use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, SoftmaxError>;

#[derive(Debug, Error)]
pub enum SoftmaxError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Resource exhausted: requested {requested} bytes, {available} available")]
    ResourceExhausted { requested: usize, available: usize },

    #[error("No kernel registered for {op} (opset {opset}, dtype {dtype})")]
    NotRegistered {
        op: String,
        opset: u32,
        dtype: String,
    },

    #[error("Execution stream closed: {0}")]
    StreamClosed(String),

    #[error("Failed to read file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl SoftmaxError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }
}

/// Source errors are rebuilt from their kind and message; the variant and
/// display text are preserved.
impl Clone for SoftmaxError {
    fn clone(&self) -> Self {
        match self {
            Self::InvalidArgument(msg) => Self::InvalidArgument(msg.clone()),
            Self::ResourceExhausted {
                requested,
                available,
            } => Self::ResourceExhausted {
                requested: *requested,
                available: *available,
            },
            Self::NotRegistered { op, opset, dtype } => Self::NotRegistered {
                op: op.clone(),
                opset: *opset,
                dtype: dtype.clone(),
            },
            Self::StreamClosed(msg) => Self::StreamClosed(msg.clone()),
            Self::Io(e) => Self::Io(std::io::Error::new(e.kind(), e.to_string())),
            Self::Yaml(e) => Self::Yaml(serde::de::Error::custom(e.to_string())),
            Self::Json(e) => Self::Json(serde::de::Error::custom(e.to_string())),
        }
    }
}

/// A single finding produced while validating an operator configuration.
#[derive(Debug, Clone)]
pub struct Violation {
    pub severity: Severity,
    pub rule: String,
    pub message: String,
    pub location: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let prefix = match self.severity {
            Severity::Error => "ERROR",
            Severity::Warning => "WARN",
            Severity::Info => "INFO",
        };
        write!(f, "[{prefix}] {}: {}", self.rule, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn violation_prefix_follows_severity() {
        let cases = [
            (Severity::Error, "CONFIG-002", "dropout ratio 1 not in [0, 1)", "[ERROR] CONFIG-002"),
            (Severity::Warning, "CONFIG-004", "dropout block ignored by softmax", "[WARN] CONFIG-004"),
            (Severity::Info, "CONFIG-006", "no seed; using the process-wide generator", "[INFO] CONFIG-006"),
        ];
        for (severity, rule, message, prefix) in cases {
            let v = Violation {
                severity,
                rule: rule.to_string(),
                message: message.to_string(),
                location: Some("dropout".to_string()),
            };
            let s = v.to_string();
            assert!(s.starts_with(prefix), "{s}");
            assert!(s.ends_with(message));
        }
    }

    #[test]
    fn invalid_argument_message() {
        let err = SoftmaxError::invalid("axis 3 out of range for rank 2");
        let s = err.to_string();
        assert!(s.starts_with("Invalid argument"));
        assert!(s.contains("axis 3"));
    }

    #[test]
    fn resource_exhausted_message() {
        let err = SoftmaxError::ResourceExhausted {
            requested: 4096,
            available: 128,
        };
        let s = err.to_string();
        assert!(s.contains("4096"));
        assert!(s.contains("128"));
    }

    #[test]
    fn not_registered_message() {
        let err = SoftmaxError::NotRegistered {
            op: "Softmax".to_string(),
            opset: 0,
            dtype: "f32".to_string(),
        };
        let s = err.to_string();
        assert!(s.contains("Softmax"));
        assert!(s.contains("opset 0"));
    }

    #[test]
    fn clone_preserves_variant() {
        let err = SoftmaxError::ResourceExhausted {
            requested: 10,
            available: 2,
        };
        assert!(matches!(
            err.clone(),
            SoftmaxError::ResourceExhausted {
                requested: 10,
                available: 2
            }
        ));
        let io: SoftmaxError =
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied").into();
        match io.clone() {
            SoftmaxError::Io(e) => assert_eq!(e.kind(), std::io::ErrorKind::PermissionDenied),
            other => panic!("unexpected {other}"),
        }
        assert_eq!(io.clone().to_string(), io.to_string());
    }

    #[test]
    fn io_error_converts() {
        let err: SoftmaxError =
            std::io::Error::new(std::io::ErrorKind::NotFound, "not found").into();
        assert!(err.to_string().contains("Failed to read"));
    }
}
