// Typed errors surfaced to callers of the orchestrator and the feedback
// coordinator. Transport detail stays in the logs; callers see only the
// classification.

use thiserror::Error;

use crate::signals::traits::SignalError;

/// Which upstream analyzer a failure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dependency {
    ImageAnalysis,
    TextAnalysis,
}

impl Dependency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Dependency::ImageAnalysis => "image analysis",
            Dependency::TextAnalysis => "text analysis",
        }
    }
}

impl std::fmt::Display for Dependency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How an upstream call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Timeout,
    Unavailable,
    /// The service answered with a 4xx.
    Rejected,
    MalformedResponse,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Timeout => "timeout",
            FailureKind::Unavailable => "unavailable",
            FailureKind::Rejected => "rejected",
            FailureKind::MalformedResponse => "malformed response",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<&SignalError> for FailureKind {
    fn from(e: &SignalError) -> Self {
        match e {
            SignalError::Timeout(_) => FailureKind::Timeout,
            SignalError::Transport(_) => FailureKind::Unavailable,
            SignalError::Status { status, .. } if (400..500).contains(status) => {
                FailureKind::Rejected
            }
            SignalError::Status { .. } => FailureKind::Unavailable,
            SignalError::Malformed(_) => FailureKind::MalformedResponse,
        }
    }
}

#[derive(Debug, Error)]
pub enum ModerationError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("{dependency} failed: {kind}")]
    Dependency {
        dependency: Dependency,
        kind: FailureKind,
    },
}

impl ModerationError {
    pub fn dependency(dependency: Dependency, err: &SignalError) -> Self {
        ModerationError::Dependency {
            dependency,
            kind: err.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum FeedbackError {
    #[error("invalid feedback: {0}")]
    InvalidInput(String),

    #[error("a retraining run is already in progress")]
    RetrainingInFlight,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_signal_errors_map_to_failure_kinds() {
        let cases = [
            (SignalError::Timeout(Duration::from_secs(1)), FailureKind::Timeout),
            (SignalError::Transport("refused".into()), FailureKind::Unavailable),
            (
                SignalError::Status {
                    status: 422,
                    body: String::new(),
                },
                FailureKind::Rejected,
            ),
            (
                SignalError::Status {
                    status: 503,
                    body: String::new(),
                },
                FailureKind::Unavailable,
            ),
            (SignalError::Malformed("x".into()), FailureKind::MalformedResponse),
        ];
        for (err, kind) in cases {
            assert_eq!(FailureKind::from(&err), kind, "{err}");
        }
    }

    #[test]
    fn test_dependency_error_message_hides_transport_detail() {
        let err = ModerationError::dependency(
            Dependency::ImageAnalysis,
            &SignalError::Transport("connection refused at 10.0.0.7".into()),
        );
        assert_eq!(err.to_string(), "image analysis failed: unavailable");
    }
}
