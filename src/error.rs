//! Template stream error types.

use thiserror::Error;

/// Errors surfaced on a [`TemplateStream`](crate::TemplateStream) or while
/// building one.
///
/// Failures of interpolated sources are carried as [`anyhow::Error`], which is
/// what sub-streams and futures report. Only the first failure of a stream is
/// ever surfaced.
#[derive(Debug, Error)]
pub enum TemplateError {
    /// An interpolated sub-stream reported a failure.
    #[error("sub-stream failed: {0}")]
    SubStream(#[source] anyhow::Error),

    /// An interpolated future resolved to an error.
    #[error("interpolated future failed: {0}")]
    Rejected(#[source] anyhow::Error),

    /// The consumer aborted the stream with a reason.
    #[error("destroyed: {0}")]
    Destroyed(String),

    /// A queue entry has no byte representation.
    #[error("unsupported interpolation: {0}")]
    UnsupportedEntry(String),

    /// Text could not be converted with the configured encoding.
    #[error("cannot encode text as {encoding}: {message}")]
    Encoding { encoding: String, message: String },

    /// Encoding name not recognised.
    #[error("unknown encoding: {0}")]
    UnknownEncoding(String),

    /// Literal segments and interpolation slots do not alternate.
    #[error("template arity mismatch: {literals} literals for {interpolations} interpolations")]
    ArityMismatch {
        literals: usize,
        interpolations: usize,
    },
}

impl TemplateError {
    /// True when the error came from an interpolated source rather than from
    /// the template or the consumer.
    pub fn is_source_failure(&self) -> bool {
        matches!(self, TemplateError::SubStream(_) | TemplateError::Rejected(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = TemplateError::SubStream(anyhow::anyhow!("destroyed"));
        assert_eq!(err.to_string(), "sub-stream failed: destroyed");

        let err = TemplateError::ArityMismatch {
            literals: 3,
            interpolations: 4,
        };
        assert!(err.to_string().contains('3'));
        assert!(err.to_string().contains('4'));
    }

    #[test]
    fn source_failures() {
        assert!(TemplateError::Rejected(anyhow::anyhow!("nope")).is_source_failure());
        assert!(TemplateError::SubStream(anyhow::anyhow!("nope")).is_source_failure());
        assert!(!TemplateError::UnsupportedEntry("42".into()).is_source_failure());
        assert!(!TemplateError::Destroyed("user".into()).is_source_failure());
    }
}
