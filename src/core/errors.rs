//! Error types for the diagnostic engine.
//!
//! Every fallible operation in the crate returns [`Result`]. Variants map
//! directly onto the error taxonomy of the diagnostic pipeline: input
//! validation, upstream service unavailability, timeouts, and ingest-time
//! schema problems each get their own shape so callers can decide whether to
//! retry, degrade, or surface the error to the caller unchanged.

use std::fmt;

use thiserror::Error;

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, DiagnosisError>;

/// Errors produced by the diagnostic retrieval and ranking engine.
#[derive(Error, Debug)]
pub enum DiagnosisError {
    /// The caller supplied a malformed patient case (empty symptoms, age out
    /// of range, bad enum value). Never retried; reported back as-is.
    #[error("invalid input: {message}")]
    InvalidInput {
        /// Human-readable description of what was wrong.
        message: String,
        /// Field that failed validation, if localised to one.
        field: Option<String>,
    },

    /// The text encoder failed to produce a vector.
    #[error("encoder unavailable: {message}")]
    EncoderUnavailable {
        /// Description of the failure.
        message: String,
    },

    /// The vector index is unreachable after exhausting retries.
    #[error("vector index unavailable: {message}")]
    IndexUnavailable {
        /// Description of the failure.
        message: String,
    },

    /// The embedding cache backend is unreachable. Callers should treat this
    /// as a miss; it is never propagated out of [`crate::cache::EmbeddingCache`].
    #[error("cache unavailable: {message}")]
    CacheUnavailable {
        /// Description of the failure.
        message: String,
    },

    /// The request deadline expired before a usable result could be
    /// assembled.
    #[error("deadline exceeded: {message}")]
    Timeout {
        /// Description of what was still outstanding.
        message: String,
    },

    /// The vector index collection exists with an incompatible dimension or
    /// distance metric. Ingest-time only; never raised at query time.
    #[error("schema mismatch: {message}")]
    SchemaMismatch {
        /// Description of the mismatch.
        message: String,
    },

    /// A usable differential was assembled despite one or more upstream
    /// failures (encoder or index). Distinct from [`DiagnosisError::ServiceUnavailable`],
    /// which carries no usable result at all.
    #[error("service degraded: {message}")]
    ServiceDegraded {
        /// Description of what degraded.
        message: String,
    },

    /// No usable differential could be assembled.
    #[error("service unavailable: {message}")]
    ServiceUnavailable {
        /// Description of the failure.
        message: String,
    },

    /// Catch-all for invariant violations that should never happen in
    /// correct code.
    #[error("internal error: {message}")]
    Internal {
        /// Description of the failure.
        message: String,
    },
}

impl DiagnosisError {
    /// Construct an [`DiagnosisError::InvalidInput`] without field context.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
            field: None,
        }
    }

    /// Construct an [`DiagnosisError::InvalidInput`] localised to one field.
    pub fn invalid_field(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Construct an [`DiagnosisError::EncoderUnavailable`].
    pub fn encoder_unavailable(message: impl Into<String>) -> Self {
        Self::EncoderUnavailable {
            message: message.into(),
        }
    }

    /// Construct an [`DiagnosisError::IndexUnavailable`].
    pub fn index_unavailable(message: impl Into<String>) -> Self {
        Self::IndexUnavailable {
            message: message.into(),
        }
    }

    /// Construct an [`DiagnosisError::CacheUnavailable`].
    pub fn cache_unavailable(message: impl Into<String>) -> Self {
        Self::CacheUnavailable {
            message: message.into(),
        }
    }

    /// Construct an [`DiagnosisError::Timeout`].
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Timeout {
            message: message.into(),
        }
    }

    /// Construct an [`DiagnosisError::SchemaMismatch`].
    pub fn schema_mismatch(message: impl Into<String>) -> Self {
        Self::SchemaMismatch {
            message: message.into(),
        }
    }

    /// Construct an [`DiagnosisError::Internal`].
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Whether this error represents a transient condition worth retrying
    /// with backoff (per the propagation policy: I/O errors on the index and
    /// cache retry locally before surfacing).
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::IndexUnavailable { .. } | Self::CacheUnavailable { .. }
        )
    }
}

/// Extension trait for attaching static context to a [`Result`].
pub trait ResultExt<T> {
    /// Wrap an error with additional static context, preserving the
    /// original message.
    fn context(self, msg: &'static str) -> Result<T>;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: fmt::Display,
{
    fn context(self, msg: &'static str) -> Result<T> {
        self.map_err(|e| DiagnosisError::internal(format!("{msg}: {e}")))
    }
}
