use std::io;

use thiserror::Error;

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, LogError>;

/// Errors raised while producing or decoding a telemetry log.
///
/// Construction-time errors (`UnsupportedType`, `LabelCountMismatch`,
/// `EmbeddedNul`, `TooManyStreams`) are always raised before a single byte of
/// the offending stream reaches the sink, so they never corrupt the file.
#[derive(Debug, Error)]
pub enum LogError {
    /// The sink could not be opened, or a write/flush failed.
    ///
    /// A failure in the middle of a frame leaves a truncated trailing frame
    /// behind; no rollback is attempted.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A field type cannot be mapped to a wire data type.
    #[error("Unsupported field type {type_name}: {reason}")]
    UnsupportedType {
        /// Rust type that was rejected
        type_name: &'static str,
        /// Why it has no wire representation
        reason: String,
    },

    /// The number of labels differs from the number of fields.
    #[error("Label count mismatch: stream has {fields} fields, got {labels} labels")]
    LabelCountMismatch {
        /// Field count of the stream
        fields: usize,
        /// Number of labels supplied
        labels: usize,
    },

    /// A stream name or label contains a null byte, which would break
    /// null-terminated string framing.
    #[error("String contains an embedded null byte: {0:?}")]
    EmbeddedNul(String),

    /// Every 32-bit stream id has already been handed out.
    #[error("Stream id space exhausted")]
    TooManyStreams,

    /// Log options failed validation.
    #[error("Invalid log configuration: {0}")]
    InvalidConfig(String),

    /// The decoder met bytes that do not follow the log format.
    #[error("Invalid log file at offset {offset}: {reason}")]
    InvalidLogFile {
        /// Byte offset of the offending frame
        offset: usize,
        /// What was wrong
        reason: String,
    },
}

impl LogError {
    pub(crate) fn unsupported<T: ?Sized>(reason: impl Into<String>) -> Self {
        LogError::UnsupportedType {
            type_name: std::any::type_name::<T>(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_names_the_type() {
        let err = LogError::unsupported::<Vec<f32>>("dynamic dimensions");
        let msg = err.to_string();
        assert!(msg.contains("Vec<f32>"), "message was: {}", msg);
        assert!(msg.contains("dynamic dimensions"));
    }

    #[test]
    fn test_io_conversion() {
        let err: LogError = io::Error::new(io::ErrorKind::Other, "disk full").into();
        assert!(matches!(err, LogError::Io(_)));
    }
}
