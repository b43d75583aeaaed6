use std::path::PathBuf;

use tap_events::LineRecordError;
use thiserror::Error;

/// Coarse classification of [`TargetError`], stable across message wording changes.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ErrorKind {
    Decode,
    UnknownStream,
    Validation,
    Configuration,
    UploadFailure,
    SchemaCompile,
    Io,
    Encode,
}

/// Every way a run can end early. None of these are retried.
#[derive(Debug, Error)]
pub enum TargetError {
    #[error("unable to decode input line {line_number}: {reason}")]
    Decode {
        line_number: usize,
        #[source]
        reason: LineRecordError,
    },
    #[error("a record for stream `{stream}` was encountered before a corresponding schema")]
    UnknownStream { stream: String },
    #[error("record for stream `{stream}` failed schema validation at {path}: {message}")]
    Validation {
        stream: String,
        path: String,
        message: String,
        violations: usize,
    },
    #[error("invalid configuration: {0}")]
    Configuration(String),
    #[error("failed to upload `{key}`: {source}")]
    UploadFailure {
        key: String,
        #[source]
        source: object_store::Error,
    },
    #[error("schema for stream `{stream}` could not be compiled: {message}")]
    SchemaCompile { stream: String, message: String },
    #[error("I/O error on `{path}`: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize JSON: {0}")]
    Encode(#[from] serde_json::Error),
}

impl TargetError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TargetError::Decode { .. } => ErrorKind::Decode,
            TargetError::UnknownStream { .. } => ErrorKind::UnknownStream,
            TargetError::Validation { .. } => ErrorKind::Validation,
            TargetError::Configuration(_) => ErrorKind::Configuration,
            TargetError::UploadFailure { .. } => ErrorKind::UploadFailure,
            TargetError::SchemaCompile { .. } => ErrorKind::SchemaCompile,
            TargetError::Io { .. } => ErrorKind::Io,
            TargetError::Encode(_) => ErrorKind::Encode,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        TargetError::Io {
            path: path.into(),
            source,
        }
    }
}
