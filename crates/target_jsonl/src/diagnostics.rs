//! Explicit reporting channel for the pipeline.
//!
//! The pipeline never logs on its own; it hands [`Diagnostic`]s to the sink it was built with.
//! [`TracingDiagnostics`] forwards them to `tracing`, tests collect them with
//! [`CollectingDiagnostics`].

use std::sync::{Arc, Mutex};

use serde_json::Value;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, PartialEq)]
pub enum Diagnostic {
    RunStarted {
        strategy: &'static str,
        timestamp: Option<String>,
    },
    SchemaRegistered {
        stream: String,
        key_properties: Vec<String>,
    },
    StateSet {
        value: Value,
    },
    UnknownMessageType {
        line_number: usize,
        message_type: String,
    },
    DecodeFailed {
        line_number: usize,
        raw_line: Option<String>,
        reason: String,
    },
    ValidationFailed {
        stream: String,
        path: String,
        message: String,
    },
    UploadCompleted {
        key: String,
        bytes: u64,
    },
    UploadFailed {
        key: String,
        error: String,
    },
    Finalized {
        checkpoint_present: bool,
    },
}

pub trait DiagnosticsSink: Send + 'static {
    fn emit(&mut self, diagnostic: Diagnostic);
}

/// Production sink: one `tracing` event per diagnostic.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingDiagnostics;

impl DiagnosticsSink for TracingDiagnostics {
    fn emit(&mut self, diagnostic: Diagnostic) {
        match diagnostic {
            Diagnostic::RunStarted {
                strategy,
                timestamp,
            } => info!(strategy, timestamp = ?timestamp, "starting target run"),
            Diagnostic::SchemaRegistered {
                stream,
                key_properties,
            } => debug!(stream = %stream, ?key_properties, "registered schema"),
            Diagnostic::StateSet { value } => debug!(state = %value, "setting state"),
            Diagnostic::UnknownMessageType {
                line_number,
                message_type,
            } => warn!(
                line_number,
                message_type = %message_type,
                "unknown message type, ignoring"
            ),
            Diagnostic::DecodeFailed {
                line_number,
                raw_line,
                reason,
            } => error!(
                line_number,
                input = raw_line.as_deref().unwrap_or("<not captured>"),
                reason = %reason,
                "unable to parse input line"
            ),
            Diagnostic::ValidationFailed {
                stream,
                path,
                message,
            } => error!(
                stream = %stream,
                path = %path,
                message = %message,
                "record failed JSON schema validation"
            ),
            Diagnostic::UploadCompleted { key, bytes } => {
                info!(key = %key, bytes, "uploaded object")
            }
            Diagnostic::UploadFailed { key, error } => {
                error!(key = %key, error = %error, "upload failed")
            }
            Diagnostic::Finalized { checkpoint_present } => {
                debug!(checkpoint_present, "write strategy finalized")
            }
        }
    }
}

/// Keeps every diagnostic in memory; clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct CollectingDiagnostics {
    seen: Arc<Mutex<Vec<Diagnostic>>>,
}

impl CollectingDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Vec<Diagnostic> {
        self.seen
            .lock()
            .map(|seen| seen.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }
}

impl DiagnosticsSink for CollectingDiagnostics {
    fn emit(&mut self, diagnostic: Diagnostic) {
        let mut seen = self
            .seen
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        seen.push(diagnostic);
    }
}
