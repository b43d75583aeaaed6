#![forbid(unsafe_code)]
//! Record sink for tap output.
//!
//! Reads SCHEMA / RECORD / STATE messages (one JSON object per line), validates every record
//! against the latest schema of its stream, and persists it with one of three write strategies:
//!
//! - local JSONL files, appended record by record;
//! - one buffered object per run on S3;
//! - local gzip files uploaded to S3 once the input ends.
//!
//! The last checkpoint that is still valid after the run is returned so the caller can emit it
//! for the next run to resume from.
//!
//! ```no_run
//! use target_jsonl::{persist_messages, TargetConfig, TracingDiagnostics};
//!
//! # async fn demo() -> Result<(), target_jsonl::TargetError> {
//! let config = TargetConfig {
//!     write_to_s3: false,
//!     destination_path: "out".to_string(),
//!     ..TargetConfig::default()
//! };
//! let stdin = std::io::stdin().lock();
//! let state = persist_messages(&config, stdin, None, Box::new(TracingDiagnostics)).await?;
//! # let _ = state;
//! # Ok(())
//! # }
//! ```

mod config;
mod diagnostics;
mod error;
pub mod json_text;
mod naming;
mod pipeline;
mod precision;
mod registry;
mod storage;
mod strategy;
mod validator;

use std::{io::Read, sync::Arc};

use object_store::ObjectStore;
use serde_json::Value;
use tap_events::{FailureDetail, FailureDetailSink, IngestConfig, LineIngestor, TapMessageParser};

pub use config::{Destination, TargetConfig};
pub use diagnostics::{CollectingDiagnostics, Diagnostic, DiagnosticsSink, TracingDiagnostics};
pub use error::{ErrorKind, TargetError};
pub use naming::{OutputNaming, RunTimestamp};
pub use pipeline::{Pipeline, PipelinePhase};
pub use precision::{normalize as normalize_precision, MAX_SCALE};
pub use registry::{SchemaRegistry, StreamSchema};
pub use storage::{object_key, s3_store};
pub use strategy::{
    AppendOutcome, BufferedPut, FinalizeOutcome, GzipUpload, LocalAppend, WriteStrategy,
};
pub use validator::{Validator, Violation, Violations};

/// Runs one complete target pass over `input`.
///
/// The destination is resolved before any input is read, so configuration problems surface
/// without consuming the stream. `object_store` overrides the S3 client built from `config`.
pub async fn persist_messages<R: Read>(
    config: &TargetConfig,
    input: R,
    object_store: Option<Arc<dyn ObjectStore>>,
    diagnostics: Box<dyn DiagnosticsSink>,
) -> Result<Option<Value>, TargetError> {
    let destination = config.destination()?;
    let store = match (object_store, destination.bucket()) {
        (Some(store), _) => Some(store),
        (None, Some(_)) => Some(s3_store(config)?),
        (None, None) => None,
    };

    let timestamp = config.do_timestamp_file.then(RunTimestamp::now);
    let naming = OutputNaming::new(config.custom_name(), timestamp);
    let strategy = WriteStrategy::begin(&destination, naming, store)?;

    let ingest = IngestConfig {
        limits: config.ingest_limits(),
        failure_sink: Some(Box::new(TracingFailureDetails)),
    };
    let lines = LineIngestor::new(input, TapMessageParser::new(), ingest);

    Pipeline::new(strategy, diagnostics).run(lines).await
}

/// Full decoder error text goes to debug logs only; the run error carries the summary.
struct TracingFailureDetails;

impl FailureDetailSink for TracingFailureDetails {
    fn record(&mut self, detail: FailureDetail) {
        tracing::debug!(
            line_number = detail.line_number,
            class = ?detail.class,
            details = %detail.details,
            "decoder failure details"
        );
    }
}
