#![forbid(unsafe_code)]
//! Decoding primitives for tap protocol output (one JSON message per line).
//!
//! This crate only turns bytes into typed messages. It provides:
//! - A bounded-memory, line-oriented ingestion loop over any [`std::io::Read`].
//! - The [`LineDecoder`] seam plus [`TapMessageParser`], the protocol decoder.
//! - Per-line outcomes ([`LineRecord`]) so callers decide whether a bad line is fatal.
//!
//! Numbers keep the exact text they arrived with (`serde_json` is built with
//! `arbitrary_precision`), so decoding a record never rounds it.

mod config;
mod decode;
mod error;
mod ingest;
mod message;
mod reader;

pub use config::{IngestConfig, IngestLimits};
pub use decode::{DecodeFailure, DecodeInput, LineDecoder};
pub use error::{FailureClass, FailureDetail, FailureDetailSink, LineRecord, LineRecordError};
pub use ingest::LineIngestor;
pub use message::{
    RecordMessage, SchemaMessage, StateMessage, TapMessage, TapMessageError, TapMessageParser,
};
pub use reader::{BoundedLine, SyncBoundedLineReader};
