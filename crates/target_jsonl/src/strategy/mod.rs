//! How validated records become persisted bytes.
//!
//! Exactly one strategy is active per run, chosen from the resolved [`Destination`]:
//!
//! | destination   | append                         | finalize                          |
//! |---------------|--------------------------------|-----------------------------------|
//! | `Local`       | open, append line, close       | nothing                           |
//! | `BufferedPut` | buffer line in memory          | one `put` of the whole buffer     |
//! | `GzipUpload`  | append line to a local `.gz`   | multipart upload of each `.gz`    |

mod buffered;
mod gzip;
mod local;

use std::sync::Arc;

use object_store::ObjectStore;
use serde_json::Value;

pub use buffered::BufferedPut;
pub use gzip::GzipUpload;
pub use local::LocalAppend;

use crate::config::Destination;
use crate::diagnostics::DiagnosticsSink;
use crate::naming::OutputNaming;
use crate::TargetError;

/// What a successful append means for the current checkpoint.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum AppendOutcome {
    /// The record is durably placed after the checkpoint; the checkpoint no longer covers it.
    ClearCheckpoint,
    KeepCheckpoint,
}

/// What finalization means for the checkpoint the run ends with.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum FinalizeOutcome {
    KeepCheckpoint,
    DiscardCheckpoint,
}

#[derive(Debug)]
pub enum WriteStrategy {
    LocalAppend(LocalAppend),
    BufferedPut(BufferedPut),
    GzipUpload(GzipUpload),
}

impl WriteStrategy {
    /// Builds the strategy for `destination`.
    ///
    /// Object-storage destinations need `store`; its absence is a configuration error.
    pub fn begin(
        destination: &Destination,
        naming: OutputNaming,
        store: Option<Arc<dyn ObjectStore>>,
    ) -> Result<Self, TargetError> {
        let require_store = |store: Option<Arc<dyn ObjectStore>>, bucket: &str| {
            store.ok_or_else(|| {
                TargetError::Configuration(format!(
                    "no object store client available for bucket `{bucket}`"
                ))
            })
        };

        Ok(match destination {
            Destination::Local { directory } => {
                WriteStrategy::LocalAppend(LocalAppend::new(directory.clone(), naming))
            }
            Destination::BufferedPut { bucket, prefix } => WriteStrategy::BufferedPut(
                BufferedPut::new(require_store(store, bucket)?, prefix.clone(), naming),
            ),
            Destination::GzipUpload {
                directory,
                bucket,
                prefix,
            } => WriteStrategy::GzipUpload(GzipUpload::new(
                directory.clone(),
                require_store(store, bucket)?,
                prefix.clone(),
                naming,
            )),
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            WriteStrategy::LocalAppend(_) => "local-append",
            WriteStrategy::BufferedPut(_) => "s3-buffered-put",
            WriteStrategy::GzipUpload(_) => "local-gzip-then-upload",
        }
    }

    pub fn naming(&self) -> &OutputNaming {
        match self {
            WriteStrategy::LocalAppend(s) => s.naming(),
            WriteStrategy::BufferedPut(s) => s.naming(),
            WriteStrategy::GzipUpload(s) => s.naming(),
        }
    }

    pub async fn append(
        &mut self,
        stream: &str,
        record: &Value,
    ) -> Result<AppendOutcome, TargetError> {
        match self {
            WriteStrategy::LocalAppend(s) => s.append(stream, record).await,
            WriteStrategy::BufferedPut(s) => s.append(stream, record),
            WriteStrategy::GzipUpload(s) => s.append(stream, record),
        }
    }

    pub async fn finalize(
        &mut self,
        diagnostics: &mut dyn DiagnosticsSink,
    ) -> Result<FinalizeOutcome, TargetError> {
        match self {
            WriteStrategy::LocalAppend(_) => Ok(FinalizeOutcome::KeepCheckpoint),
            WriteStrategy::BufferedPut(s) => s.finalize(diagnostics).await,
            WriteStrategy::GzipUpload(s) => Ok(s.finalize(diagnostics).await),
        }
    }
}
