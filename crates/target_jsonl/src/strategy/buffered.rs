use std::sync::Arc;

use bytes::Bytes;
use object_store::{ObjectStore, PutPayload};
use serde_json::Value;

use super::{AppendOutcome, FinalizeOutcome};
use crate::diagnostics::{Diagnostic, DiagnosticsSink};
use crate::json_text;
use crate::naming::OutputNaming;
use crate::storage::object_key;
use crate::TargetError;

const EXTENSION: &str = ".json";

/// Buffers every serialized record and uploads them as one object at the end of the run.
///
/// Only one file name is tracked per run: the name derived from the most recent record. A run
/// that interleaves several streams therefore uploads all of their records under the last
/// stream's name.
#[derive(Debug)]
pub struct BufferedPut {
    store: Arc<dyn ObjectStore>,
    prefix: String,
    naming: OutputNaming,
    lines: Vec<String>,
    file_name: Option<String>,
}

impl BufferedPut {
    pub fn new(store: Arc<dyn ObjectStore>, prefix: String, naming: OutputNaming) -> Self {
        Self {
            store,
            prefix,
            naming,
            lines: Vec::new(),
            file_name: None,
        }
    }

    pub fn naming(&self) -> &OutputNaming {
        &self.naming
    }

    pub fn buffered_records(&self) -> usize {
        self.lines.len()
    }

    pub(super) fn append(
        &mut self,
        stream: &str,
        record: &Value,
    ) -> Result<AppendOutcome, TargetError> {
        self.lines.push(json_text::to_line(record)?);
        self.file_name = Some(self.naming.file_name(stream, EXTENSION));
        Ok(AppendOutcome::KeepCheckpoint)
    }

    pub(super) async fn finalize(
        &mut self,
        diagnostics: &mut dyn DiagnosticsSink,
    ) -> Result<FinalizeOutcome, TargetError> {
        let Some(file_name) = self.file_name.take() else {
            return Ok(FinalizeOutcome::KeepCheckpoint);
        };

        let body = Bytes::from(std::mem::take(&mut self.lines).concat());
        let bytes = body.len() as u64;
        let key = object_key(&self.prefix, &file_name);

        self.store
            .put(&key, PutPayload::from(body))
            .await
            .map_err(|source| {
                diagnostics.emit(Diagnostic::UploadFailed {
                    key: key.to_string(),
                    error: source.to_string(),
                });
                TargetError::UploadFailure {
                    key: key.to_string(),
                    source,
                }
            })?;

        diagnostics.emit(Diagnostic::UploadCompleted {
            key: key.to_string(),
            bytes,
        });
        Ok(FinalizeOutcome::KeepCheckpoint)
    }
}
