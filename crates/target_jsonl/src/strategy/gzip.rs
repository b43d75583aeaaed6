use std::{
    fs::File,
    io::Write,
    path::{Path, PathBuf},
    sync::Arc,
};

use flate2::{write::GzEncoder, Compression};
use object_store::{path::Path as ObjectPath, ObjectStore, WriteMultipart};
use serde_json::Value;
use tokio::io::AsyncReadExt;

use super::{local::expand_home, AppendOutcome, FinalizeOutcome};
use crate::diagnostics::{Diagnostic, DiagnosticsSink};
use crate::json_text;
use crate::naming::OutputNaming;
use crate::storage::object_key;
use crate::TargetError;

const EXTENSION: &str = ".json";
const COMPRESSED_EXTENSION: &str = ".gz";
const READ_CHUNK_BYTES: usize = 1024 * 1024;
const MAX_PARTS_IN_FLIGHT: usize = 4;

#[derive(Debug)]
struct OpenArchive {
    file_name: String,
    path: PathBuf,
    encoder: GzEncoder<File>,
}

/// Compresses records into local `.json.gz` files, then uploads each finished file.
///
/// Upload problems never fail the run: they are reported to the diagnostics sink and dropped.
/// Finalization always discards the checkpoint, whether or not the uploads succeeded.
#[derive(Debug)]
pub struct GzipUpload {
    directory: PathBuf,
    store: Arc<dyn ObjectStore>,
    prefix: String,
    naming: OutputNaming,
    archives: Vec<OpenArchive>,
}

impl GzipUpload {
    pub fn new(
        directory: PathBuf,
        store: Arc<dyn ObjectStore>,
        prefix: String,
        naming: OutputNaming,
    ) -> Self {
        Self {
            directory: expand_home(directory),
            store,
            prefix,
            naming,
            archives: Vec::new(),
        }
    }

    pub fn naming(&self) -> &OutputNaming {
        &self.naming
    }

    pub fn path_for(&self, stream: &str) -> PathBuf {
        self.directory.join(self.archive_name(stream))
    }

    fn archive_name(&self, stream: &str) -> String {
        let mut name = self.naming.file_name(stream, EXTENSION);
        name.push_str(COMPRESSED_EXTENSION);
        name
    }

    fn open_archive(&mut self, file_name: String) -> Result<&mut OpenArchive, TargetError> {
        if let Some(idx) = self.archives.iter().position(|a| a.file_name == file_name) {
            return Ok(&mut self.archives[idx]);
        }

        if !self.directory.as_os_str().is_empty() {
            std::fs::create_dir_all(&self.directory)
                .map_err(|source| TargetError::io(&self.directory, source))?;
        }
        let path = self.directory.join(&file_name);
        let file = File::options()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| TargetError::io(&path, source))?;

        self.archives.push(OpenArchive {
            file_name,
            path,
            encoder: GzEncoder::new(file, Compression::default()),
        });
        let last = self.archives.len() - 1;
        Ok(&mut self.archives[last])
    }

    pub(super) fn append(
        &mut self,
        stream: &str,
        record: &Value,
    ) -> Result<AppendOutcome, TargetError> {
        let line = json_text::to_line(record)?;
        let archive = self.open_archive(self.archive_name(stream))?;
        archive
            .encoder
            .write_all(line.as_bytes())
            .map_err(|source| TargetError::io(&archive.path, source))?;
        Ok(AppendOutcome::KeepCheckpoint)
    }

    pub(super) async fn finalize(
        &mut self,
        diagnostics: &mut dyn DiagnosticsSink,
    ) -> FinalizeOutcome {
        for archive in std::mem::take(&mut self.archives) {
            let key = object_key(&self.prefix, &archive.file_name);
            match upload_archive(self.store.as_ref(), &key, archive).await {
                Ok(bytes) => diagnostics.emit(Diagnostic::UploadCompleted {
                    key: key.to_string(),
                    bytes,
                }),
                Err(err) => diagnostics.emit(Diagnostic::UploadFailed {
                    key: key.to_string(),
                    error: err.to_string(),
                }),
            }
        }
        FinalizeOutcome::DiscardCheckpoint
    }
}

async fn upload_archive(
    store: &dyn ObjectStore,
    key: &ObjectPath,
    archive: OpenArchive,
) -> Result<u64, TargetError> {
    let OpenArchive { path, encoder, .. } = archive;
    encoder
        .finish()
        .and_then(|mut file| file.flush())
        .map_err(|source| TargetError::io(&path, source))?;

    let mut local = tokio::fs::File::open(&path)
        .await
        .map_err(|source| TargetError::io(&path, source))?;
    let upload = store
        .put_multipart(key)
        .await
        .map_err(|source| upload_failure(key, source))?;
    let mut writer = WriteMultipart::new(upload);

    match copy_into(&mut local, &mut writer, &path, key).await {
        Ok(total) => {
            writer
                .finish()
                .await
                .map_err(|source| upload_failure(key, source))?;
            Ok(total)
        }
        Err(err) => {
            writer.abort().await.ok();
            Err(err)
        }
    }
}

async fn copy_into(
    local: &mut tokio::fs::File,
    writer: &mut WriteMultipart,
    path: &Path,
    key: &ObjectPath,
) -> Result<u64, TargetError> {
    let mut buf = vec![0u8; READ_CHUNK_BYTES];
    let mut total = 0u64;
    loop {
        let n = local
            .read(&mut buf)
            .await
            .map_err(|source| TargetError::io(path, source))?;
        if n == 0 {
            return Ok(total);
        }
        writer
            .wait_for_capacity(MAX_PARTS_IN_FLIGHT)
            .await
            .map_err(|source| upload_failure(key, source))?;
        writer.write(&buf[..n]);
        total += n as u64;
    }
}

fn upload_failure(key: &ObjectPath, source: object_store::Error) -> TargetError {
    TargetError::UploadFailure {
        key: key.to_string(),
        source,
    }
}
