use std::path::{Path, PathBuf};

use serde_json::Value;
use tokio::{fs, fs::OpenOptions, io::AsyncWriteExt};

use super::AppendOutcome;
use crate::json_text;
use crate::naming::OutputNaming;
use crate::TargetError;

const EXTENSION: &str = ".jsonl";

/// Appends each record to `<directory>/<file>.jsonl`, opening and closing the file per record.
#[derive(Debug)]
pub struct LocalAppend {
    directory: PathBuf,
    naming: OutputNaming,
}

impl LocalAppend {
    pub fn new(directory: PathBuf, naming: OutputNaming) -> Self {
        Self {
            directory: expand_home(directory),
            naming,
        }
    }

    pub fn naming(&self) -> &OutputNaming {
        &self.naming
    }

    pub fn path_for(&self, stream: &str) -> PathBuf {
        self.directory
            .join(self.naming.file_name(stream, EXTENSION))
    }

    pub(super) async fn append(
        &mut self,
        stream: &str,
        record: &Value,
    ) -> Result<AppendOutcome, TargetError> {
        let line = json_text::to_line(record)?;

        if !self.directory.as_os_str().is_empty() {
            fs::create_dir_all(&self.directory)
                .await
                .map_err(|source| TargetError::io(&self.directory, source))?;
        }

        let path = self.path_for(stream);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|source| TargetError::io(&path, source))?;
        file.write_all(line.as_bytes())
            .await
            .map_err(|source| TargetError::io(&path, source))?;
        file.flush()
            .await
            .map_err(|source| TargetError::io(&path, source))?;

        Ok(AppendOutcome::ClearCheckpoint)
    }
}

/// Expands a leading `~` to `$HOME`; any other path is returned unchanged.
pub(crate) fn expand_home(path: PathBuf) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path;
    };
    match std::env::var_os("HOME") {
        Some(home) => Path::new(&home).join(rest),
        None => path,
    }
}
