use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::Deserialize;
use tap_events::IngestLimits;

use crate::TargetError;

/// Target configuration as read from the optional `--config` JSON file.
///
/// Every field is optional; unknown fields are ignored so configs shared with other targets
/// keep working.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TargetConfig {
    /// Local directory receiving JSONL files (and gzip files before upload).
    pub destination_path: String,
    /// Replaces the stream name in output file names.
    pub custom_name: Option<String>,
    /// Appends `-<run timestamp>` to output file names.
    pub do_timestamp_file: bool,
    /// Writes to object storage instead of local files.
    pub write_to_s3: bool,
    /// With `write_to_s3`, compress locally and upload the finished file.
    pub compress_output: bool,
    pub s3_bucket: String,
    pub s3_prefix: String,
    pub s3_region: Option<String>,
    /// Endpoint override for S3-compatible stores (MinIO, LocalStack, ...).
    pub s3_endpoint: Option<String>,
    pub max_line_bytes: usize,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            destination_path: String::new(),
            custom_name: None,
            do_timestamp_file: true,
            write_to_s3: true,
            compress_output: false,
            s3_bucket: String::new(),
            s3_prefix: String::new(),
            s3_region: None,
            s3_endpoint: None,
            max_line_bytes: IngestLimits::DEFAULT_MAX_LINE_BYTES,
        }
    }
}

/// Where a run's records end up. Resolved once, before any input is read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    Local {
        directory: PathBuf,
    },
    BufferedPut {
        bucket: String,
        prefix: String,
    },
    GzipUpload {
        directory: PathBuf,
        bucket: String,
        prefix: String,
    },
}

impl Destination {
    pub fn bucket(&self) -> Option<&str> {
        match self {
            Destination::Local { .. } => None,
            Destination::BufferedPut { bucket, .. } | Destination::GzipUpload { bucket, .. } => {
                Some(bucket)
            }
        }
    }
}

impl TargetConfig {
    /// Reads the config file when one is given; otherwise every default applies.
    pub fn load(path: Option<&Path>) -> Result<Self, TargetError> {
        match path {
            Some(path) => Self::from_path(path),
            None => Ok(Self::default()),
        }
    }

    pub fn from_path(path: &Path) -> Result<Self, TargetError> {
        let bytes = fs::read(path).map_err(|err| {
            TargetError::Configuration(format!(
                "failed to read config file `{}`: {err}",
                path.display()
            ))
        })?;
        serde_json::from_slice(&bytes).map_err(|err| {
            TargetError::Configuration(format!(
                "failed to parse config file `{}`: {err}",
                path.display()
            ))
        })
    }

    /// The name used in place of the stream name, if any. An empty string counts as unset.
    pub fn custom_name(&self) -> Option<&str> {
        self.custom_name.as_deref().filter(|name| !name.is_empty())
    }

    pub fn ingest_limits(&self) -> IngestLimits {
        IngestLimits {
            max_line_bytes: self.max_line_bytes,
            ..IngestLimits::default()
        }
    }

    pub fn destination(&self) -> Result<Destination, TargetError> {
        if !self.write_to_s3 {
            return Ok(Destination::Local {
                directory: PathBuf::from(&self.destination_path),
            });
        }

        if self.s3_bucket.is_empty() {
            return Err(TargetError::Configuration(
                "`s3_bucket` must be provided because `write_to_s3` is set".to_string(),
            ));
        }
        if self.s3_prefix.is_empty() {
            return Err(TargetError::Configuration(
                "`s3_prefix` must be provided because `write_to_s3` is set".to_string(),
            ));
        }

        let bucket = self.s3_bucket.clone();
        let prefix = self.s3_prefix.clone();
        Ok(if self.compress_output {
            Destination::GzipUpload {
                directory: PathBuf::from(&self.destination_path),
                bucket,
                prefix,
            }
        } else {
            Destination::BufferedPut { bucket, prefix }
        })
    }
}
