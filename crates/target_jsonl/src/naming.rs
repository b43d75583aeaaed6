use time::{macros::format_description, OffsetDateTime};

/// Run-start timestamp shared by every file written during one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunTimestamp(String);

impl RunTimestamp {
    /// Local wall-clock time; falls back to UTC when the local offset cannot be determined.
    pub fn now() -> Self {
        let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
        Self::from_datetime(now)
    }

    pub fn from_datetime(datetime: OffsetDateTime) -> Self {
        let text = datetime
            .format(format_description!(
                "[year][month][day]T[hour][minute][second]"
            ))
            .unwrap_or_else(|_| "19700101T000000".to_string());
        Self(text)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Resolves output file names: `(custom name or stream) + ["-" + timestamp] + extension`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputNaming {
    custom_name: Option<String>,
    timestamp: Option<RunTimestamp>,
}

impl OutputNaming {
    pub fn new(custom_name: Option<&str>, timestamp: Option<RunTimestamp>) -> Self {
        Self {
            custom_name: custom_name
                .filter(|name| !name.is_empty())
                .map(str::to_string),
            timestamp,
        }
    }

    pub fn timestamp(&self) -> Option<&RunTimestamp> {
        self.timestamp.as_ref()
    }

    /// `extension` includes its leading dot, e.g. `.jsonl`.
    pub fn file_name(&self, stream: &str, extension: &str) -> String {
        let base = self.custom_name.as_deref().unwrap_or(stream);
        match &self.timestamp {
            Some(ts) => format!("{base}-{}{extension}", ts.as_str()),
            None => format!("{base}{extension}"),
        }
    }
}
