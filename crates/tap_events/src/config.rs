use crate::error::FailureDetailSink;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct IngestLimits {
    pub max_line_bytes: usize,
    /// Longest prefix of a failed line kept in [`LineRecord::raw_line`](crate::LineRecord).
    pub max_raw_preview_bytes: usize,
}

impl IngestLimits {
    /// Tap records routinely carry large documents; lines up to this size are accepted.
    pub const DEFAULT_MAX_LINE_BYTES: usize = 64 * 1024 * 1024;
    pub const DEFAULT_MAX_RAW_PREVIEW_BYTES: usize = 4 * 1024;
}

impl Default for IngestLimits {
    fn default() -> Self {
        Self {
            max_line_bytes: Self::DEFAULT_MAX_LINE_BYTES,
            max_raw_preview_bytes: Self::DEFAULT_MAX_RAW_PREVIEW_BYTES,
        }
    }
}

#[derive(Default)]
pub struct IngestConfig {
    pub limits: IngestLimits,
    /// Receives full failure details, which may quote input the error message leaves out.
    pub failure_sink: Option<Box<dyn FailureDetailSink>>,
}

impl std::fmt::Debug for IngestConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IngestConfig")
            .field("limits", &self.limits)
            .field("failure_sink", &self.failure_sink.is_some())
            .finish()
    }
}
