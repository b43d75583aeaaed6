use thiserror::Error;

/// Why a line could not become a message.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum FailureClass {
    /// The line is not JSON.
    InvalidJson,
    /// The line is JSON but not a well-formed tap message.
    InvalidMessage,
}

#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum LineRecordError {
    #[error("I/O error while reading input: {kind}")]
    Io { kind: std::io::ErrorKind },
    #[error("input is not valid UTF-8")]
    InvalidUtf8,
    #[error("line is {observed_bytes} bytes, longer than the {max_line_bytes} byte limit")]
    LineTooLong {
        observed_bytes: usize,
        max_line_bytes: usize,
    },
    #[error("{summary}")]
    Decode {
        class: FailureClass,
        summary: String,
    },
}

/// The outcome for one non-blank input line.
#[derive(Debug, Clone)]
pub struct LineRecord<T> {
    /// 1-based line number in the underlying input.
    pub line_number: usize,
    /// Preview of the offending text; only set when `outcome` is an error.
    pub raw_line: Option<String>,
    pub outcome: Result<T, LineRecordError>,
}

/// Everything known about a decode failure, input text included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureDetail {
    pub line_number: usize,
    pub class: FailureClass,
    pub details: String,
}

pub trait FailureDetailSink: Send + 'static {
    fn record(&mut self, detail: FailureDetail);
}
