use std::io::Read;

use crate::config::IngestConfig;
use crate::decode::{DecodeFailure, DecodeInput, LineDecoder};
use crate::error::{FailureDetail, LineRecord, LineRecordError};
use crate::reader::{BoundedLine, SyncBoundedLineReader};

/// Iterator over decoded lines of a tap stream.
///
/// Blank lines are skipped. Every other line yields exactly one [`LineRecord`], successful or
/// not; the caller decides whether a failed record ends the run. Raw text is only kept for
/// failed lines, cut to [`IngestLimits::max_raw_preview_bytes`](crate::IngestLimits).
pub struct LineIngestor<R: Read, D: LineDecoder> {
    reader: SyncBoundedLineReader<R>,
    decoder: D,
    config: IngestConfig,
}

impl<R: Read, D: LineDecoder> LineIngestor<R, D> {
    pub fn new(reader: R, decoder: D, config: IngestConfig) -> Self {
        Self {
            reader: SyncBoundedLineReader::new(reader, config.limits.max_line_bytes),
            decoder,
            config,
        }
    }

    fn failed(
        &self,
        line_number: usize,
        raw: Option<&str>,
        err: LineRecordError,
    ) -> LineRecord<D::Message> {
        LineRecord {
            line_number,
            raw_line: raw.map(|text| preview(text, self.config.limits.max_raw_preview_bytes)),
            outcome: Err(err),
        }
    }

    fn decode_line(&mut self, line_number: usize, text: &str) -> Option<LineRecord<D::Message>> {
        let err = match self.decoder.decode(DecodeInput { line_number, text }) {
            Ok(None) => return None,
            Ok(Some(message)) => {
                return Some(LineRecord {
                    line_number,
                    raw_line: None,
                    outcome: Ok(message),
                })
            }
            Err(err) => err,
        };

        if let Some(sink) = self.config.failure_sink.as_mut() {
            sink.record(FailureDetail {
                line_number,
                class: err.class(),
                details: err.details(),
            });
        }
        let reason = LineRecordError::Decode {
            class: err.class(),
            summary: err.summary(),
        };
        Some(self.failed(line_number, Some(text), reason))
    }
}

impl<R: Read, D: LineDecoder> Iterator for LineIngestor<R, D> {
    type Item = LineRecord<D::Message>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.reader.next()? {
                BoundedLine::IoError { line_number, kind } => {
                    return Some(self.failed(line_number, None, LineRecordError::Io { kind }));
                }
                BoundedLine::LineTooLong {
                    line_number,
                    observed_bytes,
                    max_line_bytes,
                } => {
                    let err = LineRecordError::LineTooLong {
                        observed_bytes,
                        max_line_bytes,
                    };
                    return Some(self.failed(line_number, None, err));
                }
                BoundedLine::Line { line_number, bytes } => {
                    let text = match String::from_utf8(bytes) {
                        Ok(text) => text,
                        Err(err) => {
                            let lossy = String::from_utf8_lossy(err.as_bytes()).into_owned();
                            return Some(self.failed(
                                line_number,
                                Some(&lossy),
                                LineRecordError::InvalidUtf8,
                            ));
                        }
                    };
                    let line = text.strip_suffix('\r').unwrap_or(&text);
                    if line.chars().all(char::is_whitespace) {
                        continue;
                    }
                    if let Some(record) = self.decode_line(line_number, line) {
                        return Some(record);
                    }
                }
            }
        }
    }
}

fn preview(text: &str, max_bytes: usize) -> String {
    if text.len() <= max_bytes {
        return text.to_string();
    }
    let mut end = max_bytes;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}
