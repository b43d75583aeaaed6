use std::io::{ErrorKind, Read};

const CHUNK_SIZE_BYTES: usize = 8192;

#[derive(Debug, Eq, PartialEq)]
pub enum BoundedLine {
    Line {
        line_number: usize,
        bytes: Vec<u8>,
    },
    LineTooLong {
        line_number: usize,
        observed_bytes: usize,
        max_line_bytes: usize,
    },
    IoError {
        line_number: usize,
        kind: ErrorKind,
    },
}

/// Splits a byte stream on `\n` without ever holding more than `max_line_bytes` of one line.
///
/// An over-long line is drained and reported as [`BoundedLine::LineTooLong`]; iteration then
/// resumes at the next line. A read error ends iteration after being reported once.
pub struct SyncBoundedLineReader<R: Read> {
    reader: R,
    max_line_bytes: usize,
    buffer: Box<[u8; CHUNK_SIZE_BYTES]>,
    buffer_pos: usize,
    buffer_len: usize,
    current_line: Vec<u8>,
    observed_bytes: usize,
    discarding: bool,
    line_number: usize,
    done: bool,
}

impl<R: Read> SyncBoundedLineReader<R> {
    pub fn new(reader: R, max_line_bytes: usize) -> Self {
        Self {
            reader,
            max_line_bytes,
            buffer: Box::new([0u8; CHUNK_SIZE_BYTES]),
            buffer_pos: 0,
            buffer_len: 0,
            current_line: Vec::new(),
            observed_bytes: 0,
            discarding: false,
            line_number: 0,
            done: false,
        }
    }

    fn fill_buffer(&mut self) -> Result<usize, ErrorKind> {
        self.buffer_pos = 0;
        loop {
            match self.reader.read(&mut self.buffer[..]) {
                Ok(n) => {
                    self.buffer_len = n;
                    return Ok(n);
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => {
                    self.buffer_len = 0;
                    return Err(err.kind());
                }
            }
        }
    }

    fn finish_line(&mut self) -> BoundedLine {
        self.line_number += 1;
        let line_number = self.line_number;

        if self.discarding {
            let observed_bytes = self.observed_bytes;
            self.reset_line_state();
            return BoundedLine::LineTooLong {
                line_number,
                observed_bytes,
                max_line_bytes: self.max_line_bytes,
            };
        }

        let bytes = std::mem::take(&mut self.current_line);
        self.reset_line_state();
        BoundedLine::Line { line_number, bytes }
    }

    fn reset_line_state(&mut self) {
        self.current_line.clear();
        self.observed_bytes = 0;
        self.discarding = false;
    }

    fn observe_bytes(&mut self, additional: usize) {
        self.observed_bytes = self.observed_bytes.saturating_add(additional);
        if self.observed_bytes > self.max_line_bytes && !self.discarding {
            self.discarding = true;
            self.current_line = Vec::new();
        }
    }
}

impl<R: Read> Iterator for SyncBoundedLineReader<R> {
    type Item = BoundedLine;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        loop {
            if self.buffer_pos >= self.buffer_len {
                match self.fill_buffer() {
                    Ok(0) => {
                        self.done = true;
                        if self.discarding || !self.current_line.is_empty() {
                            return Some(self.finish_line());
                        }
                        return None;
                    }
                    Ok(_) => {}
                    Err(kind) => {
                        self.line_number += 1;
                        self.done = true;
                        return Some(BoundedLine::IoError {
                            line_number: self.line_number,
                            kind,
                        });
                    }
                }
            }

            let pending = &self.buffer[self.buffer_pos..self.buffer_len];
            let newline_idx = pending.iter().position(|b| *b == b'\n');
            let take = newline_idx.unwrap_or(pending.len());

            self.observe_bytes(take);
            if !self.discarding {
                let segment = &self.buffer[self.buffer_pos..self.buffer_pos + take];
                self.current_line.extend_from_slice(segment);
            }

            match newline_idx {
                Some(idx) => {
                    self.buffer_pos += idx + 1;
                    return Some(self.finish_line());
                }
                None => self.buffer_pos = self.buffer_len,
            }
        }
    }
}
