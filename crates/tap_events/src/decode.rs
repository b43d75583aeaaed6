use std::error::Error;

use crate::error::FailureClass;

/// One non-blank input line, with `\r` already stripped.
#[derive(Debug, Clone, Copy)]
pub struct DecodeInput<'a> {
    pub line_number: usize,
    pub text: &'a str,
}

/// Turns one line of input into at most one message.
pub trait LineDecoder {
    type Message;
    type Error: DecodeFailure;

    fn decode(&self, input: DecodeInput<'_>) -> Result<Option<Self::Message>, Self::Error>;
}

/// A decode error that can be reported with or without the offending input.
pub trait DecodeFailure: Error {
    fn class(&self) -> FailureClass;

    /// Description that does not echo the input line.
    fn summary(&self) -> String {
        self.to_string()
    }

    fn details(&self) -> String;
}
