use serde::Deserialize;
use serde_json::{Map, Value};

use crate::decode::{DecodeFailure, DecodeInput, LineDecoder};
use crate::error::FailureClass;

/// `SCHEMA` message: declares (or replaces) the shape of one stream.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SchemaMessage {
    pub stream: String,
    pub schema: Value,
    pub key_properties: Vec<String>,
    #[serde(default)]
    pub bookmark_properties: Option<Vec<String>>,
}

/// `RECORD` message: one row of a stream.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RecordMessage {
    pub stream: String,
    pub record: Value,
    #[serde(default)]
    pub version: Option<i64>,
    #[serde(default)]
    pub time_extracted: Option<String>,
}

/// `STATE` message: an opaque checkpoint.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StateMessage {
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TapMessage {
    Schema(SchemaMessage),
    Record(RecordMessage),
    State(StateMessage),
    /// Any message whose `type` is not one of the above; carried through untouched.
    Other {
        message_type: String,
        raw: Map<String, Value>,
    },
}

impl TapMessage {
    pub fn message_type(&self) -> &str {
        match self {
            TapMessage::Schema(_) => "SCHEMA",
            TapMessage::Record(_) => "RECORD",
            TapMessage::State(_) => "STATE",
            TapMessage::Other { message_type, .. } => message_type,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TapMessageError {
    #[error("line is not valid JSON: {source}")]
    Json {
        line: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("message must be a JSON object")]
    NotAnObject { line: String },
    #[error("message is missing a string `type` field")]
    MissingType { line: String },
    #[error("malformed {message_type} message: {source}")]
    Malformed {
        message_type: &'static str,
        line: String,
        #[source]
        source: serde_json::Error,
    },
}

impl TapMessageError {
    pub fn line(&self) -> &str {
        match self {
            TapMessageError::Json { line, .. }
            | TapMessageError::NotAnObject { line }
            | TapMessageError::MissingType { line }
            | TapMessageError::Malformed { line, .. } => line,
        }
    }
}

impl DecodeFailure for TapMessageError {
    fn class(&self) -> FailureClass {
        match self {
            TapMessageError::Json { .. } => FailureClass::InvalidJson,
            TapMessageError::NotAnObject { .. }
            | TapMessageError::MissingType { .. }
            | TapMessageError::Malformed { .. } => FailureClass::InvalidMessage,
        }
    }

    fn details(&self) -> String {
        format!("{self}; input: {}", self.line())
    }
}

/// Decodes one tap protocol message per line.
///
/// - Returns `Ok(None)` for empty / whitespace-only lines.
/// - Unknown `type` values decode to [`TapMessage::Other`]; deciding what to do with them is the
///   consumer's business.
#[derive(Debug, Clone, Default)]
pub struct TapMessageParser;

impl TapMessageParser {
    pub fn new() -> Self {
        Self
    }

    pub fn parse_str(&self, line: &str) -> Result<Option<TapMessage>, TapMessageError> {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.chars().all(|ch| ch.is_whitespace()) {
            return Ok(None);
        }

        let value: Value = serde_json::from_str(line).map_err(|source| TapMessageError::Json {
            line: line.to_string(),
            source,
        })?;
        let Value::Object(object) = value else {
            return Err(TapMessageError::NotAnObject {
                line: line.to_string(),
            });
        };
        let Some(message_type) = object.get("type").and_then(Value::as_str).map(str::to_string)
        else {
            return Err(TapMessageError::MissingType {
                line: line.to_string(),
            });
        };

        let message = match message_type.as_str() {
            "SCHEMA" => TapMessage::Schema(typed(
                line,
                "SCHEMA",
                &["stream", "schema", "key_properties"],
                object,
            )?),
            "RECORD" => TapMessage::Record(typed(line, "RECORD", &["stream", "record"], object)?),
            "STATE" => TapMessage::State(typed(line, "STATE", &["value"], object)?),
            _ => TapMessage::Other {
                message_type,
                raw: object,
            },
        };
        Ok(Some(message))
    }
}

/// `serde` treats an absent `Value` field as `null`; the protocol requires these keys to be
/// present, so they are checked before the typed decode.
fn typed<T: serde::de::DeserializeOwned>(
    line: &str,
    message_type: &'static str,
    required: &[&'static str],
    object: Map<String, Value>,
) -> Result<T, TapMessageError> {
    let malformed = |source| TapMessageError::Malformed {
        message_type,
        line: line.to_string(),
        source,
    };
    if let Some(missing) = required.iter().find(|key| !object.contains_key(**key)) {
        return Err(malformed(<serde_json::Error as serde::de::Error>::missing_field(
            missing,
        )));
    }
    serde_json::from_value(Value::Object(object)).map_err(malformed)
}

impl LineDecoder for TapMessageParser {
    type Message = TapMessage;
    type Error = TapMessageError;

    fn decode(&self, input: DecodeInput<'_>) -> Result<Option<TapMessage>, TapMessageError> {
        self.parse_str(input.text)
    }
}
