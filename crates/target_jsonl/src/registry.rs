use std::collections::HashMap;

use serde_json::Value;

use crate::precision;
use crate::validator::Validator;
use crate::TargetError;

/// The latest schema declared for one stream, with its compiled validator.
#[derive(Debug)]
pub struct StreamSchema {
    schema: Value,
    key_properties: Vec<String>,
    validator: Validator,
}

impl StreamSchema {
    /// The schema after precision normalization.
    pub fn schema(&self) -> &Value {
        &self.schema
    }

    pub fn key_properties(&self) -> &[String] {
        &self.key_properties
    }

    pub fn validator(&self) -> &Validator {
        &self.validator
    }
}

/// Per-stream schemas for one run. Registrations add or replace; nothing is ever removed.
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    streams: HashMap<String, StreamSchema>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalizes `schema`, compiles it, and makes it the current schema for `stream`.
    ///
    /// On a compile failure the previous registration (if any) is left in place.
    pub fn register(
        &mut self,
        stream: &str,
        mut schema: Value,
        key_properties: Vec<String>,
    ) -> Result<&StreamSchema, TargetError> {
        precision::normalize(&mut schema);
        let validator =
            Validator::compile(&schema).map_err(|message| TargetError::SchemaCompile {
                stream: stream.to_string(),
                message,
            })?;

        let entry = StreamSchema {
            schema,
            key_properties,
            validator,
        };
        self.streams.insert(stream.to_string(), entry);
        Ok(&self.streams[stream])
    }

    pub fn get(&self, stream: &str) -> Option<&StreamSchema> {
        self.streams.get(stream)
    }

    pub fn validator(&self, stream: &str) -> Result<&Validator, TargetError> {
        self.streams
            .get(stream)
            .map(StreamSchema::validator)
            .ok_or_else(|| TargetError::UnknownStream {
                stream: stream.to_string(),
            })
    }

    pub fn schema(&self, stream: &str) -> Option<&Value> {
        self.get(stream).map(StreamSchema::schema)
    }

    pub fn key_properties(&self, stream: &str) -> Option<&[String]> {
        self.get(stream).map(StreamSchema::key_properties)
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::ErrorKind;

    #[test]
    fn lookup_before_registration_is_unknown_stream() {
        let registry = SchemaRegistry::new();
        let err = registry.validator("orders").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownStream);
        assert!(err.to_string().contains("orders"));
    }

    #[test]
    fn newest_schema_replaces_previous() {
        let mut registry = SchemaRegistry::new();
        registry
            .register(
                "users",
                json!({"type": "object", "properties": {"id": {"type": "integer"}}}),
                vec!["id".to_string()],
            )
            .unwrap();
        assert!(registry
            .validator("users")
            .unwrap()
            .validate(&json!({"id": "abc"}))
            .is_err());

        registry
            .register(
                "users",
                json!({"type": "object", "properties": {"id": {"type": "string"}}}),
                vec!["uuid".to_string()],
            )
            .unwrap();
        assert_eq!(registry.len(), 1);
        let users = registry.get("users").unwrap();
        assert_eq!(users.key_properties(), ["uuid".to_string()]);
        assert_eq!(
            registry.key_properties("users"),
            Some(&["uuid".to_string()][..])
        );
        assert!(users.validator().validate(&json!({"id": "abc"})).is_ok());
    }

    #[test]
    fn schemas_are_stored_normalized() {
        let mut registry = SchemaRegistry::new();
        let stored = registry
            .register(
                "prices",
                json!({"type": "number", "multipleOf": 1e-20}),
                Vec::new(),
            )
            .unwrap();
        assert_eq!(
            stored.schema()["multipleOf"].to_string(),
            "0.00000000000000000001"
        );
        assert!(stored.validator().validate(&json!(12.5)).is_ok());
        assert!(stored
            .validator()
            .validate(&serde_json::from_str("1.000000000000000000001").unwrap())
            .is_err());
    }

    #[test]
    fn compile_failure_keeps_previous_registration() {
        let mut registry = SchemaRegistry::new();
        registry
            .register("users", json!({"type": "object"}), Vec::new())
            .unwrap();
        let err = registry
            .register("users", json!({"type": 7}), Vec::new())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SchemaCompile);
        assert_eq!(registry.schema("users"), Some(&json!({"type": "object"})));
    }
}
