use jsonschema::paths::{JSONPointer, JsonPointerNode};
use jsonschema::{Draft, ErrorIterator, JSONSchema, Keyword, ValidationError};
use rust_decimal::Decimal;
use serde_json::{Map, Value};

use crate::precision::{self, MAX_SCALE};

/// One reason an instance does not satisfy its schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// JSON pointer into the instance; `/` for the instance root.
    pub path: String,
    pub message: String,
}

/// All violations of one validation call, sorted by path then message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violations(Vec<Violation>);

impl Violations {
    pub fn first(&self) -> &Violation {
        &self.0[0]
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Violation> {
        self.0.iter()
    }
}

/// A compiled, reusable Draft 4 validator for one stream schema.
///
/// `multipleOf` is checked in exact decimal arithmetic rather than `f64`.
#[derive(Debug)]
pub struct Validator {
    compiled: JSONSchema,
}

impl Validator {
    pub fn compile(schema: &Value) -> Result<Self, String> {
        if let Some(path) = out_of_range_numbers(schema).first() {
            return Err(format!("number at {path} is outside the double-precision range"));
        }
        let compiled = JSONSchema::options()
            .with_draft(Draft::Draft4)
            .with_keyword("multipleOf", decimal_multiple_of)
            .compile(schema)
            .map_err(|e| e.to_string())?;
        Ok(Self { compiled })
    }

    pub fn validate(&self, instance: &Value) -> Result<(), Violations> {
        // the numeric keywords read every number as f64 and cannot evaluate these
        let mut out_of_range = out_of_range_numbers(instance);
        if !out_of_range.is_empty() {
            out_of_range.sort();
            let violations = out_of_range
                .into_iter()
                .map(|path| Violation {
                    path,
                    message: "number is outside the double-precision range".to_string(),
                })
                .collect();
            return Err(Violations(violations));
        }

        let Err(errors) = self.compiled.validate(instance) else {
            return Ok(());
        };

        let mut violations = errors
            .map(|e| {
                let ptr = e.instance_path.to_string();
                Violation {
                    path: if ptr.is_empty() { "/".to_string() } else { ptr },
                    message: e.to_string(),
                }
            })
            .collect::<Vec<_>>();
        if violations.is_empty() {
            return Ok(());
        }
        violations.sort_by(|a, b| a.path.cmp(&b.path).then_with(|| a.message.cmp(&b.message)));
        Err(Violations(violations))
    }
}

/// Pointers (`/` for the root) to numbers that have no finite `f64` value, in document order.
fn out_of_range_numbers(value: &Value) -> Vec<String> {
    fn walk(value: &Value, pointer: &mut String, found: &mut Vec<String>) {
        match value {
            Value::Number(number) if number.as_f64().is_none() => {
                found.push(if pointer.is_empty() {
                    "/".to_string()
                } else {
                    pointer.clone()
                });
            }
            Value::Array(items) => {
                for (index, item) in items.iter().enumerate() {
                    let len = pointer.len();
                    pointer.push_str(&format!("/{index}"));
                    walk(item, pointer, found);
                    pointer.truncate(len);
                }
            }
            Value::Object(fields) => {
                for (key, item) in fields {
                    let len = pointer.len();
                    pointer.push('/');
                    pointer.push_str(&key.replace('~', "~0").replace('/', "~1"));
                    walk(item, pointer, found);
                    pointer.truncate(len);
                }
            }
            _ => {}
        }
    }

    let mut found = Vec::new();
    walk(value, &mut String::new(), &mut found);
    found
}

fn decimal_multiple_of<'a>(
    _parent: &'a Map<String, Value>,
    value: &'a Value,
    schema_path: JSONPointer,
) -> Result<Box<dyn Keyword>, ValidationError<'a>> {
    let step = match value {
        Value::Number(number) => precision::decimal(number),
        _ => None,
    };
    match step {
        Some(step) if step.is_sign_positive() && !step.is_zero() => {
            Ok(Box::new(DecimalMultipleOf { step, schema_path }))
        }
        _ => Err(ValidationError::custom(
            schema_path,
            JSONPointer::default(),
            value,
            format!(
                "multipleOf {value} must be a positive decimal with at most {MAX_SCALE} \
                 decimal places"
            ),
        )),
    }
}

struct DecimalMultipleOf {
    step: Decimal,
    schema_path: JSONPointer,
}

impl Keyword for DecimalMultipleOf {
    fn validate<'i>(
        &self,
        instance: &'i Value,
        instance_path: &JsonPointerNode,
    ) -> ErrorIterator<'i> {
        if self.is_valid(instance) {
            return Box::new(std::iter::empty());
        }
        let error = ValidationError::custom(
            self.schema_path.clone(),
            instance_path.into(),
            instance,
            format!("{instance} is not a multiple of {}", self.step),
        );
        Box::new(std::iter::once(error))
    }

    fn is_valid(&self, instance: &Value) -> bool {
        match instance {
            Value::Number(number) => precision::is_multiple_of(number, self.step),
            _ => true,
        }
    }
}
