//! Schema Validator
//!
//! Each tool schema is rendered to JSON Schema and compiled once, when the
//! tool is registered. Checking a payload runs the compiled validator and
//! reports one violation: the one earliest in field declaration order.
//! Unknown object fields are tolerated, and a `null` object member counts
//! as absent.

use crate::schema::Schema;
use jsonschema::{error::ValidationErrorKind, JSONSchema};
use serde_json::{Map, Value};
use thiserror::Error;

/// Path used for the payload itself in messages
const ROOT: &str = "arguments";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct ValidationError {
    /// Dotted path to the offending value (`vectors[0].values`)
    pub path: String,
    pub message: String,
}

impl ValidationError {
    fn missing(path: String) -> Self {
        let message = format!("{} is required", path);
        Self { path, message }
    }

    fn mismatch(path: String, expected: &str, got: &Value) -> Self {
        let message = format!("{}: expected {}, got {}", path, expected, json_type(got));
        Self { path, message }
    }

    /// Arguments passed validation but could not be decoded for the backend
    pub fn undecodable(message: impl Into<String>) -> Self {
        Self {
            path: ROOT.to_string(),
            message: format!("{}: {}", ROOT, message.into()),
        }
    }
}

/// A tool schema together with its compiled JSON Schema validator
pub struct SchemaValidator {
    schema: Schema,
    compiled: JSONSchema,
}

impl std::fmt::Debug for SchemaValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaValidator")
            .field("schema", &self.schema)
            .finish_non_exhaustive()
    }
}

impl SchemaValidator {
    /// Compile `schema`; fails only if its JSON Schema rendering is rejected
    pub fn compile(schema: &Schema) -> Result<Self, String> {
        let rendered = schema.to_json_schema();
        let compiled = JSONSchema::options()
            .compile(&rendered)
            .map_err(|e| e.to_string())?;
        Ok(Self {
            schema: schema.clone(),
            compiled,
        })
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Validate `payload`, returning it unchanged on success
    pub fn validate<'a>(&self, payload: &'a Value) -> Result<&'a Value, ValidationError> {
        let checked = without_null_members(payload);
        let Err(errors) = self.compiled.validate(&checked) else {
            return Ok(payload);
        };

        let first = errors
            .map(|error| self.describe(&checked, &error))
            .min_by(|(a, _), (b, _)| a.cmp(b));
        match first {
            Some((_, error)) => Err(error),
            None => Ok(payload),
        }
    }

    /// Turn one jsonschema error into a message plus its declaration-order rank
    fn describe(
        &self,
        payload: &Value,
        error: &jsonschema::ValidationError<'_>,
    ) -> (Vec<usize>, ValidationError) {
        let segments = error.instance_path.clone().into_vec();
        let mut at = locate(&self.schema, payload, &segments);

        match &error.kind {
            ValidationErrorKind::Required { property } => {
                let name = property.as_str().unwrap_or_default();
                at.rank.push(field_rank(at.schema, name));
                let path = child(&at.path, name);
                (at.rank, ValidationError::missing(path))
            }
            ValidationErrorKind::Type { .. } => {
                let expected = at.schema.map_or("value", Schema::type_name);
                let err = ValidationError::mismatch(display(&at.path), expected, &error.instance);
                (at.rank, err)
            }
            _ => {
                let path = display(&at.path);
                let message = format!("{}: {}", path, error);
                (at.rank, ValidationError { path, message })
            }
        }
    }
}

/// Where a JSON pointer lands in the payload and in the schema model
struct Location<'s> {
    path: String,
    rank: Vec<usize>,
    schema: Option<&'s Schema>,
}

fn locate<'s>(schema: &'s Schema, payload: &Value, segments: &[String]) -> Location<'s> {
    let mut at = Location {
        path: String::new(),
        rank: Vec::new(),
        schema: Some(schema),
    };
    let mut value = payload;

    for segment in segments {
        match value {
            Value::Array(items) => {
                let Some((index, item)) = segment
                    .parse::<usize>()
                    .ok()
                    .and_then(|i| items.get(i).map(|item| (i, item)))
                else {
                    break;
                };
                at.path = format!("{}[{}]", display(&at.path), index);
                at.rank.push(index);
                at.schema = match at.schema {
                    Some(Schema::Array(element)) => Some(element.as_ref()),
                    _ => None,
                };
                value = item;
            }
            Value::Object(map) => {
                let Some(member) = map.get(segment) else {
                    break;
                };
                at.rank.push(field_rank(at.schema, segment));
                at.path = child(&at.path, segment);
                at.schema = match at.schema {
                    Some(Schema::Object(object)) => object.get(segment).map(|f| &f.schema),
                    _ => None,
                };
                value = member;
            }
            _ => break,
        }
    }
    at
}

fn field_rank(schema: Option<&Schema>, name: &str) -> usize {
    match schema {
        Some(Schema::Object(object)) => object
            .fields
            .iter()
            .position(|f| f.name == name)
            .unwrap_or(usize::MAX),
        _ => usize::MAX,
    }
}

/// Copy of `value` with `null` object members dropped (array elements kept)
fn without_null_members(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k.clone(), without_null_members(v)))
                .collect::<Map<String, Value>>(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(without_null_members).collect()),
        other => other.clone(),
    }
}

fn child(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", parent, name)
    }
}

fn display(path: &str) -> String {
    if path.is_empty() {
        ROOT.to_string()
    } else {
        path.to_string()
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
