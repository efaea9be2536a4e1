//! Tool-schema translation: externally-described tools to internal [`Tool`]s.
//!
//! The argument decoder is derived from the source's JSON-Schema-like
//! `inputSchema` with a deliberately small mapping: objects become records
//! with per-key scalar/list decoders, everything unrecognized degrades to an
//! opaque value rather than a rejection.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde_json::Value;

use super::{Tool, ToolError};
use crate::tool_source::{ToolSource, ToolSpec};

/// Decoder for one argument value.
#[derive(Clone, Debug, PartialEq)]
pub enum ValueKind {
    String,
    Enum(Vec<String>),
    Number,
    Boolean,
    Null,
    /// Homogeneous list with a typed item decoder.
    List(Box<ValueKind>),
    /// List without an `items` schema: opaque elements.
    OpaqueList,
    /// Free-form JSON object.
    Map,
    /// Unknown type: accept anything.
    Opaque,
}

impl ValueKind {
    fn from_schema(schema: &Value) -> ValueKind {
        match schema.get("type").and_then(Value::as_str) {
            Some("string") => {
                let variants: Vec<String> = schema
                    .get("enum")
                    .and_then(Value::as_array)
                    .map(|a| {
                        a.iter()
                            .filter_map(Value::as_str)
                            .map(String::from)
                            .collect()
                    })
                    .unwrap_or_default();
                if variants.is_empty() {
                    ValueKind::String
                } else {
                    ValueKind::Enum(variants)
                }
            }
            Some("number") | Some("integer") => ValueKind::Number,
            Some("boolean") => ValueKind::Boolean,
            Some("null") => ValueKind::Null,
            Some("array") => match schema.get("items") {
                Some(items) => ValueKind::List(Box::new(ValueKind::from_schema(items))),
                None => ValueKind::OpaqueList,
            },
            Some("object") => ValueKind::Map,
            _ => ValueKind::Opaque,
        }
    }

    fn check(&self, value: &Value) -> Result<(), String> {
        match self {
            ValueKind::String => value
                .is_string()
                .then_some(())
                .ok_or_else(|| "expected a string".into()),
            ValueKind::Enum(variants) => match value.as_str() {
                Some(s) if variants.iter().any(|v| v == s) => Ok(()),
                Some(s) => Err(format!("{:?} not one of {:?}", s, variants)),
                None => Err("expected an enum string".into()),
            },
            ValueKind::Number => value
                .is_number()
                .then_some(())
                .ok_or_else(|| "expected a number".into()),
            ValueKind::Boolean => value
                .is_boolean()
                .then_some(())
                .ok_or_else(|| "expected a boolean".into()),
            ValueKind::Null => value
                .is_null()
                .then_some(())
                .ok_or_else(|| "expected null".into()),
            ValueKind::List(item) => match value.as_array() {
                Some(items) => items
                    .iter()
                    .enumerate()
                    .try_for_each(|(i, v)| item.check(v).map_err(|e| format!("[{i}]: {e}"))),
                None => Err("expected an array".into()),
            },
            ValueKind::OpaqueList => value
                .is_array()
                .then_some(())
                .ok_or_else(|| "expected an array".into()),
            ValueKind::Map => value
                .is_object()
                .then_some(())
                .ok_or_else(|| "expected an object".into()),
            ValueKind::Opaque => Ok(()),
        }
    }
}

/// Validating decoder for a tool's argument object.
#[derive(Clone, Debug)]
pub enum ArgSchema {
    /// Record with typed keys; a key is required iff listed in `required`.
    Object {
        properties: BTreeMap<String, ValueKind>,
        required: BTreeSet<String>,
    },
    /// No `properties` in the schema: any JSON object passes.
    FreeForm,
}

impl ArgSchema {
    pub fn from_schema(schema: &Value) -> ArgSchema {
        let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
            return ArgSchema::FreeForm;
        };
        let required: BTreeSet<String> = schema
            .get("required")
            .and_then(Value::as_array)
            .map(|a| {
                a.iter()
                    .filter_map(Value::as_str)
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();
        ArgSchema::Object {
            properties: properties
                .iter()
                .map(|(k, v)| (k.clone(), ValueKind::from_schema(v)))
                .collect(),
            required,
        }
    }

    /// The required key set, for introspection. Empty for free-form schemas.
    pub fn required_keys(&self) -> Vec<&str> {
        match self {
            ArgSchema::Object { required, .. } => required.iter().map(String::as_str).collect(),
            ArgSchema::FreeForm => Vec::new(),
        }
    }

    pub fn validate(&self, args: &Value) -> Result<(), ToolError> {
        let object = args
            .as_object()
            .ok_or_else(|| ToolError::InvalidArgs("arguments must be an object".into()))?;
        let ArgSchema::Object {
            properties,
            required,
        } = self
        else {
            return Ok(());
        };
        for key in required {
            if !object.contains_key(key) {
                return Err(ToolError::InvalidArgs(format!(
                    "missing required argument {:?}",
                    key
                )));
            }
        }
        for (key, value) in object {
            if let Some(kind) = properties.get(key) {
                kind.check(value)
                    .map_err(|e| ToolError::InvalidArgs(format!("{}: {}", key, e)))?;
            }
            // Keys outside the schema pass through untouched.
        }
        Ok(())
    }
}

/// Translates one externally-described tool into an internal [`Tool`] bound to
/// its source. The emitted name is `<sourceId>_<toolName>` to disambiguate
/// across sources; the execute closure calls the source with the original
/// name.
pub fn translate_tool(source_id: &str, spec: &ToolSpec, source: Arc<dyn ToolSource>) -> Tool {
    let name = format!("{}_{}", source_id, spec.name);
    let description = spec
        .description
        .clone()
        .unwrap_or_else(|| format!("Tool: {}", spec.name));
    let original_name = spec.name.clone();
    Tool::new(name, description, spec.input_schema.clone(), move |args| {
        let source = Arc::clone(&source);
        let original_name = original_name.clone();
        Box::pin(async move {
            let content = source
                .call_tool(&original_name, args)
                .await
                .map_err(|e| ToolError::Execution(e.to_string()))?;
            Ok(Value::String(content.text))
        })
    })
}
