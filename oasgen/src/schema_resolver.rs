use rand::Rng;
use rand::seq::IndexedRandom;
use serde_json::{Map, Value};

use crate::error::DataGenError;

/// Media type of the only request body content that can be synthesized.
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Resolves `allOf`, `anyOf` and `oneOf` in a schema.
///
/// `allOf` parts are merged into the schema. `anyOf` / `oneOf` alternatives that
/// declare a `type` are collected in a `types` list instead, since alternatives
/// may carry incompatible types and restrictions; untyped alternatives are merged.
/// The input is never modified.
#[must_use]
pub fn resolve_schema(schema: &Value) -> Value {
    let Some(obj) = schema.as_object() else {
        return schema.clone();
    };

    let mut resolved: Map<String, Value> = obj
        .iter()
        .map(|(key, value)| {
            let value = if value.is_object() {
                resolve_schema(value)
            } else {
                value.clone()
            };
            (key.clone(), value)
        })
        .collect();

    if let Some(Value::Array(parts)) = resolved.remove("allOf") {
        for part in &parts {
            if let Value::Object(part) = resolve_schema(part) {
                resolved = merge_schemas(&resolved, &part);
            }
        }
    }

    let any_of = resolved.remove("anyOf");
    let one_of = resolved.remove("oneOf");
    let alternatives = match any_of {
        Some(Value::Array(parts)) if !parts.is_empty() => parts,
        _ => match one_of {
            Some(Value::Array(parts)) => parts,
            _ => Vec::new(),
        },
    };

    for alternative in &alternatives {
        let Value::Object(part) = resolve_schema(alternative) else {
            continue;
        };
        if part.contains_key("type") {
            match resolved.get_mut("types") {
                Some(Value::Array(types)) => types.push(Value::Object(part)),
                _ => {
                    resolved.insert("types".to_owned(), Value::Array(vec![Value::Object(part)]));
                }
            }
        } else {
            resolved = merge_schemas(&resolved, &part);
        }
    }

    Value::Object(resolved)
}

/// Merges `second` into a copy of `first`.
///
/// Keys only in `second` are added. For shared keys, objects are merged recursively
/// and arrays are concatenated; conflicting scalars keep the value from `first`.
#[must_use]
pub fn merge_schemas(first: &Map<String, Value>, second: &Map<String, Value>) -> Map<String, Value> {
    let mut merged = first.clone();
    for (key, value) in second {
        match (merged.get_mut(key), value) {
            (None, _) => {
                merged.insert(key.clone(), value.clone());
            }
            (Some(Value::Object(existing)), Value::Object(incoming)) => {
                *existing = merge_schemas(existing, incoming);
            }
            (Some(Value::Array(existing)), Value::Array(incoming)) => {
                existing.extend(incoming.iter().cloned());
            }
            (Some(existing), _) => {
                if existing != value {
                    tracing::warn!("key '{key}' with value '{existing}' not updated to '{value}'");
                }
            }
        }
    }
    merged
}

/// Extracts and resolves the JSON schema of a `requestBody` specification.
///
/// # Errors
/// Returns `DataGenError::UnsupportedContentType` for any media type other than
/// `application/json` and `DataGenError::Schema` if the body has no single content entry.
pub fn get_content_schema(body_spec: &Value) -> Result<Value, DataGenError> {
    let content = body_spec
        .get("content")
        .and_then(Value::as_object)
        .ok_or_else(|| DataGenError::Schema("requestBody has no content".to_owned()))?;

    let mut content_types = content.keys();
    let (Some(content_type), None) = (content_types.next(), content_types.next()) else {
        return Err(DataGenError::Schema(format!(
            "requestBody must have exactly one content type, found {}",
            content.len()
        )));
    };
    if content_type != JSON_CONTENT_TYPE {
        return Err(DataGenError::UnsupportedContentType(content_type.clone()));
    }

    let schema = content
        .get(content_type)
        .and_then(|media| media.get("schema"))
        .ok_or_else(|| DataGenError::Schema(format!("no schema for '{content_type}'")))?;
    Ok(resolve_schema(schema))
}

/// The JSON-Schema type name of a runtime value.
#[must_use]
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "number",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// The `type` keyword of a schema, if it is a single type name.
#[must_use]
pub fn schema_type(schema: &Value) -> Option<&str> {
    schema.get("type").and_then(Value::as_str)
}

/// Picks one alternative from the `types` list of a resolved schema.
///
/// A `null` alternative is dropped when other alternatives exist, since a nullable
/// property still needs a non-null value. Schemas without `types` are returned as-is.
pub fn pick_typed_alternative<R: Rng>(schema: &Value, rng: &mut R) -> Value {
    let Some(types) = schema.get("types").and_then(Value::as_array) else {
        return schema.clone();
    };
    let candidates: Vec<&Value> = if types.len() > 1 {
        types
            .iter()
            .filter(|alternative| schema_type(alternative) != Some("null"))
            .collect()
    } else {
        types.iter().collect()
    };
    candidates
        .choose(rng)
        .map_or_else(|| schema.clone(), |alternative| (*alternative).clone())
}
