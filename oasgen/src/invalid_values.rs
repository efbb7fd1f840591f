//! Values that violate a schema.
//!
//! Strategies are tried in order: violate a constraint set, violate an `enum`,
//! step outside a numeric or length bound, and finally change the value's type.

use rand::Rng;
use rand::seq::IndexedRandom;
use serde_json::{Map, Number, Value, json};

use crate::faker::random_uuid;
use crate::relations::ConstraintValue;
use crate::schema_resolver::{json_type_name, pick_typed_alternative, schema_type};
use crate::valid_values::usize_bound;

/// Outcome of invalidating a value.
#[derive(Debug, Clone, PartialEq)]
pub enum InvalidValue {
    Value(Value),
    /// Leave the property or parameter out of the request.
    Ignore,
}

impl InvalidValue {
    #[must_use]
    pub fn into_value(self) -> Option<Value> {
        match self {
            InvalidValue::Value(value) => Some(value),
            InvalidValue::Ignore => None,
        }
    }
}

impl From<&ConstraintValue> for InvalidValue {
    fn from(value: &ConstraintValue) -> Self {
        match value {
            ConstraintValue::Value(value) => InvalidValue::Value(value.clone()),
            ConstraintValue::Ignore => InvalidValue::Ignore,
        }
    }
}

/// Returns a value that violates `schema`, given the current (valid) value and
/// the values a constraint allows.
///
/// Schemas with a `types` list are narrowed to one non-null alternative first.
/// A schema without a `type` is treated as the type of `current_value`.
pub fn get_invalid_value<R: Rng>(
    schema: &Value,
    current_value: &Value,
    values_from_constraint: &[ConstraintValue],
    rng: &mut R,
) -> InvalidValue {
    let schema = pick_typed_alternative(schema, rng);
    let value_type = schema_type(&schema).unwrap_or_else(|| json_type_name(current_value));

    if !values_from_constraint.is_empty()
        && let Some(invalid) = get_invalid_value_from_constraint(values_from_constraint, value_type)
    {
        tracing::debug!("invalid value from constraint: {invalid:?}");
        return invalid;
    }

    if let Some(Value::Array(enum_values)) = schema.get("enum")
        && !enum_values.is_empty()
        && let Some(invalid) = get_invalid_value_from_enum(enum_values, value_type)
    {
        tracing::debug!("invalid value from enum: {invalid}");
        return InvalidValue::Value(invalid);
    }

    if let Some(invalid) = get_value_out_of_bounds(&schema, current_value, rng) {
        tracing::debug!("value out of bounds: {invalid}");
        return InvalidValue::Value(invalid);
    }

    if value_type == "string" {
        // Scalars can be cast to a string, so switch to values that cannot.
        let candidates = [json!([{"invalid": [null, false]}]), json!("null"), Value::Null, json!(true)];
        let choice = candidates.choose(rng).cloned().unwrap_or(Value::Null);
        tracing::debug!("property type changed from string to {choice}");
        return InvalidValue::Value(choice);
    }

    tracing::debug!("property type changed from {value_type} to random string");
    InvalidValue::Value(Value::String(random_uuid(rng).to_string()))
}

/// A value of `value_type` outside the constraint's allowed values, if one can be built.
///
/// An `Ignore` among the values means a request without the property is valid.
/// The returned `Ignore` then asks the caller to send the property at its
/// current value, which violates the constraint.
#[must_use]
pub fn get_invalid_value_from_constraint(
    values_from_constraint: &[ConstraintValue],
    value_type: &str,
) -> Option<InvalidValue> {
    if values_from_constraint.iter().any(ConstraintValue::is_ignore) {
        return Some(InvalidValue::Ignore);
    }
    let values: Vec<Value> = values_from_constraint
        .iter()
        .filter_map(ConstraintValue::as_value)
        .cloned()
        .collect();
    invalid_from_values(&values, value_type).map(InvalidValue::Value)
}

fn invalid_from_values(values: &[Value], value_type: &str) -> Option<Value> {
    if values.len() == 1 && value_type == "boolean" {
        return values[0].as_bool().map(|flag| Value::Bool(!flag));
    }
    let last = values.last()?;

    match value_type {
        "object" => {
            let valid = last.as_object()?;
            let invalid: Map<String, Value> = valid
                .iter()
                .map(|(key, value)| {
                    let nested = invalid_from_values(std::slice::from_ref(value), json_type_name(value));
                    (key.clone(), nested.unwrap_or(Value::Null))
                })
                .collect();
            Some(Value::Object(invalid))
        }
        "array" => {
            let valid = last.as_array()?;
            let invalid = valid
                .iter()
                .map(|value| {
                    invalid_from_values(std::slice::from_ref(value), json_type_name(value))
                        .unwrap_or(Value::Null)
                })
                .collect();
            Some(Value::Array(invalid))
        }
        "integer" | "number" => {
            let doubled: Vec<&Value> = values.iter().chain(values.iter()).collect();
            let total = sum_of_absolutes(&doubled)?;
            Some(if is_zero(&total) { bump_zero(&total) } else { total })
        }
        "string" => {
            let mut combined = String::new();
            for value in values.iter().chain(values.iter()) {
                combined.push_str(value.as_str()?);
            }
            (!combined.is_empty()).then_some(Value::String(combined))
        }
        _ => None,
    }
}

/// A value of `value_type` that is not in `values`, built by combining the members.
#[must_use]
pub fn get_invalid_value_from_enum(values: &[Value], value_type: &str) -> Option<Value> {
    let invalid = match value_type {
        "string" => {
            let mut combined = String::new();
            for value in values.iter().filter_map(Value::as_str) {
                combined.push_str(value);
                combined.push_str(value);
            }
            Value::String(combined)
        }
        "integer" | "number" => {
            let doubled: Vec<&Value> = values.iter().flat_map(|v| [v, v]).collect();
            sum_of_absolutes(&doubled)?
        }
        "array" => {
            let mut combined = Vec::new();
            for value in values.iter().filter_map(Value::as_array) {
                combined.extend(value.iter().cloned());
                combined.extend(value.iter().cloned());
            }
            Value::Array(combined)
        }
        "object" => invalid_object_from_enum(values)?,
        other => {
            tracing::warn!("Cannot invalidate enum value with type {other}");
            return None;
        }
    };

    if values.contains(&invalid) {
        tracing::debug!("combined enum value {invalid} is itself an enum member");
        return None;
    }
    Some(invalid)
}

// Objects must keep their keys, so values of the other members are swapped in
// one key at a time until the result matches no member.
fn invalid_object_from_enum(values: &[Value]) -> Option<Value> {
    let mut invalid = values.first()?.as_object()?.clone();
    let keys: Vec<String> = invalid.keys().cloned().collect();
    for value in values {
        for key in &keys {
            let replacement = value.get(key).cloned().unwrap_or(Value::Null);
            invalid.insert(key.clone(), replacement);
            let candidate = Value::Object(invalid.clone());
            if !values.contains(&candidate) {
                return Some(candidate);
            }
        }
    }
    Some(Value::Object(invalid))
}

/// A value just outside the numeric, length or item-count range of `schema`.
///
/// Returns `None` when the schema declares no bound that can be violated.
pub fn get_value_out_of_bounds<R: Rng>(
    schema: &Value,
    current_value: &Value,
    rng: &mut R,
) -> Option<Value> {
    let value_type = schema_type(schema).unwrap_or_else(|| json_type_name(current_value));
    match value_type {
        "integer" | "number" => numeric_out_of_bounds(schema),
        "string" => string_out_of_bounds(schema, current_value, rng),
        "array" => array_out_of_bounds(schema, current_value, rng),
        _ => None,
    }
}

fn numeric_out_of_bounds(schema: &Value) -> Option<Value> {
    // A bound at the edge of the integer range has nothing beyond it; try the other one.
    if let Some(minimum) = schema.get("minimum").filter(|v| v.is_number()) {
        if schema.get("exclusiveMinimum") == Some(&Value::Bool(true)) {
            return Some(minimum.clone());
        }
        if let Some(below) = offset(minimum, -1) {
            return Some(below);
        }
    }
    if let Some(maximum) = schema.get("maximum").filter(|v| v.is_number()) {
        if schema.get("exclusiveMaximum") == Some(&Value::Bool(true)) {
            return Some(maximum.clone());
        }
        if let Some(above) = offset(maximum, 1) {
            return Some(above);
        }
    }
    if let Some(bound) = schema.get("exclusiveMinimum").filter(|v| v.is_number()) {
        return Some(bound.clone());
    }
    schema
        .get("exclusiveMaximum")
        .filter(|v| v.is_number())
        .cloned()
}

fn string_out_of_bounds<R: Rng>(schema: &Value, current_value: &Value, rng: &mut R) -> Option<Value> {
    let current = current_value.as_str().unwrap_or_default();
    if let Some(minimum) = usize_bound(schema, "minLength").filter(|min| *min > 0) {
        return Some(Value::String(current.chars().take(minimum - 1).collect()));
    }
    let maximum = usize_bound(schema, "maxLength")?;
    let source: Vec<char> = if current.is_empty() {
        vec!['x']
    } else {
        current.chars().collect()
    };
    let mut invalid: String = source.iter().collect();
    let mut length = source.len();
    while length <= maximum {
        if let Some(c) = source.choose(rng) {
            invalid.push(*c);
        }
        length += 1;
    }
    Some(Value::String(invalid))
}

fn array_out_of_bounds<R: Rng>(schema: &Value, current_value: &Value, rng: &mut R) -> Option<Value> {
    let current: &[Value] = current_value.as_array().map_or(&[], Vec::as_slice);
    if let Some(minimum) = usize_bound(schema, "minItems").filter(|min| *min > 0) {
        return Some(Value::Array(current.iter().take(minimum - 1).cloned().collect()));
    }
    let maximum = usize_bound(schema, "maxItems")?;
    let source: Vec<Value> = if current.is_empty() {
        vec![json!("x")]
    } else {
        current.to_vec()
    };
    let mut invalid = source.clone();
    while invalid.len() <= maximum {
        if let Some(item) = source.choose(rng) {
            invalid.push(item.clone());
        }
    }
    Some(Value::Array(invalid))
}

/// Sums absolute values, staying integral when every member is an integer.
#[allow(clippy::cast_precision_loss)]
fn sum_of_absolutes(values: &[&Value]) -> Option<Value> {
    if values.iter().all(|v| v.is_i64() || v.is_u64()) {
        let mut total: i64 = 0;
        for value in values {
            let magnitude = value
                .as_i64()
                .map_or(i64::MAX, i64::saturating_abs);
            total = total.saturating_add(magnitude);
        }
        return Some(json!(total));
    }
    let mut total = 0.0_f64;
    for value in values {
        total += value.as_f64()?.abs();
    }
    Number::from_f64(total).map(Value::Number)
}

fn is_zero(value: &Value) -> bool {
    value.as_i64() == Some(0) || value.as_f64().is_some_and(|f| f == 0.0)
}

fn bump_zero(value: &Value) -> Value {
    if value.is_i64() { json!(1) } else { json!(1.0) }
}

#[allow(clippy::cast_precision_loss)]
fn offset(bound: &Value, delta: i64) -> Option<Value> {
    if let Some(n) = bound.as_i64() {
        return n.checked_add(delta).map(Value::from);
    }
    if let Some(n) = bound.as_u64() {
        return n.checked_add_signed(delta).map(Value::from);
    }
    let f = bound.as_f64()?;
    Number::from_f64(f + delta as f64).map(Value::Number)
}
