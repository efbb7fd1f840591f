//! Random values that conform to a (resolved) schema.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use proptest::strategy::{Strategy, ValueTree};
use proptest::test_runner::{Config, RngAlgorithm, TestRng, TestRunner};
use rand::Rng;
use rand::seq::IndexedRandom;
use regex::Regex;
use serde_json::{Value, json};

use crate::error::DataGenError;
use crate::faker::{LocalizedFaker, random_uuid};
use crate::schema_resolver::{pick_typed_alternative, schema_type};

pub const DEFAULT_MAX_LENGTH: usize = 36;
pub const DEFAULT_MIN_ITEMS: usize = 0;
pub const DEFAULT_MAX_ITEMS: usize = 1;

// Generated strings are checked against the original pattern; a few retries
// cover constructs the generator approximates.
const PATTERN_ATTEMPTS: usize = 16;

/// Returns a random value that is valid under `schema`.
///
/// # Errors
/// `DataGenError::UnsupportedType` for `object`, `null` or unknown types,
/// `DataGenError::Range` for impossible numeric bounds and
/// `DataGenError::Pattern` for patterns that cannot be generated.
pub fn get_valid_value<R: Rng>(
    schema: &Value,
    faker: &LocalizedFaker,
    rng: &mut R,
) -> Result<Value, DataGenError> {
    if let Some(value) = schema.get("const") {
        return Ok(value.clone());
    }
    if let Some(Value::Array(values)) = schema.get("enum")
        && let Some(value) = values.choose(rng)
    {
        return Ok(value.clone());
    }
    if schema.get("types").is_some() {
        let alternative = pick_typed_alternative(schema, rng);
        return get_valid_value(&alternative, faker, rng);
    }

    match schema_type(schema) {
        Some("boolean") => Ok(Value::Bool(rng.random_bool(0.5))),
        Some("integer") => Ok(json!(get_random_int(schema, rng)?)),
        Some("number") => Ok(json!(get_random_float(schema, rng)?)),
        Some("string") => Ok(Value::String(get_random_string(schema, faker, rng)?)),
        Some("array") => Ok(Value::Array(get_random_array(schema, faker, rng)?)),
        Some(other) => Err(DataGenError::UnsupportedType(other.to_owned())),
        None => Err(DataGenError::Schema(format!("schema without a type: {schema}"))),
    }
}

/// A random integer within the schema's bounds, int32 by default, int64 when
/// `format` is `int64`.
///
/// # Errors
/// `DataGenError::Range` if the effective maximum is below the effective minimum.
pub fn get_random_int<R: Rng>(schema: &Value, rng: &mut R) -> Result<i64, DataGenError> {
    let (default_min, default_max) = if schema.get("format").and_then(Value::as_str) == Some("int64") {
        (i64::MIN, i64::MAX)
    } else {
        (i64::from(i32::MIN), i64::from(i32::MAX))
    };

    let exclusive_min = schema.get("exclusiveMinimum");
    let exclusive_max = schema.get("exclusiveMaximum");

    let mut minimum = schema
        .get("minimum")
        .and_then(|bound| lower_int_bound(bound, exclusive_min == Some(&Value::Bool(true))))
        .unwrap_or(default_min);
    let mut maximum = schema
        .get("maximum")
        .and_then(|bound| upper_int_bound(bound, exclusive_max == Some(&Value::Bool(true))))
        .unwrap_or(default_max);

    if let Some(bound @ Value::Number(_)) = exclusive_min
        && let Some(bound) = lower_int_bound(bound, true)
    {
        minimum = minimum.max(bound);
    }
    if let Some(bound @ Value::Number(_)) = exclusive_max
        && let Some(bound) = upper_int_bound(bound, true)
    {
        maximum = maximum.min(bound);
    }

    if maximum < minimum {
        return Err(DataGenError::Range(format!(
            "maximum of {maximum} is less than minimum of {minimum}"
        )));
    }
    Ok(rng.random_range(minimum..=maximum))
}

/// A random float within the schema's bounds.
///
/// Without bounds the range is `[-1.0, 1.0]`; with a single bound it extends
/// 1.0 from that bound. When either bound is exclusive, both are excluded.
///
/// # Errors
/// `DataGenError::Range` if `maximum < minimum`, or if no float lies strictly
/// between the bounds while a bound is exclusive.
pub fn get_random_float<R: Rng>(schema: &Value, rng: &mut R) -> Result<f64, DataGenError> {
    let exclusive_min = schema.get("exclusiveMinimum");
    let exclusive_max = schema.get("exclusiveMaximum");

    // A numeric exclusive bound next to an inclusive one: the tighter wins.
    let minimum = tighter(
        schema.get("minimum").and_then(Value::as_f64),
        exclusive_min.and_then(Value::as_f64),
        f64::max,
    );
    let maximum = tighter(
        schema.get("maximum").and_then(Value::as_f64),
        exclusive_max.and_then(Value::as_f64),
        f64::min,
    );

    let (minimum, maximum) = match (minimum, maximum) {
        (None, None) => (-1.0, 1.0),
        (None, Some(max)) => (max - 1.0, max),
        (Some(min), None) => (min, min + 1.0),
        (Some(min), Some(max)) => (min, max),
    };

    if maximum < minimum {
        return Err(DataGenError::Range(format!(
            "maximum of {maximum} is less than minimum of {minimum}"
        )));
    }
    if !(maximum - minimum).is_finite() {
        return Err(DataGenError::Range(format!(
            "range [{minimum}, {maximum}] cannot be sampled"
        )));
    }

    let exclusive = is_exclusive(exclusive_min) || is_exclusive(exclusive_max);
    if !exclusive {
        return Ok(rng.random_range(minimum..=maximum));
    }
    if maximum <= minimum {
        return Err(DataGenError::Range(format!(
            "maximum of {maximum} is equal to minimum of {minimum} and \
             exclusiveMinimum or exclusiveMaximum is set"
        )));
    }
    if minimum.next_up() >= maximum {
        return Err(DataGenError::Range(format!(
            "no value lies strictly between {minimum} and {maximum}"
        )));
    }
    loop {
        let result = rng.random_range(minimum..maximum);
        if minimum < result && result < maximum {
            return Ok(result);
        }
    }
}

/// A random string for the schema's `pattern` or `format`, within its length bounds.
///
/// A `pattern` takes precedence over format and length. Length bounds count characters.
///
/// # Errors
/// `DataGenError::Pattern` if the pattern is invalid or cannot be generated.
pub fn get_random_string<R: Rng>(
    schema: &Value,
    faker: &LocalizedFaker,
    rng: &mut R,
) -> Result<String, DataGenError> {
    if let Some(pattern) = schema.get("pattern").and_then(Value::as_str)
        && !pattern.is_empty()
    {
        return string_from_pattern(pattern, rng);
    }

    let minimum = usize_bound(schema, "minLength").unwrap_or(0);
    let maximum = usize_bound(schema, "maxLength")
        .unwrap_or(DEFAULT_MAX_LENGTH)
        .max(minimum);
    let format = schema
        .get("format")
        .and_then(Value::as_str)
        .unwrap_or("uuid");

    if format == "byte" {
        return Ok(STANDARD.encode(random_uuid(rng).to_string()));
    }

    let mut value = faker.fake_string(format, rng);
    while value.chars().count() < minimum {
        value.push_str(&faker.name(rng));
    }
    if value.chars().count() > maximum {
        value = value.chars().take(maximum).collect();
    }
    Ok(value)
}

/// A list of `[minItems, maxItems]` elements (defaults 0 and 1) synthesized from `items`.
///
/// # Errors
/// `DataGenError::Schema` if the schema has no `items`, plus any error raised
/// while synthesizing an element.
pub fn get_random_array<R: Rng>(
    schema: &Value,
    faker: &LocalizedFaker,
    rng: &mut R,
) -> Result<Vec<Value>, DataGenError> {
    let minimum = usize_bound(schema, "minItems").unwrap_or(DEFAULT_MIN_ITEMS);
    let maximum = usize_bound(schema, "maxItems")
        .unwrap_or(DEFAULT_MAX_ITEMS)
        .max(minimum);
    let items = schema
        .get("items")
        .ok_or_else(|| DataGenError::Schema("array schema without items".to_owned()))?;

    let length = rng.random_range(minimum..=maximum);
    (0..length)
        .map(|_| get_valid_value(items, faker, rng))
        .collect()
}

/// Generates a string matching `pattern` from a proptest regex strategy seeded by `rng`.
fn string_from_pattern<R: Rng>(pattern: &str, rng: &mut R) -> Result<String, DataGenError> {
    let pattern_error = |reason: String| DataGenError::Pattern {
        pattern: pattern.to_owned(),
        reason,
    };

    let matcher = Regex::new(pattern).map_err(|e| pattern_error(e.to_string()))?;
    let normalized = strip_anchors(pattern);
    let strategy =
        proptest::string::string_regex(&normalized).map_err(|e| pattern_error(e.to_string()))?;

    let mut seed = [0_u8; 32];
    rng.fill(&mut seed);
    let mut runner = TestRunner::new_with_rng(
        Config {
            failure_persistence: None,
            ..Config::default()
        },
        TestRng::from_seed(RngAlgorithm::ChaCha, &seed),
    );

    for _ in 0..PATTERN_ATTEMPTS {
        let candidate = strategy
            .new_tree(&mut runner)
            .map_err(|reason| pattern_error(reason.to_string()))?
            .current();
        if matcher.is_match(&candidate) {
            return Ok(candidate);
        }
    }
    Err(pattern_error(format!(
        "no matching string after {PATTERN_ATTEMPTS} attempts"
    )))
}

/// Drops a leading `^` and a trailing unescaped `$`; the generator has no use for anchors.
fn strip_anchors(pattern: &str) -> String {
    let mut body = pattern.strip_prefix('^').unwrap_or(pattern);
    if let Some(stripped) = body.strip_suffix('$') {
        let trailing_backslashes = stripped.chars().rev().take_while(|c| *c == '\\').count();
        if trailing_backslashes % 2 == 0 {
            body = stripped;
        }
    }
    body.to_owned()
}

fn is_exclusive(bound: Option<&Value>) -> bool {
    match bound {
        Some(Value::Bool(flag)) => *flag,
        Some(Value::Number(_)) => true,
        _ => false,
    }
}

fn tighter(bound: Option<f64>, exclusive_bound: Option<f64>, pick: fn(f64, f64) -> f64) -> Option<f64> {
    match (bound, exclusive_bound) {
        (Some(bound), Some(exclusive_bound)) => Some(pick(bound, exclusive_bound)),
        (bound, exclusive_bound) => bound.or(exclusive_bound),
    }
}

/// Smallest integer allowed by a lower bound.
fn lower_int_bound(bound: &Value, exclusive: bool) -> Option<i64> {
    if exclusive {
        int_value(bound, f64::floor).map(|b| b.saturating_add(1))
    } else {
        int_value(bound, f64::ceil)
    }
}

/// Largest integer allowed by an upper bound.
fn upper_int_bound(bound: &Value, exclusive: bool) -> Option<i64> {
    if exclusive {
        int_value(bound, f64::ceil).map(|b| b.saturating_sub(1))
    } else {
        int_value(bound, f64::floor)
    }
}

#[allow(clippy::cast_possible_truncation)]
fn int_value(value: &Value, round: fn(f64) -> f64) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_f64().filter(|f| f.is_finite()).map(|f| round(f) as i64))
}

pub(crate) fn usize_bound(schema: &Value, key: &str) -> Option<usize> {
    schema
        .get(key)
        .and_then(Value::as_u64)
        .and_then(|n| usize::try_from(n).ok())
}
