//! Turning valid request data into data that provokes a given status code.

use rand::Rng;
use rand::seq::{IndexedRandom, SliceRandom};
use serde_json::{Map, Value};
use std::collections::BTreeSet;

use crate::dto::Dto;
use crate::error::DataGenError;
use crate::faker::{LocalizedFaker, random_hex_token};
use crate::invalid_values::{InvalidValue, get_invalid_value};
use crate::openapi::{ApiCollaborator, HttpMethod, conflict_json_data};
use crate::relations::{ConstraintValue, PropertyValueConstraint, Relation, constraint_values_for};
use crate::request_data::{ParameterLocation, ParameterSpec, RequestData};
use crate::schema_resolver::{pick_typed_alternative, resolve_schema, schema_type};
use crate::valid_values::get_valid_value;

/// Returns the dto's properties with one property set to a value that should
/// make the API respond with `status_code`.
///
/// Relations for `status_code` are considered first; when `status_code` is the
/// default invalid-property code, every property in `schema` is a candidate too.
///
/// # Errors
/// `DataGenError::NoInvalidationTarget` if no property can be invalidated for
/// `status_code`, plus schema errors raised while synthesizing a current value.
pub fn get_invalidated_data<R: Rng>(
    dto: &Dto,
    schema: &Value,
    status_code: u16,
    invalid_property_default_code: u16,
    faker: &LocalizedFaker,
    rng: &mut R,
) -> Result<Map<String, Value>, DataGenError> {
    let mut properties = dto.as_dict();
    let schema = resolve_schema(schema);
    let schema_properties = schema.get("properties").and_then(Value::as_object);

    // Path constraints have nothing in the body to invalidate.
    let relations: Vec<&Relation> = dto
        .get_relations_for_error_code(status_code)
        .into_iter()
        .filter(|r| !matches!(r, Relation::PathPropertiesConstraint(_)))
        .collect();

    let mut relation_names: Vec<String> = Vec::new();
    for relation in &relations {
        let name = relation.property_name();
        if schema_properties.is_some_and(|props| !props.contains_key(name)) {
            tracing::warn!(
                "relation for status_code {status_code} refers to '{name}', which is not \
                 defined in the schema; it is ignored"
            );
            continue;
        }
        relation_names.push(name.to_owned());
    }

    let mut candidates = relation_names;
    if status_code == invalid_property_default_code
        && let Some(props) = schema_properties
    {
        candidates.extend(props.keys().cloned());
    }
    let mut seen = BTreeSet::new();
    candidates.retain(|name| seen.insert(name.clone()));

    if candidates.is_empty() {
        return Err(DataGenError::NoInvalidationTarget(format!(
            "No property can be invalidated to cause status_code {status_code}"
        )));
    }

    candidates.shuffle(rng);
    let property_name = candidates[0].as_str();
    let original = properties.clone();

    let has_id_dependency = relations
        .iter()
        .any(|r| matches!(r, Relation::IdDependency(d) if d.property_name == property_name));
    let explicit = relations
        .iter()
        .filter_map(|r| r.as_property_value_constraint())
        .filter(|r| r.property_name == property_name)
        .find_map(|r| r.invalid_value_for(status_code));

    if has_id_dependency {
        let invalid_value = random_hex_token(rng);
        tracing::debug!(
            "Breaking IdDependency for status_code {status_code}: replacing {:?} with {invalid_value}",
            properties.get(property_name)
        );
        properties.insert(property_name.to_owned(), Value::String(invalid_value));
    } else if let Some(invalid_value) = explicit {
        tracing::debug!("Using invalid_value {invalid_value:?} to invalidate property {property_name}");
        apply(&mut properties, property_name, InvalidValue::from(invalid_value));
    } else {
        let value_schema = schema_properties
            .and_then(|props| props.get(property_name))
            .map(resolve_schema)
            .unwrap_or_default();
        let value_schema = pick_typed_alternative(&value_schema, rng);

        // An optional property may be absent; any value of the right type will do.
        let current_value = match properties.get(property_name) {
            Some(value) => value.clone(),
            None => match schema_type(&value_schema) {
                Some("object") => Value::Object(Map::new()),
                Some("array") => Value::Array(Vec::new()),
                Some(_) => get_valid_value(&value_schema, faker, rng)?,
                None => Value::Null,
            },
        };

        let values_from_constraint = constraint_values_for(relations.iter().copied(), property_name);
        let invalid_value =
            match get_invalid_value(&value_schema, &current_value, &values_from_constraint, rng) {
                // Ignore is allowed, so sending the property at all breaks the constraint.
                InvalidValue::Ignore => InvalidValue::Value(current_value),
                invalid_value => invalid_value,
            };
        tracing::debug!(
            "Property {property_name} changed to {invalid_value:?} (received from get_invalid_value)"
        );
        apply(&mut properties, property_name, invalid_value);
    }

    if properties == original {
        tracing::warn!("get_invalidated_data returned unchanged properties");
    }
    Ok(properties)
}

/// Returns the request's `(params, headers)` with one parameter changed so the
/// API should respond with `status_code`.
///
/// # Errors
/// `DataGenError::NoInvalidationTarget` when no parameter can provoke the code
/// and `DataGenError::ConstraintMismatch` when the chosen parameter is not defined.
pub fn get_invalidated_parameters<R: Rng>(
    status_code: u16,
    request_data: &RequestData,
    invalid_property_default_code: u16,
    faker: &LocalizedFaker,
    rng: &mut R,
) -> Result<(Map<String, Value>, Map<String, Value>), DataGenError> {
    if request_data.parameters().is_empty() {
        return Err(DataGenError::NoInvalidationTarget(
            "No params or headers to invalidate.".to_owned(),
        ));
    }

    let relations: Vec<&PropertyValueConstraint> = request_data
        .dto()
        .get_parameter_relations_for_error_code(status_code)
        .into_iter()
        .filter_map(Relation::as_property_value_constraint)
        .collect();

    let parameters_to_ignore: BTreeSet<&str> = relations
        .iter()
        .filter(|r| r.invalid_value_for(status_code) == Some(&ConstraintValue::Ignore))
        .map(|r| r.property_name.as_str())
        .collect();
    let relation_names: BTreeSet<&str> = relations.iter().map(|r| r.property_name.as_str()).collect();

    let is_default_code = status_code == invalid_property_default_code;
    if relation_names.is_empty() && !is_default_code {
        return Err(DataGenError::NoInvalidationTarget(format!(
            "No relations to cause status_code {status_code} found."
        )));
    }

    let mut parameter_names: BTreeSet<&str> = relation_names.clone();
    if is_default_code {
        parameter_names.extend(request_data.params_that_can_be_invalidated().iter().map(String::as_str));
        parameter_names.extend(request_data.headers_that_can_be_invalidated().iter().map(String::as_str));
        if parameter_names.is_empty() {
            return Err(DataGenError::NoInvalidationTarget(
                "None of the query parameters and headers can be invalidated.".to_owned(),
            ));
        }
    }

    drop_undefined_parameters(request_data, &relation_names, &mut parameter_names, status_code);

    let candidates: Vec<&str> = parameter_names
        .difference(&parameters_to_ignore)
        .copied()
        .collect();
    let Some(parameter_to_invalidate) = candidates.choose(rng).copied() else {
        return Err(DataGenError::NoInvalidationTarget(format!(
            "No parameter can be changed to cause status_code {status_code}."
        )));
    };

    let parameter = request_data.parameter(parameter_to_invalidate).ok_or_else(|| {
        DataGenError::ConstraintMismatch(format!(
            "{parameter_to_invalidate} not found in provided parameters."
        ))
    })?;

    let explicit_invalid_value = relations
        .iter()
        .filter(|r| r.property_name == parameter_to_invalidate)
        .find_map(|r| r.invalid_value_for(status_code))
        .map(InvalidValue::from);
    let values_from_constraint: Vec<ConstraintValue> = relations
        .iter()
        .filter(|r| r.property_name == parameter_to_invalidate)
        .flat_map(|r| r.values.iter().cloned())
        .collect();

    let mut params = request_data.params().clone();
    let mut headers = request_data.headers().clone();
    ensure_parameter_in_parameters(
        parameter,
        &mut params,
        &mut headers,
        &values_from_constraint,
        faker,
        rng,
    )?;

    let invalid_value = if let Some(invalid_value) = explicit_invalid_value {
        invalid_value
    } else {
        let valid_value = params
            .get(parameter_to_invalidate)
            .or_else(|| headers.get(parameter_to_invalidate))
            .cloned()
            .unwrap_or(Value::Null);
        match get_invalid_value(&parameter.schema, &valid_value, &values_from_constraint, rng) {
            InvalidValue::Ignore => InvalidValue::Value(valid_value),
            invalid_value => invalid_value,
        }
    };
    tracing::debug!("{parameter_to_invalidate} changed to {invalid_value:?}");

    let target = if params.contains_key(parameter_to_invalidate) {
        &mut params
    } else {
        &mut headers
    };
    apply(target, parameter_to_invalidate, invalid_value);
    Ok((params, headers))
}

fn drop_undefined_parameters<'a>(
    request_data: &RequestData,
    relation_names: &BTreeSet<&'a str>,
    parameter_names: &mut BTreeSet<&'a str>,
    status_code: u16,
) {
    let unknown: Vec<&str> = relation_names
        .iter()
        .copied()
        .filter(|name| request_data.parameter(name).is_none())
        .collect();
    if unknown.is_empty() {
        return;
    }
    tracing::warn!(
        "parameter relations for status_code {status_code} refer to parameters that are not \
         defined: {unknown:?}; they are ignored for parameter invalidation"
    );
    for name in &unknown {
        parameter_names.remove(name);
    }
}

/// Adds a valid value for `parameter` to `params` or `headers` (by its location)
/// when neither holds it yet.
///
/// # Errors
/// Propagates errors from synthesizing a value for the parameter's schema.
pub fn ensure_parameter_in_parameters<R: Rng>(
    parameter: &ParameterSpec,
    params: &mut Map<String, Value>,
    headers: &mut Map<String, Value>,
    values_from_constraint: &[ConstraintValue],
    faker: &LocalizedFaker,
    rng: &mut R,
) -> Result<(), DataGenError> {
    let name = &parameter.name;
    if params.contains_key(name) || headers.contains_key(name) {
        return Ok(());
    }

    let allowed: Vec<&Value> = values_from_constraint
        .iter()
        .filter_map(ConstraintValue::as_value)
        .collect();
    let valid_value = match allowed.choose(rng) {
        Some(value) => (*value).clone(),
        None => get_valid_value(&parameter.schema, faker, rng)?,
    };

    match parameter.location {
        ParameterLocation::Query => {
            params.insert(name.clone(), valid_value);
        }
        ParameterLocation::Header => {
            headers.insert(name.clone(), valid_value);
        }
        ParameterLocation::Path | ParameterLocation::Cookie => {
            tracing::debug!("{name} is a {:?} parameter and is not added", parameter.location);
        }
    }
    Ok(())
}

/// Returns body data for `request_data` that should provoke `status_code`.
///
/// Relations for the code are honored before the data itself is changed: a
/// uniqueness constraint yields conflicting data (the collaborator creates the
/// resource it conflicts with), an id reference makes the collaborator put the
/// resource in use and returns the data unchanged.
///
/// # Errors
/// Errors from the collaborator, from [`get_invalidated_data`] and from
/// building the conflicting data.
#[allow(clippy::too_many_arguments)]
pub fn get_invalid_json_data<R: Rng>(
    url: &str,
    method: HttpMethod,
    status_code: u16,
    request_data: &RequestData,
    invalid_property_default_code: u16,
    collaborator: &dyn ApiCollaborator,
    faker: &LocalizedFaker,
    rng: &mut R,
) -> Result<Map<String, Value>, DataGenError> {
    let dto = request_data.dto();
    let data_relations = dto.get_relations_for_error_code(status_code);

    let Some(relation) = data_relations.choose(rng).copied() else {
        if request_data.dto_schema().as_object().is_none_or(Map::is_empty) {
            return Err(DataGenError::NoInvalidationTarget(
                "Failed to invalidate: no data_relations and empty schema.".to_owned(),
            ));
        }
        return get_invalidated_data(
            dto,
            request_data.dto_schema(),
            status_code,
            invalid_property_default_code,
            faker,
            rng,
        );
    };

    match relation {
        Relation::UniquePropertyValueConstraint(_) => {
            let json_data = conflict_json_data(dto)?;
            collaborator.create_conflicting_resource(url, method, &json_data, status_code)?;
            Ok(json_data)
        }
        Relation::IdReference(reference) => {
            collaborator.ensure_in_use(url, reference)?;
            Ok(dto.as_dict())
        }
        _ => get_invalidated_data(
            dto,
            request_data.dto_schema(),
            status_code,
            invalid_property_default_code,
            faker,
            rng,
        ),
    }
}

fn apply(target: &mut Map<String, Value>, name: &str, invalid_value: InvalidValue) {
    match invalid_value {
        InvalidValue::Value(value) => {
            target.insert(name.to_owned(), value);
        }
        InvalidValue::Ignore => {
            target.remove(name);
        }
    }
}
