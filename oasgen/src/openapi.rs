//! Helpers that work on a loaded (and `$ref`-resolved) OpenAPI document.

use rand::Rng;
use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use crate::dto::{Dto, DtoClass, DtoMapping, IdMapping};
use crate::error::DataGenError;
use crate::faker::{LocalizedFaker, random_hex_token};
use crate::files_reader::load_document;
use crate::relations::{ConstraintValue, IdReference, Relation, constraint_values_for};
use crate::request_data::{ParameterLocation, ParameterSpec, RequestData};
use crate::schema_resolver::{get_content_schema, pick_typed_alternative, resolve_schema, schema_type};
use crate::valid_values::get_valid_value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
}

impl HttpMethod {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "get",
            HttpMethod::Post => "post",
            HttpMethod::Put => "put",
            HttpMethod::Patch => "patch",
            HttpMethod::Delete => "delete",
            HttpMethod::Head => "head",
            HttpMethod::Options => "options",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = DataGenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "get" => Ok(HttpMethod::Get),
            "post" => Ok(HttpMethod::Post),
            "put" => Ok(HttpMethod::Put),
            "patch" => Ok(HttpMethod::Patch),
            "delete" => Ok(HttpMethod::Delete),
            "head" => Ok(HttpMethod::Head),
            "options" => Ok(HttpMethod::Options),
            other => Err(DataGenError::Schema(format!("unknown http method '{other}'"))),
        }
    }
}

/// The parts of test-data generation that need a running API.
///
/// Implementations perform the requests; everything in this crate stays free of I/O.
pub trait ApiCollaborator {
    /// The id of an existing resource at `endpoint`, e.g. by creating one.
    ///
    /// # Errors
    /// `DataGenError::Collaborator` if no id can be obtained.
    fn get_valid_id_for_endpoint(&self, endpoint: &str, method: HttpMethod) -> Result<String, DataGenError>;

    /// Makes sure the right-most id in `url` is referenced by a resource created at
    /// `relation.post_path`.
    ///
    /// # Errors
    /// `DataGenError::Collaborator` if the referencing resource cannot be created.
    fn ensure_in_use(&self, url: &str, relation: &IdReference) -> Result<(), DataGenError>;

    /// Creates the resource that `json_data` will conflict with.
    ///
    /// # Errors
    /// `DataGenError::Collaborator` if the resource cannot be created and does not exist yet.
    fn create_conflicting_resource(
        &self,
        url: &str,
        method: HttpMethod,
        json_data: &Map<String, Value>,
        status_code: u16,
    ) -> Result<(), DataGenError>;
}

/// An OpenAPI document with the base url of the API and the dto / id mappings.
#[derive(Debug, Clone)]
pub struct OpenApiDocument {
    spec: Value,
    base_url: String,
    mapping: DtoMapping,
}

impl OpenApiDocument {
    #[must_use]
    pub fn new(spec: Value, base_url: impl Into<String>, mapping: DtoMapping) -> Self {
        OpenApiDocument {
            spec,
            base_url: base_url.into(),
            mapping,
        }
    }

    /// Loads a JSON or YAML document.
    ///
    /// # Errors
    /// Errors from reading or parsing the file.
    pub fn from_path(path: &Path, base_url: &str, mapping: DtoMapping) -> Result<Self, DataGenError> {
        Ok(OpenApiDocument::new(load_document(path)?, base_url, mapping))
    }

    #[must_use]
    pub fn spec(&self) -> &Value {
        &self.spec
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[must_use]
    pub fn mapping(&self) -> &DtoMapping {
        &self.mapping
    }

    #[must_use]
    pub fn id_mapping(&self, endpoint: &str) -> IdMapping {
        self.mapping.get_id_property_name(endpoint)
    }

    fn paths(&self) -> impl Iterator<Item = &String> {
        self.spec
            .get("paths")
            .and_then(Value::as_object)
            .into_iter()
            .flat_map(Map::keys)
    }

    fn operation(&self, endpoint: &str, method: HttpMethod) -> Option<&Value> {
        self.spec.get("paths")?.get(endpoint)?.get(method.as_str())
    }

    /// The `paths` key matching a (partially) resolved endpoint.
    ///
    /// Segments in braces match any value. When several paths match, only an
    /// exact match is accepted.
    ///
    /// # Errors
    /// `DataGenError::ConstraintMismatch` if no path or more than one path matches.
    pub fn get_parametrized_endpoint(&self, endpoint: &str) -> Result<String, DataGenError> {
        let endpoint_parts: Vec<&str> = endpoint.split('/').collect();
        let candidates: Vec<&String> = self
            .paths()
            .filter(|spec_endpoint| {
                let spec_parts: Vec<&str> = spec_endpoint.split('/').collect();
                spec_parts.len() == endpoint_parts.len()
                    && spec_parts
                        .iter()
                        .zip(&endpoint_parts)
                        .all(|(spec_part, part)| spec_part == part || spec_part.starts_with('{'))
            })
            .collect();

        match candidates.as_slice() {
            [] => Err(DataGenError::ConstraintMismatch(format!(
                "{endpoint} not found in paths section of the OpenAPI document."
            ))),
            [single] => Ok((*single).clone()),
            several => several
                .iter()
                .find(|candidate| candidate.as_str() == endpoint)
                .map(|candidate| (*candidate).clone())
                .ok_or_else(|| {
                    DataGenError::ConstraintMismatch(format!(
                        "{endpoint} matched to multiple paths: {several:?}"
                    ))
                }),
        }
    }

    /// The `paths` key for a full url on this API.
    ///
    /// # Errors
    /// See [`OpenApiDocument::get_parametrized_endpoint`].
    pub fn get_parameterized_endpoint_from_url(&self, url: &str) -> Result<String, DataGenError> {
        let endpoint = url.strip_prefix(self.base_url.as_str()).unwrap_or(url);
        self.get_parametrized_endpoint(endpoint)
    }

    /// `valid_url` with its right-most path parameter replaced by a random id.
    ///
    /// # Errors
    /// `DataGenError::NoInvalidationTarget` if the endpoint has no path parameter.
    pub fn get_invalidated_url<R: Rng>(&self, valid_url: &str, rng: &mut R) -> Result<String, DataGenError> {
        let parameterized_endpoint = self.get_parameterized_endpoint_from_url(valid_url)?;
        let parameterized_url = format!("{}{parameterized_endpoint}", self.base_url);

        let mut url_parts: Vec<String> = valid_url.split('/').map(str::to_owned).collect();
        let url_len = url_parts.len();
        let position = parameterized_url
            .split('/')
            .rev()
            .take(url_len)
            .position(|part| part.starts_with('{') && part.ends_with('}'));

        let Some(offset) = position else {
            return Err(DataGenError::NoInvalidationTarget(format!(
                "{parameterized_endpoint} could not be invalidated."
            )));
        };
        url_parts[url_len - 1 - offset] = random_hex_token(rng);
        Ok(url_parts.join("/"))
    }

    /// A url for `endpoint` with every path parameter filled in.
    ///
    /// A `PathPropertiesConstraint` on the endpoint's dto wins; otherwise each
    /// parameter gets an id from the collaborator for the endpoint up to it.
    ///
    /// # Errors
    /// `DataGenError::ConstraintMismatch` for unknown endpoints and collaborator errors.
    pub fn get_valid_url<R: Rng>(
        &self,
        endpoint: &str,
        method: HttpMethod,
        collaborator: &dyn ApiCollaborator,
        rng: &mut R,
    ) -> Result<String, DataGenError> {
        let parametrized_endpoint = self.get_parametrized_endpoint(endpoint)?;
        let dto_class = self.mapping.get_dto_class(&parametrized_endpoint, method);
        if let Some(path) = dto_class.path_constraints().choose(rng) {
            return Ok(format!("{}{}", self.base_url, path.path));
        }

        let mut endpoint_parts: Vec<String> = endpoint.split('/').map(str::to_owned).collect();
        for index in 0..endpoint_parts.len() {
            let part = &endpoint_parts[index];
            if part.starts_with('{') && part.ends_with('}') {
                let type_endpoint = endpoint_parts[..index].join("/");
                let existing_id = collaborator.get_valid_id_for_endpoint(&type_endpoint, method)?;
                endpoint_parts[index] = existing_id;
            }
        }
        Ok(format!("{}{}", self.base_url, endpoint_parts.join("/")))
    }

    /// Valid body, query parameters and headers for an operation.
    ///
    /// # Errors
    /// `DataGenError::ConstraintMismatch` for unknown endpoints, schema errors from
    /// the operation and collaborator errors while resolving dependent ids.
    pub fn get_request_data<R: Rng>(
        &self,
        endpoint: &str,
        method: HttpMethod,
        collaborator: &dyn ApiCollaborator,
        faker: &LocalizedFaker,
        rng: &mut R,
    ) -> Result<RequestData, DataGenError> {
        let spec_endpoint = self.get_parametrized_endpoint(endpoint)?;
        let dto_class = self.mapping.get_dto_class(&spec_endpoint, method);
        let empty = Value::Object(Map::new());
        let method_spec = self.operation(&spec_endpoint, method).unwrap_or_else(|| {
            tracing::info!("method '{method}' not supported on '{spec_endpoint}', using empty spec.");
            &empty
        });

        let parameters = parse_parameters(method_spec)?;
        let query: Vec<ParameterSpec> = parameters
            .iter()
            .filter(|p| p.location == ParameterLocation::Query)
            .cloned()
            .collect();
        let header: Vec<ParameterSpec> = parameters
            .iter()
            .filter(|p| p.location == ParameterLocation::Header)
            .cloned()
            .collect();
        let params = get_parameter_data(&query, &dto_class.parameter_relations, faker, rng)?;
        let headers = get_parameter_data(&header, &dto_class.parameter_relations, faker, rng)?;

        let operation_id = method_spec
            .get("operationId")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let class = named_class(dto_class, operation_id, &spec_endpoint, method);

        let Some(body_spec) = method_spec.get("requestBody") else {
            return Ok(RequestData::new(
                Dto::new(class, Map::new()),
                Value::Object(Map::new()),
                parameters,
                params,
                headers,
            ));
        };

        let content_schema = get_content_schema(body_spec)?;
        let dto_data =
            get_json_data_for_dto_class(&content_schema, &class, operation_id, collaborator, faker, rng)?;
        Ok(RequestData::new(
            Dto::new(class, dto_data),
            content_schema,
            parameters,
            params,
            headers,
        ))
    }
}

fn named_class(
    dto_class: Arc<DtoClass>,
    operation_id: &str,
    endpoint: &str,
    method: HttpMethod,
) -> Arc<DtoClass> {
    if !dto_class.name.is_empty() {
        return dto_class;
    }
    let name = if operation_id.is_empty() {
        get_dto_cls_name(endpoint, method)
    } else {
        operation_id.to_owned()
    };
    Arc::new(DtoClass {
        name,
        ..(*dto_class).clone()
    })
}

fn parse_parameters(method_spec: &Value) -> Result<Vec<ParameterSpec>, DataGenError> {
    let Some(raw) = method_spec.get("parameters") else {
        return Ok(Vec::new());
    };
    let mut parameters: Vec<ParameterSpec> = serde_json::from_value(raw.clone())?;
    for parameter in &mut parameters {
        parameter.schema = resolve_schema(&parameter.schema);
    }
    Ok(parameters)
}

/// Valid values for `parameters`, keyed by parameter name.
///
/// Constrained parameters take one of their allowed values (and are left out
/// when that value is `Ignore`); the others get a synthesized value.
///
/// # Errors
/// Errors from synthesizing a value for a parameter schema.
pub fn get_parameter_data<R: Rng>(
    parameters: &[ParameterSpec],
    parameter_relations: &[Relation],
    faker: &LocalizedFaker,
    rng: &mut R,
) -> Result<Map<String, Value>, DataGenError> {
    let mut result = Map::new();
    for parameter in parameters {
        let constrained = constraint_values_for(parameter_relations, &parameter.name);
        if let Some(choice) = constrained.choose(rng) {
            if let ConstraintValue::Value(value) = choice {
                result.insert(parameter.name.clone(), value.clone());
            }
            continue;
        }
        let schema = resolve_schema(&parameter.schema);
        result.insert(parameter.name.clone(), get_valid_value(&schema, faker, rng)?);
    }
    Ok(result)
}

/// A valid JSON body for `schema`, honoring the relations of `dto_class`.
///
/// # Errors
/// Schema errors and collaborator errors while resolving dependent ids.
pub fn get_json_data_for_dto_class<R: Rng>(
    schema: &Value,
    dto_class: &DtoClass,
    operation_id: &str,
    collaborator: &dyn ApiCollaborator,
    faker: &LocalizedFaker,
    rng: &mut R,
) -> Result<Map<String, Value>, DataGenError> {
    let mut json_data = Map::new();
    let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
        return Ok(json_data);
    };

    for (property_name, property_schema) in properties {
        let value_schema = pick_typed_alternative(&resolve_schema(property_schema), rng);

        let constrained = constraint_values_for(&dto_class.relations, property_name);
        if !constrained.is_empty() {
            if constrained.iter().any(ConstraintValue::is_ignore) {
                continue;
            }
            if let Some(ConstraintValue::Value(value)) = constrained.choose(rng) {
                json_data.insert(property_name.clone(), value.clone());
            }
            continue;
        }

        if let Some(get_path) = dependent_get_path(dto_class, property_name, operation_id) {
            let valid_id = collaborator.get_valid_id_for_endpoint(get_path, HttpMethod::Get)?;
            tracing::debug!("get_dependent_id for {get_path} returned {valid_id}");
            json_data.insert(property_name.clone(), Value::String(valid_id));
            continue;
        }

        let value = match schema_type(&value_schema) {
            Some("object") => {
                let nested =
                    get_json_data_for_dto_class(&value_schema, &DtoClass::default(), "", collaborator, faker, rng)?;
                Value::Object(nested)
            }
            Some("array") if is_object_items(&value_schema) => {
                let items = resolve_schema(value_schema.get("items").unwrap_or(&Value::Null));
                let item = get_json_data_for_dto_class(
                    &items,
                    &DtoClass::default(),
                    operation_id,
                    collaborator,
                    faker,
                    rng,
                )?;
                Value::Array(vec![Value::Object(item)])
            }
            _ => get_valid_value(&value_schema, faker, rng)?,
        };
        json_data.insert(property_name.clone(), value);
    }
    Ok(json_data)
}

fn is_object_items(schema: &Value) -> bool {
    schema
        .get("items")
        .map(resolve_schema)
        .is_some_and(|items| schema_type(&items) == Some("object"))
}

// With several dependencies on one property, the operation decides which applies.
fn dependent_get_path<'a>(dto_class: &'a DtoClass, property_name: &str, operation_id: &str) -> Option<&'a str> {
    let dependencies: Vec<_> = dto_class
        .relations
        .iter()
        .filter_map(|relation| match relation {
            Relation::IdDependency(dependency) if dependency.property_name == property_name => Some(dependency),
            _ => None,
        })
        .collect();

    match dependencies.as_slice() {
        [] => None,
        [single] => Some(single.get_path.as_str()),
        several => {
            let mut matching = several
                .iter()
                .filter(|d| d.operation_id.as_deref() == Some(operation_id));
            match (matching.next(), matching.next()) {
                (Some(dependency), None) => Some(dependency.get_path.as_str()),
                _ => None,
            }
        }
    }
}

/// The dto's data with every unique-value constraint applied, so a resource
/// created from it conflicts with an existing one.
///
/// # Errors
/// `DataGenError::ConstraintMismatch` if the dto has no `UniquePropertyValueConstraint`.
pub fn conflict_json_data(dto: &Dto) -> Result<Map<String, Value>, DataGenError> {
    let mut json_data = dto.as_dict();
    let mut applied = false;
    for relation in dto.relations() {
        if let Relation::UniquePropertyValueConstraint(unique) = relation {
            json_data.insert(unique.property_name.clone(), unique.value.clone());
            applied = true;
        }
    }
    if !applied {
        return Err(DataGenError::ConstraintMismatch(format!(
            "No UniquePropertyValueConstraint in the relations of dto '{}'.",
            dto.name()
        )));
    }
    Ok(json_data)
}

/// Resource ids from a GET response: a list of resources, a HAL `_embedded`
/// list, a single resource or an `items` list.
///
/// # Errors
/// `DataGenError::ConstraintMismatch` if the response has none of these shapes
/// or a resource lacks `id_property`.
pub fn get_ids_from_response(response: &Value, id_property: &str) -> Result<Vec<Value>, DataGenError> {
    if let Value::Array(items) = response {
        return ids_of(items, id_property);
    }
    if let Some(embedded) = response.get("_embedded").and_then(Value::as_object)
        && let Some(items) = embedded.values().find_map(Value::as_array)
    {
        return ids_of(items, id_property);
    }
    if let Some(id) = response.get(id_property).filter(|id| !id.is_null()) {
        return Ok(vec![id.clone()]);
    }
    if let Some(items) = response.get("items").and_then(Value::as_array) {
        return ids_of(items, id_property);
    }
    Err(DataGenError::ConstraintMismatch(format!(
        "no '{id_property}' values found in {response}"
    )))
}

fn ids_of(items: &[Value], id_property: &str) -> Result<Vec<Value>, DataGenError> {
    items
        .iter()
        .map(|item| {
            item.get(id_property)
                .cloned()
                .ok_or_else(|| DataGenError::ConstraintMismatch(format!("'{id_property}' missing in {item}")))
        })
        .collect()
}

/// Name for the dto of an operation without a mapped class, e.g.
/// `PostEmployeesEmployee_id` for `post /employees/{employee_id}`.
#[must_use]
pub fn get_dto_cls_name(endpoint: &str, method: HttpMethod) -> String {
    let mut name = capitalize(method.as_str());
    for part in endpoint.split('/') {
        let part: String = part.chars().filter(|c| *c != '{' && *c != '}').collect();
        name.push_str(&capitalize(&part));
    }
    name
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}
