use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::sync::OnceLock;

use crate::dto::Dto;
use crate::openapi::HttpMethod;
use crate::schema_resolver::schema_type;

// Keywords that give a string / array parameter a violable restriction.
const RESTRICTION_KEYWORDS: &[&str] = &["enum", "minLength", "maxLength", "minItems", "maxItems"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterLocation {
    Query,
    Header,
    Path,
    Cookie,
}

/// An OpenAPI operation parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSpec {
    pub name: String,
    #[serde(rename = "in")]
    pub location: ParameterLocation,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub schema: Value,
}

impl ParameterSpec {
    #[must_use]
    pub fn new(name: impl Into<String>, location: ParameterLocation, schema: Value) -> Self {
        ParameterSpec {
            name: name.into(),
            location,
            required: false,
            schema,
        }
    }

    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Whether a request can be made invalid through this parameter alone: by a
    /// value of the wrong type, by breaking a restriction, or by leaving it out.
    #[must_use]
    pub fn can_be_invalidated(&self) -> bool {
        let schema_kind = schema_type(&self.schema);
        if schema_kind.is_some_and(|kind| !is_string_like(kind)) {
            return true;
        }
        if RESTRICTION_KEYWORDS
            .iter()
            .any(|keyword| self.schema.get(keyword).is_some())
        {
            return true;
        }
        if self.required {
            return true;
        }
        schema_kind == Some("array")
            && self
                .schema
                .get("items")
                .and_then(schema_type)
                .is_some_and(|kind| !is_string_like(kind))
    }
}

// Any scalar can be written as a string, so string-typed values only fail on restrictions.
fn is_string_like(kind: &str) -> bool {
    matches!(kind, "string" | "array" | "object")
}

/// Valid request data for one operation: the body `Dto`, its schema and the
/// query / header parameters.
#[derive(Debug, Default)]
pub struct RequestData {
    dto: Dto,
    dto_schema: Value,
    parameters: Vec<ParameterSpec>,
    params: Map<String, Value>,
    headers: Map<String, Value>,
    invalidatable_params: OnceLock<BTreeSet<String>>,
    invalidatable_headers: OnceLock<BTreeSet<String>>,
}

impl Clone for RequestData {
    fn clone(&self) -> Self {
        RequestData::new(
            self.dto.clone(),
            self.dto_schema.clone(),
            self.parameters.clone(),
            self.params.clone(),
            self.headers.clone(),
        )
    }
}

impl RequestData {
    #[must_use]
    pub fn new(
        dto: Dto,
        dto_schema: Value,
        parameters: Vec<ParameterSpec>,
        params: Map<String, Value>,
        headers: Map<String, Value>,
    ) -> Self {
        RequestData {
            dto,
            dto_schema,
            parameters,
            params,
            headers,
            invalidatable_params: OnceLock::new(),
            invalidatable_headers: OnceLock::new(),
        }
    }

    #[must_use]
    pub fn dto(&self) -> &Dto {
        &self.dto
    }

    #[must_use]
    pub fn dto_schema(&self) -> &Value {
        &self.dto_schema
    }

    #[must_use]
    pub fn parameters(&self) -> &[ParameterSpec] {
        &self.parameters
    }

    #[must_use]
    pub fn params(&self) -> &Map<String, Value> {
        &self.params
    }

    #[must_use]
    pub fn headers(&self) -> &Map<String, Value> {
        &self.headers
    }

    #[must_use]
    pub fn parameter(&self, name: &str) -> Option<&ParameterSpec> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// Whether the body holds properties that the schema does not require.
    #[must_use]
    pub fn has_optional_properties(&self) -> bool {
        let required = self.required_property_names();
        self.dto
            .properties()
            .keys()
            .any(|name| !required.contains(name.as_str()))
    }

    /// Whether any of the provided query parameters is optional.
    #[must_use]
    pub fn has_optional_params(&self) -> bool {
        self.has_optional(ParameterLocation::Query, &self.params)
    }

    /// Whether any of the provided headers is optional.
    #[must_use]
    pub fn has_optional_headers(&self) -> bool {
        self.has_optional(ParameterLocation::Header, &self.headers)
    }

    /// Query parameters that can be invalidated, computed on first use.
    #[must_use]
    pub fn params_that_can_be_invalidated(&self) -> &BTreeSet<String> {
        self.invalidatable_params
            .get_or_init(|| self.invalidatable(ParameterLocation::Query))
    }

    /// Headers that can be invalidated, computed on first use.
    #[must_use]
    pub fn headers_that_can_be_invalidated(&self) -> &BTreeSet<String> {
        self.invalidatable_headers
            .get_or_init(|| self.invalidatable(ParameterLocation::Header))
    }

    /// The body with only the properties the schema requires.
    #[must_use]
    pub fn get_required_properties_dict(&self) -> Map<String, Value> {
        let required = self.required_property_names();
        self.dto
            .properties()
            .iter()
            .filter(|(name, _)| required.contains(name.as_str()))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }

    #[must_use]
    pub fn get_required_params(&self) -> Map<String, Value> {
        self.required_only(&self.params)
    }

    #[must_use]
    pub fn get_required_headers(&self) -> Map<String, Value> {
        self.required_only(&self.headers)
    }

    /// Bundles the data into the values needed to send a request.
    #[must_use]
    pub fn to_request_values(&self, url: impl Into<String>, method: HttpMethod) -> RequestValues {
        let has_body =
            self.dto_schema.get("properties").is_some() || !self.dto.properties().is_empty();
        let json_data = has_body.then(|| self.dto.as_dict());
        RequestValues {
            url: url.into(),
            method,
            params: self.params.clone(),
            headers: self.headers.clone(),
            json_data,
        }
    }

    fn required_property_names(&self) -> BTreeSet<&str> {
        self.dto_schema
            .get("required")
            .and_then(Value::as_array)
            .map(|names| names.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }

    fn has_optional(&self, location: ParameterLocation, provided: &Map<String, Value>) -> bool {
        self.parameters
            .iter()
            .filter(|p| p.location == location && !p.required)
            .any(|p| provided.contains_key(&p.name))
    }

    fn invalidatable(&self, location: ParameterLocation) -> BTreeSet<String> {
        self.parameters
            .iter()
            .filter(|p| p.location == location && p.can_be_invalidated())
            .map(|p| p.name.clone())
            .collect()
    }

    fn required_only(&self, values: &Map<String, Value>) -> Map<String, Value> {
        values
            .iter()
            .filter(|(name, _)| {
                self.parameters
                    .iter()
                    .any(|p| p.required && &p.name == *name)
            })
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }
}

/// Everything a transport needs to perform one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestValues {
    pub url: String,
    pub method: HttpMethod,
    pub params: Map<String, Value>,
    pub headers: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json_data: Option<Map<String, Value>>,
}
