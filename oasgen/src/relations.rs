//! Declarative relations between a resource's properties and the rest of the API.
//!
//! Relations are authored per resource (in code, or in a mappings file) and tell
//! the data generator which values are allowed, which ids come from other
//! resources and which status code a violation of each relation provokes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Marker used in serialized mappings for [`ConstraintValue::Ignore`].
pub const IGNORE_MARKER: &str = "$IGNORE";

pub const DEFAULT_ERROR_CODE: u16 = 422;
pub const DEFAULT_PATH_ERROR_CODE: u16 = 404;

/// One allowed value of a constrained property or parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Value", into = "Value")]
pub enum ConstraintValue {
    Value(Value),
    /// The property or parameter must be left out of the request.
    Ignore,
}

impl ConstraintValue {
    #[must_use]
    pub fn is_ignore(&self) -> bool {
        matches!(self, ConstraintValue::Ignore)
    }

    #[must_use]
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            ConstraintValue::Value(value) => Some(value),
            ConstraintValue::Ignore => None,
        }
    }
}

impl From<Value> for ConstraintValue {
    fn from(value: Value) -> Self {
        match value {
            Value::String(ref s) if s == IGNORE_MARKER => ConstraintValue::Ignore,
            other => ConstraintValue::Value(other),
        }
    }
}

impl From<ConstraintValue> for Value {
    fn from(value: ConstraintValue) -> Self {
        match value {
            ConstraintValue::Value(value) => value,
            ConstraintValue::Ignore => Value::String(IGNORE_MARKER.to_owned()),
        }
    }
}

fn default_id_property() -> String {
    "id".to_owned()
}

fn default_error_code() -> u16 {
    DEFAULT_ERROR_CODE
}

fn default_path_error_code() -> u16 {
    DEFAULT_PATH_ERROR_CODE
}

/// The fully resolved path to use for an endpoint instead of looking up ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathPropertiesConstraint {
    pub path: String,
    #[serde(default = "default_id_property")]
    pub property_name: String,
    #[serde(default = "default_path_error_code")]
    pub error_code: u16,
}

impl PathPropertiesConstraint {
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        PathPropertiesConstraint {
            path: path.into(),
            property_name: default_id_property(),
            error_code: DEFAULT_PATH_ERROR_CODE,
        }
    }
}

/// The values `property_name` may take.
///
/// `invalid_value`, when set, is sent as-is to provoke `invalid_value_error_code`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyValueConstraint {
    pub property_name: String,
    pub values: Vec<ConstraintValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invalid_value: Option<ConstraintValue>,
    #[serde(default = "default_error_code")]
    pub invalid_value_error_code: u16,
    #[serde(default = "default_error_code")]
    pub error_code: u16,
}

impl PropertyValueConstraint {
    #[must_use]
    pub fn new(property_name: impl Into<String>, values: Vec<ConstraintValue>) -> Self {
        PropertyValueConstraint {
            property_name: property_name.into(),
            values,
            invalid_value: None,
            invalid_value_error_code: DEFAULT_ERROR_CODE,
            error_code: DEFAULT_ERROR_CODE,
        }
    }

    #[must_use]
    pub fn with_invalid_value(mut self, invalid_value: ConstraintValue, error_code: u16) -> Self {
        self.invalid_value = Some(invalid_value);
        self.invalid_value_error_code = error_code;
        self
    }

    #[must_use]
    pub fn with_error_code(mut self, error_code: u16) -> Self {
        self.error_code = error_code;
        self
    }

    /// The explicit invalid value, if one is set for `status_code`.
    #[must_use]
    pub fn invalid_value_for(&self, status_code: u16) -> Option<&ConstraintValue> {
        self.invalid_value
            .as_ref()
            .filter(|_| self.invalid_value_error_code == status_code)
    }

    #[must_use]
    pub fn contains_ignore(&self) -> bool {
        self.values.iter().any(ConstraintValue::is_ignore)
    }
}

/// A valid id for `property_name` can be retrieved (GET) from `get_path`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdDependency {
    pub property_name: String,
    pub get_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<String>,
    #[serde(default = "default_error_code")]
    pub error_code: u16,
}

impl IdDependency {
    #[must_use]
    pub fn new(property_name: impl Into<String>, get_path: impl Into<String>) -> Self {
        IdDependency {
            property_name: property_name.into(),
            get_path: get_path.into(),
            operation_id: None,
            error_code: DEFAULT_ERROR_CODE,
        }
    }

    #[must_use]
    pub fn with_operation_id(mut self, operation_id: impl Into<String>) -> Self {
        self.operation_id = Some(operation_id.into());
        self
    }

    #[must_use]
    pub fn with_error_code(mut self, error_code: u16) -> Self {
        self.error_code = error_code;
        self
    }
}

/// A resource referring to this resource's id can be created (POST) at `post_path`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdReference {
    pub property_name: String,
    pub post_path: String,
    #[serde(default = "default_error_code")]
    pub error_code: u16,
}

impl IdReference {
    #[must_use]
    pub fn new(property_name: impl Into<String>, post_path: impl Into<String>) -> Self {
        IdReference {
            property_name: property_name.into(),
            post_path: post_path.into(),
            error_code: DEFAULT_ERROR_CODE,
        }
    }

    #[must_use]
    pub fn with_error_code(mut self, error_code: u16) -> Self {
        self.error_code = error_code;
        self
    }
}

/// `value` of `property_name` must be unique within the resource collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UniquePropertyValueConstraint {
    pub property_name: String,
    pub value: Value,
    #[serde(default = "default_error_code")]
    pub error_code: u16,
}

impl UniquePropertyValueConstraint {
    #[must_use]
    pub fn new(property_name: impl Into<String>, value: Value) -> Self {
        UniquePropertyValueConstraint {
            property_name: property_name.into(),
            value,
            error_code: DEFAULT_ERROR_CODE,
        }
    }

    #[must_use]
    pub fn with_error_code(mut self, error_code: u16) -> Self {
        self.error_code = error_code;
        self
    }
}

/// A resource relation or restriction, tagged by `kind` when serialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Relation {
    PathPropertiesConstraint(PathPropertiesConstraint),
    PropertyValueConstraint(PropertyValueConstraint),
    IdDependency(IdDependency),
    IdReference(IdReference),
    UniquePropertyValueConstraint(UniquePropertyValueConstraint),
}

impl Relation {
    #[must_use]
    pub fn property_name(&self) -> &str {
        match self {
            Relation::PathPropertiesConstraint(r) => &r.property_name,
            Relation::PropertyValueConstraint(r) => &r.property_name,
            Relation::IdDependency(r) => &r.property_name,
            Relation::IdReference(r) => &r.property_name,
            Relation::UniquePropertyValueConstraint(r) => &r.property_name,
        }
    }

    #[must_use]
    pub fn error_code(&self) -> u16 {
        match self {
            Relation::PathPropertiesConstraint(r) => r.error_code,
            Relation::PropertyValueConstraint(r) => r.error_code,
            Relation::IdDependency(r) => r.error_code,
            Relation::IdReference(r) => r.error_code,
            Relation::UniquePropertyValueConstraint(r) => r.error_code,
        }
    }

    /// Whether violating this relation is expected to yield `status_code`.
    #[must_use]
    pub fn applies_to(&self, status_code: u16) -> bool {
        if self.error_code() == status_code {
            return true;
        }
        matches!(self, Relation::PropertyValueConstraint(r) if r.invalid_value_for(status_code).is_some())
    }

    #[must_use]
    pub fn as_property_value_constraint(&self) -> Option<&PropertyValueConstraint> {
        match self {
            Relation::PropertyValueConstraint(r) => Some(r),
            _ => None,
        }
    }
}

impl From<PathPropertiesConstraint> for Relation {
    fn from(r: PathPropertiesConstraint) -> Self {
        Relation::PathPropertiesConstraint(r)
    }
}

impl From<PropertyValueConstraint> for Relation {
    fn from(r: PropertyValueConstraint) -> Self {
        Relation::PropertyValueConstraint(r)
    }
}

impl From<IdDependency> for Relation {
    fn from(r: IdDependency) -> Self {
        Relation::IdDependency(r)
    }
}

impl From<IdReference> for Relation {
    fn from(r: IdReference) -> Self {
        Relation::IdReference(r)
    }
}

impl From<UniquePropertyValueConstraint> for Relation {
    fn from(r: UniquePropertyValueConstraint) -> Self {
        Relation::UniquePropertyValueConstraint(r)
    }
}

/// Relations whose violation yields `status_code`: those declared with that
/// `error_code`, and value constraints with an explicit invalid value for it.
#[must_use]
pub fn get_relations_for_error_code(relations: &[Relation], status_code: u16) -> Vec<&Relation> {
    relations
        .iter()
        .filter(|relation| relation.applies_to(status_code))
        .collect()
}

/// All values the property-value constraints on `property_name` allow, in declaration order.
#[must_use]
pub fn constraint_values_for<'a, I>(relations: I, property_name: &str) -> Vec<ConstraintValue>
where
    I: IntoIterator<Item = &'a Relation>,
{
    relations
        .into_iter()
        .filter_map(Relation::as_property_value_constraint)
        .filter(|r| r.property_name == property_name)
        .flat_map(|r| r.values.iter().cloned())
        .collect()
}
