use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use crate::error::DataGenError;
use crate::faker::LocalizedFaker;
use crate::files_reader::load_typed;
use crate::invalidation;
use crate::openapi::HttpMethod;
use crate::relations::{PathPropertiesConstraint, Relation, get_relations_for_error_code};

/// The static part of a data transfer object: the relations of one operation's
/// request body and of its query / header parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DtoClass {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub relations: Vec<Relation>,
    #[serde(default)]
    pub parameter_relations: Vec<Relation>,
}

impl DtoClass {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        DtoClass {
            name: name.into(),
            ..DtoClass::default()
        }
    }

    #[must_use]
    pub fn with_relations(mut self, relations: Vec<Relation>) -> Self {
        self.relations = relations;
        self
    }

    #[must_use]
    pub fn with_parameter_relations(mut self, relations: Vec<Relation>) -> Self {
        self.parameter_relations = relations;
        self
    }

    /// Body relations whose violation yields `status_code`.
    #[must_use]
    pub fn get_relations_for_error_code(&self, status_code: u16) -> Vec<&Relation> {
        get_relations_for_error_code(&self.relations, status_code)
    }

    /// Parameter relations whose violation yields `status_code`.
    #[must_use]
    pub fn get_parameter_relations_for_error_code(&self, status_code: u16) -> Vec<&Relation> {
        get_relations_for_error_code(&self.parameter_relations, status_code)
    }

    /// Fixed paths declared for the endpoint, if any.
    #[must_use]
    pub fn path_constraints(&self) -> Vec<&PathPropertiesConstraint> {
        self.relations
            .iter()
            .filter_map(|relation| match relation {
                Relation::PathPropertiesConstraint(path) => Some(path),
                _ => None,
            })
            .collect()
    }
}

/// A `DtoClass` together with the property values of one request body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dto {
    class: Arc<DtoClass>,
    properties: Map<String, Value>,
}

impl Dto {
    #[must_use]
    pub fn new(class: Arc<DtoClass>, properties: Map<String, Value>) -> Self {
        Dto { class, properties }
    }

    #[must_use]
    pub fn class(&self) -> &Arc<DtoClass> {
        &self.class
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.class.name
    }

    #[must_use]
    pub fn properties(&self) -> &Map<String, Value> {
        &self.properties
    }

    /// A copy of the property values as a JSON object.
    #[must_use]
    pub fn as_dict(&self) -> Map<String, Value> {
        self.properties.clone()
    }

    #[must_use]
    pub fn relations(&self) -> &[Relation] {
        &self.class.relations
    }

    #[must_use]
    pub fn parameter_relations(&self) -> &[Relation] {
        &self.class.parameter_relations
    }

    #[must_use]
    pub fn get_relations_for_error_code(&self, status_code: u16) -> Vec<&Relation> {
        self.class.get_relations_for_error_code(status_code)
    }

    #[must_use]
    pub fn get_parameter_relations_for_error_code(&self, status_code: u16) -> Vec<&Relation> {
        self.class.get_parameter_relations_for_error_code(status_code)
    }

    /// The property values with one property set to an invalid value or type.
    ///
    /// # Errors
    /// See [`invalidation::get_invalidated_data`].
    pub fn get_invalidated_data<R: Rng>(
        &self,
        schema: &Value,
        status_code: u16,
        invalid_property_default_code: u16,
        faker: &LocalizedFaker,
        rng: &mut R,
    ) -> Result<Map<String, Value>, DataGenError> {
        invalidation::get_invalidated_data(
            self,
            schema,
            status_code,
            invalid_property_default_code,
            faker,
            rng,
        )
    }
}

/// Name of the property identifying resources on an endpoint, with an optional
/// function that turns a returned id into the form used in urls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdMapping {
    pub property_name: String,
    #[serde(skip)]
    pub transformer: Option<fn(&str) -> String>,
}

impl IdMapping {
    #[must_use]
    pub fn new(property_name: impl Into<String>) -> Self {
        IdMapping {
            property_name: property_name.into(),
            transformer: None,
        }
    }

    #[must_use]
    pub fn with_transformer(mut self, transformer: fn(&str) -> String) -> Self {
        self.transformer = Some(transformer);
        self
    }

    #[must_use]
    pub fn transform(&self, id: &str) -> String {
        self.transformer.map_or_else(|| id.to_owned(), |transform| transform(id))
    }
}

#[derive(Debug, Deserialize)]
struct MappingsFile {
    #[serde(default)]
    dtos: Vec<DtoEntry>,
    #[serde(default)]
    ids: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct DtoEntry {
    endpoint: String,
    method: HttpMethod,
    #[serde(flatten)]
    class: DtoClass,
}

/// Registry of the `DtoClass` per `(endpoint, method)` and the id property per endpoint.
#[derive(Debug, Clone)]
pub struct DtoMapping {
    dto_classes: HashMap<(String, HttpMethod), Arc<DtoClass>>,
    id_mappings: HashMap<String, IdMapping>,
    default_class: Arc<DtoClass>,
    default_id_property_name: String,
}

impl Default for DtoMapping {
    fn default() -> Self {
        DtoMapping::new("id")
    }
}

impl DtoMapping {
    #[must_use]
    pub fn new(default_id_property_name: impl Into<String>) -> Self {
        DtoMapping {
            dto_classes: HashMap::new(),
            id_mappings: HashMap::new(),
            default_class: Arc::new(DtoClass::default()),
            default_id_property_name: default_id_property_name.into(),
        }
    }

    /// Loads mappings from a JSON or YAML file:
    ///
    /// ```yaml
    /// dtos:
    ///   - endpoint: /employees
    ///     method: post
    ///     relations:
    ///       - kind: IdDependency
    ///         property_name: wagegroup_id
    ///         get_path: /wagegroups
    /// ids:
    ///   /wagegroups: wagegroup_id
    /// ```
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or does not match the layout above.
    pub fn from_path(path: &Path, default_id_property_name: &str) -> Result<Self, DataGenError> {
        let file: MappingsFile = load_typed(path)?;
        let mut mapping = DtoMapping::new(default_id_property_name);
        for entry in file.dtos {
            mapping.insert_dto_class(&entry.endpoint, entry.method, entry.class);
        }
        for (endpoint, property_name) in file.ids {
            mapping.insert_id_mapping(&endpoint, IdMapping::new(property_name));
        }
        tracing::debug!(
            "- loaded {} dto mapping(s) and {} id mapping(s)",
            mapping.dto_classes.len(),
            mapping.id_mappings.len()
        );
        Ok(mapping)
    }

    pub fn insert_dto_class(&mut self, endpoint: &str, method: HttpMethod, class: DtoClass) {
        self.dto_classes
            .insert((endpoint.to_owned(), method), Arc::new(class));
    }

    pub fn insert_id_mapping(&mut self, endpoint: &str, id_mapping: IdMapping) {
        self.id_mappings.insert(endpoint.to_owned(), id_mapping);
    }

    /// The registered class, or an empty default class for unmapped operations.
    #[must_use]
    pub fn get_dto_class(&self, endpoint: &str, method: HttpMethod) -> Arc<DtoClass> {
        if let Some(class) = self.dto_classes.get(&(endpoint.to_owned(), method)) {
            return Arc::clone(class);
        }
        tracing::debug!("No Dto mapping for {endpoint} {method}.");
        Arc::clone(&self.default_class)
    }

    /// The id mapping for `endpoint`, or the default id property name.
    #[must_use]
    pub fn get_id_property_name(&self, endpoint: &str) -> IdMapping {
        if let Some(mapping) = self.id_mappings.get(endpoint) {
            return mapping.clone();
        }
        tracing::debug!(
            "No id mapping for {endpoint} ('{}' will be used)",
            self.default_id_property_name
        );
        IdMapping::new(self.default_id_property_name.clone())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::relations::{ConstraintValue, IdDependency, PropertyValueConstraint};
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_unmapped_lookups_use_defaults() {
        let mapping = DtoMapping::new("uuid");
        let class = mapping.get_dto_class("/nothing", HttpMethod::Get);
        assert!(class.relations.is_empty());
        assert!(class.parameter_relations.is_empty());
        assert_eq!(mapping.get_id_property_name("/nothing").property_name, "uuid");
    }

    #[test]
    fn test_registered_class_is_shared() {
        let mut mapping = DtoMapping::default();
        mapping.insert_dto_class(
            "/employees",
            HttpMethod::Post,
            DtoClass::new("PostEmployees")
                .with_relations(vec![IdDependency::new("wagegroup_id", "/wagegroups").into()]),
        );
        let first = mapping.get_dto_class("/employees", HttpMethod::Post);
        let second = mapping.get_dto_class("/employees", HttpMethod::Post);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.name, "PostEmployees");
        assert!(mapping.get_dto_class("/employees", HttpMethod::Get).relations.is_empty());
    }

    #[test]
    fn test_id_mapping_transformer() {
        fn strip_prefix(id: &str) -> String {
            id.trim_start_matches("emp-").to_owned()
        }
        let mapping = IdMapping::new("employee_id").with_transformer(strip_prefix);
        assert_eq!(mapping.transform("emp-42"), "42");
        assert_eq!(IdMapping::new("id").transform("emp-42"), "emp-42");
    }

    #[test]
    fn test_dto_relations_for_error_code() {
        let class = DtoClass::new("x")
            .with_relations(vec![
                PropertyValueConstraint::new("a", vec![ConstraintValue::Value(json!(1))])
                    .with_error_code(400)
                    .into(),
            ])
            .with_parameter_relations(vec![
                PropertyValueConstraint::new("q", vec![ConstraintValue::Ignore])
                    .with_invalid_value(ConstraintValue::Value(json!("bad")), 403)
                    .into(),
            ]);
        let dto = Dto::new(Arc::new(class), Map::new());
        assert_eq!(dto.get_relations_for_error_code(400).len(), 1);
        assert!(dto.get_relations_for_error_code(422).is_empty());
        assert_eq!(dto.get_parameter_relations_for_error_code(403).len(), 1);
        assert_eq!(dto.get_parameter_relations_for_error_code(422).len(), 1);
    }

    #[test]
    fn test_mapping_from_yaml_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("mappings.yaml");
        fs::write(
            &path,
            r"
dtos:
  - endpoint: /employees
    method: post
    name: PostEmployees
    relations:
      - kind: IdDependency
        property_name: wagegroup_id
        get_path: /wagegroups
      - kind: UniquePropertyValueConstraint
        property_name: name
        value: Alice
        error_code: 409
ids:
  /wagegroups: wagegroup_id
",
        )
        .unwrap();

        let mapping = DtoMapping::from_path(&path, "id").unwrap();
        let class = mapping.get_dto_class("/employees", HttpMethod::Post);
        assert_eq!(class.name, "PostEmployees");
        assert_eq!(class.relations.len(), 2);
        assert_eq!(class.relations[1].error_code(), 409);
        assert_eq!(
            mapping.get_id_property_name("/wagegroups").property_name,
            "wagegroup_id"
        );
    }
}
