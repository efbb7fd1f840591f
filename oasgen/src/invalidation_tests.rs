#![allow(clippy::unwrap_used, clippy::expect_used)]

use rand::SeedableRng;
use rand::rngs::StdRng;
use serde_json::{Map, Value, json};
use std::cell::RefCell;
use std::sync::Arc;

use crate::dto::{Dto, DtoClass};
use crate::error::DataGenError;
use crate::faker::{FakerLocale, LocalizedFaker};
use crate::invalidation::{
    ensure_parameter_in_parameters, get_invalid_json_data, get_invalidated_data,
    get_invalidated_parameters,
};
use crate::openapi::{ApiCollaborator, HttpMethod};
use crate::relations::{
    ConstraintValue, IdDependency, IdReference, PathPropertiesConstraint, PropertyValueConstraint,
    Relation, UniquePropertyValueConstraint,
};
use crate::request_data::{ParameterLocation, ParameterSpec, RequestData};

const DEFAULT_CODE: u16 = 422;

fn object(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap()
}

fn dto(relations: Vec<Relation>, properties: Value) -> Dto {
    Dto::new(
        Arc::new(DtoClass::new("PostEmployees").with_relations(relations)),
        object(properties),
    )
}

fn employee_schema() -> Value {
    json!({
        "type": "object",
        "required": ["name", "wagegroup_id"],
        "properties": {
            "name": {"type": "string", "maxLength": 20},
            "wagegroup_id": {"type": "string"},
            "level": {"type": "integer", "minimum": 1, "maximum": 5},
            "nickname": {"type": "string"}
        }
    })
}

fn invalidate(dto: &Dto, schema: &Value, status_code: u16, seed: u64) -> Result<Map<String, Value>, DataGenError> {
    let faker = LocalizedFaker::new(FakerLocale::En);
    get_invalidated_data(dto, schema, status_code, DEFAULT_CODE, &faker, &mut StdRng::seed_from_u64(seed))
}

#[test]
fn test_id_dependency_gets_fresh_token() {
    let schema = json!({"type": "object", "properties": {"wagegroup_id": {"type": "string"}}});
    let dto = dto(
        vec![IdDependency::new("wagegroup_id", "/wagegroups").into()],
        json!({"wagegroup_id": "wg-1"}),
    );
    let data = invalidate(&dto, &schema, 422, 1).unwrap();
    let token = data["wagegroup_id"].as_str().unwrap();
    assert_ne!(token, "wg-1");
    assert_eq!(token.len(), 32);
    assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
}

#[test]
fn test_explicit_invalid_value() {
    let dto = dto(
        vec![
            PropertyValueConstraint::new("level", vec![ConstraintValue::Value(json!(1)), ConstraintValue::Value(json!(2))])
                .with_invalid_value(ConstraintValue::Value(json!(99)), 400)
                .into(),
        ],
        json!({"name": "Ann", "wagegroup_id": "wg-1", "level": 1}),
    );
    let data = invalidate(&dto, &employee_schema(), 400, 3).unwrap();
    assert_eq!(data["level"], json!(99));
    assert_eq!(data["name"], json!("Ann"));
}

#[test]
fn test_ignore_invalid_value_removes_property() {
    let dto = dto(
        vec![
            PropertyValueConstraint::new("nickname", vec![ConstraintValue::Value(json!("nick"))])
                .with_invalid_value(ConstraintValue::Ignore, 400)
                .into(),
        ],
        json!({"name": "Ann", "wagegroup_id": "wg-1", "nickname": "nick"}),
    );
    let data = invalidate(&dto, &employee_schema(), 400, 3).unwrap();
    assert!(!data.contains_key("nickname"));
    assert_eq!(data.len(), 2);
}

#[test]
fn test_ignore_only_constraint_sends_absent_property() {
    let schema = json!({"type": "object", "properties": {"flag": {"type": "string"}}});
    let dto = dto(
        vec![PropertyValueConstraint::new("flag", vec![ConstraintValue::Ignore]).into()],
        json!({}),
    );
    for seed in 0..10 {
        let data = invalidate(&dto, &schema, DEFAULT_CODE, seed).unwrap();
        assert_ne!(&data, dto.properties(), "seed {seed}");
        assert!(data["flag"].is_string());
    }
}

#[test]
fn test_constraint_values_drive_invalid_value() {
    let dto = dto(
        vec![
            PropertyValueConstraint::new(
                "name",
                vec![ConstraintValue::Value(json!("Ann")), ConstraintValue::Value(json!("Bob"))],
            )
            .with_error_code(409)
            .into(),
        ],
        json!({"name": "Ann", "wagegroup_id": "wg-1"}),
    );
    let data = invalidate(&dto, &employee_schema(), 409, 5).unwrap();
    assert_eq!(data["name"], json!("AnnBobAnnBob"));
}

#[test]
fn test_default_code_uses_bounds() {
    let schema = json!({"type": "object", "properties": {"level": {"type": "integer", "minimum": 0, "maximum": 10}}});
    let dto = dto(vec![], json!({"level": 5}));
    let data = invalidate(&dto, &schema, DEFAULT_CODE, 8).unwrap();
    assert_eq!(data["level"], json!(-1));
}

#[test]
fn test_absent_optional_property_is_added_invalid() {
    let schema = json!({"type": "object", "properties": {"nickname": {"type": "string"}}});
    let dto = dto(vec![], json!({}));
    let data = invalidate(&dto, &schema, DEFAULT_CODE, 2).unwrap();
    let value = &data["nickname"];
    assert!(!value.is_string() || value == &json!("null"));
}

#[test]
fn test_data_always_changes() {
    let dto = dto(vec![], json!({"name": "Ann", "wagegroup_id": "wg-1", "level": 3, "nickname": "A"}));
    for seed in 0..40 {
        let data = invalidate(&dto, &employee_schema(), DEFAULT_CODE, seed).unwrap();
        assert_ne!(&data, dto.properties(), "seed {seed}");
    }
}

#[test]
fn test_no_candidates() {
    let dto = dto(
        vec![
            PathPropertiesConstraint::new("/employees/1").into(),
            UniquePropertyValueConstraint::new("email", json!("a@b.c")).with_error_code(418).into(),
        ],
        json!({"name": "Ann"}),
    );
    assert!(matches!(
        invalidate(&dto, &employee_schema(), 404, 1),
        Err(DataGenError::NoInvalidationTarget(_))
    ));
    // "email" is not a property of the schema, so the relation is dropped.
    assert!(matches!(
        invalidate(&dto, &employee_schema(), 418, 1),
        Err(DataGenError::NoInvalidationTarget(_))
    ));
    assert!(matches!(
        invalidate(&dto, &employee_schema(), 500, 1),
        Err(DataGenError::NoInvalidationTarget(_))
    ));
}

fn request_data(parameter_relations: Vec<Relation>) -> RequestData {
    let parameters = vec![
        ParameterSpec::new("limit", ParameterLocation::Query, json!({"type": "integer", "maximum": 100})),
        ParameterSpec::new("sort", ParameterLocation::Query, json!({"type": "string", "enum": ["asc", "desc"]})),
        ParameterSpec::new("X-Tenant", ParameterLocation::Header, json!({"type": "string"})).required(),
    ];
    let dto = Dto::new(
        Arc::new(DtoClass::new("GetEmployees").with_parameter_relations(parameter_relations)),
        Map::new(),
    );
    RequestData::new(
        dto,
        json!({}),
        parameters,
        object(json!({"limit": 10})),
        object(json!({"X-Tenant": "acme"})),
    )
}

fn invalidate_parameters(
    data: &RequestData,
    status_code: u16,
    seed: u64,
) -> Result<(Map<String, Value>, Map<String, Value>), DataGenError> {
    let faker = LocalizedFaker::new(FakerLocale::En);
    get_invalidated_parameters(status_code, data, DEFAULT_CODE, &faker, &mut StdRng::seed_from_u64(seed))
}

#[test]
fn test_parameters_default_code_changes_one_parameter() {
    let data = request_data(vec![]);
    for seed in 0..20 {
        let (params, headers) = invalidate_parameters(&data, DEFAULT_CODE, seed).unwrap();
        let params_changed = &params != data.params();
        let headers_changed = &headers != data.headers();
        assert!(params_changed || headers_changed, "seed {seed}");
    }
}

#[test]
fn test_parameter_explicit_invalid_value() {
    let data = request_data(vec![
        PropertyValueConstraint::new("sort", vec![ConstraintValue::Value(json!("asc"))])
            .with_invalid_value(ConstraintValue::Value(json!("sideways")), 400)
            .into(),
    ]);
    let (params, headers) = invalidate_parameters(&data, 400, 1).unwrap();
    assert_eq!(params["sort"], json!("sideways"));
    assert_eq!(params["limit"], json!(10));
    assert_eq!(&headers, data.headers());
}

#[test]
fn test_parameter_constraint_values() {
    let data = request_data(vec![
        PropertyValueConstraint::new(
            "X-Tenant",
            vec![ConstraintValue::Value(json!("acme")), ConstraintValue::Value(json!("globex"))],
        )
        .with_error_code(401)
        .into(),
    ]);
    let (_, headers) = invalidate_parameters(&data, 401, 1).unwrap();
    assert_eq!(headers["X-Tenant"], json!("acmeglobexacmeglobex"));
}

#[test]
fn test_parameter_with_ignore_invalid_value_is_skipped() {
    let data = request_data(vec![
        PropertyValueConstraint::new("X-Tenant", vec![ConstraintValue::Value(json!("acme"))])
            .with_invalid_value(ConstraintValue::Ignore, 403)
            .into(),
    ]);
    assert!(matches!(
        invalidate_parameters(&data, 403, 1),
        Err(DataGenError::NoInvalidationTarget(_))
    ));
}

#[test]
fn test_ignore_only_parameter_constraint_sends_header() {
    let dto = Dto::new(
        Arc::new(DtoClass::new("GetEmployees").with_parameter_relations(vec![
            PropertyValueConstraint::new("X-Flag", vec![ConstraintValue::Ignore])
                .with_error_code(400)
                .into(),
        ])),
        Map::new(),
    );
    let data = RequestData::new(
        dto,
        json!({}),
        vec![ParameterSpec::new("X-Flag", ParameterLocation::Header, json!({"type": "string"}))],
        Map::new(),
        Map::new(),
    );
    let (params, headers) = invalidate_parameters(&data, 400, 1).unwrap();
    assert!(params.is_empty());
    assert!(headers["X-Flag"].is_string());
}

#[test]
fn test_parameters_without_targets() {
    let empty = RequestData::default();
    assert!(matches!(
        invalidate_parameters(&empty, DEFAULT_CODE, 1),
        Err(DataGenError::NoInvalidationTarget(_))
    ));
    assert!(matches!(
        invalidate_parameters(&request_data(vec![]), 400, 1),
        Err(DataGenError::NoInvalidationTarget(_))
    ));
}

#[test]
fn test_ensure_parameter_uses_constraint_values() {
    let faker = LocalizedFaker::new(FakerLocale::En);
    let parameter = ParameterSpec::new("sort", ParameterLocation::Query, json!({"type": "string"}));
    let mut params = Map::new();
    let mut headers = Map::new();
    ensure_parameter_in_parameters(
        &parameter,
        &mut params,
        &mut headers,
        &[ConstraintValue::Ignore, ConstraintValue::Value(json!("desc"))],
        &faker,
        &mut StdRng::seed_from_u64(1),
    )
    .unwrap();
    assert_eq!(params["sort"], json!("desc"));
    assert!(headers.is_empty());

    let header = ParameterSpec::new("X-Count", ParameterLocation::Header, json!({"type": "integer", "minimum": 7, "maximum": 7}));
    ensure_parameter_in_parameters(&header, &mut params, &mut headers, &[], &faker, &mut StdRng::seed_from_u64(1))
        .unwrap();
    assert_eq!(headers["X-Count"], json!(7));
}

#[derive(Default)]
struct RecordingCollaborator {
    conflicts: RefCell<Vec<(String, Map<String, Value>, u16)>>,
    in_use: RefCell<Vec<(String, String)>>,
    fail: bool,
}

impl ApiCollaborator for RecordingCollaborator {
    fn get_valid_id_for_endpoint(&self, endpoint: &str, _method: HttpMethod) -> Result<String, DataGenError> {
        Ok(format!("id{endpoint}"))
    }

    fn ensure_in_use(&self, url: &str, relation: &IdReference) -> Result<(), DataGenError> {
        self.in_use
            .borrow_mut()
            .push((url.to_owned(), relation.post_path.clone()));
        Ok(())
    }

    fn create_conflicting_resource(
        &self,
        url: &str,
        _method: HttpMethod,
        json_data: &Map<String, Value>,
        status_code: u16,
    ) -> Result<(), DataGenError> {
        if self.fail {
            return Err(DataGenError::Collaborator("POST failed with 500".to_owned()));
        }
        self.conflicts
            .borrow_mut()
            .push((url.to_owned(), json_data.clone(), status_code));
        Ok(())
    }
}

fn body_request(relations: Vec<Relation>, schema: Value) -> RequestData {
    RequestData::new(
        dto(relations, json!({"name": "Ann", "wagegroup_id": "wg-1"})),
        schema,
        Vec::new(),
        Map::new(),
        Map::new(),
    )
}

fn invalid_json(
    data: &RequestData,
    status_code: u16,
    collaborator: &RecordingCollaborator,
) -> Result<Map<String, Value>, DataGenError> {
    let faker = LocalizedFaker::new(FakerLocale::En);
    get_invalid_json_data(
        "http://localhost/employees",
        HttpMethod::Post,
        status_code,
        data,
        DEFAULT_CODE,
        collaborator,
        &faker,
        &mut StdRng::seed_from_u64(7),
    )
}

#[test]
fn test_invalid_json_unique_conflict() {
    let data = body_request(
        vec![UniquePropertyValueConstraint::new("name", json!("Existing")).with_error_code(409).into()],
        employee_schema(),
    );
    let collaborator = RecordingCollaborator::default();
    let json_data = invalid_json(&data, 409, &collaborator).unwrap();
    assert_eq!(json_data["name"], json!("Existing"));

    let conflicts = collaborator.conflicts.borrow();
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].0, "http://localhost/employees");
    assert_eq!(conflicts[0].1, json_data);
    assert_eq!(conflicts[0].2, 409);
}

#[test]
fn test_invalid_json_collaborator_failure() {
    let data = body_request(
        vec![UniquePropertyValueConstraint::new("name", json!("Existing")).with_error_code(409).into()],
        employee_schema(),
    );
    let collaborator = RecordingCollaborator {
        fail: true,
        ..RecordingCollaborator::default()
    };
    assert!(matches!(
        invalid_json(&data, 409, &collaborator),
        Err(DataGenError::Collaborator(_))
    ));
}

#[test]
fn test_invalid_json_id_reference() {
    let data = body_request(
        vec![IdReference::new("wagegroup_id", "/employees").with_error_code(406).into()],
        employee_schema(),
    );
    let collaborator = RecordingCollaborator::default();
    let json_data = invalid_json(&data, 406, &collaborator).unwrap();
    assert_eq!(&json_data, data.dto().properties());
    assert_eq!(
        *collaborator.in_use.borrow(),
        vec![("http://localhost/employees".to_owned(), "/employees".to_owned())]
    );
}

#[test]
fn test_invalid_json_falls_back_to_invalidated_data() {
    let data = body_request(vec![], employee_schema());
    let collaborator = RecordingCollaborator::default();
    let json_data = invalid_json(&data, DEFAULT_CODE, &collaborator).unwrap();
    assert_ne!(&json_data, data.dto().properties());
    assert!(collaborator.conflicts.borrow().is_empty());
}

#[test]
fn test_invalid_json_without_relations_or_schema() {
    let data = body_request(vec![], json!({}));
    let collaborator = RecordingCollaborator::default();
    assert!(matches!(
        invalid_json(&data, DEFAULT_CODE, &collaborator),
        Err(DataGenError::NoInvalidationTarget(_))
    ));
}
