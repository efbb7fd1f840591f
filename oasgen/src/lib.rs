pub mod config;
pub mod dto;
pub mod error;
pub mod faker;
pub mod files_reader;
pub mod invalid_values;
pub mod invalidation;
pub mod openapi;
pub mod ops;
pub mod relations;
pub mod request_data;
pub mod schema_resolver;
pub mod valid_values;


#[cfg(test)]
#[path = "invalidation_tests.rs"]
mod invalidation_tests;


// Re-export commonly used types
pub use config::OasGenConfig;
pub use dto::{Dto, DtoClass, DtoMapping, IdMapping};
pub use error::DataGenError;
pub use faker::{FakerLocale, LocalizedFaker};
pub use invalid_values::{InvalidValue, get_invalid_value, get_value_out_of_bounds};
pub use invalidation::{get_invalid_json_data, get_invalidated_data, get_invalidated_parameters};
pub use openapi::{ApiCollaborator, HttpMethod, OpenApiDocument};
pub use ops::OasGenOps;
pub use relations::{
    ConstraintValue, IdDependency, IdReference, PathPropertiesConstraint, PropertyValueConstraint,
    Relation, UniquePropertyValueConstraint,
};
pub use request_data::{ParameterLocation, ParameterSpec, RequestData, RequestValues};
pub use schema_resolver::resolve_schema;
pub use valid_values::get_valid_value;
