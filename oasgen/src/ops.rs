use rand::SeedableRng;
use rand::rngs::StdRng;
use serde_json::{Map, Value};

use crate::config::OasGenConfig;
use crate::dto::Dto;
use crate::error::DataGenError;
use crate::faker::LocalizedFaker;
use crate::invalid_values::{self, InvalidValue};
use crate::invalidation;
use crate::openapi::{ApiCollaborator, HttpMethod, OpenApiDocument};
use crate::relations::ConstraintValue;
use crate::request_data::RequestData;
use crate::schema_resolver;
use crate::valid_values;

/// Configured entry point for data generation: the config, a localized faker
/// and the random source shared by all operations.
#[derive(Debug)]
pub struct OasGenOps {
    config: OasGenConfig,
    faker: LocalizedFaker,
    rng: StdRng,
}

impl OasGenOps {
    #[must_use]
    pub fn new(config: OasGenConfig) -> Self {
        Self::with_rng(config, StdRng::from_os_rng())
    }

    /// Deterministic generation: the same seed and calls give the same data.
    #[must_use]
    pub fn with_seed(config: OasGenConfig, seed: u64) -> Self {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: OasGenConfig, rng: StdRng) -> Self {
        let faker = LocalizedFaker::new(config.faker_locale);
        tracing::debug!(
            "- oasgen ops ready (locale {:?}, default invalid code {})",
            config.faker_locale,
            config.invalid_property_default_response
        );
        OasGenOps { config, faker, rng }
    }

    #[must_use]
    pub fn config(&self) -> &OasGenConfig {
        &self.config
    }

    #[must_use]
    pub fn faker(&self) -> &LocalizedFaker {
        &self.faker
    }

    /// A valid value for a resolved schema. Schemas with typed alternatives get
    /// one alternative picked first.
    ///
    /// # Errors
    /// Schema and range errors from [`valid_values::get_valid_value`].
    pub fn get_valid_value(&mut self, schema: &Value) -> Result<Value, DataGenError> {
        let resolved = schema_resolver::resolve_schema(schema);
        let schema = schema_resolver::pick_typed_alternative(&resolved, &mut self.rng);
        valid_values::get_valid_value(&schema, &self.faker, &mut self.rng)
    }

    /// `count` independently generated valid values.
    ///
    /// # Errors
    /// The first error raised while generating.
    pub fn get_valid_values(&mut self, schema: &Value, count: usize) -> Result<Vec<Value>, DataGenError> {
        (0..count).map(|_| self.get_valid_value(schema)).collect()
    }

    #[must_use]
    pub fn get_invalid_value(
        &mut self,
        schema: &Value,
        current_value: &Value,
        values_from_constraint: &[ConstraintValue],
    ) -> InvalidValue {
        let resolved = schema_resolver::resolve_schema(schema);
        invalid_values::get_invalid_value(&resolved, current_value, values_from_constraint, &mut self.rng)
    }

    /// See [`invalidation::get_invalidated_data`].
    ///
    /// # Errors
    /// `DataGenError::NoInvalidationTarget` when nothing can be changed for `status_code`.
    pub fn get_invalidated_data(
        &mut self,
        dto: &Dto,
        schema: &Value,
        status_code: u16,
    ) -> Result<Map<String, Value>, DataGenError> {
        invalidation::get_invalidated_data(
            dto,
            schema,
            status_code,
            self.config.invalid_property_default_response,
            &self.faker,
            &mut self.rng,
        )
    }

    /// See [`invalidation::get_invalidated_parameters`].
    ///
    /// # Errors
    /// `DataGenError::NoInvalidationTarget` when no parameter can provoke `status_code`.
    pub fn get_invalidated_parameters(
        &mut self,
        status_code: u16,
        request_data: &RequestData,
    ) -> Result<(Map<String, Value>, Map<String, Value>), DataGenError> {
        invalidation::get_invalidated_parameters(
            status_code,
            request_data,
            self.config.invalid_property_default_response,
            &self.faker,
            &mut self.rng,
        )
    }

    /// See [`invalidation::get_invalid_json_data`].
    ///
    /// # Errors
    /// Collaborator and invalidation errors.
    pub fn get_invalid_json_data(
        &mut self,
        url: &str,
        method: HttpMethod,
        status_code: u16,
        request_data: &RequestData,
        collaborator: &dyn ApiCollaborator,
    ) -> Result<Map<String, Value>, DataGenError> {
        invalidation::get_invalid_json_data(
            url,
            method,
            status_code,
            request_data,
            self.config.invalid_property_default_response,
            collaborator,
            &self.faker,
            &mut self.rng,
        )
    }

    /// # Errors
    /// See [`OpenApiDocument::get_request_data`].
    pub fn get_request_data(
        &mut self,
        document: &OpenApiDocument,
        endpoint: &str,
        method: HttpMethod,
        collaborator: &dyn ApiCollaborator,
    ) -> Result<RequestData, DataGenError> {
        document.get_request_data(endpoint, method, collaborator, &self.faker, &mut self.rng)
    }

    /// # Errors
    /// See [`OpenApiDocument::get_valid_url`].
    pub fn get_valid_url(
        &mut self,
        document: &OpenApiDocument,
        endpoint: &str,
        method: HttpMethod,
        collaborator: &dyn ApiCollaborator,
    ) -> Result<String, DataGenError> {
        document.get_valid_url(endpoint, method, collaborator, &mut self.rng)
    }

    /// # Errors
    /// See [`OpenApiDocument::get_invalidated_url`].
    pub fn get_invalidated_url(
        &mut self,
        document: &OpenApiDocument,
        valid_url: &str,
    ) -> Result<String, DataGenError> {
        document.get_invalidated_url(valid_url, &mut self.rng)
    }
}
