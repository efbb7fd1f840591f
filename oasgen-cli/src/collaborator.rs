use oasgen::faker::random_hex_token;
use oasgen::{ApiCollaborator, DataGenError, HttpMethod, IdReference};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde_json::{Map, Value};
use std::cell::RefCell;

/// Answers collaborator calls without a running API: ids are random hex
/// tokens and resources are assumed to exist.
#[derive(Debug)]
pub struct OfflineCollaborator {
    rng: RefCell<StdRng>,
}

impl OfflineCollaborator {
    #[must_use]
    pub fn new(seed: Option<u64>) -> Self {
        let rng = seed.map_or_else(StdRng::from_os_rng, StdRng::seed_from_u64);
        OfflineCollaborator {
            rng: RefCell::new(rng),
        }
    }
}

impl ApiCollaborator for OfflineCollaborator {
    fn get_valid_id_for_endpoint(&self, endpoint: &str, method: HttpMethod) -> Result<String, DataGenError> {
        let id = random_hex_token(&mut *self.rng.borrow_mut());
        tracing::info!("offline id {id} for {method} {endpoint}");
        Ok(id)
    }

    fn ensure_in_use(&self, url: &str, relation: &IdReference) -> Result<(), DataGenError> {
        tracing::info!(
            "offline: assuming {url} is referenced through {} ('{}')",
            relation.post_path,
            relation.property_name
        );
        Ok(())
    }

    fn create_conflicting_resource(
        &self,
        url: &str,
        method: HttpMethod,
        _json_data: &Map<String, Value>,
        status_code: u16,
    ) -> Result<(), DataGenError> {
        tracing::info!("offline: assuming a resource conflicting on {method} {url} exists ({status_code})");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_seeded_ids_repeat() {
        let first = OfflineCollaborator::new(Some(5));
        let second = OfflineCollaborator::new(Some(5));
        let a = first.get_valid_id_for_endpoint("/users", HttpMethod::Get).unwrap();
        let b = second.get_valid_id_for_endpoint("/users", HttpMethod::Get).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, first.get_valid_id_for_endpoint("/users", HttpMethod::Get).unwrap());
    }
}
