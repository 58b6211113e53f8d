//! Generators, probes, service info and health.
//!
//! Generator and probe catalogues change rarely, so the generator list,
//! individual generators and the probe category list are cached for the
//! lifetime of the client. Health is always fetched fresh.

use crate::client::GarakClient;
use crate::core::request::validate_path_segment;
use crate::core::{ApiInfo, ApiRequest, ClientError, GeneratorInfo, HealthStatus, ProbeCategory, ProbeInfo};

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum GeneratorList {
    Wrapped { generators: Vec<GeneratorInfo> },
    Bare(Vec<GeneratorInfo>),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ModelList {
    Wrapped { models: Vec<String> },
    Bare(Vec<String>),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CategoryList {
    Wrapped { categories: Vec<ProbeCategory> },
    Bare(Vec<ProbeCategory>),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ProbeList {
    Wrapped { probes: Vec<ProbeInfo> },
    Bare(Vec<ProbeInfo>),
}

/// Everything the service advertises, fetched in one call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoverySnapshot {
    /// Supported generators.
    pub generators: Vec<GeneratorInfo>,
    /// Probe categories.
    pub probe_categories: Vec<ProbeCategory>,
    /// Service description.
    pub api_info: ApiInfo,
}

/// Process-lifetime cache for discovery data. Guards are never held across
/// an await.
#[derive(Debug, Default)]
pub(crate) struct DiscoveryCache {
    generators: RwLock<Option<Arc<Vec<GeneratorInfo>>>>,
    generator_detail: RwLock<HashMap<String, GeneratorInfo>>,
    categories: RwLock<Option<Arc<Vec<ProbeCategory>>>>,
}

impl DiscoveryCache {
    fn generators(&self) -> Option<Arc<Vec<GeneratorInfo>>> {
        self.generators
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn store_generators(&self, generators: Arc<Vec<GeneratorInfo>>) {
        *self
            .generators
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(generators);
    }

    fn generator(&self, name: &str) -> Option<GeneratorInfo> {
        self.generator_detail
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(name)
            .cloned()
    }

    fn store_generator(&self, generator: GeneratorInfo) {
        self.generator_detail
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(generator.name.clone(), generator);
    }

    fn categories(&self) -> Option<Arc<Vec<ProbeCategory>>> {
        self.categories
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn store_categories(&self, categories: Arc<Vec<ProbeCategory>>) {
        *self
            .categories
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(categories);
    }

    /// Drops every cached entry.
    pub(crate) fn clear(&self) {
        self.generators
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        self.generator_detail
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
        self.categories
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
    }
}

/// Discovery operations, borrowed from a [`GarakClient`].
#[derive(Debug, Clone, Copy)]
pub struct Discovery<'a> {
    client: &'a GarakClient,
}

impl<'a> Discovery<'a> {
    pub(crate) fn new(client: &'a GarakClient) -> Self {
        Self { client }
    }

    /// Lists supported generators. Cached after the first call.
    pub async fn list_generators(&self) -> Result<Arc<Vec<GeneratorInfo>>, ClientError> {
        let cache = self.client.discovery_cache();
        if let Some(generators) = cache.generators() {
            tracing::trace!("Generator list served from cache");
            return Ok(generators);
        }

        let list: GeneratorList = self
            .client
            .execute_json(ApiRequest::get("/generators"), "generator list")
            .await?;
        let generators = Arc::new(match list {
            GeneratorList::Wrapped { generators } | GeneratorList::Bare(generators) => generators,
        });
        tracing::debug!(count = generators.len(), "Fetched generator list");
        cache.store_generators(Arc::clone(&generators));
        Ok(generators)
    }

    /// Returns one generator. Cached per name.
    ///
    /// Fails with `NotFound` if the service does not know the generator.
    pub async fn get_generator(&self, name: &str) -> Result<GeneratorInfo, ClientError> {
        validate_path_segment("generator", name)?;
        let cache = self.client.discovery_cache();
        if let Some(generator) = cache.generator(name) {
            return Ok(generator);
        }

        let generator: GeneratorInfo = self
            .client
            .execute_json(ApiRequest::get(format!("/generators/{name}")), "generator")
            .await?;
        cache.store_generator(generator.clone());
        Ok(generator)
    }

    /// Lists the models a generator accepts.
    pub async fn list_models(&self, generator: &str) -> Result<Vec<String>, ClientError> {
        validate_path_segment("generator", generator)?;
        let list: ModelList = self
            .client
            .execute_json(
                ApiRequest::get(format!("/generators/{generator}/models")),
                "model list",
            )
            .await?;
        Ok(match list {
            ModelList::Wrapped { models } | ModelList::Bare(models) => models,
        })
    }

    /// Lists probe categories with their probes. Cached after the first call.
    pub async fn list_probe_categories(&self) -> Result<Arc<Vec<ProbeCategory>>, ClientError> {
        let cache = self.client.discovery_cache();
        if let Some(categories) = cache.categories() {
            tracing::trace!("Probe categories served from cache");
            return Ok(categories);
        }

        let list: CategoryList = self
            .client
            .execute_json(ApiRequest::get("/probes"), "probe category list")
            .await?;
        let categories = Arc::new(match list {
            CategoryList::Wrapped { categories } | CategoryList::Bare(categories) => categories,
        });
        tracing::debug!(count = categories.len(), "Fetched probe categories");
        cache.store_categories(Arc::clone(&categories));
        Ok(categories)
    }

    /// Lists the probes in one category.
    pub async fn list_probes(&self, category: &str) -> Result<Vec<ProbeInfo>, ClientError> {
        validate_path_segment("category", category)?;
        let list: ProbeList = self
            .client
            .execute_json(ApiRequest::get(format!("/probes/{category}")), "probe list")
            .await?;
        Ok(match list {
            ProbeList::Wrapped { probes } | ProbeList::Bare(probes) => probes,
        })
    }

    /// Returns the service description.
    pub async fn api_info(&self) -> Result<ApiInfo, ClientError> {
        self.client
            .execute_json(ApiRequest::get("/info"), "API info")
            .await
    }

    /// Checks service health. Never cached.
    pub async fn health(&self) -> Result<HealthStatus, ClientError> {
        let health: HealthStatus = self
            .client
            .execute_json(ApiRequest::get("/health"), "health")
            .await?;
        if !health.is_healthy() {
            tracing::warn!(status = %health.status, "API reports degraded health");
        }
        Ok(health)
    }

    /// Fetches generators, probe categories and API info concurrently.
    pub async fn snapshot(&self) -> Result<DiscoverySnapshot, ClientError> {
        let (generators, categories, api_info) = futures::try_join!(
            self.list_generators(),
            self.list_probe_categories(),
            self.api_info()
        )?;
        Ok(DiscoverySnapshot {
            generators: generators.as_ref().clone(),
            probe_categories: categories.as_ref().clone(),
            api_info,
        })
    }

    /// Drops cached generators and probe categories.
    pub fn clear_cache(&self) {
        self.client.discovery_cache().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::garak::test_support::*;
    use crate::transport::MockReply;
    use serde_json::{json, Value};

    fn generators_json() -> Value {
        json!([
            {
                "name": "openai",
                "display_name": "OpenAI",
                "description": "OpenAI GPT models",
                "requires_api_key": true,
                "api_key_env": "OPENAI_API_KEY",
                "supported_models": ["gpt-4", "gpt-3.5-turbo"]
            },
            {
                "name": "huggingface",
                "display_name": "Hugging Face",
                "requires_api_key": false,
                "supported_models": []
            }
        ])
    }

    fn categories_json() -> Value {
        json!([
            {
                "name": "dan",
                "display_name": "DAN",
                "description": "Do Anything Now jailbreaks",
                "probes": [
                    {
                        "name": "dan.Dan_11_0",
                        "display_name": "DAN 11.0",
                        "category": "dan",
                        "recommended_detectors": ["dan.DAN"]
                    }
                ]
            },
            {"name": "encoding", "probes": []}
        ])
    }

    fn info_json() -> Value {
        json!({
            "api_version": "v1",
            "service": "Garak LLM Security Scanner",
            "documentation_url": "/api/docs",
            "capabilities": {},
            "supported_generators": ["openai", "anthropic"],
            "supported_probe_categories": ["dan", "encoding"]
        })
    }

    #[tokio::test]
    async fn test_generator_list_is_cached() {
        let (client, mock) = mock_client();
        mock.on_get("/generators")
            .ok(json!({"generators": generators_json(), "total": 2}));

        let first = client.discovery().list_generators().await.unwrap();
        let second = client.discovery().list_generators().await.unwrap();

        assert_eq!(first.len(), 2);
        assert!(first[0].requires_api_key);
        assert_eq!(first[0].api_key_env.as_deref(), Some("OPENAI_API_KEY"));
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(mock.request_count("/generators"), 1);
    }

    #[tokio::test]
    async fn test_clear_cache_refetches() {
        let (client, mock) = mock_client();
        mock.on_get("/generators").ok(generators_json());
        mock.on_get("/probes").ok(json!({"categories": categories_json()}));

        client.discovery().list_generators().await.unwrap();
        client.discovery().list_probe_categories().await.unwrap();
        client.clear_cache();
        client.discovery().list_generators().await.unwrap();
        client.discovery().list_probe_categories().await.unwrap();

        assert_eq!(mock.request_count("/generators"), 2);
        assert_eq!(mock.request_count("/probes"), 2);
    }

    #[tokio::test]
    async fn test_get_generator_cached_per_name() {
        let (client, mock) = mock_client();
        mock.on_get("/generators/openai").ok(generators_json()[0].clone());

        let generator = client.discovery().get_generator("openai").await.unwrap();
        client.discovery().get_generator("openai").await.unwrap();

        assert_eq!(generator.supported_models, vec!["gpt-4", "gpt-3.5-turbo"]);
        assert_eq!(mock.request_count("/generators/openai"), 1);
    }

    #[tokio::test]
    async fn test_unknown_generator_is_not_found() {
        let (client, mock) = mock_client();
        mock.on_get("/generators/bogus").reply(MockReply::status(
            404,
            json!({"error": "generator_not_found", "message": "Generator 'bogus' not found"}),
        ));

        let err = client.discovery().get_generator("bogus").await.unwrap_err();
        match err {
            ClientError::NotFound { resource, .. } => assert_eq!(resource, "generator"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_list_models_and_probes() {
        let (client, mock) = mock_client();
        mock.on_get("/generators/openai/models").ok(json!({
            "generator": "openai",
            "models": ["gpt-4", "gpt-4o"],
            "total": 2
        }));
        mock.on_get("/probes/dan").ok(json!({
            "category": "dan",
            "probes": categories_json()[0]["probes"].clone(),
            "total": 1
        }));

        let models = client.discovery().list_models("openai").await.unwrap();
        assert_eq!(models, vec!["gpt-4", "gpt-4o"]);

        let probes = client.discovery().list_probes("dan").await.unwrap();
        assert_eq!(probes.len(), 1);
        assert_eq!(probes[0].recommended_detectors, vec!["dan.DAN"]);
    }

    #[tokio::test]
    async fn test_invalid_path_segment_makes_no_request() {
        let (client, mock) = mock_client();
        assert!(client.discovery().list_probes("dan/../x").await.is_err());
        assert!(client.discovery().get_generator("").await.is_err());
        assert_eq!(mock.total_requests(), 0);
    }

    #[tokio::test]
    async fn test_health_is_never_cached() {
        let (client, mock) = mock_client();
        mock.on_get("/health")
            .ok(json!({"status": "healthy", "version": "1.2.0"}))
            .ok(json!({"status": "degraded", "services": {"database": "down"}}));

        assert!(client.discovery().health().await.unwrap().is_healthy());
        let second = client.discovery().health().await.unwrap();
        assert!(!second.is_healthy());
        assert_eq!(second.services["database"], "down");
        assert_eq!(mock.request_count("/health"), 2);
    }

    #[tokio::test]
    async fn test_snapshot() {
        let (client, mock) = mock_client();
        mock.on_get("/generators").ok(json!({"generators": generators_json()}));
        mock.on_get("/probes").ok(json!({"categories": categories_json(), "total_probes": 1}));
        mock.on_get("/info").ok(info_json());

        let snapshot = client.discovery().snapshot().await.unwrap();
        assert_eq!(snapshot.generators.len(), 2);
        assert_eq!(snapshot.probe_categories.len(), 2);
        assert_eq!(snapshot.api_info.supported_generators.len(), 2);

        // cached parts are not fetched again
        client.discovery().snapshot().await.unwrap();
        assert_eq!(mock.request_count("/generators"), 1);
        assert_eq!(mock.request_count("/probes"), 1);
        assert_eq!(mock.request_count("/info"), 2);
    }

    #[tokio::test]
    async fn test_server_error_on_info() {
        let (client, mock) = mock_client();
        mock.on_get("/info")
            .reply(MockReply::status(500, json!({"error": "internal_error"})));

        let err = client.api_info().await.unwrap_err();
        assert!(matches!(err, ClientError::Server { .. }));
    }
}
