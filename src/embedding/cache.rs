//! Process-wide cache of loaded embedding services.
//!
//! Loading a pretrained model is the most expensive step of a session, so
//! every [`EmbeddingModel`] is loaded at most once per [`EmbedderCache`] and
//! then shared. Sessions receive the cache as an `Arc`, which makes the
//! sharing explicit instead of hiding it in a global.
//!
//! # Thread Safety
//!
//! The map is guarded by a `std::sync::RwLock`. Lookups of already loaded
//! models only take the read lock; a miss takes the write lock and loads the
//! model while holding it, so concurrent first requests never load twice.
//! Entries are never evicted or replaced.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::{debug, info, instrument};

use crate::config::EmbeddingProvider;
use crate::embedding::{create_embedding_service, EmbeddingModel, EmbeddingService};
use crate::error::{RagLensError, Result};

/// Lazily populated, never evicted map of model → loaded service.
pub struct EmbedderCache {
    provider: EmbeddingProvider,
    models: RwLock<HashMap<EmbeddingModel, Arc<dyn EmbeddingService>>>,
}

impl std::fmt::Debug for EmbedderCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbedderCache")
            .field("provider", &self.provider)
            .field("loaded", &self.loaded_models())
            .finish()
    }
}

impl EmbedderCache {
    /// Creates an empty cache that builds services with `provider`.
    pub fn new(provider: EmbeddingProvider) -> Self {
        Self {
            provider,
            models: RwLock::new(HashMap::new()),
        }
    }

    /// Creates an empty cache wrapped in an `Arc`, ready to share.
    pub fn shared(provider: EmbeddingProvider) -> Arc<Self> {
        Arc::new(Self::new(provider))
    }

    /// The provider used for cache misses.
    pub fn provider(&self) -> &EmbeddingProvider {
        &self.provider
    }

    /// Resolves `identifier` and returns its service, loading it on first use.
    ///
    /// # Errors
    ///
    /// Returns `ModelLoad` if the identifier is unknown or the backend
    /// cannot load the model.
    pub fn load(&self, identifier: &str) -> Result<Arc<dyn EmbeddingService>> {
        let model = EmbeddingModel::from_identifier(identifier)?;
        self.load_model(model)
    }

    /// Returns the service for `model`, loading it on first use.
    #[instrument(skip(self), fields(model = %model))]
    pub fn load_model(&self, model: EmbeddingModel) -> Result<Arc<dyn EmbeddingService>> {
        {
            let models = self
                .models
                .read()
                .map_err(|_| RagLensError::model_load(model.identifier(), "cache lock poisoned"))?;
            if let Some(service) = models.get(&model) {
                debug!("Embedding model cache hit");
                return Ok(Arc::clone(service));
            }
        }

        let mut models = self
            .models
            .write()
            .map_err(|_| RagLensError::model_load(model.identifier(), "cache lock poisoned"))?;

        // Another caller may have loaded it between the two locks
        if let Some(service) = models.get(&model) {
            return Ok(Arc::clone(service));
        }

        let service: Arc<dyn EmbeddingService> =
            Arc::from(create_embedding_service(model, &self.provider)?);

        if service.dimension() != model.dimension() {
            return Err(RagLensError::model_load(
                model.identifier(),
                format!(
                    "backend produces {}-dimensional vectors, expected {}",
                    service.dimension(),
                    model.dimension()
                ),
            ));
        }

        models.insert(model, Arc::clone(&service));
        info!(dimension = service.dimension(), "Embedding model loaded");

        Ok(service)
    }

    /// Returns true if `model` has already been loaded.
    pub fn is_loaded(&self, model: EmbeddingModel) -> bool {
        self.models
            .read()
            .ok()
            .is_some_and(|m| m.contains_key(&model))
    }

    /// Models loaded so far, in registry order.
    pub fn loaded_models(&self) -> Vec<EmbeddingModel> {
        EmbeddingModel::ALL
            .into_iter()
            .filter(|m| self.is_loaded(*m))
            .collect()
    }
}

impl Default for EmbedderCache {
    fn default() -> Self {
        Self::new(EmbeddingProvider::default())
    }
}
