use std::sync::Arc;

use posterboard_core::{
    ArtworkResolver, AugmentConfig, Config, FeatureState, KvStore, PageFetcher, SanitizedConfig,
};

/// Shared application state
pub struct AppState {
    config: Config,
    store: Arc<dyn KvStore>,
    features: Arc<FeatureState>,
    fetcher: Arc<dyn PageFetcher>,
    resolver: ArtworkResolver,
}

impl AppState {
    pub fn new(
        config: Config,
        store: Arc<dyn KvStore>,
        features: Arc<FeatureState>,
        fetcher: Arc<dyn PageFetcher>,
    ) -> Self {
        let resolver = ArtworkResolver::new(Arc::clone(&store), Arc::clone(&fetcher));
        Self {
            config,
            store,
            features,
            fetcher,
            resolver,
        }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn augment_config(&self) -> &AugmentConfig {
        &self.config.augment
    }

    pub fn store(&self) -> &dyn KvStore {
        self.store.as_ref()
    }

    pub fn features(&self) -> &Arc<FeatureState> {
        &self.features
    }

    pub fn fetcher(&self) -> &dyn PageFetcher {
        self.fetcher.as_ref()
    }

    pub fn resolver(&self) -> &ArtworkResolver {
        &self.resolver
    }
}
