pub mod artwork;
pub mod augmenter;
pub mod config;
pub mod debounce;
pub mod dom;
pub mod features;
pub mod gallery;
pub mod metrics;
pub mod processor;
pub mod scheduler;
pub mod site;
pub mod store;
pub mod testing;

pub use artwork::{
    Artwork, ArtworkCache, ArtworkOrigin, ArtworkResolver, FetchError, HttpFetcher, PageFetcher,
    ResolveError, PLACEHOLDER_POSTER,
};
pub use augmenter::{PageAugmenter, ScanOutcome};
pub use config::{
    load_config, load_config_from_str, validate_config, AugmentConfig, Config, ConfigError,
    DatabaseConfig, DisplayMode, FetchConfig, SanitizedConfig, ServerConfig,
};
pub use debounce::DebouncedTrigger;
pub use dom::{parse_document, render_document, DocumentTree, MutationBatch, NodeId, SharedTree};
pub use features::{clear_cache_preserving_flags, set_site_enabled, FeatureState, FeatureTransition};
pub use gallery::{CardSpec, GalleryProjector, PatchOutcome, ProjectOutcome, GALLERY_ID};
pub use processor::{ClaimSet, ClaimState, ProcessOutcome, RowProcessor, MARKER_CLASS};
pub use scheduler::{ChangeScheduler, SchedulerState};
pub use site::{RowDescriptor, SiteId};
pub use store::{KvStore, MemoryKvStore, SqliteKvStore, StoreChange, StoreError};
