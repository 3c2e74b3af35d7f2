//! Process-wide feature flags.
//!
//! One boolean per supported site, loaded once from the durable store and
//! afterwards updated only through [`FeatureState::apply_change`], which is fed
//! by the store's change notifications. Components hold an `Arc<FeatureState>`
//! and read it on every decision; nobody keeps a copy.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard};

use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::site::SiteId;
use crate::store::{KvStore, StoreChange, StoreError};

/// Capacity of the transition channel.
const TRANSITION_CHANNEL_CAPACITY: usize = 64;

/// A flag that actually flipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FeatureTransition {
    pub site: SiteId,
    pub enabled: bool,
}

/// Current enabled/disabled state per site.
#[derive(Debug)]
pub struct FeatureState {
    flags: RwLock<HashMap<SiteId, bool>>,
    transitions: broadcast::Sender<FeatureTransition>,
}

impl FeatureState {
    /// State with every site set to `enabled`.
    pub fn uniform(enabled: bool) -> Self {
        let (transitions, _) = broadcast::channel(TRANSITION_CHANNEL_CAPACITY);
        Self {
            flags: RwLock::new(SiteId::ALL.iter().map(|s| (*s, enabled)).collect()),
            transitions,
        }
    }

    /// Read the flags from the store. Absent or non-boolean keys mean enabled.
    pub fn load(store: &dyn KvStore) -> Result<Self, StoreError> {
        let keys: Vec<String> = SiteId::ALL.iter().map(SiteId::flag_key).collect();
        let key_refs: Vec<&str> = keys.iter().map(String::as_str).collect();
        let stored = store.get(&key_refs)?;

        let state = Self::uniform(true);
        {
            let mut flags = state.flags.write().unwrap_or_else(|e| e.into_inner());
            for site in SiteId::ALL {
                if let Some(Value::Bool(enabled)) = stored.get(&site.flag_key()) {
                    flags.insert(site, *enabled);
                }
            }
        }
        info!("Feature flags loaded: {:?}", state.snapshot());
        Ok(state)
    }

    fn flags(&self) -> RwLockReadGuard<'_, HashMap<SiteId, bool>> {
        self.flags.read().unwrap_or_else(|e| e.into_inner())
    }

    pub fn is_enabled(&self, site: SiteId) -> bool {
        self.flags().get(&site).copied().unwrap_or(true)
    }

    /// Every site's flag, in [`SiteId::ALL`] order.
    pub fn snapshot(&self) -> Vec<(SiteId, bool)> {
        let flags = self.flags();
        SiteId::ALL
            .iter()
            .map(|s| (*s, flags.get(s).copied().unwrap_or(true)))
            .collect()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<FeatureTransition> {
        self.transitions.subscribe()
    }

    /// The single entry point for flag updates.
    ///
    /// Ignores keys that are not flag keys, removals (a cleared store keeps
    /// the current state until the flags are re-set) and non-boolean values.
    /// Returns the transition when the flag actually changed.
    pub fn apply_change(&self, change: &StoreChange) -> Option<FeatureTransition> {
        let site = SiteId::from_flag_key(&change.key)?;
        let enabled = match &change.new_value {
            Some(Value::Bool(enabled)) => *enabled,
            Some(other) => {
                warn!("Ignoring non-boolean value for {}: {}", change.key, other);
                return None;
            }
            None => return None,
        };

        {
            let mut flags = self.flags.write().unwrap_or_else(|e| e.into_inner());
            let previous = flags.insert(site, enabled).unwrap_or(true);
            if previous == enabled {
                return None;
            }
        }

        let transition = FeatureTransition { site, enabled };
        info!(site = %site, enabled, "Feature flag changed");
        // Err only means nobody is listening.
        let _ = self.transitions.send(transition);
        Some(transition)
    }

    /// Follow a store's change stream until it closes.
    pub fn watch(self: &Arc<Self>, mut changes: broadcast::Receiver<StoreChange>) -> JoinHandle<()> {
        let state = Arc::clone(self);
        tokio::spawn(async move {
            debug!("Feature watcher started");
            loop {
                match changes.recv().await {
                    Ok(change) => {
                        state.apply_change(&change);
                    }
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        warn!("Feature watcher missed {} store changes", missed);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            debug!("Feature watcher stopped");
        })
    }
}

/// Settings surface: persist a site's flag and apply it right away.
pub fn set_site_enabled(
    store: &dyn KvStore,
    features: &FeatureState,
    site: SiteId,
    enabled: bool,
) -> Result<Option<FeatureTransition>, StoreError> {
    let key = site.flag_key();
    let old_value = store.get_one(&key)?;
    store.set_one(&key, Value::Bool(enabled))?;
    Ok(features.apply_change(&StoreChange {
        key,
        old_value,
        new_value: Some(Value::Bool(enabled)),
    }))
}

/// Settings surface: clear the store (artwork cache and flags share it) and
/// immediately re-set the current flags so no feature is switched off.
pub fn clear_cache_preserving_flags(
    store: &dyn KvStore,
    features: &FeatureState,
) -> Result<(), StoreError> {
    let flags: HashMap<String, Value> = features
        .snapshot()
        .into_iter()
        .map(|(site, enabled)| (site.flag_key(), Value::Bool(enabled)))
        .collect();
    store.clear()?;
    store.set(flags)?;
    info!("Artwork cache cleared");
    Ok(())
}
