//! Configuration Bridge
//!
//! Holds the user-owned filter settings (block list and debug flag) and
//! broadcasts every change as a delta, so the pipeline can swap in a new
//! block list and re-scan the feed without a restart.

use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};

/// Current filter settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSettings {
    /// Blocked country names and codes, in the user's order
    pub block_list: Vec<String>,
    /// Verbose per-post logging
    pub debug: bool,
}

/// Settings change notification. Absent fields did not change.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigDelta {
    pub block_list: Option<Vec<String>>,
    pub debug: Option<bool>,
}

impl ConfigDelta {
    pub fn block_list(list: Vec<String>) -> Self {
        Self {
            block_list: Some(list),
            debug: None,
        }
    }

    pub fn debug(enabled: bool) -> Self {
        Self {
            block_list: None,
            debug: Some(enabled),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.block_list.is_none() && self.debug.is_none()
    }
}

/// Source of filter settings with change notifications.
pub struct ConfigBridge {
    /// Current settings
    settings: Arc<RwLock<FilterSettings>>,
    /// Broadcast channel for change notifications
    change_tx: broadcast::Sender<ConfigDelta>,
}

impl ConfigBridge {
    /// Create a bridge seeded with initial settings.
    pub fn new(initial: FilterSettings) -> Self {
        let (change_tx, _) = broadcast::channel(64);
        Self {
            settings: Arc::new(RwLock::new(initial)),
            change_tx,
        }
    }

    /// Snapshot of the current settings.
    pub async fn get_config(&self) -> FilterSettings {
        self.settings.read().await.clone()
    }

    /// Subscribe to settings changes.
    pub fn subscribe(&self) -> broadcast::Receiver<ConfigDelta> {
        self.change_tx.subscribe()
    }

    /// Apply a delta and notify subscribers of the fields that changed.
    ///
    /// Returns the delta that was broadcast, if anything changed.
    pub async fn update(&self, delta: ConfigDelta) -> Option<ConfigDelta> {
        let effective = {
            let mut settings = self.settings.write().await;
            let mut effective = ConfigDelta::default();

            if let Some(list) = delta.block_list {
                if settings.block_list != list {
                    settings.block_list = list.clone();
                    effective.block_list = Some(list);
                }
            }
            if let Some(debug) = delta.debug {
                if settings.debug != debug {
                    settings.debug = debug;
                    effective.debug = Some(debug);
                }
            }

            effective
        };

        if effective.is_empty() {
            return None;
        }

        tracing::debug!(?effective, "filter settings changed");
        let _ = self.change_tx.send(effective.clone());
        Some(effective)
    }

    /// Replace the block list.
    pub async fn set_block_list(&self, list: Vec<String>) -> Option<ConfigDelta> {
        self.update(ConfigDelta::block_list(list)).await
    }

    /// Toggle debug logging.
    pub async fn set_debug(&self, enabled: bool) -> Option<ConfigDelta> {
        self.update(ConfigDelta::debug(enabled)).await
    }
}

impl Default for ConfigBridge {
    fn default() -> Self {
        Self::new(FilterSettings::default())
    }
}
