//! Lyrics fetcher that walks the provider chain in priority order.

use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::provider::{LyricsQuery, ProviderConfig, ProviderRegistry};

const LOG_TARGET: &str = "lyricbridge::fetcher";

/// Resolves raw LRC text by asking enabled providers one after another
pub struct LyricsFetcher {
    registry: RwLock<ProviderRegistry>,
}

impl LyricsFetcher {
    /// Create a new lyrics fetcher
    #[must_use]
    pub fn new(registry: ProviderRegistry) -> Self {
        Self {
            registry: RwLock::new(registry),
        }
    }

    /// Ask each enabled provider once, lowest priority first.
    ///
    /// Returns the first non-blank result. Provider errors are logged and the
    /// next provider is tried; `None` means every provider came up empty.
    pub async fn resolve(&self, query: &LyricsQuery) -> Option<String> {
        // Snapshot so registry edits never wait on network calls
        let providers = self.registry.read().await.enabled_providers();

        if providers.is_empty() {
            info!(target: LOG_TARGET, "No lyrics providers enabled");
            return None;
        }

        let provider_names: Vec<_> = providers.iter().map(|p| p.config.name.as_str()).collect();
        info!(
            target: LOG_TARGET,
            "Fetching lyrics for: {} - {} (providers: {:?})",
            query.artist_name, query.track_name, provider_names
        );

        for entry in &providers {
            let name = &entry.config.name;
            info!(target: LOG_TARGET, "Trying provider: {}", name);
            match entry.provider.fetch(query).await {
                Ok(Some(lrc)) if !lrc.trim().is_empty() => {
                    info!(
                        target: LOG_TARGET,
                        "Found lyrics from {} ({} bytes)",
                        name,
                        lrc.len()
                    );
                    return Some(lrc);
                }
                Ok(_) => {
                    info!(target: LOG_TARGET, "Provider {} returned no lyrics", name);
                }
                Err(e) => {
                    warn!(target: LOG_TARGET, "Provider {} failed with error: {}", name, e);
                }
            }
        }

        info!(
            target: LOG_TARGET,
            "No lyrics found for {} - {} (tried {} providers)",
            query.artist_name,
            query.track_name,
            providers.len()
        );
        None
    }

    /// Current provider settings in priority order
    pub async fn configs(&self) -> Vec<ProviderConfig> {
        self.registry.read().await.configs()
    }

    /// Apply a change to the provider registry
    pub async fn update_registry<R>(&self, update: impl FnOnce(&mut ProviderRegistry) -> R) -> R {
        let mut registry = self.registry.write().await;
        update(&mut registry)
    }
}
