use crate::error::{CoreError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Query parameters for fetching lyrics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LyricsQuery {
    /// Track name
    pub track_name: String,
    /// Artist name
    pub artist_name: String,
    /// Album name (optional)
    pub album_name: Option<String>,
    /// Track duration in seconds (for matching)
    pub duration_secs: Option<u32>,
}

impl LyricsQuery {
    /// Create a new lyrics query
    pub fn new(track_name: impl Into<String>, artist_name: impl Into<String>) -> Self {
        Self {
            track_name: track_name.into(),
            artist_name: artist_name.into(),
            album_name: None,
            duration_secs: None,
        }
    }

    /// Set album name
    #[must_use]
    pub fn with_album(mut self, album: impl Into<String>) -> Self {
        self.album_name = Some(album.into());
        self
    }

    /// Set duration
    #[must_use]
    pub const fn with_duration(mut self, duration_secs: u32) -> Self {
        self.duration_secs = Some(duration_secs);
        self
    }
}

/// Trait for lyrics providers.
///
/// A provider performs one lookup against its own endpoint and returns the raw,
/// unparsed LRC text, or `None` when it has nothing for the query (including
/// when it is not configured). Transport failures are reported as `Err` and
/// are treated as "no result" by [`crate::LyricsFetcher`].
#[async_trait]
pub trait LyricsProvider: Send + Sync {
    /// Stable provider id, e.g. `lrclib`
    fn name(&self) -> &'static str;

    /// Fetch raw LRC text for a query
    async fn fetch(&self, query: &LyricsQuery) -> Result<Option<String>>;
}

/// User-facing settings of a registered provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub id: String,
    pub name: String,
    pub is_enabled: bool,
    /// Unique rank, lower is tried first
    pub priority: u32,
}

impl ProviderConfig {
    /// Create an enabled provider config
    pub fn new(id: impl Into<String>, name: impl Into<String>, priority: u32) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            is_enabled: true,
            priority,
        }
    }
}

/// Persisted override for a provider's default settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderPreference {
    pub id: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub priority: u32,
}

const fn default_true() -> bool {
    true
}

/// A provider instance together with its settings
#[derive(Clone)]
pub struct RegisteredProvider {
    pub config: ProviderConfig,
    pub provider: Arc<dyn LyricsProvider>,
}

/// Ordered list of lyrics providers.
///
/// Entries are always kept sorted by ascending priority. Applying preferences
/// or reordering also renumbers priorities to unique ranks starting at 1.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    entries: Vec<RegisteredProvider>,
}

impl ProviderRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider with its default settings.
    ///
    /// The configured priority is kept as is; ranks are only renumbered when
    /// preferences are applied or providers are reordered.
    pub fn register(&mut self, config: ProviderConfig, provider: Arc<dyn LyricsProvider>) {
        self.entries.retain(|e| e.config.id != config.id);
        self.entries.push(RegisteredProvider { config, provider });
        self.sort();
    }

    /// Override default settings with persisted preferences.
    /// Preferences for unknown providers are ignored.
    pub fn apply_preferences(&mut self, preferences: &[ProviderPreference]) {
        for preference in preferences {
            if let Some(entry) = self
                .entries
                .iter_mut()
                .find(|e| e.config.id == preference.id)
            {
                entry.config.is_enabled = preference.enabled;
                entry.config.priority = preference.priority;
            }
        }
        self.normalize();
    }

    /// Current settings in priority order
    #[must_use]
    pub fn configs(&self) -> Vec<ProviderConfig> {
        self.entries.iter().map(|e| e.config.clone()).collect()
    }

    /// Settings in the form persisted to the config file
    #[must_use]
    pub fn preferences(&self) -> Vec<ProviderPreference> {
        self.entries
            .iter()
            .map(|e| ProviderPreference {
                id: e.config.id.clone(),
                enabled: e.config.is_enabled,
                priority: e.config.priority,
            })
            .collect()
    }

    /// Enabled providers in ascending priority order
    #[must_use]
    pub fn enabled_providers(&self) -> Vec<RegisteredProvider> {
        self.entries
            .iter()
            .filter(|e| e.config.is_enabled)
            .cloned()
            .collect()
    }

    /// Enable or disable a provider
    ///
    /// # Errors
    ///
    /// Returns `ProviderNotFound` if no provider has this id.
    pub fn set_enabled(&mut self, id: &str, enabled: bool) -> Result<()> {
        let index = self.index_of(id)?;
        self.entries[index].config.is_enabled = enabled;
        Ok(())
    }

    /// Move a provider one rank earlier. No-op for the first provider.
    ///
    /// # Errors
    ///
    /// Returns `ProviderNotFound` if no provider has this id.
    pub fn move_up(&mut self, id: &str) -> Result<()> {
        let index = self.index_of(id)?;
        if index > 0 {
            self.swap_priorities(index, index - 1);
        }
        Ok(())
    }

    /// Move a provider one rank later. No-op for the last provider.
    ///
    /// # Errors
    ///
    /// Returns `ProviderNotFound` if no provider has this id.
    pub fn move_down(&mut self, id: &str) -> Result<()> {
        let index = self.index_of(id)?;
        if index + 1 < self.entries.len() {
            self.swap_priorities(index, index + 1);
        }
        Ok(())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn index_of(&self, id: &str) -> Result<usize> {
        self.entries
            .iter()
            .position(|e| e.config.id == id)
            .ok_or_else(|| CoreError::ProviderNotFound { id: id.to_string() })
    }

    fn swap_priorities(&mut self, a: usize, b: usize) {
        // Equal configured priorities would make the swap a no-op
        self.normalize();
        let priority_a = self.entries[a].config.priority;
        self.entries[a].config.priority = self.entries[b].config.priority;
        self.entries[b].config.priority = priority_a;
        self.normalize();
    }

    /// Sort by priority, id breaks ties
    fn sort(&mut self) {
        self.entries.sort_by(|a, b| {
            a.config
                .priority
                .cmp(&b.config.priority)
                .then_with(|| a.config.id.cmp(&b.config.id))
        });
    }

    /// Sort, then renumber ranks from 1
    fn normalize(&mut self) {
        self.sort();
        for (rank, entry) in (1..).zip(self.entries.iter_mut()) {
            entry.config.priority = rank;
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// What a [`StubProvider`] answers with
    #[derive(Debug, Clone)]
    pub enum Reply {
        Lyrics(String),
        Absent,
        Fail,
    }

    /// Provider with a canned reply that counts its calls
    pub struct StubProvider {
        name: &'static str,
        reply: Reply,
        calls: AtomicUsize,
    }

    impl StubProvider {
        pub fn new(name: &'static str, reply: Reply) -> Arc<Self> {
            Arc::new(Self {
                name,
                reply,
                calls: AtomicUsize::new(0),
            })
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl LyricsProvider for StubProvider {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn fetch(&self, _query: &LyricsQuery) -> Result<Option<String>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.reply {
                Reply::Lyrics(text) => Ok(Some(text.clone())),
                Reply::Absent => Ok(None),
                Reply::Fail => Err(CoreError::LyricsProviderFailed {
                    provider: self.name.to_string(),
                    reason: "connection reset".into(),
                }),
            }
        }
    }

    /// Registry holding the given stubs, ranked in the order passed
    pub fn registry_of(stubs: &[Arc<StubProvider>]) -> ProviderRegistry {
        let mut registry = ProviderRegistry::new();
        for (priority, stub) in (1..).zip(stubs) {
            registry.register(
                ProviderConfig::new(stub.name(), stub.name().to_uppercase(), priority),
                stub.clone(),
            );
        }
        registry
    }
}
