use async_trait::async_trait;
use const_format::concatcp;
use lyricbridge_core::{CoreError, LyricsProvider, LyricsQuery, ProvidersConfig};
use serde::Deserialize;
use std::fmt::Write;
use std::time::Duration;
use tracing::{debug, info, warn};

const LOG_TARGET: &str = "lyricbridge::provider::lrclib";

/// Provider id used in config files and the provider registry
pub const PROVIDER_ID: &str = "lrclib";

/// Human-readable provider name
pub const DISPLAY_NAME: &str = "LRCLib";

/// Position in the provider chain before user preferences are applied
pub const DEFAULT_PRIORITY: u32 = 1;

/// Public LRCLIB API
pub const LRCLIB_API_URL: &str = "https://lrclib.net/api";

/// Default timeout for HTTP requests (10 seconds)
const DEFAULT_TIMEOUT_SECS: u64 = 10;

const USER_AGENT: &str = concatcp!(
    "LyricBridge/",
    env!("CARGO_PKG_VERSION"),
    " (https://github.com/kvnxiao/lyricbridge)"
);

/// LRCLIB-specific configuration (`[providers.lrclib]`)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LrclibProviderConfig {
    /// Alternative API root, e.g. a self-hosted mirror
    #[serde(default)]
    pub api_url: Option<String>,
}

impl LrclibProviderConfig {
    /// Extract LRCLIB config from the dynamic providers config.
    ///
    /// # Errors
    ///
    /// Returns an error if the `[providers.lrclib]` table is malformed.
    pub fn from_providers(providers: &ProvidersConfig) -> Result<Option<Self>, CoreError> {
        providers.get(PROVIDER_ID)
    }
}

/// Config template for the LRCLIB provider.
/// This is appended to the base config template when creating a new config file.
pub const CONFIG_TEMPLATE: &str = concatcp!(
    "[providers.",
    PROVIDER_ID,
    r#"]
# Optional: alternative API root (e.g. a self-hosted mirror)
# api_url = ""#,
    LRCLIB_API_URL,
    "\"\n"
);

/// LRCLIB.net lyrics provider
pub struct LrclibProvider {
    client: reqwest::Client,
    api_url: String,
}

impl LrclibProvider {
    /// Create a new LRCLIB provider against the public API with a 10-second timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new() -> Result<Self, CoreError> {
        Self::with_api_url(LRCLIB_API_URL)
    }

    /// Create a provider from the `[providers.lrclib]` table, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the table is malformed or the HTTP client cannot be created.
    pub fn from_config(providers: &ProvidersConfig) -> Result<Self, CoreError> {
        match LrclibProviderConfig::from_providers(providers)?.and_then(|c| c.api_url) {
            Some(api_url) if !api_url.trim().is_empty() => Self::with_api_url(api_url.trim()),
            _ => Self::new(),
        }
    }

    /// Create a provider against a different API root.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn with_api_url(api_url: impl Into<String>) -> Result<Self, CoreError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(5))
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            api_url: api_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn get_url(&self, query: &LyricsQuery) -> String {
        let mut url = format!(
            "{}/get?track_name={}&artist_name={}",
            self.api_url,
            urlencoding::encode(&query.track_name),
            urlencoding::encode(&query.artist_name)
        );

        if let Some(duration) = query.duration_secs {
            let _ = write!(url, "&duration={duration}");
        }

        url
    }
}

/// Response from LRCLIB API
/// Note: API returns additional fields (trackName, albumName, plainLyrics) that we don't use;
/// serde ignores unknown fields by default.
#[derive(Debug, Deserialize)]
struct LrclibResponse {
    id: i64,
    #[serde(default)]
    instrumental: bool,
    #[serde(rename = "syncedLyrics")]
    synced_lyrics: Option<String>,
}

#[async_trait]
impl LyricsProvider for LrclibProvider {
    fn name(&self) -> &'static str {
        PROVIDER_ID
    }

    async fn fetch(&self, query: &LyricsQuery) -> Result<Option<String>, CoreError> {
        let url = self.get_url(query);
        info!(
            target: LOG_TARGET,
            "Fetching lyrics from LRCLIB for: {} - {} (duration: {:?}s)",
            query.artist_name, query.track_name, query.duration_secs
        );
        debug!(target: LOG_TARGET, "LRCLIB GET: {}", url);

        let response = self.client.get(&url).send().await?;
        debug!(target: LOG_TARGET, "LRCLIB response status: {}", response.status());

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            info!(target: LOG_TARGET, "LRCLIB has no match");
            return Ok(None);
        }

        if !response.status().is_success() {
            warn!(target: LOG_TARGET, "LRCLIB returned status: {}", response.status());
            return Err(CoreError::LyricsProviderFailed {
                provider: PROVIDER_ID.to_string(),
                reason: format!("LRCLIB returned status: {}", response.status()),
            });
        }

        let result: LrclibResponse = response.json().await?;

        if result.instrumental {
            debug!(target: LOG_TARGET, "Track is instrumental (lrclib id: {})", result.id);
            return Ok(None);
        }

        match result.synced_lyrics {
            Some(synced) if !synced.trim().is_empty() => {
                debug!(target: LOG_TARGET, "Got synced lyrics (lrclib id: {})", result.id);
                Ok(Some(synced))
            }
            _ => {
                info!(
                    target: LOG_TARGET,
                    "LRCLIB match has no synced lyrics (lrclib id: {})",
                    result.id
                );
                Ok(None)
            }
        }
    }
}
