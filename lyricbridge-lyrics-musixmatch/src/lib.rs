use async_trait::async_trait;
use const_format::concatcp;
use lyricbridge_core::{CoreError, LyricsProvider, LyricsQuery, ProvidersConfig};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};

const LOG_TARGET: &str = "lyricbridge::provider::musixmatch";

/// Provider id used in config files and the provider registry
pub const PROVIDER_ID: &str = "musixmatch";

/// Human-readable provider name
pub const DISPLAY_NAME: &str = "Musixmatch";

/// Position in the provider chain before user preferences are applied
pub const DEFAULT_PRIORITY: u32 = 2;

/// `RapidAPI` host serving the Musixmatch lyrics API
pub const RAPIDAPI_HOST: &str = "musixmatch-lyrics-songs.p.rapidapi.com";

const DEFAULT_API_URL: &str = concatcp!("https://", RAPIDAPI_HOST);

/// Default timeout for HTTP requests (10 seconds)
const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Musixmatch-specific configuration (`[providers.musixmatch]`)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MusixmatchProviderConfig {
    /// `RapidAPI` key; the provider stays silent without one
    #[serde(default)]
    pub api_key: String,
}

impl MusixmatchProviderConfig {
    /// Extract Musixmatch config from the dynamic providers config.
    ///
    /// # Errors
    ///
    /// Returns an error if the `[providers.musixmatch]` table is malformed.
    pub fn from_providers(providers: &ProvidersConfig) -> Result<Option<Self>, CoreError> {
        providers.get(PROVIDER_ID)
    }
}

/// Config template for the Musixmatch provider.
/// This is appended to the base config template when creating a new config file.
pub const CONFIG_TEMPLATE: &str = concatcp!(
    "[providers.",
    PROVIDER_ID,
    r#"]
# Required for this provider: subscribe to the Musixmatch API on RapidAPI
# (https://rapidapi.com) and paste the key here
api_key = ""
"#
);

/// Musixmatch lyrics provider, reached through `RapidAPI`
pub struct MusixmatchProvider {
    client: reqwest::Client,
    api_url: String,
    api_key: Option<String>,
}

impl MusixmatchProvider {
    /// Create a new Musixmatch provider. A blank key disables lookups.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(api_key: Option<String>) -> Result<Self, CoreError> {
        Self::with_api_url(DEFAULT_API_URL, api_key)
    }

    /// Create a provider from the `[providers.musixmatch]` table, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the table is malformed or the HTTP client cannot be created.
    pub fn from_config(providers: &ProvidersConfig) -> Result<Self, CoreError> {
        let config = MusixmatchProviderConfig::from_providers(providers)?.unwrap_or_default();
        Self::new(Some(config.api_key))
    }

    /// Create a provider against a different API root.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn with_api_url(
        api_url: impl Into<String>,
        api_key: Option<String>,
    ) -> Result<Self, CoreError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(5))
            .build()?;

        Ok(Self {
            client,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            api_key: api_key
                .map(|key| key.trim().to_string())
                .filter(|key| !key.is_empty()),
        })
    }

    /// Whether an API key is configured
    #[must_use]
    pub const fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }
}

#[async_trait]
impl LyricsProvider for MusixmatchProvider {
    fn name(&self) -> &'static str {
        PROVIDER_ID
    }

    async fn fetch(&self, query: &LyricsQuery) -> Result<Option<String>, CoreError> {
        let Some(api_key) = self.api_key.as_deref() else {
            debug!(target: LOG_TARGET, "No Musixmatch API key configured, skipping");
            return Ok(None);
        };

        let url = format!(
            "{}/songs/lyrics?t={}&a={}&type=text",
            self.api_url,
            urlencoding::encode(&query.track_name),
            urlencoding::encode(&query.artist_name)
        );
        info!(
            target: LOG_TARGET,
            "Fetching lyrics from Musixmatch for: {} - {}",
            query.artist_name, query.track_name
        );

        let response = self
            .client
            .get(&url)
            .header("x-rapidapi-host", RAPIDAPI_HOST)
            .header("x-rapidapi-key", api_key)
            .send()
            .await?;
        debug!(target: LOG_TARGET, "Musixmatch response status: {}", response.status());

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            info!(target: LOG_TARGET, "Musixmatch has no match");
            return Ok(None);
        }

        if !response.status().is_success() {
            warn!(target: LOG_TARGET, "Musixmatch returned status: {}", response.status());
            return Err(CoreError::LyricsProviderFailed {
                provider: PROVIDER_ID.to_string(),
                reason: format!("Musixmatch returned status: {}", response.status()),
            });
        }

        let body = response.text().await?;
        if body.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(body))
    }
}
