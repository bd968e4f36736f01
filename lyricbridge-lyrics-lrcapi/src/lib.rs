//! Provider for self-hosted LRC API servers.
//!
//! The server answers `GET {base_url}?title=..&artist=..` with raw LRC text.

use async_trait::async_trait;
use const_format::concatcp;
use lyricbridge_core::{CoreError, LyricsProvider, LyricsQuery, ProvidersConfig};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

const LOG_TARGET: &str = "lyricbridge::provider::lrc_api";

/// Provider id used in config files and the provider registry
pub const PROVIDER_ID: &str = "lrc_api";

/// Human-readable provider name
pub const DISPLAY_NAME: &str = "LRC API";

/// Position in the provider chain before user preferences are applied
pub const DEFAULT_PRIORITY: u32 = 3;

/// Default timeout for HTTP requests (10 seconds)
const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// LRC API configuration (`[providers.lrc_api]`)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LrcApiProviderConfig {
    /// Lyrics endpoint of the server, e.g. `http://192.168.1.10:28883/lyrics`
    #[serde(default)]
    pub base_url: String,
}

impl LrcApiProviderConfig {
    /// Extract LRC API config from the dynamic providers config.
    ///
    /// # Errors
    ///
    /// Returns an error if the `[providers.lrc_api]` table is malformed.
    pub fn from_providers(providers: &ProvidersConfig) -> Result<Option<Self>, CoreError> {
        providers.get(PROVIDER_ID)
    }
}

/// Config template for the LRC API provider.
/// This is appended to the base config template when creating a new config file.
pub const CONFIG_TEMPLATE: &str = concatcp!(
    "[providers.",
    PROVIDER_ID,
    r#"]
# Required for this provider: lyrics endpoint of a self-hosted LRC API server
# e.g. "http://192.168.1.10:28883/lyrics"
base_url = ""
"#
);

/// Lyrics provider backed by a self-hosted LRC API server
pub struct LrcApiProvider {
    client: reqwest::Client,
    base_url: Option<Url>,
}

impl LrcApiProvider {
    /// Create a provider for `base_url`. A missing or blank URL disables lookups.
    ///
    /// # Errors
    ///
    /// Returns `ConfigInvalid` if the URL cannot be parsed, or an error if the
    /// HTTP client cannot be created.
    pub fn new(base_url: Option<&str>) -> Result<Self, CoreError> {
        let base_url = base_url
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .map(|url| {
                Url::parse(url).map_err(|e| CoreError::ConfigInvalid {
                    message: format!("providers.{PROVIDER_ID}.base_url {url:?}: {e}"),
                })
            })
            .transpose()?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(5))
            .build()?;

        Ok(Self { client, base_url })
    }

    /// Create a provider from the `[providers.lrc_api]` table, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the table is malformed, the URL is invalid or the
    /// HTTP client cannot be created.
    pub fn from_config(providers: &ProvidersConfig) -> Result<Self, CoreError> {
        let config = LrcApiProviderConfig::from_providers(providers)?.unwrap_or_default();
        Self::new(Some(&config.base_url))
    }

    /// Whether a server URL is configured
    #[must_use]
    pub const fn is_configured(&self) -> bool {
        self.base_url.is_some()
    }

    fn lyrics_url(base_url: &Url, query: &LyricsQuery) -> Url {
        let mut url = base_url.clone();
        url.query_pairs_mut()
            .append_pair("title", &query.track_name)
            .append_pair("artist", &query.artist_name);
        url
    }
}

#[async_trait]
impl LyricsProvider for LrcApiProvider {
    fn name(&self) -> &'static str {
        PROVIDER_ID
    }

    async fn fetch(&self, query: &LyricsQuery) -> Result<Option<String>, CoreError> {
        let Some(base_url) = &self.base_url else {
            debug!(target: LOG_TARGET, "No LRC API server configured, skipping");
            return Ok(None);
        };

        let url = Self::lyrics_url(base_url, query);
        info!(
            target: LOG_TARGET,
            "Fetching lyrics from LRC API for: {} - {}",
            query.artist_name, query.track_name
        );
        debug!(target: LOG_TARGET, "LRC API GET: {}", url);

        let response = self.client.get(url).send().await?;
        debug!(target: LOG_TARGET, "LRC API response status: {}", response.status());

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            info!(target: LOG_TARGET, "LRC API has no match");
            return Ok(None);
        }

        if !response.status().is_success() {
            warn!(target: LOG_TARGET, "LRC API returned status: {}", response.status());
            return Err(CoreError::LyricsProviderFailed {
                provider: PROVIDER_ID.to_string(),
                reason: format!("LRC API returned status: {}", response.status()),
            });
        }

        let body = response.text().await?;
        if body.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(body))
    }
}
