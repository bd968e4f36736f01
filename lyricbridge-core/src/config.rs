use crate::error::{CoreError, Result};
use crate::overlay::OverlaySettings;
use crate::provider::ProviderPreference;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LyricBridgeConfig {
    #[serde(default)]
    pub lyrics: LyricsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Provider-specific tables (`[providers.<id>]`)
    #[serde(default)]
    pub providers: ProvidersConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LyricsConfig {
    /// Global switch for the lyrics overlay
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Convert Chinese lyrics to Simplified (true) or Traditional (false) script
    #[serde(default = "default_true")]
    pub simplify_chinese: bool,
    /// Overrides the default cache directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<PathBuf>,
    /// App ids whose sessions never get lyrics
    #[serde(default)]
    pub disabled_apps: Vec<String>,
    /// Saved provider order and enablement, applied over the built-in defaults
    #[serde(default)]
    pub providers: Vec<ProviderPreference>,
}

const fn default_true() -> bool {
    true
}

impl Default for LyricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            simplify_chinese: true,
            cache_dir: None,
            disabled_apps: Vec::new(),
            providers: Vec::new(),
        }
    }
}

impl LyricsConfig {
    /// Directory holding the lyrics cache files
    #[must_use]
    pub fn cache_dir(&self) -> PathBuf {
        self.cache_dir
            .clone()
            .unwrap_or_else(crate::paths::lyrics_dir)
    }

    /// Overlay gating derived from this section
    #[must_use]
    pub fn overlay_settings(&self) -> OverlaySettings {
        OverlaySettings {
            enabled: self.enabled,
            disabled_apps: self.disabled_apps.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Also write logs to the data directory's log file
    #[serde(default)]
    pub enabled: bool,
}

/// Provider tables keyed by provider id, decoded on demand by each provider crate
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProvidersConfig {
    tables: BTreeMap<String, toml::Value>,
}

impl ProvidersConfig {
    /// Decode the table for `id`; `Ok(None)` when it is absent.
    ///
    /// # Errors
    ///
    /// Returns `ConfigInvalid` if the table does not match `T`.
    pub fn get<T: DeserializeOwned>(&self, id: &str) -> Result<Option<T>> {
        self.tables
            .get(id)
            .map(|value| {
                value
                    .clone()
                    .try_into()
                    .map_err(|e: toml::de::Error| CoreError::ConfigInvalid {
                        message: format!("providers.{id}: {}", e.message()),
                    })
            })
            .transpose()
    }

    /// Whether a table exists for `id`
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.tables.contains_key(id)
    }
}

impl LyricBridgeConfig {
    /// Get the config file path (~/.config/lyricbridge/config.toml)
    #[must_use]
    pub fn config_path() -> PathBuf {
        crate::paths::config_path()
    }

    /// Load config from the default location, creating it from a template on first run
    ///
    /// # Errors
    ///
    /// Returns `ConfigNotFound` after writing the template, or an error if the
    /// file cannot be read, parsed or validated.
    pub fn load_or_create(provider_templates: &[&str]) -> Result<Self> {
        Self::load_or_create_at(
            &Self::config_path(),
            &build_config_template(provider_templates),
        )
    }

    /// Load config from `path`, writing `template` there if the file is missing
    ///
    /// # Errors
    ///
    /// Returns `ConfigNotFound` after writing the template, or an error if the
    /// file cannot be read, parsed or validated.
    pub fn load_or_create_at(path: &Path, template: &str) -> Result<Self> {
        if !path.exists() {
            // Create config directory if it doesn't exist
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }

            // Write template config
            fs::write(path, template)?;

            return Err(CoreError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        Self::load_from(path)
    }

    /// Load and validate config from `path`
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse and validate config text
    ///
    /// # Errors
    ///
    /// Returns `ConfigParseError` for malformed TOML and `ConfigInvalid` for
    /// inconsistent values.
    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Write config to the default location
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path())
    }

    /// Write config to `path`
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)?;
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for preference in &self.lyrics.providers {
            if preference.id.trim().is_empty() {
                return Err(CoreError::ConfigMissingField {
                    field: "lyrics.providers.id".into(),
                });
            }
            if !seen.insert(preference.id.as_str()) {
                return Err(CoreError::ConfigInvalid {
                    message: format!("provider {} is listed more than once", preference.id),
                });
            }
        }

        if self
            .lyrics
            .cache_dir
            .as_ref()
            .is_some_and(|dir| dir.as_os_str().is_empty())
        {
            return Err(CoreError::ConfigInvalid {
                message: "lyrics.cache_dir must not be empty".into(),
            });
        }

        Ok(())
    }
}

/// Config template with provider sections appended after the base settings
#[must_use]
pub fn build_config_template(provider_templates: &[&str]) -> String {
    let mut template = String::from(BASE_CONFIG_TEMPLATE);
    for provider_template in provider_templates {
        template.push('\n');
        template.push_str(provider_template);
    }
    template
}

const BASE_CONFIG_TEMPLATE: &str = r#"# LyricBridge Configuration
# ~/.config/lyricbridge/config.toml

[lyrics]
# Show the current lyric line in place of the track metadata
enabled = true
# Convert Chinese lyrics to Simplified (true) or Traditional (false) script
simplify_chinese = true
# Cache directory (default: ~/.local/share/lyricbridge/lyrics)
# cache_dir = "/path/to/lyrics"
# App ids that never get lyrics
disabled_apps = []
# Provider order and enablement are managed with `lyricbridge providers`

[logging]
# Also write logs to ~/.local/share/lyricbridge/lyricbridge.log
enabled = false
"#;
