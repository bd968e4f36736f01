use lyricbridge_core::{
    LrcParser, LyricBridgeConfig, LyricCache, LyricsFetcher, LyricsProvider, LyricsRepository,
    ProviderConfig, ProviderRegistry, ZhconvConverter,
};
use lyricbridge_lyrics_lrcapi::LrcApiProvider;
use lyricbridge_lyrics_lrclib::LrclibProvider;
use lyricbridge_lyrics_musixmatch::MusixmatchProvider;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

/// Config templates of every built-in provider, appended to a new config file
pub const PROVIDER_TEMPLATES: &[&str] = &[
    lyricbridge_lyrics_lrclib::CONFIG_TEMPLATE,
    lyricbridge_lyrics_musixmatch::CONFIG_TEMPLATE,
    lyricbridge_lyrics_lrcapi::CONFIG_TEMPLATE,
];

/// Everything a command needs, wired from the loaded config
pub struct AppContext {
    pub config: LyricBridgeConfig,
    pub config_path: PathBuf,
    pub fetcher: Arc<LyricsFetcher>,
    pub cache: Arc<LyricCache>,
    pub repository: LyricsRepository,
}

impl AppContext {
    pub fn new(config: LyricBridgeConfig, config_path: PathBuf) -> Self {
        let registry = create_registry(&config);
        let provider_names: Vec<_> = registry
            .enabled_providers()
            .iter()
            .map(|p| p.config.name.clone())
            .collect();
        info!(
            "Initialized {} lyrics provider(s): {:?}",
            provider_names.len(),
            provider_names
        );

        let fetcher = Arc::new(LyricsFetcher::new(registry));
        let cache = Arc::new(
            LyricCache::new(config.lyrics.cache_dir(), Arc::clone(&fetcher))
                .with_parser(LrcParser::new(Arc::new(ZhconvConverter)))
                .with_simplify(config.lyrics.simplify_chinese),
        );
        let repository = LyricsRepository::new(Arc::clone(&cache));

        Self {
            config,
            config_path,
            fetcher,
            cache,
            repository,
        }
    }
}

/// Register the built-in providers, then apply the persisted preferences.
///
/// A provider that cannot be created is logged and left out of the chain.
pub fn create_registry(config: &LyricBridgeConfig) -> ProviderRegistry {
    let mut registry = ProviderRegistry::new();

    let lrclib = LrclibProvider::from_config(&config.providers);
    register(
        &mut registry,
        ProviderConfig::new(
            lyricbridge_lyrics_lrclib::PROVIDER_ID,
            lyricbridge_lyrics_lrclib::DISPLAY_NAME,
            lyricbridge_lyrics_lrclib::DEFAULT_PRIORITY,
        ),
        lrclib.map(|p| Arc::new(p) as Arc<dyn LyricsProvider>),
    );

    let musixmatch = MusixmatchProvider::from_config(&config.providers);
    if let Ok(provider) = &musixmatch {
        if !provider.is_configured() {
            info!("Musixmatch provider has no API key, it will be skipped");
        }
    }
    register(
        &mut registry,
        ProviderConfig::new(
            lyricbridge_lyrics_musixmatch::PROVIDER_ID,
            lyricbridge_lyrics_musixmatch::DISPLAY_NAME,
            lyricbridge_lyrics_musixmatch::DEFAULT_PRIORITY,
        ),
        musixmatch.map(|p| Arc::new(p) as Arc<dyn LyricsProvider>),
    );

    let lrc_api = LrcApiProvider::from_config(&config.providers);
    if let Ok(provider) = &lrc_api {
        if !provider.is_configured() {
            info!("LRC API provider has no base URL, it will be skipped");
        }
    }
    register(
        &mut registry,
        ProviderConfig::new(
            lyricbridge_lyrics_lrcapi::PROVIDER_ID,
            lyricbridge_lyrics_lrcapi::DISPLAY_NAME,
            lyricbridge_lyrics_lrcapi::DEFAULT_PRIORITY,
        ),
        lrc_api.map(|p| Arc::new(p) as Arc<dyn LyricsProvider>),
    );

    registry.apply_preferences(&config.lyrics.providers);
    registry
}

fn register(
    registry: &mut ProviderRegistry,
    config: ProviderConfig,
    provider: lyricbridge_core::Result<Arc<dyn LyricsProvider>>,
) {
    match provider {
        Ok(provider) => registry.register(config, provider),
        Err(e) => error!("Failed to create {} provider: {}", config.name, e),
    }
}
