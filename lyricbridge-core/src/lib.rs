pub mod cache;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod lrc;
pub mod overlay;
pub mod paths;
pub mod playback;
pub mod provider;
pub mod repository;
pub mod sync;
pub mod time;

pub use cache::{CacheKey, LyricCache};
pub use config::{
    build_config_template, LoggingConfig, LyricBridgeConfig, LyricsConfig, ProvidersConfig,
};
pub use error::{CoreError, Result};
pub use fetcher::LyricsFetcher;
pub use lrc::{
    format_timestamp, shift_timestamps, ChineseScript, LrcParser, LyricLine,
    PassthroughConverter, ScriptConverter, ZhconvConverter,
};
pub use overlay::{OverlayManager, OverlayMetadata, OverlaySettings};
pub use paths::{
    config_dir, config_path, data_dir, log_file_path, lyrics_dir, CONFIG_DIR_NAME,
    CONFIG_FILE_NAME, LOG_FILE_NAME, LYRICS_DIR_NAME, LYRICS_FILE_EXTENSION,
};
pub use playback::NowPlaying;
pub use provider::{
    LyricsProvider, LyricsQuery, ProviderConfig, ProviderPreference, ProviderRegistry,
    RegisteredProvider,
};
pub use repository::{LyricsEntry, LyricsRepository};
pub use sync::LyricSyncEngine;
pub use time::DurationExt;
