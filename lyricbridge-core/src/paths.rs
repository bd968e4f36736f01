//! Path constants for configuration, cache and log files.

use std::path::PathBuf;

/// The name of the configuration directory under ~/.config/
pub const CONFIG_DIR_NAME: &str = "lyricbridge";

/// The name of the main configuration file
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// The name of the lyrics cache directory under the data directory
pub const LYRICS_DIR_NAME: &str = "lyrics";

/// Extension of per-track lyrics cache files
pub const LYRICS_FILE_EXTENSION: &str = "lrt";

/// The name of the log file written when file logging is enabled
pub const LOG_FILE_NAME: &str = "lyricbridge.log";

/// Get the configuration directory path (~/.config/lyricbridge/)
#[must_use]
pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join(CONFIG_DIR_NAME)
}

/// Get the config file path (~/.config/lyricbridge/config.toml)
#[must_use]
pub fn config_path() -> PathBuf {
    config_dir().join(CONFIG_FILE_NAME)
}

/// Get the data directory path (`~/.local/share/lyricbridge/` on Linux)
#[must_use]
pub fn data_dir() -> PathBuf {
    dirs::data_dir().map_or_else(config_dir, |dir| dir.join(CONFIG_DIR_NAME))
}

/// Get the default lyrics cache directory (`<data dir>/lyrics/`)
#[must_use]
pub fn lyrics_dir() -> PathBuf {
    data_dir().join(LYRICS_DIR_NAME)
}

/// Get the log file path (`<data dir>/lyricbridge.log`)
#[must_use]
pub fn log_file_path() -> PathBuf {
    data_dir().join(LOG_FILE_NAME)
}
