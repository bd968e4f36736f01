mod cli;
mod context;
mod fetch;
mod lyrics;
mod providers;
mod watch;

use crate::cli::{Cli, Command};
use crate::context::{AppContext, PROVIDER_TEMPLATES};
use clap::Parser;
use lyricbridge_core::{build_config_template, CoreError, LyricBridgeConfig};
use std::fs::File;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn main() -> ExitCode {
    let cli = Cli::parse();
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(LyricBridgeConfig::config_path);

    // Check config for logging.enabled before full config load
    init_tracing(check_file_logging_enabled(&config_path));

    let config = match load_config(&config_path) {
        Ok(config) => config,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            error!("Failed to create tokio runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    // Create shared cancellation token for graceful shutdown
    let cancel_token = CancellationToken::new();

    let ctrlc_token = cancel_token.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        info!("Received Ctrl+C, shutting down gracefully...");
        ctrlc_token.cancel();
    }) {
        error!("Failed to set Ctrl+C handler: {}", e);
    }

    let result = runtime.block_on(async {
        let mut ctx = AppContext::new(config, config_path);
        run(&mut ctx, cli.command, &cancel_token).await
    });

    // A blocked stdin read must not keep the process alive
    runtime.shutdown_background();

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(
    ctx: &mut AppContext,
    command: Command,
    cancel_token: &CancellationToken,
) -> lyricbridge_core::Result<()> {
    match command {
        Command::Watch => watch::run(ctx, cancel_token).await,
        Command::Fetch(args) => fetch::run(ctx, args, cancel_token).await,
        Command::Lyrics(command) => lyrics::run(ctx, command).await,
        Command::Providers(command) => providers::run(ctx, command).await,
    }
}

/// Load config, writing the template on first run
fn load_config(path: &Path) -> lyricbridge_core::Result<LyricBridgeConfig> {
    let template = build_config_template(PROVIDER_TEMPLATES);
    match LyricBridgeConfig::load_or_create_at(path, &template) {
        Err(CoreError::ConfigNotFound { path }) => {
            warn!(
                "Created a config template at {}; edit it to configure providers",
                path.display()
            );
            LyricBridgeConfig::load_from(&path)
        }
        Err(CoreError::ConfigParseError(parse_error)) => {
            error!(
                "Config file {} has a syntax error; fix it or delete it to regenerate the template",
                path.display()
            );
            Err(CoreError::ConfigParseError(parse_error))
        }
        result => result,
    }
}

fn check_file_logging_enabled(config_path: &Path) -> bool {
    // Minimal structs to parse just the logging.enabled field
    #[derive(serde::Deserialize)]
    struct PartialConfig {
        #[serde(default)]
        logging: PartialLoggingConfig,
    }
    #[derive(serde::Deserialize, Default)]
    struct PartialLoggingConfig {
        #[serde(default)]
        enabled: bool,
    }

    let Ok(content) = std::fs::read_to_string(config_path) else {
        return false;
    };

    toml::from_str::<PartialConfig>(&content)
        .map(|c| c.logging.enabled)
        .unwrap_or(false)
}

/// Initialize tracing with stderr output and optional file logging.
///
/// Stdout is reserved for command output.
fn init_tracing(file_logging_enabled: bool) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,reqwest=warn,hyper=warn"));

    let fmt_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    if file_logging_enabled {
        let log_path = lyricbridge_core::paths::log_file_path();

        if let Some(parent) = log_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }

        match File::create(&log_path) {
            Ok(file) => {
                let file_layer = tracing_subscriber::fmt::layer()
                    .with_writer(Arc::new(file))
                    .with_ansi(false);

                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt_layer)
                    .with(file_layer)
                    .init();

                return;
            }
            Err(e) => {
                eprintln!("Failed to create log file at {}: {e}", log_path.display());
            }
        }
    }

    // Fallback: console only
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_first_run_writes_template_and_loads_it() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = load_config(&path).unwrap();
        assert!(path.exists());
        assert!(config.lyrics.enabled);
        assert!(config.providers.contains("musixmatch"));

        // Second run reads the same file
        assert!(load_config(&path).is_ok());
    }

    #[test]
    fn test_syntax_error_is_reported() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[lyrics\nenabled = ").unwrap();

        assert!(matches!(
            load_config(&path),
            Err(CoreError::ConfigParseError(_))
        ));
    }

    #[test]
    fn test_file_logging_flag() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        assert!(!check_file_logging_enabled(&path));

        std::fs::write(&path, "[logging]\nenabled = true\n").unwrap();
        assert!(check_file_logging_enabled(&path));

        std::fs::write(&path, "not = [valid").unwrap();
        assert!(!check_file_logging_enabled(&path));
    }
}
