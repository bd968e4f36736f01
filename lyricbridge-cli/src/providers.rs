use crate::cli::ProvidersCommand;
use crate::context::AppContext;
use lyricbridge_core::{ProviderConfig, ProviderPreference, ProviderRegistry, Result};
use std::io::Write;
use tracing::info;

type RegistryChange = fn(&mut ProviderRegistry, &str) -> Result<()>;

pub async fn run(ctx: &mut AppContext, command: ProvidersCommand) -> Result<()> {
    let (id, change): (String, RegistryChange) = match command {
        ProvidersCommand::List => {
            return print_configs(&ctx.fetcher.configs().await);
        }
        ProvidersCommand::Enable { id } => (id, |registry, id| registry.set_enabled(id, true)),
        ProvidersCommand::Disable { id } => (id, |registry, id| registry.set_enabled(id, false)),
        ProvidersCommand::Up { id } => (id, ProviderRegistry::move_up),
        ProvidersCommand::Down { id } => (id, ProviderRegistry::move_down),
    };

    let preferences = ctx
        .fetcher
        .update_registry(|registry| -> Result<_> {
            change(registry, &id)?;
            Ok(registry.preferences())
        })
        .await?;

    ctx.config.lyrics.providers = merge_preferences(&ctx.config.lyrics.providers, preferences);
    ctx.config.save_to(&ctx.config_path)?;
    info!("Saved provider settings to {}", ctx.config_path.display());

    print_configs(&ctx.fetcher.configs().await)
}

/// Registry preferences, plus saved ones for providers that failed to load
fn merge_preferences(
    saved: &[ProviderPreference],
    mut current: Vec<ProviderPreference>,
) -> Vec<ProviderPreference> {
    for preference in saved {
        if !current.iter().any(|p| p.id == preference.id) {
            current.push(preference.clone());
        }
    }
    current
}

fn print_configs(configs: &[ProviderConfig]) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    for config in configs {
        writeln!(stdout, "{}", render_config(config))?;
    }
    Ok(())
}

fn render_config(config: &ProviderConfig) -> String {
    let state = if config.is_enabled { "enabled" } else { "disabled" };
    format!("{}. {} ({}) {}", config.priority, config.id, config.name, state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lyricbridge_core::{CoreError, LyricBridgeConfig};
    use tempfile::TempDir;

    fn context(dir: &TempDir) -> AppContext {
        let mut config = LyricBridgeConfig::default();
        config.lyrics.cache_dir = Some(dir.path().join("lyrics"));
        AppContext::new(config, dir.path().join("config.toml"))
    }

    fn preference(id: &str, enabled: bool, priority: u32) -> ProviderPreference {
        ProviderPreference {
            id: id.into(),
            enabled,
            priority,
        }
    }

    #[tokio::test]
    async fn test_changes_are_persisted() {
        let dir = TempDir::new().unwrap();
        let mut ctx = context(&dir);

        run(&mut ctx, ProvidersCommand::Down { id: "lrclib".into() })
            .await
            .unwrap();
        run(&mut ctx, ProvidersCommand::Disable { id: "lrc_api".into() })
            .await
            .unwrap();

        let saved = LyricBridgeConfig::load_from(&dir.path().join("config.toml")).unwrap();
        assert_eq!(
            saved.lyrics.providers,
            [
                preference("musixmatch", true, 1),
                preference("lrclib", true, 2),
                preference("lrc_api", false, 3),
            ]
        );
    }

    #[tokio::test]
    async fn test_unknown_provider_is_an_error() {
        let dir = TempDir::new().unwrap();
        let mut ctx = context(&dir);

        let result = run(&mut ctx, ProvidersCommand::Enable { id: "nope".into() }).await;
        assert!(matches!(result, Err(CoreError::ProviderNotFound { .. })));
        assert!(!dir.path().join("config.toml").exists());
    }

    #[test]
    fn test_merge_keeps_unloaded_providers() {
        let saved = [preference("lrc_api", false, 1), preference("lrclib", true, 2)];
        let merged = merge_preferences(&saved, vec![preference("lrclib", true, 1)]);
        assert_eq!(
            merged,
            [preference("lrclib", true, 1), preference("lrc_api", false, 1)]
        );
    }

    #[test]
    fn test_render_config() {
        let mut config = ProviderConfig::new("lrclib", "LRCLib", 1);
        config.is_enabled = false;
        assert_eq!(render_config(&config), "1. lrclib (LRCLib) disabled");
    }
}
