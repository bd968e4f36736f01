use crate::cli::LyricsCommand;
use crate::context::AppContext;
use lyricbridge_core::{CacheKey, LyricsEntry, Result};
use std::io::Write;
use tokio::io::AsyncReadExt;
use tracing::info;

pub async fn run(ctx: &AppContext, command: LyricsCommand) -> Result<()> {
    let repository = &ctx.repository;
    match command {
        LyricsCommand::List => {
            let entries = repository.list_all().await?;
            if entries.is_empty() {
                info!("No cached lyrics in {}", repository.cache().dir().display());
            }
            let mut stdout = std::io::stdout().lock();
            for entry in &entries {
                writeln!(stdout, "{}", render_entry(entry))?;
            }
        }
        LyricsCommand::Show { key } => {
            let key = CacheKey::parse(&key)?;
            let text = repository.load_text(&key).await?;
            if text.trim().is_empty() {
                info!("No lyrics stored for {}", key);
            } else {
                std::io::stdout().lock().write_all(text.as_bytes())?;
            }
        }
        LyricsCommand::Save { key, file } => {
            let key = CacheKey::parse(&key)?;
            let content = match file {
                Some(path) => tokio::fs::read_to_string(&path).await?,
                None => {
                    let mut content = String::new();
                    tokio::io::stdin().read_to_string(&mut content).await?;
                    content
                }
            };
            repository.save_text(&key, &content).await?;
            info!("Saved lyrics for {}", key);
        }
        LyricsCommand::Delete { keys } => {
            let keys = parse_keys(&keys)?;
            repository.delete(&keys).await?;
            info!("Deleted {} lyrics file(s)", keys.len());
        }
        LyricsCommand::Shift { keys, by_ms } => {
            let keys = parse_keys(&keys)?;
            repository.shift_timestamps(&keys, by_ms).await?;
            info!("Shifted {} lyrics file(s) by {} ms", keys.len(), by_ms);
        }
    }
    Ok(())
}

fn parse_keys(keys: &[String]) -> Result<Vec<CacheKey>> {
    keys.iter().map(|key| CacheKey::parse(key)).collect()
}

fn render_entry(entry: &LyricsEntry) -> String {
    let status = if entry.has_lyrics { "lyrics" } else { "none" };
    format!("{}\t{}\t{}\t{}", entry.key, entry.title, entry.artist, status)
}
