use crate::cli::FetchArgs;
use crate::context::AppContext;
use lyricbridge_core::{format_timestamp, LyricLine, LyricSyncEngine, LyricsQuery, Result};
use std::io::Write;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub async fn run(ctx: &AppContext, args: FetchArgs, cancel: &CancellationToken) -> Result<()> {
    let query = build_query(&args);
    let lines = tokio::select! {
        biased;
        () = cancel.cancelled() => return Ok(()),
        lines = ctx.cache.get_or_fetch(&query) => lines?,
    };

    if lines.is_empty() {
        info!("No lyrics found for {} - {}", query.artist_name, query.track_name);
        return Ok(());
    }

    if args.play {
        play(lines, Duration::from_millis(args.position_ms), cancel).await
    } else {
        let mut stdout = std::io::stdout().lock();
        for line in &lines {
            writeln!(stdout, "{}", render_line(line))?;
        }
        Ok(())
    }
}

fn build_query(args: &FetchArgs) -> LyricsQuery {
    let mut query = LyricsQuery::new(args.title.trim(), args.artist.trim());
    if let Some(album) = args.album.as_deref().map(str::trim).filter(|a| !a.is_empty()) {
        query = query.with_album(album);
    }
    if let Some(duration) = args.duration_secs.filter(|d| *d > 0) {
        query = query.with_duration(duration);
    }
    query
}

fn render_line(line: &LyricLine) -> String {
    format!("[{}] {}", format_timestamp(line.start_time()), line.text)
}

/// Print lines as they come due until the last one or Ctrl+C
async fn play(lines: Vec<LyricLine>, position: Duration, cancel: &CancellationToken) -> Result<()> {
    let engine = LyricSyncEngine::new();
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    engine
        .start(lines, position, move |text: &str| {
            let _ = tx.send(text.to_string());
        })
        .await;

    let result: Result<()> = loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break Ok(()),
            text = rx.recv() => match text {
                Some(text) => {
                    if let Err(e) = writeln!(std::io::stdout().lock(), "{text}") {
                        break Err(e.into());
                    }
                }
                // Sender is dropped once the last line has played
                None => break Ok(()),
            },
        }
    };

    engine.stop().await;
    result
}
