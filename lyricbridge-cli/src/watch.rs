//! Now-playing mirror loop.
//!
//! Each stdin line is one JSON [`NowPlaying`] snapshot. Every overlay update
//! is printed to stdout as one JSON line.

use crate::context::AppContext;
use lyricbridge_core::{NowPlaying, OverlayManager, OverlayMetadata, Result};
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub async fn run(ctx: &AppContext, cancel: &CancellationToken) -> Result<()> {
    if !ctx.config.lyrics.enabled {
        info!("Lyrics are disabled in the config, overlay updates will only clear metadata");
    }

    let overlay = OverlayManager::new(Arc::clone(&ctx.cache), ctx.config.lyrics.overlay_settings());
    let stdin = BufReader::new(tokio::io::stdin());

    mirror(&overlay, ctx, stdin, cancel, |metadata| {
        match serde_json::to_string(metadata) {
            Ok(line) => writeln!(std::io::stdout().lock(), "{line}"),
            Err(e) => {
                warn!("Failed to encode overlay metadata: {}", e);
                Ok(())
            }
        }
    })
    .await
}

/// Feed snapshots from `input` into `overlay` until EOF or cancellation
async fn mirror<R, F>(
    overlay: &OverlayManager,
    ctx: &AppContext,
    input: R,
    cancel: &CancellationToken,
    on_metadata: F,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    F: FnMut(&OverlayMetadata) -> std::io::Result<()> + Send + 'static,
{
    let shutdown = cancel.child_token();
    let printer = spawn_printer(overlay.subscribe(), shutdown.clone(), on_metadata);
    let watcher = overlay.watch_repository(ctx.repository.subscribe(), shutdown.clone());

    let result = read_snapshots(overlay, input, cancel).await;

    overlay.stop().await;
    shutdown.cancel();
    for task in [printer, watcher] {
        if let Err(e) = task.await {
            warn!("Background task ended abnormally: {}", e);
        }
    }

    result
}

async fn read_snapshots<R>(
    overlay: &OverlayManager,
    input: R,
    cancel: &CancellationToken,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    loop {
        let line = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                info!("Shutting down now-playing mirror");
                return Ok(());
            }
            line = lines.next_line() => line?,
        };

        let Some(line) = line else {
            info!("Now-playing input closed");
            return Ok(());
        };
        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<NowPlaying>(&line) {
            Ok(now) => {
                debug!("Now playing: {} - {} ({})", now.artist, now.title, now.app_id);
                overlay.update(now).await;
            }
            Err(e) => warn!("Ignoring malformed now-playing snapshot: {}", e),
        }
    }
}

fn spawn_printer<F>(
    mut updates: broadcast::Receiver<OverlayMetadata>,
    shutdown: CancellationToken,
    mut on_metadata: F,
) -> JoinHandle<()>
where
    F: FnMut(&OverlayMetadata) -> std::io::Result<()> + Send + 'static,
{
    tokio::spawn(async move {
        loop {
            tokio::select! {
                () = shutdown.cancelled() => break,
                received = updates.recv() => match received {
                    Ok(metadata) => {
                        if let Err(e) = on_metadata(&metadata) {
                            warn!("Stopped writing overlay updates: {}", e);
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("Dropped {} overlay updates", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            }
        }
    })
}
