//! Mirrors now-playing snapshots into metadata that shows the current lyric line.

use crate::cache::{CacheKey, LyricCache};
use crate::playback::{millis, NowPlaying};
use crate::sync::LyricSyncEngine;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

const LOG_TARGET: &str = "lyricbridge::overlay";

/// Metadata presented in place of the app's own while lyrics are showing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OverlayMetadata {
    pub title: String,
    pub artist: String,
    pub album: String,
    #[serde(rename = "duration_ms", with = "millis")]
    pub duration: Duration,
}

impl OverlayMetadata {
    /// Metadata for `now` showing `line`.
    ///
    /// With a lyric the title becomes the line and the track details move into
    /// the artist field. A blank line restores the original title.
    #[must_use]
    pub fn for_line(now: &NowPlaying, line: &str) -> Self {
        let (title, artist) = if line.trim().is_empty() {
            (now.title.clone(), join_non_blank(&[&now.artist, &now.album]))
        } else {
            (
                line.to_string(),
                join_non_blank(&[&now.title, &now.artist, &now.album]),
            )
        };

        Self {
            title,
            artist,
            album: format!("From {}", now.app_name),
            duration: now.duration,
        }
    }

    /// Original track details, no lyric
    #[must_use]
    pub fn restored(now: &NowPlaying) -> Self {
        Self::for_line(now, "")
    }
}

fn join_non_blank(parts: &[&str]) -> String {
    parts
        .iter()
        .filter(|part| !part.trim().is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(" - ")
}

/// Which snapshots get lyrics at all
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlaySettings {
    pub enabled: bool,
    /// App ids whose sessions never get lyrics
    pub disabled_apps: Vec<String>,
}

impl Default for OverlaySettings {
    fn default() -> Self {
        Self {
            enabled: true,
            disabled_apps: Vec::new(),
        }
    }
}

impl OverlaySettings {
    fn allows(&self, now: &NowPlaying) -> bool {
        if !self.enabled {
            debug!(target: LOG_TARGET, "Lyrics globally disabled");
            return false;
        }
        if self.disabled_apps.iter().any(|app| *app == now.app_id) {
            debug!(target: LOG_TARGET, "Lyrics disabled for app: {}", now.app_id);
            return false;
        }
        true
    }
}

struct OverlayInner {
    cache: Arc<LyricCache>,
    engine: LyricSyncEngine,
    settings: RwLock<OverlaySettings>,
    current: Mutex<Option<NowPlaying>>,
    lookup: Mutex<Option<JoinHandle<()>>>,
    metadata_tx: broadcast::Sender<OverlayMetadata>,
}

/// Drives lyric lookup and timed playback for the track that is playing.
///
/// Every emitted [`OverlayMetadata`] goes out on a broadcast channel.
#[derive(Clone)]
pub struct OverlayManager {
    inner: Arc<OverlayInner>,
}

impl OverlayManager {
    #[must_use]
    pub fn new(cache: Arc<LyricCache>, settings: OverlaySettings) -> Self {
        let (metadata_tx, _) = broadcast::channel(64);
        Self {
            inner: Arc::new(OverlayInner {
                cache,
                engine: LyricSyncEngine::new(),
                settings: RwLock::new(settings),
                current: Mutex::new(None),
                lookup: Mutex::new(None),
                metadata_tx,
            }),
        }
    }

    /// Subscribe to overlay metadata updates
    pub fn subscribe(&self) -> broadcast::Receiver<OverlayMetadata> {
        self.inner.metadata_tx.subscribe()
    }

    /// Replace the settings; they apply from the next update
    pub async fn set_settings(&self, settings: OverlaySettings) {
        *self.inner.settings.write().await = settings;
    }

    /// The snapshot lyrics are currently shown for
    pub async fn current(&self) -> Option<NowPlaying> {
        self.inner.current.lock().await.clone()
    }

    /// Handle a new now-playing snapshot.
    ///
    /// Paused, blank or disabled snapshots stop the overlay. Anything else
    /// replaces the previous lookup and restarts playback at the snapshot's
    /// position.
    pub async fn update(&self, now: NowPlaying) {
        let allowed = self.inner.settings.read().await.allows(&now);
        if !allowed || !now.is_playing || !now.has_track() {
            self.stop().await;
            return;
        }

        info!(
            target: LOG_TARGET,
            "Starting lyrics for: {} - {} by {}",
            now.app_id, now.title, now.artist
        );
        // Held until the new lookup is owned; stop and the watcher take it first too
        let mut current = self.inner.current.lock().await;
        *current = Some(now.clone());
        self.inner.restart(now).await;
    }

    /// Stop the lookup and line playback
    pub async fn stop(&self) {
        let mut current = self.inner.current.lock().await;
        self.inner.cancel_lookup().await;
        self.inner.engine.stop().await;
        if current.take().is_some() {
            debug!(target: LOG_TARGET, "Overlay stopped");
        }
    }

    /// Restart the overlay whenever the lyrics of the playing track change.
    ///
    /// `updates` usually comes from `LyricsRepository::subscribe`.
    pub fn watch_repository(
        &self,
        mut updates: broadcast::Receiver<CacheKey>,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            loop {
                let key = tokio::select! {
                    () = cancel.cancelled() => break,
                    received = updates.recv() => match received {
                        Ok(key) => key,
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!(target: LOG_TARGET, "Missed {} lyrics updates", skipped);
                            continue;
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                };

                let current = inner.current.lock().await;
                let Some(now) = current
                    .as_ref()
                    .filter(|now| CacheKey::new(&now.title, &now.artist) == key)
                    .cloned()
                else {
                    continue;
                };
                info!(
                    target: LOG_TARGET,
                    "Lyrics for current song updated, restarting display"
                );
                inner.engine.stop().await;
                inner.restart(now).await;
                drop(current);
            }
            debug!(target: LOG_TARGET, "Repository watcher stopped");
        })
    }
}

impl OverlayInner {
    /// Cancel any running lookup, wait for it, then start a new one
    async fn restart(self: &Arc<Self>, now: NowPlaying) {
        let mut lookup = self.lookup.lock().await;
        if let Some(previous) = lookup.take() {
            previous.abort();
            let _ = previous.await;
        }

        let inner = Arc::clone(self);
        *lookup = Some(tokio::spawn(async move { inner.show_lyrics(now).await }));
    }

    async fn cancel_lookup(&self) {
        if let Some(previous) = self.lookup.lock().await.take() {
            previous.abort();
            let _ = previous.await;
        }
    }

    async fn show_lyrics(&self, now: NowPlaying) {
        let lines = match self.cache.get_or_fetch(&now.to_query()).await {
            Ok(lines) => lines,
            Err(e) => {
                error!(
                    target: LOG_TARGET,
                    "Lyrics cache failed for {} - {}: {}",
                    now.artist, now.title, e
                );
                Vec::new()
            }
        };

        if lines.is_empty() {
            info!(target: LOG_TARGET, "Lyrics not found: {}", now.title);
            self.engine.stop().await;
            let _ = self.metadata_tx.send(OverlayMetadata::restored(&now));
            return;
        }

        let position = now.interpolated_position();
        let metadata_tx = self.metadata_tx.clone();
        self.engine
            .start(lines, position, move |line| {
                let _ = metadata_tx.send(OverlayMetadata::for_line(&now, line));
            })
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::LyricsFetcher;
    use crate::provider::testing::{registry_of, Reply, StubProvider};
    use crate::repository::LyricsRepository;
    use tempfile::TempDir;

    const LRC: &str = "[00:00.00]First\n[00:02.00]Second\n";

    fn song() -> NowPlaying {
        NowPlaying::new("Song Title", "Artist Name")
            .with_album("Album Name")
            .with_duration(Duration::from_secs(200))
            .with_app("MusicApp", "com.music.app")
    }

    struct Fixture {
        _tmp: TempDir,
        repository: LyricsRepository,
        manager: OverlayManager,
    }

    impl Fixture {
        fn new(reply: Reply) -> Self {
            Self::with_settings(reply, OverlaySettings::default())
        }

        fn with_settings(reply: Reply, settings: OverlaySettings) -> Self {
            let tmp = TempDir::new().unwrap();
            let provider = StubProvider::new("p", reply);
            let fetcher = Arc::new(LyricsFetcher::new(registry_of(&[provider])));
            let cache = Arc::new(LyricCache::new(tmp.path().join("lyrics"), fetcher));
            Self {
                _tmp: tmp,
                repository: LyricsRepository::new(Arc::clone(&cache)),
                manager: OverlayManager::new(cache, settings),
            }
        }
    }

    async fn next(rx: &mut broadcast::Receiver<OverlayMetadata>) -> OverlayMetadata {
        tokio::time::timeout(Duration::from_secs(60), rx.recv())
            .await
            .unwrap()
            .unwrap()
    }

    #[test]
    fn test_metadata_with_lyric() {
        let meta = OverlayMetadata::for_line(&song(), "Singing lyrics...");
        assert_eq!(meta.title, "Singing lyrics...");
        assert_eq!(meta.artist, "Song Title - Artist Name - Album Name");
        assert_eq!(meta.album, "From MusicApp");
        assert_eq!(meta.duration, Duration::from_secs(200));
    }

    #[test]
    fn test_metadata_without_lyric() {
        let meta = OverlayMetadata::for_line(&song(), "");
        assert_eq!(meta.title, "Song Title");
        assert_eq!(meta.artist, "Artist Name - Album Name");
        assert_eq!(meta.album, "From MusicApp");
        assert_eq!(meta, OverlayMetadata::restored(&song()));
    }

    #[test]
    fn test_metadata_skips_blank_parts() {
        let no_album = song().with_album(" ");
        assert_eq!(OverlayMetadata::for_line(&no_album, "  ").artist, "Artist Name");
        assert_eq!(
            OverlayMetadata::for_line(&no_album, "la la").artist,
            "Song Title - Artist Name"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_update_plays_lyrics() {
        let fx = Fixture::new(Reply::Lyrics(LRC.into()));
        let mut rx = fx.manager.subscribe();

        fx.manager.update(song().playing(true)).await;

        let first = next(&mut rx).await;
        assert_eq!(first.title, "First");
        assert_eq!(first.artist, "Song Title - Artist Name - Album Name");
        assert_eq!(first.album, "From MusicApp");
        assert_eq!(next(&mut rx).await.title, "Second");
    }

    #[tokio::test(start_paused = true)]
    async fn test_update_resumes_at_position() {
        let fx = Fixture::new(Reply::Lyrics(LRC.into()));
        let mut rx = fx.manager.subscribe();

        fx.manager
            .update(song().with_position(Duration::from_secs(3)).playing(true))
            .await;

        assert_eq!(next(&mut rx).await.title, "Second");
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_lyrics_restore_metadata() {
        let fx = Fixture::new(Reply::Absent);
        let mut rx = fx.manager.subscribe();

        fx.manager.update(song().playing(true)).await;

        assert_eq!(next(&mut rx).await, OverlayMetadata::restored(&song()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_paused_snapshot_stops() {
        let fx = Fixture::new(Reply::Lyrics(LRC.into()));
        let mut rx = fx.manager.subscribe();

        fx.manager.update(song().playing(true)).await;
        assert_eq!(next(&mut rx).await.title, "First");

        fx.manager.update(song()).await;
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert!(rx.try_recv().is_err());
        assert!(fx.manager.current().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_app_gets_nothing() {
        let settings = OverlaySettings {
            enabled: true,
            disabled_apps: vec!["com.music.app".to_string()],
        };
        let fx = Fixture::with_settings(Reply::Lyrics(LRC.into()), settings);
        let mut rx = fx.manager.subscribe();

        fx.manager.update(song().playing(true)).await;
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_globally_disabled_gets_nothing() {
        let fx = Fixture::new(Reply::Lyrics(LRC.into()));
        fx.manager
            .set_settings(OverlaySettings {
                enabled: false,
                disabled_apps: Vec::new(),
            })
            .await;
        let mut rx = fx.manager.subscribe();

        fx.manager.update(song().playing(true)).await;
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_track_replaces_previous() {
        let fx = Fixture::new(Reply::Lyrics(LRC.into()));
        let mut rx = fx.manager.subscribe();

        fx.manager.update(song().playing(true)).await;
        assert_eq!(next(&mut rx).await.title, "First");

        let other = NowPlaying::new("Other", "Band")
            .with_app("MusicApp", "com.music.app")
            .playing(true);
        fx.manager.update(other).await;

        let first_of_other = next(&mut rx).await;
        assert_eq!(first_of_other.title, "First");
        assert_eq!(first_of_other.artist, "Other - Band");
        let second_of_other = next(&mut rx).await;
        assert_eq!(second_of_other.artist, "Other - Band");
    }

    #[tokio::test(start_paused = true)]
    async fn test_edited_lyrics_restart_display() {
        let fx = Fixture::new(Reply::Lyrics(LRC.into()));
        let cancel = CancellationToken::new();
        let watcher = fx
            .manager
            .watch_repository(fx.repository.subscribe(), cancel.clone());
        let mut rx = fx.manager.subscribe();

        fx.manager.update(song().playing(true)).await;
        assert_eq!(next(&mut rx).await.title, "First");

        fx.repository
            .save_text(&CacheKey::new("Song Title", "Artist Name"), "[00:00.00]Edited")
            .await
            .unwrap();
        assert_eq!(next(&mut rx).await.title, "Edited");

        cancel.cancel();
        watcher.await.unwrap();
    }

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_edit_racing_stop_stays_stopped() {
        let fx = Fixture::new(Reply::Lyrics(LRC.into()));
        let cancel = CancellationToken::new();
        let watcher = fx
            .manager
            .watch_repository(fx.repository.subscribe(), cancel.clone());
        let mut rx = fx.manager.subscribe();

        fx.manager.update(song().playing(true)).await;
        assert_eq!(next(&mut rx).await.title, "First");

        // Queue the watcher's restart ahead of a stop on the same lock
        let held = fx.manager.inner.current.lock().await;
        fx.repository
            .save_text(
                &CacheKey::new("Song Title", "Artist Name"),
                "[00:00.00]Edited\n[00:02.00]Again\n",
            )
            .await
            .unwrap();
        settle().await;
        let stopper = tokio::spawn({
            let manager = fx.manager.clone();
            async move { manager.stop().await }
        });
        settle().await;
        drop(held);
        stopper.await.unwrap();

        while rx.try_recv().is_ok() {}
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert!(rx.try_recv().is_err());
        assert!(fx.manager.current().await.is_none());

        cancel.cancel();
        watcher.await.unwrap();
    }
}
