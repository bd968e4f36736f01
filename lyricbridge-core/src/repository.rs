//! Administrative access to the on-disk lyrics cache.

use crate::cache::{read_cache_file, CacheKey, LyricCache};
use crate::error::{CoreError, Result};
use crate::lrc;
use crate::paths::LYRICS_FILE_EXTENSION;
use std::io;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info};

const LOG_TARGET: &str = "lyricbridge::repository";

/// One cache file as seen by the repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LyricsEntry {
    pub key: CacheKey,
    pub title: String,
    pub artist: String,
    /// False for negative markers (empty files)
    pub has_lyrics: bool,
}

/// Lists, edits and deletes cache files, keeping the memory tier in step.
///
/// Every change is announced on a broadcast channel so a running overlay can
/// pick up edited lyrics.
pub struct LyricsRepository {
    cache: Arc<LyricCache>,
    updates: broadcast::Sender<CacheKey>,
}

impl LyricsRepository {
    #[must_use]
    pub fn new(cache: Arc<LyricCache>) -> Self {
        let (updates, _) = broadcast::channel(64);
        Self { cache, updates }
    }

    /// Receive the key of every entry that is saved, shifted or deleted
    pub fn subscribe(&self) -> broadcast::Receiver<CacheKey> {
        self.updates.subscribe()
    }

    /// The cache this repository administers
    #[must_use]
    pub const fn cache(&self) -> &Arc<LyricCache> {
        &self.cache
    }

    /// All cache files, sorted by title
    ///
    /// # Errors
    ///
    /// Returns `CacheIo` if the cache directory cannot be read.
    pub async fn list_all(&self) -> Result<Vec<LyricsEntry>> {
        let dir = self.cache.dir();
        let mut read_dir = match tokio::fs::read_dir(dir).await {
            Ok(read_dir) => read_dir,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(CoreError::cache_io(dir, e)),
        };

        let mut entries = Vec::new();
        while let Some(dir_entry) = read_dir
            .next_entry()
            .await
            .map_err(|e| CoreError::cache_io(dir, e))?
        {
            let path = dir_entry.path();
            let Some(key) = key_from_path(&path) else {
                continue;
            };
            let metadata = dir_entry
                .metadata()
                .await
                .map_err(|e| CoreError::cache_io(&path, e))?;
            if !metadata.is_file() {
                continue;
            }

            let (title, artist) = key.split();
            entries.push(LyricsEntry {
                title: title.to_string(),
                artist: artist.to_string(),
                has_lyrics: metadata.len() > 0,
                key,
            });
        }

        entries.sort_by(|a, b| a.title.cmp(&b.title).then_with(|| a.key.cmp(&b.key)));
        Ok(entries)
    }

    /// Delete cache files. Keys without a file are ignored.
    ///
    /// # Errors
    ///
    /// Returns `CacheIo` if a file exists but cannot be removed.
    pub async fn delete(&self, keys: &[CacheKey]) -> Result<()> {
        for key in keys {
            let path = self.cache.path_for(key);
            match tokio::fs::remove_file(&path).await {
                Ok(()) => info!(target: LOG_TARGET, "Deleted lyrics for {}", key),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    debug!(target: LOG_TARGET, "No cache file to delete for {}", key);
                }
                Err(e) => return Err(CoreError::cache_io(path, e)),
            }
            self.cache.invalidate(key).await;
            self.notify(key);
        }
        Ok(())
    }

    /// Raw file content; empty when there is no file
    ///
    /// # Errors
    ///
    /// Returns `CacheIo` if the file exists but cannot be read.
    pub async fn load_text(&self, key: &CacheKey) -> Result<String> {
        Ok(read_cache_file(&self.cache.path_for(key))
            .await?
            .unwrap_or_default())
    }

    /// Replace the file content verbatim
    ///
    /// # Errors
    ///
    /// Returns `CacheIo` if the file cannot be written.
    pub async fn save_text(&self, key: &CacheKey, content: &str) -> Result<()> {
        self.write(key, content).await?;
        info!(target: LOG_TARGET, "Saved {} bytes for {}", content.len(), key);
        self.cache.invalidate(key).await;
        self.notify(key);
        Ok(())
    }

    /// Move every timestamp in the given files by `delta_ms`, clamping at zero.
    /// Missing files and negative markers are left alone.
    ///
    /// # Errors
    ///
    /// Returns `CacheIo` if a file cannot be read or rewritten.
    pub async fn shift_timestamps(&self, keys: &[CacheKey], delta_ms: i64) -> Result<()> {
        for key in keys {
            let Some(content) = read_cache_file(&self.cache.path_for(key)).await? else {
                debug!(target: LOG_TARGET, "Skipping shift for {}: no cache file", key);
                continue;
            };
            if content.trim().is_empty() {
                debug!(target: LOG_TARGET, "Skipping shift for {}: no lyrics", key);
                continue;
            }

            self.write(key, &lrc::shift_timestamps(&content, delta_ms)).await?;
            info!(target: LOG_TARGET, "Shifted {} by {}ms", key, delta_ms);
            self.cache.invalidate(key).await;
            self.notify(key);
        }
        Ok(())
    }

    async fn write(&self, key: &CacheKey, content: &str) -> Result<()> {
        let dir = self.cache.dir();
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| CoreError::cache_io(dir, e))?;
        let path = self.cache.path_for(key);
        tokio::fs::write(&path, content)
            .await
            .map_err(|e| CoreError::cache_io(path, e))
    }

    fn notify(&self, key: &CacheKey) {
        // No receivers is fine
        let _ = self.updates.send(key.clone());
    }
}

/// Cache key of a `.lrt` file, `None` for anything else
fn key_from_path(path: &Path) -> Option<CacheKey> {
    if path.extension()?.to_str()? != LYRICS_FILE_EXTENSION {
        return None;
    }
    CacheKey::parse(path.file_stem()?.to_str()?).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::LyricsFetcher;
    use crate::lrc::LyricLine;
    use crate::provider::testing::{registry_of, Reply, StubProvider};
    use crate::provider::LyricsQuery;
    use tempfile::TempDir;

    struct Fixture {
        _tmp: TempDir,
        provider: Arc<StubProvider>,
        repository: LyricsRepository,
    }

    impl Fixture {
        fn new() -> Self {
            let tmp = TempDir::new().unwrap();
            let provider = StubProvider::new("p", Reply::Lyrics("[00:01.00]Remote".into()));
            let fetcher = Arc::new(LyricsFetcher::new(registry_of(&[provider.clone()])));
            let cache = Arc::new(LyricCache::new(tmp.path().join("lyrics"), fetcher));
            Self {
                _tmp: tmp,
                provider,
                repository: LyricsRepository::new(cache),
            }
        }

        fn cache(&self) -> &LyricCache {
            self.repository.cache()
        }

        fn write_raw(&self, file_name: &str, content: &str) {
            std::fs::create_dir_all(self.cache().dir()).unwrap();
            std::fs::write(self.cache().dir().join(file_name), content).unwrap();
        }
    }

    fn key(title: &str, artist: &str) -> CacheKey {
        CacheKey::new(title, artist)
    }

    #[tokio::test]
    async fn test_save_then_load_round_trip() {
        let fx = Fixture::new();
        let k = key("Song", "Artist");
        let content = "[ti:Song]\r\n[00:01.00]Hello\n\n[00:02.5]  spaced  \n";

        fx.repository.save_text(&k, content).await.unwrap();
        assert_eq!(fx.repository.load_text(&k).await.unwrap(), content);
    }

    #[tokio::test]
    async fn test_load_missing_is_empty() {
        let fx = Fixture::new();
        assert_eq!(fx.repository.load_text(&key("No", "File")).await.unwrap(), "");
    }

    #[tokio::test]
    async fn test_save_invalidates_memory() {
        let fx = Fixture::new();
        let query = LyricsQuery::new("Song", "Artist");
        let k = key("Song", "Artist");

        fx.cache().get_or_fetch(&query).await.unwrap();
        fx.repository.save_text(&k, "[00:07.00]Edited").await.unwrap();

        assert_eq!(
            fx.cache().get_or_fetch(&query).await.unwrap(),
            vec![LyricLine::new(7.0, "Edited")]
        );
        assert_eq!(fx.provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_delete_removes_file_and_memory() {
        let fx = Fixture::new();
        let query = LyricsQuery::new("Song", "Artist");
        let k = key("Song", "Artist");

        fx.cache().get_or_fetch(&query).await.unwrap();
        fx.repository
            .delete(&[k.clone(), key("Never", "Cached")])
            .await
            .unwrap();

        assert!(!fx.cache().path_for(&k).exists());
        assert!(!fx.cache().is_in_memory(&k).await);

        // Next lookup goes back to the providers
        fx.cache().get_or_fetch(&query).await.unwrap();
        assert_eq!(fx.provider.calls(), 2);
    }

    #[tokio::test]
    async fn test_list_all() {
        let fx = Fixture::new();
        fx.write_raw("Zebra_Band.lrt", "[00:01.00]z");
        fx.write_raw("Alpha_Some_Artist.lrt", "[00:01.00]a");
        fx.write_raw("Missing_Nobody.lrt", "");
        fx.write_raw("notes.txt", "ignored");
        fx.write_raw("NoArtist.lrt", "[00:01.00]n");
        std::fs::create_dir_all(fx.cache().dir().join("nested.lrt")).unwrap();

        let entries = fx.repository.list_all().await.unwrap();
        let summary: Vec<_> = entries
            .iter()
            .map(|e| (e.title.as_str(), e.artist.as_str(), e.has_lyrics))
            .collect();

        assert_eq!(
            summary,
            vec![
                ("Alpha", "Some_Artist", true),
                ("Missing", "Nobody", false),
                ("NoArtist", "", true),
                ("Zebra", "Band", true),
            ]
        );
        assert_eq!(entries[0].key.as_str(), "Alpha_Some_Artist");
    }

    #[tokio::test]
    async fn test_list_all_without_directory() {
        let fx = Fixture::new();
        assert!(fx.repository.list_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_shift_timestamps() {
        let fx = Fixture::new();
        let k = key("Song", "Artist");
        fx.repository
            .save_text(&k, "[00:01.00]One\n[00:02.50][01:00.00]Two\n")
            .await
            .unwrap();

        fx.repository.shift_timestamps(&[k.clone()], -1500).await.unwrap();

        assert_eq!(
            fx.repository.load_text(&k).await.unwrap(),
            "[00:00.00]One\n[00:01.00][00:58.50]Two\n"
        );
        let lines = fx
            .cache()
            .get_or_fetch(&LyricsQuery::new("Song", "Artist"))
            .await
            .unwrap();
        assert_eq!(
            lines,
            vec![
                LyricLine::new(0.0, "One"),
                LyricLine::new(1.0, "Two"),
                LyricLine::new(58.5, "Two"),
            ]
        );
    }

    #[tokio::test]
    async fn test_shift_skips_missing_and_negative() {
        let fx = Fixture::new();
        let negative = key("Missing", "Nobody");
        fx.write_raw(&negative.file_name(), "");

        fx.repository
            .shift_timestamps(&[negative.clone(), key("No", "File")], 1000)
            .await
            .unwrap();

        assert_eq!(fx.repository.load_text(&negative).await.unwrap(), "");
        assert!(!fx.cache().path_for(&key("No", "File")).exists());
    }

    #[tokio::test]
    async fn test_updates_are_broadcast() {
        let fx = Fixture::new();
        let mut updates = fx.repository.subscribe();
        let k = key("Song", "Artist");

        fx.repository.save_text(&k, "[00:01.00]x").await.unwrap();
        fx.repository.shift_timestamps(&[k.clone()], 10).await.unwrap();
        fx.repository.delete(&[k.clone()]).await.unwrap();

        for _ in 0..3 {
            assert_eq!(updates.recv().await.unwrap(), k);
        }
        assert!(updates.try_recv().is_err());
    }
}
