use crate::error::{CoreError, Result};
use crate::fetcher::LyricsFetcher;
use crate::lrc::{LrcParser, LyricLine};
use crate::paths::LYRICS_FILE_EXTENSION;
use crate::provider::LyricsQuery;
use std::collections::HashMap;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

const LOG_TARGET: &str = "lyricbridge::cache";

/// Characters that are replaced with `_` in cache file names
const UNSAFE_FILE_NAME_CHARS: [char; 9] = ['\\', '/', ':', '*', '?', '"', '<', '>', '|'];

/// Identifier of a track's lyrics across the memory and disk tiers.
///
/// The key is the cache file stem: `{title}_{artist}` with both parts trimmed
/// and path-unsafe characters replaced by `_`. Case is preserved.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    /// Derive the key for a title/artist pair
    #[must_use]
    pub fn new(title: &str, artist: &str) -> Self {
        Self(format!(
            "{}_{}",
            sanitize_file_name(title.trim()),
            sanitize_file_name(artist.trim())
        ))
    }

    /// Derive the key for a lyrics query
    #[must_use]
    pub fn for_query(query: &LyricsQuery) -> Self {
        Self::new(&query.track_name, &query.artist_name)
    }

    /// Accept an existing key, e.g. a cache file stem chosen by a user.
    ///
    /// # Errors
    ///
    /// Returns `InvalidCacheKey` if the key is empty, is `.`/`..`, or contains
    /// a character the sanitizer would have replaced.
    pub fn parse(key: &str) -> Result<Self> {
        if key.is_empty()
            || key == "."
            || key == ".."
            || key.contains(UNSAFE_FILE_NAME_CHARS)
        {
            return Err(CoreError::InvalidCacheKey {
                key: key.to_string(),
            });
        }
        Ok(Self(key.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Cache file name for this key (`{key}.lrt`)
    #[must_use]
    pub fn file_name(&self) -> String {
        format!("{}.{LYRICS_FILE_EXTENSION}", self.0)
    }

    /// Split the key back into `(title, artist)` at the first `_`.
    /// A key without `_` is all title.
    #[must_use]
    pub fn split(&self) -> (&str, &str) {
        self.0.split_once('_').unwrap_or((self.0.as_str(), ""))
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn sanitize_file_name(input: &str) -> String {
    input.replace(UNSAFE_FILE_NAME_CHARS, "_")
}

/// `None` is a confirmed "no lyrics" result
type CacheEntry = Option<Arc<[LyricLine]>>;

/// Lyrics cache with three tiers: memory, one file per track, providers.
///
/// Disk is the durable source of truth; memory mirrors what was read from or
/// written to disk. An empty file marks a track known to have no lyrics, so
/// failing lookups are not repeated.
pub struct LyricCache {
    dir: PathBuf,
    fetcher: Arc<LyricsFetcher>,
    parser: LrcParser,
    simplify: bool,
    memory: Mutex<HashMap<CacheKey, CacheEntry>>,
}

impl LyricCache {
    /// Create a cache storing files in `dir` and fetching misses through `fetcher`
    pub fn new(dir: impl Into<PathBuf>, fetcher: Arc<LyricsFetcher>) -> Self {
        Self {
            dir: dir.into(),
            fetcher,
            parser: LrcParser::default(),
            simplify: true,
            memory: Mutex::new(HashMap::new()),
        }
    }

    /// Use a specific parser (e.g. one with a CJK script converter)
    #[must_use]
    pub fn with_parser(mut self, parser: LrcParser) -> Self {
        self.parser = parser;
        self
    }

    /// Choose the Chinese script lyric text is converted to
    #[must_use]
    pub const fn with_simplify(mut self, simplify: bool) -> Self {
        self.simplify = simplify;
        self
    }

    /// Directory holding the cache files
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Cache file path for a key
    #[must_use]
    pub fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(key.file_name())
    }

    /// Resolve lyrics for a query through memory, disk and providers, in that order.
    ///
    /// A missing result is an empty list, never an error.
    ///
    /// # Errors
    ///
    /// Returns `CacheIo` if a cache file cannot be read or written.
    pub async fn get_or_fetch(&self, query: &LyricsQuery) -> Result<Vec<LyricLine>> {
        let key = CacheKey::for_query(query);
        let mut memory = self.memory.lock().await;

        // 1. Memory
        if let Some(entry) = memory.get(&key) {
            debug!(target: LOG_TARGET, "Reading {} from memory cache", key);
            return Ok(entry_lines(entry));
        }

        let path = self.path_for(&key);

        // 2. Disk
        if let Some(content) = read_cache_file(&path).await? {
            if content.trim().is_empty() {
                debug!(target: LOG_TARGET, "Cache file for {} marks no lyrics", key);
                memory.insert(key, None);
                return Ok(Vec::new());
            }

            let lines = self.parser.parse(&content, self.simplify);
            debug!(
                target: LOG_TARGET,
                "Read {} lines for {} from {}",
                lines.len(),
                key,
                path.display()
            );
            memory.insert(key, Some(Arc::from(lines.as_slice())));
            return Ok(lines);
        }

        // 3. Network
        info!(target: LOG_TARGET, "{} not cached, asking providers", key);
        let fetched = self.fetcher.resolve(query).await.and_then(|lrc| {
            let lines = self.parser.parse(&lrc, self.simplify);
            if lines.is_empty() {
                warn!(
                    target: LOG_TARGET,
                    "Provider lyrics for {} contain no timed lines",
                    key
                );
                None
            } else {
                Some((lrc, lines))
            }
        });

        // Disk is written before memory so a failed write leaves both untouched
        if let Some((lrc, lines)) = fetched {
            self.write_cache_file(&path, &lrc).await?;
            info!(target: LOG_TARGET, "Saved {} lines for {}", lines.len(), key);
            memory.insert(key, Some(Arc::from(lines.as_slice())));
            Ok(lines)
        } else {
            self.write_cache_file(&path, "").await?;
            info!(target: LOG_TARGET, "Recorded missing lyrics for {}", key);
            memory.insert(key, None);
            Ok(Vec::new())
        }
    }

    /// Drop the memory entry for a key. The cache file is left alone.
    pub async fn invalidate(&self, key: &CacheKey) {
        if self.memory.lock().await.remove(key).is_some() {
            debug!(target: LOG_TARGET, "Invalidated memory entry for {}", key);
        }
    }

    /// Whether the memory tier holds an entry (positive or negative) for a key
    pub async fn is_in_memory(&self, key: &CacheKey) -> bool {
        self.memory.lock().await.contains_key(key)
    }

    async fn write_cache_file(&self, path: &Path, content: &str) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| CoreError::cache_io(&self.dir, e))?;
        tokio::fs::write(path, content)
            .await
            .map_err(|e| CoreError::cache_io(path, e))
    }
}

fn entry_lines(entry: &CacheEntry) -> Vec<LyricLine> {
    entry.as_deref().map(<[LyricLine]>::to_vec).unwrap_or_default()
}

/// Read a cache file; `Ok(None)` when it does not exist
pub(crate) async fn read_cache_file(path: &Path) -> Result<Option<String>> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(CoreError::cache_io(path, e)),
    }
}
