use crate::provider::LyricsQuery;
use crate::time::DurationExt;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;

/// Snapshot of what a media app is playing.
///
/// On the wire durations are integer milliseconds (`duration_ms`,
/// `position_ms`). `updated_at` is stamped when the snapshot is created or
/// deserialized and drives position interpolation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NowPlaying {
    pub title: String,
    pub artist: String,
    #[serde(default)]
    pub album: String,
    #[serde(rename = "duration_ms", with = "millis", default)]
    pub duration: Duration,
    #[serde(rename = "position_ms", with = "millis", default)]
    pub position: Duration,
    #[serde(default)]
    pub is_playing: bool,
    /// Display name of the media app
    #[serde(default)]
    pub app_name: String,
    /// Stable identifier of the media app (package or bus name)
    #[serde(default)]
    pub app_id: String,
    #[serde(skip, default = "Instant::now")]
    pub updated_at: Instant,
}

impl NowPlaying {
    /// Create a paused snapshot with no album, duration or app
    pub fn new(title: impl Into<String>, artist: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            artist: artist.into(),
            album: String::new(),
            duration: Duration::ZERO,
            position: Duration::ZERO,
            is_playing: false,
            app_name: String::new(),
            app_id: String::new(),
            updated_at: Instant::now(),
        }
    }

    #[must_use]
    pub fn with_album(mut self, album: impl Into<String>) -> Self {
        self.album = album.into();
        self
    }

    #[must_use]
    pub const fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    #[must_use]
    pub const fn with_position(mut self, position: Duration) -> Self {
        self.position = position;
        self
    }

    #[must_use]
    pub const fn playing(mut self, is_playing: bool) -> Self {
        self.is_playing = is_playing;
        self
    }

    #[must_use]
    pub fn with_app(mut self, app_name: impl Into<String>, app_id: impl Into<String>) -> Self {
        self.app_name = app_name.into();
        self.app_id = app_id.into();
        self
    }

    /// Whether the snapshot names a track lyrics can be looked up for
    #[must_use]
    pub fn has_track(&self) -> bool {
        !self.title.trim().is_empty() && !self.artist.trim().is_empty()
    }

    /// Get interpolated position based on time elapsed since the snapshot was taken
    #[must_use]
    pub fn interpolated_position(&self) -> Duration {
        if !self.is_playing {
            return self.position;
        }

        let interpolated = self.position + self.updated_at.elapsed();

        // A zero duration means the app did not report one
        if self.duration.is_zero() {
            interpolated
        } else {
            interpolated.min(self.duration)
        }
    }

    /// Lyrics lookup for this track, with the duration hint when known
    #[must_use]
    pub fn to_query(&self) -> LyricsQuery {
        let query = LyricsQuery::new(&self.title, &self.artist);
        let query = if self.album.trim().is_empty() {
            query
        } else {
            query.with_album(&self.album)
        };
        if self.duration.is_zero() {
            query
        } else {
            query.with_duration(self.duration.as_secs_u32())
        }
    }
}

pub(crate) mod millis {
    use crate::time::DurationExt;
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis_u64())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        i64::deserialize(deserializer).map(Duration::from_signed_millis)
    }
}
