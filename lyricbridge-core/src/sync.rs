//! Timed playback of lyric lines against a running playback position.

use crate::lrc::LyricLine;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

const LOG_TARGET: &str = "lyricbridge::sync";

/// A running playback of one lyric list
struct SyncSession {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl SyncSession {
    /// Cancel the run and wait until its task has fully ended
    async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.handle.await {
            if e.is_panic() {
                warn!(target: LOG_TARGET, "Lyric sync task panicked: {}", e);
            }
        }
    }
}

/// Fires a callback for each lyric line when playback reaches it.
///
/// At most one run is active at a time. Starting a new run cancels the
/// previous one and waits for it to finish, so callbacks from two runs never
/// interleave.
#[derive(Default)]
pub struct LyricSyncEngine {
    session: Mutex<Option<SyncSession>>,
}

impl LyricSyncEngine {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Play `lines` (sorted by time) starting from `start_position` into the song.
    ///
    /// Lines already behind the position are skipped, except the one that
    /// should currently be showing, which fires immediately.
    pub async fn start<F>(&self, lines: Vec<LyricLine>, start_position: Duration, on_line_changed: F)
    where
        F: FnMut(&str) + Send + 'static,
    {
        let mut session = self.session.lock().await;
        if let Some(previous) = session.take() {
            previous.shutdown().await;
        }

        debug!(
            target: LOG_TARGET,
            "Starting lyric sync with {} lines at {:?}",
            lines.len(),
            start_position
        );

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_lines(
            lines,
            start_position,
            on_line_changed,
            cancel.clone(),
        ));
        *session = Some(SyncSession { cancel, handle });
    }

    /// Cancel the active run, if any, and wait for it to end
    pub async fn stop(&self) {
        if let Some(session) = self.session.lock().await.take() {
            debug!(target: LOG_TARGET, "Stopping lyric sync");
            session.shutdown().await;
        }
    }

    /// Whether a run is still firing lines
    pub async fn is_running(&self) -> bool {
        self.session
            .lock()
            .await
            .as_ref()
            .is_some_and(|session| !session.handle.is_finished())
    }
}

/// Index of the line that should be showing at `position`
fn resume_index(lines: &[LyricLine], position: Duration) -> usize {
    lines
        .partition_point(|line| line.start_time() <= position)
        .saturating_sub(1)
}

async fn run_lines<F>(
    lines: Vec<LyricLine>,
    start_position: Duration,
    mut on_line_changed: F,
    cancel: CancellationToken,
) where
    F: FnMut(&str),
{
    // Playback position `p` maps to wall time `started + (p - start_position)`
    let started = Instant::now();

    for line in &lines[resume_index(&lines, start_position)..] {
        let deadline = started + line.start_time().saturating_sub(start_position);

        if deadline > Instant::now() {
            tokio::select! {
                biased;
                () = cancel.cancelled() => return,
                () = tokio::time::sleep_until(deadline) => {}
            }
        }

        if cancel.is_cancelled() {
            return;
        }
        on_line_changed(&line.text);
    }

    debug!(target: LOG_TARGET, "Lyric sync reached the last line");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex as StdMutex};

    /// Collects `(text, offset from creation)` for every callback
    #[derive(Clone)]
    struct Recorder {
        origin: Instant,
        fired: Arc<StdMutex<Vec<(String, Duration)>>>,
    }

    impl Recorder {
        fn new() -> Self {
            Self {
                origin: Instant::now(),
                fired: Arc::default(),
            }
        }

        fn callback(&self) -> impl FnMut(&str) + Send + 'static {
            let recorder = self.clone();
            move |text: &str| {
                let offset = recorder.origin.elapsed();
                recorder.fired.lock().unwrap().push((text.to_string(), offset));
            }
        }

        fn texts(&self) -> Vec<String> {
            self.fired.lock().unwrap().iter().map(|(t, _)| t.clone()).collect()
        }

        fn fired(&self) -> Vec<(String, Duration)> {
            self.fired.lock().unwrap().clone()
        }
    }

    fn abc() -> Vec<LyricLine> {
        vec![
            LyricLine::new(0.0, "A"),
            LyricLine::new(5.0, "B"),
            LyricLine::new(10.0, "C"),
        ]
    }

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    #[test]
    fn test_resume_index() {
        let lines = abc();
        assert_eq!(resume_index(&lines, Duration::ZERO), 0);
        assert_eq!(resume_index(&lines, Duration::from_millis(4999)), 0);
        assert_eq!(resume_index(&lines, secs(5)), 1);
        assert_eq!(resume_index(&lines, Duration::from_millis(6000)), 1);
        assert_eq!(resume_index(&lines, secs(60)), 2);
        assert_eq!(resume_index(&[], secs(3)), 0);

        let late_start = vec![LyricLine::new(2.0, "X"), LyricLine::new(4.0, "Y")];
        assert_eq!(resume_index(&late_start, Duration::ZERO), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_plays_from_beginning() {
        let engine = LyricSyncEngine::new();
        let recorder = Recorder::new();

        engine.start(abc(), Duration::ZERO, recorder.callback()).await;
        tokio::time::sleep(secs(11)).await;

        assert_eq!(
            recorder.fired(),
            vec![
                ("A".to_string(), secs(0)),
                ("B".to_string(), secs(5)),
                ("C".to_string(), secs(10)),
            ]
        );
        assert!(!engine.is_running().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_resumes_mid_song() {
        let engine = LyricSyncEngine::new();
        let recorder = Recorder::new();

        engine
            .start(abc(), Duration::from_millis(6000), recorder.callback())
            .await;
        tokio::time::sleep(secs(5)).await;

        // B is the line showing at 6s and fires right away; C follows 4s later
        assert_eq!(
            recorder.fired(),
            vec![("B".to_string(), secs(0)), ("C".to_string(), secs(4))]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_for_first_line() {
        let engine = LyricSyncEngine::new();
        let recorder = Recorder::new();
        let lines = vec![LyricLine::new(2.0, "X"), LyricLine::new(4.0, "Y")];

        engine.start(lines, Duration::ZERO, recorder.callback()).await;
        tokio::time::sleep(secs(1)).await;
        assert!(recorder.texts().is_empty());
        assert!(engine.is_running().await);

        tokio::time::sleep(secs(4)).await;
        assert_eq!(
            recorder.fired(),
            vec![("X".to_string(), secs(2)), ("Y".to_string(), secs(4))]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_position_past_last_line() {
        let engine = LyricSyncEngine::new();
        let recorder = Recorder::new();

        engine.start(abc(), secs(30), recorder.callback()).await;
        tokio::time::sleep(secs(1)).await;

        assert_eq!(recorder.texts(), vec!["C"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_cancels_previous_run() {
        let engine = LyricSyncEngine::new();
        let first = Recorder::new();
        let second = Recorder::new();
        let old = vec![LyricLine::new(1.0, "old 1"), LyricLine::new(3.0, "old 2")];
        let new = vec![LyricLine::new(0.0, "new 1"), LyricLine::new(4.0, "new 2")];

        engine.start(old, Duration::ZERO, first.callback()).await;
        tokio::time::sleep(secs(2)).await;
        engine.start(new, Duration::ZERO, second.callback()).await;
        tokio::time::sleep(secs(10)).await;

        assert_eq!(first.texts(), vec!["old 1"]);
        assert_eq!(second.texts(), vec!["new 1", "new 2"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_prevents_further_callbacks() {
        let engine = LyricSyncEngine::new();
        let recorder = Recorder::new();

        engine.start(abc(), Duration::ZERO, recorder.callback()).await;
        tokio::time::sleep(secs(1)).await;
        engine.stop().await;
        assert!(!engine.is_running().await);

        tokio::time::sleep(secs(20)).await;
        assert_eq!(recorder.texts(), vec!["A"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_is_idempotent() {
        let engine = LyricSyncEngine::new();
        engine.stop().await;
        engine.stop().await;
        assert!(!engine.is_running().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_lines_finish_immediately() {
        let engine = LyricSyncEngine::new();
        let recorder = Recorder::new();

        engine.start(Vec::new(), secs(3), recorder.callback()).await;
        tokio::time::sleep(secs(1)).await;

        assert!(recorder.texts().is_empty());
        assert!(!engine.is_running().await);
    }
}
