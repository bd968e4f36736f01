//! LRC parsing and timestamp rewriting.
//!
//! A lyric line looks like `[mm:ss.ff]text`. Minutes are one or more digits,
//! seconds are digits with an optional fraction of any length. Several tags may
//! lead the same text (`[00:01.00][00:02.00]Chorus`), in which case one
//! [`LyricLine`] is produced per tag.

use std::fmt::Write;
use std::sync::Arc;
use std::time::Duration;

/// A single timed lyric line
#[derive(Debug, Clone, PartialEq)]
pub struct LyricLine {
    /// Offset from the start of the track, in seconds
    pub time_sec: f64,
    pub text: String,
}

impl LyricLine {
    pub fn new(time_sec: f64, text: impl Into<String>) -> Self {
        Self {
            time_sec,
            text: text.into(),
        }
    }

    /// Offset from the start of the track as a `Duration` (negative offsets clamp to zero)
    #[must_use]
    pub fn start_time(&self) -> Duration {
        Duration::try_from_secs_f64(self.time_sec).unwrap_or_default()
    }
}

/// Target script for Chinese text conversion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChineseScript {
    Simplified,
    Traditional,
}

impl ChineseScript {
    #[must_use]
    pub const fn from_simplify(simplify: bool) -> Self {
        if simplify {
            Self::Simplified
        } else {
            Self::Traditional
        }
    }
}

/// Converts lyric text between Chinese scripts.
///
/// Implementations must be pure: the same input always yields the same output.
pub trait ScriptConverter: Send + Sync {
    fn convert(&self, text: &str, target: ChineseScript) -> String;
}

/// Converter that returns the text unchanged
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughConverter;

impl ScriptConverter for PassthroughConverter {
    fn convert(&self, text: &str, _target: ChineseScript) -> String {
        text.to_string()
    }
}

/// Converter backed by the `zhconv` conversion tables
#[derive(Debug, Clone, Copy, Default)]
pub struct ZhconvConverter;

impl ScriptConverter for ZhconvConverter {
    fn convert(&self, text: &str, target: ChineseScript) -> String {
        let variant = match target {
            ChineseScript::Simplified => zhconv::Variant::ZhHans,
            ChineseScript::Traditional => zhconv::Variant::ZhHant,
        };
        zhconv::zhconv(text, variant)
    }
}

/// Parser turning raw LRC text into sorted [`LyricLine`]s
#[derive(Clone)]
pub struct LrcParser {
    converter: Arc<dyn ScriptConverter>,
}

impl Default for LrcParser {
    fn default() -> Self {
        Self::new(Arc::new(PassthroughConverter))
    }
}

impl LrcParser {
    #[must_use]
    pub fn new(converter: Arc<dyn ScriptConverter>) -> Self {
        Self { converter }
    }

    /// Parse LRC text into lines sorted by time.
    ///
    /// Lines without a leading timestamp tag (ID tags, blank lines, plain text,
    /// malformed tags) are skipped. Lines sharing a timestamp keep their order
    /// of appearance.
    #[must_use]
    pub fn parse(&self, input: &str, simplify: bool) -> Vec<LyricLine> {
        let target = ChineseScript::from_simplify(simplify);
        let input = input.strip_prefix('\u{feff}').unwrap_or(input);

        let mut timed: Vec<(u64, String)> = Vec::new();
        for line in input.lines() {
            let (timestamps, rest) = split_leading_timestamps(line);
            if timestamps.is_empty() {
                continue;
            }

            let text = self.converter.convert(rest.trim(), target);
            for millis in timestamps {
                timed.push((millis, text.clone()));
            }
        }

        // Stable: equal timestamps preserve parse order
        timed.sort_by_key(|(millis, _)| *millis);

        timed
            .into_iter()
            .map(|(millis, text)| LyricLine {
                time_sec: Duration::from_millis(millis).as_secs_f64(),
                text,
            })
            .collect()
    }
}

/// Strip every timestamp tag at the start of a line.
/// Returns the tag values in milliseconds and the text that follows them.
fn split_leading_timestamps(line: &str) -> (Vec<u64>, &str) {
    let mut timestamps = Vec::new();
    let mut remaining = line.trim_start();

    while let Some(rest) = remaining.strip_prefix('[') {
        let Some(end) = rest.find(']') else {
            break;
        };
        let Some(millis) = parse_timestamp(&rest[..end]) else {
            break;
        };
        timestamps.push(millis);
        remaining = &rest[end + 1..];
    }

    (timestamps, remaining)
}

/// Parse the inside of a timestamp tag (`mm:ss` or `mm:ss.fff...`) into milliseconds.
///
/// Fraction digits beyond milliseconds are truncated.
fn parse_timestamp(s: &str) -> Option<u64> {
    let (minutes, seconds) = s.split_once(':')?;
    let (whole, fraction) = match seconds.split_once('.') {
        Some((whole, fraction)) => (whole, Some(fraction)),
        None => (seconds, None),
    };

    let minutes = parse_digits(minutes)?;
    let whole = parse_digits(whole)?;
    let fraction_millis = match fraction {
        Some(fraction) => {
            parse_digits(fraction)?;
            // "5" -> 500, "05" -> 50, "123456" -> 123
            fraction
                .bytes()
                .chain(std::iter::repeat(b'0'))
                .take(3)
                .fold(0_u64, |acc, b| acc * 10 + u64::from(b - b'0'))
        }
        None => 0,
    };

    minutes
        .checked_mul(60_000)?
        .checked_add(whole.checked_mul(1_000)?)?
        .checked_add(fraction_millis)
}

/// Parse a non-empty run of ASCII digits
fn parse_digits(s: &str) -> Option<u64> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

/// Format a duration as a canonical LRC timestamp (mm:ss.ff), rounded to hundredths
#[must_use]
pub fn format_timestamp(duration: Duration) -> String {
    let hundredths_total = (duration.as_millis() + 5) / 10;
    let minutes = hundredths_total / 6_000;
    let seconds = (hundredths_total % 6_000) / 100;
    let hundredths = hundredths_total % 100;

    format!("{minutes:02}:{seconds:02}.{hundredths:02}")
}

/// Shift every timestamp tag in `input` by `delta_ms`, clamping at zero.
///
/// Tags are rewritten wherever they appear and re-emitted in canonical
/// `mm:ss.ff` form. Everything else, ID tags included, is left untouched.
#[must_use]
pub fn shift_timestamps(input: &str, delta_ms: i64) -> String {
    let mut output = String::with_capacity(input.len());
    let mut remaining = input;

    while let Some(start) = remaining.find('[') {
        output.push_str(&remaining[..start]);
        let candidate = &remaining[start + 1..];

        let shifted = candidate.find(']').and_then(|end| {
            parse_timestamp(&candidate[..end]).map(|millis| (end, shift_millis(millis, delta_ms)))
        });

        match shifted {
            Some((end, millis)) => {
                let _ = write!(
                    output,
                    "[{}]",
                    format_timestamp(Duration::from_millis(millis))
                );
                remaining = &candidate[end + 1..];
            }
            None => {
                output.push('[');
                remaining = candidate;
            }
        }
    }

    output.push_str(remaining);
    output
}

fn shift_millis(millis: u64, delta_ms: i64) -> u64 {
    let shifted = i128::from(millis) + i128::from(delta_ms);
    u64::try_from(shifted.max(0)).unwrap_or(u64::MAX)
}
