use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Mirror a now-playing media session and overlay time-synced lyrics
#[derive(Debug, Parser)]
#[command(name = "lyricbridge", version, about)]
pub struct Cli {
    /// Config file to use instead of ~/.config/lyricbridge/config.toml
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Read now-playing JSON snapshots from stdin, one per line, and print overlay metadata
    Watch,
    /// Look up lyrics for a track through the cache
    Fetch(FetchArgs),
    /// Manage cached lyrics files
    #[command(subcommand)]
    Lyrics(LyricsCommand),
    /// Manage the lyrics provider chain
    #[command(subcommand)]
    Providers(ProvidersCommand),
}

#[derive(Debug, Args)]
pub struct FetchArgs {
    #[arg(long)]
    pub title: String,

    #[arg(long)]
    pub artist: String,

    #[arg(long)]
    pub album: Option<String>,

    /// Track length, used by providers to pick the right match
    #[arg(long, value_name = "SECS")]
    pub duration_secs: Option<u32>,

    /// Replay the lines in real time instead of printing them all at once
    #[arg(long)]
    pub play: bool,

    /// Playback position to start replaying from
    #[arg(long, value_name = "MS", default_value_t = 0, requires = "play")]
    pub position_ms: u64,
}

#[derive(Debug, Subcommand)]
pub enum LyricsCommand {
    /// List cached tracks
    List,
    /// Print the raw LRC text of a cached track
    Show { key: String },
    /// Replace the lyrics of a track with the contents of a file (or stdin)
    Save {
        key: String,

        #[arg(long, value_name = "PATH")]
        file: Option<PathBuf>,
    },
    /// Delete cached tracks
    Delete {
        #[arg(required = true)]
        keys: Vec<String>,
    },
    /// Shift every timestamp of the given tracks
    Shift {
        #[arg(required = true)]
        keys: Vec<String>,

        /// Offset in milliseconds; negative values move lines earlier
        #[arg(long, value_name = "MS", allow_negative_numbers = true)]
        by_ms: i64,
    },
}

#[derive(Debug, Subcommand)]
pub enum ProvidersCommand {
    /// Show providers in the order they are tried
    List,
    Enable { id: String },
    Disable { id: String },
    /// Try a provider one rank earlier
    Up { id: String },
    /// Try a provider one rank later
    Down { id: String },
}
