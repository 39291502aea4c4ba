use anyhow::{anyhow, bail, Result};
use clap::{Parser, ValueEnum};
use log::info;
use std::path::PathBuf;
use winit::keyboard::KeyCode;

use pirec::app::{AppOptions, RecorderApp};
use pirec::player::Player;
use pirec::session::SessionOptions;

/// Plays one media file and logs every keystroke the viewer makes,
/// stamped with seconds since playback started.
#[derive(Parser, Debug)]
#[clap(version, about)]
struct Cli {
    /// Media file to play; prompts with a file picker when omitted
    #[clap(short = 'f', long)]
    media_file: Option<PathBuf>,

    /// Participant identifier used in output file names
    #[clap(short = 'p', long, default_value = "dummy")]
    participant_id: String,

    /// Directory the response log is written into
    #[clap(short = 'o', long, default_value = ".")]
    out_path: PathBuf,

    /// Open the window maximised
    #[clap(short = 'm', long)]
    maximised: bool,

    /// Echo every recorded response to stderr
    #[clap(short = 'v', long)]
    verbose: bool,

    /// Key reserved for pausing playback instead of being logged
    #[clap(long, value_enum, default_value = "pause")]
    pause_key: PauseKey,

    /// TTF/OTF font for the prompt overlay; platform fonts are probed
    /// when omitted
    #[clap(long)]
    font: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum PauseKey {
    /// The keyboard's Pause/Break key
    Pause,
    F8,
    F9,
    /// No reserved key; every key press is logged
    None,
}

impl PauseKey {
    fn key_code(self) -> Option<KeyCode> {
        match self {
            PauseKey::Pause => Some(KeyCode::Pause),
            PauseKey::F8 => Some(KeyCode::F8),
            PauseKey::F9 => Some(KeyCode::F9),
            PauseKey::None => None,
        }
    }
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "pirec=debug" } else { "pirec=info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp_millis()
        .init();
}

/// Interactive fallback when `-f` is not given. Cancelling the dialog
/// aborts the session before any output file exists.
fn pick_media_file() -> Result<PathBuf> {
    rfd::FileDialog::new()
        .set_title("Choose the media file to play")
        .add_filter(
            "Media files",
            &["mp4", "mkv", "avi", "mov", "webm", "mpg", "ogv", "mp3", "wav"],
        )
        .add_filter("All files", &["*"])
        .pick_file()
        .ok_or_else(|| anyhow!("no media file selected"))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    info!("media engine: {}", Player::engine_version());

    let media_file = match cli.media_file {
        Some(path) => path,
        None => pick_media_file()?,
    };
    if !media_file.is_file() {
        bail!("media file {} does not exist", media_file.display());
    }

    let app = RecorderApp::new(AppOptions {
        session: SessionOptions {
            participant_id: cli.participant_id,
            out_dir: cli.out_path,
            media_file,
        },
        maximised: cli.maximised,
        pause_key: cli.pause_key.key_code(),
        font: cli.font,
    });
    app.run()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn defaults_match_the_field_workflow() {
        let cli = Cli::parse_from(["pirec", "-f", "clip.mp4"]);
        assert_eq!(cli.participant_id, "dummy");
        assert_eq!(cli.out_path, PathBuf::from("."));
        assert!(!cli.maximised);
        assert!(!cli.verbose);
        assert_eq!(cli.pause_key, PauseKey::Pause);
        assert_eq!(cli.font, None);
    }

    #[test]
    fn pause_key_none_disables_the_reserved_key() {
        let cli = Cli::parse_from(["pirec", "--pause-key", "none"]);
        assert_eq!(cli.pause_key, PauseKey::None);
        assert_eq!(cli.pause_key.key_code(), None);
    }

    #[test]
    fn short_flags_cover_every_session_option() {
        let cli = Cli::parse_from([
            "pirec",
            "-m",
            "-v",
            "-p",
            "P07",
            "-o",
            "/data/sessions",
            "-f",
            "stimulus.mp4",
        ]);
        assert!(cli.maximised);
        assert!(cli.verbose);
        assert_eq!(cli.participant_id, "P07");
        assert_eq!(cli.out_path, PathBuf::from("/data/sessions"));
        assert_eq!(cli.media_file, Some(PathBuf::from("stimulus.mp4")));
    }
}
