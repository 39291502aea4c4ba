use anyhow::{bail, Context, Result};
use chrono::{DateTime, Local};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::state::{dispatch_key, KeyAction, PlaybackPhase, PresentationClock};

/// Inputs that name and place a session's output files.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub participant_id: String,
    pub out_dir: PathBuf,
    pub media_file: PathBuf,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            participant_id: "dummy".to_string(),
            out_dir: PathBuf::from("."),
            media_file: PathBuf::new(),
        }
    }
}

/// One logged keystroke.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResponseRecord {
    pub seq: u64,
    pub elapsed_secs: f64,
    pub key_code: u32,
}

impl ResponseRecord {
    pub fn line(&self) -> String {
        format_record(self.seq, self.elapsed_secs, self.key_code)
    }
}

/// `seq, elapsed_seconds, key_code` with shortest-round-trip floats, so
/// whole seconds keep a trailing `.0` and no precision is rounded away.
fn format_record(seq: u64, elapsed_secs: f64, key_code: u32) -> String {
    format!("{}, {:?}, {}", seq, elapsed_secs, key_code)
}

fn media_basename(media_file: &Path) -> String {
    media_file
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "media".to_string())
}

/// `<out_dir>/<participant>-<media basename>.csv`
pub fn log_path(out_dir: &Path, participant_id: &str, media_file: &Path) -> PathBuf {
    out_dir.join(format!(
        "{}-{}.csv",
        participant_id,
        media_basename(media_file)
    ))
}

/// Companion summary next to the log: `<participant>-<basename>.session.json`
pub fn sidecar_path(out_dir: &Path, participant_id: &str, media_file: &Path) -> PathBuf {
    out_dir.join(format!(
        "{}-{}.session.json",
        participant_id,
        media_basename(media_file)
    ))
}

/// Append-only response log. Every record reaches the OS before the
/// call returns, so a crash mid-session loses at most the keystroke
/// being handled. An existing file is never reopened or truncated; a
/// fresh session needs a fresh path.
#[derive(Debug)]
pub struct ResponseLog {
    path: PathBuf,
    file: File,
    next_seq: u64,
}

impl ResponseLog {
    pub fn create(path: &Path) -> Result<Self> {
        // A log that already exists holds a previous session's data.
        if path.exists() {
            bail!(
                "response log {} already exists; move it aside or choose another participant id",
                path.display()
            );
        }
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .with_context(|| format!("cannot create response log {}", path.display()))?;
        Ok(Self {
            path: path.to_path_buf(),
            file,
            next_seq: 1,
        })
    }

    pub fn append(&mut self, elapsed_secs: f64, key_code: u32) -> Result<ResponseRecord> {
        let record = ResponseRecord {
            seq: self.next_seq,
            elapsed_secs,
            key_code,
        };
        let mut line = record.line();
        line.push('\n');
        self.file
            .write_all(line.as_bytes())
            .and_then(|_| self.file.flush())
            .with_context(|| format!("cannot append to {}", self.path.display()))?;
        self.next_seq += 1;
        Ok(record)
    }

    /// Records written so far.
    pub fn recorded(&self) -> u64 {
        self.next_seq - 1
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Summary written next to the log on orderly shutdown.
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionSummary {
    pub participant_id: String,
    pub media_file: PathBuf,
    pub started_at: Option<DateTime<Local>>,
    pub ended_at: DateTime<Local>,
    pub responses: u64,
    pub paused_secs: f64,
}

impl SessionSummary {
    /// One-line digest for the shutdown log.
    pub fn digest(&self) -> String {
        format!(
            "recorded {} responses ({:.1}s paused)",
            self.responses, self.paused_secs
        )
    }
}

/// One participant watching one media file.
///
/// Owns everything that used to be scattered globals in tools like this:
/// the playback phase, the presentation clock, the response counter and
/// the open log file. The windowing shell feeds it key presses and
/// mirrors the returned [`KeyAction`] onto the media engine.
#[derive(Debug)]
pub struct Session {
    options: SessionOptions,
    phase: PlaybackPhase,
    clock: PresentationClock,
    log: ResponseLog,
    wall_started: Option<DateTime<Local>>,
    finished: bool,
}

impl Session {
    /// Opens the response log and starts a session in `NotStarted`.
    /// Fails without touching the filesystem beyond the log file itself.
    pub fn begin(options: SessionOptions) -> Result<Self> {
        let path = log_path(&options.out_dir, &options.participant_id, &options.media_file);
        let log = ResponseLog::create(&path)?;
        Ok(Self {
            options,
            phase: PlaybackPhase::NotStarted,
            clock: PresentationClock::new(),
            log,
            wall_started: None,
            finished: false,
        })
    }

    pub fn phase(&self) -> PlaybackPhase {
        self.phase
    }

    pub fn responses(&self) -> u64 {
        self.log.recorded()
    }

    pub fn log_path(&self) -> &Path {
        self.log.path()
    }

    pub fn handle_key(
        &mut self,
        auto_repeat: bool,
        is_pause_key: bool,
        key_code: u32,
    ) -> Result<KeyAction> {
        self.handle_key_at(Instant::now(), auto_repeat, is_pause_key, key_code)
    }

    /// Applies one key press at an explicit timestamp and returns the
    /// action the shell must mirror onto playback.
    pub fn handle_key_at(
        &mut self,
        now: Instant,
        auto_repeat: bool,
        is_pause_key: bool,
        key_code: u32,
    ) -> Result<KeyAction> {
        let action = dispatch_key(self.phase, auto_repeat, is_pause_key);
        match action {
            KeyAction::Start => {
                self.clock.start_at(now);
                self.wall_started = Some(Local::now());
                self.phase = PlaybackPhase::Playing;
            }
            KeyAction::Log => {
                let elapsed = self.clock.elapsed_at(now).as_secs_f64();
                let record = self.log.append(elapsed, key_code)?;
                debug!("response {}", record.line());
            }
            KeyAction::Pause => {
                self.clock.pause_at(now);
                self.phase = PlaybackPhase::Paused;
            }
            KeyAction::Resume => {
                self.clock.resume_at(now);
                self.phase = PlaybackPhase::Playing;
            }
            KeyAction::Ignore => {}
        }
        Ok(action)
    }

    pub fn finish(&mut self) -> Result<()> {
        self.finish_at(Instant::now())
    }

    /// Writes the sidecar summary once; later calls are no-ops.
    pub fn finish_at(&mut self, now: Instant) -> Result<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;
        let summary = SessionSummary {
            participant_id: self.options.participant_id.clone(),
            media_file: self.options.media_file.clone(),
            started_at: self.wall_started,
            ended_at: Local::now(),
            responses: self.responses(),
            paused_secs: self.clock.paused_total_at(now).as_secs_f64(),
        };
        let path = sidecar_path(
            &self.options.out_dir,
            &self.options.participant_id,
            &self.options.media_file,
        );
        let file = File::create(&path)
            .with_context(|| format!("cannot create session summary {}", path.display()))?;
        serde_json::to_writer_pretty(file, &summary)
            .with_context(|| format!("cannot write session summary {}", path.display()))?;
        info!("{}; log at {}", summary.digest(), self.log.path().display());
        Ok(())
    }
}
