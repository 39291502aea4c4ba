//! Media playback behind one small seam.
//!
//! With the `vlc` feature the [`Player`] drives libVLC and renders into
//! the drawable described by a [`VideoSink`]. Without it the same API
//! compiles to an inert dry run, so sessions can be rehearsed (and the
//! crate tested) on machines with no libVLC installed.

use anyhow::{bail, Result};
use std::path::Path;

use crate::sink::VideoSink;

#[cfg(feature = "vlc")]
use anyhow::anyhow;
#[cfg(feature = "vlc")]
use log::debug;
#[cfg(not(feature = "vlc"))]
use log::{debug, warn};
#[cfg(feature = "vlc")]
use vlc::{Instance, Media, MediaPlayer, MediaPlayerVideoEx};

fn ensure_media_exists(path: &Path) -> Result<()> {
    if !path.is_file() {
        bail!("media file {} does not exist", path.display());
    }
    Ok(())
}

/// Playback controller for one media file.
#[cfg(feature = "vlc")]
pub struct Player {
    // Must outlive the media player.
    _instance: Instance,
    media_player: MediaPlayer,
}

#[cfg(feature = "vlc")]
impl Player {
    /// Opens `path`, binds video output to `sink` and leaves the engine
    /// stopped. Playback begins only on [`Player::start`].
    pub fn open(path: &Path, sink: &VideoSink) -> Result<Self> {
        ensure_media_exists(path)?;
        let instance =
            Instance::new().ok_or_else(|| anyhow!("libVLC failed to initialise"))?;
        let media = Media::new_path(&instance, path)
            .ok_or_else(|| anyhow!("libVLC cannot open {}", path.display()))?;
        media.parse();
        let media_player = MediaPlayer::new(&instance)
            .ok_or_else(|| anyhow!("libVLC failed to create a media player"))?;
        media_player.set_media(&media);

        debug!("binding video output to {}", sink);
        match *sink {
            VideoSink::XWindow(id) => media_player.set_xwindow(id),
            VideoSink::Win32Hwnd(hwnd) => media_player.set_hwnd(hwnd),
            VideoSink::NsView(view) => media_player.set_nsobject(view),
        }

        // The shell owns the keyboard and mouse; the engine must not
        // swallow events that belong in the response log.
        media_player.set_key_input(false);
        media_player.set_mouse_input(false);

        Ok(Self {
            _instance: instance,
            media_player,
        })
    }

    pub fn start(&self) -> Result<()> {
        self.media_player
            .play()
            .map_err(|_| anyhow!("the media engine refused to start playback"))
    }

    pub fn set_paused(&self, paused: bool) {
        self.media_player.set_pause(paused);
    }

    /// Whether the engine paints the window itself. While it does, the
    /// shell must not present its own frames over the video.
    pub fn renders_video(&self) -> bool {
        true
    }

    pub fn engine_version() -> String {
        format!("libVLC {}", vlc::version())
    }
}

#[cfg(feature = "vlc")]
impl Drop for Player {
    fn drop(&mut self) {
        self.media_player.stop();
    }
}

/// Dry-run playback controller: same surface, no engine.
#[cfg(not(feature = "vlc"))]
pub struct Player;

#[cfg(not(feature = "vlc"))]
impl Player {
    pub fn open(path: &Path, sink: &VideoSink) -> Result<Self> {
        ensure_media_exists(path)?;
        debug!("video output would bind to {}", sink);
        warn!(
            "built without the `vlc` feature: {} will not be played (dry run)",
            path.display()
        );
        Ok(Self)
    }

    pub fn start(&self) -> Result<()> {
        Ok(())
    }

    pub fn set_paused(&self, _paused: bool) {}

    pub fn renders_video(&self) -> bool {
        false
    }

    pub fn engine_version() -> String {
        "playback disabled (built without the `vlc` feature)".to_string()
    }
}
