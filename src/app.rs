use anyhow::Result;
use log::{debug, error, info};
use pixels::{Pixels, SurfaceTexture};
use std::path::PathBuf;
use std::sync::Arc;
use tiny_skia::Pixmap;
use winit::{
    application::ApplicationHandler,
    dpi::{LogicalSize, PhysicalSize},
    event::{KeyEvent, WindowEvent},
    event_loop::{ActiveEventLoop, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    platform::scancode::PhysicalKeyExtScancode,
    window::{Window, WindowId},
};

use crate::overlay::{Prompt, PromptOverlay};
use crate::player::Player;
use crate::session::{Session, SessionOptions};
use crate::sink::VideoSink;
use crate::state::{KeyAction, PlaybackPhase};

const WINDOW_TITLE: &str = "pirec";
const DEFAULT_SIZE: LogicalSize<f64> = LogicalSize::new(800.0, 600.0);

#[derive(Debug, Clone)]
pub struct AppOptions {
    pub session: SessionOptions,
    pub maximised: bool,
    /// Reserved pause-toggle key; `None` means every key logs.
    pub pause_key: Option<KeyCode>,
    pub font: Option<PathBuf>,
}

/// Windowing shell around one recording session.
///
/// It owns the window, the engine and the session, routes key presses
/// into the session and mirrors the returned action onto playback. The
/// prompt overlay is presented only while the engine is not painting
/// the window itself.
pub struct RecorderApp {
    options: AppOptions,
    window: Option<Arc<Window>>,
    pixels: Option<Pixels<'static>>,
    canvas: Option<Pixmap>,
    overlay: Option<PromptOverlay>,
    player: Option<Player>,
    session: Option<Session>,
    prompt: Option<Prompt>,
    current_size: Option<PhysicalSize<u32>>,
    fatal: Option<anyhow::Error>,
}

impl RecorderApp {
    pub fn new(options: AppOptions) -> Self {
        Self {
            options,
            window: None,
            pixels: None,
            canvas: None,
            overlay: None,
            player: None,
            session: None,
            prompt: None,
            current_size: None,
            fatal: None,
        }
    }

    /// Runs the event loop to completion. A failure inside the loop is
    /// stashed when it happens and re-raised here, so the process exits
    /// non-zero even though winit swallows handler return values.
    pub fn run(mut self) -> Result<()> {
        info!(
            "starting on {} ({})",
            std::env::consts::OS,
            std::env::consts::ARCH
        );
        let event_loop = EventLoop::new()?;
        event_loop.run_app(&mut self)?;
        match self.fatal.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn create_window_and_session(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let mut window_attributes = Window::default_attributes()
            .with_title(WINDOW_TITLE)
            .with_inner_size(DEFAULT_SIZE);
        if self.options.maximised {
            window_attributes = window_attributes.with_maximized(true);
        }

        let window = Arc::new(event_loop.create_window(window_attributes)?);
        let physical_size = window.inner_size();
        self.current_size = Some(physical_size);
        debug!(
            "window size: {}x{}, scale factor {:.2}",
            physical_size.width,
            physical_size.height,
            window.scale_factor()
        );

        let surface_texture =
            SurfaceTexture::new(physical_size.width, physical_size.height, window.clone());
        self.pixels = Some(Pixels::new(
            physical_size.width,
            physical_size.height,
            surface_texture,
        )?);
        self.canvas = Pixmap::new(physical_size.width, physical_size.height);
        self.overlay = Some(PromptOverlay::new(
            physical_size.width,
            physical_size.height,
            self.options.font.as_deref(),
        ));

        let sink = VideoSink::from_window(&window)?;
        info!("video sink: {}", sink);
        let player = Player::open(&self.options.session.media_file, &sink)?;
        let session = Session::begin(self.options.session.clone())?;
        info!("responses will be logged to {}", session.log_path().display());

        window.set_cursor_visible(false);
        self.player = Some(player);
        self.session = Some(session);
        self.window = Some(window);
        self.refresh_prompt();

        Ok(())
    }

    /// Re-derives the prompt and window title from the session phase.
    /// While the engine paints the window the shell presents nothing.
    fn refresh_prompt(&mut self) {
        let Some(session) = &self.session else {
            return;
        };
        let engine_paints = self
            .player
            .as_ref()
            .map(|player| player.renders_video())
            .unwrap_or(false);
        self.prompt = match session.phase() {
            PlaybackPhase::NotStarted => Some(Prompt::Start),
            PlaybackPhase::Paused => Some(Prompt::Paused),
            PlaybackPhase::Playing if engine_paints => None,
            PlaybackPhase::Playing => Some(Prompt::Recording),
        };
        let overlay_has_font = self
            .overlay
            .as_ref()
            .map(|overlay| overlay.has_font())
            .unwrap_or(false);
        if let Some(window) = &self.window {
            window.set_title(&window_title(session.phase(), self.prompt, overlay_has_font));
            if self.prompt.is_some() {
                window.request_redraw();
            }
        }
    }

    fn render(&mut self) -> Result<()> {
        let Some(prompt) = self.prompt else {
            return Ok(());
        };
        let (Some(pixels), Some(canvas), Some(overlay)) = (
            self.pixels.as_mut(),
            self.canvas.as_mut(),
            self.overlay.as_ref(),
        ) else {
            return Ok(());
        };
        overlay.render(canvas, prompt);
        let frame = pixels.frame_mut();
        if frame.len() == canvas.data().len() {
            frame.copy_from_slice(canvas.data());
        }
        pixels.render()?;
        Ok(())
    }

    fn handle_key(&mut self, event: KeyEvent, event_loop: &ActiveEventLoop) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let is_pause_key = match (self.options.pause_key, event.physical_key) {
            (Some(reserved), PhysicalKey::Code(code)) => code == reserved,
            _ => false,
        };
        // Keys with no platform scancode still count as responses; they
        // log code 0 so the sequence stays gap-free.
        let key_code = event.physical_key.to_scancode().unwrap_or(0);

        let action = match session.handle_key(event.repeat, is_pause_key, key_code) {
            Ok(action) => action,
            Err(err) => {
                self.fail(event_loop, err);
                return;
            }
        };
        match action {
            KeyAction::Start => {
                info!("first key press: starting playback");
                if let Some(player) = &self.player {
                    if let Err(err) = player.start() {
                        self.fail(event_loop, err);
                        return;
                    }
                }
                self.refresh_prompt();
            }
            KeyAction::Pause => {
                info!("playback paused");
                if let Some(player) = &self.player {
                    player.set_paused(true);
                }
                self.refresh_prompt();
            }
            KeyAction::Resume => {
                info!("playback resumed");
                if let Some(player) = &self.player {
                    player.set_paused(false);
                }
                self.refresh_prompt();
            }
            KeyAction::Log | KeyAction::Ignore => {}
        }
    }

    fn handle_resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width == 0 || new_size.height == 0 {
            return; // minimised
        }
        if self.current_size == Some(new_size) {
            return;
        }
        self.current_size = Some(new_size);
        if let Some(pixels) = &mut self.pixels {
            if let Err(err) = pixels.resize_surface(new_size.width, new_size.height) {
                error!("failed to resize surface: {}", err);
            }
            if let Err(err) = pixels.resize_buffer(new_size.width, new_size.height) {
                error!("failed to resize buffer: {}", err);
            }
        }
        self.canvas = Pixmap::new(new_size.width, new_size.height);
        if let Some(overlay) = &mut self.overlay {
            overlay.resize(new_size.width, new_size.height);
        }
        if self.prompt.is_some() {
            if let Some(window) = &self.window {
                window.request_redraw();
            }
        }
    }

    /// Orderly end of session: stop the engine, write the summary, leave
    /// the loop. The response log itself needs nothing here; every
    /// record was flushed when it was written.
    fn finish_and_exit(&mut self, event_loop: &ActiveEventLoop) {
        self.player = None;
        if let Some(window) = &self.window {
            window.set_cursor_visible(true);
        }
        if let Some(session) = self.session.as_mut() {
            if let Err(err) = session.finish() {
                error!("session summary not written: {:#}", err);
            }
        }
        event_loop.exit();
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        error!("fatal: {:#}", err);
        self.fatal = Some(err);
        event_loop.exit();
    }
}

impl ApplicationHandler for RecorderApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_none() {
            if let Err(err) = self.create_window_and_session(event_loop) {
                self.fail(event_loop, err);
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => self.finish_and_exit(event_loop),
            WindowEvent::RedrawRequested => {
                if let Err(err) = self.render() {
                    self.fail(event_loop, err);
                }
            }
            // Synthetic presses replayed on focus gain are not viewer
            // responses.
            WindowEvent::KeyboardInput {
                event,
                is_synthetic,
                ..
            } if event.state.is_pressed() && !is_synthetic => {
                self.handle_key(event, event_loop);
            }
            WindowEvent::Resized(sz) => self.handle_resize(sz),
            WindowEvent::ScaleFactorChanged { .. } => {
                if let Some(window) = &self.window {
                    self.handle_resize(window.inner_size());
                }
            }
            _ => {}
        }
    }
}

impl Drop for RecorderApp {
    fn drop(&mut self) {
        debug!("window shell torn down");
    }
}

/// Title for the current phase. When the overlay cannot rasterise text
/// the active prompt's headline rides in the title instead of the terse
/// state tag.
fn window_title(phase: PlaybackPhase, prompt: Option<Prompt>, overlay_has_font: bool) -> String {
    match prompt {
        Some(prompt) if !overlay_has_font => {
            format!("{} - {}", WINDOW_TITLE, prompt.headline())
        }
        _ => {
            let state = match phase {
                PlaybackPhase::NotStarted => "waiting",
                PlaybackPhase::Playing => "recording",
                PlaybackPhase::Paused => "paused",
            };
            format!("{} [{}]", WINDOW_TITLE, state)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_carries_the_prompt_when_no_font_renders_it() {
        assert_eq!(
            window_title(PlaybackPhase::NotStarted, Some(Prompt::Start), false),
            "pirec - Press any key to start"
        );
        assert_eq!(
            window_title(PlaybackPhase::Paused, Some(Prompt::Paused), false),
            "pirec - Paused: press any key to continue"
        );
    }

    #[test]
    fn title_shows_a_state_tag_while_the_overlay_renders_text() {
        assert_eq!(
            window_title(PlaybackPhase::NotStarted, Some(Prompt::Start), true),
            "pirec [waiting]"
        );
        assert_eq!(
            window_title(PlaybackPhase::Paused, Some(Prompt::Paused), true),
            "pirec [paused]"
        );
        // No prompt means the engine is painting; font or not, the tag
        // is enough.
        assert_eq!(
            window_title(PlaybackPhase::Playing, None, false),
            "pirec [recording]"
        );
    }
}
