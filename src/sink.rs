use anyhow::{bail, Result};
use std::ffi::c_void;
use std::fmt;
use winit::raw_window_handle::{HasWindowHandle, RawWindowHandle};
use winit::window::Window;

/// Where the media engine draws: one variant per windowing API the
/// engine can bind. Resolved once, right after window creation, and
/// never re-bound for the life of the session.
#[derive(Debug, Clone, Copy)]
pub enum VideoSink {
    /// X11 window id.
    XWindow(u32),
    /// Win32 window handle.
    Win32Hwnd(*mut c_void),
    /// AppKit NSView pointer.
    NsView(*mut c_void),
}

impl VideoSink {
    /// Maps the window's native handle to an engine drawable.
    ///
    /// Wayland is refused outright: the engine has no Wayland drawable
    /// API, and failing here with a clear message beats a black window.
    pub fn from_window(window: &Window) -> Result<Self> {
        match window.window_handle()?.as_raw() {
            RawWindowHandle::Xlib(handle) => Ok(Self::XWindow(handle.window as u32)),
            RawWindowHandle::Xcb(handle) => Ok(Self::XWindow(handle.window.get())),
            RawWindowHandle::Win32(handle) => {
                Ok(Self::Win32Hwnd(handle.hwnd.get() as *mut c_void))
            }
            RawWindowHandle::AppKit(handle) => Ok(Self::NsView(handle.ns_view.as_ptr())),
            RawWindowHandle::Wayland(_) => bail!(
                "the media engine cannot draw into a Wayland surface; \
                 unset WAYLAND_DISPLAY so the session runs under XWayland"
            ),
            other => bail!("unsupported windowing system: {:?}", other),
        }
    }
}

impl fmt::Display for VideoSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::XWindow(id) => write!(f, "X11 window 0x{:x}", id),
            Self::Win32Hwnd(hwnd) => write!(f, "Win32 window {:p}", hwnd),
            Self::NsView(view) => write!(f, "NSView {:p}", view),
        }
    }
}
