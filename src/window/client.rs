use x11rb::protocol::xproto::Window;

use crate::window::layout::Rect;

/// One managed top-level window and its manager-side state.
#[derive(Debug, Clone)]
pub struct Client {
    /// The X window id; stable for the window's lifetime.
    pub window: Window,
    pub is_floating: bool,
    pub is_fullscreen: bool,
    /// Snapped back to fullscreen whenever toggled out of it.
    pub force_fullscreen: bool,
    /// Some applications unmap/remap transiently; keep them managed.
    pub ignore_unmaps: bool,
    /// Authoritative geometry while floating; stale while tiled.
    pub saved_geometry: Rect,
}

impl Client {
    pub fn new(window: Window) -> Self {
        Self {
            window,
            is_floating: false,
            is_fullscreen: false,
            force_fullscreen: false,
            ignore_unmaps: false,
            saved_geometry: Rect::default(),
        }
    }
}
