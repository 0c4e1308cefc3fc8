use anyhow::Result;
use thiserror::Error;
use tracing::info;
use x11rb::connection::Connection;
use x11rb::protocol::xproto::{
    ChangeWindowAttributesAux, Colormap, ConnectionExt, EventMask, Window,
};
use x11rb::rust_connection::RustConnection;

use crate::config::Config;
use crate::ewmh::atoms::AtomCollection;

/// Failures the manager cannot recover from; all abort startup.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("cannot open display: {0}")]
    Connect(#[from] x11rb::errors::ConnectError),
    #[error("another window manager is already running")]
    AlreadyRunning,
    #[error("cannot allocate color {0}")]
    ColorAlloc(String),
    #[error("cannot install SIGCHLD handler")]
    Sigchld,
}

/// Everything the handlers need to talk to the X server, constructed once at
/// startup.
pub struct Context {
    pub conn: RustConnection,
    pub screen_num: usize,
    pub root: Window,
    pub screen_width: u16,
    pub screen_height: u16,
    pub atoms: AtomCollection,
    pub focus_pixel: u32,
    pub unfocus_pixel: u32,
}

impl Context {
    pub fn new(cfg: &Config) -> Result<Self> {
        let (conn, screen_num) = x11rb::connect(None).map_err(SetupError::Connect)?;

        let screen = &conn.setup().roots[screen_num];
        let root = screen.root;
        let screen_width = screen.width_in_pixels;
        let screen_height = screen.height_in_pixels;
        let colormap = screen.default_colormap;

        let atoms = AtomCollection::new(&conn)?.reply()?;

        // Claiming SubstructureRedirect on the root is what makes us *the*
        // window manager; the server refuses a second claimant.
        let values = ChangeWindowAttributesAux::new()
            .event_mask(EventMask::SUBSTRUCTURE_REDIRECT | EventMask::SUBSTRUCTURE_NOTIFY);
        conn.change_window_attributes(root, &values)?
            .check()
            .map_err(|_| SetupError::AlreadyRunning)?;

        let focus_pixel = alloc_color(&conn, colormap, cfg.focus_color)?;
        let unfocus_pixel = alloc_color(&conn, colormap, cfg.unfocus_color)?;

        info!(screen_num, root, screen_width, screen_height, "connected to X server");

        Ok(Self {
            conn,
            screen_num,
            root,
            screen_width,
            screen_height,
            atoms,
            focus_pixel,
            unfocus_pixel,
        })
    }
}

/// Allocate a `#rrggbb` color in the default colormap; failure is fatal
/// since the border colors are part of the declared configuration.
fn alloc_color(conn: &RustConnection, colormap: Colormap, spec: &str) -> Result<u32> {
    let (r, g, b) = parse_hex_color(spec).ok_or_else(|| SetupError::ColorAlloc(spec.to_string()))?;
    let reply = conn
        .alloc_color(colormap, r, g, b)?
        .reply()
        .map_err(|_| SetupError::ColorAlloc(spec.to_string()))?;
    Ok(reply.pixel)
}

fn parse_hex_color(spec: &str) -> Option<(u16, u16, u16)> {
    let hex = spec.strip_prefix('#')?;
    if hex.len() != 6 {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    // scale 8-bit channels to the 16-bit values AllocColor expects
    Some((
        channel(0)? as u16 * 0x101,
        channel(2)? as u16 * 0x101,
        channel(4)? as u16 * 0x101,
    ))
}

#[cfg(test)]
mod tests {
    use super::parse_hex_color;

    #[test]
    fn parses_hex_colors() {
        assert_eq!(parse_hex_color("#ffffff"), Some((0xffff, 0xffff, 0xffff)));
        assert_eq!(parse_hex_color("#bc5766"), Some((0xbcbc, 0x5757, 0x6666)));
        assert_eq!(parse_hex_color("bc5766"), None);
        assert_eq!(parse_hex_color("#bc57"), None);
        assert_eq!(parse_hex_color("#bc576g"), None);
    }
}
