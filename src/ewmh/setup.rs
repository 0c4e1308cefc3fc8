use anyhow::Result;
use x11rb::connection::Connection;
use x11rb::protocol::xproto::{
    AtomEnum, ConnectionExt, CreateWindowAux, PropMode, WindowClass,
};
use x11rb::wrapper::ConnectionExt as _;

use crate::config::Config;
use crate::core::context::Context;

/// Internal desktops are 1-based with slot 0 reserved; EWMH counts from 0,
/// so pagers see indices in 0..number-of-desktops.
pub fn ewmh_desktop_index(desktop: usize) -> u32 {
    desktop.saturating_sub(1) as u32
}

/// Advertise EWMH support: a check window, the supported-atom list, and the
/// desktop counters pagers read.
pub fn setup_hints(ctx: &Context, cfg: &Config) -> Result<()> {
    let check_win = ctx.conn.generate_id()?;
    ctx.conn.create_window(
        x11rb::COPY_DEPTH_FROM_PARENT,
        check_win,
        ctx.root,
        -1,
        -1,
        1,
        1,
        0,
        WindowClass::INPUT_ONLY,
        x11rb::COPY_FROM_PARENT,
        &CreateWindowAux::new(),
    )?;

    ctx.conn.change_property32(
        PropMode::REPLACE,
        check_win,
        ctx.atoms._NET_SUPPORTING_WM_CHECK,
        AtomEnum::WINDOW,
        &[check_win],
    )?;
    ctx.conn.change_property8(
        PropMode::REPLACE,
        check_win,
        ctx.atoms._NET_WM_NAME,
        ctx.atoms.UTF8_STRING,
        b"stackwm",
    )?;
    ctx.conn.change_property32(
        PropMode::REPLACE,
        ctx.root,
        ctx.atoms._NET_SUPPORTING_WM_CHECK,
        AtomEnum::WINDOW,
        &[check_win],
    )?;

    let supported = [
        ctx.atoms._NET_SUPPORTED,
        ctx.atoms._NET_WM_NAME,
        ctx.atoms._NET_WM_STATE,
        ctx.atoms._NET_WM_STATE_FULLSCREEN,
        ctx.atoms._NET_ACTIVE_WINDOW,
        ctx.atoms._NET_SUPPORTING_WM_CHECK,
        ctx.atoms._NET_CURRENT_DESKTOP,
        ctx.atoms._NET_NUMBER_OF_DESKTOPS,
    ];
    ctx.conn.change_property32(
        PropMode::REPLACE,
        ctx.root,
        ctx.atoms._NET_SUPPORTED,
        AtomEnum::ATOM,
        &supported,
    )?;

    // desktop 0 is reserved, pagers see the usable ones
    ctx.conn.change_property32(
        PropMode::REPLACE,
        ctx.root,
        ctx.atoms._NET_NUMBER_OF_DESKTOPS,
        AtomEnum::CARDINAL,
        &[cfg.desktops as u32 - 1],
    )?;
    ctx.conn.change_property32(
        PropMode::REPLACE,
        ctx.root,
        ctx.atoms._NET_CURRENT_DESKTOP,
        AtomEnum::CARDINAL,
        &[ewmh_desktop_index(1)],
    )?;
    ctx.conn.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::ewmh_desktop_index;
    use crate::config::Config;

    #[test]
    fn published_desktop_indices_stay_in_advertised_range() {
        let cfg = Config::default();
        let advertised = cfg.desktops as u32 - 1;
        for desktop in 1..cfg.desktops {
            assert!(ewmh_desktop_index(desktop) < advertised);
        }
        assert_eq!(ewmh_desktop_index(1), 0);
        assert_eq!(ewmh_desktop_index(6), 5);
    }
}
