//! Read-only side channel: one line of desktop/window counts written to the
//! root window's name properties after every structural or mode change.

use std::fmt::Write as _;

use anyhow::Result;
use x11rb::connection::Connection;
use x11rb::protocol::xproto::{AtomEnum, PropMode};
use x11rb::wrapper::ConnectionExt as _;

use crate::core::context::Context;
use crate::window::registry::Registry;

/// `<marker>:<desktop>:<mode>:<count> ` per desktop, `*` marking the active
/// one. Desktop 0 is reserved and never published.
pub fn format_status(registry: &Registry) -> String {
    let mut out = String::new();
    for index in 1..registry.desktop_count() {
        let desktop = registry.desktop(index);
        let marker = if index == registry.active_index() { '*' } else { '-' };
        let _ = write!(
            out,
            "{}:{}:{}:{} ",
            marker,
            index,
            desktop.mode.id(),
            desktop.len()
        );
    }
    out
}

pub fn publish(ctx: &Context, registry: &Registry) -> Result<()> {
    let line = format_status(registry);
    ctx.conn.change_property8(
        PropMode::REPLACE,
        ctx.root,
        ctx.atoms._NET_WM_NAME,
        ctx.atoms.UTF8_STRING,
        line.as_bytes(),
    )?;
    ctx.conn.change_property8(
        PropMode::REPLACE,
        ctx.root,
        AtomEnum::WM_NAME,
        AtomEnum::STRING,
        line.as_bytes(),
    )?;
    ctx.conn.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::window::client::Client;
    use crate::window::layout::LayoutMode;
    use crate::window::registry::Registry;

    #[test]
    fn status_line_lists_every_desktop() {
        let cfg = Config::default();
        let mut reg = Registry::new(&cfg);
        reg.desktop_mut(1).insert(Client::new(10));
        reg.desktop_mut(1).insert(Client::new(11));
        reg.desktop_mut(3).insert(Client::new(12));
        reg.desktop_mut(3).mode = LayoutMode::Monocle;

        let line = format_status(&reg);
        assert!(line.starts_with("*:1:0:2 "));
        assert!(line.contains("-:2:0:0 "));
        assert!(line.contains("-:3:2:1 "));
        assert_eq!(line.matches(':').count(), 3 * (cfg.desktops - 1));
        assert!(line.ends_with(' '));
    }
}
