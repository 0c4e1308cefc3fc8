use std::thread;
use std::time::Duration;

use anyhow::Result;
use tracing::{debug, error, info, warn};
use x11rb::connection::Connection;
use x11rb::protocol::xproto::{
    Allow, AtomEnum, ButtonIndex, ChangeWindowAttributesAux, ClientMessageData,
    ClientMessageEvent, ConfigWindow, ConfigureRequestEvent, ConfigureWindowAux, ConnectionExt,
    EventMask, GrabMode, InputFocus, KeyPressEvent, MapRequestEvent, MapState, Mapping,
    MappingNotifyEvent, ModMask, PropMode, StackMode, UnmapNotifyEvent, Window,
    CLIENT_MESSAGE_EVENT,
};
use x11rb::protocol::{ErrorKind, Event};
use x11rb::wrapper::ConnectionExt as _;
use x11rb::x11_utils::X11Error;
use x11rb::CURRENT_TIME;

use crate::config::{self, Action, Config};
use crate::core::context::Context;
use crate::ewmh::setup::ewmh_desktop_index;
use crate::keys::{self, KeyboardMap};
use crate::spawn;
use crate::window::client::Client;
use crate::window::layout::{self, LayoutMode, Rect, ScreenArea};
use crate::window::registry::Registry;
use crate::window::status;

pub struct WindowManager {
    pub ctx: Context,
    cfg: Config,
    registry: Registry,
    keymap: KeyboardMap,
    running: bool,
}

impl WindowManager {
    pub fn new(ctx: Context, cfg: Config) -> Result<Self> {
        let keymap = KeyboardMap::new(&ctx)?;
        keys::grab_keys(&ctx, &keymap, cfg.keys)?;
        let registry = Registry::new(&cfg);
        Ok(Self { ctx, cfg, registry, keymap, running: true })
    }

    fn screen_area(&self) -> ScreenArea {
        ScreenArea {
            width: self.ctx.screen_width as u32,
            height: self.ctx.screen_height as u32,
        }
    }

    /// Adopt top-level windows that were mapped before we started.
    pub fn scan_windows(&mut self) -> Result<()> {
        let tree = self.ctx.conn.query_tree(self.ctx.root)?.reply()?;
        info!("scanning {} existing windows", tree.children.len());
        for &win in &tree.children {
            let attrs = self.ctx.conn.get_window_attributes(win)?.reply();
            if let Ok(attrs) = attrs {
                if !attrs.override_redirect && attrs.map_state != MapState::UNMAPPED {
                    self.manage(win)?;
                }
            }
        }
        Ok(())
    }

    /// Land on the configured desktop and draw the initial state.
    pub fn startup(&mut self, desktop: usize) -> Result<()> {
        self.switch_desktop(desktop)?;
        self.retile()?;
        self.publish()
    }

    pub fn run(&mut self) -> Result<()> {
        info!("entering event loop");
        while self.running {
            self.ctx.conn.flush()?;
            let event = self.ctx.conn.wait_for_event()?;
            self.dispatch(event)?;
        }
        self.teardown()
    }

    fn dispatch(&mut self, event: Event) -> Result<()> {
        match event {
            Event::MapRequest(e) => self.handle_map_request(e),
            Event::DestroyNotify(e) => self.handle_window_gone(e.window),
            Event::UnmapNotify(e) => self.handle_unmap(e),
            Event::ConfigureRequest(e) => self.handle_configure_request(e),
            Event::ClientMessage(e) => {
                if e.type_ == self.ctx.atoms._NET_WM_STATE {
                    self.handle_state_request(e.window, e.data.as_data32())
                } else {
                    Ok(())
                }
            }
            Event::ButtonPress(e) => self.handle_button_press(e.event),
            Event::KeyPress(e) => self.handle_key_press(e),
            Event::MappingNotify(e) => self.handle_mapping_notify(e),
            Event::Error(e) => {
                self.handle_x_error(&e);
                Ok(())
            }
            _ => Ok(()),
        }
    }

    // ---- event handlers ----------------------------------------------------

    fn handle_map_request(&mut self, event: MapRequestEvent) -> Result<()> {
        let Ok(attrs) = self.ctx.conn.get_window_attributes(event.window)?.reply() else {
            return Ok(());
        };
        if attrs.override_redirect {
            self.ctx.conn.map_window(event.window)?;
            return Ok(());
        }
        self.manage(event.window)
    }

    fn manage(&mut self, win: Window) -> Result<()> {
        if self.registry.find(win).is_some() {
            // some programs (fullscreen video players) re-request mapping
            self.ctx.conn.map_window(win)?;
            return Ok(());
        }

        let (class, name) = self.read_class_and_name(win);
        let flags = config::match_rule(self.cfg.rules, &class, &name);
        debug!(win, %class, %name, ?flags, "managing window");

        let mut client = Client::new(win);
        client.is_floating = flags.floating;
        client.ignore_unmaps = flags.ignore_unmaps;
        // the mapped geometry doubles as the initial floating geometry
        if let Ok(geom) = self.ctx.conn.get_geometry(win)?.reply() {
            client.saved_geometry = layout::clamp_floating(
                Rect::new(geom.x as i32, geom.y as i32, geom.width as u32, geom.height as u32),
                self.screen_area(),
                &self.cfg,
            );
        }
        self.registry.active_mut().insert(client);
        self.ctx.conn.map_window(win)?;

        if flags.fullscreen {
            let active = self.registry.active_index();
            if let Some(index) = self.registry.active().current_index() {
                self.registry.active_mut().client_mut(index).force_fullscreen = true;
                self.set_fullscreen(active, index, true)?;
            }
        }

        self.retile()?;
        self.publish()
    }

    fn handle_window_gone(&mut self, win: Window) -> Result<()> {
        let Some((desktop, _)) = self.registry.find(win) else {
            return Ok(());
        };
        debug!(win, desktop, "unmanaging window");
        self.registry.desktop_mut(desktop).remove(win);
        if desktop == self.registry.active_index() {
            self.retile()?;
        }
        self.publish()
    }

    fn handle_unmap(&mut self, event: UnmapNotifyEvent) -> Result<()> {
        if let Some((desktop, index)) = self.registry.find(event.window) {
            if self.registry.desktop(desktop).clients()[index].ignore_unmaps {
                debug!(win = event.window, "ignoring transient unmap");
                return Ok(());
            }
        }
        self.handle_window_gone(event.window)
    }

    fn handle_configure_request(&mut self, event: ConfigureRequestEvent) -> Result<()> {
        let mask = u16::from(event.value_mask);
        if let Some((desktop, index)) = self.registry.find(event.window) {
            let visible = desktop == self.registry.active_index();
            let park_y = self.off_viewport_y();
            let screen = self.screen_area();
            let client = self.registry.desktop_mut(desktop).client_mut(index);
            if client.is_floating && !client.is_fullscreen {
                let mut requested = client.saved_geometry;
                if mask & u16::from(ConfigWindow::X) != 0 {
                    requested.x = event.x as i32;
                }
                if mask & u16::from(ConfigWindow::Y) != 0 {
                    requested.y = event.y as i32;
                }
                if mask & u16::from(ConfigWindow::WIDTH) != 0 {
                    requested.width = event.width as u32;
                }
                if mask & u16::from(ConfigWindow::HEIGHT) != 0 {
                    requested.height = event.height as u32;
                }
                let clamped = layout::clamp_floating(requested, screen, &self.cfg);
                client.saved_geometry = clamped;
                // a client on a hidden desktop stays parked; the saved
                // geometry is applied when its desktop is switched in
                let applied = place_on_desktop(clamped, visible, park_y);
                self.configure(event.window, applied, self.cfg.border_width)?;
                self.ctx.conn.flush()?;
                return Ok(());
            }
            // tiled: answer the request, the next tiling pass reasserts
            let mut aux = ConfigureWindowAux::from_configure_request(&event);
            if !visible {
                aux = aux.y(park_y);
            }
            self.ctx.conn.configure_window(event.window, &aux)?;
            self.ctx.conn.flush()?;
            if visible {
                self.retile()?;
            }
            return Ok(());
        }
        // not ours: forward untouched
        let aux = ConfigureWindowAux::from_configure_request(&event);
        self.ctx.conn.configure_window(event.window, &aux)?;
        self.ctx.conn.flush()?;
        Ok(())
    }

    /// `_NET_WM_STATE` fullscreen request from the window itself.
    fn handle_state_request(&mut self, win: Window, data: [u32; 5]) -> Result<()> {
        let fullscreen = self.ctx.atoms._NET_WM_STATE_FULLSCREEN;
        if data[1] != fullscreen && data[2] != fullscreen {
            return Ok(());
        }
        let Some((desktop, index)) = self.registry.find(win) else {
            return Ok(());
        };
        let client = &self.registry.desktop(desktop).clients()[index];
        let mut desired = match data[0] {
            1 => true,
            0 => false,
            _ => !client.is_fullscreen,
        };
        if client.force_fullscreen && !desired {
            // a force-fullscreen client may not toggle itself out
            debug!(win, "snapping forced client back to fullscreen");
            desired = true;
        }
        self.set_fullscreen(desktop, index, desired)
    }

    fn handle_button_press(&mut self, win: Window) -> Result<()> {
        if let Some(index) = self.registry.active().find(win) {
            if self.registry.active().current_index() != Some(index) {
                self.registry.active_mut().set_current(index);
                self.focus_pass()?;
            }
        }
        // release the sync grab so the application still sees the click
        self.ctx.conn.allow_events(Allow::REPLAY_POINTER, CURRENT_TIME)?;
        self.ctx.conn.flush()?;
        Ok(())
    }

    fn handle_key_press(&mut self, event: KeyPressEvent) -> Result<()> {
        let keysym = self.keymap.keysym(event.detail);
        let mods = keys::clean_mods(u16::from(event.state));
        if let Some(action) = keys::lookup(self.cfg.keys, mods, keysym) {
            debug!(?action, "key binding");
            self.apply(action)?;
        }
        Ok(())
    }

    fn handle_mapping_notify(&mut self, event: MappingNotifyEvent) -> Result<()> {
        if event.request != Mapping::POINTER {
            info!("keyboard mapping changed, re-grabbing keys");
            self.keymap = KeyboardMap::new(&self.ctx)?;
            keys::grab_keys(&self.ctx, &self.keymap, self.cfg.keys)?;
        }
        Ok(())
    }

    fn handle_x_error(&self, err: &X11Error) {
        // operations legitimately race with window destruction
        let expected = matches!(
            err.error_kind,
            ErrorKind::Window | ErrorKind::Drawable | ErrorKind::Match
        );
        if expected {
            debug!(
                error_code = err.error_code,
                major = err.major_opcode,
                "stale-window error suppressed"
            );
        } else {
            error!(
                error_code = err.error_code,
                major = err.major_opcode,
                minor = err.minor_opcode,
                "unexpected X error"
            );
        }
    }

    // ---- key-bound commands ------------------------------------------------

    fn apply(&mut self, action: Action) -> Result<()> {
        match action {
            Action::ChangeDesktop(target) => self.switch_desktop(target)?,
            Action::ClientToDesktop(target) => self.client_to_desktop(target)?,
            Action::FocusNext => {
                self.registry.active_mut().advance();
                self.focus_pass()?;
            }
            Action::FocusPrev => {
                self.registry.active_mut().retreat();
                self.focus_pass()?;
            }
            Action::ShiftDown => {
                self.registry.active_mut().shift_down();
                self.retile()?;
            }
            Action::ShiftUp => {
                self.registry.active_mut().shift_up();
                self.retile()?;
            }
            Action::SwapMaster => {
                self.registry.active_mut().swap_with_master();
                self.retile()?;
            }
            Action::ResizeMaster(delta) => {
                let desktop = self.registry.active_mut();
                desktop.master_ratio = layout::adjust_ratio(desktop.master_ratio, delta);
                self.retile()?;
            }
            Action::NextMode => {
                let desktop = self.registry.active_mut();
                desktop.mode = desktop.mode.next();
                self.retile()?;
                self.publish()?;
            }
            Action::ToggleFloat => self.toggle_float()?,
            Action::ToggleFullscreen => self.toggle_fullscreen()?,
            Action::KillClient => {
                if let Some(win) = self.registry.active().current().map(|c| c.window) {
                    self.send_close(win)?;
                    self.ctx.conn.flush()?;
                }
            }
            Action::Spawn(argv) => spawn::launch(argv),
            Action::Quit => {
                info!("quit requested");
                self.running = false;
            }
        }
        Ok(())
    }

    fn toggle_float(&mut self) -> Result<()> {
        let Some((win, becoming_floating)) = self
            .registry
            .active()
            .current()
            .filter(|c| !c.is_fullscreen)
            .map(|c| (c.window, !c.is_floating))
        else {
            return Ok(());
        };
        if becoming_floating {
            // float from where tiling last put it
            if let Ok(geom) = self.ctx.conn.get_geometry(win)?.reply() {
                let rect = layout::clamp_floating(
                    Rect::new(geom.x as i32, geom.y as i32, geom.width as u32, geom.height as u32),
                    self.screen_area(),
                    &self.cfg,
                );
                if let Some(client) = self.registry.active_mut().current_mut() {
                    client.saved_geometry = rect;
                }
            }
        }
        if let Some(client) = self.registry.active_mut().current_mut() {
            client.is_floating = becoming_floating;
        }
        self.retile()
    }

    fn toggle_fullscreen(&mut self) -> Result<()> {
        let active = self.registry.active_index();
        let Some(index) = self.registry.active().current_index() else {
            return Ok(());
        };
        // the user outranks a force-fullscreen rule
        self.registry.active_mut().client_mut(index).force_fullscreen = false;
        let on = !self.registry.active().clients()[index].is_fullscreen;
        self.set_fullscreen(active, index, on)
    }

    // ---- state transitions -------------------------------------------------

    fn set_fullscreen(&mut self, desktop: usize, index: usize, on: bool) -> Result<()> {
        let (win, currently) = {
            let client = &self.registry.desktop(desktop).clients()[index];
            (client.window, client.is_fullscreen)
        };
        if on == currently {
            return Ok(());
        }
        {
            let client = self.registry.desktop_mut(desktop).client_mut(index);
            client.is_fullscreen = on;
            client.is_floating = on;
        }
        if on {
            self.ctx.conn.change_property32(
                PropMode::REPLACE,
                win,
                self.ctx.atoms._NET_WM_STATE,
                AtomEnum::ATOM,
                &[self.ctx.atoms._NET_WM_STATE_FULLSCREEN],
            )?;
        } else {
            self.ctx.conn.change_property32(
                PropMode::REPLACE,
                win,
                self.ctx.atoms._NET_WM_STATE,
                AtomEnum::ATOM,
                &[],
            )?;
        }
        if desktop == self.registry.active_index() {
            self.retile()?;
        }
        Ok(())
    }

    /// Desktop-visibility switch: park every non-target client below the
    /// viewport (moving instead of unmapping keeps UnmapNotify out of the
    /// dispatcher), then retile the target back into view.
    fn switch_desktop(&mut self, target: usize) -> Result<()> {
        if !self.registry.in_range(target) || target == self.registry.active_index() {
            return Ok(());
        }
        info!(target, "switching desktop");
        let park = ConfigureWindowAux::new().y(self.off_viewport_y());
        for desktop in 1..self.registry.desktop_count() {
            if desktop == target {
                continue;
            }
            for client in self.registry.desktop(desktop).clients() {
                self.ctx.conn.configure_window(client.window, &park)?;
            }
        }
        self.registry.set_active(target);
        self.ctx.conn.change_property32(
            PropMode::REPLACE,
            self.ctx.root,
            self.ctx.atoms._NET_CURRENT_DESKTOP,
            AtomEnum::CARDINAL,
            &[ewmh_desktop_index(target)],
        )?;
        self.retile()?;
        self.publish()
    }

    /// Move the current client to another desktop without following it.
    fn client_to_desktop(&mut self, target: usize) -> Result<()> {
        let active = self.registry.active_index();
        if !self.registry.in_range(target) || target == active {
            return Ok(());
        }
        let Some(win) = self.registry.active().current().map(|c| c.window) else {
            return Ok(());
        };
        debug!(win, target, "sending client to desktop");
        self.registry.relocate(win, active, target);
        let park = ConfigureWindowAux::new().y(self.off_viewport_y());
        self.ctx.conn.configure_window(win, &park)?;
        self.retile()?;
        self.publish()
    }

    fn off_viewport_y(&self) -> i32 {
        self.ctx.screen_height as i32 * 2
    }

    // ---- tiling and focus passes -------------------------------------------

    fn retile(&mut self) -> Result<()> {
        self.apply_layout()?;
        self.focus_pass()
    }

    fn apply_layout(&self) -> Result<()> {
        let screen = self.screen_area();
        let desktop = self.registry.active();
        let tiled: Vec<Window> = desktop
            .clients()
            .iter()
            .filter(|c| !c.is_floating && !c.is_fullscreen)
            .map(|c| c.window)
            .collect();
        let rects = layout::arrange(desktop.mode, desktop.master_ratio, tiled.len(), screen, &self.cfg);
        let border = if tiled.len() == 1 || desktop.mode == LayoutMode::Monocle {
            0
        } else {
            self.cfg.border_width
        };
        for (win, rect) in tiled.iter().zip(&rects) {
            self.configure(*win, *rect, border)?;
        }
        for client in desktop.clients() {
            if client.is_fullscreen {
                self.configure(
                    client.window,
                    Rect::new(0, 0, screen.width, screen.height),
                    0,
                )?;
            } else if client.is_floating {
                self.configure(client.window, client.saved_geometry, self.cfg.border_width)?;
            }
        }
        Ok(())
    }

    /// Border colors, input focus, button interception, and raise order for
    /// the active desktop.
    fn focus_pass(&self) -> Result<()> {
        let desktop = self.registry.active();
        if desktop.is_empty() {
            self.ctx.conn.set_input_focus(InputFocus::POINTER_ROOT, self.ctx.root, CURRENT_TIME)?;
            self.ctx.conn.change_property32(
                PropMode::REPLACE,
                self.ctx.root,
                self.ctx.atoms._NET_ACTIVE_WINDOW,
                AtomEnum::WINDOW,
                &[x11rb::NONE],
            )?;
            return Ok(());
        }
        let current_index = desktop.current_index();
        let raise = ConfigureWindowAux::new().stack_mode(StackMode::ABOVE);
        for (i, client) in desktop.clients().iter().enumerate() {
            let focused = Some(i) == current_index;
            if !client.is_fullscreen {
                let pixel = if focused { self.ctx.focus_pixel } else { self.ctx.unfocus_pixel };
                self.ctx.conn.change_window_attributes(
                    client.window,
                    &ChangeWindowAttributesAux::new().border_pixel(pixel),
                )?;
            }
            if focused {
                // normal clicks go straight to the focused window
                self.ctx.conn.ungrab_button(ButtonIndex::ANY, client.window, ModMask::ANY)?;
                self.ctx.conn.set_input_focus(InputFocus::PARENT, client.window, CURRENT_TIME)?;
                self.ctx.conn.change_property32(
                    PropMode::REPLACE,
                    self.ctx.root,
                    self.ctx.atoms._NET_ACTIVE_WINDOW,
                    AtomEnum::WINDOW,
                    &[client.window],
                )?;
                self.ctx.conn.configure_window(client.window, &raise)?;
            } else {
                // arm click-to-focus on everything else
                self.ctx.conn.grab_button(
                    true,
                    client.window,
                    EventMask::BUTTON_PRESS,
                    GrabMode::SYNC,
                    GrabMode::ASYNC,
                    x11rb::NONE,
                    x11rb::NONE,
                    ButtonIndex::ANY,
                    ModMask::ANY,
                )?;
            }
        }
        // floating and fullscreen clients are never occluded by tiled ones;
        // a fullscreen current client ends up topmost
        let mut fullscreen_current = None;
        for (i, client) in desktop.clients().iter().enumerate() {
            if client.is_fullscreen && Some(i) == current_index {
                fullscreen_current = Some(client.window);
            } else if client.is_floating || client.is_fullscreen {
                self.ctx.conn.configure_window(client.window, &raise)?;
            }
        }
        if let Some(win) = fullscreen_current {
            self.ctx.conn.configure_window(win, &raise)?;
        }
        Ok(())
    }

    fn configure(&self, win: Window, rect: Rect, border: u32) -> Result<()> {
        let aux = ConfigureWindowAux::new()
            .x(rect.x)
            .y(rect.y)
            .width(rect.width)
            .height(rect.height)
            .border_width(border);
        self.ctx.conn.configure_window(win, &aux)?;
        Ok(())
    }

    fn publish(&self) -> Result<()> {
        status::publish(&self.ctx, &self.registry)
    }

    // ---- plumbing ----------------------------------------------------------

    fn read_class_and_name(&self, win: Window) -> (String, String) {
        let mut class = String::new();
        if let Ok(cookie) =
            self.ctx.conn.get_property(false, win, AtomEnum::WM_CLASS, AtomEnum::STRING, 0, 1024)
        {
            if let Ok(reply) = cookie.reply() {
                // WM_CLASS carries instance and class, NUL separated
                class = reply
                    .value
                    .split(|&b| b == 0)
                    .filter(|s| !s.is_empty())
                    .map(|s| String::from_utf8_lossy(s).into_owned())
                    .collect::<Vec<_>>()
                    .join(" ");
            }
        }
        let mut name = String::new();
        for atom in [self.ctx.atoms._NET_WM_NAME, AtomEnum::WM_NAME.into()] {
            if let Ok(cookie) = self.ctx.conn.get_property(false, win, atom, AtomEnum::ANY, 0, 1024)
            {
                if let Ok(reply) = cookie.reply() {
                    if !reply.value.is_empty() {
                        name = String::from_utf8_lossy(&reply.value).into_owned();
                        break;
                    }
                }
            }
        }
        (class, name)
    }

    fn send_close(&self, win: Window) -> Result<()> {
        let event = ClientMessageEvent {
            response_type: CLIENT_MESSAGE_EVENT,
            format: 32,
            sequence: 0,
            window: win,
            type_: self.ctx.atoms.WM_PROTOCOLS,
            data: ClientMessageData::from([
                self.ctx.atoms.WM_DELETE_WINDOW,
                CURRENT_TIME,
                0,
                0,
                0,
            ]),
        };
        self.ctx.conn.send_event(false, win, EventMask::NO_EVENT, event)?;
        Ok(())
    }

    /// Polite close for every survivor, a short grace period, then force.
    fn teardown(&mut self) -> Result<()> {
        info!("shutting down");
        let mut windows = Vec::new();
        for desktop in 1..self.registry.desktop_count() {
            for client in self.registry.desktop(desktop).clients() {
                windows.push(client.window);
            }
        }
        for &win in &windows {
            let _ = self.send_close(win);
        }
        self.ctx.conn.flush()?;
        thread::sleep(Duration::from_millis(200));
        while let Some(event) = self.ctx.conn.poll_for_event()? {
            let _ = self.dispatch(event);
        }
        for desktop in 1..self.registry.desktop_count() {
            for client in self.registry.desktop(desktop).clients() {
                warn!(win = client.window, "client survived polite close, killing");
                let _ = self.ctx.conn.kill_client(client.window);
            }
        }
        self.ctx.conn.ungrab_key(0, self.ctx.root, ModMask::ANY)?;
        self.ctx.conn.flush()?;
        info!("goodbye");
        Ok(())
    }
}

/// Where a rectangle actually goes: visible desktops get it as-is, hidden
/// ones keep their clients parked below the viewport.
fn place_on_desktop(rect: Rect, visible: bool, park_y: i32) -> Rect {
    if visible {
        rect
    } else {
        Rect { y: park_y, ..rect }
    }
}

#[cfg(test)]
mod tests {
    use super::place_on_desktop;
    use crate::window::layout::Rect;

    #[test]
    fn hidden_desktop_geometry_stays_parked() {
        let rect = Rect::new(100, 120, 300, 400);
        // visible: applied exactly as computed
        assert_eq!(place_on_desktop(rect, true, 2160), rect);
        // hidden: size and x survive, y stays below the viewport
        let parked = place_on_desktop(rect, false, 2160);
        assert_eq!(parked, Rect::new(100, 2160, 300, 400));
    }
}
