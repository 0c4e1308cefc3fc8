//! Per-desktop client registry.
//!
//! Clients live in an owned `Vec` per desktop with a `current` index instead
//! of hand-linked nodes, so a removal can never leave a dangling focus
//! reference. Index 0 of the desktop array is reserved; usable desktops are
//! 1..DESKTOPS.

use x11rb::protocol::xproto::Window;

use crate::config::Config;
use crate::window::client::Client;
use crate::window::layout::LayoutMode;

pub struct Desktop {
    pub mode: LayoutMode,
    /// Percentage of width (vertical stack) or height (horizontal stack)
    /// given to the master window, kept in [10, 90].
    pub master_ratio: u32,
    clients: Vec<Client>,
    current: Option<usize>,
}

impl Desktop {
    fn new(cfg: &Config) -> Self {
        Self {
            mode: cfg.default_mode,
            master_ratio: cfg.default_ratio,
            clients: Vec::new(),
            current: None,
        }
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    pub fn clients(&self) -> &[Client] {
        &self.clients
    }

    pub fn current_index(&self) -> Option<usize> {
        debug_assert!(self.current.map_or(true, |i| i < self.clients.len()));
        self.current
    }

    pub fn set_current(&mut self, index: usize) {
        if index < self.clients.len() {
            self.current = Some(index);
        }
    }

    pub fn current(&self) -> Option<&Client> {
        self.current.map(|i| &self.clients[i])
    }

    pub fn current_mut(&mut self) -> Option<&mut Client> {
        self.current.map(|i| &mut self.clients[i])
    }

    pub fn client_mut(&mut self, index: usize) -> &mut Client {
        &mut self.clients[index]
    }

    pub fn find(&self, window: Window) -> Option<usize> {
        self.clients.iter().position(|c| c.window == window)
    }

    /// Link a new client immediately before the current one (at the head when
    /// nothing is current); the newcomer always takes focus.
    pub fn insert(&mut self, client: Client) {
        let at = self.current.unwrap_or(0);
        self.clients.insert(at, client);
        self.current = Some(at);
    }

    /// Unlink by handle; a no-op for unknown windows. When the current client
    /// goes away focus advances to its successor, wrapping to the head.
    pub fn remove(&mut self, window: Window) -> Option<Client> {
        let index = self.find(window)?;
        let removed = self.clients.remove(index);
        self.current = if self.clients.is_empty() {
            None
        } else {
            match self.current {
                Some(cur) if cur == index => {
                    Some(if index < self.clients.len() { index } else { 0 })
                }
                Some(cur) if cur > index => Some(cur - 1),
                other => other,
            }
        };
        Some(removed)
    }

    /// Move focus to the next client in list order, wrapping. Suppressed
    /// while the current client owns the whole screen.
    pub fn advance(&mut self) {
        if self.navigation_blocked() {
            return;
        }
        let cur = self.current.unwrap_or(0);
        self.current = Some((cur + 1) % self.clients.len());
    }

    pub fn retreat(&mut self) {
        if self.navigation_blocked() {
            return;
        }
        let len = self.clients.len();
        let cur = self.current.unwrap_or(0);
        self.current = Some((cur + len - 1) % len);
    }

    fn navigation_blocked(&self) -> bool {
        self.clients.is_empty() || self.current().map_or(false, |c| c.is_fullscreen)
    }

    /// Splice the current client into the head slot and the former head into
    /// its place. Whole records swap, so flags and floating geometry travel
    /// with their windows; the focus marker keeps its list position, which
    /// makes a repeated swap undo itself.
    pub fn swap_with_master(&mut self) {
        if let Some(cur) = self.current {
            if cur != 0 {
                self.clients.swap(0, cur);
            }
        }
    }

    /// Swap the current client with its successor (wrapping) and keep it
    /// focused.
    pub fn shift_down(&mut self) {
        if self.navigation_blocked() || self.clients.len() < 2 {
            return;
        }
        let cur = self.current.unwrap_or(0);
        let next = (cur + 1) % self.clients.len();
        self.clients.swap(cur, next);
        self.current = Some(next);
    }

    pub fn shift_up(&mut self) {
        if self.navigation_blocked() || self.clients.len() < 2 {
            return;
        }
        let len = self.clients.len();
        let cur = self.current.unwrap_or(0);
        let prev = (cur + len - 1) % len;
        self.clients.swap(cur, prev);
        self.current = Some(prev);
    }
}

pub struct Registry {
    desktops: Vec<Desktop>,
    active: usize,
}

impl Registry {
    pub fn new(cfg: &Config) -> Self {
        Self {
            desktops: (0..cfg.desktops).map(|_| Desktop::new(cfg)).collect(),
            active: 1,
        }
    }

    pub fn desktop_count(&self) -> usize {
        self.desktops.len()
    }

    pub fn in_range(&self, index: usize) -> bool {
        index >= 1 && index < self.desktops.len()
    }

    pub fn active_index(&self) -> usize {
        self.active
    }

    pub fn set_active(&mut self, index: usize) {
        debug_assert!(self.in_range(index));
        self.active = index;
    }

    pub fn desktop(&self, index: usize) -> &Desktop {
        &self.desktops[index]
    }

    pub fn desktop_mut(&mut self, index: usize) -> &mut Desktop {
        &mut self.desktops[index]
    }

    pub fn active(&self) -> &Desktop {
        &self.desktops[self.active]
    }

    pub fn active_mut(&mut self) -> &mut Desktop {
        let active = self.active;
        &mut self.desktops[active]
    }

    /// Linear search across all desktops.
    pub fn find(&self, window: Window) -> Option<(usize, usize)> {
        self.desktops
            .iter()
            .enumerate()
            .find_map(|(d, desk)| desk.find(window).map(|c| (d, c)))
    }

    /// Move the source desktop's client to the target desktop. The window
    /// keeps its X handle but gets a fresh record slot; it becomes the
    /// target's current client.
    pub fn relocate(&mut self, window: Window, source: usize, target: usize) {
        if source == target {
            return;
        }
        let Some(index) = self.desktops[source].find(window) else {
            return;
        };
        let copy = self.desktops[source].clients[index].clone();
        self.desktops[target].insert(copy);
        self.desktops[source].remove(window);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::window::client::Client;

    fn desktop() -> Desktop {
        Desktop::new(&Config::default())
    }

    fn windows(d: &Desktop) -> Vec<u32> {
        d.clients().iter().map(|c| c.window).collect()
    }

    #[test]
    fn insert_links_before_current_and_focuses() {
        let mut d = desktop();
        d.insert(Client::new(1));
        d.insert(Client::new(2));
        // 2 is current; 3 lands in front of it
        assert_eq!(d.current().unwrap().window, 2);
        d.advance();
        assert_eq!(d.current().unwrap().window, 1);
        d.insert(Client::new(3));
        assert_eq!(windows(&d), vec![2, 3, 1]);
        assert_eq!(d.current().unwrap().window, 3);
    }

    #[test]
    fn remove_advances_current_with_wrap() {
        let mut d = desktop();
        for w in [3, 2, 1] {
            d.insert(Client::new(w));
        }
        assert_eq!(windows(&d), vec![1, 2, 3]);
        d.set_current(1);
        d.remove(2);
        // successor of the removed current
        assert_eq!(d.current().unwrap().window, 3);
        d.remove(3);
        // no successor: wrap to head
        assert_eq!(d.current().unwrap().window, 1);
        d.remove(1);
        assert!(d.current().is_none());
        assert!(d.is_empty());
    }

    #[test]
    fn remove_unknown_window_is_noop() {
        let mut d = desktop();
        d.insert(Client::new(7));
        assert!(d.remove(99).is_none());
        assert_eq!(windows(&d), vec![7]);
        assert_eq!(d.current().unwrap().window, 7);
    }

    #[test]
    fn insert_then_remove_restores_prior_state() {
        let mut d = desktop();
        for w in [3, 2, 1] {
            d.insert(Client::new(w));
        }
        d.set_current(1);
        let before = (windows(&d), d.current_index());
        d.insert(Client::new(42));
        d.remove(42);
        assert_eq!((windows(&d), d.current_index()), before);
    }

    #[test]
    fn current_always_in_list() {
        let mut d = desktop();
        for w in 1..=5 {
            d.insert(Client::new(w));
            assert!(d.current_index().unwrap() < d.len());
        }
        for w in [2, 5, 1, 4, 3] {
            d.remove(w);
            if let Some(cur) = d.current_index() {
                assert!(cur < d.len());
            } else {
                assert!(d.is_empty());
            }
        }
    }

    #[test]
    fn swap_with_master_is_involution() {
        let mut d = desktop();
        for w in [3, 2, 1] {
            d.insert(Client::new(w));
        }
        d.client_mut(2).is_floating = true;
        d.set_current(2);
        let before = windows(&d);
        d.swap_with_master();
        assert_eq!(windows(&d), vec![3, 2, 1]);
        // the record, flags included, travelled with the window
        assert!(d.clients()[0].is_floating);
        // applied twice with no intervening change: back where we started
        d.swap_with_master();
        assert_eq!(windows(&d), before);
        assert!(d.clients()[2].is_floating);
    }

    #[test]
    fn navigation_wraps_and_fullscreen_blocks_it() {
        let mut d = desktop();
        for w in [2, 1] {
            d.insert(Client::new(w));
        }
        assert_eq!(d.current().unwrap().window, 1);
        d.advance();
        assert_eq!(d.current().unwrap().window, 2);
        d.advance();
        assert_eq!(d.current().unwrap().window, 1);
        d.retreat();
        assert_eq!(d.current().unwrap().window, 2);

        d.current_mut().unwrap().is_fullscreen = true;
        d.advance();
        assert_eq!(d.current().unwrap().window, 2);
        d.shift_down();
        assert_eq!(windows(&d), vec![1, 2]);
    }

    #[test]
    fn shift_moves_record_and_keeps_focus() {
        let mut d = desktop();
        for w in [3, 2, 1] {
            d.insert(Client::new(w));
        }
        d.set_current(0);
        d.shift_down();
        assert_eq!(windows(&d), vec![2, 1, 3]);
        assert_eq!(d.current().unwrap().window, 1);
        d.shift_up();
        assert_eq!(windows(&d), vec![1, 2, 3]);
        assert_eq!(d.current().unwrap().window, 1);
    }

    #[test]
    fn relocate_moves_current_and_refocuses_both_sides() {
        let cfg = Config::default();
        let mut reg = Registry::new(&cfg);
        for w in [3, 2, 1] {
            reg.desktop_mut(1).insert(Client::new(w));
        }
        reg.desktop_mut(1).set_current(1);
        reg.relocate(2, 1, 3);
        assert_eq!(windows(reg.desktop(1)), vec![1, 3]);
        // desktop 1's current advanced to the next sibling
        assert_eq!(reg.desktop(1).current().unwrap().window, 3);
        assert_eq!(windows(reg.desktop(3)), vec![2]);
        assert_eq!(reg.desktop(3).current().unwrap().window, 2);
        // unknown handle: nothing happens
        reg.relocate(42, 1, 2);
        assert_eq!(windows(reg.desktop(2)), Vec::<u32>::new());
    }

    #[test]
    fn registry_find_scans_all_desktops() {
        let cfg = Config::default();
        let mut reg = Registry::new(&cfg);
        reg.desktop_mut(2).insert(Client::new(9));
        assert_eq!(reg.find(9), Some((2, 0)));
        assert_eq!(reg.find(10), None);
    }
}
