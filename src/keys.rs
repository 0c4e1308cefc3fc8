//! Key-binding glue: keysym constants, the keycode map fetched from the
//! server, grabbing, and binding lookup with noise modifiers masked out.

use anyhow::Result;
use x11rb::connection::Connection;
use x11rb::protocol::xproto::{ConnectionExt, GrabMode, Keycode, ModMask};

use crate::config::{Action, KeyBinding};
use crate::core::context::Context;

/// Core X keysyms used by the default bindings.
pub mod sym {
    pub const SPACE: u32 = 0x0020;
    pub const N1: u32 = 0x0031;
    pub const N2: u32 = 0x0032;
    pub const N3: u32 = 0x0033;
    pub const N4: u32 = 0x0034;
    pub const N5: u32 = 0x0035;
    pub const N6: u32 = 0x0036;
    pub const F: u32 = 0x0066;
    pub const H: u32 = 0x0068;
    pub const J: u32 = 0x006a;
    pub const K: u32 = 0x006b;
    pub const L: u32 = 0x006c;
    pub const P: u32 = 0x0070;
    pub const Q: u32 = 0x0071;
    pub const T: u32 = 0x0074;
    pub const RETURN: u32 = 0xff0d;
    pub const PRINT: u32 = 0xff61;
}

/// Caps-lock and num-lock; never part of a binding, stripped before lookup.
pub const NOISE_MASK: u16 = 0x0002 | 0x0010;

pub fn clean_mods(state: u16) -> u16 {
    state & 0x00ff & !NOISE_MASK
}

/// Exact (modifier-set, keysym) match against the binding table; first match
/// wins.
pub fn lookup(keys: &[KeyBinding], mods: u16, keysym: u32) -> Option<Action> {
    keys.iter()
        .find(|k| k.mods == mods && k.keysym == keysym)
        .map(|k| k.action)
}

/// Keysym table fetched from the server once (and again on MappingNotify).
pub struct KeyboardMap {
    min_keycode: Keycode,
    keysyms_per_keycode: usize,
    keysyms: Vec<u32>,
}

impl KeyboardMap {
    pub fn new(ctx: &Context) -> Result<Self> {
        let setup = ctx.conn.setup();
        let min_keycode = setup.min_keycode;
        let count = setup.max_keycode - min_keycode + 1;
        let mapping = ctx.conn.get_keyboard_mapping(min_keycode, count)?.reply()?;
        Ok(Self {
            min_keycode,
            keysyms_per_keycode: mapping.keysyms_per_keycode as usize,
            keysyms: mapping.keysyms,
        })
    }

    /// Unshifted keysym for a keycode (column 0 of the mapping).
    pub fn keysym(&self, keycode: Keycode) -> u32 {
        let index = (keycode.saturating_sub(self.min_keycode)) as usize * self.keysyms_per_keycode;
        self.keysyms.get(index).copied().unwrap_or(0)
    }

    pub fn keycode(&self, keysym: u32) -> Option<Keycode> {
        self.keysyms
            .chunks(self.keysyms_per_keycode.max(1))
            .position(|chunk| chunk.contains(&keysym))
            .map(|i| self.min_keycode + i as Keycode)
    }
}

/// Grab every bound key on the root window, once per noise-modifier
/// combination so caps-lock/num-lock never swallow a binding.
pub fn grab_keys(ctx: &Context, map: &KeyboardMap, keys: &[KeyBinding]) -> Result<()> {
    ctx.conn.ungrab_key(0, ctx.root, ModMask::ANY)?;
    for binding in keys {
        let Some(keycode) = map.keycode(binding.keysym) else {
            tracing::warn!(keysym = binding.keysym, "no keycode for bound keysym");
            continue;
        };
        for noise in [0u16, 0x0002, 0x0010, 0x0012] {
            ctx.conn.grab_key(
                false,
                ctx.root,
                ModMask::from(binding.mods | noise),
                keycode,
                GrabMode::ASYNC,
                GrabMode::ASYNC,
            )?;
        }
    }
    ctx.conn.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Action, KEYS, MOD, SHIFT};

    #[test]
    fn lookup_is_exact_on_modifiers() {
        assert_eq!(lookup(KEYS, MOD, sym::J), Some(Action::FocusNext));
        assert_eq!(lookup(KEYS, MOD | SHIFT, sym::J), Some(Action::ShiftDown));
        assert_eq!(lookup(KEYS, SHIFT, sym::J), None);
        assert_eq!(lookup(KEYS, MOD, 0xffff), None);
    }

    #[test]
    fn noise_modifiers_are_stripped() {
        let state = MOD | NOISE_MASK | 0x0100; // button bit beyond the modifier byte
        assert_eq!(clean_mods(state), MOD);
        assert_eq!(lookup(KEYS, clean_mods(state), sym::P), Some(Action::Spawn(crate::config::DMENU_CMD)));
    }
}
