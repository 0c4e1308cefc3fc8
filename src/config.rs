//! Static configuration: appearance constants, the per-application rule
//! table, and the key-binding table. Everything here is fixed at compile
//! time and consumed once at startup.

use crate::keys::sym;
use crate::window::layout::LayoutMode;

/// Super/Windows key.
pub const MOD: u16 = 0x0040;
pub const SHIFT: u16 = 0x0001;

pub const DMENU_CMD: &[&str] = &["dmenu_run"];
pub const TERM_CMD: &[&str] = &["st"];
pub const SCREENSHOT_CMD: &[&str] = &["flameshot", "gui"];

/// Everything a key press can do, one variant per argument shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    ChangeDesktop(usize),
    ClientToDesktop(usize),
    FocusNext,
    FocusPrev,
    ShiftDown,
    ShiftUp,
    SwapMaster,
    ResizeMaster(i32),
    NextMode,
    ToggleFloat,
    ToggleFullscreen,
    KillClient,
    Spawn(&'static [&'static str]),
    Quit,
}

#[derive(Debug, Clone, Copy)]
pub struct KeyBinding {
    /// Modifier bits as in the X core protocol, noise modifiers excluded.
    pub mods: u16,
    pub keysym: u32,
    pub action: Action,
}

const fn key(mods: u16, keysym: u32, action: Action) -> KeyBinding {
    KeyBinding { mods, keysym, action }
}

/// First substring match on class or name wins.
#[derive(Debug, Clone, Copy)]
pub struct Rule {
    pub pattern: &'static str,
    pub floating: bool,
    pub fullscreen: bool,
    pub ignore_unmaps: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RuleFlags {
    pub floating: bool,
    pub fullscreen: bool,
    pub ignore_unmaps: bool,
}

pub static RULES: &[Rule] = &[
    Rule { pattern: "Emacs", floating: false, fullscreen: false, ignore_unmaps: true },
    Rule { pattern: "mpv", floating: false, fullscreen: true, ignore_unmaps: false },
    Rule { pattern: "Gimp", floating: true, fullscreen: false, ignore_unmaps: false },
];

pub static KEYS: &[KeyBinding] = &[
    key(MOD, sym::P, Action::Spawn(DMENU_CMD)),
    key(MOD, sym::RETURN, Action::Spawn(TERM_CMD)),
    key(0, sym::PRINT, Action::Spawn(SCREENSHOT_CMD)),
    key(MOD, sym::Q, Action::KillClient),
    key(MOD | SHIFT, sym::Q, Action::Quit),
    key(MOD, sym::H, Action::ResizeMaster(-5)),
    key(MOD, sym::L, Action::ResizeMaster(5)),
    key(MOD, sym::J, Action::FocusNext),
    key(MOD, sym::K, Action::FocusPrev),
    key(MOD | SHIFT, sym::J, Action::ShiftDown),
    key(MOD | SHIFT, sym::K, Action::ShiftUp),
    key(MOD | SHIFT, sym::RETURN, Action::SwapMaster),
    key(MOD, sym::SPACE, Action::NextMode),
    key(MOD, sym::T, Action::ToggleFloat),
    key(MOD, sym::F, Action::ToggleFullscreen),
    key(MOD, sym::N1, Action::ChangeDesktop(1)),
    key(MOD, sym::N2, Action::ChangeDesktop(2)),
    key(MOD, sym::N3, Action::ChangeDesktop(3)),
    key(MOD, sym::N4, Action::ChangeDesktop(4)),
    key(MOD, sym::N5, Action::ChangeDesktop(5)),
    key(MOD, sym::N6, Action::ChangeDesktop(6)),
    key(MOD | SHIFT, sym::N1, Action::ClientToDesktop(1)),
    key(MOD | SHIFT, sym::N2, Action::ClientToDesktop(2)),
    key(MOD | SHIFT, sym::N3, Action::ClientToDesktop(3)),
    key(MOD | SHIFT, sym::N4, Action::ClientToDesktop(4)),
    key(MOD | SHIFT, sym::N5, Action::ClientToDesktop(5)),
    key(MOD | SHIFT, sym::N6, Action::ClientToDesktop(6)),
];

pub struct Config {
    pub focus_color: &'static str,
    pub unfocus_color: &'static str,
    pub border_width: u32,
    pub gap: u32,
    pub bar_height: u32,
    pub min_window_size: u32,
    /// Desktop array size, index 0 reserved.
    pub desktops: usize,
    pub default_ratio: u32,
    pub default_mode: LayoutMode,
    pub rules: &'static [Rule],
    pub keys: &'static [KeyBinding],
}

impl Default for Config {
    fn default() -> Self {
        Self {
            focus_color: "#bc5766",
            unfocus_color: "#888888",
            border_width: 2,
            gap: 6,
            bar_height: 18,
            min_window_size: 50,
            desktops: 7,
            default_ratio: 55,
            default_mode: LayoutMode::VerticalStack,
            rules: RULES,
            keys: KEYS,
        }
    }
}

/// Classify a new window by its WM_CLASS strings and name; first match wins,
/// no match leaves every flag false.
pub fn match_rule(rules: &[Rule], class: &str, name: &str) -> RuleFlags {
    for rule in rules {
        if class.contains(rule.pattern) || name.contains(rule.pattern) {
            return RuleFlags {
                floating: rule.floating,
                fullscreen: rule.fullscreen,
                ignore_unmaps: rule.ignore_unmaps,
            };
        }
    }
    RuleFlags::default()
}

#[cfg(test)]
mod tests {
    use super::*;

    static TEST_RULES: &[Rule] = &[
        Rule { pattern: "term", floating: true, fullscreen: false, ignore_unmaps: false },
        Rule { pattern: "xterm", floating: false, fullscreen: true, ignore_unmaps: true },
    ];

    #[test]
    fn first_match_wins() {
        // "xterm" contains "term", so the earlier rule applies
        let flags = match_rule(TEST_RULES, "xterm", "");
        assert!(flags.floating && !flags.fullscreen);
    }

    #[test]
    fn matches_on_name_too() {
        let flags = match_rule(TEST_RULES, "XTerm", "login term");
        assert!(flags.floating);
    }

    #[test]
    fn no_match_leaves_flags_false() {
        assert_eq!(match_rule(TEST_RULES, "firefox", "browser"), RuleFlags::default());
    }
}
