//! Pure tiling geometry. Nothing in here talks to the X server: the manager
//! feeds in the desktop shape and applies the rectangles that come back.

use crate::config::Config;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }
}

/// Layout policy of one desktop. The numeric ids are what the status line
/// publishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutMode {
    VerticalStack,
    HorizontalStack,
    Monocle,
}

impl LayoutMode {
    pub fn id(self) -> u32 {
        match self {
            LayoutMode::VerticalStack => 0,
            LayoutMode::HorizontalStack => 1,
            LayoutMode::Monocle => 2,
        }
    }

    pub fn next(self) -> Self {
        match self {
            LayoutMode::VerticalStack => LayoutMode::HorizontalStack,
            LayoutMode::HorizontalStack => LayoutMode::Monocle,
            LayoutMode::Monocle => LayoutMode::VerticalStack,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ScreenArea {
    pub width: u32,
    pub height: u32,
}

/// Target rectangles for `count` non-floating clients, index 0 being the
/// master. The rectangles are window geometries; the border (if any) is drawn
/// outside them, so the arithmetic below reserves `2 * border` per window.
///
/// A single client and every client in monocle mode get the full usable area
/// (screen minus the top bar) and are configured borderless by the caller.
pub fn arrange(
    mode: LayoutMode,
    master_ratio: u32,
    count: usize,
    screen: ScreenArea,
    cfg: &Config,
) -> Vec<Rect> {
    if count == 0 {
        return Vec::new();
    }

    let sw = screen.width as i32;
    let bar = cfg.bar_height as i32;
    let usable_h = screen.height as i32 - bar;
    let full = Rect::new(0, bar, sw as u32, usable_h.max(1) as u32);

    if count == 1 || mode == LayoutMode::Monocle {
        return vec![full; count];
    }

    let b = cfg.border_width as i32;
    let g = cfg.gap as i32;
    let stack_count = count - 1;

    let mut rects = Vec::with_capacity(count);
    match mode {
        LayoutMode::VerticalStack => {
            // Master takes the left master_ratio% of the width, the stack
            // splits the rest into equal rows.
            let master_w = sw * master_ratio as i32 / 100;
            rects.push(Rect::new(
                g,
                bar + g,
                (master_w - g - g / 2 - 2 * b).max(1) as u32,
                (usable_h - 2 * g - 2 * b).max(1) as u32,
            ));

            let row_total = usable_h - 2 * g - (stack_count as i32 - 1) * g;
            let row = row_total / stack_count as i32;
            let stack_x = master_w + g / 2;
            let stack_w = (sw - master_w - g / 2 - g - 2 * b).max(1) as u32;
            for i in 0..stack_count as i32 {
                rects.push(Rect::new(
                    stack_x,
                    bar + g + i * (row + g),
                    stack_w,
                    (row - 2 * b).max(1) as u32,
                ));
            }
        }
        LayoutMode::HorizontalStack => {
            // Master takes the bottom master_ratio% of the height, the stack
            // splits the top into equal columns.
            let master_h = usable_h * master_ratio as i32 / 100;
            let stack_h = usable_h - master_h;

            let col_total = sw - 2 * g - (stack_count as i32 - 1) * g;
            let col = col_total / stack_count as i32;
            for i in 0..stack_count as i32 {
                rects.push(Rect::new(
                    g + i * (col + g),
                    bar + g,
                    (col - 2 * b).max(1) as u32,
                    (stack_h - g - g / 2 - 2 * b).max(1) as u32,
                ));
            }
            // Stack rows come after the master in caller order, so splice the
            // master rect in front.
            rects.insert(
                0,
                Rect::new(
                    g,
                    bar + stack_h + g / 2,
                    (sw - 2 * g - 2 * b).max(1) as u32,
                    (master_h - g - g / 2 - 2 * b).max(1) as u32,
                ),
            );
        }
        LayoutMode::Monocle => unreachable!("handled above"),
    }
    rects
}

/// Clamp a floating window's requested geometry so it stays reachable:
/// at least the configured minimum size, at most the screen minus borders and
/// the bar, and positioned so no corner leaves the screen.
pub fn clamp_floating(requested: Rect, screen: ScreenArea, cfg: &Config) -> Rect {
    let sw = screen.width as i32;
    let sh = screen.height as i32;
    let b = cfg.border_width as i32;
    let bar = cfg.bar_height as i32;
    let min = cfg.min_window_size as i32;

    let max_w = (sw - 2 * b).max(min);
    let max_h = (sh - bar - 2 * b).max(min);
    let width = (requested.width as i32).clamp(min, max_w);
    let height = (requested.height as i32).clamp(min, max_h);

    let x = requested.x.clamp(0, (sw - width - 2 * b).max(0));
    let y = requested.y.clamp(bar, (sh - height - 2 * b).max(bar));

    Rect::new(x, y, width as u32, height as u32)
}

/// Saturating master-ratio adjustment; out-of-range deltas clamp, never fail.
pub fn adjust_ratio(ratio: u32, delta: i32) -> u32 {
    (ratio as i64 + delta as i64).clamp(10, 90) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn cfg() -> Config {
        Config::default()
    }

    fn screen() -> ScreenArea {
        ScreenArea { width: 1920, height: 1080 }
    }

    /// On-screen footprint of a window including its border.
    fn footprint(r: &Rect, border: u32) -> (i32, i32, i32, i32) {
        (
            r.x,
            r.y,
            r.x + r.width as i32 + 2 * border as i32,
            r.y + r.height as i32 + 2 * border as i32,
        )
    }

    fn overlaps(a: (i32, i32, i32, i32), b: (i32, i32, i32, i32)) -> bool {
        a.0 < b.2 && b.0 < a.2 && a.1 < b.3 && b.1 < a.3
    }

    fn assert_tiled_disjoint_and_inside(mode: LayoutMode, n: usize) {
        let cfg = cfg();
        let s = screen();
        let rects = arrange(mode, 55, n, s, &cfg);
        assert_eq!(rects.len(), n);
        let fps: Vec<_> = rects.iter().map(|r| footprint(r, cfg.border_width)).collect();
        for fp in &fps {
            assert!(fp.0 >= 0 && fp.1 >= cfg.bar_height as i32);
            assert!(fp.2 <= s.width as i32, "{fp:?} exceeds width");
            assert!(fp.3 <= s.height as i32, "{fp:?} exceeds height");
        }
        for i in 0..fps.len() {
            for j in i + 1..fps.len() {
                assert!(!overlaps(fps[i], fps[j]), "{:?} overlaps {:?}", fps[i], fps[j]);
            }
        }
    }

    #[test]
    fn vertical_stack_rects_disjoint() {
        for n in 2..8 {
            assert_tiled_disjoint_and_inside(LayoutMode::VerticalStack, n);
        }
    }

    #[test]
    fn horizontal_stack_rects_disjoint() {
        for n in 2..8 {
            assert_tiled_disjoint_and_inside(LayoutMode::HorizontalStack, n);
        }
    }

    #[test]
    fn monocle_gives_identical_full_area() {
        let cfg = cfg();
        let s = screen();
        let rects = arrange(LayoutMode::Monocle, 55, 4, s, &cfg);
        assert_eq!(rects.len(), 4);
        let full = Rect::new(0, cfg.bar_height as i32, s.width, s.height - cfg.bar_height);
        for r in rects {
            assert_eq!(r, full);
        }
    }

    #[test]
    fn single_client_gets_full_usable_area() {
        let cfg = cfg();
        let s = screen();
        let rects = arrange(LayoutMode::VerticalStack, 55, 1, s, &cfg);
        assert_eq!(rects, vec![Rect::new(0, cfg.bar_height as i32, s.width, s.height - cfg.bar_height)]);
    }

    #[test]
    fn master_width_tracks_ratio() {
        // Master M plus stack A, B at ratio 55: M spans about 55% of the
        // width, A and B split the remaining height evenly with a gap.
        let cfg = cfg();
        let s = screen();
        let rects = arrange(LayoutMode::VerticalStack, 55, 3, s, &cfg);
        let master = rects[0];
        let expected = s.width as i32 * 55 / 100;
        let span = master.width as i32 + 2 * cfg.border_width as i32;
        assert!((span - expected).abs() <= 2 * cfg.gap as i32 + 2);

        let (a, b) = (rects[1], rects[2]);
        assert_eq!(a.height, b.height);
        assert_eq!(a.x, b.x);
        assert!(b.y >= a.y + a.height as i32 + cfg.gap as i32);
    }

    #[test]
    fn floating_clamp_stays_on_screen() {
        let cfg = cfg();
        let s = screen();
        let wild = [
            Rect::new(-500, -500, 10_000, 10_000),
            Rect::new(5_000, 5_000, 1, 1),
            Rect::new(0, 0, 0, 0),
            Rect::new(100, 200, 300, 400),
        ];
        for r in wild {
            let c = clamp_floating(r, s, &cfg);
            assert!(c.width >= cfg.min_window_size && c.height >= cfg.min_window_size);
            assert!(c.x >= 0 && c.y >= cfg.bar_height as i32);
            assert!(c.x + c.width as i32 + 2 * cfg.border_width as i32 <= s.width as i32);
            assert!(c.y + c.height as i32 + 2 * cfg.border_width as i32 <= s.height as i32);
        }
    }

    #[test]
    fn ratio_saturates_at_bounds() {
        let mut ratio = 55;
        for _ in 0..5 {
            ratio = adjust_ratio(ratio, 1000);
        }
        assert_eq!(ratio, 90);
        for _ in 0..5 {
            ratio = adjust_ratio(ratio, -1000);
        }
        assert_eq!(ratio, 10);
        assert_eq!(adjust_ratio(50, 5), 55);
    }
}
