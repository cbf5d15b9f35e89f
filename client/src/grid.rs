use crate::config::{GRID_BLOCK_SIZE, ZOOM_TIER_THRESHOLDS};
use crate::coords::ViewRange;

/// Zoom tier (0..=3) for a given on-screen size of one square.
pub fn zoom_tier(square_px: f64) -> u32 {
    ZOOM_TIER_THRESHOLDS
        .iter()
        .filter(|&&t| square_px >= t)
        .count() as u32
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum GridLineKind {
    Cell,
    Block,
    Square,
}

/// One grid line in square space. Vertical lines sit at `x = at`, horizontal
/// ones at `y = at`; both run from `from` to `to` along the other axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridLine {
    pub kind: GridLineKind,
    pub vertical: bool,
    pub at: f64,
    pub from: f64,
    pub to: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Coverage {
    min_x: f64,
    min_y: f64,
    max_x: f64,
    max_y: f64,
    layer: i32,
    tier: u32,
}

impl Coverage {
    fn contains(&self, range: &ViewRange) -> bool {
        range.min_x >= self.min_x
            && range.max_x <= self.max_x
            && range.min_y >= self.min_y
            && range.max_y <= self.max_y
    }
}

#[derive(Debug, Clone)]
pub struct Grid {
    cell_size: u32,
    tier: Option<u32>,
    enabled: bool,
    coverage: Option<Coverage>,
    lines: Vec<GridLine>,
}

impl Grid {
    pub fn new(cell_size: u32) -> Self {
        Self {
            cell_size: cell_size.max(1),
            tier: None,
            enabled: false,
            coverage: None,
            lines: Vec::new(),
        }
    }

    pub fn tier(&self) -> u32 {
        self.tier.unwrap_or(0)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn lines(&self) -> &[GridLine] {
        &self.lines
    }

    /// Track the zoom tier. Returns `true` when it changed, which is the signal
    /// for mark managers to re-derive their visible sets.
    pub fn update(&mut self, square_px: f64) -> bool {
        let tier = zoom_tier(square_px);
        let changed = self.tier != Some(tier);
        self.tier = Some(tier);
        changed
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        self.coverage = None;
        if !enabled {
            self.lines.clear();
        }
    }

    pub fn toggle(&mut self) -> bool {
        self.set_enabled(!self.enabled);
        self.enabled
    }

    /// Recompute lines if the tier or floor changed or the view left the padded
    /// area covered last time. Returns whether the line set was rebuilt.
    pub fn draw(&mut self, range: &ViewRange, layer: i32) -> bool {
        if !self.enabled {
            return false;
        }
        let tier = self.tier();
        if let Some(c) = &self.coverage
            && c.tier == tier
            && c.layer == layer
            && c.contains(range)
        {
            return false;
        }
        let pad_x = range.width() / 2.0;
        let pad_y = range.height() / 2.0;
        let coverage = Coverage {
            min_x: range.min_x - pad_x,
            min_y: range.min_y - pad_y,
            max_x: range.max_x + pad_x,
            max_y: range.max_y + pad_y,
            layer,
            tier,
        };
        self.lines = self.build_lines(&coverage);
        self.coverage = Some(coverage);
        true
    }

    fn build_lines(&self, c: &Coverage) -> Vec<GridLine> {
        let cell = self.cell_size as f64;
        let block = GRID_BLOCK_SIZE as f64;
        let mut spacings = vec![(GridLineKind::Cell, cell)];
        if c.tier >= 1 {
            spacings.push((GridLineKind::Block, block));
        }
        if c.tier >= 2 {
            spacings.push((GridLineKind::Square, 1.0));
        }

        let mut lines = Vec::new();
        for (vertical, lo, hi, from, to) in [
            (true, c.min_x, c.max_x, c.min_y, c.max_y),
            (false, c.min_y, c.max_y, c.min_x, c.max_x),
        ] {
            for (i, &(kind, step)) in spacings.iter().enumerate() {
                let coarser = &spacings[..i];
                let mut at = (lo / step).ceil() * step;
                while at <= hi {
                    // coarser kinds already own positions on their own spacing
                    if !coarser.iter().any(|&(_, s)| (at / s).fract() == 0.0) {
                        lines.push(GridLine {
                            kind,
                            vertical,
                            at,
                            from,
                            to,
                        });
                    }
                    at += step;
                }
            }
        }
        lines
    }
}
