use crate::raster::Color;

/// Channel sum below which a pixel is line art: a mean brightness under 20 %
/// of full scale (`3 * 255 * 0.2`).
pub const DARK_EDGE_SUM: u16 = 153;

/// Max-component RGB distance (0–255). Alpha is ignored.
pub fn difference(a: Color, b: Color) -> u8 {
    let r = a.r.abs_diff(b.r);
    let g = a.g.abs_diff(b.g);
    let bl = a.b.abs_diff(b.b);
    r.max(g).max(bl)
}

/// Dark pixels act as unfillable boundaries regardless of tolerance.
pub fn is_dark_edge(color: Color) -> bool {
    color.r as u16 + color.g as u16 + (color.b as u16) < DARK_EDGE_SUM
}

/// Map the caller-facing 0-100 tolerance to a 0-255 channel threshold,
/// i.e. `round(tolerance * 2.55)`. Values above 100 clamp to 100.
pub fn to_threshold(tolerance: u8) -> u8 {
    let t = tolerance.min(100) as u32;
    ((t * 255 + 50) / 100) as u8
}

/// The repaint predicate shared by both traversal modes.
///
/// `target` is the color sampled at the origin before any pixel changed and
/// stays fixed for the whole fill.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FillPredicate {
    target: Color,
    fill: Color,
    threshold: u8,
}

impl FillPredicate {
    pub fn new(target: Color, fill: Color, threshold: u8) -> Self {
        Self {
            target,
            fill,
            threshold,
        }
    }

    pub fn fill(&self) -> Color {
        self.fill
    }

    /// Not already the fill color, not a dark edge, and within threshold of
    /// the origin color.
    #[inline]
    pub fn accepts(&self, pixel: Color) -> bool {
        pixel != self.fill
            && !is_dark_edge(pixel)
            && difference(pixel, self.target) <= self.threshold
    }
}
