use std::collections::VecDeque;

use super::{NoOpReason, Seed, prepare_seed};
use crate::error::FillError;
use crate::raster::{Color, Connectivity, PixelBuffer};

/// What a synchronous fill did to the buffer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FillStats {
    /// Pixels repainted.
    pub filled: usize,
    /// (min_x, min_y, max_x, max_y) of the repainted area, inclusive.
    pub bounds: Option<(u32, u32, u32, u32)>,
    /// Set when the origin check short-circuited the traversal.
    pub skipped: Option<NoOpReason>,
}

impl FillStats {
    fn skipped(reason: NoOpReason) -> Self {
        Self {
            skipped: Some(reason),
            ..Default::default()
        }
    }

    fn include(&mut self, x: u32, y: u32) {
        self.filled += 1;
        self.bounds = Some(match self.bounds {
            Some((x0, y0, x1, y1)) => (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
            None => (x, y, x, y),
        });
    }
}

/// Breadth-first flood fill, repainting `buffer` in place.
///
/// Every pixel reachable from `(x, y)` through pixels accepted by the fill
/// predicate becomes `fill`. The comparison color is sampled once at the
/// origin. Leaves the buffer untouched when the origin is a dark edge, already
/// is `fill`, or is closer to `fill` than `threshold`.
pub fn flood_fill(
    buffer: &mut PixelBuffer,
    x: i64,
    y: i64,
    fill: Color,
    threshold: u8,
    connectivity: Connectivity,
) -> Result<FillStats, FillError> {
    let (seed, predicate) = match prepare_seed(buffer, x, y, fill, threshold)? {
        Seed::Start { index, predicate } => (index, predicate),
        Seed::Skip(reason) => return Ok(FillStats::skipped(reason)),
    };

    let mut stats = FillStats::default();
    // visited doubles as the "already queued" marker
    let mut visited = vec![false; buffer.len()];
    let mut queue: VecDeque<usize> = VecDeque::with_capacity(1024);
    visited[seed] = true;
    queue.push_back(seed);

    while let Some(idx) = queue.pop_front() {
        match buffer.get_index(idx) {
            Some(c) if predicate.accepts(c) => {}
            _ => continue,
        }
        buffer.set_index(idx, fill);
        let (px, py) = buffer.coords(idx);
        stats.include(px, py);

        for n in buffer.neighbors(idx, connectivity) {
            if visited[n] {
                continue;
            }
            if let Some(nc) = buffer.get_index(n)
                && predicate.accepts(nc)
            {
                visited[n] = true;
                queue.push_back(n);
            }
        }
    }

    Ok(stats)
}
