// ============================================================================
// OPS MODULE — pixel algorithms behind the fill session
// ============================================================================
//
//   color_metric.rs  — color difference, dark-edge test, tolerance threshold
//   flood_fill.rs    — synchronous breadth-first region fill
//   animated_fill.rs — batched fill emitted as an ordered snapshot sequence
// ============================================================================

pub mod animated_fill;
pub mod color_metric;
pub mod flood_fill;

use crate::error::FillError;
use crate::raster::{Color, PixelBuffer};
use color_metric::{FillPredicate, difference, is_dark_edge};

pub use animated_fill::{FillAnimation, FillEvent};
pub use flood_fill::{FillStats, flood_fill};

/// Why a fill left the image untouched.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoOpReason {
    /// The origin pixel is line art.
    DarkEdge,
    /// The origin pixel already equals the fill color on every channel.
    AlreadyFilled,
    /// The origin pixel is closer to the fill color than the threshold.
    WithinTolerance,
}

/// How a fill request resolved.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FillOutcome {
    Filled { pixels: usize },
    Unchanged(NoOpReason),
    Rejected(FillError),
    /// The watchdog fired before the traversal signalled completion.
    TimedOut,
}

impl FillOutcome {
    pub fn changed_image(&self) -> bool {
        matches!(self, FillOutcome::Filled { pixels } if *pixels > 0)
    }
}

impl std::fmt::Display for FillOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FillOutcome::Filled { pixels } => write!(f, "filled {} pixels", pixels),
            FillOutcome::Unchanged(NoOpReason::DarkEdge) => write!(f, "origin is an edge pixel"),
            FillOutcome::Unchanged(NoOpReason::AlreadyFilled) => {
                write!(f, "origin already is the fill color")
            }
            FillOutcome::Unchanged(NoOpReason::WithinTolerance) => {
                write!(f, "origin is within tolerance of the fill color")
            }
            FillOutcome::Rejected(e) => write!(f, "rejected: {}", e),
            FillOutcome::TimedOut => write!(f, "timed out"),
        }
    }
}

/// Result of inspecting the origin before a traversal starts.
pub(crate) enum Seed {
    Start { index: usize, predicate: FillPredicate },
    Skip(NoOpReason),
}

/// Sample the origin and decide whether a traversal should run at all.
pub(crate) fn prepare_seed(
    buffer: &PixelBuffer,
    x: i64,
    y: i64,
    fill: Color,
    threshold: u8,
) -> Result<Seed, FillError> {
    let out_of_bounds = FillError::OutOfBounds {
        x,
        y,
        width: buffer.width(),
        height: buffer.height(),
    };
    if !buffer.contains(x, y) {
        return Err(out_of_bounds);
    }
    let index = buffer
        .index_of(x as u32, y as u32)
        .ok_or(out_of_bounds)?;
    let target = buffer.get_index(index).ok_or(out_of_bounds)?;

    if is_dark_edge(target) {
        return Ok(Seed::Skip(NoOpReason::DarkEdge));
    }
    if target == fill {
        return Ok(Seed::Skip(NoOpReason::AlreadyFilled));
    }
    // strict, so a full-tolerance fill still runs against any fill color
    if difference(target, fill) < threshold {
        return Ok(Seed::Skip(NoOpReason::WithinTolerance));
    }
    Ok(Seed::Start {
        index,
        predicate: FillPredicate::new(target, fill, threshold),
    })
}
