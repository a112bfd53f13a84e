/// Error kinds produced by the fill engine.
///
/// None of these are fatal: every fill path resolves to the unmodified input
/// image plus one of these, wrapped in a [`crate::ops::FillOutcome`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillError {
    /// The image has no usable pixel buffer (zero-sized or truncated data).
    InvalidSource,
    /// The fill origin lies outside the image extent.
    OutOfBounds {
        x: i64,
        y: i64,
        width: u32,
        height: u32,
    },
    /// Another fill is still running on this session.
    AlreadyRunning,
    /// The working buffer or a snapshot copy could not be allocated.
    AllocationFailure,
    /// The animated worker panicked before it could report completion.
    WorkerPanicked,
}

impl std::fmt::Display for FillError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FillError::InvalidSource => write!(f, "image has no pixel data"),
            FillError::OutOfBounds {
                x,
                y,
                width,
                height,
            } => write!(f, "origin ({}, {}) is outside the {}x{} image", x, y, width, height),
            FillError::AlreadyRunning => write!(f, "a fill is already running"),
            FillError::AllocationFailure => write!(f, "could not allocate pixel buffer"),
            FillError::WorkerPanicked => write!(f, "fill worker panicked"),
        }
    }
}

impl std::error::Error for FillError {}
