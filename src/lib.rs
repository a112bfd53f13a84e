//! FlowFill: tolerance-based flood fill with dark-edge barriers, an animated
//! batched traversal and a bounded undo history.
//!
//! The entry point for library use is [`FillSession`], which owns one image and
//! serializes fills against it.

#[macro_use]
pub mod logger;
pub mod cli;
pub mod components;
pub mod error;
pub mod io;
pub mod ops;
pub mod raster;
pub mod session;
pub mod settings;

pub use components::HistoryStack;
pub use error::FillError;
pub use ops::{FillAnimation, FillEvent, FillOutcome, NoOpReason};
pub use raster::{Color, Connectivity, PixelBuffer, RasterImage};
pub use session::{FillReport, FillRequest, FillSession, FillSessionState};
pub use settings::FillSettings;
