//! Time-indexed data structures and CSV utilities

pub mod frame;
pub mod loader;

pub use frame::{TimeFrame, TimeSeries};
pub use loader::{bars_to_frame, load_bars, load_frame, save_bars, save_frame, Bar, BAR_COLUMNS};
