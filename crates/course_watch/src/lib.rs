//! # Course Watch
//!
//! This crate provides the seat monitoring core: watch targets, availability
//! evaluation of scraped registration rows, edge detection per target and the
//! poll loop that drives a browser session and announces openings.

/// Types describing watch targets and check results
mod watch_types;
pub use watch_types::*;

/// Availability evaluation of registration rows
mod availability;
pub use availability::*;

/// Per-target state and transition detection
mod state;
pub use state::*;

/// Browser session seam
mod session;
pub use session::*;

/// Poll loop with recovery
mod monitor;
pub use monitor::*;
