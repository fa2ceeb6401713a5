//! # Flex Portal
//!
//! This crate drives the student registration portal through a headless
//! Chrome instance over the DevTools protocol. It provides the concrete
//! [`course_watch::BrowserSession`] used by the monitor, along with the
//! selector fallback helper and session cookie import.

/// Portal and browser settings
mod config;
pub use config::*;

/// Session cookie import
mod cookies;
pub use cookies::*;

/// Mapping of protocol failures onto session errors
mod error;
pub use error::*;

/// Element lookup with fallback selectors
mod locator;
pub use locator::*;

/// Browser-backed portal session
mod session;
pub use session::*;
