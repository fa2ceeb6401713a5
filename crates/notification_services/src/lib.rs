//! # Notification Services
//!
//! This crate delivers seat-availability notifications. A
//! [`NotificationService`] fans a message out to every enabled channel
//! (Twilio SMS, SMTP email, push stub), isolating failures per channel.

/// Channel abstraction implemented by every delivery mechanism.
pub mod channel;
/// SMTP email channel.
pub mod email;
/// Push channel placeholder.
pub mod push;
/// Fan-out service and the [`Notifier`] seam used by the monitor.
pub mod service;
/// Twilio SMS channel.
pub mod sms;
/// Configuration, delivery outcomes and errors.
pub mod types;

pub use channel::NotificationChannel;
pub use service::{NotificationReport, NotificationService, Notifier};
pub use types::{Delivery, NotificationError, NotificationsConfig};
