use async_trait::async_trait;

use crate::watch_types::CourseRow;

/// Failures of the browser session, classified for recovery.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SessionError {
    /// The browser could not be started or reached
    #[error("Browser launch failed: {0}")]
    Launch(String),

    /// The login form could not be completed
    #[error("Login failed: {0}")]
    Login(String),

    /// A page could not be loaded
    #[error("Navigation failed: {0}")]
    Navigation(String),

    /// A required element was not present
    #[error("Element not found: {0}")]
    ElementNotFound(String),

    /// A bounded wait ran out
    #[error("Timed out: {0}")]
    Timeout(String),

    /// The browser or its connection went away
    #[error("Browser connection lost: {0}")]
    ConnectionLost(String),

    /// Any other browser protocol failure
    #[error("Browser error: {0}")]
    Browser(String),
}

impl SessionError {
    /// Whether the page itself is gone, so a refresh cannot help.
    pub fn is_connection_lost(&self) -> bool {
        matches!(self, SessionError::ConnectionLost(_) | SessionError::Launch(_))
    }
}

/// Authenticated, navigable access to the registration portal.
///
/// The monitor owns the session exclusively and drives it sequentially.
#[async_trait]
pub trait BrowserSession: Send {
    /// Authenticate with the portal.
    async fn login(&mut self) -> Result<(), SessionError>;

    /// Open the registration page at `url`.
    async fn navigate(&mut self, url: &str) -> Result<(), SessionError>;

    /// Reload the current page.
    async fn refresh(&mut self) -> Result<(), SessionError>;

    /// Locate the table row for `course_code` within a bounded wait.
    ///
    /// `Ok(None)` means the row did not appear in time.
    async fn find_course_row(&mut self, course_code: &str)
    -> Result<Option<CourseRow>, SessionError>;

    /// Best-effort registration for a course section. Returns whether the
    /// confirmation step was reached.
    async fn attempt_registration(
        &mut self,
        course_code: &str,
        section: Option<&str>,
    ) -> Result<bool, SessionError>;

    /// Release the browser. Must be safe to call more than once.
    async fn close(&mut self);
}
