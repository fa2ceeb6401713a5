use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Default login page of the portal.
pub const DEFAULT_LOGIN_URL: &str = "https://flexstudent.nu.edu.pk/Account/Login";

/// Settings for a [`crate::PortalSession`].
#[derive(Clone)]
pub struct PortalConfig {
    /// Login page URL
    pub login_url: String,

    /// Account name entered in the login form
    pub username: String,

    /// Account password entered in the login form
    pub password: String,

    /// Element id tried first for the username input (default: `Username`)
    pub username_field_id: String,

    /// Element id tried first for the password input (default: `Password`)
    pub password_field_id: String,

    /// Run Chrome without a window (default: true)
    pub headless: bool,

    /// Chrome executable; auto-detected when unset
    pub chrome_path: Option<PathBuf>,

    /// Exported cookie file installed before login, if any
    pub cookies_file: Option<PathBuf>,

    /// How long to wait for a course row to appear (default: 10 seconds)
    pub row_timeout: Duration,

    /// How long to wait for login form elements (default: 15 seconds)
    pub element_timeout: Duration,

    /// Pause after a page load (default: 2 seconds)
    pub page_settle: Duration,

    /// Pause after submitting the login form (default: 5 seconds)
    pub login_settle: Duration,
}

impl PortalConfig {
    /// Defaults with the given credentials.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            ..Self::default()
        }
    }
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            login_url: DEFAULT_LOGIN_URL.to_string(),
            username: String::new(),
            password: String::new(),
            username_field_id: "Username".to_string(),
            password_field_id: "Password".to_string(),
            headless: true,
            chrome_path: None,
            cookies_file: None,
            row_timeout: Duration::from_secs(10),
            element_timeout: Duration::from_secs(15),
            page_settle: Duration::from_secs(2),
            login_settle: Duration::from_secs(5),
        }
    }
}

impl fmt::Debug for PortalConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PortalConfig")
            .field("login_url", &self.login_url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("username_field_id", &self.username_field_id)
            .field("password_field_id", &self.password_field_id)
            .field("headless", &self.headless)
            .field("chrome_path", &self.chrome_path)
            .field("cookies_file", &self.cookies_file)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_hides_password() {
        let config = PortalConfig::new("i200000", "hunter2");
        let rendered = format!("{:?}", config);

        assert!(rendered.contains("i200000"));
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn test_defaults() {
        let config = PortalConfig::default();
        assert_eq!(config.login_url, DEFAULT_LOGIN_URL);
        assert_eq!(config.username_field_id, "Username");
        assert!(config.headless);
        assert!(config.cookies_file.is_none());
    }
}
