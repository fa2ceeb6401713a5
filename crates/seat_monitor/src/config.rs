//! Monitor settings, read from a JSON file or from environment variables.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use course_watch::{MonitorConfig, WatchTarget};
use flex_portal::{DEFAULT_LOGIN_URL, PortalConfig};
use notification_services::NotificationsConfig;
use notification_services::types::{EmailConfig, PushConfig, TwilioConfig};
use serde::Deserialize;
use validator::Validate;

/// Default registration page.
pub const DEFAULT_REGISTRATION_URL: &str =
    "https://flexstudent.nu.edu.pk/Student/CourseRegistrationBS";

/// Errors loading the monitor settings.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The settings file exists but could not be read
    #[error("Failed to read {path}: {source}")]
    Io {
        /// File that was read
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// The settings file is not valid JSON for [`Settings`]
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    /// Values are present but unusable
    #[error("Invalid config: {0}")]
    Invalid(String),

    /// Neither a settings file nor login credentials in the environment
    #[error(
        "Config file {0} not found and no environment variables set \
         (REGISTRATION_USERNAME, REGISTRATION_PASSWORD)"
    )]
    Missing(PathBuf),
}

impl From<validator::ValidationErrors> for ConfigError {
    fn from(errors: validator::ValidationErrors) -> Self {
        ConfigError::Invalid(errors.to_string())
    }
}

/// Where the settings came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// A JSON settings file
    File(PathBuf),
    /// Process environment
    Environment,
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigSource::File(path) => write!(f, "{}", path.display()),
            ConfigSource::Environment => write!(f, "environment variables"),
        }
    }
}

/// Portal login credentials.
#[derive(Clone, Deserialize, Validate)]
pub struct Credentials {
    /// Portal account name
    #[validate(length(min = 1, message = "Username is required"))]
    pub username: String,

    /// Portal account password
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Complete monitor settings.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct Settings {
    /// Portal login
    #[validate(nested)]
    pub credentials: Credentials,

    /// Login page
    #[serde(default = "default_login_url")]
    pub login_url: String,

    /// Registration page; empty means follow the "Course Registration" link
    #[serde(default = "default_registration_url")]
    pub registration_url: String,

    /// Preferred id of the username input
    #[serde(default = "default_username_field_id")]
    pub username_field_id: String,

    /// Preferred id of the password input
    #[serde(default = "default_password_field_id")]
    pub password_field_id: String,

    /// Seconds between poll cycles
    #[serde(default = "default_check_interval")]
    #[validate(range(min = 1, message = "Check interval must be at least one second"))]
    pub check_interval: u64,

    /// Run Chrome without a window
    #[serde(default = "default_headless")]
    pub headless: bool,

    /// Chrome executable override
    #[serde(default)]
    pub chrome_path: Option<PathBuf>,

    /// Install exported cookies before logging in
    #[serde(default)]
    pub use_cookies: bool,

    /// Exported cookie file
    #[serde(default = "default_cookies_file")]
    pub cookies_file: PathBuf,

    /// Courses to watch, checked in this order
    #[validate(
        length(min = 1, message = "At least one course must be configured"),
        nested
    )]
    pub courses: Vec<WatchTarget>,

    /// Notification channels
    #[serde(default)]
    pub notifications: NotificationsConfig,
}

fn default_login_url() -> String {
    DEFAULT_LOGIN_URL.to_string()
}

fn default_registration_url() -> String {
    DEFAULT_REGISTRATION_URL.to_string()
}

fn default_username_field_id() -> String {
    "Username".to_string()
}

fn default_password_field_id() -> String {
    "Password".to_string()
}

fn default_check_interval() -> u64 {
    60
}

fn default_headless() -> bool {
    true
}

fn default_cookies_file() -> PathBuf {
    PathBuf::from("cookies.json")
}

impl Settings {
    /// Load from `path` if it exists, otherwise from the process environment.
    pub fn load(path: &Path) -> Result<(Self, ConfigSource), ConfigError> {
        Self::load_with(path, |key| std::env::var(key).ok())
    }

    /// Like [`Settings::load`] with an explicit environment lookup.
    pub fn load_with<F>(path: &Path, lookup: F) -> Result<(Self, ConfigSource), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if path.exists() {
            let settings = Self::from_file(path)?;
            return Ok((settings, ConfigSource::File(path.to_path_buf())));
        }

        let has_credentials = ["REGISTRATION_USERNAME", "REGISTRATION_PASSWORD"]
            .iter()
            .all(|&key| lookup(key).is_some_and(|v| !v.is_empty()));
        if !has_credentials {
            return Err(ConfigError::Missing(path.to_path_buf()));
        }

        Ok((Self::from_env_with(lookup)?, ConfigSource::Environment))
    }

    /// Parse and validate a JSON settings file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let settings: Settings = serde_json::from_str(&content)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Build settings from environment variables, watching a single course.
    pub fn from_env_with<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());
        let flag = |key: &str, default: bool| {
            lookup(key)
                .map(|v| v.trim().eq_ignore_ascii_case("true"))
                .unwrap_or(default)
        };

        let check_interval = parse_number(&var("CHECK_INTERVAL", "60"), "CHECK_INTERVAL")?;
        let smtp_port = parse_number(&var("EMAIL_SMTP_PORT", "587"), "EMAIL_SMTP_PORT")?;

        let section = var("COURSE_SECTION", "B");
        let target = WatchTarget {
            course_code: var("COURSE_CODE", "CSX05"),
            course_name: var("COURSE_NAME", "AI Product Development"),
            section: (!section.trim().is_empty()).then(|| section.trim().to_string()),
            auto_register: flag("AUTO_REGISTER", false),
        };

        let password = var("EMAIL_PASSWORD", "");
        let notifications = NotificationsConfig {
            email: EmailConfig {
                enabled: flag("EMAIL_ENABLED", false),
                smtp_server: var("EMAIL_SMTP_SERVER", "smtp.gmail.com"),
                smtp_port,
                from_email: var("EMAIL_FROM", ""),
                to_email: var("EMAIL_TO", ""),
                password: (!password.is_empty()).then_some(password),
            },
            twilio: TwilioConfig {
                enabled: flag("TWILIO_ENABLED", false),
                account_sid: var("TWILIO_ACCOUNT_SID", ""),
                auth_token: var("TWILIO_AUTH_TOKEN", ""),
                from_number: var("TWILIO_FROM_NUMBER", ""),
                to_number: var("TWILIO_TO_NUMBER", ""),
            },
            push: PushConfig {
                enabled: flag("PUSH_ENABLED", false),
            },
        };

        let settings = Settings {
            credentials: Credentials {
                username: var("REGISTRATION_USERNAME", ""),
                password: var("REGISTRATION_PASSWORD", ""),
            },
            login_url: var("LOGIN_URL", DEFAULT_LOGIN_URL),
            registration_url: var("REGISTRATION_URL", DEFAULT_REGISTRATION_URL),
            username_field_id: var("USERNAME_FIELD_ID", "Username"),
            password_field_id: var("PASSWORD_FIELD_ID", "Password"),
            check_interval,
            headless: flag("HEADLESS", true),
            chrome_path: lookup("CHROME_PATH")
                .filter(|p| !p.is_empty())
                .map(PathBuf::from),
            use_cookies: flag("USE_COOKIES", false),
            cookies_file: PathBuf::from(var("COOKIES_FILE", "cookies.json")),
            courses: vec![target],
            notifications,
        };

        settings.validate()?;
        Ok(settings)
    }

    /// Browser session settings.
    pub fn portal_config(&self) -> PortalConfig {
        PortalConfig {
            login_url: self.login_url.clone(),
            username_field_id: self.username_field_id.clone(),
            password_field_id: self.password_field_id.clone(),
            headless: self.headless,
            chrome_path: self.chrome_path.clone(),
            cookies_file: self.use_cookies.then(|| self.cookies_file.clone()),
            ..PortalConfig::new(&self.credentials.username, &self.credentials.password)
        }
    }

    /// Poll loop settings.
    pub fn monitor_config(&self) -> MonitorConfig {
        MonitorConfig {
            check_interval: Duration::from_secs(self.check_interval),
            registration_url: self.registration_url.clone(),
            ..MonitorConfig::default()
        }
    }
}

fn parse_number<T: std::str::FromStr>(value: &str, key: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Invalid(format!("{} must be a number, got '{}'", key, value)))
}
