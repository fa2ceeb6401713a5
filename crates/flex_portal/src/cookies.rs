use std::path::Path;

use chromiumoxide::cdp::browser_protocol::network::{CookieParam, TimeSinceEpoch};
use serde::Deserialize;

/// Errors reading an exported cookie file.
#[derive(Debug, thiserror::Error)]
pub enum CookieError {
    /// The file could not be read
    #[error("Failed to read cookie file: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not a JSON array of cookies
    #[error("Invalid cookie file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// A cookie as written by the browser cookie export.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StoredCookie {
    /// Cookie name
    pub name: String,
    /// Cookie value
    pub value: String,
    /// Cookie domain
    #[serde(default)]
    pub domain: Option<String>,
    /// Cookie path
    #[serde(default)]
    pub path: Option<String>,
    /// Secure flag
    #[serde(default)]
    pub secure: Option<bool>,
    /// HttpOnly flag
    #[serde(default, rename = "httpOnly")]
    pub http_only: Option<bool>,
    /// Expiry in seconds since the epoch; session cookies have none
    #[serde(default)]
    pub expiry: Option<f64>,
}

impl StoredCookie {
    /// Protocol parameters installing this cookie.
    pub fn to_param(&self) -> CookieParam {
        let mut param = CookieParam::new(self.name.clone(), self.value.clone());
        param.domain = self.domain.clone();
        param.path = self.path.clone();
        param.secure = self.secure;
        param.http_only = self.http_only;
        param.expires = self.expiry.map(TimeSinceEpoch::new);
        param
    }
}

/// Read an exported cookie file.
pub fn load_cookies(path: &Path) -> Result<Vec<StoredCookie>, CookieError> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}
