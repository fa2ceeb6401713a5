use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::{Browser, BrowserConfig, Page};
use course_watch::{BrowserSession, CourseRow, SessionError};
use futures::StreamExt;
use log::{debug, error, info, warn};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep};

use crate::config::PortalConfig;
use crate::cookies::load_cookies;
use crate::error::session_error;
use crate::locator::{
    Locator, click, evaluate, fill, js_string, locate_element, submit_form, text_of,
    xpath_literal,
};

const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

const HIDE_WEBDRIVER_JS: &str =
    "Object.defineProperty(navigator, 'webdriver', { get: () => undefined })";

const REGISTRATION_LINK_TEXT: &str = "Course Registration";

/// Whether `url` still points at the sign-in pages.
pub fn is_login_url(url: &str) -> bool {
    url.contains("Login") || url.contains("Account")
}

/// Log a navigation that did not settle. Returns whether it settled.
fn settled<T, E: std::fmt::Display>(context: &str, result: Result<T, E>) -> bool {
    match result {
        Ok(_) => true,
        Err(e) => {
            debug!("{} navigation did not settle: {}", context, e);
            false
        }
    }
}

/// XPath of the registration table row mentioning `course_code`.
pub fn course_row_xpath(course_code: &str) -> String {
    format!("//tr[contains(., {})]", xpath_literal(course_code))
}

/// Script returning `{ text, section_labels }` for the course row, or `null`.
fn course_row_script(course_code: &str) -> String {
    format!(
        r#"(() => {{
            const row = {};
            if (!row) return null;
            const labels = Array.from(row.querySelectorAll('button, a, select'))
                .map(el => (el.innerText || el.value || el.textContent || '').trim())
                .filter(text => text.length > 0);
            return {{ text: row.innerText || row.textContent || '', section_labels: labels }};
        }})()"#,
        Locator::XPath(course_row_xpath(course_code)).to_js()
    )
}

/// Script clicking the section control of the course row. Returns whether a
/// control was clicked.
fn section_click_script(course_code: &str, section: Option<&str>) -> String {
    format!(
        r#"(() => {{
            const row = {};
            if (!row) return false;
            const wanted = {};
            const control = Array.from(row.querySelectorAll('button, a'))
                .find(el => (el.textContent || '').includes(wanted));
            if (!control) return false;
            control.click();
            return true;
        }})()"#,
        Locator::XPath(course_row_xpath(course_code)).to_js(),
        js_string(section.unwrap_or("Section"))
    )
}

fn username_locators(config: &PortalConfig) -> Vec<Locator> {
    vec![
        Locator::Id(config.username_field_id.clone()),
        Locator::Name("Username".to_string()),
        Locator::Name("username".to_string()),
        Locator::Id("Username".to_string()),
        Locator::XPath("//input[@type='text' and contains(@name, 'user')]".to_string()),
        Locator::XPath("//input[@type='text' and contains(@id, 'user')]".to_string()),
    ]
}

fn password_locators(config: &PortalConfig) -> Vec<Locator> {
    vec![
        Locator::Id(config.password_field_id.clone()),
        Locator::Name("Password".to_string()),
        Locator::Name("password".to_string()),
        Locator::Id("Password".to_string()),
        Locator::XPath("//input[@type='password']".to_string()),
    ]
}

fn submit_locators() -> Vec<Locator> {
    vec![
        Locator::XPath("//button[@type='submit']".to_string()),
        Locator::XPath("//input[@type='submit']".to_string()),
        Locator::XPath("//button[contains(text(), 'Login')]".to_string()),
        Locator::XPath("//button[contains(text(), 'Sign')]".to_string()),
        Locator::Id("loginButton".to_string()),
        Locator::Css(".btn-primary".to_string()),
    ]
}

fn confirm_locators() -> Vec<Locator> {
    vec![
        Locator::XPath("//button[contains(text(), 'Confirm')]".to_string()),
        Locator::XPath("//button[contains(text(), 'Register')]".to_string()),
    ]
}

/// A logged-in Chrome tab on the registration portal.
pub struct PortalSession {
    config: PortalConfig,
    browser: Option<Browser>,
    page: Option<Page>,
    handler: Option<JoinHandle<()>>,
}

impl PortalSession {
    /// Start Chrome and open a blank tab.
    pub async fn launch(config: PortalConfig) -> Result<Self, SessionError> {
        let mut builder = BrowserConfig::builder();

        // chromiumoxide runs headless unless a head is requested
        if !config.headless {
            builder = builder.with_head();
        }

        if let Some(ref path) = config.chrome_path {
            builder = builder.chrome_executable(path);
        }

        builder = builder
            .window_size(1920, 1080)
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-gpu")
            .arg("--disable-software-rasterizer")
            .arg("--disable-extensions")
            .arg("--disable-blink-features=AutomationControlled")
            .arg(format!("--user-agent={}", USER_AGENT));

        let browser_config = builder.build().map_err(|e| {
            SessionError::Launch(format!("failed to build browser config: {}", e))
        })?;

        let (browser, mut handler) = Browser::launch(browser_config).await.map_err(|e| {
            error!("Make sure Chrome or Chromium is installed");
            SessionError::Launch(e.to_string())
        })?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("browser event error: {}", e);
                }
            }
            debug!("browser event handler exited");
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                handler.abort();
                return Err(SessionError::Launch(e.to_string()));
            }
        };

        if let Err(e) = page
            .execute(AddScriptToEvaluateOnNewDocumentParams::new(HIDE_WEBDRIVER_JS))
            .await
        {
            warn!("Could not install page init script: {}", e);
        }

        info!("Chrome session initialized successfully");

        Ok(Self {
            config,
            browser: Some(browser),
            page: Some(page),
            handler: Some(handler),
        })
    }

    fn page(&self) -> Result<Page, SessionError> {
        self.page
            .clone()
            .ok_or_else(|| SessionError::ConnectionLost("browser closed".to_string()))
    }

    async fn goto(&self, url: &str) -> Result<(), SessionError> {
        let page = self.page()?;
        page.goto(url).await.map_err(|e| match session_error("goto", e) {
            SessionError::Browser(msg) => SessionError::Navigation(msg),
            other => other,
        })?;
        settled("goto", page.wait_for_navigation().await);
        sleep(self.config.page_settle).await;
        Ok(())
    }

    async fn current_url(&self) -> String {
        match self.page() {
            Ok(page) => page.url().await.ok().flatten().unwrap_or_default(),
            Err(_) => String::new(),
        }
    }

    /// Install exported cookies and reload. Returns whether the portal no
    /// longer shows the login page afterwards.
    async fn restore_cookies(&self) -> Result<bool, SessionError> {
        let Some(ref path) = self.config.cookies_file else {
            return Ok(false);
        };

        let cookies = match load_cookies(path) {
            Ok(cookies) => cookies,
            Err(e) => {
                warn!("Ignoring cookie file {}: {}", path.display(), e);
                return Ok(false);
            }
        };
        if cookies.is_empty() {
            return Ok(false);
        }

        let page = self.page()?;
        page.set_cookies(cookies.iter().map(|c| c.to_param()).collect())
            .await
            .map_err(|e| session_error("set cookies", e))?;
        info!("Loaded {} cookies from {}", cookies.len(), path.display());

        page.reload()
            .await
            .map_err(|e| session_error("reload", e))?;
        settled("cookie reload", page.wait_for_navigation().await);
        sleep(self.config.page_settle).await;

        Ok(!is_login_url(&self.current_url().await))
    }

    async fn log_page_context(&self) {
        let title = match self.page() {
            Ok(page) => page.get_title().await.ok().flatten().unwrap_or_default(),
            Err(_) => String::new(),
        };
        error!("Page title: {}", title);
        error!("Current URL: {}", self.current_url().await);
    }
}

#[async_trait]
impl BrowserSession for PortalSession {
    async fn login(&mut self) -> Result<(), SessionError> {
        info!("Navigating to login page: {}", self.config.login_url);
        self.goto(&self.config.login_url).await.map_err(|e| match e {
            SessionError::Navigation(msg) => SessionError::Login(msg),
            other => other,
        })?;

        if self.restore_cookies().await? {
            info!("Session restored from cookies");
            return Ok(());
        }

        let page = self.page()?;

        let Some(username) = locate_element(
            &page,
            &username_locators(&self.config),
            self.config.element_timeout,
        )
        .await?
        else {
            error!("Could not find username field");
            self.log_page_context().await;
            return Err(SessionError::Login("username field not found".to_string()));
        };
        info!("Found username field using {}", username);
        fill(&page, &username, &self.config.username).await?;

        let Some(password) =
            locate_element(&page, &password_locators(&self.config), std::time::Duration::ZERO)
                .await?
        else {
            error!("Could not find password field");
            return Err(SessionError::Login("password field not found".to_string()));
        };
        fill(&page, &password, &self.config.password).await?;
        info!("Credentials entered");

        match locate_element(&page, &submit_locators(), std::time::Duration::ZERO).await? {
            Some(button) => {
                info!("Found login button using {}", button);
                click(&page, &button).await?;
            }
            None => {
                warn!("Could not find login button, submitting the form instead");
                submit_form(&page, &password).await?;
            }
        }

        sleep(self.config.login_settle).await;

        let url = self.current_url().await;
        if !is_login_url(&url) {
            info!("Login successful - redirected to: {}", url);
            return Ok(());
        }

        if let Some(message) = text_of(&page, &Locator::Css(".error".to_string())).await? {
            if !message.is_empty() {
                error!("Login error: {}", message);
            }
        }
        // Some portal layouts keep the Account path after a good login.
        warn!("Login may have failed - still on: {}", url);
        Ok(())
    }

    async fn navigate(&mut self, url: &str) -> Result<(), SessionError> {
        if url.is_empty() {
            let page = self.page()?;
            let link = Locator::LinkText(REGISTRATION_LINK_TEXT.to_string());
            let found = locate_element(&page, std::slice::from_ref(&link), self.config.row_timeout)
                .await?;
            if found.is_none() || !click(&page, &link).await? {
                return Err(SessionError::Navigation(format!(
                    "link '{}' not found",
                    REGISTRATION_LINK_TEXT
                )));
            }
            settled("registration link", page.wait_for_navigation().await);
            sleep(self.config.page_settle).await;
        } else {
            self.goto(url).await?;
        }

        debug!("Now on {}", self.current_url().await);
        Ok(())
    }

    async fn refresh(&mut self) -> Result<(), SessionError> {
        let page = self.page()?;
        page.reload()
            .await
            .map_err(|e| session_error("reload", e))?;
        settled("refresh", page.wait_for_navigation().await);
        Ok(())
    }

    async fn find_course_row(
        &mut self,
        course_code: &str,
    ) -> Result<Option<CourseRow>, SessionError> {
        let page = self.page()?;
        let script = course_row_script(course_code);
        let deadline = Instant::now() + self.config.row_timeout;

        loop {
            if let Some(row) = evaluate::<Option<CourseRow>>(&page, &script).await? {
                return Ok(Some(row));
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
            sleep(std::time::Duration::from_millis(250)).await;
        }
    }

    async fn attempt_registration(
        &mut self,
        course_code: &str,
        section: Option<&str>,
    ) -> Result<bool, SessionError> {
        let page = self.page()?;

        if self.find_course_row(course_code).await?.is_none() {
            return Err(SessionError::ElementNotFound(format!(
                "row for {}",
                course_code
            )));
        }

        let clicked: bool = evaluate(&page, &section_click_script(course_code, section)).await?;
        if !clicked {
            return Err(SessionError::ElementNotFound(format!(
                "section control {} for {}",
                section.unwrap_or("Section"),
                course_code
            )));
        }
        sleep(self.config.page_settle).await;

        match locate_element(&page, &confirm_locators(), std::time::Duration::ZERO).await? {
            Some(button) => {
                click(&page, &button).await?;
                sleep(std::time::Duration::from_secs(1)).await;
                info!(
                    "Registration attempted for {} {}",
                    course_code,
                    section.unwrap_or("")
                );
                Ok(true)
            }
            None => {
                warn!("Could not find confirmation button");
                Ok(false)
            }
        }
    }

    async fn close(&mut self) {
        self.page = None;

        if let Some(mut browser) = self.browser.take() {
            if let Err(e) = browser.close().await {
                warn!("Failed to close browser cleanly: {}", e);
            }
            let _ = browser.wait().await;
        }

        if let Some(handler) = self.handler.take() {
            handler.abort();
        }
    }
}
