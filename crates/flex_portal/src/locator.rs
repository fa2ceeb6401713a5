use std::fmt;
use std::time::Duration;

use chromiumoxide::Page;
use course_watch::SessionError;
use log::debug;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::time::{Instant, sleep};

use crate::error::session_error;

const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// One way of finding an element on the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    /// Element id
    Id(String),
    /// `name` attribute
    Name(String),
    /// CSS selector
    Css(String),
    /// XPath expression; the first matching node is used
    XPath(String),
    /// Link whose text contains the value
    LinkText(String),
}

impl Locator {
    /// JavaScript expression evaluating to the element or `null`.
    pub fn to_js(&self) -> String {
        match self {
            Locator::Id(id) => format!("document.getElementById({})", js_string(id)),
            Locator::Name(name) => {
                format!("(document.getElementsByName({})[0] || null)", js_string(name))
            }
            Locator::Css(selector) => format!("document.querySelector({})", js_string(selector)),
            Locator::XPath(xpath) => format!(
                "document.evaluate({}, document, null, XPathResult.FIRST_ORDERED_NODE_TYPE, null).singleNodeValue",
                js_string(xpath)
            ),
            Locator::LinkText(text) => format!(
                "(Array.from(document.querySelectorAll('a')).find(a => (a.textContent || '').includes({})) || null)",
                js_string(text)
            ),
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Id(v) => write!(f, "id={}", v),
            Locator::Name(v) => write!(f, "name={}", v),
            Locator::Css(v) => write!(f, "css={}", v),
            Locator::XPath(v) => write!(f, "xpath={}", v),
            Locator::LinkText(v) => write!(f, "link={}", v),
        }
    }
}

/// Quote `value` as a JavaScript string literal.
pub fn js_string(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

/// Quote `value` as an XPath string literal.
pub fn xpath_literal(value: &str) -> String {
    if !value.contains('\'') {
        format!("'{}'", value)
    } else if !value.contains('"') {
        format!("\"{}\"", value)
    } else {
        let parts: Vec<String> = value.split('\'').map(|p| format!("'{}'", p)).collect();
        format!("concat({})", parts.join(", \"'\", "))
    }
}

/// Evaluate `script` and deserialize its result.
pub async fn evaluate<T: DeserializeOwned>(page: &Page, script: &str) -> Result<T, SessionError> {
    let result = page
        .evaluate(script)
        .await
        .map_err(|e| session_error("evaluate", e))?;
    decode_value(result.value().cloned())
}

/// Deserialize a script result. The protocol omits the value when the script
/// returns `null`, so a missing value decodes as `null`.
pub fn decode_value<T: DeserializeOwned>(value: Option<Value>) -> Result<T, SessionError> {
    serde_json::from_value(value.unwrap_or(Value::Null))
        .map_err(|e| SessionError::Browser(format!("unexpected script result: {}", e)))
}

/// Whether `locator` currently matches an element.
pub async fn element_exists(page: &Page, locator: &Locator) -> Result<bool, SessionError> {
    evaluate(page, &format!("({}) !== null", locator.to_js())).await
}

/// Wait up to `timeout` for any of `locators` to match, trying them in order
/// on every poll. The page is checked at least once.
pub async fn locate_element(
    page: &Page,
    locators: &[Locator],
    timeout: Duration,
) -> Result<Option<Locator>, SessionError> {
    let deadline = Instant::now() + timeout;

    loop {
        for locator in locators {
            if element_exists(page, locator).await? {
                debug!("Found element using {}", locator);
                return Ok(Some(locator.clone()));
            }
        }

        if Instant::now() >= deadline {
            return Ok(None);
        }
        sleep(POLL_INTERVAL).await;
    }
}

/// Replace the value of an input and fire its change events.
pub async fn fill(page: &Page, locator: &Locator, value: &str) -> Result<(), SessionError> {
    let script = format!(
        r#"(() => {{
            const el = {};
            if (!el) return false;
            el.focus();
            el.value = '';
            el.value = {};
            el.dispatchEvent(new Event('input', {{ bubbles: true }}));
            el.dispatchEvent(new Event('change', {{ bubbles: true }}));
            return true;
        }})()"#,
        locator.to_js(),
        js_string(value)
    );

    if evaluate::<bool>(page, &script).await? {
        Ok(())
    } else {
        Err(SessionError::ElementNotFound(locator.to_string()))
    }
}

/// Click the element. Returns false if it is gone.
pub async fn click(page: &Page, locator: &Locator) -> Result<bool, SessionError> {
    let script = format!(
        r#"(() => {{
            const el = {};
            if (!el) return false;
            el.scrollIntoView({{ block: 'center' }});
            el.click();
            return true;
        }})()"#,
        locator.to_js()
    );
    evaluate(page, &script).await
}

/// Submit the form owning the element, as pressing Enter in it would.
pub async fn submit_form(page: &Page, locator: &Locator) -> Result<bool, SessionError> {
    let script = format!(
        r#"(() => {{
            const el = {};
            if (!el || !el.form) return false;
            if (el.form.requestSubmit) el.form.requestSubmit(); else el.form.submit();
            return true;
        }})()"#,
        locator.to_js()
    );
    evaluate(page, &script).await
}

/// Visible text of the element, if present.
pub async fn text_of(page: &Page, locator: &Locator) -> Result<Option<String>, SessionError> {
    let script = format!(
        "(() => {{ const el = {}; return el ? (el.innerText || el.textContent || '').trim() : null; }})()",
        locator.to_js()
    );
    evaluate(page, &script).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_js_expressions_quote_values() {
        assert_eq!(
            Locator::Id("Username".to_string()).to_js(),
            r#"document.getElementById("Username")"#
        );
        assert_eq!(
            Locator::Css(".btn-primary".to_string()).to_js(),
            r#"document.querySelector(".btn-primary")"#
        );

        let xpath = Locator::XPath("//input[@type='password']".to_string()).to_js();
        assert!(xpath.starts_with(r#"document.evaluate("//input[@type='password']""#));
        assert!(xpath.contains("FIRST_ORDERED_NODE_TYPE"));
    }

    #[test]
    fn test_js_string_escapes_quotes_and_newlines() {
        assert_eq!(js_string(r#"pa"ss"#), r#""pa\"ss""#);
        assert_eq!(js_string("a\nb"), r#""a\nb""#);
    }

    #[test]
    fn test_link_text_matches_substring() {
        let js = Locator::LinkText("Course Registration".to_string()).to_js();
        assert!(js.contains(r#"includes("Course Registration")"#));
    }

    #[test]
    fn test_xpath_literal() {
        assert_eq!(xpath_literal("CSX05"), "'CSX05'");
        assert_eq!(xpath_literal("O'Neil"), "\"O'Neil\"");
        assert_eq!(
            xpath_literal(r#"a'b"c"#),
            r#"concat('a', "'", 'b"c')"#
        );
    }

    #[test]
    fn test_null_script_result_decodes_as_none() {
        use chromiumoxide::cdp::js_protocol::runtime::RemoteObject;
        use course_watch::CourseRow;

        let reply: RemoteObject = serde_json::from_value(serde_json::json!({
            "type": "object",
            "subtype": "null",
            "value": null
        }))
        .unwrap();

        let row: Option<CourseRow> = decode_value(reply.value).unwrap();
        assert_eq!(row, None);

        let text: Option<String> = decode_value(None).unwrap();
        assert_eq!(text, None);
    }

    #[test]
    fn test_script_values_decode() {
        let row: Option<course_watch::CourseRow> = decode_value(Some(serde_json::json!({
            "text": "CSX05 Section Full",
            "section_labels": ["Section B"]
        })))
        .unwrap();
        assert_eq!(row.unwrap().section_labels, vec!["Section B".to_string()]);

        assert!(decode_value::<bool>(Some(serde_json::json!(true))).unwrap());
        assert!(matches!(
            decode_value::<bool>(None),
            Err(SessionError::Browser(_))
        ));
    }

    #[test]
    fn test_display() {
        assert_eq!(Locator::Name("password".to_string()).to_string(), "name=password");
        assert_eq!(Locator::Id("loginButton".to_string()).to_string(), "id=loginButton");
    }
}
