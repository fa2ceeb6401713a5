use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use validator::Validate;

/// A course (and optionally one section) to watch for open seats.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct WatchTarget {
    /// Course code as printed in the registration table (e.g. `CSX05`)
    #[validate(length(min = 1, message = "Course code is required"))]
    pub course_code: String,

    /// Human readable name used in notifications; defaults to the code
    #[serde(default)]
    pub course_name: String,

    /// Section to filter on; `None` watches the whole course
    #[serde(default, deserialize_with = "deserialize_section")]
    pub section: Option<String>,

    /// Whether to try registering as soon as a seat opens
    #[serde(default)]
    pub auto_register: bool,
}

impl WatchTarget {
    /// Creates a target that watches any section of `course_code`.
    pub fn new(course_code: impl Into<String>, course_name: impl Into<String>) -> Self {
        Self {
            course_code: course_code.into(),
            course_name: course_name.into(),
            section: None,
            auto_register: false,
        }
    }

    /// Restricts the target to one section. A blank section watches any.
    pub fn with_section(mut self, section: impl Into<String>) -> Self {
        self.section = normalize_section(Some(section.into()));
        self
    }

    /// Enables automatic registration on a transition.
    pub fn with_auto_register(mut self, auto_register: bool) -> Self {
        self.auto_register = auto_register;
        self
    }

    /// Identity key of this target.
    pub fn key(&self) -> TargetKey {
        TargetKey::new(&self.course_code, self.section.as_deref())
    }

    /// Name for display, falling back to the course code.
    pub fn display_name(&self) -> &str {
        if self.course_name.trim().is_empty() {
            &self.course_code
        } else {
            &self.course_name
        }
    }

    /// Message announcing that this target just opened up.
    pub fn availability_message(&self) -> String {
        let mut message = format!(
            "🎉 SEATS AVAILABLE! {} ({})",
            self.display_name(),
            self.course_code
        );
        if let Some(ref section) = self.section {
            message.push_str(&format!(" Section {}", section));
        }
        message.push_str(" is now available for registration!");
        message
    }
}

/// Blank sections mean "any section".
fn normalize_section(section: Option<String>) -> Option<String> {
    section
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn deserialize_section<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(normalize_section)
}

/// Identity of a watched target: `(course_code, section or "any")`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TargetKey {
    /// Course code part of the key
    pub course_code: String,
    /// Section part of the key, `"any"` when unfiltered
    pub section: String,
}

impl TargetKey {
    /// Builds a key, mapping a missing section to `"any"`.
    pub fn new(course_code: &str, section: Option<&str>) -> Self {
        Self {
            course_code: course_code.to_string(),
            section: section.unwrap_or("any").to_string(),
        }
    }
}

impl fmt::Display for TargetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.course_code, self.section)
    }
}

/// Raw content of the registration-table row for one course.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseRow {
    /// Full visible text of the row
    pub text: String,
    /// Labels of the selectable section controls found in the row
    #[serde(default)]
    pub section_labels: Vec<String>,
}

impl CourseRow {
    /// Creates a row from its text and section control labels.
    pub fn new(text: impl Into<String>, section_labels: Vec<String>) -> Self {
        Self {
            text: text.into(),
            section_labels,
        }
    }
}

/// One selectable section control parsed from a row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionIndicator {
    /// Section identifier with the "Section" prefix removed (e.g. `B`)
    pub name: String,
    /// Label exactly as scraped
    pub label: String,
    /// Whether the control is marked full
    pub full: bool,
}

/// Result of one availability check for one target in one poll cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvailabilityVerdict {
    /// Target the verdict belongs to
    pub target_key: TargetKey,
    /// Whether a seat can be taken
    pub available: bool,
    /// Whether the row carried a global "full" marker
    pub is_full: bool,
    /// Section controls that are not marked full
    pub sections: Vec<SectionIndicator>,
    /// Opaque detail mapping forwarded to notifications
    pub raw_detail: serde_json::Value,
    /// Set when the check could not be performed
    pub error: Option<String>,
}

impl AvailabilityVerdict {
    /// Whether this verdict reports a failed check rather than a state.
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Last known availability of one target.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatusRecord {
    /// Last successfully observed availability
    pub available: bool,
    /// When the target was last checked, successfully or not
    pub last_check: Option<DateTime<Utc>>,
    /// Last successful verdict
    pub details: Option<AvailabilityVerdict>,
    /// Error of the most recent check, cleared by the next success
    pub last_error: Option<String>,
}

/// A full to available edge observed for one target.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransitionEvent {
    /// Target that opened up
    pub target_key: TargetKey,
    /// Verdict that completed the edge
    pub verdict: AvailabilityVerdict,
    /// When the edge was observed
    pub detected_at: DateTime<Utc>,
}
