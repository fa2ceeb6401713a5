use serde_json::json;
use tracing::debug;

use crate::watch_types::{AvailabilityVerdict, CourseRow, SectionIndicator, WatchTarget};

/// Row markers meaning the whole course has no seats left.
pub const FULL_MARKERS: [&str; 2] = ["Section Full", "No Seat Available"];

/// Error recorded when the course row could not be located.
pub const COURSE_NOT_FOUND: &str = "Course not found";

/// Turns a scraped registration row into an availability verdict.
#[derive(Debug, Clone, Copy, Default)]
pub struct AvailabilityChecker;

impl AvailabilityChecker {
    /// Creates a checker.
    pub fn new() -> Self {
        Self
    }

    /// Evaluate `row` for `target`, filtering on `target.section` if set.
    ///
    /// A missing row yields an error verdict that is never available.
    pub fn check(&self, target: &WatchTarget, row: Option<&CourseRow>) -> AvailabilityVerdict {
        let Some(row) = row else {
            return self.error_verdict(target, COURSE_NOT_FOUND);
        };

        let is_full = FULL_MARKERS.iter().any(|marker| row.text.contains(marker));
        let sections: Vec<SectionIndicator> = parse_sections(&row.section_labels)
            .into_iter()
            .filter(|s| !s.full)
            .collect();

        let available = match target.section.as_deref() {
            Some(wanted) => sections.iter().any(|s| section_matches(s, wanted)),
            None => !is_full || !sections.is_empty(),
        };

        debug!(
            course = %target.course_code,
            is_full,
            open_sections = sections.len(),
            available,
            "evaluated course row"
        );

        let raw_detail = json!({
            "course_code": target.course_code,
            "section": target.section,
            "available": available,
            "is_full": is_full,
            "sections_available": sections.iter().map(|s| s.name.as_str()).collect::<Vec<_>>(),
            "row_text": row.text,
        });

        AvailabilityVerdict {
            target_key: target.key(),
            available,
            is_full,
            sections,
            raw_detail,
            error: None,
        }
    }

    /// Verdict for a check that could not be performed.
    pub fn error_verdict(&self, target: &WatchTarget, error: &str) -> AvailabilityVerdict {
        AvailabilityVerdict {
            target_key: target.key(),
            available: false,
            is_full: false,
            sections: Vec::new(),
            raw_detail: json!({
                "course_code": target.course_code,
                "error": error,
            }),
            error: Some(error.to_string()),
        }
    }
}

/// Parse the section controls of a row. Labels without "Section" are not
/// section controls and are dropped.
pub fn parse_sections(labels: &[String]) -> Vec<SectionIndicator> {
    labels
        .iter()
        .map(|label| label.trim())
        .filter(|label| label.contains("Section"))
        .map(|label| SectionIndicator {
            name: section_name(label),
            label: label.to_string(),
            full: label.contains("Full"),
        })
        .collect()
}

fn section_name(label: &str) -> String {
    let rest = match label.get(..7) {
        Some(prefix) if prefix.eq_ignore_ascii_case("section") => &label[7..],
        _ => label,
    };
    rest.trim_start_matches(|c: char| c.is_whitespace() || c == ':' || c == '-')
        .trim()
        .to_string()
}

fn section_matches(section: &SectionIndicator, wanted: &str) -> bool {
    let wanted = wanted.trim();
    section.name.eq_ignore_ascii_case(wanted) || section.label.eq_ignore_ascii_case(wanted)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(text: &str, labels: &[&str]) -> CourseRow {
        CourseRow::new(text, labels.iter().map(|l| l.to_string()).collect())
    }

    #[test]
    fn test_full_row_without_filter_is_unavailable() {
        let target = WatchTarget::new("CSX05", "AI Product Development");
        let verdict =
            AvailabilityChecker::new().check(&target, Some(&row("CSX05 AI Product Section Full", &[])));

        assert!(!verdict.available);
        assert!(verdict.is_full);
        assert!(verdict.error.is_none());
    }

    #[test]
    fn test_requested_section_open_in_full_row() {
        let target = WatchTarget::new("CSX05", "AI Product Development").with_section("B");
        let course_row = row(
            "CSX05 AI Product Section Full",
            &["Section A Full", "Section B"],
        );

        let verdict = AvailabilityChecker::new().check(&target, Some(&course_row));

        assert!(verdict.available);
        assert!(verdict.is_full);
        assert_eq!(verdict.sections.len(), 1);
        assert_eq!(verdict.sections[0].name, "B");
    }

    #[test]
    fn test_section_match_is_case_insensitive() {
        let target = WatchTarget::new("CSX05", "").with_section("b");
        let verdict = AvailabilityChecker::new()
            .check(&target, Some(&row("CSX05", &["Section B"])));

        assert!(verdict.available);
    }

    #[test]
    fn test_requested_section_must_be_open() {
        let target = WatchTarget::new("CSX05", "").with_section("A");
        let verdict = AvailabilityChecker::new()
            .check(&target, Some(&row("CSX05 open", &["Section A Full", "Section B"])));

        assert!(!verdict.available);
    }

    #[test]
    fn test_unfiltered_union_of_row_and_sections() {
        let checker = AvailabilityChecker::new();
        let target = WatchTarget::new("AI4013", "");

        let open_row = checker.check(&target, Some(&row("AI4013 Seats: 4", &[])));
        assert!(open_row.available);
        assert!(!open_row.is_full);

        let full_with_section =
            checker.check(&target, Some(&row("AI4013 No Seat Available", &["Section C"])));
        assert!(full_with_section.available);

        let full_everywhere = checker.check(
            &target,
            Some(&row("AI4013 No Seat Available", &["Section C Full"])),
        );
        assert!(!full_everywhere.available);
    }

    #[test]
    fn test_missing_row_is_error_verdict() {
        let target = WatchTarget::new("CSX05", "");
        let verdict = AvailabilityChecker::new().check(&target, None);

        assert_eq!(verdict.error.as_deref(), Some(COURSE_NOT_FOUND));
        assert!(!verdict.available);
        assert!(verdict.is_error());
    }

    #[test]
    fn test_non_section_labels_are_ignored() {
        let sections = parse_sections(&[
            "Register".to_string(),
            "  Section: D ".to_string(),
            "Section-E Full".to_string(),
        ]);

        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].name, "D");
        assert!(!sections[0].full);
        assert!(sections[1].full);
    }

    #[test]
    fn test_raw_detail_carries_row_text() {
        let target = WatchTarget::new("CSX05", "").with_section("B");
        let verdict = AvailabilityChecker::new()
            .check(&target, Some(&row("CSX05 Section Full", &["Section B"])));

        assert_eq!(verdict.raw_detail["row_text"], "CSX05 Section Full");
        assert_eq!(verdict.raw_detail["sections_available"][0], "B");
        assert_eq!(verdict.raw_detail["section"], "B");
    }
}
