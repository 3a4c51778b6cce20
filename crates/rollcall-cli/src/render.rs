//! Plain-text rendering for the terminal.

use rollcall_core::{AttendanceMark, ClassRef, ClassReport, RecognitionOutcome, RosterCache, StudentReport};
use std::fmt::Write as _;

const NO_RECORDS: &str = "No attendance records found for this date.";

fn mark_label(mark: AttendanceMark) -> &'static str {
    match mark {
        AttendanceMark::Present => "✅ Present",
        AttendanceMark::Absent => "❌ Absent",
    }
}

pub fn outcome(outcome: &RecognitionOutcome) -> String {
    let mut out = String::from("Attendance Summary:\n\n");
    let _ = writeln!(
        out,
        "Present: {} | Absent: {}",
        outcome.present_count, outcome.absent_count
    );
    let _ = writeln!(out, "✅ Recognized Students: {}", outcome.recognized_count());
    for student in &outcome.recognized {
        let _ = writeln!(out, "  - {} (Confidence: {:.2})", student.name, student.confidence);
    }
    let _ = write!(out, "\n❓ Unrecognized Faces: {}", outcome.unrecognized_count);
    out
}

pub fn class_report(report: &ClassReport) -> String {
    if report.is_empty() {
        return NO_RECORDS.to_string();
    }
    let mut out = report.summary();
    for row in &report.tally.rows {
        let _ = write!(
            out,
            "\n{}  ID: {}  {}",
            row.student_name,
            row.student_id,
            mark_label(row.mark)
        );
    }
    out
}

pub fn student_report(report: &StudentReport) -> String {
    let mut out = report.summary();
    if let Some(rate) = report.attendance_rate() {
        let _ = write!(out, " | Rate: {:.0}%", rate * 100.0);
    }
    if report.is_empty() {
        out.push_str("\nNo attendance records found.");
        return out;
    }
    for row in &report.rows {
        let _ = write!(out, "\n{}  {}  {}", row.date, row.class_name, mark_label(row.mark));
    }
    out
}

pub fn classes(classes: &[ClassRef]) -> String {
    if classes.is_empty() {
        return "No classes found.".to_string();
    }
    classes
        .iter()
        .map(|c| format!("{}  ID: {}", c.name, c.id))
        .collect::<Vec<_>>()
        .join("\n")
}

/// One line per student with the class name resolved through the roster.
pub fn students(roster: &RosterCache) -> String {
    if roster.students().is_empty() {
        return "No students found.".to_string();
    }
    roster
        .students()
        .iter()
        .map(|s| {
            format!(
                "{}  ID: {} | Class: {}",
                s.name,
                s.student_id,
                roster.resolve_class_name(&s.class_id)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rollcall_core::reconcile::{reconcile_report, StudentReportRow};
    use rollcall_core::{AttendanceRecord, RecognizedStudent, StudentRecord};

    #[test]
    fn test_outcome_lists_confidence_to_two_places() {
        let text = outcome(&RecognitionOutcome {
            recognized: vec![RecognizedStudent {
                student_id: Some("S1".into()),
                name: "Ada".into(),
                confidence: 0.9166,
            }],
            unrecognized_count: 2,
            present_count: 1,
            absent_count: 2,
        });
        assert!(text.contains("Present: 1 | Absent: 2\n"));
        assert!(text.contains("Recognized Students: 1"));
        assert!(text.contains("  - Ada (Confidence: 0.92)"));
        assert!(text.ends_with("Unrecognized Faces: 2"));
    }

    #[test]
    fn test_class_report_rows_and_empty() {
        let tally = reconcile_report(&[
            AttendanceRecord {
                student_id: "S1".into(),
                student_name: "Ada".into(),
                present: true,
            },
            AttendanceRecord {
                student_id: "S2".into(),
                student_name: "Bo".into(),
                present: false,
            },
        ]);
        let report = ClassReport {
            class_id: "C1".into(),
            class_name: "Biology".into(),
            date: "2024-03-01".into(),
            tally,
        };
        let text = class_report(&report);
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines[0], "Class: Biology | Date: 2024-03-01 | Present: 1 | Absent: 1");
        assert_eq!(lines[1], "Ada  ID: S1  ✅ Present");
        assert_eq!(lines[2], "Bo  ID: S2  ❌ Absent");

        let empty = ClassReport {
            tally: Default::default(),
            ..report
        };
        assert_eq!(class_report(&empty), NO_RECORDS);
    }

    #[test]
    fn test_student_report_rate() {
        let report = StudentReport {
            student_id: "S1".into(),
            student_name: "Ada".into(),
            present_count: 3,
            absent_count: 1,
            rows: vec![StudentReportRow {
                date: "2024-03-01".into(),
                class_id: "C1".into(),
                class_name: "Biology".into(),
                mark: AttendanceMark::Present,
            }],
        };
        let text = student_report(&report);
        assert!(text.starts_with("Student: Ada (S1) | Present: 3 | Absent: 1 | Rate: 75%"));
        assert!(text.ends_with("2024-03-01  Biology  ✅ Present"));
    }

    #[test]
    fn test_students_resolve_class_names() {
        let mut roster = RosterCache::new();
        roster.replace_classes(vec![ClassRef {
            id: "C1".into(),
            name: "Biology".into(),
        }]);
        roster.replace_students(vec![
            StudentRecord {
                student_id: "S1".into(),
                name: "Ada".into(),
                class_id: "C1".into(),
            },
            StudentRecord {
                student_id: "S2".into(),
                name: "Bo".into(),
                class_id: "C9".into(),
            },
        ]);
        assert_eq!(
            students(&roster),
            "Ada  ID: S1 | Class: Biology\nBo  ID: S2 | Class: Unknown Class"
        );
        assert_eq!(students(&RosterCache::new()), "No students found.");
    }
}
