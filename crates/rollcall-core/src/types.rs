use serde::{Deserialize, Serialize};
use std::fmt;

/// Name shown for a class id that is not in the cached roster.
pub const UNKNOWN_CLASS: &str = "Unknown Class";
/// Name shown for a student id that is not in the cached roster.
pub const UNKNOWN_STUDENT: &str = "Unknown Student";

/// A class as listed by the service. Replaced wholesale on every refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassRef {
    pub id: String,
    pub name: String,
}

/// An enrolled student. `class_id` is not required to resolve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentRecord {
    pub student_id: String,
    pub name: String,
    pub class_id: String,
}

/// Monotonically increasing sequence token identifying the most recent
/// operation of one kind (capture attempt, class query, student query).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Token(u64);

impl Token {
    pub fn value(self) -> u64 {
        self.0
    }

    pub fn next(self) -> Self {
        Token(self.0 + 1)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Whether a completion changed visible state or was dropped as stale.
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Applied,
    /// Token no longer current (superseded, cancelled, or already resolved).
    Stale,
}

/// One face the service matched to an enrolled student.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognizedStudent {
    /// Present in the service's payload today, but not part of the
    /// minimal contract (`name` + `confidence`).
    #[serde(default)]
    pub student_id: Option<String>,
    pub name: String,
    /// Match confidence in [0, 1], exactly as the service reported it.
    pub confidence: f64,
}

/// Result of one photo submission. Never mutated after creation.
#[derive(Debug, Clone, PartialEq)]
pub struct RecognitionOutcome {
    /// In the service's order.
    pub recognized: Vec<RecognizedStudent>,
    pub unrecognized_count: usize,
    /// Class members the service marked present for this date.
    pub present_count: usize,
    pub absent_count: usize,
}

impl RecognitionOutcome {
    pub fn recognized_count(&self) -> usize {
        self.recognized.len()
    }

    /// Faces detected in the photo, matched or not.
    pub fn faces_total(&self) -> usize {
        self.recognized.len() + self.unrecognized_count
    }
}

/// A row of the class+date report as returned by the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub student_id: String,
    pub student_name: String,
    #[serde(rename = "status")]
    pub present: bool,
}

/// One class member's mark as recorded by a photo submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmittedMark {
    pub student_id: String,
    #[serde(rename = "status")]
    pub present: bool,
}

/// A row of the per-student report as returned by the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentAttendanceEntry {
    pub student_id: String,
    pub class_id: String,
    pub date: String,
    #[serde(rename = "status")]
    pub present: bool,
}

/// Two-state display mapping of the `present` flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttendanceMark {
    Present,
    Absent,
}

impl AttendanceMark {
    pub fn is_present(self) -> bool {
        matches!(self, AttendanceMark::Present)
    }

    pub fn label(self) -> &'static str {
        match self {
            AttendanceMark::Present => "Present",
            AttendanceMark::Absent => "Absent",
        }
    }
}

impl From<bool> for AttendanceMark {
    fn from(present: bool) -> Self {
        if present {
            AttendanceMark::Present
        } else {
            AttendanceMark::Absent
        }
    }
}

impl fmt::Display for AttendanceMark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_token_ordering() {
        let a = Token::default();
        let b = a.next();
        assert!(b > a);
        assert_eq!(b.value(), 1);
        assert_eq!(b.to_string(), "#1");
    }

    #[test]
    fn test_attendance_record_status_maps_to_present() {
        let rec: AttendanceRecord = serde_json::from_value(json!({
            "student_id": "S1",
            "student_name": "Ada",
            "status": true,
            "class_id": "C1",
            "date": "2024-03-01"
        }))
        .unwrap();
        assert!(rec.present);
        assert_eq!(rec.student_name, "Ada");
    }

    #[test]
    fn test_recognized_student_without_id() {
        let s: RecognizedStudent =
            serde_json::from_value(json!({"name": "A", "confidence": 0.92})).unwrap();
        assert_eq!(s.student_id, None);
        assert!((s.confidence - 0.92).abs() < 1e-12);
    }

    #[test]
    fn test_mark_from_bool() {
        assert_eq!(AttendanceMark::from(true), AttendanceMark::Present);
        assert_eq!(AttendanceMark::from(false).to_string(), "Absent");
        assert!(!AttendanceMark::Absent.is_present());
    }

    #[test]
    fn test_outcome_counts() {
        let outcome = RecognitionOutcome {
            recognized: vec![RecognizedStudent {
                student_id: Some("S1".into()),
                name: "Ada".into(),
                confidence: 0.8,
            }],
            unrecognized_count: 2,
            present_count: 1,
            absent_count: 4,
        };
        assert_eq!(outcome.recognized_count(), 1);
        assert_eq!(outcome.faces_total(), 3);
    }
}
