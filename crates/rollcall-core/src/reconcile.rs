//! Reconciliation of service payloads into outcomes and report summaries.
//!
//! All functions take a success payload (an already opened envelope, see
//! [`crate::envelope::open`]) and never fail on empty input; they fail
//! with [`ClientError::MalformedResponse`] only when required fields are
//! missing or have the wrong shape.

use crate::envelope::field;
use crate::error::ClientError;
use crate::roster::RosterCache;
use crate::types::{
    AttendanceMark, AttendanceRecord, RecognitionOutcome, RecognizedStudent,
    StudentAttendanceEntry, SubmittedMark, UNKNOWN_STUDENT,
};
use serde_json::Value;

/// Extract recognized students, the unrecognized-face count and the
/// class's present/absent tally from a take-attendance payload.
///
/// Ordering and confidence values are the service's own; only the
/// *number* of unrecognized faces is kept. A payload without an
/// `attendance` list tallies zero present and zero absent.
pub fn reconcile_submission(payload: &Value) -> Result<RecognitionOutcome, ClientError> {
    let recognized: Vec<RecognizedStudent> = field(payload, "recognized_students")?;
    let unrecognized: Vec<Value> = field(payload, "unrecognized_faces")?;
    let marks: Vec<SubmittedMark> = match payload.get("attendance") {
        None | Some(Value::Null) => Vec::new(),
        Some(_) => field(payload, "attendance")?,
    };
    let (present_count, absent_count) = count_marks(marks.iter().map(|m| m.present));

    if let Some(bad) = recognized
        .iter()
        .find(|s| !(0.0..=1.0).contains(&s.confidence))
    {
        return Err(ClientError::MalformedResponse(format!(
            "confidence {} for {} outside [0, 1]",
            bad.confidence, bad.name
        )));
    }

    Ok(RecognitionOutcome {
        recognized,
        unrecognized_count: unrecognized.len(),
        present_count,
        absent_count,
    })
}

/// `(present, absent)` over a sequence of present flags.
pub fn count_marks(flags: impl IntoIterator<Item = bool>) -> (usize, usize) {
    flags
        .into_iter()
        .fold((0, 0), |(p, a), present| if present { (p + 1, a) } else { (p, a + 1) })
}

/// One line of a class report, ready for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayRow {
    pub student_id: String,
    pub student_name: String,
    pub mark: AttendanceMark,
}

/// Present/absent counts plus rows in service order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportTally {
    pub present_count: usize,
    pub absent_count: usize,
    pub rows: Vec<DisplayRow>,
}

impl ReportTally {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Count present/absent and map each record to a display row.
pub fn reconcile_report(records: &[AttendanceRecord]) -> ReportTally {
    let (present_count, absent_count) = count_marks(records.iter().map(|r| r.present));
    ReportTally {
        present_count,
        absent_count,
        rows: records
            .iter()
            .map(|record| DisplayRow {
                student_id: record.student_id.clone(),
                student_name: record.student_name.clone(),
                mark: record.present.into(),
            })
            .collect(),
    }
}

pub fn summary_line(class_name: &str, date: &str, present: usize, absent: usize) -> String {
    format!("Class: {class_name} | Date: {date} | Present: {present} | Absent: {absent}")
}

/// Reconciled class+date report, attributed to the query that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassReport {
    pub class_id: String,
    pub class_name: String,
    pub date: String,
    pub tally: ReportTally,
}

impl ClassReport {
    /// Callers render a "no records" state instead of a zero summary.
    pub fn is_empty(&self) -> bool {
        self.tally.is_empty()
    }

    pub fn summary(&self) -> String {
        summary_line(
            &self.class_name,
            &self.date,
            self.tally.present_count,
            self.tally.absent_count,
        )
    }
}

pub fn reconcile_class_report(
    payload: &Value,
    class_id: &str,
    date: &str,
    roster: &RosterCache,
) -> Result<ClassReport, ClientError> {
    let records: Vec<AttendanceRecord> = field(payload, "attendance_records")?;
    Ok(ClassReport {
        class_id: class_id.to_string(),
        class_name: roster.resolve_class_name(class_id).to_string(),
        date: date.to_string(),
        tally: reconcile_report(&records),
    })
}

/// One dated entry of a student's history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudentReportRow {
    pub date: String,
    pub class_id: String,
    pub class_name: String,
    pub mark: AttendanceMark,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudentReport {
    pub student_id: String,
    pub student_name: String,
    pub present_count: usize,
    pub absent_count: usize,
    pub rows: Vec<StudentReportRow>,
}

impl StudentReport {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Present / total, or `None` with no records.
    pub fn attendance_rate(&self) -> Option<f64> {
        let total = self.present_count + self.absent_count;
        (total > 0).then(|| self.present_count as f64 / total as f64)
    }

    pub fn summary(&self) -> String {
        format!(
            "Student: {} ({}) | Present: {} | Absent: {}",
            self.student_name, self.student_id, self.present_count, self.absent_count
        )
    }
}

pub fn reconcile_student_report(
    payload: &Value,
    student_id: &str,
    roster: &RosterCache,
) -> Result<StudentReport, ClientError> {
    let entries: Vec<StudentAttendanceEntry> = field(payload, "attendance_records")?;
    let (present_count, absent_count) = count_marks(entries.iter().map(|e| e.present));

    let mut report = StudentReport {
        student_id: student_id.to_string(),
        student_name: roster
            .resolve_student_name(student_id)
            .unwrap_or(UNKNOWN_STUDENT)
            .to_string(),
        present_count,
        absent_count,
        rows: Vec::with_capacity(entries.len()),
    };

    for entry in entries {
        report.rows.push(StudentReportRow {
            class_name: roster.resolve_class_name(&entry.class_id).to_string(),
            class_id: entry.class_id,
            date: entry.date,
            mark: entry.present.into(),
        });
    }
    Ok(report)
}
