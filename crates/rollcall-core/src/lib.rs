//! rollcall-core — Attendance capture and reconciliation workflow.
//!
//! Drives one attendance-taking interaction from captured photo to
//! recognition outcome, caches the class/student roster, and turns the
//! attendance service's report payloads into display-ready summaries.
//! Nothing in this crate touches the network: every request goes through
//! the [`Transport`] seam and every completion is applied through a
//! sequence [`Token`] so stale results can be recognised and dropped.

pub mod capture;
pub mod encode;
pub mod envelope;
pub mod error;
pub mod reconcile;
pub mod report;
pub mod roster;
pub mod transport;
pub mod types;

pub use capture::{CaptureSession, CaptureState, Submission};
pub use encode::PhotoEncoder;
pub use error::ClientError;
pub use reconcile::{ClassReport, ReportTally, StudentReport};
pub use report::{PendingQuery, ReportQueryCoordinator, ReportView};
pub use roster::RosterCache;
pub use transport::{ApiRequest, Transport, TransportError};
pub use types::{
    AttendanceMark, AttendanceRecord, ClassRef, Completion, RecognitionOutcome,
    RecognizedStudent, StudentRecord, SubmittedMark, Token,
};
