//! Request contract for the remote attendance service.
//!
//! [`ApiRequest`] enumerates the endpoints the client consumes; the
//! [`Transport`] trait is the single seam through which they are issued.
//! Concrete transports live outside this crate; tests use fakes.

use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::future::Future;
use thiserror::Error;

/// Failure before the service could say `success: true` or `success: false`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("request timed out")]
    Timeout,
    /// Non-2xx status whose body is not a service error envelope.
    #[error("http status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("unreadable response body: {0}")]
    Decode(String),
    #[error("request failed: {0}")]
    Request(String),
}

/// Issues one request and yields the parsed JSON body.
///
/// Implementations must hand back `{success: false, error}` bodies as
/// values, even when they arrive with an error status, so the caller can
/// tell a rejected request from a broken connection.
pub trait Transport: Send + Sync + 'static {
    fn send(&self, request: ApiRequest)
        -> impl Future<Output = Result<Value, TransportError>> + Send;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Delete,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Delete => "DELETE",
        }
    }
}

/// Body of `POST api/students`.
#[derive(Clone, PartialEq, Serialize)]
pub struct NewStudent {
    pub name: String,
    pub student_id: String,
    pub class_id: String,
    /// Base64 JPEG.
    pub photo: String,
}

/// Body of `POST api/classes`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewClass {
    pub name: String,
}

/// Body of `POST api/take_attendance`.
#[derive(Clone, PartialEq, Serialize)]
pub struct TakeAttendanceRequest {
    pub class_id: String,
    /// `YYYY-MM-DD`.
    pub date: String,
    /// Base64 JPEG.
    pub photo: String,
}

/// Body of `POST api/manual_attendance`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ManualAttendanceRequest {
    pub student_id: String,
    pub class_id: String,
    pub date: String,
    pub status: bool,
}

// Photos are large; keep them out of logs.
impl fmt::Debug for NewStudent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewStudent")
            .field("name", &self.name)
            .field("student_id", &self.student_id)
            .field("class_id", &self.class_id)
            .field("photo_len", &self.photo.len())
            .finish()
    }
}

impl fmt::Debug for TakeAttendanceRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TakeAttendanceRequest")
            .field("class_id", &self.class_id)
            .field("date", &self.date)
            .field("photo_len", &self.photo.len())
            .finish()
    }
}

/// One call against the attendance service.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiRequest {
    ListStudents,
    AddStudent(NewStudent),
    DeleteStudent { student_id: String },
    ListClasses,
    AddClass(NewClass),
    TakeAttendance(TakeAttendanceRequest),
    ManualAttendance(ManualAttendanceRequest),
    ClassReport { class_id: String, date: String },
    StudentReport { student_id: String },
}

impl ApiRequest {
    /// Stable name for logs and test assertions.
    pub fn kind(&self) -> &'static str {
        match self {
            ApiRequest::ListStudents => "list_students",
            ApiRequest::AddStudent(_) => "add_student",
            ApiRequest::DeleteStudent { .. } => "delete_student",
            ApiRequest::ListClasses => "list_classes",
            ApiRequest::AddClass(_) => "add_class",
            ApiRequest::TakeAttendance(_) => "take_attendance",
            ApiRequest::ManualAttendance(_) => "manual_attendance",
            ApiRequest::ClassReport { .. } => "attendance_report",
            ApiRequest::StudentReport { .. } => "student_attendance_report",
        }
    }

    pub fn method(&self) -> HttpMethod {
        match self {
            ApiRequest::ListStudents
            | ApiRequest::ListClasses
            | ApiRequest::ClassReport { .. }
            | ApiRequest::StudentReport { .. } => HttpMethod::Get,
            ApiRequest::AddStudent(_)
            | ApiRequest::AddClass(_)
            | ApiRequest::TakeAttendance(_)
            | ApiRequest::ManualAttendance(_) => HttpMethod::Post,
            ApiRequest::DeleteStudent { .. } => HttpMethod::Delete,
        }
    }

    /// Unescaped path segments relative to the service base URL.
    pub fn path_segments(&self) -> Vec<&str> {
        match self {
            ApiRequest::ListStudents | ApiRequest::AddStudent(_) => vec!["api", "students"],
            ApiRequest::DeleteStudent { student_id } => vec!["api", "students", student_id.as_str()],
            ApiRequest::ListClasses | ApiRequest::AddClass(_) => vec!["api", "classes"],
            ApiRequest::TakeAttendance(_) => vec!["api", "take_attendance"],
            ApiRequest::ManualAttendance(_) => vec!["api", "manual_attendance"],
            ApiRequest::ClassReport { .. } => vec!["api", "attendance_report"],
            ApiRequest::StudentReport { .. } => vec!["api", "student_attendance_report"],
        }
    }

    /// Path for display, e.g. `api/students/S1`.
    pub fn path(&self) -> String {
        self.path_segments().join("/")
    }

    pub fn query(&self) -> Vec<(&'static str, &str)> {
        match self {
            ApiRequest::ClassReport { class_id, date } => {
                vec![("class_id", class_id.as_str()), ("date", date.as_str())]
            }
            ApiRequest::StudentReport { student_id } => vec![("student_id", student_id.as_str())],
            _ => Vec::new(),
        }
    }

    pub fn body(&self) -> Option<Value> {
        let body = match self {
            ApiRequest::AddStudent(b) => serde_json::to_value(b),
            ApiRequest::AddClass(b) => serde_json::to_value(b),
            ApiRequest::TakeAttendance(b) => serde_json::to_value(b),
            ApiRequest::ManualAttendance(b) => serde_json::to_value(b),
            _ => return None,
        };
        // Plain structs of strings and bools always serialize.
        body.ok()
    }
}
