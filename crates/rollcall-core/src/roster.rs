//! In-memory roster of classes and students for one session.
//!
//! Each refresh replaces a whole list or nothing: a response is parsed in
//! full before the cached list is swapped, so a failed refresh leaves the
//! previous data in place and readers never see a half-updated roster.

use crate::envelope::{self, field};
use crate::error::ClientError;
use crate::transport::{ApiRequest, Transport, TransportError};
use crate::types::{ClassRef, StudentRecord, UNKNOWN_CLASS};
use serde_json::Value;

#[derive(Debug, Clone, Default)]
pub struct RosterCache {
    classes: Vec<ClassRef>,
    students: Vec<StudentRecord>,
}

/// Parse a list-classes response without touching any cache.
pub fn parse_classes(response: Result<Value, TransportError>) -> Result<Vec<ClassRef>, ClientError> {
    let payload = envelope::interpret(response)?;
    field(&payload, "classes")
}

/// Parse a list-students response without touching any cache.
pub fn parse_students(
    response: Result<Value, TransportError>,
) -> Result<Vec<StudentRecord>, ClientError> {
    let payload = envelope::interpret(response)?;
    field(&payload, "students")
}

impl RosterCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn classes(&self) -> &[ClassRef] {
        &self.classes
    }

    pub fn students(&self) -> &[StudentRecord] {
        &self.students
    }

    pub fn has_classes(&self) -> bool {
        !self.classes.is_empty()
    }

    pub fn replace_classes(&mut self, classes: Vec<ClassRef>) {
        tracing::debug!(count = classes.len(), "roster: classes replaced");
        self.classes = classes;
    }

    pub fn replace_students(&mut self, students: Vec<StudentRecord>) {
        tracing::debug!(count = students.len(), "roster: students replaced");
        self.students = students;
    }

    /// Apply a list-classes response. On failure the cache is unchanged.
    pub fn apply_classes(
        &mut self,
        response: Result<Value, TransportError>,
    ) -> Result<&[ClassRef], ClientError> {
        let classes = parse_classes(response)?;
        self.replace_classes(classes);
        Ok(&self.classes)
    }

    /// Apply a list-students response. On failure the cache is unchanged.
    pub fn apply_students(
        &mut self,
        response: Result<Value, TransportError>,
    ) -> Result<&[StudentRecord], ClientError> {
        let students = parse_students(response)?;
        self.replace_students(students);
        Ok(&self.students)
    }

    /// Fetch and apply the class list in one step.
    ///
    /// Holds `&mut self` across the request; callers that must keep
    /// serving reads while a fetch is outstanding issue
    /// [`ApiRequest::ListClasses`] themselves and call [`apply_classes`](Self::apply_classes).
    pub async fn refresh_classes<T: Transport>(
        &mut self,
        transport: &T,
    ) -> Result<&[ClassRef], ClientError> {
        let response = transport.send(ApiRequest::ListClasses).await;
        self.apply_classes(response)
    }

    /// Fetch and apply the student list in one step.
    pub async fn refresh_students<T: Transport>(
        &mut self,
        transport: &T,
    ) -> Result<&[StudentRecord], ClientError> {
        let response = transport.send(ApiRequest::ListStudents).await;
        self.apply_students(response)
    }

    pub fn class(&self, class_id: &str) -> Option<&ClassRef> {
        self.classes.iter().find(|c| c.id == class_id)
    }

    /// Name of the class, or `"Unknown Class"`. Never fails.
    pub fn resolve_class_name(&self, class_id: &str) -> &str {
        self.class(class_id)
            .map(|c| c.name.as_str())
            .unwrap_or(UNKNOWN_CLASS)
    }

    pub fn resolve_student_name(&self, student_id: &str) -> Option<&str> {
        self.students
            .iter()
            .find(|s| s.student_id == student_id)
            .map(|s| s.name.as_str())
    }

    pub fn students_in_class<'a>(
        &'a self,
        class_id: &'a str,
    ) -> impl Iterator<Item = &'a StudentRecord> + 'a {
        self.students.iter().filter(move |s| s.class_id == class_id)
    }
}
