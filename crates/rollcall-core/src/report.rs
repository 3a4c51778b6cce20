//! Report queries with supersession.
//!
//! Class+date queries and student queries each run on their own lane with
//! an independent token sequence. Issuing a query makes it the only one
//! whose completion may change that lane's view; completions of earlier
//! queries are dropped whatever order they arrive in.

use crate::capture::validate_date;
use crate::envelope;
use crate::error::ClientError;
use crate::reconcile::{reconcile_class_report, reconcile_student_report, ClassReport, StudentReport};
use crate::roster::RosterCache;
use crate::transport::{ApiRequest, TransportError};
use crate::types::{Completion, Token};
use serde_json::Value;

/// What a report screen should currently show.
#[derive(Debug, Clone, PartialEq)]
pub enum ReportView<R> {
    Idle,
    Loading { token: Token },
    Ready { token: Token, report: R },
    Failed { token: Token, error: ClientError },
}

impl<R> ReportView<R> {
    pub fn token(&self) -> Option<Token> {
        match self {
            ReportView::Idle => None,
            ReportView::Loading { token }
            | ReportView::Ready { token, .. }
            | ReportView::Failed { token, .. } => Some(*token),
        }
    }

    /// `Ready` or `Failed`.
    pub fn is_settled(&self) -> bool {
        matches!(self, ReportView::Ready { .. } | ReportView::Failed { .. })
    }
}

impl<R> Default for ReportView<R> {
    fn default() -> Self {
        ReportView::Idle
    }
}

/// A query to issue, tagged with its lane token.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingQuery {
    pub token: Token,
    pub request: ApiRequest,
}

#[derive(Debug, Clone)]
struct ClassQuery {
    class_id: String,
    date: String,
}

/// Latest token, the parameters it was issued with, and the view.
#[derive(Debug)]
struct Lane<P, R> {
    latest: Token,
    params: Option<P>,
    view: ReportView<R>,
}

impl<P, R> Default for Lane<P, R> {
    fn default() -> Self {
        Self {
            latest: Token::default(),
            params: None,
            view: ReportView::Idle,
        }
    }
}

impl<P, R> Lane<P, R> {
    fn issue(&mut self, params: P) -> Token {
        self.latest = self.latest.next();
        self.params = Some(params);
        self.view = ReportView::Loading { token: self.latest };
        self.latest
    }

    /// Parameters of `token` if it is still the live query.
    fn live(&self, token: Token) -> Option<&P> {
        let loading = matches!(self.view, ReportView::Loading { token: t } if t == token);
        if token == self.latest && loading {
            self.params.as_ref()
        } else {
            None
        }
    }

    fn settle(&mut self, token: Token, result: Result<R, ClientError>) {
        self.view = match result {
            Ok(report) => ReportView::Ready { token, report },
            Err(error) => ReportView::Failed { token, error },
        };
    }
}

#[derive(Debug, Default)]
pub struct ReportQueryCoordinator {
    class_lane: Lane<ClassQuery, ClassReport>,
    student_lane: Lane<String, StudentReport>,
}

impl ReportQueryCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn class_view(&self) -> &ReportView<ClassReport> {
        &self.class_lane.view
    }

    pub fn student_view(&self) -> &ReportView<StudentReport> {
        &self.student_lane.view
    }

    pub fn latest_class_query(&self) -> Token {
        self.class_lane.latest
    }

    pub fn latest_student_query(&self) -> Token {
        self.student_lane.latest
    }

    /// Issue a class+date query, superseding any outstanding one.
    pub fn query_by_class_and_date(
        &mut self,
        class_id: &str,
        date: &str,
    ) -> Result<PendingQuery, ClientError> {
        let class_id = class_id.trim();
        if class_id.is_empty() {
            return Err(ClientError::InvalidArgument("class id is empty".into()));
        }
        validate_date(date)?;

        let token = self.class_lane.issue(ClassQuery {
            class_id: class_id.to_string(),
            date: date.to_string(),
        });
        tracing::debug!(%token, class_id, date, "report: class query issued");
        Ok(PendingQuery {
            token,
            request: ApiRequest::ClassReport {
                class_id: class_id.to_string(),
                date: date.to_string(),
            },
        })
    }

    /// Issue a student query, superseding any outstanding one.
    pub fn query_by_student(&mut self, student_id: &str) -> Result<PendingQuery, ClientError> {
        let student_id = student_id.trim();
        if student_id.is_empty() {
            return Err(ClientError::InvalidArgument("student id is empty".into()));
        }

        let token = self.student_lane.issue(student_id.to_string());
        tracing::debug!(%token, student_id, "report: student query issued");
        Ok(PendingQuery {
            token,
            request: ApiRequest::StudentReport {
                student_id: student_id.to_string(),
            },
        })
    }

    pub fn complete_class_query(
        &mut self,
        token: Token,
        response: Result<Value, TransportError>,
        roster: &RosterCache,
    ) -> Completion {
        let Some(query) = self.class_lane.live(token) else {
            tracing::debug!(%token, latest = %self.class_lane.latest, "report: superseded class result dropped");
            return Completion::Stale;
        };

        let result = envelope::interpret(response)
            .and_then(|p| reconcile_class_report(&p, &query.class_id, &query.date, roster));
        log_settled("class", token, &result);
        self.class_lane.settle(token, result);
        Completion::Applied
    }

    pub fn complete_student_query(
        &mut self,
        token: Token,
        response: Result<Value, TransportError>,
        roster: &RosterCache,
    ) -> Completion {
        let Some(student_id) = self.student_lane.live(token) else {
            tracing::debug!(%token, latest = %self.student_lane.latest, "report: superseded student result dropped");
            return Completion::Stale;
        };

        let result = envelope::interpret(response)
            .and_then(|p| reconcile_student_report(&p, student_id, roster));
        log_settled("student", token, &result);
        self.student_lane.settle(token, result);
        Completion::Applied
    }
}

fn log_settled<R>(lane: &'static str, token: Token, result: &Result<R, ClientError>) {
    match result {
        Ok(_) => tracing::info!(lane, %token, "report: ready"),
        Err(error) => tracing::warn!(lane, %token, kind = error.kind(), %error, "report: failed"),
    }
}
