//! The control thread.
//!
//! One OS thread owns the roster, the capture session and the report
//! coordinator and is the only place they change. Network calls run as
//! tasks on the tokio runtime and post their completions back into the
//! same channel as commands, tagged with the token they were issued under.
//! Observable state is published on `watch` channels.

use rollcall_core::capture::validate_date;
use rollcall_core::roster::{parse_classes, parse_students};
use rollcall_core::transport::{ManualAttendanceRequest, NewClass, NewStudent};
use rollcall_core::{
    envelope, ApiRequest, AttendanceMark, CaptureSession, CaptureState, ClassReport, ClassRef,
    ClientError, Completion, PhotoEncoder, ReportQueryCoordinator, ReportView, RosterCache,
    StudentRecord, StudentReport, Token, Transport, TransportError,
};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot, watch};

#[derive(Error, Debug)]
pub enum ControllerError {
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error("control thread exited")]
    ChannelClosed,
    #[error("cannot start control thread: {0}")]
    Spawn(String),
}

type Reply<T> = oneshot::Sender<Result<T, ClientError>>;
type Response = Result<Value, TransportError>;

/// Commands from handles, and completions from network tasks.
enum ControlMsg {
    RefreshClasses {
        reply: Reply<Vec<ClassRef>>,
    },
    RefreshStudents {
        reply: Reply<Vec<StudentRecord>>,
    },
    Roster {
        reply: oneshot::Sender<RosterCache>,
    },
    BeginCapture {
        class_id: String,
        date: String,
        reply: Reply<Token>,
    },
    ImageReady {
        bytes: Vec<u8>,
        reply: Reply<Token>,
    },
    CancelCapture {
        reply: Reply<()>,
    },
    ResetCapture {
        reply: Reply<()>,
    },
    QueryClass {
        class_id: String,
        date: String,
        reply: Reply<Token>,
    },
    QueryStudent {
        student_id: String,
        reply: Reply<Token>,
    },
    AddStudent {
        name: String,
        student_id: String,
        class_id: String,
        photo: Vec<u8>,
        reply: Reply<Value>,
    },
    Forward {
        request: ApiRequest,
        reply: Reply<Value>,
    },

    ClassesFetched {
        token: Token,
        response: Response,
    },
    StudentsFetched {
        token: Token,
        response: Response,
    },
    SubmissionDone {
        attempt: Token,
        response: Response,
    },
    ClassReportDone {
        token: Token,
        response: Response,
    },
    StudentReportDone {
        token: Token,
        response: Response,
    },
    Forwarded {
        response: Response,
        reply: Reply<Value>,
    },
}

/// Clone-safe handle to the control thread.
#[derive(Clone)]
pub struct ControllerHandle {
    tx: mpsc::Sender<ControlMsg>,
    capture: watch::Receiver<CaptureState>,
    class_view: watch::Receiver<ReportView<ClassReport>>,
    student_view: watch::Receiver<ReportView<StudentReport>>,
}

impl ControllerHandle {
    async fn request<R>(
        &self,
        make: impl FnOnce(oneshot::Sender<R>) -> ControlMsg,
    ) -> Result<R, ControllerError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(make(reply))
            .await
            .map_err(|_| ControllerError::ChannelClosed)?;
        rx.await.map_err(|_| ControllerError::ChannelClosed)
    }

    /// Fetch the class list. Resolves when this fetch completes; the cache
    /// is replaced only if no later refresh was issued meanwhile.
    pub async fn refresh_classes(&self) -> Result<Vec<ClassRef>, ControllerError> {
        Ok(self.request(|reply| ControlMsg::RefreshClasses { reply }).await??)
    }

    pub async fn refresh_students(&self) -> Result<Vec<StudentRecord>, ControllerError> {
        Ok(self.request(|reply| ControlMsg::RefreshStudents { reply }).await??)
    }

    /// Snapshot of the cached roster.
    pub async fn roster(&self) -> Result<RosterCache, ControllerError> {
        self.request(|reply| ControlMsg::Roster { reply }).await
    }

    pub async fn begin_capture(&self, class_id: &str, date: &str) -> Result<Token, ControllerError> {
        let (class_id, date) = (class_id.to_string(), date.to_string());
        Ok(self
            .request(|reply| ControlMsg::BeginCapture {
                class_id,
                date,
                reply,
            })
            .await??)
    }

    /// Hand over the captured photo. Returns the attempt now submitting.
    pub async fn image_ready(&self, bytes: Vec<u8>) -> Result<Token, ControllerError> {
        Ok(self
            .request(|reply| ControlMsg::ImageReady { bytes, reply })
            .await??)
    }

    pub async fn cancel_capture(&self) -> Result<(), ControllerError> {
        Ok(self.request(|reply| ControlMsg::CancelCapture { reply }).await??)
    }

    /// Cancel the capture unless it already settled. Returns the settled
    /// state when the result won the race, `None` when the attempt was dropped.
    pub async fn interrupt_capture(&self) -> Result<Option<CaptureState>, ControllerError> {
        match self.cancel_capture().await {
            Ok(()) => Ok(None),
            Err(ControllerError::Client(ClientError::InvalidState { .. })) => {
                Ok(Some(self.capture_state()))
            }
            Err(err) => Err(err),
        }
    }

    pub async fn reset_capture(&self) -> Result<(), ControllerError> {
        Ok(self.request(|reply| ControlMsg::ResetCapture { reply }).await??)
    }

    pub fn capture_state(&self) -> CaptureState {
        self.capture.borrow().clone()
    }

    /// Wait until `attempt` has left the capture session: resolved, failed,
    /// cancelled or replaced by a newer attempt.
    pub async fn wait_for_capture(&self, attempt: Token) -> Result<CaptureState, ControllerError> {
        let mut rx = self.capture.clone();
        let state = rx
            .wait_for(|s| s.attempt() != Some(attempt) || s.is_terminal())
            .await
            .map_err(|_| ControllerError::ChannelClosed)?;
        Ok(state.clone())
    }

    pub async fn query_class(&self, class_id: &str, date: &str) -> Result<Token, ControllerError> {
        let (class_id, date) = (class_id.to_string(), date.to_string());
        Ok(self
            .request(|reply| ControlMsg::QueryClass {
                class_id,
                date,
                reply,
            })
            .await??)
    }

    pub async fn query_student(&self, student_id: &str) -> Result<Token, ControllerError> {
        let student_id = student_id.to_string();
        Ok(self
            .request(|reply| ControlMsg::QueryStudent { student_id, reply })
            .await??)
    }

    /// Wait until the class query `token` settles or is superseded.
    pub async fn wait_class_report(
        &self,
        token: Token,
    ) -> Result<ReportView<ClassReport>, ControllerError> {
        let mut rx = self.class_view.clone();
        let view = rx
            .wait_for(|v| v.token() != Some(token) || v.is_settled())
            .await
            .map_err(|_| ControllerError::ChannelClosed)?;
        Ok(view.clone())
    }

    pub async fn wait_student_report(
        &self,
        token: Token,
    ) -> Result<ReportView<StudentReport>, ControllerError> {
        let mut rx = self.student_view.clone();
        let view = rx
            .wait_for(|v| v.token() != Some(token) || v.is_settled())
            .await
            .map_err(|_| ControllerError::ChannelClosed)?;
        Ok(view.clone())
    }

    pub async fn add_class(&self, name: &str) -> Result<Value, ControllerError> {
        let request = ApiRequest::AddClass(NewClass {
            name: name.to_string(),
        });
        Ok(self
            .request(|reply| ControlMsg::Forward { request, reply })
            .await??)
    }

    /// Enrol a student. `photo` is encoded the same way as a capture.
    pub async fn add_student(
        &self,
        name: &str,
        student_id: &str,
        class_id: &str,
        photo: Vec<u8>,
    ) -> Result<Value, ControllerError> {
        let (name, student_id, class_id) =
            (name.to_string(), student_id.to_string(), class_id.to_string());
        Ok(self
            .request(|reply| ControlMsg::AddStudent {
                name,
                student_id,
                class_id,
                photo,
                reply,
            })
            .await??)
    }

    pub async fn delete_student(&self, student_id: &str) -> Result<Value, ControllerError> {
        let request = ApiRequest::DeleteStudent {
            student_id: student_id.to_string(),
        };
        Ok(self
            .request(|reply| ControlMsg::Forward { request, reply })
            .await??)
    }

    /// Record one student's attendance directly. The acknowledgement is
    /// returned as-is; nothing cached changes.
    pub async fn mark_attendance(
        &self,
        student_id: &str,
        class_id: &str,
        date: &str,
        mark: AttendanceMark,
    ) -> Result<Value, ControllerError> {
        let request = ApiRequest::ManualAttendance(ManualAttendanceRequest {
            student_id: student_id.to_string(),
            class_id: class_id.to_string(),
            date: date.to_string(),
            status: mark.is_present(),
        });
        Ok(self
            .request(|reply| ControlMsg::Forward { request, reply })
            .await??)
    }
}

struct Controller<T> {
    transport: Arc<T>,
    runtime: Handle,
    tx: mpsc::WeakSender<ControlMsg>,
    encoder: PhotoEncoder,
    roster: RosterCache,
    capture: CaptureSession,
    reports: ReportQueryCoordinator,
    classes_refresh: Token,
    students_refresh: Token,
    pending_classes: Vec<(Token, Reply<Vec<ClassRef>>)>,
    pending_students: Vec<(Token, Reply<Vec<StudentRecord>>)>,
    capture_tx: watch::Sender<CaptureState>,
    class_view_tx: watch::Sender<ReportView<ClassReport>>,
    student_view_tx: watch::Sender<ReportView<StudentReport>>,
}

/// Spawn the control thread. Must be called from within a tokio runtime;
/// network tasks are spawned onto it.
pub fn spawn_controller<T: Transport>(
    transport: T,
    encoder: PhotoEncoder,
) -> Result<ControllerHandle, ControllerError> {
    let runtime = Handle::try_current().map_err(|e| ControllerError::Spawn(e.to_string()))?;

    let (tx, mut rx) = mpsc::channel::<ControlMsg>(32);
    let (capture_tx, capture) = watch::channel(CaptureState::Idle);
    let (class_view_tx, class_view) = watch::channel(ReportView::Idle);
    let (student_view_tx, student_view) = watch::channel(ReportView::Idle);

    let mut controller = Controller {
        transport: Arc::new(transport),
        runtime,
        tx: tx.downgrade(),
        encoder,
        roster: RosterCache::new(),
        capture: CaptureSession::new(encoder),
        reports: ReportQueryCoordinator::new(),
        classes_refresh: Token::default(),
        students_refresh: Token::default(),
        pending_classes: Vec::new(),
        pending_students: Vec::new(),
        capture_tx,
        class_view_tx,
        student_view_tx,
    };

    std::thread::Builder::new()
        .name("rollcall-control".into())
        .spawn(move || {
            tracing::info!("control thread started");
            while let Some(msg) = rx.blocking_recv() {
                controller.handle(msg);
            }
            tracing::info!("control thread exiting");
        })
        .map_err(|e| ControllerError::Spawn(e.to_string()))?;

    Ok(ControllerHandle {
        tx,
        capture,
        class_view,
        student_view,
    })
}

impl<T: Transport> Controller<T> {
    fn handle(&mut self, msg: ControlMsg) {
        match msg {
            ControlMsg::RefreshClasses { reply } => {
                self.classes_refresh = self.classes_refresh.next();
                let token = self.classes_refresh;
                self.pending_classes.push((token, reply));
                self.dispatch(ApiRequest::ListClasses, move |response| {
                    ControlMsg::ClassesFetched { token, response }
                });
            }
            ControlMsg::RefreshStudents { reply } => {
                self.students_refresh = self.students_refresh.next();
                let token = self.students_refresh;
                self.pending_students.push((token, reply));
                self.dispatch(ApiRequest::ListStudents, move |response| {
                    ControlMsg::StudentsFetched { token, response }
                });
            }
            ControlMsg::Roster { reply } => {
                let _ = reply.send(self.roster.clone());
            }
            ControlMsg::BeginCapture {
                class_id,
                date,
                reply,
            } => {
                let result = if self.roster.has_classes() {
                    self.capture.begin(&class_id, &date)
                } else {
                    Err(ClientError::InvalidArgument("no classes available".into()))
                };
                self.publish_capture();
                let _ = reply.send(result);
            }
            ControlMsg::ImageReady { bytes, reply } => {
                let result = self.capture.on_image_ready(bytes).map(|submission| {
                    let attempt = submission.attempt;
                    self.dispatch(submission.request, move |response| {
                        ControlMsg::SubmissionDone { attempt, response }
                    });
                    attempt
                });
                self.publish_capture();
                let _ = reply.send(result);
            }
            ControlMsg::CancelCapture { reply } => {
                let result = self.capture.cancel();
                self.publish_capture();
                let _ = reply.send(result);
            }
            ControlMsg::ResetCapture { reply } => {
                let result = self.capture.reset();
                self.publish_capture();
                let _ = reply.send(result);
            }
            ControlMsg::QueryClass {
                class_id,
                date,
                reply,
            } => {
                let result = self.reports.query_by_class_and_date(&class_id, &date).map(|q| {
                    let token = q.token;
                    self.dispatch(q.request, move |response| ControlMsg::ClassReportDone {
                        token,
                        response,
                    });
                    token
                });
                self.class_view_tx.send_replace(self.reports.class_view().clone());
                let _ = reply.send(result);
            }
            ControlMsg::QueryStudent { student_id, reply } => {
                let result = self.reports.query_by_student(&student_id).map(|q| {
                    let token = q.token;
                    self.dispatch(q.request, move |response| ControlMsg::StudentReportDone {
                        token,
                        response,
                    });
                    token
                });
                self.student_view_tx.send_replace(self.reports.student_view().clone());
                let _ = reply.send(result);
            }
            ControlMsg::AddStudent {
                name,
                student_id,
                class_id,
                photo,
                reply,
            } => match self.encoder.encode(&photo) {
                Ok(photo) => {
                    let request = ApiRequest::AddStudent(NewStudent {
                        name,
                        student_id,
                        class_id,
                        photo,
                    });
                    self.dispatch(request, move |response| ControlMsg::Forwarded { response, reply });
                }
                Err(error) => {
                    let _ = reply.send(Err(error));
                }
            },
            ControlMsg::Forward { request, reply } => {
                if let ApiRequest::ManualAttendance(req) = &request {
                    if let Err(error) = validate_date(&req.date) {
                        let _ = reply.send(Err(error));
                        return;
                    }
                }
                self.dispatch(request, move |response| ControlMsg::Forwarded { response, reply });
            }

            ControlMsg::ClassesFetched { token, response } => {
                let result = parse_classes(response);
                if token == self.classes_refresh {
                    if let Ok(classes) = &result {
                        self.roster.replace_classes(classes.clone());
                    }
                } else {
                    tracing::debug!(%token, latest = %self.classes_refresh, "roster: superseded class list not applied");
                }
                if let Err(error) = &result {
                    tracing::warn!(%token, %error, "roster: class refresh failed");
                }
                settle_pending(&mut self.pending_classes, token, result);
            }
            ControlMsg::StudentsFetched { token, response } => {
                let result = parse_students(response);
                if token == self.students_refresh {
                    if let Ok(students) = &result {
                        self.roster.replace_students(students.clone());
                    }
                } else {
                    tracing::debug!(%token, latest = %self.students_refresh, "roster: superseded student list not applied");
                }
                if let Err(error) = &result {
                    tracing::warn!(%token, %error, "roster: student refresh failed");
                }
                settle_pending(&mut self.pending_students, token, result);
            }
            ControlMsg::SubmissionDone { attempt, response } => {
                if self.capture.complete(attempt, response) == Completion::Applied {
                    self.publish_capture();
                }
            }
            ControlMsg::ClassReportDone { token, response } => {
                if self.reports.complete_class_query(token, response, &self.roster)
                    == Completion::Applied
                {
                    self.class_view_tx.send_replace(self.reports.class_view().clone());
                }
            }
            ControlMsg::StudentReportDone { token, response } => {
                if self.reports.complete_student_query(token, response, &self.roster)
                    == Completion::Applied
                {
                    self.student_view_tx.send_replace(self.reports.student_view().clone());
                }
            }
            ControlMsg::Forwarded { response, reply } => {
                let _ = reply.send(envelope::interpret(response));
            }
        }
    }

    /// Run `request` on the runtime and post `done(response)` back here.
    fn dispatch(
        &self,
        request: ApiRequest,
        done: impl FnOnce(Response) -> ControlMsg + Send + 'static,
    ) {
        let Some(tx) = self.tx.upgrade() else {
            tracing::debug!(kind = request.kind(), "no handles left; request not sent");
            return;
        };
        let transport = Arc::clone(&self.transport);
        self.runtime.spawn(async move {
            let response = transport.send(request).await;
            let _ = tx.send(done(response)).await;
        });
    }

    fn publish_capture(&self) {
        self.capture_tx.send_if_modified(|published| {
            let current = self.capture.state();
            if published == current {
                false
            } else {
                *published = current.clone();
                true
            }
        });
    }
}

/// Answer every waiter of `token` with its own fetch's outcome.
fn settle_pending<V: Clone>(
    pending: &mut Vec<(Token, Reply<V>)>,
    token: Token,
    result: Result<V, ClientError>,
) {
    let (ready, waiting): (Vec<_>, Vec<_>) = pending.drain(..).partition(|(t, _)| *t == token);
    *pending = waiting;
    for (_, reply) in ready {
        let _ = reply.send(result.clone());
    }
}
