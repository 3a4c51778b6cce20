//! Capture session, the state machine for one attendance-taking interaction.
//!
//! ```text
//! Idle ──begin──▶ Capturing ──image──▶ Encoding ──▶ Submitting ──▶ Resolved
//!  ▲                 │                    │             │       └─▶ Failed
//!  └──────cancel─────┴────────────────────┴─────────────┘
//!  ▲                                                    Resolved/Failed
//!  └───────────────────────────reset───────────────────────────┘
//! ```
//!
//! Every `begin` advances the attempt token. A submission completion is
//! applied only while the session is still `Submitting` under the token it
//! was issued with; anything else is a stale result and is ignored.

use crate::encode::PhotoEncoder;
use crate::envelope;
use crate::error::ClientError;
use crate::reconcile::reconcile_submission;
use crate::transport::{ApiRequest, TakeAttendanceRequest, TransportError};
use crate::types::{Completion, RecognitionOutcome, Token};
use chrono::NaiveDate;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum CaptureState {
    Idle,
    Capturing {
        attempt: Token,
        class_id: String,
        date: String,
    },
    Encoding {
        attempt: Token,
    },
    Submitting {
        attempt: Token,
        class_id: String,
        date: String,
    },
    Resolved {
        attempt: Token,
        outcome: RecognitionOutcome,
    },
    Failed {
        attempt: Token,
        error: ClientError,
    },
}

impl CaptureState {
    pub fn name(&self) -> &'static str {
        match self {
            CaptureState::Idle => "idle",
            CaptureState::Capturing { .. } => "capturing",
            CaptureState::Encoding { .. } => "encoding",
            CaptureState::Submitting { .. } => "submitting",
            CaptureState::Resolved { .. } => "resolved",
            CaptureState::Failed { .. } => "failed",
        }
    }

    /// `Resolved` or `Failed`; left only through an explicit reset.
    pub fn is_terminal(&self) -> bool {
        matches!(self, CaptureState::Resolved { .. } | CaptureState::Failed { .. })
    }

    pub fn attempt(&self) -> Option<Token> {
        match self {
            CaptureState::Idle => None,
            CaptureState::Capturing { attempt, .. }
            | CaptureState::Encoding { attempt }
            | CaptureState::Submitting { attempt, .. }
            | CaptureState::Resolved { attempt, .. }
            | CaptureState::Failed { attempt, .. } => Some(*attempt),
        }
    }
}

/// Photo bytes plus where they are headed. Lives only until encoded.
#[derive(Debug)]
pub struct CapturedImage {
    pub bytes: Vec<u8>,
    pub class_id: String,
    pub date: String,
}

/// The request to issue for an attempt, tagged with its token.
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub attempt: Token,
    pub request: ApiRequest,
}

pub struct CaptureSession {
    encoder: PhotoEncoder,
    attempt: Token,
    state: CaptureState,
}

impl CaptureSession {
    pub fn new(encoder: PhotoEncoder) -> Self {
        Self {
            encoder,
            attempt: Token::default(),
            state: CaptureState::Idle,
        }
    }

    pub fn state(&self) -> &CaptureState {
        &self.state
    }

    /// Token of the most recent `begin`.
    pub fn current_attempt(&self) -> Token {
        self.attempt
    }

    pub fn in_flight(&self) -> bool {
        matches!(self.state, CaptureState::Submitting { .. })
    }

    /// Start an attempt for `class_id` on `date` (`YYYY-MM-DD`).
    ///
    /// Rejected unless `Idle`: a second capture while one is outstanding is
    /// refused, never queued.
    pub fn begin(&mut self, class_id: &str, date: &str) -> Result<Token, ClientError> {
        if !matches!(self.state, CaptureState::Idle) {
            return Err(ClientError::invalid_state("begin", self.state.name()));
        }
        let class_id = class_id.trim();
        if class_id.is_empty() {
            return Err(ClientError::InvalidArgument("class id is empty".into()));
        }
        validate_date(date)?;

        self.attempt = self.attempt.next();
        tracing::info!(attempt = %self.attempt, class_id, date, "capture: begin");
        self.state = CaptureState::Capturing {
            attempt: self.attempt,
            class_id: class_id.to_string(),
            date: date.to_string(),
        };
        Ok(self.attempt)
    }

    /// Accept the captured photo, encode it and produce the submission.
    ///
    /// On encoding failure the session moves to `Failed` and no request is
    /// produced.
    pub fn on_image_ready(&mut self, raw_image: Vec<u8>) -> Result<Submission, ClientError> {
        let attempt = self.attempt;
        let (class_id, date) =
            match std::mem::replace(&mut self.state, CaptureState::Encoding { attempt }) {
                CaptureState::Capturing { class_id, date, .. } => (class_id, date),
                other => {
                    let state = other.name();
                    self.state = other;
                    return Err(ClientError::invalid_state("image ready", state));
                }
            };
        let image = CapturedImage {
            bytes: raw_image,
            class_id,
            date,
        };
        tracing::debug!(%attempt, bytes = image.bytes.len(), "capture: encoding");

        let photo = match self.encoder.encode(&image.bytes) {
            Ok(photo) => photo,
            Err(error) => {
                tracing::warn!(%attempt, %error, "capture: encoding failed");
                self.state = CaptureState::Failed {
                    attempt,
                    error: error.clone(),
                };
                return Err(error);
            }
        };

        let CapturedImage { class_id, date, .. } = image;
        tracing::info!(%attempt, %class_id, photo_len = photo.len(), "capture: submitting");
        self.state = CaptureState::Submitting {
            attempt,
            class_id: class_id.clone(),
            date: date.clone(),
        };
        Ok(Submission {
            attempt,
            request: ApiRequest::TakeAttendance(TakeAttendanceRequest {
                class_id,
                date,
                photo,
            }),
        })
    }

    /// Apply the completion of the submission issued under `attempt`.
    pub fn complete(
        &mut self,
        attempt: Token,
        response: Result<Value, TransportError>,
    ) -> Completion {
        if attempt != self.attempt || !self.in_flight() {
            tracing::debug!(
                %attempt,
                current = %self.attempt,
                state = self.state.name(),
                "capture: dropping stale completion"
            );
            return Completion::Stale;
        }

        self.state = match envelope::interpret(response).and_then(|p| reconcile_submission(&p)) {
            Ok(outcome) => {
                tracing::info!(
                    %attempt,
                    recognized = outcome.recognized_count(),
                    unrecognized = outcome.unrecognized_count,
                    "capture: resolved"
                );
                CaptureState::Resolved { attempt, outcome }
            }
            Err(error) => {
                tracing::warn!(%attempt, kind = error.kind(), %error, "capture: failed");
                CaptureState::Failed { attempt, error }
            }
        };
        Completion::Applied
    }

    /// Abandon the current attempt. Any result still in flight for it will
    /// be recognised as stale when it arrives.
    pub fn cancel(&mut self) -> Result<(), ClientError> {
        if self.state.is_terminal() {
            return Err(ClientError::invalid_state("cancel", self.state.name()));
        }
        if !matches!(self.state, CaptureState::Idle) {
            tracing::info!(attempt = %self.attempt, from = self.state.name(), "capture: cancelled");
            self.state = CaptureState::Idle;
        }
        Ok(())
    }

    /// Dismiss a `Resolved` or `Failed` outcome and return to `Idle`.
    pub fn reset(&mut self) -> Result<(), ClientError> {
        if !self.state.is_terminal() {
            return Err(ClientError::invalid_state("reset", self.state.name()));
        }
        tracing::debug!(attempt = %self.attempt, from = self.state.name(), "capture: reset");
        self.state = CaptureState::Idle;
        Ok(())
    }
}

/// Accept only `YYYY-MM-DD` calendar dates.
pub fn validate_date(date: &str) -> Result<(), ClientError> {
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map(|_| ())
        .map_err(|e| ClientError::InvalidArgument(format!("date {date:?}: {e}")))
}
