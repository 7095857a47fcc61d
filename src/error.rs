use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;
use validator::ValidationErrors;

use crate::{
    dao::quiz_store::QuizStoreError,
    state::{registry::RegistryError, session::SessionError, webhooks::SubscriptionError},
};

/// Errors that can occur in service layer operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Operation not allowed in the current phase.
    #[error("invalid state: {0}")]
    InvalidState(String),
    /// Session, player, quiz or subscription absent.
    #[error("not found: {0}")]
    NotFound(String),
    /// Malformed PIN rejected before lookup.
    #[error("invalid pin: {0}")]
    InvalidPin(String),
    /// Player already joined the session.
    #[error("duplicate player: {0}")]
    DuplicatePlayer(String),
    /// Player already answered the open question.
    #[error("already answered: {0}")]
    AlreadyAnswered(String),
    /// Submitted option does not exist.
    #[error("invalid answer index: {0}")]
    InvalidIndex(String),
    /// Submission arrived after the answering window.
    #[error("too late: {0}")]
    TooLate(String),
    /// Start requested with nobody in the lobby.
    #[error("cannot start a session without players")]
    EmptyRoom,
    /// No free PIN could be drawn.
    #[error("no free pin after {0} attempts")]
    PinExhausted(usize),
    /// The quiz cannot be played.
    #[error("quiz not playable: {0}")]
    NotPlayable(String),
    /// Caller is not allowed to perform a host-only operation.
    #[error("forbidden: {0}")]
    Forbidden(String),
    /// The correct answer was requested while the question is open.
    #[error("the correct answer is hidden while the question is open")]
    AnswerHidden,
    /// Caller identity missing.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// Invalid input provided by the client.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Unexpected failure.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    /// Stable machine-readable kind.
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::InvalidState(_) => "INVALID_STATE",
            ServiceError::NotFound(_) => "NOT_FOUND",
            ServiceError::InvalidPin(_) => "INVALID_PIN",
            ServiceError::DuplicatePlayer(_) => "DUPLICATE_PLAYER",
            ServiceError::AlreadyAnswered(_) => "ALREADY_ANSWERED",
            ServiceError::InvalidIndex(_) => "INVALID_INDEX",
            ServiceError::TooLate(_) => "TOO_LATE",
            ServiceError::EmptyRoom => "EMPTY_ROOM",
            ServiceError::PinExhausted(_) => "PIN_EXHAUSTED",
            ServiceError::NotPlayable(_) => "NOT_PLAYABLE",
            ServiceError::Forbidden(_) => "FORBIDDEN",
            ServiceError::AnswerHidden => "ANSWER_HIDDEN",
            ServiceError::Unauthorized(_) => "UNAUTHORIZED",
            ServiceError::InvalidInput(_) => "INVALID_INPUT",
            ServiceError::Internal(_) => "INTERNAL",
        }
    }
}

impl From<SessionError> for ServiceError {
    fn from(err: SessionError) -> Self {
        let message = err.to_string();
        match err {
            SessionError::InvalidState { .. } => ServiceError::InvalidState(message),
            SessionError::NotFound(_) => ServiceError::NotFound(message),
            SessionError::DuplicatePlayer(_) => ServiceError::DuplicatePlayer(message),
            SessionError::AlreadyAnswered(_) => ServiceError::AlreadyAnswered(message),
            SessionError::InvalidIndex { .. } => ServiceError::InvalidIndex(message),
            SessionError::TooLate { .. } => ServiceError::TooLate(message),
            SessionError::EmptyRoom => ServiceError::EmptyRoom,
            SessionError::AnswerHidden => ServiceError::AnswerHidden,
        }
    }
}

impl From<RegistryError> for ServiceError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::InvalidPin(pin) => ServiceError::InvalidPin(pin),
            RegistryError::NotFound(_) => ServiceError::NotFound(err.to_string()),
            RegistryError::PinExhausted(attempts) => ServiceError::PinExhausted(attempts),
            RegistryError::Session(inner) => inner.into(),
        }
    }
}

impl From<SubscriptionError> for ServiceError {
    fn from(err: SubscriptionError) -> Self {
        match err {
            SubscriptionError::NotFound(_) => ServiceError::NotFound(err.to_string()),
        }
    }
}

impl From<QuizStoreError> for ServiceError {
    fn from(err: QuizStoreError) -> Self {
        match err {
            QuizStoreError::NotFound(_) => ServiceError::NotFound(err.to_string()),
            QuizStoreError::NotPlayable(reason) => ServiceError::NotPlayable(reason),
            QuizStoreError::Catalog { .. } => ServiceError::Internal(err.to_string()),
        }
    }
}

impl From<ValidationErrors> for AppError {
    fn from(err: ValidationErrors) -> Self {
        AppError::BadRequest {
            code: "VALIDATION_FAILED",
            message: format!("validation failed: {}", err),
        }
    }
}

/// Application-level errors that are converted to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad request with invalid input.
    #[error("bad request: {message}")]
    BadRequest { code: &'static str, message: String },
    /// Caller identity missing.
    #[error("unauthorized: {message}")]
    Unauthorized { code: &'static str, message: String },
    /// Caller not allowed.
    #[error("forbidden: {message}")]
    Forbidden { code: &'static str, message: String },
    /// Requested resource not found.
    #[error("not found: {message}")]
    NotFound { code: &'static str, message: String },
    /// Conflict with current state.
    #[error("conflict: {message}")]
    Conflict { code: &'static str, message: String },
    /// Well-formed request the domain refuses.
    #[error("unprocessable: {message}")]
    Unprocessable { code: &'static str, message: String },
    /// Service unavailable.
    #[error("service unavailable: {message}")]
    ServiceUnavailable { code: &'static str, message: String },
    /// Internal server error.
    #[error("internal error: {message}")]
    Internal { code: &'static str, message: String },
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        let code = err.code();
        let message = err.to_string();
        match err {
            ServiceError::InvalidPin(_)
            | ServiceError::InvalidIndex(_)
            | ServiceError::InvalidInput(_) => AppError::BadRequest { code, message },
            ServiceError::Unauthorized(_) => AppError::Unauthorized { code, message },
            ServiceError::Forbidden(_) => AppError::Forbidden { code, message },
            ServiceError::NotFound(_) => AppError::NotFound { code, message },
            ServiceError::InvalidState(_)
            | ServiceError::DuplicatePlayer(_)
            | ServiceError::AlreadyAnswered(_)
            | ServiceError::TooLate(_)
            | ServiceError::EmptyRoom
            | ServiceError::AnswerHidden => AppError::Conflict { code, message },
            ServiceError::NotPlayable(_) => AppError::Unprocessable { code, message },
            ServiceError::PinExhausted(_) => AppError::ServiceUnavailable { code, message },
            ServiceError::Internal(_) => AppError::Internal { code, message },
        }
    }
}

impl AppError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::BadRequest { code, .. } => (StatusCode::BAD_REQUEST, *code),
            AppError::Unauthorized { code, .. } => (StatusCode::UNAUTHORIZED, *code),
            AppError::Forbidden { code, .. } => (StatusCode::FORBIDDEN, *code),
            AppError::NotFound { code, .. } => (StatusCode::NOT_FOUND, *code),
            AppError::Conflict { code, .. } => (StatusCode::CONFLICT, *code),
            AppError::Unprocessable { code, .. } => (StatusCode::UNPROCESSABLE_ENTITY, *code),
            AppError::ServiceUnavailable { code, .. } => (StatusCode::SERVICE_UNAVAILABLE, *code),
            AppError::Internal { code, .. } => (StatusCode::INTERNAL_SERVER_ERROR, *code),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, code) = self.status_and_code();
        let payload = Json(ErrorBody {
            code,
            message: self.to_string(),
        });

        (status, payload).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::state_machine::SessionPhase;

    fn status_of(err: impl Into<ServiceError>) -> (StatusCode, &'static str) {
        AppError::from(err.into()).status_and_code()
    }

    #[test]
    fn session_rejections_keep_their_kind() {
        assert_eq!(
            status_of(SessionError::AlreadyAnswered("p1".into())),
            (StatusCode::CONFLICT, "ALREADY_ANSWERED")
        );
        assert_eq!(
            status_of(SessionError::TooLate {
                elapsed_ms: 11_000,
                limit_ms: 10_500
            }),
            (StatusCode::CONFLICT, "TOO_LATE")
        );
        assert_eq!(
            status_of(SessionError::InvalidIndex {
                index: 9,
                options: 4
            }),
            (StatusCode::BAD_REQUEST, "INVALID_INDEX")
        );
        assert_eq!(
            status_of(SessionError::InvalidState {
                operation: "start",
                phase: SessionPhase::Ended
            }),
            (StatusCode::CONFLICT, "INVALID_STATE")
        );
    }

    #[test]
    fn registry_errors_unwrap_session_errors() {
        assert_eq!(
            status_of(RegistryError::Session(SessionError::EmptyRoom)),
            (StatusCode::CONFLICT, "EMPTY_ROOM")
        );
        assert_eq!(
            status_of(RegistryError::InvalidPin("12".into())),
            (StatusCode::BAD_REQUEST, "INVALID_PIN")
        );
        assert_eq!(
            status_of(RegistryError::NotFound("123456".into())),
            (StatusCode::NOT_FOUND, "NOT_FOUND")
        );
        assert_eq!(
            status_of(RegistryError::PinExhausted(100)),
            (StatusCode::SERVICE_UNAVAILABLE, "PIN_EXHAUSTED")
        );
    }

    #[test]
    fn quiz_errors_map_to_not_playable() {
        assert_eq!(
            status_of(QuizStoreError::NotPlayable("no questions".into())),
            (StatusCode::UNPROCESSABLE_ENTITY, "NOT_PLAYABLE")
        );
        assert_eq!(
            status_of(ServiceError::Forbidden("host only".into())),
            (StatusCode::FORBIDDEN, "FORBIDDEN")
        );
    }
}
