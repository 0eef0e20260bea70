use std::convert::Infallible;

use diesel::r2d2::PoolError;
use diesel::result::Error as DbError;
use thiserror::Error;
use tracing::{debug, error};
use warp::http::StatusCode;
use warp::reject::Rejection;
use warp::reply::{self, Reply, Response};

use crate::voting::Id;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("The question is missing")]
    QuestionMissing,

    #[error("At least one choice is required")]
    ChoiceMissing,

    #[error("unrecognized voting type {0:?}")]
    VotingTypeInvalid(String),

    #[error("choice {choice_id} is not part of poll {poll_id}")]
    SelectionInvalid { poll_id: Id, choice_id: Id },

    #[error("choice {0} is selected more than once")]
    SelectionDuplicate(Id),
}

/// Reasons a ballot cannot be recorded for an otherwise valid submission.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CastError {
    #[error("login is required to vote in this poll")]
    LoginRequired,

    #[error("Sorry! You have already voted in this poll.")]
    AlreadyVoted,
}

#[derive(Debug, Error)]
#[error("{message}")]
pub struct WebError {
    pub code: StatusCode,
    message: String,
    #[source]
    source: Option<DbError>,
}

impl WebError {
    pub fn new(code: StatusCode, message: impl Into<String>) -> WebError {
        WebError { code, message: message.into(), source: None }
    }

    pub fn not_found(subject: &str, id: Id) -> WebError {
        WebError::new(StatusCode::NOT_FOUND, format!("No {subject} found with id {id}"))
    }

    pub fn internal(message: impl Into<String>) -> WebError {
        WebError::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    fn respond(&self) -> Response {
        if self.code.is_server_error() {
            error!(code = %self.code, source = ?self.source, "{}", self.message);
        }
        reply::with_status(self.message().to_owned(), self.code).into_response()
    }
}

impl Reply for WebError {
    fn into_response(self) -> Response {
        self.respond()
    }
}

impl warp::reject::Reject for WebError {}

impl From<ValidationError> for WebError {
    fn from(value: ValidationError) -> Self {
        WebError::new(StatusCode::BAD_REQUEST, value.to_string())
    }
}

impl From<CastError> for WebError {
    fn from(value: CastError) -> Self {
        let code = match value {
            CastError::LoginRequired => StatusCode::UNAUTHORIZED,
            CastError::AlreadyVoted => StatusCode::CONFLICT,
        };
        WebError::new(code, value.to_string())
    }
}

impl From<PoolError> for WebError {
    fn from(value: PoolError) -> Self {
        WebError::internal(format!("Failed to acquire a database connection: {value}"))
    }
}

pub fn db_get(source: DbError, subject: &str, object: Option<&str>) -> WebError {
    let code = match source {
        DbError::NotFound => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let message = match object {
        Some(object) => format!("Failed to retrieve {object} of {subject}"),
        None => format!("Failed to retrieve {subject}"),
    };
    WebError { message, code, source: Some(source) }
}

pub fn db_write(source: DbError, subject: &str) -> WebError {
    WebError {
        message: format!("Failed to store {subject}"),
        code: StatusCode::INTERNAL_SERVER_ERROR,
        source: Some(source),
    }
}

/// Turns any rejection left over after routing into a plain-text response.
pub async fn handle_rejection(err: Rejection) -> Result<Response, Infallible> {
    if let Some(web_error) = err.find::<WebError>() {
        return Ok(web_error.respond());
    }

    let (code, message) = if err.is_not_found() {
        (StatusCode::NOT_FOUND, "Not found")
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "Method not allowed")
    } else if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        (StatusCode::PAYLOAD_TOO_LARGE, "Payload too large")
    } else if err.find::<warp::filters::body::BodyDeserializeError>().is_some()
        || err.find::<warp::reject::InvalidQuery>().is_some()
    {
        (StatusCode::BAD_REQUEST, "Malformed request body")
    } else {
        error!("Unhandled rejection: {err:?}");
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
    };
    debug!(%code, "request rejected");

    Ok(reply::with_status(message, code).into_response())
}
