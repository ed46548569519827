//! Error handling for the API.
//!
//! Every failure the engine can produce is a [RollcallError]. REST handlers
//! turn them into JSON bodies with an HTTP status, and GraphQL resolvers
//! extend them with a `code` so clients can tell rejections from outages.

use async_graphql::ErrorExtensions;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};
use thiserror::Error;

use crate::models::{EventId, UserId};

/// The error enum for all error handling across the API.
///
/// See each variant for its corresponding status code.
#[derive(Debug, Error)]
pub enum RollcallError {
    /// \[404\] An event, student, or registration token did not resolve.
    #[error("{0}")]
    NotFound(String),
    /// \[401\] The request carried no valid session token.
    #[error("login required")]
    Unauthorized,
    /// \[403\] The caller's role does not allow the action.
    #[error("{0}")]
    Forbidden(String),
    /// \[400\] A business rule refused the request, e.g. registering twice.
    #[error("{0}")]
    Rejected(String),
    /// \[400\] The request was malformed.
    #[error("{0}")]
    BadRequest(String),
    /// \[500\] The store could not be reached or refused a query.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    /// \[500\] The student was saved but the event was not.
    ///
    /// The two records disagree until someone reconciles them by hand.
    #[error(
        "student {student_id} was updated but event {event_id} was not saved \
         ({source}); manual reconciliation required"
    )]
    PartialWrite {
        event_id: EventId,
        student_id: UserId,
        source: Box<RollcallError>,
    },
    /// \[500\] Anything else that went wrong while handling the request.
    #[error("{0}")]
    Internal(String),
}

/// The return type for all engine operations and endpoints.
pub type RollcallResult<T> = Result<T, RollcallError>;

impl RollcallError {
    pub fn status(&self) -> StatusCode {
        match self {
            RollcallError::NotFound(_) => StatusCode::NOT_FOUND,
            RollcallError::Unauthorized => StatusCode::UNAUTHORIZED,
            RollcallError::Forbidden(_) => StatusCode::FORBIDDEN,
            RollcallError::Rejected(_) | RollcallError::BadRequest(_) => StatusCode::BAD_REQUEST,
            RollcallError::Database(_)
            | RollcallError::PartialWrite { .. }
            | RollcallError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// A stable, machine-readable name for the error kind.
    pub fn code(&self) -> &'static str {
        match self {
            RollcallError::NotFound(_) => "NOT_FOUND",
            RollcallError::Unauthorized => "UNAUTHORIZED",
            RollcallError::Forbidden(_) => "FORBIDDEN",
            RollcallError::Rejected(_) => "REJECTED",
            RollcallError::BadRequest(_) => "BAD_REQUEST",
            RollcallError::Database(_) | RollcallError::Internal(_) => "INTERNAL",
            RollcallError::PartialWrite { .. } => "PARTIAL_WRITE",
        }
    }

    pub fn as_json(&self) -> Value {
        let mut json_val = match self {
            RollcallError::PartialWrite {
                event_id,
                student_id,
                ..
            } => json!({ "eventId": event_id, "studentId": student_id }),
            _ => json!({}),
        };

        json_val["message"] = json!(self.to_string());
        json_val["statusCode"] = json!(self.status().as_u16());

        json_val
    }
}

impl IntoResponse for RollcallError {
    fn into_response(self) -> Response {
        if self.status().is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        (self.status(), Json(self.as_json())).into_response()
    }
}

impl ErrorExtensions for RollcallError {
    fn extend(&self) -> async_graphql::Error {
        async_graphql::Error::new(self.to_string()).extend_with(|_err, extensions| {
            extensions.set("code", self.code());
        })
    }
}
