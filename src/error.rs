use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::responses::RequestMeta;

pub const E_NOT_FOUND: &str = "NOT_FOUND";
pub const E_VALIDATION: &str = "VALIDATION";
pub const E_BUSINESS_RULE: &str = "BUSINESS_RULE";
pub const E_SEAT_CONFLICT: &str = "SEAT_CONFLICT";
pub const E_PAYMENT_CONFLICT: &str = "PAYMENT_CONFLICT";
pub const E_DB_FAILURE: &str = "DB_FAILURE";

/// Failure taxonomy of the booking workflow. Every precondition violation is
/// raised at the point of detection, before any write happens.
#[derive(Debug, Error)]
pub enum BookingError {
    /// A referenced entity (user, showtime, booking, payment, ledger row)
    /// does not exist.
    #[error("{0}")]
    NotFound(String),

    /// Malformed or missing input: empty seat list, seats outside the
    /// cinema, pagination out of bounds.
    #[error("{0}")]
    Validation(String),

    /// State collision: seat already taken by a complete booking, duplicate
    /// payment for a booking.
    #[error("{0}")]
    Conflict(String),

    /// Legal request disallowed by current state: past showtime, booking not
    /// pending, insufficient points, void window expired.
    #[error("{0}")]
    BusinessRule(String),

    #[error("database error")]
    Db(#[from] sqlx::Error),
}

impl BookingError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn business_rule(msg: impl Into<String>) -> Self {
        Self::BusinessRule(msg.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            BookingError::NotFound(_) => StatusCode::NOT_FOUND,
            BookingError::Validation(_) | BookingError::BusinessRule(_) => StatusCode::BAD_REQUEST,
            BookingError::Conflict(_) => StatusCode::CONFLICT,
            // A row that vanished mid-transaction reads as a missing entity.
            BookingError::Db(sqlx::Error::RowNotFound) => StatusCode::NOT_FOUND,
            BookingError::Db(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            BookingError::NotFound(_) => E_NOT_FOUND,
            BookingError::Validation(_) => E_VALIDATION,
            BookingError::Conflict(_) => E_SEAT_CONFLICT,
            BookingError::BusinessRule(_) => E_BUSINESS_RULE,
            BookingError::Db(sqlx::Error::RowNotFound) => E_NOT_FOUND,
            BookingError::Db(_) => E_DB_FAILURE,
        }
    }

    pub fn with_meta(self, meta: RequestMeta) -> ApiErrorWithMeta {
        ApiErrorWithMeta {
            error: self,
            meta,
            code: None,
        }
    }
}

#[derive(Debug)]
pub struct ApiErrorWithMeta {
    error: BookingError,
    meta: RequestMeta,
    code: Option<String>,
}

impl ApiErrorWithMeta {
    pub fn with_code(mut self, code: &str) -> Self {
        self.code = Some(code.to_string());
        self
    }
}

impl IntoResponse for ApiErrorWithMeta {
    fn into_response(self) -> Response {
        let status = self.error.status_code();
        let code = self
            .code
            .unwrap_or_else(|| self.error.code().to_string());

        // Only expose high-level messages; internal detail goes to the log.
        let message = match &self.error {
            BookingError::Db(sqlx::Error::RowNotFound) => "resource not found".to_string(),
            BookingError::Db(e) => {
                error!(error = ?e, "database error");
                "internal server error".to_string()
            }
            other => other.to_string(),
        };

        let body = json!({
            "request_id": self.meta.request_id,
            "error": message,
            "code": code,
        });

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn taxonomy_maps_to_distinct_statuses() {
        assert_eq!(
            BookingError::not_found("User not found").status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            BookingError::validation("At least one seat must be selected").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            BookingError::business_rule("Cannot book for past showtime").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            BookingError::conflict("Some seats are already booked").status_code(),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn vanished_row_reads_as_not_found() {
        let err = BookingError::Db(sqlx::Error::RowNotFound);
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(err.code(), E_NOT_FOUND);
    }

    #[test]
    fn other_db_errors_stay_internal() {
        let err = BookingError::Db(sqlx::Error::PoolClosed);
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.code(), E_DB_FAILURE);
    }
}
