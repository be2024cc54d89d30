use std::fmt::{self, Display};

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use log::{log, Level};

#[derive(Debug)]
pub enum ApiError {
    Database(sqlx::Error),
    NotFound(&'static str),
    Conflict(&'static str),
    InvalidOperation(&'static str),
    Forbidden(&'static str),
    Unauthorized(&'static str),
}

impl Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            Self::Database(error) => write!(f, "{error}"),
            Self::NotFound(message)
            | Self::Conflict(message)
            | Self::InvalidOperation(message)
            | Self::Forbidden(message)
            | Self::Unauthorized(message) => write!(f, "{message}"),
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::InvalidOperation(_) => StatusCode::BAD_REQUEST,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        }
    }

    fn error_response(&self) -> HttpResponse {
        match self {
            Self::Database(error) => {
                log!(Level::Error, "SQLX Error: {error}");
                HttpResponse::InternalServerError().body("Internal database error")
            }
            other => HttpResponse::build(other.status_code()).body(other.to_string()),
        }
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(error: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_error) = &error {
            // Race on a unique index surfaces the same way as the explicit
            // pre-check: as a conflict.
            if db_error.is_unique_violation() {
                return Self::Conflict("Resource already exists");
            }
        }
        Self::Database(error)
    }
}
