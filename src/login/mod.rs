//! Local and third-party (OAuth2) login backed by a server-side session.

pub mod accounts;
pub mod handlers;
pub mod oauth2;
pub mod session;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::response::json_error;

pub type Result<T> = std::result::Result<T, LoginError>;

#[derive(Debug, Error)]
pub enum LoginError {
    #[error("Email {0} is already registered")]
    DuplicateEmail(String),

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Password hash error: {0}")]
    PasswordHash(String),

    #[error("Unknown login provider: {0}")]
    UnknownProvider(String),

    #[error("OAuth2 error: {0}")]
    OAuth(String),

    #[error("Session error: {0}")]
    Session(String),
}

impl LoginError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::DuplicateEmail(_) => StatusCode::CONFLICT,
            Self::InvalidCredentials => StatusCode::UNAUTHORIZED,
            Self::UnknownProvider(_) => StatusCode::NOT_FOUND,
            Self::OAuth(_) => StatusCode::BAD_GATEWAY,
            Self::PasswordHash(_) | Self::Session(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for LoginError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("{}", self);
        }
        json_error(status, &self.to_string())
    }
}
