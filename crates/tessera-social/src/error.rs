//! Sign-in flow error types.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use crate::models::ApiResponse;
use crate::store::StoreError;

/// Everything that can go wrong between the provider redirect and a signed-in
/// session. Protocol violations map to 4xx; expected business rejections keep
/// HTTP 200 and carry `success: false` in the envelope, which is what the
/// frontend renders.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Callback arrived without a state echo, or with the wrong one.
    #[error("state is empty or does not match")]
    StateMismatch,

    #[error("the administrator has not enabled sign-in via Google")]
    GoogleLoginDisabled,

    #[error("the administrator has disabled new user registration")]
    RegistrationClosed,

    #[error("this Google account is already bound to another user")]
    AlreadyBound,

    #[error("account has been deactivated")]
    AccountDeactivated,

    #[error("account has been banned")]
    AccountBanned,

    #[error("please sign in before binding a Google account")]
    BindRequiresSession,

    #[error("authorization code cannot be empty")]
    MissingCode,

    #[error("token exchange failed: {0}")]
    Exchange(#[source] reqwest::Error),

    #[error("token endpoint returned {status}: {body}")]
    ExchangeRejected { status: u16, body: String },

    #[error("malformed token payload: {0}")]
    MalformedToken(#[source] reqwest::Error),

    #[error("userinfo request failed: {0}")]
    Claims(#[source] reqwest::Error),

    #[error("userinfo endpoint returned {status}: {body}")]
    ClaimsRejected { status: u16, body: String },

    #[error("malformed userinfo payload: {0}")]
    MalformedClaims(#[source] reqwest::Error),

    #[error("provider returned an empty subject id")]
    MissingSubject,

    #[error("user store failure: {0}")]
    Store(#[from] StoreError),

    #[error("session failure: {0}")]
    Session(#[from] tower_sessions::session::Error),

    #[error("session layer unavailable: {0}")]
    SessionUnavailable(&'static str),
}

/// Convenience alias for flow results.
pub type AuthResult<T> = Result<T, AuthError>;

impl AuthError {
    /// Stable machine-readable code, used in logs.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::StateMismatch => "state_mismatch",
            AuthError::GoogleLoginDisabled => "google_login_disabled",
            AuthError::RegistrationClosed => "registration_closed",
            AuthError::AlreadyBound => "already_bound",
            AuthError::AccountDeactivated => "account_deactivated",
            AuthError::AccountBanned => "account_banned",
            AuthError::BindRequiresSession => "bind_requires_session",
            AuthError::MissingCode => "missing_code",
            AuthError::Exchange(_) => "exchange_failed",
            AuthError::ExchangeRejected { .. } => "exchange_rejected",
            AuthError::MalformedToken(_) => "malformed_token",
            AuthError::Claims(_) => "userinfo_failed",
            AuthError::ClaimsRejected { .. } => "userinfo_rejected",
            AuthError::MalformedClaims(_) => "malformed_claims",
            AuthError::MissingSubject => "missing_subject",
            AuthError::Store(_) => "store_error",
            AuthError::Session(_) => "session_error",
            AuthError::SessionUnavailable(_) => "session_unavailable",
        }
    }

    /// HTTP status for this error.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::StateMismatch => StatusCode::FORBIDDEN,
            AuthError::MissingCode => StatusCode::BAD_REQUEST,
            AuthError::BindRequiresSession => StatusCode::UNAUTHORIZED,
            AuthError::Session(_) | AuthError::SessionUnavailable(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            _ => StatusCode::OK,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let message = match &self {
            AuthError::Session(e) => {
                tracing::error!(code = self.code(), error = %e, "session store failure");
                "session failure, please retry".to_string()
            }
            AuthError::SessionUnavailable(reason) => {
                tracing::error!(code = self.code(), reason, "session layer missing");
                "session failure, please retry".to_string()
            }
            AuthError::Store(e) => {
                tracing::error!(code = self.code(), error = %e, "user store failure");
                self.to_string()
            }
            AuthError::Exchange(_)
            | AuthError::ExchangeRejected { .. }
            | AuthError::MalformedToken(_)
            | AuthError::Claims(_)
            | AuthError::ClaimsRejected { .. }
            | AuthError::MalformedClaims(_)
            | AuthError::MissingSubject => {
                tracing::warn!(code = self.code(), error = %self, "provider exchange failed");
                self.to_string()
            }
            AuthError::StateMismatch => {
                tracing::warn!(code = self.code(), "rejected callback with bad state");
                self.to_string()
            }
            _ => {
                tracing::info!(code = self.code(), "rejected sign-in: {self}");
                self.to_string()
            }
        };

        (
            self.status_code(),
            Json(ApiResponse::rejection(message)),
        )
            .into_response()
    }
}
