//! HTTP entry points for the Google sign-in flow.

use axum::extract::{Query, State};
use axum::response::Redirect;
use axum::Json;
use serde::Deserialize;
use tracing::info;

use crate::error::{AuthError, AuthResult};
use crate::models::ApiResponse;
use crate::reconcile::Resolution;
use crate::router::AuthState;
use crate::session::SessionContext;

/// Query parameters Google appends to the callback redirect.
#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    pub state: Option<String>,
    pub code: Option<String>,
}

/// Query parameters accepted at flow initiation.
#[derive(Debug, Deserialize)]
pub struct AuthorizeParams {
    /// Referral code forwarded by the frontend; resolved at registration.
    pub aff: Option<String>,
}

/// Start the flow: mint a state token and send the visitor to Google.
pub async fn google_authorize(
    State(state): State<AuthState>,
    session: SessionContext,
    Query(params): Query<AuthorizeParams>,
) -> AuthResult<Redirect> {
    if !state.gates.google_login {
        return Err(AuthError::GoogleLoginDisabled);
    }

    if let Some(aff) = params.aff.as_deref().filter(|aff| !aff.is_empty()) {
        session.remember_referral(aff).await?;
    }

    let token = session.issue_state().await?;
    Ok(Redirect::to(&state.google.authorization_url(&token)))
}

/// Google's redirect target. Verifies state, then signs in, registers, or
/// binds depending on what the session and the account base already know.
pub async fn google_callback(
    State(state): State<AuthState>,
    session: SessionContext,
    Query(params): Query<CallbackParams>,
) -> AuthResult<Json<ApiResponse>> {
    // CSRF gate first, before anything else gets to run.
    session.verify_state(params.state.as_deref()).await?;

    // An authenticated session binds; it never re-logs-in.
    if session.is_authenticated().await? {
        return bind_callback(&state, &session, params.code.as_deref()).await;
    }

    if !state.gates.google_login {
        return Err(AuthError::GoogleLoginDisabled);
    }

    // An absent code is passed through as-is; the token endpoint's rejection
    // comes back with its status and body attached.
    let code = params.code.unwrap_or_default();
    let claims = state.google.exchange_and_fetch(&code).await?;

    let referral = session.referral_code().await?;
    let resolution = state.reconciler.resolve(&claims, referral.as_deref()).await?;

    // Whichever way the identity resolved, only enabled accounts get in.
    let user = resolution.user();
    if !user.is_enabled() {
        return Err(AuthError::AccountBanned);
    }

    match &resolution {
        Resolution::Existing(_) => info!(user_id = user.id, "signed in via Google"),
        Resolution::Registered(_) => {
            info!(user_id = user.id, "signed in via Google after registration");
        }
    }

    session.establish(user).await?;
    Ok(Json(ApiResponse::ok("login successful")))
}

async fn bind_callback(
    state: &AuthState,
    session: &SessionContext,
    code: Option<&str>,
) -> AuthResult<Json<ApiResponse>> {
    if !state.gates.google_login {
        return Err(AuthError::GoogleLoginDisabled);
    }

    let code = match code {
        Some(code) if !code.is_empty() => code,
        _ => return Err(AuthError::MissingCode),
    };

    let claims = state.google.exchange_and_fetch(code).await?;
    let current_user = session.authenticated_user().await?;
    state.reconciler.bind(&claims, current_user).await?;

    // The caller keeps their existing session untouched.
    Ok(Json(ApiResponse::ok("Google account bound successfully")))
}
