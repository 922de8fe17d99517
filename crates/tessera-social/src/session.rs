//! Session capability object for the sign-in flow.
//!
//! Handlers never touch the raw session map; this wrapper exposes the few
//! keys the flow owns through typed accessors, so the engine and the provider
//! client can stay functions of their explicit inputs.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use tower_sessions::Session;

use crate::error::{AuthError, AuthResult};
use crate::models::User;

const STATE_KEY: &str = "oauth_state";
const USERNAME_KEY: &str = "username";
const USER_ID_KEY: &str = "id";
const AFF_KEY: &str = "aff";
const ROLE_KEY: &str = "role";
const STATUS_KEY: &str = "status";

/// Typed view over the caller's session.
#[derive(Debug, Clone)]
pub struct SessionContext {
    session: Session,
}

impl SessionContext {
    #[must_use]
    pub fn new(session: Session) -> Self {
        Self { session }
    }

    /// Mint a fresh CSRF state token and store it for the callback to check.
    pub async fn issue_state(&self) -> AuthResult<String> {
        let state = state_nonce();
        self.session.insert(STATE_KEY, &state).await?;
        Ok(state)
    }

    /// Compare an echoed state against the stored one.
    ///
    /// The stored token is consumed on a match, so a code can only be
    /// replayed against an already-spent state. A mismatch leaves it in
    /// place: a forged callback must not be able to burn an in-flight flow.
    pub async fn verify_state(&self, echoed: Option<&str>) -> AuthResult<()> {
        let expected: Option<String> = self.session.get(STATE_KEY).await?;
        match (echoed, expected) {
            (Some(echoed), Some(expected)) if !echoed.is_empty() && echoed == expected => {
                self.session.remove::<String>(STATE_KEY).await?;
                Ok(())
            }
            _ => Err(AuthError::StateMismatch),
        }
    }

    /// Whether the session already identifies a signed-in user.
    pub async fn is_authenticated(&self) -> AuthResult<bool> {
        Ok(self.session.get::<String>(USERNAME_KEY).await?.is_some())
    }

    /// Id of the signed-in user, if the session carries one.
    pub async fn authenticated_user(&self) -> AuthResult<Option<i64>> {
        Ok(self.session.get(USER_ID_KEY).await?)
    }

    /// Keep a referral code around for a later registration.
    pub async fn remember_referral(&self, code: &str) -> AuthResult<()> {
        self.session.insert(AFF_KEY, code).await?;
        Ok(())
    }

    pub async fn referral_code(&self) -> AuthResult<Option<String>> {
        Ok(self.session.get(AFF_KEY).await?)
    }

    /// Claim the session for a signed-in user. Rotates the session id.
    pub async fn establish(&self, user: &User) -> AuthResult<()> {
        self.session.cycle_id().await?;
        self.session.insert(USER_ID_KEY, user.id).await?;
        self.session.insert(USERNAME_KEY, &user.username).await?;
        self.session.insert(ROLE_KEY, user.role).await?;
        self.session.insert(STATUS_KEY, user.status).await?;
        Ok(())
    }
}

impl<S> FromRequestParts<S> for SessionContext
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let session = Session::from_request_parts(parts, state)
            .await
            .map_err(|(_, reason)| AuthError::SessionUnavailable(reason))?;
        Ok(Self::new(session))
    }
}

fn state_nonce() -> String {
    let mut bytes = [0u8; 16];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
