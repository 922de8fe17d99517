//! Identity provider clients.

pub mod google;

pub use google::GoogleProvider;

use serde::{Deserialize, Serialize};

/// Fallback display name for subjects that expose none.
const DEFAULT_DISPLAY_NAME: &str = "Google User";

/// Token endpoint response. Transient: it authorizes the claims fetch and is
/// never persisted.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenPayload {
    pub access_token: String,
    pub id_token: Option<String>,
    pub token_type: Option<String>,
    pub expires_in: Option<i64>,
    pub scope: Option<String>,
}

/// Claims the provider asserts about the authenticated subject.
///
/// `subject` is the only identifier safe to join on. Email is informational:
/// it may be absent, unverified, or reassigned by the provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityClaims {
    #[serde(rename = "sub")]
    pub subject: String,
    pub email: Option<String>,
    pub email_verified: Option<bool>,
    pub name: Option<String>,
    pub picture: Option<String>,
    pub locale: Option<String>,
}

impl IdentityClaims {
    /// Display name with a generic fallback.
    #[must_use]
    pub fn display_name(&self) -> String {
        self.name
            .clone()
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| DEFAULT_DISPLAY_NAME.to_string())
    }
}
