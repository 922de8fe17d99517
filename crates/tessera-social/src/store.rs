//! Account store contract consumed by the reconciliation engine.

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{Role, User, UserStatus};

/// Store-level failures, kept separate from the flow taxonomy so callers can
/// match on conflicts without knowing which backend produced them.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write.
    #[error("unique constraint violated")]
    Conflict,

    #[error("user not found")]
    NotFound,

    #[error("{0}")]
    Backend(String),
}

/// Result of resolving a Google subject id against the account base.
///
/// `Deactivated` replaces the upstream convention of returning a user record
/// with a zero id when the bound account was deleted; the three cases are
/// distinct outcomes and each drives a different branch of the flow.
#[derive(Debug, Clone)]
pub enum ExternalLookup {
    /// The subject id is bound to a live account.
    Bound(User),
    /// The subject id was bound to an account that has since been deleted.
    Deactivated,
    /// No account carries this subject id.
    Unbound,
}

/// Fields supplied when provisioning an account from a Google identity.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub display_name: String,
    pub email: Option<String>,
    pub google_id: String,
    pub role: Role,
    pub status: UserStatus,
    pub inviter_id: Option<i64>,
}

/// The account store the flow reconciles against.
///
/// Implementations must enforce uniqueness of `google_id` with a constraint
/// and surface violations as [`StoreError::Conflict`]; the engine relies on
/// that to resolve concurrent binding races.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Look up the account bound to a Google subject id.
    async fn find_by_google_id(&self, google_id: &str) -> Result<ExternalLookup, StoreError>;

    /// Load an account by id.
    async fn fetch(&self, id: i64) -> Result<User, StoreError>;

    /// Highest user id issued so far, 0 for an empty store.
    async fn max_user_id(&self) -> Result<i64, StoreError>;

    /// Resolve a referral code to the inviting user's id.
    async fn find_inviter(&self, aff_code: &str) -> Result<Option<i64>, StoreError>;

    /// Insert a new account and return it with its assigned id.
    async fn insert(&self, user: NewUser) -> Result<User, StoreError>;

    /// Attach a Google subject id to an existing account.
    async fn bind_google_id(&self, user_id: i64, google_id: &str) -> Result<(), StoreError>;
}
