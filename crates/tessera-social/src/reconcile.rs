//! Reconciliation of Google identities with local accounts.

use std::sync::Arc;

use tracing::{info, warn};

use crate::error::{AuthError, AuthResult};
use crate::models::{Role, User, UserStatus};
use crate::providers::IdentityClaims;
use crate::store::{ExternalLookup, NewUser, StoreError, UserStore};

/// Username prefix for accounts provisioned through Google sign-in.
const USERNAME_PREFIX: &str = "google_";

/// How a verified identity was resolved to a local account.
///
/// The caller owns what happens next (the enabled-status check and session
/// establishment), so both variants carry the account and neither has side
/// conditions attached.
#[derive(Debug, Clone)]
pub enum Resolution {
    /// The subject id was already bound; the account was loaded.
    Existing(User),
    /// No binding existed; a fresh account was provisioned.
    Registered(User),
}

impl Resolution {
    #[must_use]
    pub fn user(&self) -> &User {
        match self {
            Resolution::Existing(user) | Resolution::Registered(user) => user,
        }
    }
}

/// Decides what a verified Google identity means for the account base.
#[derive(Clone)]
pub struct Reconciler {
    store: Arc<dyn UserStore>,
    registration_open: bool,
}

impl Reconciler {
    #[must_use]
    pub fn new(store: Arc<dyn UserStore>, registration_open: bool) -> Self {
        Self {
            store,
            registration_open,
        }
    }

    /// Resolve claims for a visitor without a session: sign in when the
    /// subject is bound, register when it is not and registration is open.
    pub async fn resolve(
        &self,
        claims: &IdentityClaims,
        referral: Option<&str>,
    ) -> AuthResult<Resolution> {
        match self.store.find_by_google_id(&claims.subject).await? {
            ExternalLookup::Bound(user) => Ok(Resolution::Existing(user)),
            ExternalLookup::Deactivated => Err(AuthError::AccountDeactivated),
            ExternalLookup::Unbound if self.registration_open => {
                let user = self.register(claims, referral).await?;
                Ok(Resolution::Registered(user))
            }
            ExternalLookup::Unbound => Err(AuthError::RegistrationClosed),
        }
    }

    /// Attach the claims' subject id to the caller's account.
    ///
    /// Binding is exclusive: a subject id held by any account, the caller's
    /// included, rejects before the caller is even identified.
    pub async fn bind(
        &self,
        claims: &IdentityClaims,
        current_user: Option<i64>,
    ) -> AuthResult<User> {
        if !matches!(
            self.store.find_by_google_id(&claims.subject).await?,
            ExternalLookup::Unbound
        ) {
            return Err(AuthError::AlreadyBound);
        }

        let user_id = current_user.ok_or(AuthError::BindRequiresSession)?;
        let mut user = self.store.fetch(user_id).await?;
        self.store
            .bind_google_id(user.id, &claims.subject)
            .await
            .map_err(conflict_is_bound)?;
        user.google_id = Some(claims.subject.clone());

        info!(user_id = user.id, "bound Google identity to account");
        Ok(user)
    }

    async fn register(
        &self,
        claims: &IdentityClaims,
        referral: Option<&str>,
    ) -> AuthResult<User> {
        let next_id = self.store.max_user_id().await? + 1;
        let inviter_id = match referral {
            Some(code) => self.lookup_inviter(code).await,
            None => None,
        };

        let user = self
            .store
            .insert(NewUser {
                username: format!("{USERNAME_PREFIX}{next_id}"),
                display_name: claims.display_name(),
                email: claims.email.clone(),
                google_id: claims.subject.clone(),
                role: Role::Common,
                status: UserStatus::Enabled,
                inviter_id,
            })
            .await
            .map_err(conflict_is_bound)?;

        info!(
            user_id = user.id,
            username = %user.username,
            "provisioned account from Google identity"
        );
        Ok(user)
    }

    /// An unknown or failing referral code never blocks registration.
    async fn lookup_inviter(&self, code: &str) -> Option<i64> {
        match self.store.find_inviter(code).await {
            Ok(inviter) => inviter,
            Err(error) => {
                warn!(%error, "referral code lookup failed, registering without inviter");
                None
            }
        }
    }
}

/// A unique-constraint race at write time means someone else bound the
/// identity first: report it as such, not as a store fault.
fn conflict_is_bound(error: StoreError) -> AuthError {
    match error {
        StoreError::Conflict => AuthError::AlreadyBound,
        other => AuthError::Store(other),
    }
}
