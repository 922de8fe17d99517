//! Google sign-in for local accounts.
//!
//! Implements the OAuth2 authorization-code flow against Google and
//! reconciles the returned identity with the local account base: an
//! already-bound subject signs back in, an unbound subject registers when
//! registration is open, and an authenticated session binds the identity to
//! its own account instead.
//!
//! # Features
//! - CSRF state verification backed by the caller's session, checked before
//!   any other logic runs
//! - Single-shot code-to-token exchange and claims fetch: no retries, no
//!   token persistence
//! - Exclusive identity binding, enforced down to the store's unique
//!   constraint for concurrent callers
//! - Account store behind the [`store::UserStore`] trait, so the flow does
//!   not care what database backs it

pub mod error;
pub mod handlers;
pub mod models;
pub mod providers;
pub mod reconcile;
pub mod router;
pub mod session;
pub mod store;

pub use error::{AuthError, AuthResult};
pub use models::{ApiResponse, Role, User, UserStatus};
pub use providers::{GoogleProvider, IdentityClaims};
pub use reconcile::{Reconciler, Resolution};
pub use router::{router, AuthGates, AuthState};
pub use session::SessionContext;
pub use store::{ExternalLookup, NewUser, StoreError, UserStore};
