//! Route table and shared state for the sign-in flow.

use std::sync::Arc;

use axum::routing::get;
use axum::Router;

use crate::handlers;
use crate::providers::GoogleProvider;
use crate::reconcile::Reconciler;
use crate::store::UserStore;

/// Administrative switches for the flow.
#[derive(Debug, Clone, Copy)]
pub struct AuthGates {
    /// Google sign-in and binding are enabled at all.
    pub google_login: bool,
    /// Unbound identities may provision new accounts.
    pub registration_open: bool,
}

/// Shared state for the sign-in routes.
#[derive(Clone)]
pub struct AuthState {
    pub google: GoogleProvider,
    pub reconciler: Reconciler,
    pub gates: AuthGates,
}

impl AuthState {
    #[must_use]
    pub fn new(google: GoogleProvider, store: Arc<dyn UserStore>, gates: AuthGates) -> Self {
        Self {
            google,
            reconciler: Reconciler::new(store, gates.registration_open),
            gates,
        }
    }
}

/// Routes for Google sign-in. Requires a session layer on the final app.
pub fn router() -> Router<AuthState> {
    Router::new()
        .route("/oauth/google", get(handlers::google_callback))
        .route("/oauth/google/authorize", get(handlers::google_authorize))
}
