//! Shared fixtures: an in-memory account store, a session-backed test app,
//! and canned Google payloads served by wiremock.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::header::{COOKIE, LOCATION, SET_COOKIE};
use axum::http::{Request, StatusCode};
use axum::response::Response;
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;
use tower_sessions::session::Id;
use tower_sessions::{MemoryStore, Session, SessionManagerLayer};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use tessera_social::models::{Role, User, UserStatus};
use tessera_social::store::{ExternalLookup, NewUser, StoreError, UserStore};
use tessera_social::{AuthGates, AuthState, GoogleProvider};

pub const ACCESS_TOKEN: &str = "ya29.mock_google_access_token";

/// In-memory account store, with counters so tests can assert how much
/// store traffic a flow generated.
#[derive(Default)]
pub struct MemoryUsers {
    users: Mutex<Vec<User>>,
    aff_codes: Mutex<HashMap<String, i64>>,
    pub last_inviter: Mutex<Option<i64>>,
    pub fail_inviter_lookup: AtomicBool,
    pub conflict_on_insert: AtomicBool,
    pub reads: AtomicUsize,
    pub writes: AtomicUsize,
}

impl MemoryUsers {
    pub fn seed(&self, user: User) {
        self.users.lock().unwrap().push(user);
    }

    pub fn seed_aff(&self, code: &str, user_id: i64) {
        self.aff_codes
            .lock()
            .unwrap()
            .insert(code.to_string(), user_id);
    }

    pub fn get(&self, id: i64) -> Option<User> {
        self.users
            .lock()
            .unwrap()
            .iter()
            .find(|user| user.id == id)
            .cloned()
    }

    pub fn count(&self) -> usize {
        self.users.lock().unwrap().len()
    }

    pub fn store_traffic(&self) -> usize {
        self.reads.load(Ordering::SeqCst) + self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UserStore for MemoryUsers {
    async fn find_by_google_id(&self, google_id: &str) -> Result<ExternalLookup, StoreError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let users = self.users.lock().unwrap();
        match users
            .iter()
            .find(|user| user.google_id.as_deref() == Some(google_id))
        {
            Some(user) if user.status == UserStatus::Deleted => Ok(ExternalLookup::Deactivated),
            Some(user) => Ok(ExternalLookup::Bound(user.clone())),
            None => Ok(ExternalLookup::Unbound),
        }
    }

    async fn fetch(&self, id: i64) -> Result<User, StoreError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.get(id).ok_or(StoreError::NotFound)
    }

    async fn max_user_id(&self) -> Result<i64, StoreError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let users = self.users.lock().unwrap();
        Ok(users.iter().map(|user| user.id).max().unwrap_or(0))
    }

    async fn find_inviter(&self, aff_code: &str) -> Result<Option<i64>, StoreError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.fail_inviter_lookup.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("inviter lookup failed".to_string()));
        }
        Ok(self.aff_codes.lock().unwrap().get(aff_code).copied())
    }

    async fn insert(&self, new: NewUser) -> Result<User, StoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.conflict_on_insert.load(Ordering::SeqCst) {
            return Err(StoreError::Conflict);
        }
        *self.last_inviter.lock().unwrap() = new.inviter_id;
        let mut users = self.users.lock().unwrap();
        if users
            .iter()
            .any(|user| user.google_id.as_deref() == Some(new.google_id.as_str()))
        {
            return Err(StoreError::Conflict);
        }
        let id = users.iter().map(|user| user.id).max().unwrap_or(0) + 1;
        let user = User {
            id,
            username: new.username,
            display_name: new.display_name,
            email: new.email,
            google_id: Some(new.google_id),
            role: new.role,
            status: new.status,
        };
        users.push(user.clone());
        Ok(user)
    }

    async fn bind_google_id(&self, user_id: i64, google_id: &str) -> Result<(), StoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let mut users = self.users.lock().unwrap();
        if users
            .iter()
            .any(|user| user.google_id.as_deref() == Some(google_id))
        {
            return Err(StoreError::Conflict);
        }
        let user = users
            .iter_mut()
            .find(|user| user.id == user_id)
            .ok_or(StoreError::NotFound)?;
        user.google_id = Some(google_id.to_string());
        Ok(())
    }
}

pub fn user(id: i64, google_id: Option<&str>, status: UserStatus) -> User {
    User {
        id,
        username: format!("user_{id}"),
        display_name: format!("User {id}"),
        email: Some(format!("user{id}@x.com")),
        google_id: google_id.map(String::from),
        role: Role::Common,
        status,
    }
}

pub fn gates(google_login: bool, registration_open: bool) -> AuthGates {
    AuthGates {
        google_login,
        registration_open,
    }
}

/// The routes wired over in-memory users, in-memory sessions and a wiremock
/// Google. Each test gets its own instance.
pub struct TestApp {
    pub router: Router,
    pub users: Arc<MemoryUsers>,
    pub sessions: MemoryStore,
    pub google: MockServer,
}

impl TestApp {
    pub async fn new(gates: AuthGates) -> Self {
        Self::with_users(gates, Arc::new(MemoryUsers::default())).await
    }

    pub async fn with_users(gates: AuthGates, users: Arc<MemoryUsers>) -> Self {
        let google = MockServer::start().await;
        let provider = GoogleProvider::new(
            "client-id".to_string(),
            "client-secret".to_string(),
            "http://localhost:3000/api/oauth/google".to_string(),
        )
        .with_endpoints(
            format!("{}/token", google.uri()),
            format!("{}/userinfo", google.uri()),
        );

        let sessions = MemoryStore::default();
        let state = AuthState::new(provider, users.clone(), gates);
        let router = Router::new()
            .nest("/api", tessera_social::router())
            .with_state(state)
            .layer(SessionManagerLayer::new(sessions.clone()).with_secure(false));

        Self {
            router,
            users,
            sessions,
            google,
        }
    }

    pub async fn request(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.unwrap()
    }

    /// Hit the authorize endpoint; returns the session cookie and the state
    /// token carried in the consent-screen redirect.
    pub async fn start_flow(&self) -> (String, String) {
        self.start_flow_with("").await
    }

    /// Like [`Self::start_flow`], with extra query parameters (e.g. `aff=X`).
    pub async fn start_flow_with(&self, query: &str) -> (String, String) {
        let uri = if query.is_empty() {
            "/api/oauth/google/authorize".to_string()
        } else {
            format!("/api/oauth/google/authorize?{query}")
        };
        let response = self
            .request(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);

        let cookie = extract_cookie(&response).expect("authorize sets a session cookie");
        let location = response
            .headers()
            .get(LOCATION)
            .unwrap()
            .to_str()
            .unwrap();
        let state = query_param(location, "state").expect("redirect carries state");
        (cookie, state)
    }

    /// GET the callback with the given query, under an existing session.
    pub async fn callback(&self, cookie: &str, query: &str) -> Response {
        self.request(
            Request::builder()
                .uri(format!("/api/oauth/google?{query}"))
                .header(COOKIE, cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    /// Create a session with the given entries already present; returns the
    /// cookie to send. Used to model an already-signed-in caller.
    pub async fn seeded_session(&self, entries: &[(&str, Value)]) -> String {
        let session = Session::new(None, Arc::new(self.sessions.clone()), None);
        for (key, value) in entries {
            session.insert(key, value).await.unwrap();
        }
        session.save().await.unwrap();
        let id = session.id().expect("saved session has an id");
        format!("id={id}")
    }

    /// The signed-in user id recorded in the session behind `cookie`, if any.
    pub async fn session_user_id(&self, cookie: &str) -> Option<i64> {
        let id: Id = cookie
            .trim_start_matches("id=")
            .parse()
            .expect("cookie holds a session id");
        let session = Session::new(Some(id), Arc::new(self.sessions.clone()), None);
        session.get("id").await.unwrap()
    }
}

pub fn token_payload() -> Value {
    json!({
        "access_token": ACCESS_TOKEN,
        "id_token": "mock_id_token",
        "token_type": "Bearer",
        "expires_in": 3600,
        "scope": "openid profile email"
    })
}

pub fn userinfo_payload(sub: &str, name: &str) -> Value {
    json!({
        "sub": sub,
        "email": "a@x.com",
        "email_verified": true,
        "name": name,
        "picture": "https://lh3.googleusercontent.com/a/photo",
        "locale": "en"
    })
}

/// Stub a successful two-hop exchange ending in claims for `sub`.
pub async fn stub_google_success(server: &MockServer, sub: &str, name: &str) {
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_partial_json(
            json!({"grant_type": "authorization_code"}),
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_payload()))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/userinfo"))
        .and(header("authorization", format!("Bearer {ACCESS_TOKEN}").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(userinfo_payload(sub, name)))
        .mount(server)
        .await;
}

/// Mount both endpoints with an expectation of zero calls.
pub async fn stub_google_unreachable(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/userinfo"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(server)
        .await;
}

pub fn extract_cookie(response: &Response) -> Option<String> {
    let raw = response.headers().get(SET_COOKIE)?.to_str().ok()?;
    raw.split(';').next().map(str::to_string)
}

pub fn query_param(url: &str, name: &str) -> Option<String> {
    let (_, query) = url.split_once('?')?;
    query.split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        (key == name).then(|| value.to_string())
    })
}

pub async fn body_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
