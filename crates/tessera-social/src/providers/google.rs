//! Google OAuth2/OIDC client.

use std::time::Duration;

use reqwest::Client;
use serde::Serialize;

use super::{IdentityClaims, TokenPayload};
use crate::error::{AuthError, AuthResult};

/// Google `OAuth2` endpoints.
pub const AUTHORIZATION_ENDPOINT: &str = "https://accounts.google.com/o/oauth2/v2/auth";
pub const TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";
pub const USERINFO_ENDPOINT: &str = "https://openidconnect.googleapis.com/v1/userinfo";

const SCOPES: &str = "openid profile email";

#[derive(Serialize)]
struct TokenRequest<'a> {
    code: &'a str,
    client_id: &'a str,
    client_secret: &'a str,
    redirect_uri: &'a str,
    grant_type: &'a str,
}

/// Google `OAuth2` client. Cheap to clone; the token and userinfo endpoints
/// can be repointed at a stub server for tests.
#[derive(Clone)]
pub struct GoogleProvider {
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    token_endpoint: String,
    userinfo_endpoint: String,
    http_client: Client,
}

impl GoogleProvider {
    /// Create a client against the real Google endpoints.
    #[must_use]
    pub fn new(client_id: String, client_secret: String, redirect_uri: String) -> Self {
        Self {
            client_id,
            client_secret,
            redirect_uri,
            token_endpoint: TOKEN_ENDPOINT.to_string(),
            userinfo_endpoint: USERINFO_ENDPOINT.to_string(),
            http_client: Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_else(|_| Client::new()),
        }
    }

    /// Repoint the outbound endpoints, e.g. at a wiremock server.
    #[must_use]
    pub fn with_endpoints(
        mut self,
        token_endpoint: impl Into<String>,
        userinfo_endpoint: impl Into<String>,
    ) -> Self {
        self.token_endpoint = token_endpoint.into();
        self.userinfo_endpoint = userinfo_endpoint.into();
        self
    }

    /// Build the consent-screen URL carrying the CSRF state token.
    #[must_use]
    pub fn authorization_url(&self, state: &str) -> String {
        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&state={}",
            AUTHORIZATION_ENDPOINT,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(&self.redirect_uri),
            urlencoding::encode(SCOPES),
            urlencoding::encode(state),
        )
    }

    /// Exchange an authorization code for a token, then fetch the subject's
    /// claims with it.
    ///
    /// Two sequential outbound calls. Codes are single-use, so nothing here
    /// is retried; each failure is reported as-is.
    pub async fn exchange_and_fetch(&self, code: &str) -> AuthResult<IdentityClaims> {
        let token = self.exchange_code(code).await?;
        let claims = self.fetch_claims(&token.access_token).await?;
        if claims.subject.is_empty() {
            return Err(AuthError::MissingSubject);
        }
        Ok(claims)
    }

    async fn exchange_code(&self, code: &str) -> AuthResult<TokenPayload> {
        let request = TokenRequest {
            code,
            client_id: &self.client_id,
            client_secret: &self.client_secret,
            redirect_uri: &self.redirect_uri,
            grant_type: "authorization_code",
        };

        let response = self
            .http_client
            .post(&self.token_endpoint)
            .json(&request)
            .send()
            .await
            .map_err(AuthError::Exchange)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::ExchangeRejected {
                status: status.as_u16(),
                body,
            });
        }

        response.json().await.map_err(AuthError::MalformedToken)
    }

    async fn fetch_claims(&self, access_token: &str) -> AuthResult<IdentityClaims> {
        let response = self
            .http_client
            .get(&self.userinfo_endpoint)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(AuthError::Claims)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::ClaimsRejected {
                status: status.as_u16(),
                body,
            });
        }

        response.json().await.map_err(AuthError::MalformedClaims)
    }
}
