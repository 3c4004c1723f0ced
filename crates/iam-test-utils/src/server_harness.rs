//! Test server harness for E2E testing
//!
//! Provides TestIamServer for spawning a real identity server on in-memory
//! stores and talking to it over HTTP.

use crate::crypto_fixtures::test_config;
use crate::token_builders::TestRegistrationBuilder;
use common::types::UserId;
use iam_service::config::Config;
use iam_service::repositories::{MemorySessionStore, MemoryUserStore};
use iam_service::routes::{self, AppState};
use metrics_exporter_prometheus::PrometheusBuilder;
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Tokens and identity of a logged-in test user.
#[derive(Debug, Clone)]
pub struct TestSession {
    pub user_id: UserId,
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Deserialize)]
struct LoginBody {
    user: UserBody,
    access_token: String,
    refresh_token: String,
}

#[derive(Deserialize)]
struct UserBody {
    id: UserId,
}

/// Test harness for spawning the identity server in E2E tests
///
/// # Example
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_login_flow() -> Result<()> {
///     let server = TestIamServer::spawn().await?;
///     let response = server
///         .client()
///         .get(format!("{}/health", server.url()))
///         .send()
///         .await?;
///     assert_eq!(response.status(), 200);
///     Ok(())
/// }
/// ```
pub struct TestIamServer {
    addr: SocketAddr,
    state: Arc<AppState>,
    client: reqwest::Client,
    _handle: JoinHandle<()>,
}

impl TestIamServer {
    /// Spawn a server with [`test_config`].
    pub async fn spawn() -> Result<Self, anyhow::Error> {
        Self::spawn_with_config(test_config()).await
    }

    /// Spawn a server on 127.0.0.1 with a random port and fresh in-memory stores.
    pub async fn spawn_with_config(config: Config) -> Result<Self, anyhow::Error> {
        let state = Arc::new(
            AppState::new(
                config,
                Arc::new(MemoryUserStore::new()),
                Arc::new(MemorySessionStore::new()),
            )
            .map_err(|e| anyhow::anyhow!("Failed to build app state: {}", e))?,
        );

        // Standalone recorder, never installed globally, so tests don't collide.
        let metrics_handle = PrometheusBuilder::new().build_recorder().handle();

        let app = routes::build_routes(state.clone(), metrics_handle);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind test server: {}", e))?;

        let addr = listener
            .local_addr()
            .map_err(|e| anyhow::anyhow!("Failed to get local address: {}", e))?;

        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                eprintln!("Test server error: {}", e);
            }
        });

        Ok(Self {
            addr,
            state,
            client: reqwest::Client::new(),
            _handle: handle,
        })
    }

    /// Get the base URL of the test server
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// The live application state, for inspecting stores directly.
    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }

    pub fn config(&self) -> &Config {
        &self.state.config
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// `POST /api/v1/auth/register` with an arbitrary JSON body.
    pub async fn register(
        &self,
        body: &serde_json::Value,
    ) -> Result<reqwest::Response, anyhow::Error> {
        Ok(self
            .client
            .post(format!("{}/api/v1/auth/register", self.url()))
            .json(body)
            .send()
            .await?)
    }

    /// `POST /api/v1/auth/login`.
    pub async fn login(
        &self,
        identifier: &str,
        password: &str,
    ) -> Result<reqwest::Response, anyhow::Error> {
        Ok(self
            .client
            .post(format!("{}/api/v1/auth/login", self.url()))
            .json(&serde_json::json!({ "identifier": identifier, "password": password }))
            .send()
            .await?)
    }

    /// `POST /api/v1/auth/refresh`.
    pub async fn refresh(&self, refresh_token: &str) -> Result<reqwest::Response, anyhow::Error> {
        Ok(self
            .client
            .post(format!("{}/api/v1/auth/refresh", self.url()))
            .json(&serde_json::json!({ "refresh_token": refresh_token }))
            .send()
            .await?)
    }

    /// Authenticated GET.
    pub async fn get_with_token(
        &self,
        path: &str,
        access_token: &str,
    ) -> Result<reqwest::Response, anyhow::Error> {
        Ok(self
            .client
            .get(format!("{}{}", self.url(), path))
            .bearer_auth(access_token)
            .send()
            .await?)
    }

    /// Register an email account and log it in.
    pub async fn register_and_login(
        &self,
        email: &str,
        password: &str,
    ) -> Result<TestSession, anyhow::Error> {
        let body = TestRegistrationBuilder::new(password)
            .with_email(email)
            .build();
        let response = self.register(&body).await?;
        if response.status() != reqwest::StatusCode::CREATED {
            anyhow::bail!(
                "Registration failed with {}: {}",
                response.status(),
                response.text().await?
            );
        }

        let response = self.login(email, password).await?;
        if !response.status().is_success() {
            anyhow::bail!("Login failed with {}", response.status());
        }
        let body: LoginBody = response.json().await?;

        Ok(TestSession {
            user_id: body.user.id,
            access_token: body.access_token,
            refresh_token: body.refresh_token,
        })
    }
}

impl Drop for TestIamServer {
    fn drop(&mut self) {
        self._handle.abort();
    }
}
