//! HTTP routes and application state.

use crate::authz::{PolicyEngine, RuleSetEngine};
use crate::config::Config;
use crate::crypto::{AesGcmFieldCipher, HmacSearchKeyHasher, JwtTokenCodec, TokenCodec};
use crate::errors::IamError;
use crate::handlers;
use crate::middleware::{http_metrics_middleware, require_auth};
use crate::repositories::{SessionStore, UserStore};
use crate::services::{IdentityDirectory, RegistrationService, SessionManager};
use common::secret::ExposeSecret;
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

/// Shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub directory: Arc<IdentityDirectory>,
    pub sessions: Arc<SessionManager>,
    pub registration: Arc<RegistrationService>,
    pub policy: Arc<dyn PolicyEngine>,
    pub codec: Arc<dyn TokenCodec>,
}

impl AppState {
    /// Wire the identity core from config and the two stores.
    ///
    /// Fails closed on any bad key material, and loads the default policy
    /// rules before returning.
    pub fn new(
        config: Config,
        users: Arc<dyn UserStore>,
        session_store: Arc<dyn SessionStore>,
    ) -> Result<Self, IamError> {
        let cipher = Arc::new(AesGcmFieldCipher::new(
            config.field_encryption_key.expose_secret(),
        )?);
        let hasher = Arc::new(HmacSearchKeyHasher::new(
            config.search_key_secret.expose_secret(),
        )?);
        let codec: Arc<dyn TokenCodec> = Arc::new(JwtTokenCodec::from_config(&config)?);

        let policy: Arc<dyn PolicyEngine> = Arc::new(RuleSetEngine::with_default_policies());
        policy.load_policies()?;

        let directory = Arc::new(IdentityDirectory::new(users, cipher, hasher.clone()));
        let sessions = Arc::new(SessionManager::new(session_store, codec.clone(), hasher));
        let registration = Arc::new(RegistrationService::new(
            directory.clone(),
            sessions.clone(),
            config.bcrypt_cost,
        ));

        Ok(Self {
            config,
            directory,
            sessions,
            registration,
            policy,
            codec,
        })
    }
}

/// Build the application routes.
///
/// - `/health` - liveness probe (public)
/// - `/metrics` - Prometheus scrape endpoint (public)
/// - `/api/v1/auth/{register,login,refresh,logout}` - public
/// - `/api/v1/auth/logout-all`, `/api/v1/me`, `/api/v1/users/:id` - bearer token required
/// - TraceLayer, 30 second timeout, HTTP metrics on every response
pub fn build_routes(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let public_routes = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/api/v1/auth/register", post(handlers::register))
        .route("/api/v1/auth/login", post(handlers::login))
        .route("/api/v1/auth/refresh", post(handlers::refresh))
        .route("/api/v1/auth/logout", post(handlers::logout))
        .with_state(state.clone());

    let metrics_routes = Router::new()
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(metrics_handle);

    let protected_routes = Router::new()
        .route("/api/v1/me", get(handlers::get_me))
        .route("/api/v1/auth/logout-all", post(handlers::logout_all))
        .route(
            "/api/v1/users/:id",
            get(handlers::get_user)
                .put(handlers::update_user)
                .delete(handlers::delete_user),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state);

    // Layer order (bottom-to-top execution):
    // 1. TimeoutLayer (innermost)
    // 2. TraceLayer
    // 3. http_metrics_middleware (outermost, sees framework rejections too)
    public_routes
        .merge(metrics_routes)
        .merge(protected_routes)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(middleware::from_fn(http_metrics_middleware))
}
