pub mod config;
pub mod datasource;
pub mod error;
pub mod login;
pub mod response;
pub mod tenancy;
pub mod users;

use axum::routing::{get, post};
use axum::{middleware, Router};
use std::collections::HashMap;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use config::AppConfig;
use datasource::DataSourceRegistry;
use login::accounts::AccountStore;
use login::oauth2::OAuth2Client;
use login::session::SessionManager;
use tenancy::{MultiTenancyAction, StrategyRegistry};

/// Shared application state available to all request handlers.
pub struct AppState {
    pub tenancy: Arc<MultiTenancyAction>,
    pub datasources: DataSourceRegistry,
    pub accounts: AccountStore,
    pub session_manager: SessionManager,
    pub oauth2_clients: HashMap<String, OAuth2Client>,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        Self::with_registry(config, StrategyRegistry::with_defaults())
    }

    /// Build state around a caller-supplied strategy registry.
    pub fn with_registry(config: AppConfig, registry: StrategyRegistry) -> Self {
        let tenancy = MultiTenancyAction::new(
            Arc::new(registry),
            Some(config.tenancy.strategies.clone()),
        )
        .with_precedence(config.tenancy.precedence);

        let http_client = reqwest::Client::new();
        let oauth2_clients = config
            .oauth2_providers
            .iter()
            .map(|(name, provider)| {
                (
                    name.clone(),
                    OAuth2Client::new(name, provider.clone(), http_client.clone()),
                )
            })
            .collect();

        Self {
            tenancy: Arc::new(tenancy),
            datasources: DataSourceRegistry::from_names(&config.tenancy.datasources),
            accounts: AccountStore::new(),
            session_manager: SessionManager::new(&config.session),
            oauth2_clients,
        }
    }
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/users", get(users::find_users).post(users::create_user))
        .route("/users/:id", get(users::find_user))
        .route("/users/signup", post(login::handlers::signup))
        .route("/login", get(login::handlers::login_page))
        .route("/signup", get(login::handlers::signup_page))
        .route("/login_submit", post(login::handlers::login_submit))
        .route("/logout", get(login::handlers::logout))
        .route("/auth/account", get(login::handlers::account))
        .route(
            "/api/auth/thirdparty/:provider",
            get(login::handlers::thirdparty_login),
        )
        .route(
            "/api/auth/thirdparty/:provider/callback",
            get(login::handlers::thirdparty_callback),
        )
        .layer(middleware::from_fn_with_state(
            Arc::clone(&state.tenancy),
            tenancy::middleware::multi_tenancy,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
