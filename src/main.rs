use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

use tenancy_gateway::config::AppConfig;
use tenancy_gateway::{build_router, AppState};

/// Multi-tenant demo server with local and OAuth2 login
#[derive(Parser)]
#[command(name = "tenancy-gateway", about = "Tenant resolution and social login server")]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, env = "CONFIG_PATH", default_value = "tenancy.yaml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tenancy_gateway=info,tower_http=info".into()),
        )
        .init();

    let cli = Cli::parse();

    let config = AppConfig::load(&cli.config).unwrap_or_else(|e| {
        eprintln!("Failed to load config from {:?}: {}", cli.config, e);
        std::process::exit(1);
    });

    tracing::info!("Tenancy gateway starting");
    tracing::info!("  Listen:      {}", config.server.listen);
    tracing::info!(
        "  Strategies:  {:?} ({:?})",
        config.tenancy.strategies,
        config.tenancy.precedence
    );
    tracing::info!("  Datasources: {:?}", config.tenancy.datasources);
    tracing::info!("  Providers:   {:?}", config.oauth2_providers.keys().collect::<Vec<_>>());

    let listen_addr = config.server.listen.clone();
    let state = Arc::new(AppState::new(config));

    // Start background session cleanup (every 5 minutes)
    state.session_manager.start_cleanup_task(300);

    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&listen_addr)
        .await
        .unwrap_or_else(|e| {
            eprintln!("Failed to bind to {}: {}", listen_addr, e);
            std::process::exit(1);
        });

    tracing::info!("Tenancy gateway listening on {}", listen_addr);

    axum::serve(listener, app).await.unwrap_or_else(|e| {
        eprintln!("Server error: {}", e);
        std::process::exit(1);
    });
}
