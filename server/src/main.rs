use auth_gateway::{
    routes,
    server::run_server,
    setup::{setup_sentry, setup_tracing},
    state::{AppState, GatewayConfig},
};
use tracing::info;

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    // Initialize Sentry for error tracking
    let _sentry_guard = setup_sentry();

    // Create and run the tokio runtime
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(4)
        .enable_all()
        .build()?
        .block_on(async { run_application().await })
}

async fn run_application() -> color_eyre::Result<()> {
    setup_tracing("auth_gateway")?;

    println!("\n========== 🔑 AUTH GATEWAY STARTING ==========");

    // Fail fast on missing or invalid configuration
    let config = GatewayConfig::from_env()?;
    info!(
        issuer = %config.oidc.issuer,
        client_id = %config.oidc.client_id,
        redirect_uri = %config.oidc.redirect_uri,
        "Loaded identity provider configuration"
    );

    let app_state = AppState::from_config(&config)?;

    run_server(config.server.clone(), routes::routes(app_state)).await
}
