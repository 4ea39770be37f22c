use anyhow::Result;
use capacity_dichotomy::{api, config::Config, controller::AppState, telemetry};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    telemetry::init_tracing();

    let cfg = Config::load()?;
    let app_state = AppState::new(cfg.clone())?;
    let app = api::router(app_state.clone());

    let addr = cfg.server.socket_addr()?;
    if cfg.server.host == "0.0.0.0" {
        warn!("server binding to 0.0.0.0, the API is reachable from the network");
    }
    info!(
        %addr,
        solver = %cfg.solver.mode,
        backend = app_state.service.evaluator_name(),
        "starting capacity dichotomy service"
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(telemetry::shutdown_signal())
        .await?;

    app_state.service.interrupt_all().await;
    warn!("shutdown complete");
    Ok(())
}
