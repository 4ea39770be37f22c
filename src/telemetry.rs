use std::fmt::Display;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{filter::filter_fn, layer::SubscriberExt, util::SubscriberInitExt, Layer};
use uuid::Uuid;

/// Target of business events: run lifecycle, evaluated probes, final value
pub const BUSINESS_TARGET: &str = "capacity::business";
/// Target of technical warnings raised around solver calls
pub const TECHNICAL_TARGET: &str = "capacity::technical";

/// Two JSON sinks: business events on one layer, everything else on the other.
pub fn init_tracing() {
    let business = tracing_subscriber::fmt::layer()
        .json()
        .with_current_span(false)
        .with_filter(filter_fn(|metadata| metadata.target() == BUSINESS_TARGET));

    let technical = tracing_subscriber::fmt::layer()
        .json()
        .with_filter(filter_fn(|metadata| metadata.target() != BUSINESS_TARGET));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "info,hyper=warn,reqwest=warn,tower_http=info".into()
            }),
        )
        .with(business)
        .with(technical)
        .init();
}

/// Business log handle of one capacity run
#[derive(Debug, Clone, Copy)]
pub struct BusinessLog {
    run_id: Uuid,
}

impl BusinessLog {
    pub fn new(run_id: Uuid) -> Self {
        Self { run_id }
    }

    /// Handle for runs that were not submitted through the service
    pub fn detached() -> Self {
        Self { run_id: Uuid::nil() }
    }

    pub fn info(&self, message: impl Display) {
        tracing::info!(target: BUSINESS_TARGET, run_id = %self.run_id, "{message}");
    }

    pub fn warn(&self, message: impl Display) {
        tracing::warn!(target: BUSINESS_TARGET, run_id = %self.run_id, "{message}");
    }

    pub fn error(&self, message: impl Display) {
        tracing::error!(target: BUSINESS_TARGET, run_id = %self.run_id, "{message}");
    }
}

/// Channel that only accepts warnings
pub trait WarnOnly: Send + Sync {
    fn warn(&self, message: &str);
}

/// Technical warnings, e.g. solver timeouts and transport errors
#[derive(Debug, Clone, Copy, Default)]
pub struct TechnicalWarnings;

impl WarnOnly for TechnicalWarnings {
    fn warn(&self, message: &str) {
        tracing::warn!(target: TECHNICAL_TARGET, "{message}");
    }
}

pub async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler")
            .recv()
            .await;
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! { _ = ctrl_c => {}, _ = terminate => {}, }
    info!("shutdown signal received");
}
