//! HTTP trigger
//!
//! Each `GET /` runs one reconciliation pass and answers once it is done.
//! Passes triggered concurrently run one after the other.

use crate::cycle::CycleReport;
use crate::error::Result;
use async_trait::async_trait;
use axum::extract::State;
use axum::http::StatusCode;
use axum::{Router, routing::get};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tracing::{error, info};

/// Body of a successful trigger
pub const SCHEDULED: &str = "Scheduled.";

/// Something able to run a reconciliation pass
#[async_trait]
pub trait CycleRunner: Send + Sync {
    /// Run one pass
    async fn run_cycle(&self) -> Result<CycleReport>;
}

#[derive(Clone)]
struct AppState {
    runner: Arc<dyn CycleRunner>,
    running: Arc<Mutex<()>>,
}

async fn trigger(State(state): State<AppState>) -> (StatusCode, &'static str) {
    let _guard = state.running.lock().await;
    match state.runner.run_cycle().await {
        Ok(report) => {
            info!(
                processed = report.processed.len(),
                skipped = report.skipped.len(),
                failures = report.failures(),
                "cycle finished"
            );
            (StatusCode::OK, SCHEDULED)
        }
        Err(e) => {
            error!(error = %e, "cycle failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "Report error.")
        }
    }
}

/// Router serving the trigger; other methods on `/` get 405
pub fn router(runner: Arc<dyn CycleRunner>) -> Router {
    let state = AppState {
        runner,
        running: Arc::new(Mutex::new(())),
    };
    Router::new().route("/", get(trigger)).with_state(state)
}

/// Serve the trigger on `port` until the process stops
pub async fn serve(runner: Arc<dyn CycleRunner>, port: u16) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "listening");
    axum::serve(listener, router(runner)).await?;
    Ok(())
}
