//! Runs a small supervised application until interrupted.
//!
//! ```text
//! APP_NAME=ticker APP_VERSION=0.1.0 cargo run -p bedrock-app --example basic_service
//! ```
//!
//! Send `SIGUSR1` to toggle debug logging, `SIGHUP` to log a status line, and `SIGINT` or `SIGTERM` to shut down.

use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use async_trait::async_trait;
use bedrock_app::prelude::*;
use bedrock_config::Environ;
use bedrock_core::runtime::{ServiceContext, Serviceable, TaskGroup};
use bedrock_error::{ErrorContext as _, GenericError};
use tokio::select;
use tracing::{debug, info};

/// Counts ticks in the background.
struct Ticker {
    interval: Duration,
    ticks: Arc<AtomicU64>,
}

#[async_trait]
impl Serviceable for Ticker {
    fn name(&self) -> &str {
        "ticker"
    }

    async fn start(&self, ctx: &ServiceContext, tasks: &TaskGroup) -> Result<(), GenericError> {
        let ctx = ctx.clone();
        let interval = self.interval;
        let ticks = Arc::clone(&self.ticks);

        tasks.spawn("ticker", async move {
            let mut timer = tokio::time::interval(interval);
            loop {
                select! {
                    _ = ctx.cancelled() => return Ok(()),
                    _ = timer.tick() => {
                        let tick = ticks.fetch_add(1, Ordering::Relaxed) + 1;
                        debug!(tick, "Tick.");
                    }
                }
            }
        });

        Ok(())
    }

    async fn stop(&self) -> Result<(), GenericError> {
        info!(ticks = self.ticks.load(Ordering::Relaxed), "Ticker stopped.");
        Ok(())
    }

    fn stop_timeout(&self) -> Duration {
        Duration::from_secs(1)
    }
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        fatal_and_exit(format!("{:#}", e));
    }
}

async fn run() -> Result<(), GenericError> {
    let env = match std::env::var("ENV_DIR") {
        Ok(dir) => Environ::load(dir)?,
        Err(_) => Environ::from_process(),
    };

    let app_details = AppDetails::from_environ(&env)?;
    let logging_config = LoggingConfiguration::from_environ(&env)?;
    let logging_guard =
        initialize_logging(&logging_config, &app_details).error_context("Failed to initialize logging.")?;

    if let Some(pid_file) = update_pid_file(&env)? {
        info!(pid_file = %pid_file.display(), "Wrote PID file.");
    }

    let logger = Logger::root(&app_details, logging_guard.verbosity().clone());
    let ticks = Arc::new(AtomicU64::new(0));

    let status_ticks = Arc::clone(&ticks);
    let supervisor = Supervisor::builder(logger)
        .with_service(Ticker {
            interval: Duration::from_millis(500),
            ticks,
        })
        .with_signal_handler(Signal::Hangup, move |logger| {
            info!(
                ticks = status_ticks.load(Ordering::Relaxed),
                verbosity = %logger.verbosity().current(),
                "Status requested."
            );
        })
        .build()?;

    info!(app_name = app_details.name(), app_version = app_details.version(), "Application starting.");
    supervisor.run().await?;

    Ok(())
}
