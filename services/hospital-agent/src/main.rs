//! Triage Hospital Agent
//!
//! Runs one simulated hospital against the world model: registers, then
//! polls snapshots, admits injured persons and reports their outcomes until
//! interrupted.

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use triage_hospital_agent::backoff::BackoffPolicy;
use triage_hospital_agent::random::{RandomSource, StdRandom};
use triage_hospital_agent::registration::{register_until_success, registration_request};
use triage_hospital_agent::roster::DoctorRoster;
use triage_hospital_agent::{Config, Facility, WorldModelClient, WorldModelGateway};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first so its log level can seed the filter
    let config = Config::from_env()?;

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| config.log_level.as_str().into()))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("Starting triage hospital agent");
    info!(
        world_model_url = %config.world_model_url,
        facility_name = %config.facility_name,
        max_capacity = config.max_capacity,
        death_rate = config.death_rate,
        "Configuration loaded"
    );

    // Create shutdown channel
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    tokio::spawn({
        let shutdown_tx = shutdown_tx.clone();
        async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => info!("Received shutdown signal"),
                Err(e) => warn!(error = %e, "Failed to listen for shutdown signal"),
            }
            let _ = shutdown_tx.send(true);
        }
    });

    let roster = Arc::new(DoctorRoster::seeded());
    let gateway: Arc<dyn WorldModelGateway> = Arc::new(WorldModelClient::new(&config));

    let request = registration_request(&config.facility_name, config.max_capacity, &roster);
    let backoff = BackoffPolicy::starting_at(config.registration_retry);
    let Some(registration) =
        register_until_success(gateway.as_ref(), &request, &backoff, &mut shutdown_rx).await
    else {
        info!("Shut down before registration completed");
        return Ok(());
    };

    let rng: Box<dyn RandomSource> = match config.rng_seed {
        Some(seed) => {
            info!(seed, "Using seeded random source");
            Box::new(StdRandom::seeded(seed))
        }
        None => Box::new(StdRandom::from_os()),
    };

    let facility = Facility::new(&config, &registration, roster, gateway, rng);
    let mut handle = facility.start(shutdown_rx.clone());

    // Wait for shutdown signal or an unexpected loop exit
    tokio::select! {
        _ = shutdown_rx.wait_for(|stop| *stop) => {}
        _ = handle.wait_any() => {
            warn!("Facility loop exited unexpectedly");
        }
    }

    // Signal shutdown to all workers
    let _ = shutdown_tx.send(true);

    info!("Waiting for workers to shut down...");
    let abandoned = handle.ledger().in_progress().await;
    if !abandoned.is_empty() {
        warn!(count = abandoned.len(), persons = ?abandoned, "Patients still in treatment at shutdown");
    }
    handle.stop().await;

    info!("Hospital agent shutdown complete");
    Ok(())
}
