use log::{error, info, warn};

use telemetry_sim::config::SimulatorConfig;
use telemetry_sim::runner::{run, RunSummary};

fn report(summary: &RunSummary) {
    info!("Packets sent: {}", summary.packets_sent);
    if summary.packets_failed > 0 {
        warn!("Packets failed: {}", summary.packets_failed);
    }
    info!("Device named: {}", summary.device_named);
    info!(
        "Trips patched: {} (failed {}, skipped {})",
        summary.trips_patched, summary.patches_failed, summary.patches_skipped
    );
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .format_timestamp_secs()
        .init();

    // Load configuration
    let config = match SimulatorConfig::new() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    // Handle Ctrl+C gracefully
    let (tx, mut rx) = tokio::sync::oneshot::channel();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            // Keep the sender alive so the run is not mistaken for a shutdown
            std::future::pending::<()>().await;
        }
        let _ = tx.send(());
    });

    info!("--- Generating Data ---");

    // Run the simulation or wait for shutdown signal
    tokio::select! {
        result = run(&config) => {
            match result {
                Ok(summary) => report(&summary),
                Err(e) => error!("Fatal error: {}", e),
            }
        }
        _ = &mut rx => {
            info!("Program terminated by user. Exiting gracefully.");
        }
    }

    info!("--- Done ---");
    Ok(())
}
