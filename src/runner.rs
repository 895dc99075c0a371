/// Sequential driver: plan trips, synthesize packets, push them to the backend
use log::{debug, error, info, warn};
use rand::Rng;
use std::fmt;
use time::OffsetDateTime;
use tokio::time::sleep;

use crate::api::{pick_locations, ApiError, TelemetryClient};
use crate::config::{RunMode, SimulatorConfig};
use crate::models::TelemetryAck;
use crate::simulation::{
    backfill_starts, days_in_range, plan_day, total_days, PacketSynthesizer, ScheduleError,
    SynthesisError,
};
use crate::utils::{duration_to_seconds, format_datetime};

/// Conditions that stop a run; request failures never do
#[derive(Debug, Clone, PartialEq)]
pub enum RunError {
    Synthesis(SynthesisError),
    Schedule(ScheduleError),
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunError::Synthesis(e) => write!(f, "synthesis failed: {}", e),
            RunError::Schedule(e) => write!(f, "cannot plan trips: {}", e),
        }
    }
}

impl std::error::Error for RunError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RunError::Synthesis(e) => Some(e),
            RunError::Schedule(e) => Some(e),
        }
    }
}

impl From<SynthesisError> for RunError {
    fn from(e: SynthesisError) -> Self {
        RunError::Synthesis(e)
    }
}

impl From<ScheduleError> for RunError {
    fn from(e: ScheduleError) -> Self {
        RunError::Schedule(e)
    }
}

/// What a run achieved
#[derive(Debug, Default, Clone, PartialEq)]
pub struct RunSummary {
    pub packets_sent: u32,
    pub packets_failed: u32,
    pub device_named: bool,
    pub trips_patched: u32,
    pub patches_failed: u32,
    pub patches_skipped: u32,
}

impl RunSummary {
    pub fn packets_attempted(&self) -> u32 {
        self.packets_sent + self.packets_failed
    }
}

pub struct Runner<'a, R: Rng> {
    config: &'a SimulatorConfig,
    client: &'a TelemetryClient,
    synthesizer: &'a mut PacketSynthesizer<R>,
    summary: RunSummary,
}

impl<'a, R: Rng> Runner<'a, R> {
    pub fn new(
        config: &'a SimulatorConfig,
        client: &'a TelemetryClient,
        synthesizer: &'a mut PacketSynthesizer<R>,
    ) -> Self {
        Runner {
            config,
            client,
            synthesizer,
            summary: RunSummary::default(),
        }
    }

    /// Send every planned trip once, in order
    ///
    /// Request failures are logged and counted, never retried. Only a
    /// synthesis or scheduling error stops the run.
    pub async fn run(mut self) -> Result<RunSummary, RunError> {
        let started = OffsetDateTime::now_utc();
        info!(
            "Device: {} | Target: {}",
            self.config.device_id, self.config.api.api_url
        );

        match self.config.mode {
            RunMode::DateRange {
                start,
                end,
                trips_per_day,
            } => {
                info!(
                    "Range: {} to {} ({} days)",
                    start,
                    end,
                    total_days(start, end)
                );
                for day in days_in_range(start, end) {
                    let trips = plan_day(self.synthesizer.rng_mut(), day, trips_per_day);
                    info!("Processing {} ({} trips)", day, trips.len());
                    for trip_start in trips {
                        self.send_trip(trip_start).await?;
                    }
                }
            }
            RunMode::Backfill { total_packets } => {
                let starts = backfill_starts(
                    OffsetDateTime::now_utc(),
                    total_packets,
                    self.config.packet_duration,
                )?;
                for (i, trip_start) in starts.into_iter().enumerate() {
                    info!(
                        "[{}/{}] Sending packet (time: {})",
                        i + 1,
                        total_packets,
                        format_datetime(&trip_start)
                    );
                    self.send_trip(trip_start).await?;
                }
            }
        }

        let elapsed = duration_to_seconds(OffsetDateTime::now_utc() - started);
        info!(
            "Done in {} s: {} of {} packets accepted",
            elapsed,
            self.summary.packets_sent,
            self.summary.packets_attempted()
        );
        Ok(self.summary)
    }

    async fn send_trip(&mut self, trip_start: OffsetDateTime) -> Result<(), SynthesisError> {
        let packet = self.synthesizer.synthesize(
            trip_start,
            self.config.packet_duration,
            &self.config.device_id,
        )?;

        match self.client.post_packet(&packet).await {
            Ok(ack) => {
                self.summary.packets_sent += 1;
                debug!(
                    "Packet {} accepted ({} m)",
                    packet.start_time, packet.aggregated_data.distance
                );
                self.name_device_once().await;
                if self.config.patch_trip_locations {
                    self.patch_locations(&ack).await;
                }
            }
            Err(e) => {
                self.summary.packets_failed += 1;
                error!(
                    "Failed to send packet starting {}: {}",
                    format_datetime(&trip_start),
                    e
                );
            }
        }

        sleep(self.config.request_delay).await;
        Ok(())
    }

    /// Name the device after the first accepted packet; retried on the next one if it fails
    async fn name_device_once(&mut self) {
        if self.summary.device_named {
            return;
        }
        let Some(name) = self.config.device_name.as_deref() else {
            return;
        };

        match self.client.set_device_name(name).await {
            Ok(()) => {
                self.summary.device_named = true;
                info!("Device {} named '{}'", self.config.device_id, name);
            }
            Err(e) => warn!("Failed to name device {}: {}", self.config.device_id, e),
        }
    }

    async fn patch_locations(&mut self, ack: &TelemetryAck) {
        let trip_id = match ack.trip_id().ok_or(ApiError::MissingTripId) {
            Ok(id) => id,
            Err(e) => {
                self.summary.patches_skipped += 1;
                warn!("Skipping location patch: {}", e);
                return;
            }
        };

        let locations = pick_locations(self.synthesizer.rng_mut());
        match self
            .client
            .patch_trip_locations(&trip_id, &locations)
            .await
        {
            Ok(()) => {
                self.summary.trips_patched += 1;
                debug!(
                    "Trip {}: {} -> {}",
                    trip_id, locations.start_location, locations.end_location
                );
            }
            Err(e) => {
                self.summary.patches_failed += 1;
                error!("Failed to patch trip {}: {}", trip_id, e);
            }
        }
    }
}

/// Build the client and synthesizer for `config` and run to completion
pub async fn run(config: &SimulatorConfig) -> Result<RunSummary, Box<dyn std::error::Error>> {
    let client = TelemetryClient::new(&config.api, &config.device_id)?;
    let mut synthesizer = PacketSynthesizer::from_seed(config.synthesis.clone(), config.seed)?;
    if let Some(seed) = config.seed {
        info!("Using random seed {}", seed);
    }
    let summary = Runner::new(config, &client, &mut synthesizer).run().await?;
    Ok(summary)
}
