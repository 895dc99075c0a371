use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use time::macros::format_description;
use time::{Date, OffsetDateTime};
use url::Url;

use crate::simulation::{backfill_span, SynthesisParams};

const DEFAULT_START_DATE: &str = "2025-07-01";
const DEFAULT_END_DATE: &str = "2026-02-01";
const DEFAULT_TRIPS_PER_DAY: u32 = 0;
const DEFAULT_PACKET_DURATION: u32 = 60;
const DEFAULT_DEVICE_ID: &str = "default-device";
const DEFAULT_API_URL: &str = "http://localhost:8080/api/telemetry";
const DEFAULT_API_KEY: &str = "my-local-test-key";
const DEFAULT_REQUEST_DELAY_MS: u64 = 10;
// Backfill runs send longer packets at a gentler pace
const BACKFILL_PACKET_DURATION: u32 = 120;
const BACKFILL_REQUEST_DELAY_MS: u64 = 100;

#[derive(Debug, Clone, PartialEq)]
pub struct ConfigError {
    pub key: &'static str,
    pub value: String,
    pub reason: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}='{}': {}", self.key, self.value, self.reason)
    }
}

impl std::error::Error for ConfigError {}

/// How trip start times are chosen
#[derive(Debug, Clone, PartialEq)]
pub enum RunMode {
    /// A random number of trips on every day of an inclusive date range
    DateRange {
        start: Date,
        end: Date,
        trips_per_day: u32,
    },
    /// A fixed number of consecutive packets ending now
    Backfill { total_packets: u32 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiConfig {
    /// Telemetry ingestion endpoint
    pub api_url: Url,
    /// Root for the device and trip endpoints
    pub base_url: Url,
    pub api_key: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimulatorConfig {
    pub mode: RunMode,
    pub packet_duration: u32,
    pub device_id: String,
    pub device_name: Option<String>,
    pub api: ApiConfig,
    pub request_delay: Duration,
    pub patch_trip_locations: bool,
    pub seed: Option<u64>,
    pub synthesis: SynthesisParams,
}

impl SimulatorConfig {
    pub fn new() -> Result<Self, ConfigError> {
        // Load environment variables
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from any key/value source
    ///
    /// Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        // TOTAL_PACKETS switches to counting packets back from now
        let total_packets = parse_opt::<u32, _>(&read, "TOTAL_PACKETS")?;
        let (default_duration, default_delay_ms) = match total_packets {
            Some(_) => (BACKFILL_PACKET_DURATION, BACKFILL_REQUEST_DELAY_MS),
            None => (DEFAULT_PACKET_DURATION, DEFAULT_REQUEST_DELAY_MS),
        };

        let packet_duration = parse_or(&read, "PACKET_DURATION", default_duration)?;
        if packet_duration == 0 {
            return Err(ConfigError {
                key: "PACKET_DURATION",
                value: "0".into(),
                reason: "must be positive".into(),
            });
        }

        let mode = match total_packets {
            Some(total_packets) => {
                let reachable = backfill_span(total_packets, packet_duration)
                    .and_then(|span| OffsetDateTime::now_utc().checked_sub(span))
                    .is_some();
                if !reachable {
                    return Err(ConfigError {
                        key: "TOTAL_PACKETS",
                        value: total_packets.to_string(),
                        reason: format!(
                            "{} s packets would start before the earliest supported date",
                            packet_duration
                        ),
                    });
                }
                RunMode::Backfill { total_packets }
            }
            None => {
                let start = parse_date(&read, "START_DATE", DEFAULT_START_DATE)?;
                let end = parse_date(&read, "END_DATE", DEFAULT_END_DATE)?;
                if end < start {
                    return Err(ConfigError {
                        key: "END_DATE",
                        value: end.to_string(),
                        reason: format!("precedes START_DATE {}", start),
                    });
                }
                RunMode::DateRange {
                    start,
                    end,
                    trips_per_day: parse_or(&read, "TRIPS_PER_DAY", DEFAULT_TRIPS_PER_DAY)?,
                }
            }
        };

        let api_url_raw = read("API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let api_url = parse_url("API_URL", &api_url_raw)?;
        let base_url = match read("BASE_URL") {
            Some(raw) => parse_url("BASE_URL", &raw)?,
            None => origin_of(&api_url)?,
        };

        let mut synthesis = match mode {
            RunMode::DateRange { .. } => SynthesisParams::date_range(),
            RunMode::Backfill { .. } => SynthesisParams::backfill(),
        };
        if let Some(interval) = parse_opt::<u32, _>(&read, "TEMP_SAMPLE_INTERVAL")? {
            synthesis.temp_interval = interval;
        }
        synthesis.validate().map_err(|e| ConfigError {
            key: "TEMP_SAMPLE_INTERVAL",
            value: synthesis.temp_interval.to_string(),
            reason: e.to_string(),
        })?;

        Ok(SimulatorConfig {
            mode,
            packet_duration,
            device_id: read("DEVICE_ID").unwrap_or_else(|| DEFAULT_DEVICE_ID.to_string()),
            device_name: read("DEVICE_NAME"),
            api: ApiConfig {
                api_url,
                base_url,
                api_key: read("API_KEY").unwrap_or_else(|| DEFAULT_API_KEY.to_string()),
            },
            request_delay: Duration::from_millis(parse_or(
                &read,
                "REQUEST_DELAY_MS",
                default_delay_ms,
            )?),
            patch_trip_locations: parse_bool(&read, "PATCH_TRIP_LOCATIONS", true)?,
            seed: parse_opt(&read, "SIM_SEED")?,
            synthesis,
        })
    }
}

fn parse_opt<T, F>(read: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match read(key) {
        Some(raw) => raw.parse::<T>().map(Some).map_err(|e| ConfigError {
            key,
            value: raw.clone(),
            reason: e.to_string(),
        }),
        None => Ok(None),
    }
}

fn parse_or<T, F>(read: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    Ok(parse_opt(read, key)?.unwrap_or(default))
}

fn parse_bool<F>(read: &F, key: &'static str, default: bool) -> Result<bool, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = read(key) else {
        return Ok(default);
    };
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError {
            key,
            value: raw,
            reason: "expected true or false".into(),
        }),
    }
}

fn parse_date<F>(read: &F, key: &'static str, default: &str) -> Result<Date, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let raw = read(key).unwrap_or_else(|| default.to_string());
    Date::parse(&raw, format_description!("[year]-[month]-[day]")).map_err(|e| ConfigError {
        key,
        value: raw.clone(),
        reason: e.to_string(),
    })
}

fn parse_url(key: &'static str, raw: &str) -> Result<Url, ConfigError> {
    Url::parse(raw).map_err(|e| ConfigError {
        key,
        value: raw.to_string(),
        reason: e.to_string(),
    })
}

/// `scheme://host[:port]/` of the telemetry endpoint
fn origin_of(api_url: &Url) -> Result<Url, ConfigError> {
    if api_url.cannot_be_a_base() {
        return Err(ConfigError {
            key: "API_URL",
            value: api_url.to_string(),
            reason: "cannot derive BASE_URL from it".into(),
        });
    }
    let mut base = api_url.clone();
    base.set_path("/");
    base.set_query(None);
    base.set_fragment(None);
    Ok(base)
}
