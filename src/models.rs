use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

/// One synthesized trip as the ingestion endpoint expects it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TelemetryPacket {
    #[serde(rename = "deviceId")]
    pub device_id: String,
    pub start_time: i64,
    pub end_time: i64,
    pub aggregated_data: AggregatedData,
    pub timed_data: TimedData,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregatedData {
    /// Meters traveled, rounded to 2 decimals
    pub distance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reading {
    pub speed: u32,
    pub rpm: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temp: Option<f64>,
}

/// Per-second readings keyed by custom-epoch timestamp
///
/// Serialized as a JSON object whose keys are the decimal timestamps, emitted
/// in the order the samples were pushed (increasing time).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimedData(Vec<(i64, Reading)>);

impl TimedData {
    pub fn with_capacity(capacity: usize) -> Self {
        TimedData(Vec::with_capacity(capacity))
    }

    pub fn push(&mut self, timestamp: i64, reading: Reading) {
        self.0.push((timestamp, reading));
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (i64, &Reading)> {
        self.0.iter().map(|(ts, reading)| (*ts, reading))
    }
}

impl Serialize for TimedData {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (timestamp, reading) in &self.0 {
            map.serialize_entry(&timestamp.to_string(), reading)?;
        }
        map.end()
    }
}

/// Body of the trip location patch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripLocations {
    pub start_location: String,
    pub end_location: String,
}

/// Interesting part of the telemetry POST response
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TelemetryAck {
    #[serde(rename = "tripId", default)]
    pub trip_id: Option<serde_json::Value>,
    #[serde(default)]
    pub id: Option<serde_json::Value>,
}

impl TelemetryAck {
    /// Trip identifier as a path segment, if the backend returned one
    ///
    /// Prefers `tripId` over `id`. Accepts both string and numeric identifiers.
    pub fn trip_id(&self) -> Option<String> {
        self.trip_id
            .as_ref()
            .and_then(id_segment)
            .or_else(|| self.id.as_ref().and_then(id_segment))
    }
}

fn id_segment(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
