/// Synthesis of per-second vehicle telemetry for a single trip
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fmt;
use std::ops::RangeInclusive;
use time::OffsetDateTime;

use crate::models::{AggregatedData, Reading, TelemetryPacket, TimedData};
use crate::utils::{round_to, to_custom_timestamp};

const KMH_PER_MS: f64 = 3.6;

#[derive(Debug, Clone, PartialEq)]
pub enum SynthesisError {
    InvalidDuration(u32),
    InvalidParams(String),
}

impl fmt::Display for SynthesisError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SynthesisError::InvalidDuration(d) => {
                write!(f, "packet duration must be positive, got {}", d)
            }
            SynthesisError::InvalidParams(msg) => write!(f, "invalid synthesis parameters: {}", msg),
        }
    }
}

impl std::error::Error for SynthesisError {}

/// RPM derived from speed: `base + speed * slope + jitter`
#[derive(Debug, Clone, PartialEq)]
pub struct RpmModel {
    pub base: f64,
    pub slope: f64,
    /// Uniform integer noise in `[-jitter, jitter]`
    pub jitter: i32,
}

/// Tunables of the three-phase speed model and the sensors hanging off it
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisParams {
    /// Ticks `i < accel_ticks` accelerate
    pub accel_ticks: u32,
    /// Ticks `i > duration - decel_ticks` decelerate
    pub decel_ticks: u32,
    /// Per-tick speed change (km/h) while accelerating or decelerating
    pub accel_step: RangeInclusive<f64>,
    /// Cruise noise is drawn from `[-cruise_jitter, cruise_jitter]`
    pub cruise_jitter: f64,
    /// Upper speed clamp; `None` only floors at zero
    pub max_speed: Option<f64>,
    /// Starting speed is a whole km/h in `[0, initial_speed_max]`
    pub initial_speed_max: u32,
    pub rpm: RpmModel,
    /// Temperature is sampled on ticks where `i % temp_interval == 0`
    pub temp_interval: u32,
    pub temp_base: f64,
    pub temp_spread: f64,
    pub temp_step: RangeInclusive<f64>,
}

impl SynthesisParams {
    /// Day-by-day history generation: bounded speed, 10 s temperature sensor
    pub fn date_range() -> Self {
        SynthesisParams {
            accel_ticks: 15,
            decel_ticks: 15,
            accel_step: 1.0..=3.0,
            cruise_jitter: 2.0,
            max_speed: Some(180.0),
            initial_speed_max: 40,
            rpm: RpmModel {
                base: 800.0,
                slope: 45.0,
                jitter: 50,
            },
            temp_interval: 10,
            temp_base: 80.0,
            temp_spread: 5.0,
            temp_step: -0.2..=0.3,
        }
    }

    /// Packets counted back from now: constant acceleration, 5 s temperature sensor
    pub fn backfill() -> Self {
        SynthesisParams {
            accel_ticks: 10,
            decel_ticks: 10,
            accel_step: 2.0..=2.0,
            cruise_jitter: 1.0,
            max_speed: None,
            initial_speed_max: 30,
            rpm: RpmModel {
                base: 1000.0,
                slope: 40.0,
                jitter: 50,
            },
            temp_interval: 5,
            temp_base: 85.0,
            temp_spread: 0.0,
            temp_step: -0.1..=0.1,
        }
    }

    pub fn validate(&self) -> Result<(), SynthesisError> {
        if self.temp_interval == 0 {
            return Err(SynthesisError::InvalidParams(
                "temp_interval must be positive".into(),
            ));
        }
        if self.accel_step.start() > self.accel_step.end() || *self.accel_step.start() < 0.0 {
            return Err(SynthesisError::InvalidParams(format!(
                "accel_step must be a non-negative range, got {:?}",
                self.accel_step
            )));
        }
        if self.temp_step.start() > self.temp_step.end() {
            return Err(SynthesisError::InvalidParams(format!(
                "temp_step is inverted: {:?}",
                self.temp_step
            )));
        }
        if self.cruise_jitter < 0.0 || self.temp_spread < 0.0 {
            return Err(SynthesisError::InvalidParams(
                "jitter and spread must not be negative".into(),
            ));
        }
        if self.rpm.jitter < 0 {
            return Err(SynthesisError::InvalidParams(
                "rpm jitter must not be negative".into(),
            ));
        }
        if matches!(self.max_speed, Some(max) if max < 0.0) {
            return Err(SynthesisError::InvalidParams(
                "max_speed must not be negative".into(),
            ));
        }
        Ok(())
    }
}

impl Default for SynthesisParams {
    fn default() -> Self {
        SynthesisParams::date_range()
    }
}

/// Builds telemetry packets from a random source
pub struct PacketSynthesizer<R = StdRng> {
    params: SynthesisParams,
    rng: R,
}

impl PacketSynthesizer<StdRng> {
    /// Seeded when `seed` is given, otherwise drawn from OS entropy
    pub fn from_seed(params: SynthesisParams, seed: Option<u64>) -> Result<Self, SynthesisError> {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        PacketSynthesizer::new(params, rng)
    }
}

impl<R: Rng> PacketSynthesizer<R> {
    pub fn new(params: SynthesisParams, rng: R) -> Result<Self, SynthesisError> {
        params.validate()?;
        Ok(PacketSynthesizer { params, rng })
    }

    /// Random source handle, shared with trip scheduling
    pub fn rng_mut(&mut self) -> &mut R {
        &mut self.rng
    }

    /// Synthesize one packet of `duration` seconds starting at `start`
    pub fn synthesize(
        &mut self,
        start: OffsetDateTime,
        duration: u32,
        device_id: &str,
    ) -> Result<TelemetryPacket, SynthesisError> {
        if duration == 0 {
            return Err(SynthesisError::InvalidDuration(duration));
        }

        let p = &self.params;
        let rng = &mut self.rng;

        let start_time = to_custom_timestamp(start);
        let end_time = start_time + i64::from(duration);

        let mut timed_data = TimedData::with_capacity(duration as usize);
        let mut distance = 0.0;

        let mut speed = f64::from(rng.gen_range(0..=p.initial_speed_max));
        let mut temp = p.temp_base + rng.gen_range(-p.temp_spread..=p.temp_spread);

        for i in 0..duration {
            // Phase boundaries; deceleration wins only once acceleration is over
            if i < p.accel_ticks {
                speed += rng.gen_range(p.accel_step.clone());
            } else if i64::from(i) > i64::from(duration) - i64::from(p.decel_ticks) {
                speed -= rng.gen_range(p.accel_step.clone());
            } else {
                speed += rng.gen_range(-p.cruise_jitter..=p.cruise_jitter);
            }

            speed = speed.max(0.0);
            if let Some(max) = p.max_speed {
                speed = speed.min(max);
            }

            let jitter = rng.gen_range(-p.rpm.jitter..=p.rpm.jitter);
            let rpm = (p.rpm.base + speed * p.rpm.slope + f64::from(jitter)).max(0.0);

            distance += speed / KMH_PER_MS;

            let temp_sample = if i % p.temp_interval == 0 {
                temp += rng.gen_range(p.temp_step.clone());
                Some(round_to(temp, 1))
            } else {
                None
            };

            timed_data.push(
                start_time + i64::from(i),
                Reading {
                    speed: speed as u32,
                    rpm: rpm as u32,
                    temp: temp_sample,
                },
            );
        }

        Ok(TelemetryPacket {
            device_id: device_id.to_string(),
            start_time,
            end_time,
            aggregated_data: AggregatedData {
                distance: round_to(distance, 2),
            },
            timed_data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn seeded(params: SynthesisParams, seed: u64) -> PacketSynthesizer {
        PacketSynthesizer::from_seed(params, Some(seed)).unwrap()
    }

    #[test]
    fn one_minute_trip_at_epoch() {
        let mut synth = seeded(SynthesisParams::date_range(), 7);
        let packet = synth
            .synthesize(datetime!(2000-01-01 0:00 UTC), 60, "car-1")
            .unwrap();

        assert_eq!(packet.device_id, "car-1");
        assert_eq!(packet.start_time, 0);
        assert_eq!(packet.end_time, 60);
        assert_eq!(packet.timed_data.len(), 60);
        assert!(packet.aggregated_data.distance > 0.0);
        assert!(packet.aggregated_data.distance <= 180.0 / 3.6 * 60.0);
    }

    #[test]
    fn timestamps_are_consecutive_seconds() {
        let mut synth = seeded(SynthesisParams::date_range(), 1);
        let start = datetime!(2025-07-01 08:15 UTC);
        let packet = synth.synthesize(start, 120, "car-1").unwrap();

        let keys: Vec<i64> = packet.timed_data.iter().map(|(ts, _)| ts).collect();
        let expected: Vec<i64> = (packet.start_time..packet.start_time + 120).collect();
        assert_eq!(keys, expected);
        assert_eq!(packet.end_time, packet.start_time + 120);
    }

    #[test]
    fn speed_stays_within_bounds() {
        for seed in 0..20 {
            let mut synth = seeded(SynthesisParams::date_range(), seed);
            let packet = synth
                .synthesize(datetime!(2025-01-01 12:00 UTC), 600, "car-1")
                .unwrap();
            assert!(packet.timed_data.iter().all(|(_, r)| r.speed <= 180));
        }
    }

    #[test]
    fn speed_clamps_at_max() {
        let params = SynthesisParams {
            accel_ticks: 1_000,
            accel_step: 5.0..=5.0,
            ..SynthesisParams::date_range()
        };
        let mut synth = seeded(params, 3);
        let packet = synth
            .synthesize(datetime!(2025-01-01 12:00 UTC), 100, "car-1")
            .unwrap();
        let last = packet.timed_data.iter().last().unwrap().1;
        assert_eq!(last.speed, 180);
    }

    #[test]
    fn backfill_preset_is_unbounded() {
        let params = SynthesisParams {
            accel_ticks: 1_000,
            ..SynthesisParams::backfill()
        };
        let mut synth = seeded(params, 3);
        let packet = synth
            .synthesize(datetime!(2025-01-01 12:00 UTC), 200, "car-1")
            .unwrap();
        // Constant +2 km/h for 200 ticks from at most 30 km/h
        let last = packet.timed_data.iter().last().unwrap().1;
        assert!(last.speed >= 400);
    }

    #[test]
    fn distance_integrates_speed() {
        let mut synth = seeded(SynthesisParams::date_range(), 11);
        let packet = synth
            .synthesize(datetime!(2025-03-01 09:00 UTC), 300, "car-1")
            .unwrap();

        // Reported speeds are truncated, so each tick contributes at most 1 km/h more
        let floor: f64 = packet
            .timed_data
            .iter()
            .map(|(_, r)| f64::from(r.speed) / 3.6)
            .sum();
        let ceil = floor + packet.timed_data.len() as f64 / 3.6;
        let distance = packet.aggregated_data.distance;
        assert!(distance >= floor - 0.01, "{} < {}", distance, floor);
        assert!(distance <= ceil + 0.01, "{} > {}", distance, ceil);
        assert_eq!(distance, round_to(distance, 2));
    }

    #[test]
    fn distance_is_exact_for_integral_speeds() {
        let params = SynthesisParams {
            initial_speed_max: 0,
            accel_step: 2.0..=2.0,
            cruise_jitter: 0.0,
            ..SynthesisParams::backfill()
        };
        let mut synth = seeded(params, 5);
        let packet = synth
            .synthesize(datetime!(2025-03-01 09:00 UTC), 60, "car-1")
            .unwrap();
        let expected: f64 = packet
            .timed_data
            .iter()
            .map(|(_, r)| f64::from(r.speed) / 3.6)
            .sum();
        assert!((packet.aggregated_data.distance - round_to(expected, 2)).abs() < 1e-9);
    }

    #[test]
    fn initial_speed_is_whole() {
        // No phase changes, so every tick keeps the starting speed
        let params = SynthesisParams {
            accel_ticks: 0,
            decel_ticks: 0,
            accel_step: 0.0..=0.0,
            cruise_jitter: 0.0,
            ..SynthesisParams::date_range()
        };
        let mut synth = seeded(params, 13);
        for _ in 0..200 {
            let packet = synth
                .synthesize(datetime!(2025-03-01 09:00 UTC), 36, "car-1")
                .unwrap();
            let speed = packet.timed_data.iter().next().unwrap().1.speed;
            assert!(speed <= 40);
            assert!(packet.timed_data.iter().all(|(_, r)| r.speed == speed));
            // 36 s at v km/h covers exactly 10 * v metres
            let expected = f64::from(speed) * 10.0;
            assert!(
                (packet.aggregated_data.distance - expected).abs() < 1e-6,
                "{} m at {} km/h",
                packet.aggregated_data.distance,
                speed
            );
        }
    }

    fn speeds(packet: &TelemetryPacket) -> Vec<u32> {
        packet.timed_data.iter().map(|(_, r)| r.speed).collect()
    }

    #[test]
    fn speed_follows_accelerate_cruise_decelerate() {
        let params = SynthesisParams {
            cruise_jitter: 0.0,
            ..SynthesisParams::date_range()
        };
        for seed in 0..20 {
            let mut synth = seeded(params.clone(), seed);
            let packet = synth
                .synthesize(datetime!(2025-03-01 09:00 UTC), 60, "car-1")
                .unwrap();
            let v = speeds(&packet);

            // At least +1 km/h per tick and never near the 180 clamp
            for i in 1..15 {
                assert!(v[i] > v[i - 1], "seed {} tick {}: {:?}", seed, i, v);
            }
            // Cruise holds the speed reached on the last accelerating tick
            for i in 15..=45 {
                assert_eq!(v[i], v[14], "seed {} tick {}: {:?}", seed, i, v);
            }
            for i in 46..60 {
                assert!(v[i] <= v[i - 1], "seed {} tick {}: {:?}", seed, i, v);
                if v[i - 1] >= 1 {
                    assert!(v[i] < v[i - 1], "seed {} tick {}: {:?}", seed, i, v);
                }
            }
        }
    }

    #[test]
    fn acceleration_wins_on_short_trips() {
        let params = SynthesisParams {
            cruise_jitter: 0.0,
            ..SynthesisParams::date_range()
        };
        for seed in 0..20 {
            let mut synth = seeded(params.clone(), seed);
            let packet = synth
                .synthesize(datetime!(2025-03-01 09:00 UTC), 20, "car-1")
                .unwrap();
            let v = speeds(&packet);

            // Ticks 6..15 fall in both windows and still accelerate
            for i in 1..15 {
                assert!(v[i] > v[i - 1], "seed {} tick {}: {:?}", seed, i, v);
            }
            for i in 15..20 {
                assert!(v[i] < v[i - 1], "seed {} tick {}: {:?}", seed, i, v);
            }
        }
    }

    #[test]
    fn temperature_is_sparse() {
        for (params, interval) in [
            (SynthesisParams::date_range(), 10),
            (SynthesisParams::backfill(), 5),
        ] {
            let mut synth = seeded(params, 9);
            let packet = synth
                .synthesize(datetime!(2025-03-01 09:00 UTC), 120, "car-1")
                .unwrap();
            for (i, (_, reading)) in packet.timed_data.iter().enumerate() {
                assert_eq!(reading.temp.is_some(), i % interval == 0, "tick {}", i);
            }
        }
    }

    #[test]
    fn temperature_starts_near_base() {
        let mut synth = seeded(SynthesisParams::date_range(), 21);
        let packet = synth
            .synthesize(datetime!(2025-03-01 09:00 UTC), 10, "car-1")
            .unwrap();
        let first = packet.timed_data.iter().next().unwrap().1.temp.unwrap();
        assert!((74.7..=85.4).contains(&first), "{}", first);
    }

    #[test]
    fn rpm_tracks_speed() {
        let params = SynthesisParams::date_range();
        let mut synth = seeded(params.clone(), 4);
        let packet = synth
            .synthesize(datetime!(2025-03-01 09:00 UTC), 300, "car-1")
            .unwrap();
        for (_, r) in packet.timed_data.iter() {
            // Speed is truncated before we see it, so allow one slope of slack
            let low = params.rpm.base + f64::from(r.speed) * params.rpm.slope
                - f64::from(params.rpm.jitter)
                - 1.0;
            let high = params.rpm.base
                + f64::from(r.speed + 1) * params.rpm.slope
                + f64::from(params.rpm.jitter);
            let rpm = f64::from(r.rpm);
            assert!(rpm >= low && rpm <= high, "rpm {} for speed {}", rpm, r.speed);
        }
    }

    #[test]
    fn same_seed_same_packet() {
        let start = datetime!(2025-03-01 09:00 UTC);
        let a = seeded(SynthesisParams::date_range(), 42)
            .synthesize(start, 90, "car-1")
            .unwrap();
        let b = seeded(SynthesisParams::date_range(), 42)
            .synthesize(start, 90, "car-1")
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn short_trips_still_produce_every_tick() {
        let mut synth = seeded(SynthesisParams::date_range(), 2);
        let packet = synth
            .synthesize(datetime!(2025-03-01 09:00 UTC), 1, "car-1")
            .unwrap();
        assert_eq!(packet.timed_data.len(), 1);
        assert_eq!(packet.end_time, packet.start_time + 1);
    }

    #[test]
    fn zero_duration_is_rejected() {
        let mut synth = seeded(SynthesisParams::date_range(), 2);
        let err = synth
            .synthesize(datetime!(2025-03-01 09:00 UTC), 0, "car-1")
            .unwrap_err();
        assert_eq!(err, SynthesisError::InvalidDuration(0));
    }

    #[test]
    fn invalid_params_are_rejected() {
        let params = SynthesisParams {
            temp_interval: 0,
            ..SynthesisParams::date_range()
        };
        assert!(matches!(
            PacketSynthesizer::from_seed(params, Some(1)),
            Err(SynthesisError::InvalidParams(_))
        ));

        #[allow(clippy::reversed_empty_ranges)]
        let params = SynthesisParams {
            accel_step: 3.0..=1.0,
            ..SynthesisParams::date_range()
        };
        assert!(PacketSynthesizer::from_seed(params, Some(1)).is_err());
    }
}
