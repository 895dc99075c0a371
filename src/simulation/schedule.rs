/// Trip start times for the two run modes
use rand::Rng;
use std::fmt;
use time::{Date, Duration, OffsetDateTime};

// Trips start between 06:00 and 22:59
const FIRST_TRIP_HOUR: i64 = 6;
const LAST_TRIP_HOUR: i64 = 22;
const TRIP_COUNT_SPREAD: i64 = 2;

#[derive(Debug, Clone, PartialEq)]
pub enum ScheduleError {
    /// The first backfill packet would start before the earliest representable date
    OutOfRange { total: u32, duration: u32 },
}

impl fmt::Display for ScheduleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScheduleError::OutOfRange { total, duration } => write!(
                f,
                "{} packets of {} s reach back further than supported dates",
                total, duration
            ),
        }
    }
}

impl std::error::Error for ScheduleError {}

/// Every calendar day from `start` to `end`, both inclusive
pub fn days_in_range(start: Date, end: Date) -> impl Iterator<Item = Date> {
    std::iter::successors(Some(start), |day| day.next_day()).take_while(move |day| *day <= end)
}

/// Number of days [`days_in_range`] yields
pub fn total_days(start: Date, end: Date) -> u32 {
    if end < start {
        return 0;
    }
    ((end - start).whole_days() + 1) as u32
}

/// Trips for one day, jittered around the configured average
///
/// Drawn uniformly from `trips_per_day ± 2`; anything below one means no trips.
pub fn trips_for_day<R: Rng>(rng: &mut R, trips_per_day: u32) -> u32 {
    let average = i64::from(trips_per_day);
    let drawn = rng.gen_range(average - TRIP_COUNT_SPREAD..=average + TRIP_COUNT_SPREAD);
    if drawn < 1 {
        0
    } else {
        u32::try_from(drawn).unwrap_or(u32::MAX)
    }
}

/// Random start times (UTC, whole minutes) for the trips of one day, in order
pub fn plan_day<R: Rng>(rng: &mut R, day: Date, trips_per_day: u32) -> Vec<OffsetDateTime> {
    let count = trips_for_day(rng, trips_per_day);
    let midnight = day.midnight().assume_utc();

    let mut starts: Vec<OffsetDateTime> = (0..count)
        .map(|_| {
            let hour = rng.gen_range(FIRST_TRIP_HOUR..=LAST_TRIP_HOUR);
            let minute = rng.gen_range(0..=59);
            midnight + Duration::hours(hour) + Duration::minutes(minute)
        })
        .collect();
    starts.sort();
    starts
}

/// Time covered by `total` back-to-back packets, if it fits a `Duration`
pub fn backfill_span(total: u32, duration: u32) -> Option<Duration> {
    i64::from(total)
        .checked_mul(i64::from(duration))
        .map(Duration::seconds)
}

/// Back-to-back packet start times ending at `now`
///
/// Packet `k` starts `(total - k) * duration` seconds before `now`, so the
/// oldest packet goes out first.
pub fn backfill_starts(
    now: OffsetDateTime,
    total: u32,
    duration: u32,
) -> Result<Vec<OffsetDateTime>, ScheduleError> {
    // Checking the oldest start covers every later one
    backfill_span(total, duration)
        .and_then(|span| now.checked_sub(span))
        .ok_or(ScheduleError::OutOfRange { total, duration })?;

    Ok((0..total)
        .map(|k| now - Duration::seconds(i64::from(total - k) * i64::from(duration)))
        .collect())
}
