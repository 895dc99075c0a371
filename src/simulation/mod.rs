pub mod schedule;
pub mod synthesizer;

pub use schedule::{backfill_span, backfill_starts, days_in_range, plan_day, total_days, ScheduleError};
pub use synthesizer::{PacketSynthesizer, RpmModel, SynthesisError, SynthesisParams};
