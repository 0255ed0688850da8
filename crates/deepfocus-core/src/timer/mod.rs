mod clock;
mod engine;
mod phase;

pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::{now_ms, TimerEngine, TimerState, TimerStatus};
pub use phase::{Phase, PhaseDurations};
