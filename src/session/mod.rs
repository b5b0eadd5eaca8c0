//! Study session timing.

pub mod clock;
pub mod timer;

pub use clock::{ManualClock, MonotonicClock, SystemClock};
pub use timer::{
    ActivityRef, PendingFlush, ProgressSink, SessionState, SessionSnapshot, SessionSummary,
    SessionTimer, TimerError,
};
