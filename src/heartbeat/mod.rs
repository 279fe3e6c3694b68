//! The heartbeat scheduler: a pure timing oracle (`clock`) plus the
//! self-rescheduling scheduler task (`task`) built on top of it.

pub mod clock;
pub mod task;

pub use self::clock::{Clock, HeartbeatClock, SystemClock};
pub use self::task::HeartbeatTask;
