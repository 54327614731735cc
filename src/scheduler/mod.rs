pub mod interval;
pub mod poll;

pub use interval::{countdown_percent, parse_interval, PollConfig, RefreshInterval};
pub use poll::{PollScheduler, SchedulerState, TimerEvent, Trigger};
