pub mod controller;
pub mod countdown;
pub mod scheduler;

pub use controller::{AttemptSession, SessionOutcome, SessionSettings, SessionState, Visibility};
pub use countdown::{Countdown, TimeLeft};
pub use scheduler::{Scheduler, TimerName};

#[cfg(test)]
mod tests;
