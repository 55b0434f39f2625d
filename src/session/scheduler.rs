use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerName {
    Countdown,
    AwayFallback,
}

impl TimerName {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimerName::Countdown => "countdown",
            TimerName::AwayFallback => "away_fallback",
        }
    }
}

struct Armed {
    token: CancellationToken,
    generation: u64,
    repeating: bool,
}

/// Named timers running as tokio tasks. Fired timers queue up on a channel
/// and are handed out by [`Scheduler::next_fired`]; an event from a timer
/// that was cancelled or re-armed in the meantime is dropped there.
pub struct Scheduler {
    tx: mpsc::UnboundedSender<(TimerName, u64)>,
    rx: mpsc::UnboundedReceiver<(TimerName, u64)>,
    armed: HashMap<TimerName, Armed>,
    next_generation: u64,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx,
            armed: HashMap::new(),
            next_generation: 0,
        }
    }

    fn arm(&mut self, name: TimerName, repeating: bool) -> (CancellationToken, u64) {
        self.cancel(name);
        self.next_generation += 1;
        let token = CancellationToken::new();
        self.armed.insert(
            name,
            Armed {
                token: token.clone(),
                generation: self.next_generation,
                repeating,
            },
        );
        (token, self.next_generation)
    }

    /// Re-arming a name replaces the previous timer.
    pub fn schedule_once(&mut self, name: TimerName, after: Duration) {
        let (token, generation) = self.arm(name, false);
        let tx = self.tx.clone();
        debug!(timer = name.as_str(), after_ms = after.as_millis() as u64, "Timer armed");

        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = time::sleep(after) => {
                    let _ = tx.send((name, generation));
                }
            }
        });
    }

    /// First fires one `period` from now.
    pub fn schedule_repeating(&mut self, name: TimerName, period: Duration) {
        let period = period.max(Duration::from_millis(1));
        let (token, generation) = self.arm(name, true);
        let tx = self.tx.clone();
        debug!(timer = name.as_str(), period_ms = period.as_millis() as u64, "Repeating timer armed");

        tokio::spawn(async move {
            let mut ticks = time::interval_at(Instant::now() + period, period);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticks.tick() => {
                        if tx.send((name, generation)).is_err() {
                            break;
                        }
                    }
                }
            }
        });
    }

    pub fn cancel(&mut self, name: TimerName) -> bool {
        match self.armed.remove(&name) {
            Some(armed) => {
                armed.token.cancel();
                debug!(timer = name.as_str(), "Timer cancelled");
                true
            }
            None => false,
        }
    }

    pub fn cancel_all(&mut self) {
        for (_, armed) in self.armed.drain() {
            armed.token.cancel();
        }
    }

    pub fn is_armed(&self, name: TimerName) -> bool {
        self.armed.contains_key(&name)
    }

    /// Waits for the next live timer event. Pending forever when nothing is
    /// armed, so it is meant to sit in a `select!` next to other sources.
    pub async fn next_fired(&mut self) -> TimerName {
        loop {
            // The scheduler holds a sender, so the channel never closes.
            let Some((name, generation)) = self.rx.recv().await else {
                return std::future::pending().await;
            };
            match self.armed.get(&name) {
                Some(armed) if armed.generation == generation => {
                    if !armed.repeating {
                        self.armed.remove(&name);
                    }
                    return name;
                }
                _ => debug!(timer = name.as_str(), "Dropping stale timer event"),
            }
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
