//! Periodic timers that feed ticks into a service queue
//!
//! A running timer is a spawned task holding a clone of the service's sender and a
//! cancellation token. Start and stop are idempotent, and dropping the timer stops
//! it, so a service that is torn down never leaves a ticking task behind.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

pub struct PeriodicTimer {
    name: String,
    period: Duration,
    token: Option<CancellationToken>,
}

impl PeriodicTimer {
    pub fn new(name: impl Into<String>, period: Duration) -> Self {
        PeriodicTimer {
            name: name.into(),
            period,
            token: None,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn is_running(&self) -> bool {
        self.token.as_ref().is_some_and(|t| !t.is_cancelled())
    }

    /// Start sending `tick()` into `tx` every period, the first one period from now.
    ///
    /// Returns false, and changes nothing, when the timer is already running.
    pub fn start<T, F>(&mut self, tx: mpsc::Sender<T>, tick: F) -> bool
    where
        T: Send + 'static,
        F: Fn() -> T + Send + 'static,
    {
        if self.is_running() {
            return false;
        }

        let token = CancellationToken::new();
        let cancelled = token.clone();
        let name = self.name.clone();
        let period = self.period.max(Duration::from_millis(1));

        tokio::spawn(async move {
            let mut interval = interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            log::debug!("{}: timer started ({:?})", name, period);

            loop {
                tokio::select! {
                    _ = cancelled.cancelled() => break,
                    _ = interval.tick() => {
                        tokio::select! {
                            _ = cancelled.cancelled() => break,
                            r = tx.send(tick()) => {
                                if r.is_err() {
                                    log::debug!("{}: receiver gone", name);
                                    break;
                                }
                            }
                        }
                    }
                }
            }
            log::debug!("{}: timer stopped", name);
        });

        self.token = Some(token);
        true
    }

    /// Stop the timer. Returns false when it was not running.
    pub fn stop(&mut self) -> bool {
        match self.token.take() {
            Some(token) => {
                let was_running = !token.is_cancelled();
                token.cancel();
                was_running
            }
            None => false,
        }
    }
}

impl Drop for PeriodicTimer {
    fn drop(&mut self) {
        self.stop();
    }
}
