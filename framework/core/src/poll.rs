use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

use crate::shutdown::DelegatedShutdownListener;

/// How often to re-check external state and how long to keep trying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub interval: Duration,
    /// `None` waits until the condition holds or a shutdown is requested.
    pub timeout: Option<Duration>,
}

impl PollSettings {
    pub fn every(interval: Duration) -> Self {
        Self {
            interval,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Reasons a [poll_until] wait ended without the condition being met.
///
/// Returned inside an [anyhow::Error], use `downcast_ref::<WaitError>()` to branch on it.
#[derive(derive_more::Error, derive_more::Display, Debug)]
pub enum WaitError {
    #[display("Timed out after {elapsed:?} waiting for {what}")]
    TimedOut { what: String, elapsed: Duration },
    #[display("Shutdown requested while waiting for {what}")]
    Cancelled { what: String },
}

/// Repeatedly run `check` until it yields a value.
///
/// The check runs immediately and then once per [PollSettings::interval]. Each sleep is raced
/// against the shutdown signal, so a Ctrl-C ends the wait promptly rather than at the next tick.
/// An error from `check` ends the wait and is returned as-is.
pub async fn poll_until<T, F, Fut>(
    what: &str,
    settings: PollSettings,
    shutdown: &mut DelegatedShutdownListener,
    mut check: F,
) -> anyhow::Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = anyhow::Result<Option<T>>>,
{
    let started = Instant::now();

    loop {
        if shutdown.should_shutdown() {
            return Err(WaitError::Cancelled {
                what: what.to_string(),
            }
            .into());
        }

        if let Some(value) = check().await? {
            return Ok(value);
        }

        let elapsed = started.elapsed();
        let sleep_for = match settings.timeout {
            Some(timeout) if elapsed >= timeout => {
                return Err(WaitError::TimedOut {
                    what: what.to_string(),
                    elapsed,
                }
                .into());
            }
            Some(timeout) => settings.interval.min(timeout - elapsed),
            None => settings.interval,
        };

        log::trace!("Still waiting for {what}, next check in {sleep_for:?}");

        tokio::select! {
            _ = tokio::time::sleep(sleep_for) => {}
            _ = shutdown.wait_for_shutdown() => {
                return Err(WaitError::Cancelled {
                    what: what.to_string(),
                }
                .into());
            }
        }
    }
}
