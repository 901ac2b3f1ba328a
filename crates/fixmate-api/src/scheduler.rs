//! # Sweep Scheduler
//!
//! Background loops driving the time-based transitions: escrow
//! auto-release, dispute expiry and moderation reminders. Each sweep runs
//! on its own interval so a slow release sweep never delays expiry.
//! Failures are logged and the loop waits for the next tick.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use crate::state::AppState;

/// Handles for the spawned sweep loops.
#[derive(Debug)]
pub struct SweepTasks {
    pub release: JoinHandle<()>,
    pub expiry: JoinHandle<()>,
    pub reminders: JoinHandle<()>,
}

impl SweepTasks {
    pub fn abort(&self) {
        self.release.abort();
        self.expiry.abort();
        self.reminders.abort();
    }
}

/// Spawn the three sweep loops on the current runtime.
pub fn spawn(state: &AppState) -> SweepTasks {
    let config = &state.config;
    tracing::info!(
        release_secs = config.release_sweep_secs,
        expiry_secs = config.expiry_sweep_secs,
        reminder_secs = config.reminder_sweep_secs,
        "starting sweep scheduler"
    );

    let release = {
        let state = state.clone();
        every(config.release_sweep_secs, move || {
            let state = state.clone();
            async move {
                match state.escrow.release_due_payments().await {
                    Ok(report) => tracing::info!(
                        released = report.released,
                        skipped = report.skipped,
                        failed = report.failed,
                        "escrow release sweep finished"
                    ),
                    Err(e) => tracing::error!(error = %e, "escrow release sweep failed"),
                }
            }
        })
    };

    let expiry = {
        let state = state.clone();
        every(config.expiry_sweep_secs, move || {
            let state = state.clone();
            async move {
                match state.disputes.expire_disputes().await {
                    Ok(report) => tracing::info!(
                        updated = report.updated,
                        failed = report.failed,
                        "dispute expiry sweep finished"
                    ),
                    Err(e) => tracing::error!(error = %e, "dispute expiry sweep failed"),
                }
            }
        })
    };

    let reminders = {
        let state = state.clone();
        every(config.reminder_sweep_secs, move || {
            let state = state.clone();
            async move {
                match state.disputes.remind_moderation().await {
                    Ok(report) => tracing::info!(
                        reminded = report.reminded,
                        "moderation reminder sweep finished"
                    ),
                    Err(e) => tracing::error!(error = %e, "moderation reminder sweep failed"),
                }
            }
        })
    };

    SweepTasks {
        release,
        expiry,
        reminders,
    }
}

/// Run `sweep` every `secs` seconds. The first run happens one full period
/// after startup. A period of 0 disables the loop.
fn every<F, Fut>(secs: u64, sweep: F) -> JoinHandle<()>
where
    F: Fn() -> Fut + Send + 'static,
    Fut: std::future::Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        if secs == 0 {
            return;
        }
        let period = Duration::from_secs(secs);
        let mut timer = interval(period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        timer.tick().await;
        loop {
            timer.tick().await;
            sweep().await;
        }
    })
}
