use std::time::Duration;

use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::{
    cloudformation::{self, CloudApi},
    status::{StackState, StackStatus},
};

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum Error {
    #[error(transparent)]
    Api(#[from] cloudformation::Error),

    #[error(
        "timed out after {} waiting for stack {stack} (last status {})",
        humantime::format_duration(.waited.clone()),
        .last_status.as_ref().map(StackStatus::as_str).unwrap_or("unknown")
    )]
    Timeout {
        stack: String,
        waited: Duration,
        last_status: Option<StackStatus>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    pub interval: Duration,
    /// Upper bound on the whole wait, independent of per-request timeouts.
    pub timeout: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            timeout: Duration::from_secs(30 * 60),
        }
    }
}

/// Polls `stack_name` until its status is one of `terminal`.
///
/// The first poll happens immediately. A failed describe call ends the wait
/// with that error; it is not retried.
pub async fn await_stack<A: CloudApi + ?Sized>(
    api: &A,
    stack_name: &str,
    terminal: &[StackStatus],
    config: &PollConfig,
) -> Result<StackState, Error> {
    let started = Instant::now();
    let mut last_status: Option<StackStatus> = None;

    let watch = async {
        let mut ticker = time::interval(config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let state = api.describe_stack(stack_name).await?;

            if last_status.as_ref() != Some(&state.status) {
                info!(stack = stack_name, status = %state.status, "stack status changed");
                last_status = Some(state.status.clone());
            } else {
                debug!(stack = stack_name, status = %state.status, "stack status unchanged");
            }

            if terminal.contains(&state.status) {
                return Ok::<_, Error>(state);
            }
        }
    };

    let outcome = time::timeout(config.timeout, watch).await;
    match outcome {
        Ok(result) => result,
        Err(_) => Err(Error::Timeout {
            stack: stack_name.to_string(),
            waited: started.elapsed(),
            last_status,
        }),
    }
}
