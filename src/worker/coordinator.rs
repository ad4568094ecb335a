// ABOUTME: Correlates worker requests with responses and derives task timeouts.
// ABOUTME: Handles the not-yet-resolved reschedule path for poll-style sub-tasks.

use std::time::Duration;
use tracing::{debug, warn};

use super::{ResponsePayload, WorkerDispatch, WorkerError, WorkerRequest, WorkerStatus, WorkerVerdict};
use crate::phase::PhaseContext;
use crate::sweeping::{PhaseHistory, SweepingBridge};
use crate::types::ActivityId;

/// Reschedule policy for poll-style sub-tasks (approvals and the like).
#[derive(Debug, Clone, Copy)]
pub struct PollSchedule {
    /// Configured interval between polls.
    pub retry_interval: Duration,
    /// Once the computed delay falls to this floor, rescheduling stops.
    pub floor: Duration,
}

impl PollSchedule {
    /// The delay until the next poll: the configured interval minus the
    /// poll-pump time already elapsed. `None` means stop rescheduling.
    pub fn next_delay(&self, elapsed_pump: Duration) -> Option<Duration> {
        let delay = self.retry_interval.saturating_sub(elapsed_pump);
        if delay <= self.floor { None } else { Some(delay) }
    }
}

/// How one worker round trip ended, from the phase's point of view.
#[derive(Debug)]
pub enum TaskOutcome {
    Succeeded(ResponsePayload),
    Failed { message: String },
    /// Awaiting a verdict. `reschedule_after = None` means the poll floor
    /// was reached and the surrounding engine decides what happens next.
    NotYetResolved { reschedule_after: Option<Duration> },
}

/// Dispatches one request per activity and interprets the correlated
/// response.
pub struct TaskCoordinator<'a> {
    dispatcher: &'a dyn WorkerDispatch,
}

impl<'a> TaskCoordinator<'a> {
    pub fn new(dispatcher: &'a dyn WorkerDispatch) -> Self {
        Self { dispatcher }
    }

    /// Hand the request to the worker and return immediately; the phase
    /// suspends here until the correlated response arrives.
    pub async fn dispatch(&self, request: WorkerRequest) -> Result<ActivityId, WorkerError> {
        let activity_id = request.activity_id.clone();
        debug!(activity = %activity_id, command = ?request.command, "dispatching worker request");
        self.dispatcher.dispatch(request).await?;
        Ok(activity_id)
    }

    /// Interpret the verdict for an activity.
    pub fn interpret(
        &self,
        verdict: WorkerVerdict,
        schedule: &PollSchedule,
        elapsed_pump: Duration,
    ) -> TaskOutcome {
        match verdict {
            WorkerVerdict::Resolved(response) => match response.status {
                WorkerStatus::Success => TaskOutcome::Succeeded(response.payload),
                WorkerStatus::Failure => TaskOutcome::Failed {
                    message: response.failure_message(),
                },
            },
            WorkerVerdict::NotYetResolved => TaskOutcome::NotYetResolved {
                reschedule_after: schedule.next_delay(elapsed_pump),
            },
        }
    }

    /// The task timeout for a phase: the value recorded at Setup, or the
    /// caller's default when none was recorded. A failed lookup degrades to
    /// the default instead of propagating.
    pub async fn task_timeout(
        &self,
        bridge: &SweepingBridge<'_>,
        ctx: &PhaseContext,
        history: &dyn PhaseHistory,
        default: Duration,
    ) -> Duration {
        match bridge.find_setup_output(ctx, history).await {
            Ok(Some(setup)) => setup.timeout.unwrap_or(default),
            Ok(None) => default,
            Err(e) => {
                warn!(error = %e, phase = %ctx.phase_name, "setup output lookup failed, using default timeout");
                default
            }
        }
    }
}
