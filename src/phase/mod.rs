// ABOUTME: Phase orchestration - Setup, Deploy, RouteSwap, and Rollback.
// ABOUTME: Each phase dispatches one worker activity and reconciles its response.

mod deploy;
mod outputs;
mod rollback;
mod setup;
mod swap;

pub use deploy::{DeployPhase, DeployRequest};
pub use outputs::{AppRef, DeployOutput, InstanceResize, ResizeStrategy, SetupOutput};
pub use rollback::{RollbackLaunch, RollbackPhase, RollbackPlan, RollbackRequest, plan_rollback};
pub use setup::{DEFAULT_TASK_TIMEOUT, SetupPhase, SetupPlan, SetupRequest};
pub use swap::{SwapPhase, SwapRequest};

use thiserror::Error;

use crate::error::ConfigError;
use crate::identity::IdentityError;
use crate::sweeping::BridgeError;
use crate::types::{ActivityId, AppId, ExecutionId, TargetSpace};
use crate::worker::{InstanceRecord, WorkerError};
use std::time::Duration;

/// Qualifier prefixed onto phase names by ad-hoc rollback executions;
/// stripped before sweeping-output lookup so the original phase's records
/// are found.
pub const STAGED_EXECUTION_QUALIFIER: &str = "Staged Execution";

/// How the surrounding engine is running this workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionKind {
    Standard,
    /// An ad-hoc rollback-only execution replaying recorded phases.
    OnDemandRollback,
}

/// Identity of one phase execution, supplied by the workflow engine.
#[derive(Debug, Clone)]
pub struct PhaseContext {
    pub app_id: AppId,
    pub execution_id: ExecutionId,
    pub phase_name: String,
    pub service_id: String,
    pub target: TargetSpace,
    pub execution_kind: ExecutionKind,
}

impl PhaseContext {
    /// The phase name to use for sweeping-output lookup.
    pub fn lookup_phase_name(&self) -> String {
        self.adjust_phase_name(&self.phase_name)
    }

    /// Strip the execution-mode qualifier from a phase name when running an
    /// ad-hoc rollback.
    pub fn adjust_phase_name(&self, name: &str) -> String {
        match self.execution_kind {
            ExecutionKind::Standard => name.trim().to_string(),
            ExecutionKind::OnDemandRollback => name
                .replace(&format!("{STAGED_EXECUTION_QUALIFIER} "), "")
                .trim()
                .to_string(),
        }
    }
}

/// Anything that can fail a phase. The engine treats an error as a failed
/// phase; retries, if any, happen above this crate.
#[derive(Debug, Error)]
pub enum PhaseError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Bridge(#[from] BridgeError),

    #[error(transparent)]
    Worker(#[from] WorkerError),

    #[error(transparent)]
    Identity(#[from] IdentityError),

    #[error("no setup output recorded for phase {phase_name}, cannot continue")]
    MissingSetupOutput { phase_name: String },

    #[error("worker response for activity {activity_id} carried an unexpected payload")]
    UnexpectedPayload { activity_id: ActivityId },
}

/// A dispatched phase waiting on its worker response.
#[derive(Debug, Clone)]
pub struct Dispatched {
    pub activity_id: ActivityId,
    pub timeout: Duration,
}

/// How a phase ended once its worker response was reconciled.
#[derive(Debug)]
pub enum PhaseStatus {
    Succeeded { instances: Vec<InstanceRecord> },
    Failed { message: String },
    /// A poll-style sub-task has not reached a verdict yet.
    AwaitingVerdict { reschedule_after: Option<Duration> },
    /// Rollback with nothing to roll back; reported, never an error.
    Skipped { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(kind: ExecutionKind, phase: &str) -> PhaseContext {
        PhaseContext {
            app_id: AppId::new("app"),
            execution_id: ExecutionId::new("exec"),
            phase_name: phase.to_string(),
            service_id: "svc".to_string(),
            target: TargetSpace::new("org", "space", "https://api.example.com"),
            execution_kind: kind,
        }
    }

    #[test]
    fn standard_execution_keeps_phase_name() {
        let ctx = context(ExecutionKind::Standard, " Phase 1 ");
        assert_eq!(ctx.lookup_phase_name(), "Phase 1");
    }

    #[test]
    fn on_demand_rollback_strips_qualifier() {
        let ctx = context(ExecutionKind::OnDemandRollback, "Staged Execution Phase 1");
        assert_eq!(ctx.lookup_phase_name(), "Phase 1");
    }
}
