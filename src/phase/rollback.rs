// ABOUTME: Rollback phase - inverts the recorded deploy and restores routes.
// ABOUTME: Nothing recorded means nothing to undo; rollback then skips, never fails.

use tracing::info;

use super::outputs::{DeployOutput, InstanceResize, SetupOutput};
use super::setup::DEFAULT_TASK_TIMEOUT;
use super::{Dispatched, PhaseContext, PhaseError, PhaseStatus};
use crate::identity;
use crate::sweeping::{PhaseHistory, SweepingBridge};
use crate::types::{ActivityId, AppName};
use crate::worker::{
    CommandKind, ResponsePayload, RouteConfig, TaskCoordinator, TaskOutcome, WorkerRequest,
};

/// What rollback decided to do, computed purely from the recorded outputs.
#[derive(Debug, Clone)]
pub enum RollbackPlan {
    /// No successful setup was recorded; the phase never changed anything.
    Skip { message: String },
    Execute {
        app_names: Vec<AppName>,
        updates: Vec<InstanceResize>,
        final_routes: Vec<String>,
        temp_routes: Vec<String>,
    },
}

/// Derive the rollback plan from what earlier phases recorded.
///
/// A recorded deploy is undone entry by entry, inverted and in reverse
/// order. Setup without a deploy only requires putting the new application
/// back to its initial count.
pub fn plan_rollback(setup: Option<&SetupOutput>, deploy: Option<&DeployOutput>) -> RollbackPlan {
    let Some(setup) = setup.filter(|s| s.success) else {
        return RollbackPlan::Skip {
            message: "no successful setup recorded for this phase, nothing to roll back"
                .to_string(),
        };
    };

    let updates: Vec<InstanceResize> = match deploy {
        Some(deploy) if !deploy.entries.is_empty() => {
            deploy.entries.iter().rev().map(InstanceResize::inverted).collect()
        }
        _ => vec![InstanceResize {
            app_name: setup.new_app.name.clone(),
            previous_count: setup.desired_final_count,
            desired_count: setup.initial_instance_count,
        }],
    };

    let mut app_names = vec![setup.new_app.name.clone()];
    app_names.extend(setup.downsize_apps.iter().cloned());

    RollbackPlan::Execute {
        app_names,
        updates,
        final_routes: setup.final_routes.clone(),
        temp_routes: setup.temp_routes.clone(),
    }
}

/// Outcome of launching a rollback: either a dispatched activity or an
/// immediate skip.
#[derive(Debug)]
pub enum RollbackLaunch {
    Dispatched(Dispatched),
    Skipped { message: String },
}

#[derive(Debug, Clone)]
pub struct RollbackRequest {
    pub activity_id: ActivityId,
    pub cli_version_hint: Option<String>,
}

pub struct RollbackPhase<'a> {
    bridge: &'a SweepingBridge<'a>,
    coordinator: &'a TaskCoordinator<'a>,
}

impl<'a> RollbackPhase<'a> {
    pub fn new(bridge: &'a SweepingBridge<'a>, coordinator: &'a TaskCoordinator<'a>) -> Self {
        Self {
            bridge,
            coordinator,
        }
    }

    pub async fn execute(
        &self,
        ctx: &PhaseContext,
        history: &dyn PhaseHistory,
        request: RollbackRequest,
    ) -> Result<RollbackLaunch, PhaseError> {
        let setup = self.bridge.find_setup_output(ctx, history).await?;
        let deploy = self.bridge.find_deploy_output(ctx).await?;

        let plan = plan_rollback(setup.as_ref(), deploy.as_ref());
        let (app_names, updates, final_routes, temp_routes) = match plan {
            RollbackPlan::Skip { message } => {
                info!(phase = %ctx.lookup_phase_name(), "{message}");
                return Ok(RollbackLaunch::Skipped { message });
            }
            RollbackPlan::Execute {
                app_names,
                updates,
                final_routes,
                temp_routes,
            } => (app_names, updates, final_routes, temp_routes),
        };

        let timeout = self
            .coordinator
            .task_timeout(self.bridge, ctx, history, DEFAULT_TASK_TIMEOUT)
            .await;
        let activity_id = self
            .coordinator
            .dispatch(WorkerRequest {
                activity_id: request.activity_id,
                command: CommandKind::SwapRollback,
                target: ctx.target.clone(),
                app_names,
                routes: RouteConfig {
                    final_routes,
                    temp_routes,
                },
                instance_updates: updates,
                cli_version_hint: request.cli_version_hint,
                timeout,
            })
            .await?;

        Ok(RollbackLaunch::Dispatched(Dispatched {
            activity_id,
            timeout,
        }))
    }

    /// Restore identity from the one-level-deep swap history and report the
    /// worker's per-instance records.
    pub async fn handle_response(
        &self,
        ctx: &PhaseContext,
        activity_id: &ActivityId,
        outcome: TaskOutcome,
    ) -> Result<PhaseStatus, PhaseError> {
        match outcome {
            TaskOutcome::Succeeded(ResponsePayload::Swap(result)) => {
                if let Some(info) = self.bridge.find_identity(ctx).await? {
                    let restored = identity::apply_rollback(&info, result.renames.as_ref())?;
                    self.bridge.store_identity(ctx, restored).await?;
                }
                Ok(PhaseStatus::Succeeded {
                    instances: result.instances,
                })
            }
            TaskOutcome::Succeeded(_) => Err(PhaseError::UnexpectedPayload {
                activity_id: activity_id.clone(),
            }),
            TaskOutcome::Failed { message } => Ok(PhaseStatus::Failed { message }),
            TaskOutcome::NotYetResolved { reschedule_after } => {
                Ok(PhaseStatus::AwaitingVerdict { reschedule_after })
            }
        }
    }
}
