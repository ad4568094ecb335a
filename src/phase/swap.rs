// ABOUTME: Route-swap phase - points final routes at the new application and
// ABOUTME: advances active/inactive identity from the worker's swap result.

use tracing::info;

use super::setup::DEFAULT_TASK_TIMEOUT;
use super::{Dispatched, PhaseContext, PhaseError, PhaseStatus};
use crate::identity;
use crate::sweeping::{PhaseHistory, SweepingBridge};
use crate::types::ActivityId;
use crate::worker::{
    CommandKind, ResponsePayload, RouteConfig, TaskCoordinator, TaskOutcome, WorkerRequest,
};

#[derive(Debug, Clone)]
pub struct SwapRequest {
    pub activity_id: ActivityId,
    pub cli_version_hint: Option<String>,
}

pub struct SwapPhase<'a> {
    bridge: &'a SweepingBridge<'a>,
    coordinator: &'a TaskCoordinator<'a>,
}

impl<'a> SwapPhase<'a> {
    pub fn new(bridge: &'a SweepingBridge<'a>, coordinator: &'a TaskCoordinator<'a>) -> Self {
        Self {
            bridge,
            coordinator,
        }
    }

    /// Dispatch the route swap using the routes recorded at setup. Fails
    /// when no successful setup output exists for this phase.
    pub async fn execute(
        &self,
        ctx: &PhaseContext,
        history: &dyn PhaseHistory,
        request: SwapRequest,
    ) -> Result<Dispatched, PhaseError> {
        let setup = self
            .bridge
            .find_setup_output(ctx, history)
            .await?
            .filter(|s| s.success)
            .ok_or_else(|| PhaseError::MissingSetupOutput {
                phase_name: ctx.lookup_phase_name(),
            })?;

        let mut app_names = vec![setup.new_app.name.clone()];
        app_names.extend(setup.downsize_apps.iter().cloned());

        let timeout = self
            .coordinator
            .task_timeout(self.bridge, ctx, history, DEFAULT_TASK_TIMEOUT)
            .await;
        let activity_id = self
            .coordinator
            .dispatch(WorkerRequest {
                activity_id: request.activity_id,
                command: CommandKind::SwapRoutes,
                target: ctx.target.clone(),
                app_names,
                routes: RouteConfig {
                    final_routes: setup.final_routes,
                    temp_routes: setup.temp_routes,
                },
                instance_updates: Vec::new(),
                cli_version_hint: request.cli_version_hint,
                timeout,
            })
            .await?;

        Ok(Dispatched {
            activity_id,
            timeout,
        })
    }

    /// Advance identity state from the swap result. Workflows without a
    /// predecessor application carry no identity record and skip the update.
    pub async fn handle_response(
        &self,
        ctx: &PhaseContext,
        activity_id: &ActivityId,
        outcome: TaskOutcome,
    ) -> Result<PhaseStatus, PhaseError> {
        match outcome {
            TaskOutcome::Succeeded(ResponsePayload::Swap(result)) => {
                if let Some(info) = self.bridge.find_identity(ctx).await? {
                    let updated = identity::apply_swap(&info, result.renames.as_ref())?;
                    info!(
                        active = %updated.active_app_name,
                        inactive = %updated.inactive_app_name,
                        "identity advanced after swap"
                    );
                    self.bridge.store_identity(ctx, updated).await?;
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
