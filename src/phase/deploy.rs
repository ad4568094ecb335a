// ABOUTME: Deploy phase - turns upsize/downsize instructions into exact instance
// ABOUTME: targets and dispatches the resize, ordered per the recorded strategy.

use tracing::info;

use super::outputs::{InstanceResize, ResizeStrategy, SetupOutput};
use super::setup::DEFAULT_TASK_TIMEOUT;
use super::{Dispatched, PhaseContext, PhaseError, PhaseStatus};
use crate::resize::{self, Instruction};
use crate::settings::PhaseMode;
use crate::sweeping::{PhaseHistory, SweepingBridge};
use crate::types::ActivityId;
use crate::worker::{
    CommandKind, ResponsePayload, RouteConfig, TaskCoordinator, TaskOutcome, WorkerRequest,
};

#[derive(Debug, Clone)]
pub struct DeployRequest {
    pub activity_id: ActivityId,
    /// How far to bring the new application up.
    pub upsize: Instruction,
    /// How far to bring the old applications down; inferred from `upsize`
    /// when absent.
    pub downsize: Option<Instruction>,
    pub cli_version_hint: Option<String>,
}

pub struct DeployPhase<'a> {
    bridge: &'a SweepingBridge<'a>,
    coordinator: &'a TaskCoordinator<'a>,
}

impl<'a> DeployPhase<'a> {
    pub fn new(bridge: &'a SweepingBridge<'a>, coordinator: &'a TaskCoordinator<'a>) -> Self {
        Self {
            bridge,
            coordinator,
        }
    }

    /// Compute instance targets from the recorded setup state and dispatch
    /// the resize. Fails when no setup output exists for this phase.
    pub async fn execute(
        &self,
        ctx: &PhaseContext,
        mode: PhaseMode,
        history: &dyn PhaseHistory,
        request: DeployRequest,
    ) -> Result<Dispatched, PhaseError> {
        let setup = self
            .bridge
            .find_setup_output(ctx, history)
            .await?
            .filter(|s| s.success)
            .ok_or_else(|| PhaseError::MissingSetupOutput {
                phase_name: ctx.lookup_phase_name(),
            })?;

        let updates = instance_updates(&setup, mode, &request);
        info!(
            strategy = ?setup.resize_strategy,
            updates = updates.len(),
            "deploy targets computed"
        );

        let timeout = self
            .coordinator
            .task_timeout(self.bridge, ctx, history, DEFAULT_TASK_TIMEOUT)
            .await;
        let activity_id = self
            .coordinator
            .dispatch(WorkerRequest {
                activity_id: request.activity_id,
                command: CommandKind::Resize,
                target: ctx.target.clone(),
                app_names: updates.iter().map(|u| u.app_name.clone()).collect(),
                routes: RouteConfig {
                    final_routes: setup.final_routes.clone(),
                    temp_routes: setup.temp_routes.clone(),
                },
                instance_updates: updates,
                cli_version_hint: request.cli_version_hint,
                timeout,
            })
            .await?;

        Ok(Dispatched {
            activity_id,
            timeout,
        })
    }

    /// Persist the worker's applied updates as the DeployOutput record.
    pub async fn handle_response(
        &self,
        ctx: &PhaseContext,
        activity_id: &ActivityId,
        outcome: TaskOutcome,
    ) -> Result<PhaseStatus, PhaseError> {
        match outcome {
            TaskOutcome::Succeeded(ResponsePayload::Resize(result)) => {
                self.bridge
                    .save_deploy_output(
                        ctx,
                        super::outputs::DeployOutput {
                            entries: result.updates,
                        },
                    )
                    .await?;
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

/// The ordered instance-count changes for one deploy step. The new
/// application's entry is placed first or last per the recorded strategy;
/// old applications are resized in the order setup reported them.
fn instance_updates(
    setup: &SetupOutput,
    mode: PhaseMode,
    request: &DeployRequest,
) -> Vec<InstanceResize> {
    let up = resize::upsize_count(request.upsize, setup.max_instance_count);
    let keep = resize::downsize_keep_count(
        mode.rounding,
        request.downsize,
        Some(request.upsize),
        setup.max_instance_count,
    );

    let new_entry = InstanceResize {
        app_name: setup.new_app.name.clone(),
        previous_count: setup.initial_instance_count,
        desired_count: up,
    };
    let old_entries = setup.downsize_apps.iter().map(|name| InstanceResize {
        app_name: name.clone(),
        previous_count: setup.max_instance_count,
        desired_count: keep,
    });

    match setup.resize_strategy {
        ResizeStrategy::NewFirst => std::iter::once(new_entry).chain(old_entries).collect(),
        ResizeStrategy::OldFirst => old_entries.chain(std::iter::once(new_entry)).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phase::AppRef;
    use crate::resize::RoundingRegime;
    use crate::types::{AppId, AppName, TargetSpace};

    fn setup_output(strategy: ResizeStrategy) -> SetupOutput {
        SetupOutput {
            uuid: "exec-1/Phase 1".to_string(),
            phase_name: "Phase 1".to_string(),
            new_app: AppRef {
                name: AppName::new("orders__2").unwrap(),
                id: AppId::new("guid-new"),
            },
            initial_instance_count: 0,
            downsize_apps: vec![AppName::new("orders__1").unwrap()],
            max_instance_count: 10,
            desired_final_count: 10,
            resize_strategy: strategy,
            final_routes: vec!["orders.example.com".to_string()],
            temp_routes: Vec::new(),
            target: TargetSpace::new("org", "space", "https://api.example.com"),
            timeout: None,
            success: true,
        }
    }

    fn request(upsize: Instruction) -> DeployRequest {
        DeployRequest {
            activity_id: ActivityId::new("act-2"),
            upsize,
            downsize: None,
            cli_version_hint: None,
        }
    }

    #[test]
    fn fifty_percent_splits_ten_instances_evenly() {
        let updates = instance_updates(
            &setup_output(ResizeStrategy::NewFirst),
            PhaseMode::default(),
            &request(Instruction::Percentage(50)),
        );

        assert_eq!(updates.len(), 2);
        assert_eq!(updates[0].app_name.as_str(), "orders__2");
        assert_eq!(updates[0].desired_count, 5);
        assert_eq!(updates[1].app_name.as_str(), "orders__1");
        assert_eq!(updates[1].desired_count, 5);
    }

    #[test]
    fn old_first_strategy_reorders_entries() {
        let updates = instance_updates(
            &setup_output(ResizeStrategy::OldFirst),
            PhaseMode::default(),
            &request(Instruction::Percentage(100)),
        );

        assert_eq!(updates[0].app_name.as_str(), "orders__1");
        assert_eq!(updates[0].desired_count, 0);
        assert_eq!(updates[1].app_name.as_str(), "orders__2");
        assert_eq!(updates[1].desired_count, 10);
    }

    #[test]
    fn v2_rounding_keeps_the_floor() {
        let mode = PhaseMode {
            rounding: RoundingRegime::V2,
            ..PhaseMode::default()
        };
        let mut req = request(Instruction::Percentage(40));
        req.downsize = Some(Instruction::Percentage(40));
        let updates = instance_updates(&setup_output(ResizeStrategy::NewFirst), mode, &req);

        // keep = floor(40% of 10) = 4; legacy would keep 6.
        assert_eq!(updates[1].desired_count, 4);
    }
}
