// ABOUTME: Setup phase - resolves manifests, names the new application, derives routes,
// ABOUTME: and dispatches the worker push. The response fixes the SetupOutput record.

use std::collections::BTreeMap;
use std::time::Duration;
use tracing::info;

use super::outputs::{ResizeStrategy, SetupOutput};
use super::{Dispatched, PhaseContext, PhaseError, PhaseStatus};
use crate::identity::InfoVariables;
use crate::manifest::{ManifestPackage, ManifestSource, OverrideLevel};
use crate::routes::{self, InfraRoutes};
use crate::settings::PhaseMode;
use crate::sweeping::SweepingBridge;
use crate::types::{ActivityId, AppName};
use crate::worker::{
    CommandKind, ResponsePayload, RouteConfig, TaskCoordinator, TaskOutcome, WorkerRequest,
};

/// Fallback worker timeout when neither the phase nor the manifest names one.
pub const DEFAULT_TASK_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// Everything the engine hands the setup phase.
#[derive(Debug, Clone)]
pub struct SetupRequest {
    pub activity_id: ActivityId,
    /// Manifest content, keyed by override level.
    pub sources: BTreeMap<OverrideLevel, ManifestSource>,
    /// Name prefix used when the manifest declares none (or a placeholder).
    pub fallback_prefix: String,
    /// Instance ceiling used when the manifest declares none.
    pub fallback_instance_count: u32,
    pub infra_routes: InfraRoutes,
    /// Extra final routes declared on the phase itself.
    pub route_overrides: Vec<String>,
    /// Temporary-route override declared on the phase itself.
    pub temp_route_override: Option<Vec<String>>,
    pub resize_strategy: ResizeStrategy,
    pub timeout: Option<Duration>,
    pub cli_version_hint: Option<String>,
}

/// The setup decisions made before dispatch, carried across the suspend so
/// the response handler can assemble the SetupOutput record.
#[derive(Debug, Clone)]
pub struct SetupPlan {
    pub activity_id: ActivityId,
    pub app_name: AppName,
    pub max_instance_count: u32,
    pub resize_strategy: ResizeStrategy,
    pub final_routes: Vec<String>,
    pub temp_routes: Vec<String>,
    pub timeout: Option<Duration>,
}

pub struct SetupPhase<'a> {
    bridge: &'a SweepingBridge<'a>,
    coordinator: &'a TaskCoordinator<'a>,
}

impl<'a> SetupPhase<'a> {
    pub fn new(bridge: &'a SweepingBridge<'a>, coordinator: &'a TaskCoordinator<'a>) -> Self {
        Self {
            bridge,
            coordinator,
        }
    }

    /// Resolve manifests and routes, then dispatch the setup command.
    ///
    /// Every decision that must survive the suspend lands in the returned
    /// [`SetupPlan`]; nothing is persisted until the worker confirms.
    pub async fn execute(
        &self,
        ctx: &PhaseContext,
        mode: PhaseMode,
        request: SetupRequest,
    ) -> Result<(SetupPlan, Dispatched), PhaseError> {
        let package = ManifestPackage::resolve(&request.sources, mode.enforcement)?;
        let app_name = package.fetch_application_name(&request.fallback_prefix, mode.name_policy)?;
        let max_instance_count = package.fetch_max_count(request.fallback_instance_count)?;

        let derived = routes::route_maps(&package.manifest_yml, &request.infra_routes.routes)?;
        let derived = routes::apply_variable_substitution(derived, &package)?;
        // An application that opted out of routing keeps an empty final set;
        // only phase-level overrides can reintroduce routes.
        let final_routes = if routes::declares_no_route(&package.manifest_yml)? {
            request.route_overrides.clone()
        } else {
            routes::final_routes(&derived, &request.route_overrides, &ctx.service_id)?
        };
        let temp_routes =
            routes::temp_routes(request.temp_route_override.as_deref(), &request.infra_routes);

        info!(
            app = %app_name,
            max_instances = max_instance_count,
            routes = final_routes.len(),
            "setup plan resolved"
        );

        let timeout = request.timeout;
        let effective_timeout = timeout.unwrap_or(DEFAULT_TASK_TIMEOUT);

        let plan = SetupPlan {
            activity_id: request.activity_id.clone(),
            app_name: app_name.clone(),
            max_instance_count,
            resize_strategy: request.resize_strategy,
            final_routes: final_routes.clone(),
            temp_routes: temp_routes.clone(),
            timeout,
        };

        let activity_id = self
            .coordinator
            .dispatch(WorkerRequest {
                activity_id: request.activity_id,
                command: CommandKind::Setup,
                target: ctx.target.clone(),
                app_names: vec![app_name],
                routes: RouteConfig {
                    final_routes,
                    temp_routes,
                },
                instance_updates: Vec::new(),
                cli_version_hint: request.cli_version_hint,
                timeout: effective_timeout,
            })
            .await?;

        Ok((
            plan,
            Dispatched {
                activity_id,
                timeout: effective_timeout,
            },
        ))
    }

    /// Reconcile the worker's setup response: persist the SetupOutput, mark
    /// it successful, and seed identity state when an application was
    /// already serving traffic.
    pub async fn handle_response(
        &self,
        ctx: &PhaseContext,
        plan: &SetupPlan,
        outcome: TaskOutcome,
    ) -> Result<PhaseStatus, PhaseError> {
        let result = match outcome {
            TaskOutcome::Succeeded(ResponsePayload::Setup(result)) => result,
            TaskOutcome::Succeeded(_) => {
                return Err(PhaseError::UnexpectedPayload {
                    activity_id: plan.activity_id.clone(),
                });
            }
            TaskOutcome::Failed { message } => return Ok(PhaseStatus::Failed { message }),
            TaskOutcome::NotYetResolved { reschedule_after } => {
                return Ok(PhaseStatus::AwaitingVerdict { reschedule_after });
            }
        };

        let output = SetupOutput {
            uuid: format!("{}/{}", ctx.execution_id, ctx.lookup_phase_name()),
            phase_name: ctx.lookup_phase_name(),
            new_app: result.new_app.clone(),
            initial_instance_count: result.initial_instance_count,
            downsize_apps: result.downsize_apps,
            max_instance_count: plan.max_instance_count,
            desired_final_count: plan.max_instance_count,
            resize_strategy: plan.resize_strategy,
            final_routes: plan.final_routes.clone(),
            temp_routes: plan.temp_routes.clone(),
            target: ctx.target.clone(),
            timeout: plan.timeout,
            success: false,
        };
        self.bridge.save_setup_output(ctx, output).await?;
        self.bridge.mark_setup_success(ctx).await?;

        if let Some(existing) = result.existing_app {
            let info = InfoVariables::after_setup(
                (existing.name, existing.id),
                (result.new_app.name, result.new_app.id),
            );
            self.bridge.store_identity(ctx, info).await?;
        }

        Ok(PhaseStatus::Succeeded {
            instances: Vec::new(),
        })
    }
}
