// ABOUTME: End-to-end blue/green workflow tests over the in-memory store.
// ABOUTME: Drives setup, deploy, swap, and rollback the way a workflow engine would.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use parking_lot::Mutex;

use karavi::identity;
use karavi::manifest::{ManifestSource, OverrideLevel};
use karavi::phase::{
    DeployPhase, DeployRequest, ExecutionKind, PhaseContext, PhaseError, PhaseStatus,
    ResizeStrategy, RollbackLaunch, RollbackPhase, RollbackRequest, SetupPhase, SetupRequest,
    SwapPhase, SwapRequest,
};
use karavi::resize::Instruction;
use karavi::routes::InfraRoutes;
use karavi::settings::PhaseMode;
use karavi::sweeping::{
    MemoryStore, NoHistory, PhaseHistory, PhaseHistoryEntry, SweepingBridge,
};
use karavi::types::{ActivityId, AppId, AppName, ExecutionId, TargetSpace};
use karavi::worker::{
    CommandKind, InstanceRecord, ResizeResult, ResponsePayload, SetupResult, SwapResult,
    TaskCoordinator, TaskOutcome, WorkerDispatch, WorkerError, WorkerRequest,
};

struct CapturingDispatch(Mutex<Vec<WorkerRequest>>);

impl CapturingDispatch {
    fn new() -> Self {
        Self(Mutex::new(Vec::new()))
    }

    fn last(&self) -> WorkerRequest {
        self.0.lock().last().cloned().expect("a dispatched request")
    }
}

#[async_trait::async_trait]
impl WorkerDispatch for CapturingDispatch {
    async fn dispatch(&self, request: WorkerRequest) -> Result<(), WorkerError> {
        self.0.lock().push(request);
        Ok(())
    }
}

struct MapHistory(HashMap<String, PhaseHistoryEntry>);

impl PhaseHistory for MapHistory {
    fn previous_phase(&self, phase_name: &str) -> Option<PhaseHistoryEntry> {
        self.0.get(phase_name).cloned()
    }
}

fn target() -> TargetSpace {
    TargetSpace::new("org", "space", "https://api.example.com")
}

fn context(phase_name: &str) -> PhaseContext {
    PhaseContext {
        app_id: AppId::new("svc-1"),
        execution_id: ExecutionId::new("exec-1"),
        phase_name: phase_name.to_string(),
        service_id: "orders".to_string(),
        target: target(),
        execution_kind: ExecutionKind::Standard,
    }
}

fn setup_request(manifest: &str) -> SetupRequest {
    let mut sources = BTreeMap::new();
    sources.insert(
        OverrideLevel::Service,
        ManifestSource::Inline(vec![manifest.to_string()]),
    );
    SetupRequest {
        activity_id: ActivityId::new("act-setup"),
        sources,
        fallback_prefix: "orders".to_string(),
        fallback_instance_count: 2,
        infra_routes: InfraRoutes {
            routes: vec!["r1.example.com".to_string(), "r2.example.com".to_string()],
            temp_routes: vec!["tmp.example.com".to_string()],
        },
        route_overrides: Vec::new(),
        temp_route_override: None,
        resize_strategy: ResizeStrategy::NewFirst,
        timeout: Some(Duration::from_secs(300)),
        cli_version_hint: None,
    }
}

fn setup_result() -> SetupResult {
    SetupResult {
        new_app: app_ref("orders__2", "guid-new"),
        initial_instance_count: 0,
        downsize_apps: vec![AppName::new("orders__1").unwrap()],
        existing_app: Some(app_ref("orders__1", "guid-old")),
    }
}

fn app_ref(name: &str, id: &str) -> karavi::phase::AppRef {
    karavi::phase::AppRef {
        name: AppName::new(name).unwrap(),
        id: AppId::new(id),
    }
}

const MANIFEST: &str = "applications:\n- name: orders\n  instances: 10\n";

async fn run_setup(bridge: &SweepingBridge<'_>, dispatch: &CapturingDispatch, ctx: &PhaseContext) {
    let coordinator = TaskCoordinator::new(dispatch);
    let phase = SetupPhase::new(bridge, &coordinator);
    let (plan, _) = phase
        .execute(ctx, PhaseMode::default(), setup_request(MANIFEST))
        .await
        .unwrap();
    let status = phase
        .handle_response(
            ctx,
            &plan,
            TaskOutcome::Succeeded(ResponsePayload::Setup(setup_result())),
        )
        .await
        .unwrap();
    assert!(matches!(status, PhaseStatus::Succeeded { .. }));
}

#[tokio::test]
async fn full_blue_green_workflow() {
    let store = MemoryStore::new();
    let bridge = SweepingBridge::new(&store);
    let dispatch = CapturingDispatch::new();
    let ctx = context("Phase 1");

    run_setup(&bridge, &dispatch, &ctx).await;
    let setup_sent = dispatch.last();
    assert_eq!(setup_sent.command, CommandKind::Setup);
    assert_eq!(
        setup_sent.routes.final_routes,
        vec!["r1.example.com", "r2.example.com"]
    );
    assert_eq!(setup_sent.timeout, Duration::from_secs(300));

    // Deploy at 50% splits the 10-instance ceiling evenly, new app first.
    let coordinator = TaskCoordinator::new(&dispatch);
    let deploy = DeployPhase::new(&bridge, &coordinator);
    let dispatched = deploy
        .execute(
            &ctx,
            PhaseMode::default(),
            &NoHistory,
            DeployRequest {
                activity_id: ActivityId::new("act-deploy"),
                upsize: Instruction::Percentage(50),
                downsize: None,
                cli_version_hint: None,
            },
        )
        .await
        .unwrap();

    let resize_sent = dispatch.last();
    assert_eq!(resize_sent.command, CommandKind::Resize);
    // The resize request carries the routes and timeout recorded at setup.
    assert_eq!(
        resize_sent.routes.final_routes,
        vec!["r1.example.com", "r2.example.com"]
    );
    assert_eq!(resize_sent.routes.temp_routes, vec!["tmp.example.com"]);
    assert_eq!(resize_sent.timeout, Duration::from_secs(300));
    assert_eq!(resize_sent.instance_updates.len(), 2);
    assert_eq!(resize_sent.instance_updates[0].app_name.as_str(), "orders__2");
    assert_eq!(resize_sent.instance_updates[0].desired_count, 5);
    assert_eq!(resize_sent.instance_updates[1].app_name.as_str(), "orders__1");
    assert_eq!(resize_sent.instance_updates[1].desired_count, 5);

    let status = deploy
        .handle_response(
            &ctx,
            &dispatched.activity_id,
            TaskOutcome::Succeeded(ResponsePayload::Resize(ResizeResult {
                updates: resize_sent.instance_updates.clone(),
                instances: vec![InstanceRecord {
                    app_name: AppName::new("orders__2").unwrap(),
                    instance_index: 0,
                    new_instance: true,
                }],
            })),
        )
        .await
        .unwrap();
    assert!(matches!(status, PhaseStatus::Succeeded { ref instances } if instances.len() == 1));

    // Swap routes onto the new application and advance identity.
    let swap = SwapPhase::new(&bridge, &coordinator);
    let dispatched = swap
        .execute(
            &ctx,
            &NoHistory,
            SwapRequest {
                activity_id: ActivityId::new("act-swap"),
                cli_version_hint: None,
            },
        )
        .await
        .unwrap();
    let swap_sent = dispatch.last();
    assert_eq!(swap_sent.command, CommandKind::SwapRoutes);
    assert_eq!(swap_sent.routes.temp_routes, vec!["tmp.example.com"]);

    swap.handle_response(
        &ctx,
        &dispatched.activity_id,
        TaskOutcome::Succeeded(ResponsePayload::Swap(SwapResult {
            instances: Vec::new(),
            renames: None,
        })),
    )
    .await
    .unwrap();

    let info = bridge.find_identity(&ctx).await.unwrap().unwrap();
    assert_eq!(info.active_app_name.as_str(), "orders__2");
    assert_eq!(info.inactive_app_name.as_str(), "orders__1");

    // Roll back: the recorded deploy is undone in reverse order and
    // identity returns to its post-setup state.
    let rollback = RollbackPhase::new(&bridge, &coordinator);
    let launch = rollback
        .execute(
            &ctx,
            &NoHistory,
            RollbackRequest {
                activity_id: ActivityId::new("act-rollback"),
                cli_version_hint: None,
            },
        )
        .await
        .unwrap();
    let RollbackLaunch::Dispatched(dispatched) = launch else {
        panic!("expected a dispatched rollback");
    };

    let rollback_sent = dispatch.last();
    assert_eq!(rollback_sent.command, CommandKind::SwapRollback);
    assert_eq!(rollback_sent.instance_updates[0].app_name.as_str(), "orders__1");
    assert_eq!(rollback_sent.instance_updates[0].desired_count, 10);
    assert_eq!(rollback_sent.instance_updates[1].app_name.as_str(), "orders__2");
    assert_eq!(rollback_sent.instance_updates[1].desired_count, 0);

    rollback
        .handle_response(
            &ctx,
            &dispatched.activity_id,
            TaskOutcome::Succeeded(ResponsePayload::Swap(SwapResult {
                instances: Vec::new(),
                renames: None,
            })),
        )
        .await
        .unwrap();

    let info = bridge.find_identity(&ctx).await.unwrap().unwrap();
    assert_eq!(info.active_app_name.as_str(), "orders__1");
    assert_eq!(info.inactive_app_name.as_str(), "orders__2");
    assert_eq!(info.most_recent_inactive_app_version_old_name, None);
}

#[tokio::test]
async fn no_route_manifest_yields_empty_routes_until_overridden() {
    let store = MemoryStore::new();
    let bridge = SweepingBridge::new(&store);
    let dispatch = CapturingDispatch::new();
    let coordinator = TaskCoordinator::new(&dispatch);
    let phase = SetupPhase::new(&bridge, &coordinator);
    let ctx = context("Phase 1");

    let mut request = setup_request("applications:\n- name: orders\n  no-route: true\n");
    request.route_overrides = vec!["override.example.com".to_string()];

    let (plan, _) = phase
        .execute(&ctx, PhaseMode::default(), request)
        .await
        .unwrap();
    // no-route discards the infrastructure defaults; only the phase-level
    // override survives.
    assert_eq!(plan.final_routes, vec!["override.example.com"]);

    let bare = setup_request("applications:\n- name: orders\n  no-route: true\n");
    let (plan, _) = phase
        .execute(&ctx, PhaseMode::default(), bare)
        .await
        .unwrap();
    assert!(plan.final_routes.is_empty());
}

#[tokio::test]
async fn later_phase_finds_setup_through_matching_history() {
    let store = MemoryStore::new();
    let bridge = SweepingBridge::new(&store);
    let dispatch = CapturingDispatch::new();
    let setup_ctx = context("Phase 1");

    run_setup(&bridge, &dispatch, &setup_ctx).await;

    let deploy_ctx = context("Phase 2");
    let history = MapHistory(HashMap::from([(
        "Phase 2".to_string(),
        PhaseHistoryEntry {
            phase_name: "Phase 1".to_string(),
            service_id: "orders".to_string(),
            target: target(),
        },
    )]));

    let found = bridge
        .find_setup_output(&deploy_ctx, &history)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.phase_name, "Phase 1");
    assert!(found.success);
}

#[tokio::test]
async fn mismatched_history_is_a_configuration_error() {
    let store = MemoryStore::new();
    let bridge = SweepingBridge::new(&store);
    let dispatch = CapturingDispatch::new();
    let setup_ctx = context("Phase 1");

    run_setup(&bridge, &dispatch, &setup_ctx).await;

    let deploy_ctx = context("Phase 2");
    let history = MapHistory(HashMap::from([(
        "Phase 2".to_string(),
        PhaseHistoryEntry {
            phase_name: "Phase 1".to_string(),
            service_id: "orders".to_string(),
            target: TargetSpace::new("other-org", "space", "https://api.example.com"),
        },
    )]));

    let err = bridge
        .find_setup_output(&deploy_ctx, &history)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("different infrastructure"));
}

#[tokio::test]
async fn rollback_without_prior_phases_is_skipped() {
    let store = MemoryStore::new();
    let bridge = SweepingBridge::new(&store);
    let dispatch = CapturingDispatch::new();
    let coordinator = TaskCoordinator::new(&dispatch);
    let rollback = RollbackPhase::new(&bridge, &coordinator);

    let launch = rollback
        .execute(
            &context("Phase 1"),
            &NoHistory,
            RollbackRequest {
                activity_id: ActivityId::new("act-rollback"),
                cli_version_hint: None,
            },
        )
        .await
        .unwrap();
    assert!(matches!(launch, RollbackLaunch::Skipped { .. }));
    assert!(dispatch.0.lock().is_empty());
}

#[tokio::test]
async fn deploy_without_setup_fails() {
    let store = MemoryStore::new();
    let bridge = SweepingBridge::new(&store);
    let dispatch = CapturingDispatch::new();
    let coordinator = TaskCoordinator::new(&dispatch);
    let deploy = DeployPhase::new(&bridge, &coordinator);

    let err = deploy
        .execute(
            &context("Phase 1"),
            PhaseMode::default(),
            &NoHistory,
            DeployRequest {
                activity_id: ActivityId::new("act-deploy"),
                upsize: Instruction::Percentage(100),
                downsize: None,
                cli_version_hint: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, PhaseError::MissingSetupOutput { .. }));
}

#[tokio::test]
async fn rename_swap_round_trip_through_the_store() {
    let store = MemoryStore::new();
    let bridge = SweepingBridge::new(&store);
    let dispatch = CapturingDispatch::new();
    let ctx = context("Phase 1");
    let coordinator = TaskCoordinator::new(&dispatch);

    // Non-versioned old app: the swap displaces the fixed name and the
    // worker reports the post-rename names.
    let phase = SetupPhase::new(&bridge, &coordinator);
    let (plan, _) = phase
        .execute(&ctx, PhaseMode::default(), setup_request(MANIFEST))
        .await
        .unwrap();
    phase
        .handle_response(
            &ctx,
            &plan,
            TaskOutcome::Succeeded(ResponsePayload::Setup(SetupResult {
                new_app: app_ref("orders__2", "guid-new"),
                initial_instance_count: 0,
                downsize_apps: vec![AppName::new("orders").unwrap()],
                existing_app: Some(app_ref("orders", "guid-old")),
            })),
        )
        .await
        .unwrap();

    let swap = SwapPhase::new(&bridge, &coordinator);
    swap.handle_response(
        &ctx,
        &ActivityId::new("act-swap"),
        TaskOutcome::Succeeded(ResponsePayload::Swap(SwapResult {
            instances: Vec::new(),
            renames: Some(identity::RenameReport {
                active_app_name: AppName::new("orders__2").unwrap(),
                inactive_app_name: AppName::new("orders__inactive").unwrap(),
            }),
        })),
    )
    .await
    .unwrap();

    let info = bridge.find_identity(&ctx).await.unwrap().unwrap();
    assert_eq!(info.active_app_name.as_str(), "orders__2");
    assert_eq!(info.inactive_app_name.as_str(), "orders__inactive");
    assert_eq!(
        info.most_recent_inactive_app_version_old_name,
        Some(AppName::new("orders__2").unwrap())
    );

    let rollback = RollbackPhase::new(&bridge, &coordinator);
    rollback
        .handle_response(
            &ctx,
            &ActivityId::new("act-rollback"),
            TaskOutcome::Succeeded(ResponsePayload::Swap(SwapResult {
                instances: Vec::new(),
                renames: Some(identity::RenameReport {
                    active_app_name: AppName::new("orders").unwrap(),
                    inactive_app_name: AppName::new("orders__structural").unwrap(),
                }),
            })),
        )
        .await
        .unwrap();

    let info = bridge.find_identity(&ctx).await.unwrap().unwrap();
    assert_eq!(info.active_app_name.as_str(), "orders");
    // The one-level-deep history wins over the worker's structural guess.
    assert_eq!(info.inactive_app_name.as_str(), "orders__2");
}
