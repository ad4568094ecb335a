// ABOUTME: Remote-worker request/response types and the dispatch seam.
// ABOUTME: The worker owns all platform API/CLI calls; this crate only correlates.

mod coordinator;

pub use coordinator::{PollSchedule, TaskCoordinator, TaskOutcome};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::identity::RenameReport;
use crate::phase::{AppRef, InstanceResize};
use crate::types::{ActivityId, AppName, TargetSpace};

/// Errors while building or dispatching a worker request, or an explicit
/// failure response. Retry policy lives above this crate.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("failed to build worker request for activity {activity_id}: {message}")]
    BuildFailed {
        activity_id: ActivityId,
        message: String,
    },

    #[error("failed to dispatch worker request for activity {activity_id}: {message}")]
    DispatchFailed {
        activity_id: ActivityId,
        message: String,
    },
}

/// What the worker is asked to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommandKind {
    Setup,
    Resize,
    SwapRoutes,
    SwapRollback,
}

/// Route lists the worker applies during a command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteConfig {
    pub final_routes: Vec<String>,
    pub temp_routes: Vec<String>,
}

/// One request to the remote worker, correlated by activity id. At most one
/// response is expected per activity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerRequest {
    pub activity_id: ActivityId,
    pub command: CommandKind,
    pub target: TargetSpace,
    pub app_names: Vec<AppName>,
    pub routes: RouteConfig,
    /// Ordered instance-count deltas; order encodes the resize strategy
    /// (new-first or old-first).
    pub instance_updates: Vec<InstanceResize>,
    /// Platform CLI version the worker should prefer.
    pub cli_version_hint: Option<String>,
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

/// One per-instance promotion/demotion record from the worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceRecord {
    pub app_name: AppName,
    pub instance_index: u32,
    pub new_instance: bool,
}

/// Domain payload of a worker response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ResponsePayload {
    None,
    /// Result of a Setup command: the created application and its
    /// predecessors.
    Setup(SetupResult),
    /// Instance counts the worker actually applied, plus per-instance
    /// records.
    Resize(ResizeResult),
    /// Result of a route swap or its rollback.
    Swap(SwapResult),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetupResult {
    pub new_app: AppRef,
    pub initial_instance_count: u32,
    /// Predecessor applications to downsize in later phases, newest first.
    pub downsize_apps: Vec<AppName>,
    /// The application currently serving traffic, when one exists.
    pub existing_app: Option<AppRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwapResult {
    pub instances: Vec<InstanceRecord>,
    /// Present whenever the swap displaced a fixed application name.
    pub renames: Option<RenameReport>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResizeResult {
    pub updates: Vec<InstanceResize>,
    pub instances: Vec<InstanceRecord>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkerStatus {
    Success,
    Failure,
}

/// The worker's answer for one activity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerResponse {
    pub activity_id: ActivityId,
    pub status: WorkerStatus,
    pub error_message: Option<String>,
    pub payload: ResponsePayload,
}

impl WorkerResponse {
    /// The failure message to surface for this response.
    pub fn failure_message(&self) -> String {
        self.error_message
            .clone()
            .unwrap_or_else(|| "worker reported failure without a message".to_string())
    }
}

/// What arrived for an activity: a resolved response, or a poll-style
/// sub-task still awaiting its verdict (neither success nor failure).
#[derive(Debug, Clone)]
pub enum WorkerVerdict {
    Resolved(WorkerResponse),
    NotYetResolved,
}

/// The out-of-process agent performing platform calls. Dispatch returns as
/// soon as the request is handed off; the response arrives separately.
#[async_trait]
pub trait WorkerDispatch: Send + Sync {
    async fn dispatch(&self, request: WorkerRequest) -> Result<(), WorkerError>;
}
