// ABOUTME: Serializable records each phase persists for the phases after it.
// ABOUTME: SetupOutput feeds Deploy/Swap/Rollback; DeployOutput feeds Rollback.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::types::{AppId, AppName, TargetSpace};

/// Name/id pair for an application the worker reported on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppRef {
    pub name: AppName,
    pub id: AppId,
}

/// Order in which the deploy phase applies instance changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResizeStrategy {
    /// Upsize the new application before downsizing the old ones.
    NewFirst,
    /// Downsize old applications first, then upsize the new one.
    OldFirst,
}

/// One application's instance-count change, recorded with enough detail
/// to invert it during rollback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceResize {
    pub app_name: AppName,
    pub previous_count: u32,
    pub desired_count: u32,
}

impl InstanceResize {
    /// The same change run backwards.
    pub fn inverted(&self) -> Self {
        Self {
            app_name: self.app_name.clone(),
            previous_count: self.desired_count,
            desired_count: self.previous_count,
        }
    }
}

/// Everything the setup phase learned, persisted for the rest of the
/// workflow. `success` stays false until the setup worker activity is
/// confirmed; later phases only trust successful records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetupOutput {
    pub uuid: String,
    pub phase_name: String,
    pub new_app: AppRef,
    pub initial_instance_count: u32,
    pub downsize_apps: Vec<AppName>,
    pub max_instance_count: u32,
    pub desired_final_count: u32,
    pub resize_strategy: ResizeStrategy,
    pub final_routes: Vec<String>,
    pub temp_routes: Vec<String>,
    pub target: TargetSpace,
    #[serde(default, with = "humantime_serde::option")]
    pub timeout: Option<Duration>,
    pub success: bool,
}

/// The instance changes the deploy phase actually applied, in order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeployOutput {
    pub entries: Vec<InstanceResize>,
}
