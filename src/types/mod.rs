// ABOUTME: Validated domain types shared across modules.
// ABOUTME: Exports newtypes for identifiers, application names, and deployment targets.

mod app_name;
mod id;
mod target;

pub use app_name::{AppName, AppNameError, NamePolicy};
pub use id::{ActivityId, AppId, ExecutionId, RecordId};
pub use target::TargetSpace;
