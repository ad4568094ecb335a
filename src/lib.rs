// ABOUTME: Library root for karavi - the deployment-orchestration core.
// ABOUTME: The dry-run CLI binary is in main.rs.

pub mod error;
pub mod identity;
pub mod manifest;
pub mod phase;
pub mod resize;
pub mod routes;
pub mod settings;
pub mod sweeping;
pub mod types;
pub mod worker;
