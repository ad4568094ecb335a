// ABOUTME: Cross-phase key/value records passed between workflow phases.
// ABOUTME: Defines the composite key, record types, and the store interface.

mod bridge;
mod memory;

pub use bridge::{BridgeError, NoHistory, PhaseHistory, PhaseHistoryEntry, SweepingBridge};
pub use memory::MemoryStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use snafu::Snafu;
use std::fmt;

use crate::identity::InfoVariables;
use crate::phase::{DeployOutput, SetupOutput};
use crate::types::{AppId, ExecutionId, RecordId};

/// Base name of the Setup phase's persisted output; phase-qualified by key
/// construction.
pub const SETUP_OUTPUT_NAME: &str = "setupOutput";
/// Base name of the Deploy phase's persisted output.
pub const DEPLOY_OUTPUT_NAME: &str = "deployOutput";

/// Errors from the sweeping-output store itself.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum StoreError {
    #[snafu(display("sweeping-output store unavailable: {message}"))]
    Unavailable { message: String },

    #[snafu(display("no record with id {id} for application {app_id}"))]
    NotFound { app_id: String, id: String },
}

/// Composite key: (application id, workflow-execution id, phase-qualified name).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OutputKey {
    pub app_id: AppId,
    pub execution_id: ExecutionId,
    pub name: String,
}

impl OutputKey {
    pub fn new(app_id: AppId, execution_id: ExecutionId, name: impl Into<String>) -> Self {
        Self {
            app_id,
            execution_id,
            name: name.into(),
        }
    }

    /// Key for a phase's Setup output.
    pub fn setup(app_id: AppId, execution_id: ExecutionId, phase_name: &str) -> Self {
        Self::new(app_id, execution_id, format!("{SETUP_OUTPUT_NAME} {}", phase_name.trim()))
    }

    /// Key for a phase's Deploy output.
    pub fn deploy(app_id: AppId, execution_id: ExecutionId, phase_name: &str) -> Self {
        Self::new(app_id, execution_id, format!("{DEPLOY_OUTPUT_NAME} {}", phase_name.trim()))
    }

    /// Key for the workflow-scoped identity state.
    pub fn identity(app_id: AppId, execution_id: ExecutionId) -> Self {
        Self::new(app_id, execution_id, crate::identity::INFO_OUTPUT_NAME)
    }
}

impl fmt::Display for OutputKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.app_id, self.execution_id, self.name)
    }
}

/// The payloads a sweeping record can carry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum SweepingValue {
    Setup(SetupOutput),
    Deploy(DeployOutput),
    Identity(InfoVariables),
}

/// One persisted sweeping-output record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepingRecord {
    pub id: RecordId,
    pub key: OutputKey,
    pub value: SweepingValue,
    pub created_at: DateTime<Utc>,
}

impl SweepingRecord {
    pub fn new(id: RecordId, key: OutputKey, value: SweepingValue) -> Self {
        Self {
            id,
            key,
            value,
            created_at: Utc::now(),
        }
    }
}

/// The sweeping-output store the surrounding platform provides.
///
/// Only whole-record semantics exist; there is no partial update.
#[async_trait]
pub trait SweepingStore: Send + Sync {
    async fn find(&self, key: &OutputKey) -> Result<Option<SweepingRecord>, StoreError>;

    /// Insert the record unless one already exists under its key.
    async fn ensure(&self, record: SweepingRecord) -> Result<(), StoreError>;

    async fn delete_by_id(&self, app_id: &AppId, id: &RecordId) -> Result<(), StoreError>;

    async fn save(&self, record: SweepingRecord) -> Result<RecordId, StoreError>;

    /// Replace whatever record exists under the key with this one.
    ///
    /// The default implementation is the legacy read-delete-reinsert
    /// sequence and is not atomic; stores that can replace atomically
    /// should override it.
    async fn upsert(&self, record: SweepingRecord) -> Result<(), StoreError> {
        if let Some(existing) = self.find(&record.key).await? {
            self.delete_by_id(&existing.key.app_id, &existing.id).await?;
        }
        self.ensure(record).await
    }
}
