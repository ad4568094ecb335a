// ABOUTME: Phase-aware access to the sweeping-output store.
// ABOUTME: Walks phase history with infrastructure-identity validation between repeated phases.

use thiserror::Error;
use tracing::debug;

use super::{OutputKey, StoreError, SweepingRecord, SweepingStore, SweepingValue};
use crate::error::ConfigError;
use crate::identity::InfoVariables;
use crate::phase::{DeployOutput, PhaseContext, SetupOutput};
use crate::types::{RecordId, TargetSpace};

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// One earlier phase execution, as recorded by the workflow engine.
#[derive(Debug, Clone)]
pub struct PhaseHistoryEntry {
    pub phase_name: String,
    pub service_id: String,
    pub target: TargetSpace,
}

/// Engine-provided lookup of the nearest earlier phase execution. This crate
/// never owns phase-history storage.
pub trait PhaseHistory: Send + Sync {
    fn previous_phase(&self, phase_name: &str) -> Option<PhaseHistoryEntry>;
}

/// History lookup for workflows without repeated phases.
pub struct NoHistory;

impl PhaseHistory for NoHistory {
    fn previous_phase(&self, _phase_name: &str) -> Option<PhaseHistoryEntry> {
        None
    }
}

/// Bridge between phase logic and the sweeping-output store.
pub struct SweepingBridge<'a> {
    store: &'a dyn SweepingStore,
}

impl<'a> SweepingBridge<'a> {
    pub fn new(store: &'a dyn SweepingStore) -> Self {
        Self { store }
    }

    /// Locate the SetupOutput governing this phase.
    ///
    /// A missing record under the current phase name is not a failure: when
    /// no earlier phase execution exists either, this is the first phase for
    /// the service and the caller creates fresh state. When an earlier phase
    /// does exist, it must have deployed the same service into the same
    /// organization/space/endpoint; any mismatch is fatal.
    pub async fn find_setup_output(
        &self,
        ctx: &PhaseContext,
        history: &dyn PhaseHistory,
    ) -> Result<Option<SetupOutput>, BridgeError> {
        let mut phase_name = ctx.lookup_phase_name();

        loop {
            let key = OutputKey::setup(ctx.app_id.clone(), ctx.execution_id.clone(), &phase_name);
            if let Some(record) = self.store.find(&key).await? {
                if let SweepingValue::Setup(setup) = record.value {
                    return Ok(Some(setup));
                }
            }

            let Some(previous) = history.previous_phase(&phase_name) else {
                debug!(phase = %phase_name, "no setup output and no earlier phase, treating as first phase");
                return Ok(None);
            };

            if previous.service_id != ctx.service_id || previous.target != ctx.target {
                return Err(ConfigError::InconsistentInfrastructure {
                    current_phase: phase_name,
                    previous_phase: previous.phase_name,
                }
                .into());
            }

            phase_name = ctx.adjust_phase_name(&previous.phase_name);
        }
    }

    pub async fn save_setup_output(
        &self,
        ctx: &PhaseContext,
        setup: SetupOutput,
    ) -> Result<RecordId, BridgeError> {
        let key = OutputKey::setup(
            ctx.app_id.clone(),
            ctx.execution_id.clone(),
            &ctx.lookup_phase_name(),
        );
        let record = SweepingRecord::new(RecordId::new(""), key, SweepingValue::Setup(setup));
        Ok(self.store.save(record).await?)
    }

    /// Flip the success flag on the recorded SetupOutput; the only mutation
    /// later phases ever perform on it.
    pub async fn mark_setup_success(&self, ctx: &PhaseContext) -> Result<(), BridgeError> {
        let key = OutputKey::setup(
            ctx.app_id.clone(),
            ctx.execution_id.clone(),
            &ctx.lookup_phase_name(),
        );
        if let Some(record) = self.store.find(&key).await? {
            if let SweepingValue::Setup(mut setup) = record.value {
                setup.success = true;
                let replacement =
                    SweepingRecord::new(record.id, record.key, SweepingValue::Setup(setup));
                self.store.upsert(replacement).await?;
            }
        }
        Ok(())
    }

    pub async fn find_deploy_output(
        &self,
        ctx: &PhaseContext,
    ) -> Result<Option<DeployOutput>, BridgeError> {
        let key = OutputKey::deploy(
            ctx.app_id.clone(),
            ctx.execution_id.clone(),
            &ctx.lookup_phase_name(),
        );
        match self.store.find(&key).await? {
            Some(SweepingRecord {
                value: SweepingValue::Deploy(deploy),
                ..
            }) => Ok(Some(deploy)),
            _ => Ok(None),
        }
    }

    pub async fn save_deploy_output(
        &self,
        ctx: &PhaseContext,
        deploy: DeployOutput,
    ) -> Result<RecordId, BridgeError> {
        let key = OutputKey::deploy(
            ctx.app_id.clone(),
            ctx.execution_id.clone(),
            &ctx.lookup_phase_name(),
        );
        let record = SweepingRecord::new(RecordId::new(""), key, SweepingValue::Deploy(deploy));
        Ok(self.store.save(record).await?)
    }

    pub async fn find_identity(
        &self,
        ctx: &PhaseContext,
    ) -> Result<Option<InfoVariables>, BridgeError> {
        let key = OutputKey::identity(ctx.app_id.clone(), ctx.execution_id.clone());
        match self.store.find(&key).await? {
            Some(SweepingRecord {
                value: SweepingValue::Identity(info),
                ..
            }) => Ok(Some(info)),
            _ => Ok(None),
        }
    }

    /// Persist identity state, replacing any previous record under the key.
    pub async fn store_identity(
        &self,
        ctx: &PhaseContext,
        info: InfoVariables,
    ) -> Result<(), BridgeError> {
        let key = OutputKey::identity(ctx.app_id.clone(), ctx.execution_id.clone());
        let record = SweepingRecord::new(RecordId::new(""), key, SweepingValue::Identity(info));
        Ok(self.store.upsert(record).await?)
    }
}
