// SPDX-License-Identifier: GPL-3.0-only

//! The live LVM view and the operations that change it
//!
//! [`LvmEngine`] owns one [`StateSnapshot`] at a time behind an `Arc`. Readers
//! clone the `Arc` and keep a consistent view for as long as they need it;
//! a refresh builds a complete new snapshot and swaps it in. After every
//! successful mutation the engine re-reads LVM instead of patching the old
//! state, and after a failed one it leaves the state untouched.
//!
//! All calls block. Methods that run tools take `&mut self`, so one engine
//! never runs two LVM tools at once.

use std::sync::Arc;

use lvsnap_sys::{CommandExecutor, LvmTool, LvmVersion, lvm};
use lvsnap_types::{LogicalVolume, StateSnapshot, VolumeRef};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::error::{EngineError, Result};
use crate::policy::{self, Actions};
use crate::usage::{self, VolumeUsage};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    CreateSnapshot,
    DeleteSnapshot,
}

/// Steps of an operation, in the order they are entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationPhase {
    Idle,
    Validating,
    Confirming,
    Executing,
    Reloading,
    Done,
    Failed,
}

/// Phases the most recent operation went through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperationTrace {
    pub kind: OperationKind,
    pub target: VolumeRef,
    pub phases: Vec<OperationPhase>,
}

impl OperationTrace {
    fn begin(kind: OperationKind, target: VolumeRef) -> Self {
        Self {
            kind,
            target,
            phases: vec![OperationPhase::Idle],
        }
    }

    fn enter(&mut self, phase: OperationPhase) {
        debug!(kind = ?self.kind, target = %self.target, ?phase, "operation phase");
        self.phases.push(phase);
    }

    pub fn current(&self) -> OperationPhase {
        self.phases.last().copied().unwrap_or(OperationPhase::Idle)
    }
}

/// Result of a completed create or delete.
#[derive(Debug, Clone, Serialize)]
pub struct OperationOutcome {
    pub kind: OperationKind,
    /// The snapshot that was created or deleted
    pub snapshot: VolumeRef,
    pub message: String,
    /// State read after the change
    #[serde(skip)]
    pub state: Arc<StateSnapshot>,
}

/// Installed LVM release compared with the newest tested one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionCheck {
    Supported(LvmVersion),
    NewerThanTested {
        found: LvmVersion,
        tested: LvmVersion,
    },
    Unknown,
}

pub struct LvmEngine<E> {
    executor: E,
    state: Arc<StateSnapshot>,
    selection: Option<VolumeRef>,
    last_operation: Option<OperationTrace>,
}

impl<E: CommandExecutor> LvmEngine<E> {
    /// Create an engine with an empty state; nothing is queried yet.
    pub fn new(executor: E) -> Self {
        Self {
            executor,
            state: Arc::new(StateSnapshot::empty()),
            selection: None,
            last_operation: None,
        }
    }

    /// Create an engine and perform the initial load.
    pub fn load(executor: E) -> Result<Self> {
        let mut engine = Self::new(executor);
        engine.refresh()?;
        Ok(engine)
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    /// The live state. The returned value never changes.
    pub fn state(&self) -> Arc<StateSnapshot> {
        Arc::clone(&self.state)
    }

    /// Re-read LVM and replace the live state.
    ///
    /// On failure the previous state stays live.
    pub fn refresh(&mut self) -> Result<Arc<StateSnapshot>> {
        let state = Arc::new(lvm::read_state(&self.executor)?);
        if state.malformed_rows > 0 {
            warn!(rows = state.malformed_rows, "skipped malformed LVM report rows");
        }
        for volume in &state.logical_volumes {
            if let lvsnap_types::OriginLookup::Missing(origin) = state.origin_of(volume) {
                warn!(snapshot = %volume.display_name(), origin, "snapshot origin not found");
            }
        }

        let selection_gone = self
            .selection
            .as_ref()
            .is_some_and(|selected| state.volume(selected).is_none());
        if selection_gone {
            debug!("selected volume gone after refresh");
            self.selection = None;
        }

        info!(
            groups = state.volume_groups.len(),
            volumes = state.logical_volumes.len(),
            snapshots = state.snapshot_count(),
            "LVM state refreshed"
        );
        self.state = Arc::clone(&state);
        Ok(state)
    }

    pub fn select(&mut self, target: VolumeRef) -> Result<()> {
        if self.state.volume(&target).is_none() {
            return Err(EngineError::VolumeNotFound(target));
        }
        self.selection = Some(target);
        Ok(())
    }

    pub fn clear_selection(&mut self) {
        self.selection = None;
    }

    pub fn selection(&self) -> Option<&VolumeRef> {
        self.selection.as_ref()
    }

    pub fn selected(&self) -> Option<&LogicalVolume> {
        self.selection
            .as_ref()
            .and_then(|target| self.state.volume(target))
    }

    fn require_selection(&self) -> Result<VolumeRef> {
        self.selection.clone().ok_or(EngineError::NothingSelected)
    }

    pub fn usage(&self, target: &VolumeRef) -> Result<VolumeUsage> {
        let volume = self
            .state
            .volume(target)
            .ok_or_else(|| EngineError::VolumeNotFound(target.clone()))?;
        Ok(usage::volume_usage(&self.state, volume))
    }

    pub fn selected_usage(&self) -> Result<VolumeUsage> {
        let target = self.require_selection()?;
        self.usage(&target)
    }

    pub fn actions(&self, volume: &LogicalVolume) -> Actions {
        Actions::for_volume(volume)
    }

    /// Most recent create/delete, if any.
    pub fn last_operation(&self) -> Option<&OperationTrace> {
        self.last_operation.as_ref()
    }

    pub fn phase(&self) -> OperationPhase {
        self.last_operation
            .as_ref()
            .map(OperationTrace::current)
            .unwrap_or(OperationPhase::Idle)
    }

    /// Snapshot the selected volume.
    pub fn create_snapshot(&mut self, name: &str, size: &str) -> Result<OperationOutcome> {
        let origin = self.require_selection()?;
        self.create_snapshot_of(&origin, name, size)
    }

    /// Snapshot `origin` as `name` with `size` of copy-on-write space.
    ///
    /// Not retried on failure: a repeated `lvcreate` after an ambiguous error
    /// could leave a duplicate snapshot behind.
    pub fn create_snapshot_of(
        &mut self,
        origin: &VolumeRef,
        name: &str,
        size: &str,
    ) -> Result<OperationOutcome> {
        let mut trace = OperationTrace::begin(OperationKind::CreateSnapshot, origin.clone());
        let result = self.run_create(&mut trace, origin, name, size);
        self.finish(trace, result)
    }

    fn run_create(
        &mut self,
        trace: &mut OperationTrace,
        origin: &VolumeRef,
        name: &str,
        size: &str,
    ) -> Result<OperationOutcome> {
        trace.enter(OperationPhase::Validating);
        let origin_volume = policy::require_snapshot_origin(&self.state, origin)?;
        let name = policy::validate_name(&self.state, origin_volume, name)?;
        let size = policy::validate_size(size)?;

        trace.enter(OperationPhase::Executing);
        let args = lvm::create_snapshot_args(origin, &name, &size);
        self.executor.run(LvmTool::Lvcreate, &args)?;
        info!(
            origin = %origin,
            snapshot = %name,
            size = %size,
            bytes = size.bytes(),
            "snapshot created"
        );

        let snapshot = VolumeRef::new(origin.vg_name.clone(), name.as_str());
        trace.enter(OperationPhase::Reloading);
        let state = self.reload_after(&snapshot)?;

        Ok(OperationOutcome {
            kind: OperationKind::CreateSnapshot,
            message: format!("Snapshot '{name}' created successfully."),
            snapshot,
            state,
        })
    }

    /// Delete the selected snapshot.
    pub fn delete_snapshot(&mut self, confirmed: bool) -> Result<OperationOutcome> {
        let target = self.require_selection()?;
        self.delete_snapshot_of(&target, confirmed)
    }

    /// Delete the snapshot `target`.
    ///
    /// The engine never prompts; `confirmed` must come from the caller's own
    /// confirmation step.
    pub fn delete_snapshot_of(
        &mut self,
        target: &VolumeRef,
        confirmed: bool,
    ) -> Result<OperationOutcome> {
        let mut trace = OperationTrace::begin(OperationKind::DeleteSnapshot, target.clone());
        let result = self.run_delete(&mut trace, target, confirmed);
        self.finish(trace, result)
    }

    fn run_delete(
        &mut self,
        trace: &mut OperationTrace,
        target: &VolumeRef,
        confirmed: bool,
    ) -> Result<OperationOutcome> {
        trace.enter(OperationPhase::Confirming);
        policy::require_snapshot(&self.state, target)?;
        policy::require_confirmation(target, confirmed)?;

        trace.enter(OperationPhase::Executing);
        self.executor
            .run(LvmTool::Lvremove, &lvm::remove_snapshot_args(target))?;
        info!(snapshot = %target, "snapshot deleted");

        trace.enter(OperationPhase::Reloading);
        let state = self.reload_after(target)?;

        Ok(OperationOutcome {
            kind: OperationKind::DeleteSnapshot,
            message: format!("Snapshot '{}' deleted successfully.", target.lv_name),
            snapshot: target.clone(),
            state,
        })
    }

    fn reload_after(&mut self, changed: &VolumeRef) -> Result<Arc<StateSnapshot>> {
        self.refresh().inspect_err(|err| {
            error!(volume = %changed, %err, "LVM changed but the state could not be re-read");
        })
    }

    fn finish(
        &mut self,
        mut trace: OperationTrace,
        result: Result<OperationOutcome>,
    ) -> Result<OperationOutcome> {
        match &result {
            Ok(_) => trace.enter(OperationPhase::Done),
            Err(err) => {
                warn!(kind = ?trace.kind, target = %trace.target, %err, "operation failed");
                trace.enter(OperationPhase::Failed);
            }
        }
        self.last_operation = Some(trace);
        result
    }

    /// Compare the installed LVM release with `tested`.
    pub fn check_version(&mut self, tested: &LvmVersion) -> VersionCheck {
        let found = match lvm::query_version(&self.executor) {
            Ok(Some(found)) => found,
            Ok(None) => {
                debug!("lvm version reported no release line");
                return VersionCheck::Unknown;
            }
            Err(err) => {
                debug!(%err, "could not determine LVM version");
                return VersionCheck::Unknown;
            }
        };

        if &found > tested {
            warn!(
                found = %found,
                tested = %tested,
                "LVM is newer than the tested release; some features may not work as expected"
            );
            VersionCheck::NewerThanTested {
                found,
                tested: tested.clone(),
            }
        } else {
            VersionCheck::Supported(found)
        }
    }
}
