// Copyright (c) 2025 - Cowboy AI, Inc.
//! Run-scoped state
//!
//! A [`RunContext`] lives for exactly one orchestration call. It owns the
//! run's state machine and every object discovered or created along the
//! way; nothing in it is shared with other runs. On success it is turned
//! into a [`RunReport`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::control_plane::{
    DatacenterFolders, Entity, HostMemberSpec, ManagedObjectRef, PortBinding, TaskHandle,
};
use crate::errors::{ProvisioningError, ProvisioningResult};
use crate::state_machine::{
    ProvisioningInput, ProvisioningState, StateMachineWithHistory, Step, Transition,
    TransitionError,
};
use crate::task_waiter::deadline_after;

/// Distributed switch created by the run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwitchHandle {
    pub reference: ManagedObjectRef,
    pub name: String,
    /// Configuration version observed last
    pub config_version: String,
}

/// Port group created by the run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortGroupHandle {
    pub name: String,
    pub binding: PortBinding,
    pub num_ports: u32,
    /// Task that created it
    pub task: TaskHandle,
    /// Reference returned by the task, when the control plane reports one
    pub reference: Option<ManagedObjectRef>,
}

/// Outcome of a successful run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: Uuid,
    pub topology: String,
    pub datacenter: Entity,
    pub cluster: Entity,
    /// Hosts whose firewall was disabled, in topology order
    pub firewalls_disabled: Vec<String>,
    pub switch: SwitchHandle,
    /// Port groups in creation order
    pub port_groups: Vec<PortGroupHandle>,
    /// Uplink bindings applied by the single reconfiguration
    pub uplinks: Vec<HostMemberSpec>,
    pub transitions: Vec<Transition<ProvisioningState, ProvisioningInput>>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// State of one orchestration run
#[derive(Debug)]
pub struct RunContext {
    run_id: Uuid,
    topology: String,
    started_at: DateTime<Utc>,
    deadline: Instant,
    cancel: CancellationToken,
    fsm: StateMachineWithHistory<ProvisioningState>,

    datacenter: Option<Entity>,
    folders: Option<DatacenterFolders>,
    cluster: Option<Entity>,
    firewalls_disabled: Vec<String>,
    switch: Option<SwitchHandle>,
    port_groups: Vec<PortGroupHandle>,
    uplinks: Vec<HostMemberSpec>,
}

impl RunContext {
    pub fn new(topology: impl Into<String>, budget: Duration, cancel: CancellationToken) -> Self {
        Self {
            run_id: Uuid::now_v7(),
            topology: topology.into(),
            started_at: Utc::now(),
            deadline: deadline_after(Instant::now(), budget),
            cancel,
            fsm: StateMachineWithHistory::new(ProvisioningState::Idle),
            datacenter: None,
            folders: None,
            cluster: None,
            firewalls_disabled: Vec::new(),
            switch: None,
            port_groups: Vec::new(),
            uplinks: Vec::new(),
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Token task waits observe; firing it ends the run at the current step
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn state(&self) -> &ProvisioningState {
        self.fsm.current_state()
    }

    /// Feed a step outcome to the state machine; returns the next step
    pub fn advance(&mut self, input: ProvisioningInput) -> ProvisioningResult<Option<Step>> {
        Ok(self.fsm.transition_with_history(input, Utc::now())?)
    }

    /// Move to `Failed`, recording the step that was running
    pub fn fail(&mut self) -> Option<Step> {
        let step = self.state().step();
        // Already terminal: nothing to record
        let _ = self
            .fsm
            .transition_with_history(ProvisioningInput::StepFailed, Utc::now());
        step
    }

    /// Refuse to start `step` once cancelled or past the run deadline
    pub fn checkpoint(&self, step: Step) -> ProvisioningResult<()> {
        if self.cancel.is_cancelled() || Instant::now() >= self.deadline {
            return Err(ProvisioningError::Cancelled { step });
        }
        Ok(())
    }

    /// Run `operation`, abandoning it once the run deadline passes.
    /// Abandoning only stops observing: a control plane task that was
    /// already issued keeps running.
    pub async fn guard<T, F>(&self, step: Step, operation: F) -> ProvisioningResult<T>
    where
        F: Future<Output = ProvisioningResult<T>>,
    {
        tokio::select! {
            biased;
            _ = tokio::time::sleep_until(self.deadline) => Err(ProvisioningError::Cancelled { step }),
            result = operation => result,
        }
    }

    pub fn set_datacenter(&mut self, datacenter: Entity, folders: DatacenterFolders) {
        self.datacenter = Some(datacenter);
        self.folders = Some(folders);
    }

    pub fn folders(&self) -> ProvisioningResult<&DatacenterFolders> {
        self.folders.as_ref().ok_or_else(|| missing("datacenter folders"))
    }

    pub fn set_cluster(&mut self, cluster: Entity) {
        self.cluster = Some(cluster);
    }

    pub fn cluster(&self) -> ProvisioningResult<&Entity> {
        self.cluster.as_ref().ok_or_else(|| missing("cluster"))
    }

    pub fn set_firewalls_disabled(&mut self, hosts: Vec<String>) {
        self.firewalls_disabled = hosts;
    }

    pub fn set_switch(&mut self, switch: SwitchHandle) {
        self.switch = Some(switch);
    }

    pub fn switch(&self) -> ProvisioningResult<&SwitchHandle> {
        self.switch.as_ref().ok_or_else(|| missing("distributed switch"))
    }

    /// Record the configuration version read before reconfiguring
    pub fn set_switch_config_version(&mut self, version: String) -> ProvisioningResult<()> {
        let switch = self.switch.as_mut().ok_or_else(|| missing("distributed switch"))?;
        switch.config_version = version;
        Ok(())
    }

    pub fn push_port_group(&mut self, port_group: PortGroupHandle) {
        self.port_groups.push(port_group);
    }

    pub fn set_uplinks(&mut self, uplinks: Vec<HostMemberSpec>) {
        self.uplinks = uplinks;
    }

    /// Snapshot of a completed run
    pub fn into_report(self) -> ProvisioningResult<RunReport> {
        if *self.fsm.current_state() != ProvisioningState::Complete {
            return Err(TransitionError::PreconditionFailed(format!(
                "run is {}, not Complete",
                self.fsm.current_state()
            ))
            .into());
        }

        let datacenter = self.datacenter.ok_or_else(|| missing("datacenter"))?;
        let cluster = self.cluster.ok_or_else(|| missing("cluster"))?;
        let switch = self.switch.ok_or_else(|| missing("distributed switch"))?;

        Ok(RunReport {
            run_id: self.run_id,
            topology: self.topology,
            datacenter,
            cluster,
            firewalls_disabled: self.firewalls_disabled,
            switch,
            port_groups: self.port_groups,
            uplinks: self.uplinks,
            transitions: self.fsm.into_history(),
            started_at: self.started_at,
            finished_at: Utc::now(),
        })
    }
}

fn missing(what: &str) -> ProvisioningError {
    TransitionError::PreconditionFailed(format!("{} not yet available", what)).into()
}
