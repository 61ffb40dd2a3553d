// Copyright (c) 2025 - Cowboy AI, Inc.
//! Test Fixtures for testbed-provisioning
//!
//! In-memory control plane and host agent that record every call into one
//! shared, ordered log. All identifiers are fixed constants so call
//! sequences can be asserted exactly.
//!
//! # Design Principles
//! - Fakes never sleep; task progress is driven by polling only
//! - Failures are configured up front through [`FakeInventory`]
//! - Tests assert on the [`Call`] log, never on fake internals
#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use testbed_provisioning::control_plane::{
    CommandOutput, ControlPlaneClient, ControlPlaneError, DatacenterFolders, DvsCreateSpec,
    DvsReconfigureSpec, Entity, EntityKind, HostAgent, HostAgentError, ManagedObjectRef,
    PortGroupSpec, TaskHandle, TaskInfo, TaskResult, TaskState,
};
use testbed_provisioning::domain::{vsan_testbed, TestbedParams, Topology};
use testbed_provisioning::orchestrator::{OrchestratorConfig, ProvisioningOrchestrator};
use testbed_provisioning::task_waiter::WaitConfig;

pub const ROOT_FOLDER: &str = "group-d1";
pub const DATACENTER: &str = "datacenter-2";
pub const HOST_FOLDER: &str = "group-h4";
pub const NETWORK_FOLDER: &str = "group-n5";
pub const CLUSTER: &str = "domain-c7";
pub const SWITCH: &str = "dvs-20";

pub fn root_folder() -> ManagedObjectRef {
    ManagedObjectRef::new(EntityKind::Folder, ROOT_FOLDER)
}

pub fn host_folder() -> ManagedObjectRef {
    ManagedObjectRef::new(EntityKind::Folder, HOST_FOLDER)
}

pub fn network_folder() -> ManagedObjectRef {
    ManagedObjectRef::new(EntityKind::Folder, NETWORK_FOLDER)
}

pub fn switch_ref() -> ManagedObjectRef {
    ManagedObjectRef::new(EntityKind::DistributedSwitch, SWITCH)
}

pub fn cluster_host(index: usize) -> ManagedObjectRef {
    ManagedObjectRef::new(EntityKind::Host, format!("host-{}", 10 + index))
}

/// One recorded collaborator call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    ListChildren(ManagedObjectRef),
    DatacenterFolders(ManagedObjectRef),
    ClusterHosts(ManagedObjectRef),
    CreateSwitch {
        folder: ManagedObjectRef,
        name: String,
    },
    AddPortGroup {
        switch: ManagedObjectRef,
        spec: PortGroupSpec,
    },
    ReconfigureSwitch {
        switch: ManagedObjectRef,
        spec: DvsReconfigureSpec,
    },
    SwitchConfigVersion(ManagedObjectRef),
    TaskInfo(TaskHandle),
    RemoteCommand {
        host: String,
        command: String,
    },
}

impl Call {
    /// Calls that change control plane or host state
    pub fn is_mutating(&self) -> bool {
        matches!(
            self,
            Call::CreateSwitch { .. }
                | Call::AddPortGroup { .. }
                | Call::ReconfigureSwitch { .. }
                | Call::RemoteCommand { .. }
        )
    }

    /// Calls that read state without changing it
    pub fn is_poll(&self) -> bool {
        matches!(self, Call::TaskInfo(_) | Call::SwitchConfigVersion(_))
    }
}

/// Ordered log shared by both fakes
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<Call>>>);

impl CallLog {
    pub fn push(&self, call: Call) {
        self.0.lock().unwrap().push(call);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.0.lock().unwrap().clone()
    }

    /// Calls with task polling and version reads filtered out
    pub fn actions(&self) -> Vec<Call> {
        self.calls().into_iter().filter(|c| !c.is_poll()).collect()
    }

    pub fn mutating(&self) -> Vec<Call> {
        self.calls().into_iter().filter(Call::is_mutating).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.0.lock().unwrap().is_empty()
    }
}

/// Shape of the fake inventory and the failures to inject
#[derive(Debug, Clone)]
pub struct FakeInventory {
    pub datacenters: usize,
    pub clusters: usize,
    pub cluster_hosts: usize,
    /// Port group whose creation task fails
    pub failing_port_group: Option<String>,
    /// Host whose firewall command exits non-zero
    pub failing_host: Option<String>,
    /// Every task stays `Running` forever
    pub tasks_never_finish: bool,
}

impl Default for FakeInventory {
    fn default() -> Self {
        Self {
            datacenters: 1,
            clusters: 1,
            cluster_hosts: 4,
            failing_port_group: None,
            failing_host: None,
            tasks_never_finish: false,
        }
    }
}

/// In-memory control plane
pub struct RecordingControlPlane {
    inventory: FakeInventory,
    log: CallLog,
    next_task: AtomicU32,
    tasks: Mutex<HashMap<String, TaskState>>,
    config_version: AtomicU32,
}

impl RecordingControlPlane {
    pub fn new(inventory: FakeInventory, log: CallLog) -> Self {
        Self {
            inventory,
            log,
            next_task: AtomicU32::new(1),
            tasks: Mutex::new(HashMap::new()),
            config_version: AtomicU32::new(1),
        }
    }

    fn start_task(&self, outcome: TaskState) -> TaskHandle {
        let id = format!("task-{}", self.next_task.fetch_add(1, Ordering::SeqCst));
        let state = if self.inventory.tasks_never_finish {
            TaskState::Running
        } else {
            outcome
        };
        self.tasks.lock().unwrap().insert(id.clone(), state);
        TaskHandle::new(id)
    }

    /// Last state recorded for a task; untouched once issued unless it finishes
    pub fn task_state(&self, id: &str) -> Option<TaskState> {
        self.tasks.lock().unwrap().get(id).cloned()
    }

    fn current_version(&self) -> String {
        self.config_version.load(Ordering::SeqCst).to_string()
    }

    fn bump_version(&self) {
        self.config_version.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ControlPlaneClient for RecordingControlPlane {
    fn root_folder(&self) -> ManagedObjectRef {
        root_folder()
    }

    async fn list_child_entities(
        &self,
        container: &ManagedObjectRef,
    ) -> Result<Vec<Entity>, ControlPlaneError> {
        self.log.push(Call::ListChildren(container.clone()));

        let entity = |kind, id: String, name: String| Entity {
            reference: ManagedObjectRef::new(kind, id),
            name,
        };

        match container.id.as_str() {
            ROOT_FOLDER => {
                let mut children = vec![entity(
                    EntityKind::Folder,
                    "group-d9".to_string(),
                    "Templates".to_string(),
                )];
                children.extend((0..self.inventory.datacenters).map(|i| {
                    entity(
                        EntityKind::Datacenter,
                        if i == 0 {
                            DATACENTER.to_string()
                        } else {
                            format!("datacenter-{}", 100 + i)
                        },
                        format!("dc{}", i + 1),
                    )
                }));
                Ok(children)
            }
            HOST_FOLDER => {
                let mut children = vec![entity(
                    EntityKind::Host,
                    "host-99".to_string(),
                    "standalone".to_string(),
                )];
                children.extend((0..self.inventory.clusters).map(|i| {
                    entity(
                        EntityKind::Cluster,
                        if i == 0 {
                            CLUSTER.to_string()
                        } else {
                            format!("domain-c{}", 100 + i)
                        },
                        if i == 0 {
                            "cls".to_string()
                        } else {
                            format!("cls{}", i)
                        },
                    )
                }));
                Ok(children)
            }
            _ => Err(ControlPlaneError::NotFound(container.clone())),
        }
    }

    async fn datacenter_folders(
        &self,
        datacenter: &ManagedObjectRef,
    ) -> Result<DatacenterFolders, ControlPlaneError> {
        self.log.push(Call::DatacenterFolders(datacenter.clone()));
        Ok(DatacenterFolders {
            host_folder: host_folder(),
            network_folder: network_folder(),
        })
    }

    async fn cluster_hosts(
        &self,
        cluster: &ManagedObjectRef,
    ) -> Result<Vec<ManagedObjectRef>, ControlPlaneError> {
        self.log.push(Call::ClusterHosts(cluster.clone()));
        Ok((0..self.inventory.cluster_hosts).map(cluster_host).collect())
    }

    async fn create_distributed_switch(
        &self,
        network_folder: &ManagedObjectRef,
        spec: DvsCreateSpec,
    ) -> Result<TaskHandle, ControlPlaneError> {
        self.log.push(Call::CreateSwitch {
            folder: network_folder.clone(),
            name: spec.name,
        });
        Ok(self.start_task(TaskState::Success {
            result: TaskResult::Entity(switch_ref()),
        }))
    }

    async fn add_port_group(
        &self,
        switch: &ManagedObjectRef,
        spec: PortGroupSpec,
    ) -> Result<TaskHandle, ControlPlaneError> {
        let fails = self.inventory.failing_port_group.as_deref() == Some(spec.name.as_str());
        let task_number = self.next_task.load(Ordering::SeqCst);
        self.log.push(Call::AddPortGroup {
            switch: switch.clone(),
            spec,
        });

        let outcome = if fails {
            TaskState::Error {
                cause: "DuplicateName".to_string(),
            }
        } else {
            self.bump_version();
            TaskState::Success {
                result: TaskResult::Entity(ManagedObjectRef::new(
                    EntityKind::PortGroup,
                    format!("dvportgroup-{}", task_number),
                )),
            }
        };
        Ok(self.start_task(outcome))
    }

    async fn reconfigure_switch(
        &self,
        switch: &ManagedObjectRef,
        spec: DvsReconfigureSpec,
    ) -> Result<TaskHandle, ControlPlaneError> {
        let stale = spec.config_version != self.current_version();
        self.log.push(Call::ReconfigureSwitch {
            switch: switch.clone(),
            spec,
        });

        let outcome = if stale {
            TaskState::Error {
                cause: "ConcurrentModification".to_string(),
            }
        } else {
            self.bump_version();
            TaskState::Success {
                result: TaskResult::None,
            }
        };
        Ok(self.start_task(outcome))
    }

    async fn switch_config_version(
        &self,
        switch: &ManagedObjectRef,
    ) -> Result<String, ControlPlaneError> {
        self.log.push(Call::SwitchConfigVersion(switch.clone()));
        Ok(self.current_version())
    }

    async fn task_info(&self, task: &TaskHandle) -> Result<TaskInfo, ControlPlaneError> {
        self.log.push(Call::TaskInfo(task.clone()));
        let tasks = self.tasks.lock().unwrap();
        match tasks.get(task.id()) {
            Some(state) => Ok(TaskInfo {
                task: task.clone(),
                state: state.clone(),
            }),
            None => Err(ControlPlaneError::Rejected(format!("unknown task {}", task))),
        }
    }
}

/// In-memory host agent
pub struct RecordingHostAgent {
    failing_host: Option<String>,
    log: CallLog,
}

impl RecordingHostAgent {
    pub fn new(failing_host: Option<String>, log: CallLog) -> Self {
        Self { failing_host, log }
    }
}

#[async_trait]
impl HostAgent for RecordingHostAgent {
    async fn execute_remote_command(
        &self,
        host: &str,
        command: &str,
    ) -> Result<CommandOutput, HostAgentError> {
        self.log.push(Call::RemoteCommand {
            host: host.to_string(),
            command: command.to_string(),
        });

        if self.failing_host.as_deref() == Some(host) {
            return Ok(CommandOutput {
                exit_status: 1,
                stdout: String::new(),
                stderr: "Connection refused\n".to_string(),
            });
        }
        Ok(CommandOutput {
            exit_status: 0,
            stdout: String::new(),
            stderr: String::new(),
        })
    }
}

/// Configuration with a short task deadline for paused-clock tests
pub fn test_config() -> OrchestratorConfig {
    OrchestratorConfig {
        task_wait: WaitConfig::new(Duration::from_millis(100), Duration::from_secs(5)),
        ..Default::default()
    }
}

/// Orchestrator wired to fresh recording fakes
pub fn harness(inventory: FakeInventory) -> (ProvisioningOrchestrator, CallLog) {
    harness_with_config(inventory, test_config())
}

pub fn harness_with_config(
    inventory: FakeInventory,
    config: OrchestratorConfig,
) -> (ProvisioningOrchestrator, CallLog) {
    let (orchestrator, log, _) = harness_with_client(inventory, config);
    (orchestrator, log)
}

/// Like [`harness_with_config`], also handing back the control plane fake
pub fn harness_with_client(
    inventory: FakeInventory,
    config: OrchestratorConfig,
) -> (ProvisioningOrchestrator, CallLog, Arc<RecordingControlPlane>) {
    let log = CallLog::default();
    let agent = RecordingHostAgent::new(inventory.failing_host.clone(), log.clone());
    let client = Arc::new(RecordingControlPlane::new(inventory, log.clone()));
    let orchestrator = ProvisioningOrchestrator::new(client.clone(), Arc::new(agent), config);
    (orchestrator, log, client)
}

/// The canonical 4-host vSAN testbed
pub fn canonical_testbed() -> Topology {
    vsan_testbed(&TestbedParams::default()).expect("canonical testbed is valid")
}
