// Copyright (c) 2025 - Cowboy AI, Inc.
//! Control plane and host agent contracts
//!
//! The orchestrator never talks to vCenter or to an ESX host directly. The
//! test harness hands it an already-connected [`ControlPlaneClient`] and
//! [`HostAgent`]; this module defines what those collaborators must offer
//! and the request/response types exchanged with them.
//!
//! Mutating control plane calls return a [`TaskHandle`] immediately. The
//! operation itself runs server-side and is observed through
//! [`ControlPlaneClient::task_info`] (see [`crate::task_waiter`]).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of an inventory object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Folder,
    Datacenter,
    Cluster,
    Host,
    DistributedSwitch,
    PortGroup,
    Other,
}

/// Opaque reference to a server-side inventory object
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ManagedObjectRef {
    pub kind: EntityKind,
    pub id: String,
}

impl ManagedObjectRef {
    pub fn new(kind: EntityKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }
}

impl fmt::Display for ManagedObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}:{}", self.kind, self.id)
    }
}

/// Inventory object as listed under a container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub reference: ManagedObjectRef,
    pub name: String,
}

impl Entity {
    pub fn kind(&self) -> EntityKind {
        self.reference.kind
    }
}

/// Folders owned by a datacenter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatacenterFolders {
    /// Holds clusters and standalone hosts
    pub host_folder: ManagedObjectRef,
    /// Holds switches and port groups
    pub network_folder: ManagedObjectRef,
}

/// Handle of an asynchronously executing control plane operation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskHandle(pub String);

impl TaskHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn id(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Value a task reports on success
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum TaskResult {
    /// The task completed without a result object
    None,
    /// The task created (or returned) an inventory object
    Entity(ManagedObjectRef),
}

impl TaskResult {
    pub fn entity(&self) -> Option<&ManagedObjectRef> {
        match self {
            TaskResult::Entity(reference) => Some(reference),
            TaskResult::None => None,
        }
    }
}

/// Task progress as reported by the control plane
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TaskState {
    Queued,
    Running,
    Success { result: TaskResult },
    Error { cause: String },
}

impl TaskState {
    /// Success and error are the only terminal states
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Success { .. } | TaskState::Error { .. })
    }
}

/// Snapshot of a task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskInfo {
    pub task: TaskHandle,
    pub state: TaskState,
}

/// Port allocation lifecycle of a port group
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PortBinding {
    /// Ports are allocated when the port group is created
    #[default]
    EarlyBinding,
    /// Ports are allocated when a VM is powered on
    Ephemeral,
}

/// Request to create a distributed switch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DvsCreateSpec {
    pub name: String,
}

/// Request to add one port group to a distributed switch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortGroupSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub binding: PortBinding,
    pub num_ports: u32,
}

/// Membership change applied to a host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostMemberOperation {
    Add,
    Edit,
    Remove,
}

/// Physical NICs a host contributes as uplinks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PnicBacking {
    pub pnic_devices: Vec<String>,
}

/// Per-host entry of a switch reconfiguration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostMemberSpec {
    pub operation: HostMemberOperation,
    pub host: ManagedObjectRef,
    pub backing: PnicBacking,
}

/// Request to reconfigure a distributed switch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DvsReconfigureSpec {
    /// Must match the switch's current configuration version
    pub config_version: String,
    pub hosts: Vec<HostMemberSpec>,
}

/// Result of a remote command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOutput {
    pub exit_status: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_status == 0
    }
}

/// Errors raised by a control plane client
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ControlPlaneError {
    /// The session is no longer usable
    #[error("Control plane connection error: {0}")]
    Connection(String),

    /// The referenced object does not exist
    #[error("Managed object not found: {0}")]
    NotFound(ManagedObjectRef),

    /// The server refused the request
    #[error("Control plane rejected request: {0}")]
    Rejected(String),
}

/// Errors raised by a host agent
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HostAgentError {
    #[error("Host {host} unreachable: {reason}")]
    Unreachable { host: String, reason: String },

    #[error("Remote command on {host} failed: {reason}")]
    Execution { host: String, reason: String },
}

/// Virtualization control plane session
///
/// Implementations are provided by the harness and already connected and
/// authenticated. The orchestrator only calls these methods and interprets
/// their results.
#[async_trait]
pub trait ControlPlaneClient: Send + Sync {
    /// Root folder of the inventory
    fn root_folder(&self) -> ManagedObjectRef;

    /// Direct children of a container (folder, datacenter, ...)
    async fn list_child_entities(
        &self,
        container: &ManagedObjectRef,
    ) -> Result<Vec<Entity>, ControlPlaneError>;

    /// Host and network folders of a datacenter
    async fn datacenter_folders(
        &self,
        datacenter: &ManagedObjectRef,
    ) -> Result<DatacenterFolders, ControlPlaneError>;

    /// Hosts that are members of a cluster, in inventory order
    async fn cluster_hosts(
        &self,
        cluster: &ManagedObjectRef,
    ) -> Result<Vec<ManagedObjectRef>, ControlPlaneError>;

    /// Start creating a distributed switch in a network folder
    async fn create_distributed_switch(
        &self,
        network_folder: &ManagedObjectRef,
        spec: DvsCreateSpec,
    ) -> Result<TaskHandle, ControlPlaneError>;

    /// Start adding a port group to a switch
    async fn add_port_group(
        &self,
        switch: &ManagedObjectRef,
        spec: PortGroupSpec,
    ) -> Result<TaskHandle, ControlPlaneError>;

    /// Start reconfiguring a switch
    async fn reconfigure_switch(
        &self,
        switch: &ManagedObjectRef,
        spec: DvsReconfigureSpec,
    ) -> Result<TaskHandle, ControlPlaneError>;

    /// Current configuration version of a switch
    async fn switch_config_version(
        &self,
        switch: &ManagedObjectRef,
    ) -> Result<String, ControlPlaneError>;

    /// Current state of a task
    async fn task_info(&self, task: &TaskHandle) -> Result<TaskInfo, ControlPlaneError>;
}

/// Remote command execution on a provisioned host
#[async_trait]
pub trait HostAgent: Send + Sync {
    /// Run `command` on `host` and return its outcome
    async fn execute_remote_command(
        &self,
        host: &str,
        command: &str,
    ) -> Result<CommandOutput, HostAgentError>;
}
