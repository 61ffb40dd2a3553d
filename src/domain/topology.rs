// Copyright (c) 2025 - Cowboy AI, Inc.
//! Testbed Topology Value Objects
//!
//! A [`Topology`] describes the environment a test run expects after base
//! provisioning: the ESX hosts, the NFS endpoints they mount, and the vCenter
//! instances (with their datacenter and clusters) that manage them.
//!
//! The document shape follows the testbed definition format, so field names
//! are camelCase on the wire:
//!
//! ```json
//! {
//!   "name": "vic-vsan-simple-pxeBoot-vpxInstall",
//!   "version": 3,
//!   "esx": [{ "name": "esx.0", "vc": "vc.0", "numMem": 13312, "numCPUs": 4,
//!             "disks": [30000000], "ssds": [5000000],
//!             "mountNfs": ["nfs.0"], "clusterName": "cls" }],
//!   "nfs": [{ "name": "nfs.0", "type": "NFS41" }],
//!   "vcs": [{ "name": "vc.0", "type": "vcva", "dcName": "dc1",
//!             "clusters": [{ "name": "cls", "vsan": true }] }]
//! }
//! ```
//!
//! # Immutability
//!
//! A topology is built once (by [`TopologyBuilder`] or by deserializing a
//! document) and only read afterwards. Its fields are private; the
//! orchestrator only ever sees `&Topology`.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::invariants::{validate_topology, SpecValidationError};

/// Default provisioning style for ESX hosts
pub const DEFAULT_HOST_STYLE: &str = "pxeInstall";

fn default_host_style() -> String {
    DEFAULT_HOST_STYLE.to_string()
}

/// Complete testbed description
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Topology {
    name: String,
    version: u32,
    #[serde(default)]
    esx: Vec<HostSpec>,
    #[serde(default)]
    nfs: Vec<NfsSpec>,
    #[serde(default)]
    vcs: Vec<VcSpec>,
    #[serde(default)]
    vsan: bool,
    #[serde(default)]
    vsan_enable: bool,
}

impl Topology {
    /// Start building a topology
    pub fn builder(name: impl Into<String>, version: u32) -> TopologyBuilder {
        TopologyBuilder::new(name, version)
    }

    /// Parse a JSON topology document and validate it
    pub fn from_json(document: &str) -> Result<Self, TopologyError> {
        let topology: Topology = serde_json::from_str(document)?;
        topology.validate()?;
        Ok(topology)
    }

    /// Serialize to a pretty-printed JSON document
    pub fn to_json(&self) -> Result<String, TopologyError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check every cross-reference and sizing invariant.
    ///
    /// Runs to completion with no side effects and reports the first
    /// violation found, naming the offending field.
    pub fn validate(&self) -> Result<(), SpecValidationError> {
        validate_topology(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    /// ESX hosts in declaration order
    pub fn hosts(&self) -> &[HostSpec] {
        &self.esx
    }

    pub fn nfs(&self) -> &[NfsSpec] {
        &self.nfs
    }

    pub fn vcs(&self) -> &[VcSpec] {
        &self.vcs
    }

    /// Whether the testbed is a vSAN testbed
    pub fn vsan(&self) -> bool {
        self.vsan
    }

    /// Whether vSAN should be enabled on the clusters after boot
    pub fn vsan_enable(&self) -> bool {
        self.vsan_enable
    }

    /// Look up a vCenter by name
    pub fn vc(&self, name: &str) -> Option<&VcSpec> {
        self.vcs.iter().find(|vc| vc.name == name)
    }

    /// Look up an NFS endpoint by name
    pub fn nfs_endpoint(&self, name: &str) -> Option<&NfsSpec> {
        self.nfs.iter().find(|nfs| nfs.name == name)
    }

    /// Hosts managed by the given vCenter, in declaration order
    pub fn hosts_of(&self, vc: &str) -> impl Iterator<Item = &HostSpec> {
        let vc = vc.to_string();
        self.esx.iter().filter(move |host| host.vc == vc)
    }
}

/// ESX host descriptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostSpec {
    pub name: String,

    /// Name of the owning vCenter
    pub vc: String,

    /// Provisioning style (e.g. "pxeInstall")
    #[serde(default = "default_host_style")]
    pub style: String,

    /// Root password the host is provisioned with
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desired_password: Option<String>,

    /// Memory in MiB
    pub num_mem: u64,

    #[serde(rename = "numCPUs")]
    pub num_cpus: u32,

    /// Disk sizes in KB
    pub disks: Vec<u64>,

    /// Solid-state disk sizes in KB
    pub ssds: Vec<u64>,

    #[serde(default)]
    pub free_local_luns: u32,

    #[serde(default)]
    pub free_shared_luns: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nics: Option<u32>,

    /// VMkernel adapters carrying vMotion traffic
    #[serde(default)]
    pub vmotion_nics: Vec<String>,

    #[serde(default)]
    pub staf: bool,

    /// NFS endpoints mounted on this host
    pub mount_nfs: Vec<String>,

    /// Cluster (within the owning vCenter) the host joins
    pub cluster_name: String,
}

/// NFS protocol version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NfsVersion {
    #[serde(rename = "NFS3")]
    Nfs3,
    #[serde(rename = "NFS41")]
    Nfs41,
}

impl fmt::Display for NfsVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NfsVersion::Nfs3 => write!(f, "NFS3"),
            NfsVersion::Nfs41 => write!(f, "NFS41"),
        }
    }
}

/// NFS endpoint descriptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NfsSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub version: NfsVersion,
}

impl NfsSpec {
    pub fn new(name: impl Into<String>, version: NfsVersion) -> Self {
        Self {
            name: name.into(),
            version,
        }
    }
}

/// How provisioned hosts are joined to the vCenter inventory
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HostJoinPolicy {
    /// Every host of the vCenter lands in the same cluster
    #[default]
    AllInSameCluster,
    /// Hosts are left out of the inventory
    None,
}

/// vCenter descriptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VcSpec {
    pub name: String,

    /// Deployment type (e.g. "vcva")
    #[serde(rename = "type")]
    pub deployment: String,

    /// Datacenter created inside this vCenter
    pub dc_name: String,

    #[serde(default)]
    pub clusters: Vec<ClusterSpec>,

    #[serde(default)]
    pub add_hosts: HostJoinPolicy,
}

impl VcSpec {
    /// Look up a cluster by name
    pub fn cluster(&self, name: &str) -> Option<&ClusterSpec> {
        self.clusters.iter().find(|c| c.name == name)
    }
}

/// Cluster descriptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterSpec {
    pub name: String,
    #[serde(default)]
    pub vsan: bool,
    #[serde(default, rename = "enableDrs")]
    pub enable_drs: bool,
    #[serde(default, rename = "enableHA")]
    pub enable_ha: bool,
}

impl ClusterSpec {
    /// Cluster with every feature disabled
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            vsan: false,
            enable_drs: false,
            enable_ha: false,
        }
    }
}

/// Errors loading a topology document
#[derive(Debug, thiserror::Error)]
pub enum TopologyError {
    #[error("Malformed topology document: {0}")]
    Parse(#[from] serde_json::Error),

    #[error(transparent)]
    Invalid(#[from] SpecValidationError),
}

/// Builder for [`Topology`] with fluent API
#[derive(Debug, Clone)]
pub struct TopologyBuilder {
    topology: Topology,
}

impl TopologyBuilder {
    fn new(name: impl Into<String>, version: u32) -> Self {
        Self {
            topology: Topology {
                name: name.into(),
                version,
                esx: Vec::new(),
                nfs: Vec::new(),
                vcs: Vec::new(),
                vsan: false,
                vsan_enable: false,
            },
        }
    }

    pub fn host(mut self, host: HostSpec) -> Self {
        self.topology.esx.push(host);
        self
    }

    pub fn hosts(mut self, hosts: impl IntoIterator<Item = HostSpec>) -> Self {
        self.topology.esx.extend(hosts);
        self
    }

    pub fn nfs(mut self, nfs: NfsSpec) -> Self {
        self.topology.nfs.push(nfs);
        self
    }

    pub fn vc(mut self, vc: VcSpec) -> Self {
        self.topology.vcs.push(vc);
        self
    }

    pub fn vsan(mut self, vsan: bool) -> Self {
        self.topology.vsan = vsan;
        self
    }

    pub fn vsan_enable(mut self, enable: bool) -> Self {
        self.topology.vsan_enable = enable;
        self
    }

    /// Validate and return the finished topology
    pub fn build(self) -> Result<Topology, SpecValidationError> {
        self.topology.validate()?;
        Ok(self.topology)
    }
}
