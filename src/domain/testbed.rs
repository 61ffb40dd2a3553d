// Copyright (c) 2025 - Cowboy AI, Inc.
//! Canonical vSAN Testbed
//!
//! Four ESX hosts behind one vCenter, all joined to a single vSAN cluster
//! named `cls` and mounting one NFS 4.1 endpoint. The testbed name is derived
//! from the deployment parameters so runs with different provisioning styles
//! never collide.

use super::invariants::SpecValidationError;
use super::topology::{
    ClusterSpec, HostJoinPolicy, HostSpec, NfsSpec, NfsVersion, Topology, VcSpec,
    DEFAULT_HOST_STYLE,
};

/// One GB expressed in the KB units used for disk sizes
pub const ONE_GB: u64 = 1000 * 1000;

/// Number of ESX hosts in the canonical testbed
pub const HOST_COUNT: usize = 4;

pub const VC_NAME: &str = "vc.0";
pub const NFS_NAME: &str = "nfs.0";
pub const CLUSTER_NAME: &str = "cls";
pub const DATACENTER_NAME: &str = "dc1";

const SCHEMA_VERSION: u32 = 3;
const DESIRED_PASSWORD: &str = "e2eFunctionalTest";

/// Parameters the testbed name is derived from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestbedParams {
    /// Testbed flavour (e.g. "simple")
    pub kind: String,
    pub esx_style: String,
    pub vc_style: String,
    /// vCenter database type; "embedded" is left out of the name
    pub db_type: String,
}

impl Default for TestbedParams {
    fn default() -> Self {
        Self {
            kind: "simple".to_string(),
            esx_style: "pxeBoot".to_string(),
            vc_style: "vpxInstall".to_string(),
            db_type: "embedded".to_string(),
        }
    }
}

impl TestbedParams {
    /// Derived testbed name, e.g. `vic-vsan-simple-pxeBoot-vpxInstall`
    pub fn testbed_name(&self) -> String {
        let mut parts = vec![
            "vic",
            "vsan",
            self.kind.as_str(),
            self.esx_style.as_str(),
            self.vc_style.as_str(),
        ];
        if self.db_type != "embedded" {
            parts.push(self.db_type.as_str());
        }
        parts.join("-")
    }
}

/// Build the canonical vSAN testbed topology
pub fn vsan_testbed(params: &TestbedParams) -> Result<Topology, SpecValidationError> {
    let hosts = (0..HOST_COUNT).map(|idx| HostSpec {
        name: format!("esx.{}", idx),
        vc: VC_NAME.to_string(),
        style: DEFAULT_HOST_STYLE.to_string(),
        desired_password: Some(DESIRED_PASSWORD.to_string()),
        num_mem: 13 * 1024,
        num_cpus: 4,
        disks: vec![30 * ONE_GB, 30 * ONE_GB, 30 * ONE_GB],
        ssds: vec![5 * ONE_GB],
        free_local_luns: 1,
        free_shared_luns: 2,
        nics: Some(2),
        vmotion_nics: vec!["vmk0".to_string()],
        staf: false,
        mount_nfs: vec![NFS_NAME.to_string()],
        cluster_name: CLUSTER_NAME.to_string(),
    });

    let vc = VcSpec {
        name: VC_NAME.to_string(),
        deployment: "vcva".to_string(),
        dc_name: DATACENTER_NAME.to_string(),
        clusters: vec![ClusterSpec {
            name: CLUSTER_NAME.to_string(),
            vsan: true,
            enable_drs: true,
            enable_ha: true,
        }],
        add_hosts: HostJoinPolicy::AllInSameCluster,
    };

    Topology::builder(params.testbed_name(), SCHEMA_VERSION)
        .hosts(hosts)
        .nfs(NfsSpec::new(NFS_NAME, NfsVersion::Nfs41))
        .vc(vc)
        .vsan(true)
        .vsan_enable(true)
        .build()
}
