// Copyright (c) 2025 - Cowboy AI, Inc.
//! Property-Based Tests for Topology Validation
//!
//! Generates structurally valid topologies (every host points at an existing
//! vCenter, one of its clusters and a subset of the NFS endpoints), then
//! checks that validation accepts them, that documents survive a JSON
//! round-trip, and that breaking a single reference is always reported at
//! the right field.

use proptest::prelude::*;
use testbed_provisioning::domain::{
    ClusterSpec, HostJoinPolicy, HostSpec, NfsSpec, NfsVersion, SpecValidationError, Topology,
    VcSpec,
};

// ============================================================================
// Generators
// ============================================================================

/// Blueprint of one host: owning vCenter, cluster and mounted NFS indices
#[derive(Debug, Clone)]
struct HostPlan {
    vc: usize,
    cluster: usize,
    mounts: Vec<usize>,
    num_mem: u64,
    num_cpus: u32,
    disks: Vec<u64>,
}

fn host_plan(vcs: usize, nfs: usize) -> impl Strategy<Value = HostPlan> {
    (
        0..vcs,
        0usize..3,
        proptest::sample::subsequence((0..nfs).collect::<Vec<_>>(), 0..=nfs),
        1u64..65_536,
        1u32..64,
        prop::collection::vec(1u64..100_000_000, 0..4),
    )
        .prop_map(|(vc, cluster, mounts, num_mem, num_cpus, disks)| HostPlan {
            vc,
            cluster,
            mounts,
            num_mem,
            num_cpus,
            disks,
        })
}

/// (vCenter count, clusters per vCenter, NFS count, host plans)
fn topology_plan() -> impl Strategy<Value = (Vec<usize>, usize, Vec<HostPlan>)> {
    (prop::collection::vec(1usize..=3, 1..=2), 0usize..=2).prop_flat_map(|(clusters, nfs)| {
        let vcs = clusters.len();
        (
            Just(clusters),
            Just(nfs),
            prop::collection::vec(host_plan(vcs, nfs), 1..=6),
        )
    })
}

fn build(clusters: &[usize], nfs: usize, plans: &[HostPlan]) -> Topology {
    let mut builder = Topology::builder("generated", 1);

    for index in 0..nfs {
        let version = if index % 2 == 0 {
            NfsVersion::Nfs41
        } else {
            NfsVersion::Nfs3
        };
        builder = builder.nfs(NfsSpec::new(format!("nfs.{}", index), version));
    }

    for (index, count) in clusters.iter().enumerate() {
        builder = builder.vc(VcSpec {
            name: format!("vc.{}", index),
            deployment: "vcva".to_string(),
            dc_name: format!("dc{}", index + 1),
            clusters: (0..*count)
                .map(|c| ClusterSpec::new(format!("cls{}", c)))
                .collect(),
            add_hosts: HostJoinPolicy::AllInSameCluster,
        });
    }

    let hosts = plans.iter().enumerate().map(|(index, plan)| HostSpec {
        name: format!("esx.{}", index),
        vc: format!("vc.{}", plan.vc),
        style: "pxeInstall".to_string(),
        desired_password: None,
        num_mem: plan.num_mem,
        num_cpus: plan.num_cpus,
        disks: plan.disks.clone(),
        ssds: Vec::new(),
        free_local_luns: 0,
        free_shared_luns: 0,
        nics: None,
        vmotion_nics: Vec::new(),
        staf: false,
        mount_nfs: plan.mounts.iter().map(|m| format!("nfs.{}", m)).collect(),
        // Wrap into the clusters the owning vCenter actually has
        cluster_name: format!("cls{}", plan.cluster % clusters[plan.vc]),
    });

    builder
        .hosts(hosts)
        .build()
        .expect("generated topology must be valid")
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    /// Every generated topology passes validation
    #[test]
    fn prop_generated_topologies_validate(
        (clusters, nfs, plans) in topology_plan()
    ) {
        let topology = build(&clusters, nfs, &plans);
        prop_assert!(topology.validate().is_ok());
        prop_assert_eq!(topology.hosts().len(), plans.len());
    }

    /// A document written by `to_json` reads back as the same topology
    #[test]
    fn prop_json_round_trip_preserves_topology(
        (clusters, nfs, plans) in topology_plan()
    ) {
        let topology = build(&clusters, nfs, &plans);
        let document = topology.to_json().unwrap();
        let parsed = Topology::from_json(&document).unwrap();
        prop_assert_eq!(parsed, topology);
    }

    /// Pointing one host at a cluster its vCenter lacks is always rejected
    /// at that host's `clusterName`
    #[test]
    fn prop_dangling_cluster_reference_is_rejected(
        (clusters, nfs, plans) in topology_plan(),
        pick in any::<prop::sample::Index>(),
    ) {
        let topology = build(&clusters, nfs, &plans);
        let victim = pick.index(plans.len());

        let mut document = serde_json::to_value(&topology).unwrap();
        document["esx"][victim]["clusterName"] = serde_json::json!("no-such-cluster");
        let broken: Topology = serde_json::from_value(document).unwrap();

        let err = broken.validate().unwrap_err();
        let expected_field = format!("esx[{}].clusterName", victim);
        prop_assert_eq!(err.field(), expected_field.as_str());
        let is_unknown_cluster = matches!(err, SpecValidationError::UnknownCluster { .. });
        prop_assert!(is_unknown_cluster);
    }

    /// Mounting an NFS endpoint nobody declared is always rejected
    #[test]
    fn prop_dangling_nfs_mount_is_rejected(
        (clusters, nfs, plans) in topology_plan(),
        pick in any::<prop::sample::Index>(),
    ) {
        let topology = build(&clusters, nfs, &plans);
        let victim = pick.index(plans.len());

        let mut document = serde_json::to_value(&topology).unwrap();
        document["esx"][victim]["mountNfs"] = serde_json::json!(["nfs.missing"]);
        let broken: Topology = serde_json::from_value(document).unwrap();

        let err = broken.validate().unwrap_err();
        let expected_field = format!("esx[{}].mountNfs[0]", victim);
        prop_assert_eq!(err.field(), expected_field.as_str());
    }
}
