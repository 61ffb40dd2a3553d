// Copyright (c) 2025 - Cowboy AI, Inc.
//! Testbed Domain Models
//!
//! The declarative description of a testbed and the invariants it must
//! satisfy before orchestration may start.
//!
//! # Value Objects
//!
//! - [`Topology`] - the whole testbed (hosts, NFS endpoints, vCenters)
//! - [`HostSpec`] - ESX host sizing and references
//! - [`VcSpec`] / [`ClusterSpec`] - vCenter, datacenter and clusters
//! - [`NfsSpec`] - NFS endpoint descriptor
//!
//! # Validation
//!
//! [`Topology::validate`] checks every cross-reference; the individual
//! pure checks live in [`invariants`].

pub mod invariants;
pub mod testbed;
pub mod topology;

pub use invariants::{SpecValidationError, ValidationResult};
pub use testbed::{vsan_testbed, TestbedParams};
pub use topology::{
    ClusterSpec, HostJoinPolicy, HostSpec, NfsSpec, NfsVersion, Topology, TopologyBuilder,
    TopologyError, VcSpec,
};
