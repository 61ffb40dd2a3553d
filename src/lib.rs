// Copyright (c) 2025 - Cowboy AI, Inc.
//! Post-boot network provisioning for vSAN testbeds
//!
//! This crate describes a nested virtualization testbed (hosts, NFS
//! endpoints, vCenter with its clusters) as a validated [`Topology`] and
//! brings an already deployed testbed into a usable network state: one
//! distributed switch, an ordered set of port groups and an uplink on every
//! cluster host.
//!
//! The control plane and the hosts are reached only through the injected
//! [`ControlPlaneClient`] and [`HostAgent`] traits.

pub mod control_plane;
pub mod domain;
pub mod errors;
pub mod orchestrator;
pub mod state_machine;
pub mod task_waiter;

// Re-export commonly used types
pub use control_plane::{ControlPlaneClient, HostAgent};
pub use domain::{vsan_testbed, HostSpec, SpecValidationError, TestbedParams, Topology};
pub use errors::{ProvisioningError, ProvisioningResult};
pub use orchestrator::{OrchestratorConfig, ProvisioningOrchestrator, RunReport};
pub use task_waiter::{TaskWaiter, WaitConfig, WaitError};
