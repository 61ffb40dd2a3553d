// Copyright (c) 2025 - Cowboy AI, Inc.
//! Orchestrator configuration
//!
//! Every field has a default matching the vSAN testbed's post-boot network
//! layout, so `OrchestratorConfig::default()` (or an empty JSON object)
//! reproduces it exactly.
//!
//! # Port group order
//!
//! `port_groups` is an ordered list and the order is part of the contract:
//! port groups are created one at a time, in list order, and each one is
//! complete before the next is requested.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

use crate::control_plane::{PortBinding, PortGroupSpec};
use crate::errors::{ProvisioningError, ProvisioningResult};
use crate::task_waiter::WaitConfig;

pub const DEFAULT_SWITCH_NAME: &str = "test-ds";
pub const DEFAULT_UPLINK_NIC: &str = "vmnic1";
pub const DEFAULT_FIREWALL_COMMAND: &str = "esxcli network firewall set -e false";
pub const DEFAULT_PORTS_PER_GROUP: u32 = 12;

fn default_switch_name() -> String {
    DEFAULT_SWITCH_NAME.to_string()
}

fn default_port_groups() -> Vec<PortGroupDefinition> {
    ["management", "vm-network", "bridge"]
        .into_iter()
        .map(|name| PortGroupDefinition::early_binding(name, DEFAULT_PORTS_PER_GROUP))
        .collect()
}

fn default_uplink_nic() -> String {
    DEFAULT_UPLINK_NIC.to_string()
}

fn default_firewall_command() -> String {
    DEFAULT_FIREWALL_COMMAND.to_string()
}

fn default_firewall_concurrency() -> usize {
    1
}

fn default_num_ports() -> u32 {
    DEFAULT_PORTS_PER_GROUP
}

fn default_run_timeout_secs() -> u64 {
    1800
}

/// One port group to create on the switch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortGroupDefinition {
    pub name: String,

    #[serde(default)]
    pub binding: PortBinding,

    #[serde(default = "default_num_ports")]
    pub num_ports: u32,
}

impl PortGroupDefinition {
    pub fn early_binding(name: impl Into<String>, num_ports: u32) -> Self {
        Self {
            name: name.into(),
            binding: PortBinding::EarlyBinding,
            num_ports,
        }
    }

    /// Request sent to the control plane for this definition
    pub fn to_spec(&self) -> PortGroupSpec {
        PortGroupSpec {
            name: self.name.clone(),
            binding: self.binding,
            num_ports: self.num_ports,
        }
    }
}

/// Configuration for a provisioning run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Name of the distributed switch to create
    #[serde(default = "default_switch_name")]
    pub switch_name: String,

    /// Port groups to create, in creation order
    #[serde(default = "default_port_groups")]
    pub port_groups: Vec<PortGroupDefinition>,

    /// Physical NIC every host contributes as uplink
    #[serde(default = "default_uplink_nic")]
    pub uplink_nic: String,

    /// Command that disables a host's network firewall
    #[serde(default = "default_firewall_command")]
    pub firewall_command: String,

    /// Hosts whose firewall is disabled at the same time (1 = one by one)
    #[serde(default = "default_firewall_concurrency")]
    pub firewall_concurrency: usize,

    /// Polling and deadline for each control plane task
    #[serde(default)]
    pub task_wait: WaitConfig,

    /// Budget for the whole run, in seconds
    #[serde(default = "default_run_timeout_secs")]
    pub run_timeout_secs: u64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            switch_name: default_switch_name(),
            port_groups: default_port_groups(),
            uplink_nic: default_uplink_nic(),
            firewall_command: default_firewall_command(),
            firewall_concurrency: default_firewall_concurrency(),
            task_wait: WaitConfig::default(),
            run_timeout_secs: default_run_timeout_secs(),
        }
    }
}

impl OrchestratorConfig {
    pub fn run_timeout(&self) -> Duration {
        Duration::from_secs(self.run_timeout_secs)
    }

    /// Reject configurations that would fail mid-run
    pub fn validate(&self) -> ProvisioningResult<()> {
        if self.switch_name.trim().is_empty() {
            return Err(invalid("switch_name must not be empty"));
        }
        if self.uplink_nic.trim().is_empty() {
            return Err(invalid("uplink_nic must not be empty"));
        }
        if self.firewall_command.trim().is_empty() {
            return Err(invalid("firewall_command must not be empty"));
        }
        if self.firewall_concurrency == 0 {
            return Err(invalid("firewall_concurrency must be at least 1"));
        }
        if self.run_timeout_secs == 0 {
            return Err(invalid("run_timeout_secs must be at least 1"));
        }

        let mut seen = HashSet::new();
        for (index, group) in self.port_groups.iter().enumerate() {
            if group.name.trim().is_empty() {
                return Err(invalid(format!("port_groups[{}].name must not be empty", index)));
            }
            if group.num_ports == 0 {
                return Err(invalid(format!(
                    "port_groups[{}].num_ports must be at least 1",
                    index
                )));
            }
            if !seen.insert(group.name.as_str()) {
                return Err(invalid(format!(
                    "port_groups[{}].name duplicates {:?}",
                    index, group.name
                )));
            }
        }

        Ok(())
    }
}

fn invalid(message: impl Into<String>) -> ProvisioningError {
    ProvisioningError::InvalidConfig(message.into())
}
