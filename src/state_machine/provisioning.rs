// Copyright (c) 2025 - Cowboy AI, Inc.
//! Provisioning Run State Machine
//!
//! Formal FSM for one post-boot provisioning run. Uses the generic
//! StateMachine trait from parent module.
//!
//! # State Machine Type
//!
//! This is a **Mealy Machine**: the output (the step to execute next)
//! depends on both state and input.
//!
//! # States
//!
//! ```text
//! Idle → LocatingDatacenter → LocatingCluster → DisablingHostFirewalls
//!      → CreatingSwitch → CreatingPortGroups(1..=N) → AttachingHosts → Complete
//! ```
//!
//! `Failed` is reachable from every non-terminal state. With no port groups
//! configured, `CreatingSwitch` moves straight to `AttachingHosts`.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::{StateMachine, TransitionError, TransitionResult};

/// Unit of work of a provisioning run, as reported in errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Step {
    ValidateTopology,
    LocateDatacenter,
    LocateCluster,
    DisableFirewalls,
    CreateSwitch,
    CreatePortGroups,
    AttachHosts,
}

impl Step {
    pub fn as_str(&self) -> &'static str {
        match self {
            Step::ValidateTopology => "validate-topology",
            Step::LocateDatacenter => "locate-datacenter",
            Step::LocateCluster => "locate-cluster",
            Step::DisableFirewalls => "disable-firewalls",
            Step::CreateSwitch => "create-switch",
            Step::CreatePortGroups => "create-port-groups",
            Step::AttachHosts => "attach-hosts",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Run state (FSM state)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ProvisioningState {
    /// Topology not yet validated
    Idle,
    LocatingDatacenter,
    LocatingCluster,
    DisablingHostFirewalls,
    CreatingSwitch,
    /// Creating port group `index` of `total` (1-based)
    CreatingPortGroups { index: usize, total: usize },
    AttachingHosts,
    /// Every step succeeded (terminal)
    Complete,
    /// A step failed (terminal)
    Failed { step: Step },
}

impl ProvisioningState {
    /// Step executed while in this state
    pub fn step(&self) -> Option<Step> {
        match self {
            ProvisioningState::Idle => Some(Step::ValidateTopology),
            ProvisioningState::LocatingDatacenter => Some(Step::LocateDatacenter),
            ProvisioningState::LocatingCluster => Some(Step::LocateCluster),
            ProvisioningState::DisablingHostFirewalls => Some(Step::DisableFirewalls),
            ProvisioningState::CreatingSwitch => Some(Step::CreateSwitch),
            ProvisioningState::CreatingPortGroups { .. } => Some(Step::CreatePortGroups),
            ProvisioningState::AttachingHosts => Some(Step::AttachHosts),
            ProvisioningState::Complete | ProvisioningState::Failed { .. } => None,
        }
    }
}

impl fmt::Display for ProvisioningState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProvisioningState::CreatingPortGroups { index, total } => {
                write!(f, "CreatingPortGroups({}/{})", index, total)
            }
            ProvisioningState::Failed { step } => write!(f, "Failed({})", step),
            other => write!(f, "{:?}", other),
        }
    }
}

/// Step outcome (FSM input)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "input", rename_all = "snake_case")]
pub enum ProvisioningInput {
    /// Topology validated, begin the run
    Start,
    DatacenterLocated,
    ClusterLocated,
    FirewallsDisabled { hosts: usize },
    /// Switch exists; `port_groups` definitions follow
    SwitchCreated { port_groups: usize },
    PortGroupCreated,
    HostsAttached { hosts: usize },
    /// The current step failed
    StepFailed,
}

impl fmt::Display for ProvisioningInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl StateMachine for ProvisioningState {
    type Input = ProvisioningInput;
    /// Step to execute next, `None` once terminal
    type Output = Option<Step>;

    fn transition(&self, input: &Self::Input) -> TransitionResult<(Self, Self::Output)> {
        use ProvisioningInput::*;
        use ProvisioningState::*;

        let next = match (self, input) {
            (Complete | Failed { .. }, _) => {
                return Err(TransitionError::Terminal(self.to_string()));
            }

            (state, StepFailed) => Failed {
                // Every non-terminal state maps to a step
                step: state.step().unwrap_or(Step::ValidateTopology),
            },

            (Idle, Start) => LocatingDatacenter,
            (LocatingDatacenter, DatacenterLocated) => LocatingCluster,
            (LocatingCluster, ClusterLocated) => DisablingHostFirewalls,
            (DisablingHostFirewalls, FirewallsDisabled { .. }) => CreatingSwitch,

            (CreatingSwitch, SwitchCreated { port_groups: 0 }) => AttachingHosts,
            (CreatingSwitch, SwitchCreated { port_groups }) => CreatingPortGroups {
                index: 1,
                total: *port_groups,
            },

            (CreatingPortGroups { index, total }, PortGroupCreated) if index < total => {
                CreatingPortGroups {
                    index: index + 1,
                    total: *total,
                }
            }
            (CreatingPortGroups { .. }, PortGroupCreated) => AttachingHosts,

            (AttachingHosts, HostsAttached { .. }) => Complete,

            (state, input) => {
                return Err(TransitionError::InvalidTransition {
                    from: state.to_string(),
                    input: input.to_string(),
                });
            }
        };

        let output = next.step();
        Ok((next, output))
    }

    fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProvisioningState::Complete | ProvisioningState::Failed { .. }
        )
    }
}
