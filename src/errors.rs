// Copyright (c) 2025 - Cowboy AI, Inc.
//! Error types for provisioning runs
//!
//! A failed run returns exactly one [`ProvisioningError`] naming the step
//! that failed and why. Nothing is retried and nothing is rolled back:
//! objects created before the failing step stay in the control plane.

use std::time::Duration;
use thiserror::Error;

use crate::domain::SpecValidationError;
use crate::state_machine::{Step, TransitionError};

/// Errors that end a provisioning run
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProvisioningError {
    /// The topology broke an invariant; no call was made
    #[error("Topology validation failed: {0}")]
    SpecValidation(#[from] SpecValidationError),

    /// The orchestrator configuration was rejected; no call was made
    #[error("Configuration error: {0}")]
    InvalidConfig(String),

    /// An expected pre-existing object is absent
    #[error("Discovery failed for {entity}: {reason}")]
    Discovery { entity: &'static str, reason: String },

    /// The firewall command failed on a host
    #[error("Remote execution failed on {host}: {detail}")]
    RemoteExecution { host: String, detail: String },

    /// An asynchronous infrastructure operation failed or could not be issued
    #[error("Control plane task failed at {step}{}: {cause}", describe_target(.entity.as_deref(), .task_id.as_deref()))]
    ControlPlaneTask {
        step: Step,
        entity: Option<String>,
        task_id: Option<String>,
        cause: String,
    },

    /// A task did not reach a terminal state within its budget
    #[error("Timed out at {step}{} after {waited:?}", describe_target(.entity.as_deref(), Some(.task_id.as_str())))]
    Timeout {
        step: Step,
        entity: Option<String>,
        task_id: String,
        waited: Duration,
    },

    /// The run was cancelled or its deadline elapsed before `step`
    #[error("Run cancelled at {step}")]
    Cancelled { step: Step },

    /// The run state machine rejected a transition
    #[error("Invalid run state: {0}")]
    State(#[from] TransitionError),
}

impl ProvisioningError {
    /// Step the run failed at, if it got past configuration checks
    pub fn step(&self) -> Option<Step> {
        match self {
            ProvisioningError::SpecValidation(_) => Some(Step::ValidateTopology),
            ProvisioningError::InvalidConfig(_) | ProvisioningError::State(_) => None,
            ProvisioningError::Discovery { entity, .. } => Some(if *entity == "datacenter" {
                Step::LocateDatacenter
            } else {
                Step::LocateCluster
            }),
            ProvisioningError::RemoteExecution { .. } => Some(Step::DisableFirewalls),
            ProvisioningError::ControlPlaneTask { step, .. }
            | ProvisioningError::Timeout { step, .. }
            | ProvisioningError::Cancelled { step } => Some(*step),
        }
    }

    /// Identifier of the task involved, if any
    pub fn task_id(&self) -> Option<&str> {
        match self {
            ProvisioningError::ControlPlaneTask { task_id, .. } => task_id.as_deref(),
            ProvisioningError::Timeout { task_id, .. } => Some(task_id),
            _ => None,
        }
    }

    /// Object (switch or port group name) the failing step worked on
    pub fn entity(&self) -> Option<&str> {
        match self {
            ProvisioningError::ControlPlaneTask { entity, .. }
            | ProvisioningError::Timeout { entity, .. } => entity.as_deref(),
            ProvisioningError::Discovery { entity, .. } => Some(*entity),
            ProvisioningError::RemoteExecution { host, .. } => Some(host),
            _ => None,
        }
    }
}

fn describe_target(entity: Option<&str>, task_id: Option<&str>) -> String {
    match (entity, task_id) {
        (Some(entity), Some(task)) => format!(" ({}, task {})", entity, task),
        (Some(entity), None) => format!(" ({})", entity),
        (None, Some(task)) => format!(" (task {})", task),
        (None, None) => String::new(),
    }
}

/// Result type for provisioning operations
pub type ProvisioningResult<T> = Result<T, ProvisioningError>;
