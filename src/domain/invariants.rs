// Copyright (c) 2025 - Cowboy AI, Inc.
//! Pure Validation Functions - Topology Invariants
//!
//! All business rules a [`Topology`] must satisfy before any orchestration
//! step may touch the control plane. Every function is pure (no I/O, no
//! mutation) and reports the offending field by its document path, e.g.
//! `esx[2].clusterName`.
//!
//! # Invariant Categories
//!
//! 1. **Structural**: non-empty names, positive version
//! 2. **Uniqueness**: names unique within their collection
//! 3. **References**: host → vCenter, host → cluster, host → NFS mount
//! 4. **Sizing**: memory, CPU, disk and SSD sizes strictly positive

use std::collections::HashSet;

use super::topology::{HostSpec, Topology, VcSpec};

/// Validation result with detailed error information
pub type ValidationResult = Result<(), SpecValidationError>;

/// Topology invariant violation, naming the offending field
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SpecValidationError {
    #[error("{field}: name must not be empty")]
    EmptyName { field: String },

    #[error("version: schema version must be at least 1, got {0}")]
    InvalidVersion(u32),

    #[error("{field}: duplicate name {name:?}")]
    DuplicateName { field: String, name: String },

    #[error("{field}: unknown vCenter {vc:?}")]
    UnknownVc { field: String, vc: String },

    #[error("{field}: cluster {cluster:?} is not defined in vCenter {vc:?}")]
    UnknownCluster {
        field: String,
        cluster: String,
        vc: String,
    },

    #[error("{field}: unknown NFS endpoint {nfs:?}")]
    UnknownNfs { field: String, nfs: String },

    #[error("{field}: size must be strictly positive")]
    NonPositiveSize { field: String },
}

impl SpecValidationError {
    /// Document path of the offending field
    pub fn field(&self) -> &str {
        match self {
            SpecValidationError::InvalidVersion(_) => "version",
            SpecValidationError::EmptyName { field }
            | SpecValidationError::DuplicateName { field, .. }
            | SpecValidationError::UnknownVc { field, .. }
            | SpecValidationError::UnknownCluster { field, .. }
            | SpecValidationError::UnknownNfs { field, .. }
            | SpecValidationError::NonPositiveSize { field } => field,
        }
    }
}

/// Validate the whole topology.
///
/// Checks run in a fixed order (structure, uniqueness, references, sizing)
/// so the reported violation is deterministic for a given document.
pub fn validate_topology(topology: &Topology) -> ValidationResult {
    validate_name("name", topology.name())?;
    validate_version(topology.version())?;

    validate_unique_names("esx", topology.hosts().iter().map(|h| h.name.as_str()))?;
    validate_unique_names("nfs", topology.nfs().iter().map(|n| n.name.as_str()))?;
    validate_unique_names("vcs", topology.vcs().iter().map(|v| v.name.as_str()))?;

    for (index, vc) in topology.vcs().iter().enumerate() {
        validate_vc(index, vc)?;
    }

    let nfs_names: HashSet<&str> = topology.nfs().iter().map(|n| n.name.as_str()).collect();

    for (index, host) in topology.hosts().iter().enumerate() {
        validate_host_references(index, host, topology, &nfs_names)?;
        validate_host_sizing(index, host)?;
    }

    Ok(())
}

/// Names must not be empty
pub fn validate_name(field: &str, name: &str) -> ValidationResult {
    if name.trim().is_empty() {
        return Err(SpecValidationError::EmptyName {
            field: field.to_string(),
        });
    }
    Ok(())
}

/// Schema version starts at 1
pub fn validate_version(version: u32) -> ValidationResult {
    if version == 0 {
        return Err(SpecValidationError::InvalidVersion(version));
    }
    Ok(())
}

/// Every name in a collection must be non-empty and unique.
///
/// `collection` is the document path of the list (e.g. `vcs[0].clusters`).
pub fn validate_unique_names<'a>(
    collection: &str,
    names: impl IntoIterator<Item = &'a str>,
) -> ValidationResult {
    let mut seen = HashSet::new();
    for (index, name) in names.into_iter().enumerate() {
        let field = format!("{}[{}].name", collection, index);
        validate_name(&field, name)?;
        if !seen.insert(name) {
            return Err(SpecValidationError::DuplicateName {
                field,
                name: name.to_string(),
            });
        }
    }
    Ok(())
}

fn validate_vc(index: usize, vc: &VcSpec) -> ValidationResult {
    validate_name(&format!("vcs[{}].dcName", index), &vc.dc_name)?;
    validate_unique_names(
        &format!("vcs[{}].clusters", index),
        vc.clusters.iter().map(|c| c.name.as_str()),
    )
}

/// Host → vCenter, host → cluster and host → NFS references must resolve
pub fn validate_host_references(
    index: usize,
    host: &HostSpec,
    topology: &Topology,
    nfs_names: &HashSet<&str>,
) -> ValidationResult {
    let vc = topology
        .vc(&host.vc)
        .ok_or_else(|| SpecValidationError::UnknownVc {
            field: format!("esx[{}].vc", index),
            vc: host.vc.clone(),
        })?;

    if vc.cluster(&host.cluster_name).is_none() {
        return Err(SpecValidationError::UnknownCluster {
            field: format!("esx[{}].clusterName", index),
            cluster: host.cluster_name.clone(),
            vc: vc.name.clone(),
        });
    }

    for (mount_index, mount) in host.mount_nfs.iter().enumerate() {
        if !nfs_names.contains(mount.as_str()) {
            return Err(SpecValidationError::UnknownNfs {
                field: format!("esx[{}].mountNfs[{}]", index, mount_index),
                nfs: mount.clone(),
            });
        }
    }

    Ok(())
}

/// Memory, CPU count, disk and SSD sizes must be strictly positive
pub fn validate_host_sizing(index: usize, host: &HostSpec) -> ValidationResult {
    if host.num_mem == 0 {
        return Err(SpecValidationError::NonPositiveSize {
            field: format!("esx[{}].numMem", index),
        });
    }

    if host.num_cpus == 0 {
        return Err(SpecValidationError::NonPositiveSize {
            field: format!("esx[{}].numCPUs", index),
        });
    }

    validate_sizes(&format!("esx[{}].disks", index), &host.disks)?;
    validate_sizes(&format!("esx[{}].ssds", index), &host.ssds)
}

fn validate_sizes(field: &str, sizes: &[u64]) -> ValidationResult {
    match sizes.iter().position(|size| *size == 0) {
        Some(position) => Err(SpecValidationError::NonPositiveSize {
            field: format!("{}[{}]", field, position),
        }),
        None => Ok(()),
    }
}
