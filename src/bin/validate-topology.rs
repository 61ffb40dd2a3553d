// Copyright (c) 2025 - Cowboy AI, Inc.
//! Topology validator
//!
//! Reads a testbed topology document, checks every cross-reference and logs
//! a summary. Exits non-zero when the document is unreadable or invalid.
//!
//! Run with: cargo run --bin validate-topology -- <topology.json>
//!
//! `--vsan-testbed` prints the canonical 4-host vSAN testbed instead. Its
//! provisioning styles can be overridden with the `TESTBED_KIND`,
//! `TESTBED_ESX_STYLE`, `TESTBED_VC_STYLE` and `TESTBED_DB_TYPE`
//! environment variables.

use anyhow::{anyhow, Context, Result};
use testbed_provisioning::{vsan_testbed, TestbedParams, Topology};
use tracing::{error, info};

const USAGE: &str = "usage: validate-topology <topology.json> | --vsan-testbed";

/// Testbed parameters from the environment, falling back to defaults
fn testbed_params_from_env() -> TestbedParams {
    let defaults = TestbedParams::default();
    TestbedParams {
        kind: std::env::var("TESTBED_KIND").unwrap_or(defaults.kind),
        esx_style: std::env::var("TESTBED_ESX_STYLE").unwrap_or(defaults.esx_style),
        vc_style: std::env::var("TESTBED_VC_STYLE").unwrap_or(defaults.vc_style),
        db_type: std::env::var("TESTBED_DB_TYPE").unwrap_or(defaults.db_type),
    }
}

fn print_vsan_testbed() -> Result<()> {
    let params = testbed_params_from_env();
    let topology = vsan_testbed(&params).context("Canonical vSAN testbed is invalid")?;
    let document = topology
        .to_json()
        .context("Failed to serialize vSAN testbed")?;
    println!("{}", document);
    Ok(())
}

fn validate_file(path: &str) -> Result<()> {
    let document = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read topology from {}", path))?;

    let topology = Topology::from_json(&document)
        .with_context(|| format!("Topology {} is invalid", path))?;

    info!("Topology {} (version {}) is valid", topology.name(), topology.version());
    info!("  - ESX hosts: {}", topology.hosts().len());
    info!("  - NFS endpoints: {}", topology.nfs().len());
    info!("  - vCenters: {}", topology.vcs().len());
    for vc in topology.vcs() {
        info!(
            "  - {} ({}): datacenter {}, {} cluster(s), {} host(s)",
            vc.name,
            vc.deployment,
            vc.dc_name,
            vc.clusters.len(),
            topology.hosts_of(&vc.name).count()
        );
    }
    Ok(())
}

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let result = match args.as_slice() {
        [flag] if flag == "--vsan-testbed" => print_vsan_testbed(),
        [path] if !path.starts_with('-') => validate_file(path),
        _ => Err(anyhow!(USAGE)),
    };

    if let Err(e) = &result {
        error!("{:#}", e);
    }
    result
}
