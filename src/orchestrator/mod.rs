// Copyright (c) 2025 - Cowboy AI, Inc.
//! Post-boot provisioning orchestrator
//!
//! Drives one run of the post-boot network setup against an already
//! provisioned testbed:
//!
//! ```text
//! validate → locate datacenter → locate cluster → disable host firewalls
//!          → create switch → create port groups (in order) → attach hosts
//! ```
//!
//! The order is fixed by [`ProvisioningState`]; the orchestrator performs the
//! I/O for the step the state machine names and feeds the outcome back in.
//! Every object a later step refers to is terminal before that step starts.
//!
//! Nothing is retried and nothing is rolled back. A failed run leaves every
//! object it already created in place and returns one [`ProvisioningError`].

pub mod config;
pub mod context;

pub use config::{OrchestratorConfig, PortGroupDefinition};
pub use context::{PortGroupHandle, RunContext, RunReport, SwitchHandle};

use futures::stream::{self, StreamExt, TryStreamExt};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::control_plane::{
    ControlPlaneClient, DatacenterFolders, DvsCreateSpec, DvsReconfigureSpec, Entity, EntityKind,
    HostAgent, HostMemberOperation, HostMemberSpec, ManagedObjectRef, PnicBacking, TaskHandle,
    TaskResult,
};
use crate::domain::{HostSpec, Topology};
use crate::errors::{ProvisioningError, ProvisioningResult};
use crate::state_machine::{ProvisioningInput, ProvisioningState, Step, TransitionError};
use crate::task_waiter::{TaskWaiter, WaitError};

/// Runs the post-boot sequence against injected collaborators
///
/// Holds no per-run state: each call to [`run`](Self::run) gets its own
/// [`RunContext`], so one orchestrator can serve concurrent runs.
pub struct ProvisioningOrchestrator {
    client: Arc<dyn ControlPlaneClient>,
    agent: Arc<dyn HostAgent>,
    config: OrchestratorConfig,
    waiter: TaskWaiter,
}

impl ProvisioningOrchestrator {
    pub fn new(
        client: Arc<dyn ControlPlaneClient>,
        agent: Arc<dyn HostAgent>,
        config: OrchestratorConfig,
    ) -> Self {
        let waiter = TaskWaiter::new(config.task_wait.clone());
        Self {
            client,
            agent,
            config,
            waiter,
        }
    }

    /// Provision `topology` to completion
    pub async fn run(&self, topology: &Topology) -> ProvisioningResult<RunReport> {
        self.run_with_cancel(topology, CancellationToken::new())
            .await
    }

    /// Provision `topology`, stopping early once `cancel` fires.
    ///
    /// Configuration and topology are validated before the first remote call;
    /// a rejected input never reaches the control plane. Cancellation is
    /// checked before each step and while waiting on a task; the run deadline
    /// additionally bounds every step. Tasks already issued are left running.
    #[instrument(
        name = "provisioning_run",
        skip(self, topology, cancel),
        fields(topology = %topology.name(), run_id = tracing::field::Empty)
    )]
    pub async fn run_with_cancel(
        &self,
        topology: &Topology,
        cancel: CancellationToken,
    ) -> ProvisioningResult<RunReport> {
        self.config.validate()?;
        topology.validate()?;

        let mut ctx = RunContext::new(topology.name(), self.config.run_timeout(), cancel);
        tracing::Span::current().record("run_id", tracing::field::display(ctx.run_id()));
        info!(
            hosts = topology.hosts().len(),
            port_groups = self.config.port_groups.len(),
            "Starting provisioning run"
        );

        let mut next = ctx.advance(ProvisioningInput::Start)?;
        while let Some(step) = next {
            let outcome = match ctx.checkpoint(step) {
                Ok(()) => self.execute(step, topology, &mut ctx).await,
                Err(err) => Err(err),
            };

            let input = match outcome {
                Ok(input) => input,
                Err(err) => {
                    ctx.fail();
                    error!(step = %step, error = %err, "Provisioning run failed");
                    return Err(err);
                }
            };
            next = ctx.advance(input)?;
        }

        let report = ctx.into_report()?;
        info!(
            switch = %report.switch.name,
            port_groups = report.port_groups.len(),
            hosts = report.uplinks.len(),
            "Provisioning run complete"
        );
        Ok(report)
    }

    /// Perform `step` and return the state machine input describing its outcome
    async fn execute(
        &self,
        step: Step,
        topology: &Topology,
        ctx: &mut RunContext,
    ) -> ProvisioningResult<ProvisioningInput> {
        debug!(step = %step, state = %ctx.state(), "Executing step");

        match step {
            Step::ValidateTopology => Err(TransitionError::PreconditionFailed(
                "topology is validated before the run starts".to_string(),
            )
            .into()),

            Step::LocateDatacenter => {
                let (datacenter, folders) = ctx.guard(step, self.locate_datacenter()).await?;
                info!(datacenter = %datacenter.name, "Located datacenter");
                ctx.set_datacenter(datacenter, folders);
                Ok(ProvisioningInput::DatacenterLocated)
            }

            Step::LocateCluster => {
                let host_folder = ctx.folders()?.host_folder.clone();
                let cluster = ctx.guard(step, self.locate_cluster(&host_folder)).await?;
                info!(cluster = %cluster.name, "Located cluster");
                ctx.set_cluster(cluster);
                Ok(ProvisioningInput::ClusterLocated)
            }

            Step::DisableFirewalls => {
                let hosts = ctx
                    .guard(step, self.disable_firewalls(topology.hosts()))
                    .await?;
                let count = hosts.len();
                ctx.set_firewalls_disabled(hosts);
                Ok(ProvisioningInput::FirewallsDisabled { hosts: count })
            }

            Step::CreateSwitch => {
                let network_folder = ctx.folders()?.network_folder.clone();
                let switch = ctx
                    .guard(step, self.create_switch(&network_folder, ctx.cancel_token()))
                    .await?;
                info!(switch = %switch.name, reference = %switch.reference, "Created distributed switch");
                ctx.set_switch(switch);
                Ok(ProvisioningInput::SwitchCreated {
                    port_groups: self.config.port_groups.len(),
                })
            }

            Step::CreatePortGroups => {
                let index = match ctx.state() {
                    ProvisioningState::CreatingPortGroups { index, .. } => *index,
                    other => {
                        return Err(TransitionError::PreconditionFailed(format!(
                            "no port group pending in state {}",
                            other
                        ))
                        .into())
                    }
                };
                let definition = self.config.port_groups.get(index - 1).ok_or_else(|| {
                    TransitionError::PreconditionFailed(format!("no port group #{}", index))
                })?;

                let switch = ctx.switch()?.reference.clone();
                let port_group = ctx
                    .guard(
                        step,
                        self.create_port_group(&switch, definition, ctx.cancel_token()),
                    )
                    .await?;
                info!(port_group = %port_group.name, index, "Created port group");
                ctx.push_port_group(port_group);
                Ok(ProvisioningInput::PortGroupCreated)
            }

            Step::AttachHosts => {
                let switch = ctx.switch()?.reference.clone();
                let cluster = ctx.cluster()?.reference.clone();
                let (config_version, uplinks) = ctx
                    .guard(step, self.attach_hosts(&switch, &cluster, ctx.cancel_token()))
                    .await?;
                let count = uplinks.len();
                info!(hosts = count, nic = %self.config.uplink_nic, "Attached hosts to switch");
                ctx.set_switch_config_version(config_version)?;
                ctx.set_uplinks(uplinks);
                Ok(ProvisioningInput::HostsAttached { hosts: count })
            }
        }
    }

    /// First datacenter under the inventory root, with its folders
    async fn locate_datacenter(&self) -> ProvisioningResult<(Entity, DatacenterFolders)> {
        let root = self.client.root_folder();
        let children = self
            .client
            .list_child_entities(&root)
            .await
            .map_err(|e| discovery("datacenter", e.to_string()))?;

        let datacenter = children
            .into_iter()
            .find(|entity| entity.kind() == EntityKind::Datacenter)
            .ok_or_else(|| discovery("datacenter", format!("no datacenter under {}", root)))?;

        let folders = self
            .client
            .datacenter_folders(&datacenter.reference)
            .await
            .map_err(|e| discovery("datacenter", e.to_string()))?;

        Ok((datacenter, folders))
    }

    /// First cluster in the datacenter's host folder
    async fn locate_cluster(&self, host_folder: &ManagedObjectRef) -> ProvisioningResult<Entity> {
        let children = self
            .client
            .list_child_entities(host_folder)
            .await
            .map_err(|e| discovery("cluster", e.to_string()))?;

        children
            .into_iter()
            .find(|entity| entity.kind() == EntityKind::Cluster)
            .ok_or_else(|| discovery("cluster", format!("no cluster under {}", host_folder)))
    }

    /// Run the firewall command on every host, in topology order.
    ///
    /// Up to `firewall_concurrency` hosts are in flight at once. Results are
    /// consumed in host order and the first failure ends the step; hosts
    /// already done stay done.
    async fn disable_firewalls(&self, hosts: &[HostSpec]) -> ProvisioningResult<Vec<String>> {
        stream::iter(hosts)
            .map(|host| self.disable_firewall(&host.name))
            .buffered(self.config.firewall_concurrency)
            .try_collect()
            .await
    }

    async fn disable_firewall(&self, host: &str) -> ProvisioningResult<String> {
        debug!(host, command = %self.config.firewall_command, "Disabling host firewall");

        let output = self
            .agent
            .execute_remote_command(host, &self.config.firewall_command)
            .await
            .map_err(|e| ProvisioningError::RemoteExecution {
                host: host.to_string(),
                detail: e.to_string(),
            })?;

        if !output.success() {
            warn!(host, exit_status = output.exit_status, "Firewall command failed");
            return Err(ProvisioningError::RemoteExecution {
                host: host.to_string(),
                detail: format!(
                    "exit status {}: {}",
                    output.exit_status,
                    output.stderr.trim()
                ),
            });
        }

        Ok(host.to_string())
    }

    async fn create_switch(
        &self,
        network_folder: &ManagedObjectRef,
        cancel: &CancellationToken,
    ) -> ProvisioningResult<SwitchHandle> {
        let step = Step::CreateSwitch;
        let name = self.config.switch_name.as_str();

        let task = self
            .client
            .create_distributed_switch(
                network_folder,
                DvsCreateSpec {
                    name: name.to_string(),
                },
            )
            .await
            .map_err(|e| not_issued(step, name, e))?;

        let result = self.await_task(step, name, &task, cancel).await?;
        let reference = result
            .entity()
            .cloned()
            .ok_or_else(|| ProvisioningError::ControlPlaneTask {
                step,
                entity: Some(name.to_string()),
                task_id: Some(task.id().to_string()),
                cause: "task returned no switch reference".to_string(),
            })?;

        let config_version = self
            .client
            .switch_config_version(&reference)
            .await
            .map_err(|e| not_issued(step, name, e))?;

        Ok(SwitchHandle {
            reference,
            name: name.to_string(),
            config_version,
        })
    }

    async fn create_port_group(
        &self,
        switch: &ManagedObjectRef,
        definition: &PortGroupDefinition,
        cancel: &CancellationToken,
    ) -> ProvisioningResult<PortGroupHandle> {
        let step = Step::CreatePortGroups;
        let name = definition.name.as_str();

        let task = self
            .client
            .add_port_group(switch, definition.to_spec())
            .await
            .map_err(|e| not_issued(step, name, e))?;

        let result = self.await_task(step, name, &task, cancel).await?;

        Ok(PortGroupHandle {
            name: definition.name.clone(),
            binding: definition.binding,
            num_ports: definition.num_ports,
            reference: result.entity().cloned(),
            task,
        })
    }

    /// Bind the uplink NIC of every cluster host in one reconfiguration.
    ///
    /// The configuration version is read again here: adding port groups
    /// bumps it, and a stale version is rejected by the control plane.
    async fn attach_hosts(
        &self,
        switch: &ManagedObjectRef,
        cluster: &ManagedObjectRef,
        cancel: &CancellationToken,
    ) -> ProvisioningResult<(String, Vec<HostMemberSpec>)> {
        let step = Step::AttachHosts;
        let name = self.config.switch_name.as_str();

        let hosts = self
            .client
            .cluster_hosts(cluster)
            .await
            .map_err(|e| not_issued(step, name, e))?;
        if hosts.is_empty() {
            warn!(cluster = %cluster, "Cluster has no hosts; reconfiguring with an empty host list");
        }

        let config_version = self
            .client
            .switch_config_version(switch)
            .await
            .map_err(|e| not_issued(step, name, e))?;

        let uplinks: Vec<HostMemberSpec> = hosts
            .into_iter()
            .map(|host| HostMemberSpec {
                operation: HostMemberOperation::Add,
                host,
                backing: PnicBacking {
                    pnic_devices: vec![self.config.uplink_nic.clone()],
                },
            })
            .collect();

        let task = self
            .client
            .reconfigure_switch(
                switch,
                DvsReconfigureSpec {
                    config_version: config_version.clone(),
                    hosts: uplinks.clone(),
                },
            )
            .await
            .map_err(|e| not_issued(step, name, e))?;

        self.await_task(step, name, &task, cancel).await?;
        Ok((config_version, uplinks))
    }

    async fn await_task(
        &self,
        step: Step,
        entity: &str,
        task: &TaskHandle,
        cancel: &CancellationToken,
    ) -> ProvisioningResult<TaskResult> {
        debug!(step = %step, task_id = %task, entity, "Waiting for task");
        self.waiter
            .wait_with_cancel(self.client.as_ref(), task, cancel)
            .await
            .map_err(|e| task_failure(step, entity, e))
    }
}

fn discovery(entity: &'static str, reason: String) -> ProvisioningError {
    ProvisioningError::Discovery { entity, reason }
}

/// The request was refused before a task existed
fn not_issued(step: Step, entity: &str, err: impl std::fmt::Display) -> ProvisioningError {
    ProvisioningError::ControlPlaneTask {
        step,
        entity: Some(entity.to_string()),
        task_id: None,
        cause: err.to_string(),
    }
}

fn task_failure(step: Step, entity: &str, err: WaitError) -> ProvisioningError {
    let entity = Some(entity.to_string());
    match err {
        WaitError::Timeout { task, waited } => ProvisioningError::Timeout {
            step,
            entity,
            task_id: task.0,
            waited,
        },
        WaitError::Failed { task, cause } => ProvisioningError::ControlPlaneTask {
            step,
            entity,
            task_id: Some(task.0),
            cause,
        },
        WaitError::Client { task, source } => ProvisioningError::ControlPlaneTask {
            step,
            entity,
            task_id: Some(task.0),
            cause: source.to_string(),
        },
        WaitError::Cancelled { .. } => ProvisioningError::Cancelled { step },
    }
}
