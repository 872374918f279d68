//! Reconciler core
//!
//! Owns the run state shared across categories: the target workspace,
//! the redirect maps, the index of existing target artifacts, and the
//! run counters. The per-category rules live in sibling modules as
//! further `impl Reconciler` blocks.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::CaravanResult;
use crate::events::{DeployEvent, DeployEventSink};
use crate::jobs::{JobOutcome, JobWaiter, Sleeper, ThreadSleeper};
use crate::models::{ArtifactDescriptor, ArtifactType, DefinitionBundle, JobKind, Workspace};
use crate::package::SolutionSource;
use crate::plan::DeploymentPlan;
use crate::redirect::{RedirectCategory, RedirectMaps};
use crate::remote::{ArtifactRepository, ConnectionRepository, JobRunner};

/// Options for one reconciliation run
#[derive(Debug, Clone)]
pub struct ReconcileOptions {
    /// Customer the deployment targets; names the workspace
    pub customer_name: String,
    /// Delete target artifacts with no source counterpart
    pub prune: bool,
    /// Restrict create/update to one artifact type
    pub only_type: Option<ArtifactType>,
    /// Prefix prepended to the customer name to form the workspace name
    pub workspace_prefix: String,
    /// Capacity assigned when the workspace is created
    pub capacity_id: Option<String>,
}

impl ReconcileOptions {
    pub fn new(customer_name: impl Into<String>) -> Self {
        Self {
            customer_name: customer_name.into(),
            prune: false,
            only_type: None,
            workspace_prefix: "Tenant-".to_string(),
            capacity_id: None,
        }
    }

    pub fn with_prune(mut self, prune: bool) -> Self {
        self.prune = prune;
        self
    }

    pub fn with_only_type(mut self, only_type: Option<ArtifactType>) -> Self {
        self.only_type = only_type;
        self
    }

    pub fn workspace_name(&self) -> String {
        format!("{}{}", self.workspace_prefix, self.customer_name)
    }

    pub(crate) fn includes(&self, artifact_type: ArtifactType) -> bool {
        self.only_type.is_none_or(|t| t == artifact_type)
    }
}

/// Counters for one completed run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileResult {
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    pub pruned: usize,
    pub job_failures: usize,
}

/// Mutable state threaded through the category walk
pub(crate) struct RunContext<'a> {
    pub source: &'a SolutionSource,
    pub plan: &'a DeploymentPlan,
    pub options: &'a ReconcileOptions,
    pub workspace: Workspace,
    pub maps: RedirectMaps,
    /// Existing target artifacts, keyed by cross-environment identity
    pub target_index: BTreeMap<(String, ArtifactType), ArtifactDescriptor>,
    /// Storage containers seen this run; marks their default models
    pub container_names: BTreeSet<String>,
    /// Target query-endpoint server string, set by the storage phase
    pub endpoint_server: Option<String>,
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    pub pruned: usize,
    pub job_failures: usize,
}

impl<'a> RunContext<'a> {
    fn new(
        source: &'a SolutionSource,
        plan: &'a DeploymentPlan,
        options: &'a ReconcileOptions,
        workspace: Workspace,
    ) -> Self {
        Self {
            source,
            plan,
            options,
            workspace,
            maps: RedirectMaps::new(),
            target_index: BTreeMap::new(),
            container_names: BTreeSet::new(),
            endpoint_server: None,
            created: 0,
            updated: 0,
            skipped: 0,
            pruned: 0,
            job_failures: 0,
        }
    }

    pub fn target_of(&self, artifact: &ArtifactDescriptor) -> Option<&ArtifactDescriptor> {
        self.target_index.get(&artifact.identity())
    }

    fn into_result(self) -> ReconcileResult {
        ReconcileResult {
            created: self.created,
            updated: self.updated,
            skipped: self.skipped,
            pruned: self.pruned,
            job_failures: self.job_failures,
        }
    }
}

/// Drives one source solution into one target workspace
pub struct Reconciler<'a, S: Sleeper = ThreadSleeper> {
    pub(crate) artifacts: &'a dyn ArtifactRepository,
    pub(crate) connections: &'a dyn ConnectionRepository,
    pub(crate) jobs: &'a dyn JobRunner,
    pub(crate) events: &'a dyn DeployEventSink,
    pub(crate) waiter: JobWaiter<S>,
}

impl<'a, S: Sleeper> Reconciler<'a, S> {
    pub fn new(
        artifacts: &'a dyn ArtifactRepository,
        connections: &'a dyn ConnectionRepository,
        jobs: &'a dyn JobRunner,
        events: &'a dyn DeployEventSink,
        waiter: JobWaiter<S>,
    ) -> Self {
        Self {
            artifacts,
            connections,
            jobs,
            events,
            waiter,
        }
    }

    /// Reconcile the target workspace against `source`.
    ///
    /// Idempotent: artifacts that already exist take the update path,
    /// and the workspace is found before it is created.
    pub fn deploy(
        &self,
        source: &SolutionSource,
        plan: &DeploymentPlan,
        options: &ReconcileOptions,
    ) -> CaravanResult<ReconcileResult> {
        let workspace = self.ensure_workspace(source, options)?;
        self.events.on_event(DeployEvent::Started {
            customer: options.customer_name.clone(),
            workspace: workspace.display_name.clone(),
        });

        let mut ctx = RunContext::new(source, plan, options, workspace);

        // compute-unit definitions embed the source workspace id
        if !source.workspace_id.is_empty() {
            ctx.maps.record(
                RedirectCategory::ComputeUnit,
                source.workspace_id.clone(),
                ctx.workspace.id.clone(),
            )?;
        }

        for artifact in self.artifacts.list_artifacts(&ctx.workspace.id)? {
            ctx.target_index.insert(artifact.identity(), artifact);
        }

        self.reconcile_connections(&mut ctx)?;
        self.reconcile_storage(&mut ctx)?;
        self.reconcile_compute(&mut ctx)?;
        self.reconcile_models(&mut ctx)?;
        self.reconcile_reports(&mut ctx)?;
        if options.prune {
            self.prune_orphans(&mut ctx)?;
        }

        let result = ctx.into_result();
        self.events.on_event(DeployEvent::Completed {
            created: result.created,
            updated: result.updated,
            skipped: result.skipped,
            pruned: result.pruned,
            job_failures: result.job_failures,
        });
        Ok(result)
    }

    /// Find the customer workspace by name, creating it only when
    /// absent. Existing workspaces are reused with their content intact;
    /// only the description is refreshed.
    fn ensure_workspace(
        &self,
        source: &SolutionSource,
        options: &ReconcileOptions,
    ) -> CaravanResult<Workspace> {
        let name = options.workspace_name();
        match self.artifacts.find_workspace(&name)? {
            Some(mut existing) => {
                if !source.description.is_empty() && existing.description != source.description {
                    self.artifacts
                        .update_workspace_description(&existing.id, &source.description)?;
                    existing.description = source.description.clone();
                }
                Ok(existing)
            }
            None => self.artifacts.create_workspace(
                &name,
                &source.description,
                options.capacity_id.as_deref(),
            ),
        }
    }

    /// Create or update one artifact in the target. Returns the target
    /// descriptor and whether it was created this run.
    pub(crate) fn upsert_artifact(
        &self,
        ctx: &mut RunContext,
        source_artifact: &ArtifactDescriptor,
        definition: &DefinitionBundle,
    ) -> CaravanResult<(ArtifactDescriptor, bool)> {
        match ctx.target_of(source_artifact).cloned() {
            Some(existing) => {
                self.artifacts
                    .update_definition(&ctx.workspace.id, &existing.id, definition)?;
                ctx.updated += 1;
                self.events.on_event(DeployEvent::ArtifactUpdated {
                    item: source_artifact.item_name(),
                });
                Ok((existing, false))
            }
            None => {
                let created = self.artifacts.create_artifact(
                    &ctx.workspace.id,
                    &source_artifact.display_name,
                    source_artifact.artifact_type,
                    definition,
                )?;
                ctx.target_index.insert(created.identity(), created.clone());
                ctx.created += 1;
                self.events.on_event(DeployEvent::ArtifactCreated {
                    item: created.item_name(),
                });
                Ok((created, true))
            }
        }
    }

    pub(crate) fn skip_artifact(&self, ctx: &mut RunContext, item: String, reason: &str) {
        ctx.skipped += 1;
        self.events.on_event(DeployEvent::ArtifactSkipped {
            item,
            reason: reason.to_string(),
        });
    }

    /// Submit a job for a freshly created artifact and wait for its
    /// terminal state. A failed job is recorded and the run continues;
    /// an exhausted wait aborts the run.
    pub(crate) fn run_artifact_job(
        &self,
        ctx: &mut RunContext,
        artifact: &ArtifactDescriptor,
        kind: JobKind,
    ) -> CaravanResult<()> {
        let handle = self.jobs.submit(&ctx.workspace.id, &artifact.id, kind)?;
        let operation = format!("{kind} on {}", artifact.item_name());
        let job_id = handle.job_id.clone();
        let outcome: JobOutcome = self.waiter.poll_until_terminal(self.jobs, handle, &operation)?;

        if outcome.succeeded() {
            self.events.on_event(DeployEvent::JobCompleted {
                item: artifact.item_name(),
                job_id,
            });
        } else {
            ctx.job_failures += 1;
            self.events.on_event(DeployEvent::JobFailed {
                item: artifact.item_name(),
                reason: outcome.failure_reason().unwrap_or_default(),
            });
        }
        Ok(())
    }
}
