//! Collaborator ports for the remote environment
//!
//! The engine never talks to a concrete API client. It consumes three
//! traits: `ArtifactRepository` for workspaces and workspace content,
//! `ConnectionRepository` for data connections, and `JobRunner` for
//! long-running jobs. Live implementations are injected at the binary
//! boundary; `InMemoryEnvironment` implements all three over `RefCell`
//! state and is the double every engine test runs against.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, VecDeque};

use crate::error::{CaravanError, CaravanResult};
use crate::models::{
    ArtifactDescriptor, ArtifactType, Connection, ConnectionKind, DefinitionBundle, JobHandle,
    JobKind, JobStatus, QueryEndpointInfo, Shortcut, Workspace,
};

/// Workspace and artifact operations
pub trait ArtifactRepository {
    /// Find a workspace by display name
    fn find_workspace(&self, display_name: &str) -> CaravanResult<Option<Workspace>>;

    /// Create a workspace, optionally assigned to a capacity. Callers
    /// must check `find_workspace` first; existing workspaces are
    /// reused, never replaced.
    fn create_workspace(
        &self,
        display_name: &str,
        description: &str,
        capacity_id: Option<&str>,
    ) -> CaravanResult<Workspace>;

    fn update_workspace_description(
        &self,
        workspace_id: &str,
        description: &str,
    ) -> CaravanResult<()>;

    fn list_artifacts(&self, workspace_id: &str) -> CaravanResult<Vec<ArtifactDescriptor>>;

    fn get_definition(
        &self,
        workspace_id: &str,
        artifact_id: &str,
    ) -> CaravanResult<DefinitionBundle>;

    fn create_artifact(
        &self,
        workspace_id: &str,
        display_name: &str,
        artifact_type: ArtifactType,
        definition: &DefinitionBundle,
    ) -> CaravanResult<ArtifactDescriptor>;

    fn update_definition(
        &self,
        workspace_id: &str,
        artifact_id: &str,
        definition: &DefinitionBundle,
    ) -> CaravanResult<()>;

    fn delete_artifact(&self, workspace_id: &str, artifact_id: &str) -> CaravanResult<()>;

    /// Definition-less create; the remote provisions the container and
    /// its query endpoint asynchronously.
    fn create_storage_container(
        &self,
        workspace_id: &str,
        display_name: &str,
    ) -> CaravanResult<ArtifactDescriptor>;

    /// Current query-endpoint state for a storage container
    fn query_endpoint(
        &self,
        workspace_id: &str,
        container_id: &str,
    ) -> CaravanResult<QueryEndpointInfo>;

    fn create_shortcut(
        &self,
        workspace_id: &str,
        container_id: &str,
        shortcut: &Shortcut,
    ) -> CaravanResult<()>;

    fn list_shortcuts(
        &self,
        workspace_id: &str,
        container_id: &str,
    ) -> CaravanResult<Vec<Shortcut>>;
}

/// Data connection operations. Connections live outside workspaces.
pub trait ConnectionRepository {
    fn list_connections(&self) -> CaravanResult<Vec<Connection>>;

    fn create_connection(
        &self,
        display_name: &str,
        kind: &ConnectionKind,
        path: &str,
    ) -> CaravanResult<Connection>;

    fn delete_connection(&self, connection_id: &str) -> CaravanResult<()>;

    /// Bind a semantic model's datasource to a connection
    fn bind_model_connection(
        &self,
        workspace_id: &str,
        model_id: &str,
        connection_id: &str,
    ) -> CaravanResult<()>;
}

/// Long-running job submission and polling
pub trait JobRunner {
    fn submit(
        &self,
        workspace_id: &str,
        artifact_id: &str,
        kind: JobKind,
    ) -> CaravanResult<JobHandle>;

    fn status(&self, handle: &JobHandle) -> CaravanResult<JobStatus>;
}

/// In-memory implementation of all three ports
///
/// Holds environment state in `RefCell`s and records every mutating and
/// polling call in an operation log, so tests can assert both final
/// state and call ordering. Construction knobs let tests delay endpoint
/// provisioning, script job status sequences, and fail specific
/// deletes.
#[derive(Default)]
pub struct InMemoryEnvironment {
    workspaces: RefCell<Vec<Workspace>>,
    artifacts: RefCell<BTreeMap<String, Vec<ArtifactDescriptor>>>,
    shortcuts: RefCell<BTreeMap<(String, String), Vec<Shortcut>>>,
    connections: RefCell<Vec<Connection>>,
    bindings: RefCell<Vec<(String, String)>>,
    /// Probes remaining before each container's endpoint reports ready
    endpoint_delays: RefCell<BTreeMap<String, u32>>,
    /// Scripted status sequences keyed by artifact id; unscripted jobs
    /// complete on the first poll
    job_scripts: RefCell<BTreeMap<String, VecDeque<JobStatus>>>,
    failing_deletes: RefCell<BTreeSet<String>>,
    operations: RefCell<Vec<String>>,
    next_id: RefCell<u64>,
}

impl InMemoryEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&self, prefix: &str) -> String {
        let mut counter = self.next_id.borrow_mut();
        *counter += 1;
        format!("{prefix}-{counter}")
    }

    fn log(&self, entry: String) {
        self.operations.borrow_mut().push(entry);
    }

    /// Every operation recorded so far, in call order
    pub fn operations(&self) -> Vec<String> {
        self.operations.borrow().clone()
    }

    /// Index of the first operation starting with `prefix`
    pub fn first_operation_index(&self, prefix: &str) -> Option<usize> {
        self.operations
            .borrow()
            .iter()
            .position(|op| op.starts_with(prefix))
    }

    pub fn operation_count(&self, prefix: &str) -> usize {
        self.operations
            .borrow()
            .iter()
            .filter(|op| op.starts_with(prefix))
            .count()
    }

    /// Require `count` polls before a container's endpoint is ready
    pub fn delay_endpoint(&self, container_id: &str, probes: u32) {
        self.endpoint_delays
            .borrow_mut()
            .insert(container_id.to_string(), probes);
    }

    /// Script the status sequence for jobs on the given artifact
    pub fn script_job(&self, artifact_id: &str, statuses: Vec<JobStatus>) {
        self.job_scripts
            .borrow_mut()
            .insert(artifact_id.to_string(), statuses.into());
    }

    /// Make `delete_artifact` fail for the given artifact id
    pub fn fail_delete_of(&self, artifact_id: &str) {
        self.failing_deletes
            .borrow_mut()
            .insert(artifact_id.to_string());
    }

    /// Seed a workspace directly, bypassing the port
    pub fn seed_workspace(&self, display_name: &str, description: &str) -> Workspace {
        let workspace = Workspace {
            id: self.next_id("ws"),
            display_name: display_name.to_string(),
            description: description.to_string(),
        };
        self.workspaces.borrow_mut().push(workspace.clone());
        workspace
    }

    /// Seed an artifact directly, bypassing the port
    pub fn seed_artifact(
        &self,
        workspace_id: &str,
        display_name: &str,
        artifact_type: ArtifactType,
        definition: DefinitionBundle,
    ) -> ArtifactDescriptor {
        let artifact = ArtifactDescriptor::new(display_name, artifact_type, self.next_id("art"))
            .with_definition(definition);
        self.artifacts
            .borrow_mut()
            .entry(workspace_id.to_string())
            .or_default()
            .push(artifact.clone());
        artifact
    }

    pub fn shortcuts_in(&self, workspace_id: &str, container_id: &str) -> Vec<Shortcut> {
        self.shortcuts
            .borrow()
            .get(&(workspace_id.to_string(), container_id.to_string()))
            .cloned()
            .unwrap_or_default()
    }

    pub fn bindings(&self) -> Vec<(String, String)> {
        self.bindings.borrow().clone()
    }

    fn find_artifact(
        &self,
        workspace_id: &str,
        artifact_id: &str,
    ) -> CaravanResult<ArtifactDescriptor> {
        self.artifacts
            .borrow()
            .get(workspace_id)
            .and_then(|items| items.iter().find(|a| a.id == artifact_id))
            .cloned()
            .ok_or_else(|| CaravanError::remote("find_artifact", format!("no artifact {artifact_id}")))
    }
}

impl ArtifactRepository for InMemoryEnvironment {
    fn find_workspace(&self, display_name: &str) -> CaravanResult<Option<Workspace>> {
        Ok(self
            .workspaces
            .borrow()
            .iter()
            .find(|w| w.display_name == display_name)
            .cloned())
    }

    fn create_workspace(
        &self,
        display_name: &str,
        description: &str,
        capacity_id: Option<&str>,
    ) -> CaravanResult<Workspace> {
        let workspace = Workspace {
            id: self.next_id("ws"),
            display_name: display_name.to_string(),
            description: description.to_string(),
        };
        match capacity_id {
            Some(capacity) => self.log(format!("create_workspace {display_name} on {capacity}")),
            None => self.log(format!("create_workspace {display_name}")),
        }
        self.workspaces.borrow_mut().push(workspace.clone());
        Ok(workspace)
    }

    fn update_workspace_description(
        &self,
        workspace_id: &str,
        description: &str,
    ) -> CaravanResult<()> {
        self.log(format!("update_workspace {workspace_id}"));
        let mut workspaces = self.workspaces.borrow_mut();
        let workspace = workspaces
            .iter_mut()
            .find(|w| w.id == workspace_id)
            .ok_or_else(|| {
                CaravanError::remote("update_workspace", format!("no workspace {workspace_id}"))
            })?;
        workspace.description = description.to_string();
        Ok(())
    }

    fn list_artifacts(&self, workspace_id: &str) -> CaravanResult<Vec<ArtifactDescriptor>> {
        Ok(self
            .artifacts
            .borrow()
            .get(workspace_id)
            .cloned()
            .unwrap_or_default())
    }

    fn get_definition(
        &self,
        workspace_id: &str,
        artifact_id: &str,
    ) -> CaravanResult<DefinitionBundle> {
        Ok(self.find_artifact(workspace_id, artifact_id)?.definition)
    }

    fn create_artifact(
        &self,
        workspace_id: &str,
        display_name: &str,
        artifact_type: ArtifactType,
        definition: &DefinitionBundle,
    ) -> CaravanResult<ArtifactDescriptor> {
        self.log(format!("create_artifact {display_name}.{artifact_type}"));
        let artifact = ArtifactDescriptor::new(display_name, artifact_type, self.next_id("art"))
            .with_definition(definition.clone());
        self.artifacts
            .borrow_mut()
            .entry(workspace_id.to_string())
            .or_default()
            .push(artifact.clone());
        Ok(artifact)
    }

    fn update_definition(
        &self,
        workspace_id: &str,
        artifact_id: &str,
        definition: &DefinitionBundle,
    ) -> CaravanResult<()> {
        let mut artifacts = self.artifacts.borrow_mut();
        let item = artifacts
            .get_mut(workspace_id)
            .and_then(|items| items.iter_mut().find(|a| a.id == artifact_id))
            .ok_or_else(|| {
                CaravanError::remote("update_artifact", format!("no artifact {artifact_id}"))
            })?;
        item.definition = definition.clone();
        let name = item.item_name();
        drop(artifacts);
        self.log(format!("update_artifact {name}"));
        Ok(())
    }

    fn delete_artifact(&self, workspace_id: &str, artifact_id: &str) -> CaravanResult<()> {
        if self.failing_deletes.borrow().contains(artifact_id) {
            self.log(format!("delete_artifact {artifact_id} (failed)"));
            return Err(CaravanError::remote(
                "delete_artifact",
                format!("artifact {artifact_id} is locked"),
            ));
        }
        let existing = self.find_artifact(workspace_id, artifact_id)?;
        self.log(format!("delete_artifact {}", existing.item_name()));
        let mut artifacts = self.artifacts.borrow_mut();
        if let Some(items) = artifacts.get_mut(workspace_id) {
            items.retain(|a| a.id != artifact_id);
        }
        Ok(())
    }

    fn create_storage_container(
        &self,
        workspace_id: &str,
        display_name: &str,
    ) -> CaravanResult<ArtifactDescriptor> {
        self.log(format!("create_container {display_name}"));
        let container = ArtifactDescriptor::new(
            display_name,
            ArtifactType::StorageContainer,
            self.next_id("art"),
        );
        // the remote provisions an endpoint alongside every container
        let endpoint = ArtifactDescriptor::new(
            display_name,
            ArtifactType::QueryEndpoint,
            format!("{}-endpoint", container.id),
        );
        let mut artifacts = self.artifacts.borrow_mut();
        let items = artifacts.entry(workspace_id.to_string()).or_default();
        items.push(container.clone());
        items.push(endpoint);
        Ok(container)
    }

    fn query_endpoint(
        &self,
        workspace_id: &str,
        container_id: &str,
    ) -> CaravanResult<QueryEndpointInfo> {
        self.log(format!("probe_endpoint {container_id}"));
        let mut delays = self.endpoint_delays.borrow_mut();
        let provisioned = match delays.get_mut(container_id) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                false
            }
            _ => true,
        };
        Ok(QueryEndpointInfo {
            id: format!("{container_id}-endpoint"),
            server: format!("qe-server-{workspace_id}"),
            provisioned,
        })
    }

    fn create_shortcut(
        &self,
        workspace_id: &str,
        container_id: &str,
        shortcut: &Shortcut,
    ) -> CaravanResult<()> {
        self.log(format!("create_shortcut {}", shortcut.mount_point()));
        self.shortcuts
            .borrow_mut()
            .entry((workspace_id.to_string(), container_id.to_string()))
            .or_default()
            .push(shortcut.clone());
        Ok(())
    }

    fn list_shortcuts(
        &self,
        workspace_id: &str,
        container_id: &str,
    ) -> CaravanResult<Vec<Shortcut>> {
        Ok(self.shortcuts_in(workspace_id, container_id))
    }
}

impl ConnectionRepository for InMemoryEnvironment {
    fn list_connections(&self) -> CaravanResult<Vec<Connection>> {
        Ok(self.connections.borrow().clone())
    }

    fn create_connection(
        &self,
        display_name: &str,
        kind: &ConnectionKind,
        path: &str,
    ) -> CaravanResult<Connection> {
        self.log(format!("create_connection {display_name}"));
        let connection = Connection {
            id: self.next_id("conn"),
            display_name: display_name.to_string(),
            kind: kind.clone(),
            path: path.to_string(),
        };
        self.connections.borrow_mut().push(connection.clone());
        Ok(connection)
    }

    fn delete_connection(&self, connection_id: &str) -> CaravanResult<()> {
        self.log(format!("delete_connection {connection_id}"));
        self.connections.borrow_mut().retain(|c| c.id != connection_id);
        Ok(())
    }

    fn bind_model_connection(
        &self,
        _workspace_id: &str,
        model_id: &str,
        connection_id: &str,
    ) -> CaravanResult<()> {
        self.log(format!("bind_model {model_id} {connection_id}"));
        self.bindings
            .borrow_mut()
            .push((model_id.to_string(), connection_id.to_string()));
        Ok(())
    }
}

impl JobRunner for InMemoryEnvironment {
    fn submit(
        &self,
        workspace_id: &str,
        artifact_id: &str,
        kind: JobKind,
    ) -> CaravanResult<JobHandle> {
        self.log(format!("submit_job {artifact_id} {kind}"));
        Ok(JobHandle {
            job_id: self.next_id("job"),
            workspace_id: workspace_id.to_string(),
            artifact_id: artifact_id.to_string(),
        })
    }

    fn status(&self, handle: &JobHandle) -> CaravanResult<JobStatus> {
        let mut scripts = self.job_scripts.borrow_mut();
        let status = match scripts.get_mut(&handle.artifact_id) {
            Some(sequence) => sequence.pop_front().unwrap_or(JobStatus::Completed),
            None => JobStatus::Completed,
        };
        Ok(status)
    }
}
