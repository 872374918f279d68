//! Core data models for Caravan
//!
//! Defines the fundamental data structures used throughout Caravan:
//! - `ArtifactDescriptor`: a named, typed unit of workspace content
//! - `DefinitionBundle` / `DefinitionPart`: the multi-part definition payload
//! - `Connection`, `Shortcut`, `Workspace`: environment-local resources
//! - Job types consumed by the polling layer

use serde::{Deserialize, Serialize};

use crate::error::{CaravanError, CaravanResult};

/// Type of a workspace artifact
///
/// Identity across environments is the pair `(display_name, artifact_type)`;
/// remote ids are environment-local and never compared across environments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ArtifactType {
    /// Storage container holding files and tables (carries no definition)
    StorageContainer,
    /// Executable notebook
    Notebook,
    /// Data pipeline
    Pipeline,
    /// Semantic model over a storage container's query endpoint
    SemanticModel,
    /// Report bound to a semantic model
    Report,
    /// Auto-provisioned queryable interface over a storage container.
    /// Never migrated, never pruned.
    QueryEndpoint,
}

impl ArtifactType {
    /// Parse the `<Type>` half of a `<DisplayName>.<Type>` folder name
    pub fn parse(s: &str) -> Option<ArtifactType> {
        match s {
            "StorageContainer" => Some(ArtifactType::StorageContainer),
            "Notebook" => Some(ArtifactType::Notebook),
            "Pipeline" => Some(ArtifactType::Pipeline),
            "SemanticModel" => Some(ArtifactType::SemanticModel),
            "Report" => Some(ArtifactType::Report),
            "QueryEndpoint" => Some(ArtifactType::QueryEndpoint),
            _ => None,
        }
    }

    /// The definition part rewritten for this artifact type, if any
    pub fn rewrite_part(&self) -> Option<&'static str> {
        match self {
            ArtifactType::Notebook => Some("notebook-content.py"),
            ArtifactType::Pipeline => Some("pipeline-content.json"),
            ArtifactType::SemanticModel => Some("definition/expressions.tmdl"),
            ArtifactType::Report => Some("definition.pbir"),
            ArtifactType::StorageContainer | ArtifactType::QueryEndpoint => None,
        }
    }
}

impl std::fmt::Display for ArtifactType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ArtifactType::StorageContainer => "StorageContainer",
            ArtifactType::Notebook => "Notebook",
            ArtifactType::Pipeline => "Pipeline",
            ArtifactType::SemanticModel => "SemanticModel",
            ArtifactType::Report => "Report",
            ArtifactType::QueryEndpoint => "QueryEndpoint",
        };
        f.write_str(name)
    }
}

/// One named part of a multi-part artifact definition
///
/// Payloads are raw bytes; rewriting decodes UTF-8, substitutes, and
/// re-encodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefinitionPart {
    /// Part path within the bundle, e.g. `notebook-content.py`
    pub path: String,
    /// Raw part payload
    pub payload: Vec<u8>,
}

impl DefinitionPart {
    pub fn new(path: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            path: path.into(),
            payload: payload.into(),
        }
    }

    /// Decode the payload as UTF-8 text
    pub fn text(&self) -> CaravanResult<&str> {
        std::str::from_utf8(&self.payload).map_err(|_| CaravanError::InvalidPayload {
            part: self.path.clone(),
        })
    }
}

/// Ordered multi-part artifact definition
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DefinitionBundle {
    pub parts: Vec<DefinitionPart>,
}

impl DefinitionBundle {
    pub fn new(parts: Vec<DefinitionPart>) -> Self {
        Self { parts }
    }

    pub fn part(&self, path: &str) -> Option<&DefinitionPart> {
        self.parts.iter().find(|p| p.path == path)
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}

/// A named, typed artifact as seen by the repository
#[derive(Debug, Clone)]
pub struct ArtifactDescriptor {
    pub display_name: String,
    pub artifact_type: ArtifactType,
    /// Environment-local remote id
    pub id: String,
    pub definition: DefinitionBundle,
}

impl ArtifactDescriptor {
    pub fn new(
        display_name: impl Into<String>,
        artifact_type: ArtifactType,
        id: impl Into<String>,
    ) -> Self {
        Self {
            display_name: display_name.into(),
            artifact_type,
            id: id.into(),
            definition: DefinitionBundle::default(),
        }
    }

    pub fn with_definition(mut self, definition: DefinitionBundle) -> Self {
        self.definition = definition;
        self
    }

    /// `<DisplayName>.<Type>`, the cross-environment identity string
    pub fn item_name(&self) -> String {
        format!("{}.{}", self.display_name, self.artifact_type)
    }

    /// Cross-environment identity key
    pub fn identity(&self) -> (String, ArtifactType) {
        (self.display_name.clone(), self.artifact_type)
    }
}

/// Kind of a data connection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionKind {
    /// Anonymous web datasource
    Web,
    /// Data lake storage account
    DataLake,
    /// Anything the engine has no recreation rule for
    #[serde(untagged)]
    Other(String),
}

/// A named, credentialed pointer to an external data source.
/// Always environment-local; never reused by id across environments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Connection {
    pub id: String,
    pub display_name: String,
    pub kind: ConnectionKind,
    /// Datasource path: a web URL or `<server>/<container><container-path>`
    pub path: String,
}

/// A reference from one storage container to data physically located
/// in another store, resolved through a connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shortcut {
    pub name: String,
    /// Path inside the container the shortcut mounts under, e.g. `Files`
    pub path: String,
    /// Storage server location
    pub location: String,
    /// `/<container><container-path>` under the location
    pub subpath: String,
    pub connection_id: String,
}

impl Shortcut {
    /// `<path>/<name>`, the identity of a shortcut within its container
    pub fn mount_point(&self) -> String {
        format!("{}/{}", self.path, self.name)
    }
}

/// Isolated container scoping one tenant's artifact set
#[derive(Debug, Clone)]
pub struct Workspace {
    pub id: String,
    pub display_name: String,
    pub description: String,
}

/// Connection info for a storage container's auto-provisioned query endpoint
#[derive(Debug, Clone)]
pub struct QueryEndpointInfo {
    /// Endpoint database id; doubles as the endpoint artifact id
    pub id: String,
    /// Server connection string; same value for every container in a workspace
    pub server: String,
    pub provisioned: bool,
}

/// Kind of remote job an artifact supports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    RunNotebook,
    RunPipeline,
    RefreshTableSchema,
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            JobKind::RunNotebook => "RunNotebook",
            JobKind::RunPipeline => "RunPipeline",
            JobKind::RefreshTableSchema => "RefreshTableSchema",
        };
        f.write_str(name)
    }
}

/// Handle for a submitted long-running remote job
#[derive(Debug, Clone)]
pub struct JobHandle {
    pub job_id: String,
    pub workspace_id: String,
    pub artifact_id: String,
}

/// Remote job lifecycle states
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    NotStarted,
    InProgress,
    Completed,
    Failed { reason: String },
    Cancelled,
    /// Coalesced with an identical already-running job
    Deduped,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobStatus::NotStarted | JobStatus::InProgress)
    }
}
