//! Packaged solution folders
//!
//! A packaged solution is a directory tree capturing one source
//! workspace well enough to deploy it without live access to the
//! source. One subdirectory per artifact, named `<DisplayName>.<Type>`,
//! containing a `.platform` metadata file plus the definition part
//! files, and a sibling `deploy.config.json` manifest carrying the
//! source ids, storage container details and connections that the
//! definition parts reference.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{CaravanError, CaravanResult};
use crate::models::{
    ArtifactDescriptor, ArtifactType, Connection, ConnectionKind, DefinitionBundle,
    DefinitionPart, Shortcut,
};

/// Name of the per-artifact metadata file
pub const PLATFORM_FILE: &str = ".platform";

/// Name of the package manifest
pub const MANIFEST_FILE: &str = "deploy.config.json";

/// Contents of a `.platform` metadata file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformFile {
    pub metadata: PlatformMetadata,
    pub config: PlatformConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformMetadata {
    #[serde(rename = "type")]
    pub artifact_type: String,
    pub display_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformConfig {
    pub logical_id: String,
}

/// Package manifest: the source-environment facts definitions refer to
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployManifest {
    pub source_workspace_id: String,
    #[serde(default)]
    pub source_workspace_description: String,
    #[serde(default)]
    pub source_items: Vec<ManifestItem>,
    #[serde(default)]
    pub source_containers: Vec<ManifestContainer>,
    #[serde(default)]
    pub source_connections: Vec<ManifestConnection>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestItem {
    pub id: String,
    pub display_name: String,
    #[serde(rename = "type")]
    pub artifact_type: String,
}

/// Storage container facts: endpoint strings plus shortcuts to recreate
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestContainer {
    pub id: String,
    pub display_name: String,
    /// Query endpoint server string in the source environment
    pub server: String,
    /// Query endpoint database id in the source environment
    pub database: String,
    #[serde(default)]
    pub shortcuts: Vec<Shortcut>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestConnection {
    pub id: String,
    pub display_name: String,
    pub kind: ConnectionKind,
    pub path: String,
}

/// One artifact read from a package folder
#[derive(Debug, Clone)]
pub struct SolutionItem {
    pub display_name: String,
    pub artifact_type: ArtifactType,
    pub logical_id: String,
    pub definition: DefinitionBundle,
}

/// A loaded packaged solution folder
#[derive(Debug, Clone)]
pub struct SolutionPackage {
    pub items: Vec<SolutionItem>,
    pub manifest: DeployManifest,
}

/// Source-side input to a reconciliation run
///
/// Built from a package or captured from a live workspace; the engine
/// never cares which.
#[derive(Debug, Clone, Default)]
pub struct SolutionSource {
    pub workspace_id: String,
    pub description: String,
    pub artifacts: Vec<ArtifactDescriptor>,
    pub containers: Vec<SourceContainer>,
    pub connections: Vec<Connection>,
}

/// Source storage container with its endpoint strings and shortcuts
#[derive(Debug, Clone)]
pub struct SourceContainer {
    pub id: String,
    pub display_name: String,
    pub server: String,
    pub database: String,
    pub shortcuts: Vec<Shortcut>,
}

impl SolutionSource {
    /// Artifacts of one type, in name order
    pub fn artifacts_of(&self, artifact_type: ArtifactType) -> Vec<&ArtifactDescriptor> {
        let mut items: Vec<&ArtifactDescriptor> = self
            .artifacts
            .iter()
            .filter(|a| a.artifact_type == artifact_type)
            .collect();
        items.sort_by(|a, b| a.display_name.cmp(&b.display_name));
        items
    }

    pub fn container(&self, display_name: &str) -> Option<&SourceContainer> {
        self.containers
            .iter()
            .find(|c| c.display_name == display_name)
    }
}

impl SolutionPackage {
    /// Read a packaged solution folder from disk.
    ///
    /// Entries are walked in sorted order so loading is deterministic
    /// across platforms.
    pub fn load(dir: &Path) -> CaravanResult<Self> {
        let manifest_path = dir.join(MANIFEST_FILE);
        if !manifest_path.exists() {
            return Err(CaravanError::InvalidPackage {
                message: format!("missing {MANIFEST_FILE} in {}", dir.display()),
            });
        }
        let manifest: DeployManifest = serde_json::from_str(&fs::read_to_string(&manifest_path)?)?;

        let mut entries: Vec<PathBuf> = fs::read_dir(dir)?
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .map(|e| e.path())
            .filter(|p| p.is_dir())
            .collect();
        entries.sort();

        let mut items = Vec::with_capacity(entries.len());
        for item_dir in entries {
            items.push(Self::load_item(&item_dir)?);
        }

        Ok(Self { items, manifest })
    }

    fn load_item(item_dir: &Path) -> CaravanResult<SolutionItem> {
        let platform_path = item_dir.join(PLATFORM_FILE);
        if !platform_path.exists() {
            return Err(CaravanError::InvalidPackage {
                message: format!("missing {PLATFORM_FILE} in {}", item_dir.display()),
            });
        }
        let platform: PlatformFile = serde_json::from_str(&fs::read_to_string(&platform_path)?)?;

        let artifact_type = ArtifactType::parse(&platform.metadata.artifact_type).ok_or_else(
            || CaravanError::InvalidPackage {
                message: format!(
                    "unknown artifact type '{}' in {}",
                    platform.metadata.artifact_type,
                    platform_path.display()
                ),
            },
        )?;

        let mut parts = Vec::new();
        collect_parts(item_dir, item_dir, &mut parts)?;

        Ok(SolutionItem {
            display_name: platform.metadata.display_name,
            artifact_type,
            logical_id: platform.config.logical_id,
            definition: DefinitionBundle::new(parts),
        })
    }

    /// Turn the loaded package into reconciliation input.
    ///
    /// Source ids come from the manifest where it lists the item, from
    /// the logical id otherwise. Redirects only need ids to be stable
    /// and unique within the source, not live.
    pub fn into_source(self) -> SolutionSource {
        let artifacts = self
            .items
            .into_iter()
            .map(|item| {
                let id = self
                    .manifest
                    .source_items
                    .iter()
                    .find(|m| {
                        m.display_name == item.display_name
                            && ArtifactType::parse(&m.artifact_type) == Some(item.artifact_type)
                    })
                    .map(|m| m.id.clone())
                    .unwrap_or(item.logical_id);
                ArtifactDescriptor::new(item.display_name, item.artifact_type, id)
                    .with_definition(item.definition)
            })
            .collect();

        let containers = self
            .manifest
            .source_containers
            .iter()
            .map(|c| SourceContainer {
                id: c.id.clone(),
                display_name: c.display_name.clone(),
                server: c.server.clone(),
                database: c.database.clone(),
                shortcuts: c.shortcuts.clone(),
            })
            .collect();

        let connections = self
            .manifest
            .source_connections
            .iter()
            .map(|c| Connection {
                id: c.id.clone(),
                display_name: c.display_name.clone(),
                kind: c.kind.clone(),
                path: c.path.clone(),
            })
            .collect();

        SolutionSource {
            workspace_id: self.manifest.source_workspace_id,
            description: self.manifest.source_workspace_description,
            artifacts,
            containers,
            connections,
        }
    }
}

/// Gather every file under `dir` except `.platform`, part paths
/// relative to `base`, in sorted order.
fn collect_parts(base: &Path, dir: &Path, parts: &mut Vec<DefinitionPart>) -> CaravanResult<()> {
    let mut entries: Vec<PathBuf> = fs::read_dir(dir)?
        .collect::<Result<Vec<_>, _>>()?
        .into_iter()
        .map(|e| e.path())
        .collect();
    entries.sort();

    for entry in entries {
        if entry.is_dir() {
            collect_parts(base, &entry, parts)?;
        } else {
            let relative = entry
                .strip_prefix(base)
                .map_err(|_| CaravanError::InvalidPackage {
                    message: format!("part {} escapes its item directory", entry.display()),
                })?
                .to_string_lossy()
                .replace('\\', "/");
            if relative == PLATFORM_FILE {
                continue;
            }
            parts.push(DefinitionPart::new(relative, fs::read(&entry)?));
        }
    }
    Ok(())
}
