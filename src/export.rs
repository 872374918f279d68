//! Workspace export
//!
//! Writes a workspace out as a packaged solution folder that
//! `SolutionPackage::load` reads back: one `<DisplayName>.<Type>`
//! directory per artifact with its `.platform` file and definition
//! parts, plus the `deploy.config.json` manifest capturing the source
//! ids, container endpoints, shortcuts and connections a later
//! deployment rewrites against. Query endpoints are not exported; the
//! target environment provisions its own.

use std::fs;
use std::path::Path;

use crate::error::{CaravanError, CaravanResult};
use crate::models::ArtifactType;
use crate::package::{
    DeployManifest, ManifestConnection, ManifestContainer, ManifestItem, PlatformConfig,
    PlatformFile, PlatformMetadata, MANIFEST_FILE, PLATFORM_FILE,
};
use crate::remote::{ArtifactRepository, ConnectionRepository};

/// Export the named workspace into `out_dir`
pub fn export_workspace(
    artifacts: &dyn ArtifactRepository,
    connections: &dyn ConnectionRepository,
    workspace_name: &str,
    out_dir: &Path,
) -> CaravanResult<()> {
    let workspace = artifacts
        .find_workspace(workspace_name)?
        .ok_or_else(|| {
            CaravanError::remote("export", format!("workspace '{workspace_name}' not found"))
        })?;

    fs::create_dir_all(out_dir)?;

    let mut items = artifacts.list_artifacts(&workspace.id)?;
    items.sort_by(|a, b| {
        a.display_name
            .cmp(&b.display_name)
            .then_with(|| a.artifact_type.cmp(&b.artifact_type))
    });

    let mut manifest = DeployManifest {
        source_workspace_id: workspace.id.clone(),
        source_workspace_description: workspace.description.clone(),
        ..DeployManifest::default()
    };

    for item in &items {
        if item.artifact_type == ArtifactType::QueryEndpoint {
            continue;
        }

        let item_dir = out_dir.join(item.item_name());
        fs::create_dir_all(&item_dir)?;

        let platform = PlatformFile {
            metadata: PlatformMetadata {
                artifact_type: item.artifact_type.to_string(),
                display_name: item.display_name.clone(),
            },
            config: PlatformConfig {
                logical_id: item.id.clone(),
            },
        };
        fs::write(
            item_dir.join(PLATFORM_FILE),
            serde_json::to_string_pretty(&platform)?,
        )?;

        let definition = artifacts.get_definition(&workspace.id, &item.id)?;
        for part in &definition.parts {
            let part_path = item_dir.join(&part.path);
            if let Some(parent) = part_path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(part_path, &part.payload)?;
        }

        manifest.source_items.push(ManifestItem {
            id: item.id.clone(),
            display_name: item.display_name.clone(),
            artifact_type: item.artifact_type.to_string(),
        });

        if item.artifact_type == ArtifactType::StorageContainer {
            let endpoint = artifacts.query_endpoint(&workspace.id, &item.id)?;
            manifest.source_containers.push(ManifestContainer {
                id: item.id.clone(),
                display_name: item.display_name.clone(),
                server: endpoint.server,
                database: endpoint.id,
                shortcuts: artifacts.list_shortcuts(&workspace.id, &item.id)?,
            });
        }
    }

    for connection in connections.list_connections()? {
        manifest.source_connections.push(ManifestConnection {
            id: connection.id,
            display_name: connection.display_name,
            kind: connection.kind,
            path: connection.path,
        });
    }

    fs::write(
        out_dir.join(MANIFEST_FILE),
        serde_json::to_string_pretty(&manifest)?,
    )?;
    Ok(())
}
