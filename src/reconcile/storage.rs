//! Storage container reconciliation
//!
//! Containers are created definition-less; the remote provisions a
//! query endpoint for each one asynchronously. The phase blocks on
//! endpoint readiness because the endpoint's database id and server
//! string are exactly what semantic models connect through, and both
//! must be in the semantic-model redirect map before any model is
//! rewritten. Shortcuts are recreated through the connection redirects
//! on the create path; on the update path they are only compared and
//! reported.

use crate::error::CaravanResult;
use crate::events::DeployEvent;
use crate::jobs::Sleeper;
use crate::models::{ArtifactType, Shortcut};
use crate::reconcile::{Reconciler, RunContext};
use crate::redirect::RedirectCategory;
use crate::rewrite::apply_redirects;

impl<'a, S: Sleeper> Reconciler<'a, S> {
    pub(crate) fn reconcile_storage(&self, ctx: &mut RunContext) -> CaravanResult<()> {
        self.events.on_event(DeployEvent::CategoryStarted {
            category: "storage containers".to_string(),
        });

        let containers: Vec<_> = ctx
            .source
            .artifacts_of(ArtifactType::StorageContainer)
            .into_iter()
            .cloned()
            .collect();

        for source_container in containers {
            ctx.container_names
                .insert(source_container.display_name.clone());

            if !ctx.options.includes(ArtifactType::StorageContainer) {
                if let Some(existing) = ctx.target_of(&source_container).cloned() {
                    self.record_container_redirects(ctx, &source_container.display_name, &existing.id)?;
                }
                self.skip_artifact(ctx, source_container.item_name(), "excluded by type filter");
                continue;
            }

            let (target, created) = match ctx.target_of(&source_container).cloned() {
                Some(existing) => {
                    self.skip_artifact(ctx, source_container.item_name(), "already provisioned");
                    (existing, false)
                }
                None => {
                    let created = self
                        .artifacts
                        .create_storage_container(&ctx.workspace.id, &source_container.display_name)?;
                    ctx.target_index.insert(created.identity(), created.clone());
                    ctx.created += 1;
                    self.events.on_event(DeployEvent::ArtifactCreated {
                        item: created.item_name(),
                    });
                    (created, true)
                }
            };

            self.record_container_redirects(ctx, &source_container.display_name, &target.id)?;

            if created {
                self.create_shortcuts(ctx, &source_container.display_name, &target.id)?;
            } else {
                self.report_missing_shortcuts(ctx, &source_container.display_name, &target.id)?;
            }
        }

        Ok(())
    }

    /// Wait for the container's endpoint and record its redirects:
    /// container id into the compute-unit map, endpoint database id and
    /// server string into the semantic-model map.
    fn record_container_redirects(
        &self,
        ctx: &mut RunContext,
        container_name: &str,
        target_id: &str,
    ) -> CaravanResult<()> {
        let workspace_id = ctx.workspace.id.clone();
        let operation = format!("query endpoint provisioning for {container_name}");
        self.waiter.wait_until_ready(&operation, || {
            Ok(self
                .artifacts
                .query_endpoint(&workspace_id, target_id)?
                .provisioned)
        })?;
        let endpoint = self.artifacts.query_endpoint(&workspace_id, target_id)?;
        ctx.endpoint_server = Some(endpoint.server.clone());

        let Some(source_container) = ctx.source.container(container_name).cloned() else {
            // live captures always carry container facts; a package may
            // omit them, in which case there is nothing to map from
            return Ok(());
        };

        ctx.maps.record(
            RedirectCategory::ComputeUnit,
            source_container.id.clone(),
            target_id.to_string(),
        )?;
        ctx.maps.record(
            RedirectCategory::SemanticModel,
            source_container.database.clone(),
            endpoint.id.clone(),
        )?;
        // the server string is workspace-wide; identical for every container
        ctx.maps.record(
            RedirectCategory::SemanticModel,
            source_container.server.clone(),
            endpoint.server,
        )?;
        Ok(())
    }

    /// Recreate the source container's shortcuts in the target,
    /// translating connection ids and storage paths through the
    /// connection redirects.
    fn create_shortcuts(
        &self,
        ctx: &mut RunContext,
        container_name: &str,
        target_id: &str,
    ) -> CaravanResult<()> {
        let Some(source_container) = ctx.source.container(container_name).cloned() else {
            return Ok(());
        };
        let redirects = ctx.maps.snapshot(RedirectCategory::Connection);

        for shortcut in &source_container.shortcuts {
            let connection_id = ctx
                .maps
                .target(RedirectCategory::Connection, &shortcut.connection_id)
                .unwrap_or(&shortcut.connection_id)
                .to_string();
            let translated = Shortcut {
                name: shortcut.name.clone(),
                path: shortcut.path.clone(),
                location: apply_redirects(&shortcut.location, &redirects),
                subpath: apply_redirects(&shortcut.subpath, &redirects),
                connection_id,
            };
            self.artifacts
                .create_shortcut(&ctx.workspace.id, target_id, &translated)?;
        }
        Ok(())
    }

    /// Update path: compare shortcuts by mount point and report the
    /// ones the target is missing, without mutating.
    fn report_missing_shortcuts(
        &self,
        ctx: &mut RunContext,
        container_name: &str,
        target_id: &str,
    ) -> CaravanResult<()> {
        let Some(source_container) = ctx.source.container(container_name) else {
            return Ok(());
        };
        let existing = self
            .artifacts
            .list_shortcuts(&ctx.workspace.id, target_id)?;

        for shortcut in &source_container.shortcuts {
            let present = existing
                .iter()
                .any(|s| s.mount_point() == shortcut.mount_point());
            if !present {
                self.events.on_event(DeployEvent::ShortcutMissing {
                    container: container_name.to_string(),
                    mount_point: shortcut.mount_point(),
                });
            }
        }
        Ok(())
    }
}
