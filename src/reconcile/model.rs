//! Semantic model reconciliation
//!
//! A model whose display name matches a storage container from this
//! run is the container's auto-provisioned default model: the target
//! already grew its own when the container was created, so migrating
//! the source copy would collide with it. Everything else rewrites
//! `definition/expressions.tmdl` through the semantic-model map, which
//! carries the endpoint database and server redirects recorded by the
//! storage phase.

use crate::error::CaravanResult;
use crate::events::DeployEvent;
use crate::jobs::Sleeper;
use crate::models::{ArtifactType, ConnectionKind};
use crate::reconcile::{Reconciler, RunContext};
use crate::redirect::RedirectCategory;
use crate::rewrite::rewrite_part;

impl<'a, S: Sleeper> Reconciler<'a, S> {
    pub(crate) fn reconcile_models(&self, ctx: &mut RunContext) -> CaravanResult<()> {
        self.events.on_event(DeployEvent::CategoryStarted {
            category: "semantic models".to_string(),
        });

        let Some(part_path) = ArtifactType::SemanticModel.rewrite_part() else {
            return Ok(());
        };
        let models: Vec<_> = ctx
            .source
            .artifacts_of(ArtifactType::SemanticModel)
            .into_iter()
            .cloned()
            .collect();

        for source_model in models {
            if ctx.container_names.contains(&source_model.display_name) {
                self.skip_artifact(
                    ctx,
                    source_model.item_name(),
                    "default model of a storage container",
                );
                continue;
            }

            if !ctx.options.includes(ArtifactType::SemanticModel) {
                if let Some(existing) = ctx.target_of(&source_model) {
                    let target_id = existing.id.clone();
                    ctx.maps.record(
                        RedirectCategory::Report,
                        source_model.id.clone(),
                        target_id,
                    )?;
                }
                self.skip_artifact(ctx, source_model.item_name(), "excluded by type filter");
                continue;
            }

            let entries = ctx.maps.snapshot(RedirectCategory::SemanticModel);
            let definition = rewrite_part(&source_model.definition, part_path, &entries)?;
            let (target, created) = self.upsert_artifact(ctx, &source_model, &definition)?;

            // reports reference models by id
            ctx.maps.record(
                RedirectCategory::Report,
                source_model.id.clone(),
                target.id.clone(),
            )?;

            if created {
                self.bind_model(ctx, &target.display_name, &target.id)?;
            }
        }
        Ok(())
    }

    /// Give a freshly created model its own endpoint connection. The
    /// model keeps working unbound, so a missing server string (no
    /// storage containers this run) just means no binding.
    fn bind_model(
        &self,
        ctx: &mut RunContext,
        model_name: &str,
        model_id: &str,
    ) -> CaravanResult<()> {
        let Some(server) = ctx.endpoint_server.clone() else {
            return Ok(());
        };
        let connection_name =
            format!("Endpoint-{}-{}", model_name, ctx.options.customer_name);
        let connection = self.connections.create_connection(
            &connection_name,
            &ConnectionKind::DataLake,
            &server,
        )?;
        self.connections
            .bind_model_connection(&ctx.workspace.id, model_id, &connection.id)
    }
}
