//! Compute unit reconciliation
//!
//! Notebooks first, then pipelines: pipelines invoke notebooks by id,
//! so every notebook redirect must be on record before the first
//! pipeline definition is rewritten. Both kinds rewrite through the
//! compute-unit map, which already contains the connection, workspace
//! and container redirects.
//!
//! Jobs run on the create path only. A display name containing
//! "Create" marks a table-building unit whose job must finish before
//! models can refresh against the tables it produces.

use crate::error::CaravanResult;
use crate::events::DeployEvent;
use crate::jobs::Sleeper;
use crate::models::{ArtifactType, JobKind};
use crate::reconcile::{Reconciler, RunContext};
use crate::redirect::RedirectCategory;
use crate::rewrite::rewrite_part;

impl<'a, S: Sleeper> Reconciler<'a, S> {
    pub(crate) fn reconcile_compute(&self, ctx: &mut RunContext) -> CaravanResult<()> {
        self.events.on_event(DeployEvent::CategoryStarted {
            category: "notebooks".to_string(),
        });
        self.reconcile_compute_kind(ctx, ArtifactType::Notebook, JobKind::RunNotebook)?;

        self.events.on_event(DeployEvent::CategoryStarted {
            category: "pipelines".to_string(),
        });
        self.reconcile_compute_kind(ctx, ArtifactType::Pipeline, JobKind::RunPipeline)?;
        Ok(())
    }

    fn reconcile_compute_kind(
        &self,
        ctx: &mut RunContext,
        artifact_type: ArtifactType,
        job_kind: JobKind,
    ) -> CaravanResult<()> {
        let Some(part_path) = artifact_type.rewrite_part() else {
            return Ok(());
        };
        let units: Vec<_> = ctx
            .source
            .artifacts_of(artifact_type)
            .into_iter()
            .cloned()
            .collect();

        for source_unit in units {
            if !ctx.options.includes(artifact_type) {
                if let Some(existing) = ctx.target_of(&source_unit) {
                    let target_id = existing.id.clone();
                    ctx.maps.record(
                        RedirectCategory::ComputeUnit,
                        source_unit.id.clone(),
                        target_id,
                    )?;
                }
                self.skip_artifact(ctx, source_unit.item_name(), "excluded by type filter");
                continue;
            }

            let entries = ctx.maps.snapshot(RedirectCategory::ComputeUnit);
            let definition = rewrite_part(&source_unit.definition, part_path, &entries)?;
            let (target, created) = self.upsert_artifact(ctx, &source_unit, &definition)?;

            ctx.maps.record(
                RedirectCategory::ComputeUnit,
                source_unit.id.clone(),
                target.id.clone(),
            )?;

            if created && source_unit.display_name.contains("Create") {
                self.run_artifact_job(ctx, &target, job_kind)?;
            }
        }
        Ok(())
    }
}
