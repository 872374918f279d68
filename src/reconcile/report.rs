//! Report reconciliation
//!
//! Reports carry one rewritable reference: the semantic model their
//! `definition.pbir` points at. They rewrite through the report map
//! alone, populated with model id redirects by the model phase.

use crate::error::CaravanResult;
use crate::events::DeployEvent;
use crate::jobs::Sleeper;
use crate::models::ArtifactType;
use crate::reconcile::{Reconciler, RunContext};
use crate::redirect::RedirectCategory;
use crate::rewrite::rewrite_part;

impl<'a, S: Sleeper> Reconciler<'a, S> {
    pub(crate) fn reconcile_reports(&self, ctx: &mut RunContext) -> CaravanResult<()> {
        self.events.on_event(DeployEvent::CategoryStarted {
            category: "reports".to_string(),
        });

        let Some(part_path) = ArtifactType::Report.rewrite_part() else {
            return Ok(());
        };
        let reports: Vec<_> = ctx
            .source
            .artifacts_of(ArtifactType::Report)
            .into_iter()
            .cloned()
            .collect();

        for source_report in reports {
            if !ctx.options.includes(ArtifactType::Report) {
                self.skip_artifact(ctx, source_report.item_name(), "excluded by type filter");
                continue;
            }

            let entries = ctx.maps.snapshot(RedirectCategory::Report);
            let definition = rewrite_part(&source_report.definition, part_path, &entries)?;
            self.upsert_artifact(ctx, &source_report, &definition)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::events::NoopEventSink;
    use crate::jobs::{InstantSleeper, JobWaiter, WaitPolicy};
    use crate::models::{ArtifactDescriptor, ArtifactType, DefinitionBundle, DefinitionPart};
    use crate::package::SolutionSource;
    use crate::plan::DeploymentPlan;
    use crate::reconcile::{ReconcileOptions, Reconciler};
    use crate::remote::{ArtifactRepository, InMemoryEnvironment};

    #[test]
    fn report_model_reference_is_rewritten() {
        let env = InMemoryEnvironment::new();
        let source = SolutionSource {
            artifacts: vec![
                ArtifactDescriptor::new("sales analysis", ArtifactType::SemanticModel, "model-src")
                    .with_definition(DefinitionBundle::new(vec![DefinitionPart::new(
                        "definition/expressions.tmdl",
                        "let x = 1".as_bytes(),
                    )])),
                ArtifactDescriptor::new("sales report", ArtifactType::Report, "rep-src")
                    .with_definition(DefinitionBundle::new(vec![DefinitionPart::new(
                        "definition.pbir",
                        r#"{"datasetReference": {"byConnection": "model-src"}}"#.as_bytes(),
                    )])),
            ],
            ..SolutionSource::default()
        };

        let engine = Reconciler::new(
            &env,
            &env,
            &env,
            &NoopEventSink,
            JobWaiter::with_sleeper(WaitPolicy::from_secs(1, 4, 600), InstantSleeper),
        );
        engine
            .deploy(&source, &DeploymentPlan::new("Contoso"), &ReconcileOptions::new("Contoso"))
            .unwrap();

        let ws = env.find_workspace("Tenant-Contoso").unwrap().unwrap();
        let artifacts = env.list_artifacts(&ws.id).unwrap();
        let model_id = artifacts
            .iter()
            .find(|a| a.artifact_type == ArtifactType::SemanticModel)
            .unwrap()
            .id
            .clone();
        let report = artifacts
            .iter()
            .find(|a| a.artifact_type == ArtifactType::Report)
            .unwrap();

        let body = report.definition.part("definition.pbir").unwrap().text().unwrap();
        assert!(body.contains(&model_id));
        assert!(!body.contains("model-src"));
    }
}
