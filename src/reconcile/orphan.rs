//! Orphan pruning
//!
//! Deletes target artifacts whose `(display_name, type)` identity has
//! no counterpart in the source. Two exclusions: query endpoints,
//! which the remote owns outright, and default semantic models named
//! after a surviving storage container, which exist in the target
//! precisely because the source container does. Deletion is
//! best-effort; a failed delete is reported and the run moves on.

use std::collections::BTreeSet;

use crate::error::CaravanResult;
use crate::events::DeployEvent;
use crate::jobs::Sleeper;
use crate::models::ArtifactType;
use crate::reconcile::{Reconciler, RunContext};

impl<'a, S: Sleeper> Reconciler<'a, S> {
    pub(crate) fn prune_orphans(&self, ctx: &mut RunContext) -> CaravanResult<()> {
        self.events.on_event(DeployEvent::CategoryStarted {
            category: "orphan pruning".to_string(),
        });

        let source_identities: BTreeSet<(String, ArtifactType)> = ctx
            .source
            .artifacts
            .iter()
            .map(|a| a.identity())
            .collect();

        // fresh listing: this run's creates must not look like orphans
        let targets = self.artifacts.list_artifacts(&ctx.workspace.id)?;

        for target in targets {
            if source_identities.contains(&target.identity()) {
                continue;
            }
            if target.artifact_type == ArtifactType::QueryEndpoint {
                continue;
            }
            if target.artifact_type == ArtifactType::SemanticModel
                && ctx.container_names.contains(&target.display_name)
            {
                continue;
            }

            match self.artifacts.delete_artifact(&ctx.workspace.id, &target.id) {
                Ok(()) => {
                    ctx.pruned += 1;
                    self.events.on_event(DeployEvent::OrphanDeleted {
                        item: target.item_name(),
                    });
                }
                Err(err) => {
                    self.events.on_event(DeployEvent::OrphanDeleteFailed {
                        item: target.item_name(),
                        error: err.to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::events::NoopEventSink;
    use crate::jobs::{InstantSleeper, JobWaiter, WaitPolicy};
    use crate::models::{ArtifactDescriptor, ArtifactType, DefinitionBundle};
    use crate::package::SolutionSource;
    use crate::plan::DeploymentPlan;
    use crate::reconcile::{ReconcileOptions, ReconcileResult, Reconciler};
    use crate::remote::{ArtifactRepository, InMemoryEnvironment};

    fn deploy_with_prune(env: &InMemoryEnvironment, source: &SolutionSource) -> ReconcileResult {
        let engine = Reconciler::new(
            env,
            env,
            env,
            &NoopEventSink,
            JobWaiter::with_sleeper(WaitPolicy::from_secs(1, 4, 600), InstantSleeper),
        );
        let options = ReconcileOptions::new("Contoso").with_prune(true);
        engine
            .deploy(source, &DeploymentPlan::new("Contoso"), &options)
            .unwrap()
    }

    #[test]
    fn orphan_is_deleted_and_endpoints_survive() {
        let env = InMemoryEnvironment::new();
        let ws = env.seed_workspace("Tenant-Contoso", "");
        env.seed_artifact(
            &ws.id,
            "stale",
            ArtifactType::Report,
            DefinitionBundle::default(),
        );
        env.seed_artifact(
            &ws.id,
            "sales",
            ArtifactType::QueryEndpoint,
            DefinitionBundle::default(),
        );

        let source = SolutionSource::default();
        let result = deploy_with_prune(&env, &source);

        assert_eq!(result.pruned, 1);
        let remaining = env.list_artifacts(&ws.id).unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].artifact_type, ArtifactType::QueryEndpoint);
    }

    #[test]
    fn default_model_of_surviving_container_is_not_pruned() {
        let env = InMemoryEnvironment::new();
        let ws = env.seed_workspace("Tenant-Contoso", "");
        env.seed_artifact(
            &ws.id,
            "sales",
            ArtifactType::SemanticModel,
            DefinitionBundle::default(),
        );

        let source = SolutionSource {
            artifacts: vec![ArtifactDescriptor::new(
                "sales",
                ArtifactType::StorageContainer,
                "lake-src",
            )],
            ..SolutionSource::default()
        };
        let result = deploy_with_prune(&env, &source);

        assert_eq!(result.pruned, 0);
        let remaining = env.list_artifacts(&ws.id).unwrap();
        assert!(remaining
            .iter()
            .any(|a| a.artifact_type == ArtifactType::SemanticModel));
    }

    #[test]
    fn failed_delete_is_swallowed() {
        let env = InMemoryEnvironment::new();
        let ws = env.seed_workspace("Tenant-Contoso", "");
        let locked = env.seed_artifact(
            &ws.id,
            "locked",
            ArtifactType::Report,
            DefinitionBundle::default(),
        );
        env.seed_artifact(
            &ws.id,
            "stale",
            ArtifactType::Report,
            DefinitionBundle::default(),
        );
        env.fail_delete_of(&locked.id);

        let result = deploy_with_prune(&env, &SolutionSource::default());

        assert_eq!(result.pruned, 1);
        let remaining = env.list_artifacts(&ws.id).unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].display_name, "locked");
    }
}
