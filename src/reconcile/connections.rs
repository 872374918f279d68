//! Connection reconciliation
//!
//! Connections go first: everything downstream rewrites through the
//! redirects seeded here. Target connections are always environment-
//! local creations, named `<source name>-<customer>`; an existing
//! target connection with that name is reused rather than recreated.
//! Unrecognized connection kinds abort the run, since silently carrying
//! a source-environment connection forward would leak credentials and
//! paths across environments.

use crate::error::{CaravanError, CaravanResult};
use crate::events::DeployEvent;
use crate::jobs::Sleeper;
use crate::models::{Connection, ConnectionKind};
use crate::plan::DeploymentPlan;
use crate::reconcile::{Reconciler, RunContext};
use crate::redirect::RedirectCategory;

impl<'a, S: Sleeper> Reconciler<'a, S> {
    pub(crate) fn reconcile_connections(&self, ctx: &mut RunContext) -> CaravanResult<()> {
        self.events.on_event(DeployEvent::CategoryStarted {
            category: "connections".to_string(),
        });

        let existing = self.connections.list_connections()?;
        let mut sources: Vec<&Connection> = ctx.source.connections.iter().collect();
        sources.sort_by(|a, b| a.display_name.cmp(&b.display_name));

        for source_conn in sources {
            let target_name =
                format!("{}-{}", source_conn.display_name, ctx.options.customer_name);
            let target_path = self.target_connection_path(ctx, source_conn)?;

            let target = match existing.iter().find(|c| c.display_name == target_name) {
                Some(found) => {
                    self.skip_artifact(ctx, target_name.clone(), "connection already exists");
                    found.clone()
                }
                None => {
                    let created = self.connections.create_connection(
                        &target_name,
                        &source_conn.kind,
                        &target_path,
                    )?;
                    ctx.created += 1;
                    self.events.on_event(DeployEvent::ArtifactCreated {
                        item: target_name.clone(),
                    });
                    created
                }
            };

            ctx.maps.record(
                RedirectCategory::Connection,
                source_conn.id.clone(),
                target.id.clone(),
            )?;
            if source_conn.path != target.path {
                ctx.maps.record(
                    RedirectCategory::Connection,
                    source_conn.path.clone(),
                    target.path.clone(),
                )?;
            }
        }

        // later categories rewrite with their own map plus everything
        // the connections seeded
        ctx.maps
            .merge(RedirectCategory::Connection, RedirectCategory::ComputeUnit)?;
        ctx.maps.merge(
            RedirectCategory::Connection,
            RedirectCategory::SemanticModel,
        )?;
        Ok(())
    }

    /// Datasource path the target connection should point at, with the
    /// matching parameter redirects recorded as a side effect.
    fn target_connection_path(
        &self,
        ctx: &mut RunContext,
        conn: &Connection,
    ) -> CaravanResult<String> {
        match &conn.kind {
            ConnectionKind::Web => {
                if !ctx.plan.has_parameter(DeploymentPlan::WEB_PATH) {
                    return Ok(conn.path.clone());
                }
                let web = ctx.plan.parameter(DeploymentPlan::WEB_PATH)?;
                if web.source_value != web.deployment_value {
                    ctx.maps.record(
                        RedirectCategory::Connection,
                        web.source_value.clone(),
                        web.deployment_value.clone(),
                    )?;
                }
                Ok(conn
                    .path
                    .replace(&web.source_value, &web.deployment_value))
            }
            ConnectionKind::DataLake => {
                if !ctx.plan.has_storage_parameters() {
                    return Ok(conn.path.clone());
                }
                let server = ctx.plan.parameter(DeploymentPlan::STORAGE_SERVER)?.clone();
                let container = ctx
                    .plan
                    .parameter(DeploymentPlan::STORAGE_CONTAINER)?
                    .clone();
                let container_path = ctx
                    .plan
                    .parameter(DeploymentPlan::STORAGE_CONTAINER_PATH)?
                    .clone();

                for fragment in [&server, &container, &container_path] {
                    if fragment.source_value != fragment.deployment_value {
                        ctx.maps.record(
                            RedirectCategory::Connection,
                            fragment.source_value.clone(),
                            fragment.deployment_value.clone(),
                        )?;
                    }
                }

                Ok(format!(
                    "{}/{}{}",
                    server.deployment_value,
                    container.deployment_value,
                    container_path.deployment_value
                ))
            }
            ConnectionKind::Other(kind) => Err(CaravanError::UnsupportedConnectionKind {
                kind: kind.clone(),
                name: conn.display_name.clone(),
            }),
        }
    }
}
