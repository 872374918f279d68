//! End-to-end engine scenarios against the in-memory environment.

use std::sync::Mutex;

use caravan::{
    ArtifactDescriptor, ArtifactRepository, ArtifactType, Connection, ConnectionKind,
    DefinitionBundle, DefinitionPart, DeployEvent, DeployEventSink, DeploymentPlan,
    InMemoryEnvironment, InstantSleeper, JobWaiter, NoopEventSink, ReconcileOptions,
    ReconcileResult, Reconciler, Shortcut, SolutionSource, SourceContainer, WaitPolicy,
};

struct RecordingSink(Mutex<Vec<DeployEvent>>);

impl RecordingSink {
    fn new() -> Self {
        Self(Mutex::new(Vec::new()))
    }

    fn events(&self) -> Vec<DeployEvent> {
        self.0.lock().unwrap().clone()
    }
}

impl DeployEventSink for RecordingSink {
    fn on_event(&self, event: DeployEvent) {
        self.0.lock().unwrap().push(event);
    }
}

fn artifact(
    name: &str,
    artifact_type: ArtifactType,
    id: &str,
    part: Option<(&str, &str)>,
) -> ArtifactDescriptor {
    let descriptor = ArtifactDescriptor::new(name, artifact_type, id);
    match part {
        Some((path, body)) => descriptor.with_definition(DefinitionBundle::new(vec![
            DefinitionPart::new(path, body.as_bytes()),
        ])),
        None => descriptor,
    }
}

/// A small but complete solution: two connections, one container with
/// a shortcut, a table-building notebook, a pipeline invoking it, the
/// container's default model plus a real one, and a report.
fn sample_source() -> SolutionSource {
    SolutionSource {
        workspace_id: "ws-src".into(),
        description: "Sales solution".into(),
        artifacts: vec![
            artifact("sales", ArtifactType::StorageContainer, "lake-src", None),
            artifact(
                "Create Tables",
                ArtifactType::Notebook,
                "nb-src",
                Some((
                    "notebook-content.py",
                    "container = \"lake-src\"\nworkspace = \"ws-src\"\nsource = \"https://src/data/sales.csv\"\n",
                )),
            ),
            artifact(
                "Run ETL",
                ArtifactType::Pipeline,
                "pl-src",
                Some((
                    "pipeline-content.json",
                    r#"{"notebookId": "nb-src", "workspaceId": "ws-src"}"#,
                )),
            ),
            artifact(
                "sales",
                ArtifactType::SemanticModel,
                "model-default-src",
                Some(("definition/expressions.tmdl", "let Database = \"db-src\"")),
            ),
            artifact(
                "sales analysis",
                ArtifactType::SemanticModel,
                "model-src",
                Some((
                    "definition/expressions.tmdl",
                    "let Server = \"sql-src.example.net\"\nlet Database = \"db-src\"",
                )),
            ),
            artifact(
                "sales report",
                ArtifactType::Report,
                "rep-src",
                Some((
                    "definition.pbir",
                    r#"{"datasetReference": {"byConnection": "model-src"}}"#,
                )),
            ),
        ],
        containers: vec![SourceContainer {
            id: "lake-src".into(),
            display_name: "sales".into(),
            server: "sql-src.example.net".into(),
            database: "db-src".into(),
            shortcuts: vec![Shortcut {
                name: "sales-data".into(),
                path: "Files".into(),
                location: "https://src-store.example.net".into(),
                subpath: "/sampledata/sales".into(),
                connection_id: "conn-lake".into(),
            }],
        }],
        connections: vec![
            Connection {
                id: "conn-web".into(),
                display_name: "Web".into(),
                kind: ConnectionKind::Web,
                path: "https://src/data/".into(),
            },
            Connection {
                id: "conn-lake".into(),
                display_name: "DataLake".into(),
                kind: ConnectionKind::DataLake,
                path: "https://src-store.example.net/sampledata/sales".into(),
            },
        ],
    }
}

fn sample_plan() -> DeploymentPlan {
    let mut plan = DeploymentPlan::new("Contoso");
    plan.add_parameter(
        DeploymentPlan::WEB_PATH,
        "https://src/data/",
        "https://dst/data/",
    )
    .unwrap();
    plan.add_parameter(
        DeploymentPlan::STORAGE_SERVER,
        "https://src-store.example.net",
        "https://dst-store.example.net",
    )
    .unwrap();
    plan.add_parameter(DeploymentPlan::STORAGE_CONTAINER, "sampledata", "contoso")
        .unwrap();
    plan.add_parameter(DeploymentPlan::STORAGE_CONTAINER_PATH, "/sales", "/sales")
        .unwrap();
    plan
}

fn deploy_with(
    env: &InMemoryEnvironment,
    events: &dyn DeployEventSink,
    options: &ReconcileOptions,
) -> ReconcileResult {
    let engine = Reconciler::new(
        env,
        env,
        env,
        events,
        JobWaiter::with_sleeper(WaitPolicy::from_secs(1, 4, 600), InstantSleeper),
    );
    engine
        .deploy(&sample_source(), &sample_plan(), options)
        .unwrap()
}

fn deploy(env: &InMemoryEnvironment) -> ReconcileResult {
    deploy_with(env, &NoopEventSink, &ReconcileOptions::new("Contoso"))
}

#[test]
fn first_run_creates_everything_except_the_default_model() {
    let env = InMemoryEnvironment::new();
    let result = deploy(&env);

    // 2 connections + container + notebook + pipeline + model + report
    assert_eq!(result.created, 7);
    assert_eq!(result.updated, 0);
    assert_eq!(result.skipped, 1);

    let ws = env.find_workspace("Tenant-Contoso").unwrap().unwrap();
    let models: Vec<_> = env
        .list_artifacts(&ws.id)
        .unwrap()
        .into_iter()
        .filter(|a| a.artifact_type == ArtifactType::SemanticModel)
        .collect();
    assert_eq!(models.len(), 1);
    assert_eq!(models[0].display_name, "sales analysis");
}

#[test]
fn second_run_is_idempotent() {
    let env = InMemoryEnvironment::new();
    deploy(&env);

    let ws = env.find_workspace("Tenant-Contoso").unwrap().unwrap();
    let after_first = env.list_artifacts(&ws.id).unwrap().len();

    let result = deploy(&env);
    assert_eq!(result.created, 0);
    assert_eq!(env.list_artifacts(&ws.id).unwrap().len(), after_first);
    // only one workspace was ever created
    assert_eq!(env.operation_count("create_workspace"), 1);
    // the table-building job ran on the create path only
    assert_eq!(env.operation_count("submit_job"), 1);
}

#[test]
fn categories_run_in_dependency_order() {
    let env = InMemoryEnvironment::new();
    deploy(&env);

    let connection = env.first_operation_index("create_connection").unwrap();
    let container = env.first_operation_index("create_container").unwrap();
    let notebook = env
        .first_operation_index("create_artifact Create Tables.Notebook")
        .unwrap();
    let pipeline = env
        .first_operation_index("create_artifact Run ETL.Pipeline")
        .unwrap();
    let model = env
        .first_operation_index("create_artifact sales analysis.SemanticModel")
        .unwrap();
    let report = env
        .first_operation_index("create_artifact sales report.Report")
        .unwrap();

    assert!(connection < container);
    assert!(container < notebook);
    assert!(notebook < pipeline);
    assert!(pipeline < model);
    assert!(model < report);

    // the endpoint was probed (and its redirects recorded) before any
    // model was written
    let probe = env.first_operation_index("probe_endpoint").unwrap();
    assert!(probe < model);
}

#[test]
fn definitions_reference_only_target_identifiers() {
    let env = InMemoryEnvironment::new();
    deploy(&env);

    let ws = env.find_workspace("Tenant-Contoso").unwrap().unwrap();
    let artifacts = env.list_artifacts(&ws.id).unwrap();

    for source_id in ["lake-src", "ws-src", "nb-src", "model-src", "db-src"] {
        for target in &artifacts {
            for part in &target.definition.parts {
                let text = part.text().unwrap();
                assert!(
                    !text.contains(source_id),
                    "{} still references {source_id}",
                    target.item_name()
                );
            }
        }
    }
}

#[test]
fn web_parameter_rewrites_one_occurrence() {
    let env = InMemoryEnvironment::new();
    deploy(&env);

    let ws = env.find_workspace("Tenant-Contoso").unwrap().unwrap();
    let notebook = env
        .list_artifacts(&ws.id)
        .unwrap()
        .into_iter()
        .find(|a| a.artifact_type == ArtifactType::Notebook)
        .unwrap();
    let body = notebook
        .definition
        .part("notebook-content.py")
        .unwrap()
        .text()
        .unwrap()
        .to_string();

    assert_eq!(body.matches("https://dst/data/").count(), 1);
    assert!(!body.contains("https://src/data/"));
}

#[test]
fn shortcut_is_recreated_with_storage_parameters_applied() {
    let env = InMemoryEnvironment::new();
    deploy(&env);

    let ws = env.find_workspace("Tenant-Contoso").unwrap().unwrap();
    let container = env
        .list_artifacts(&ws.id)
        .unwrap()
        .into_iter()
        .find(|a| a.artifact_type == ArtifactType::StorageContainer)
        .unwrap();
    let shortcuts = env.shortcuts_in(&ws.id, &container.id);

    assert_eq!(shortcuts.len(), 1);
    assert_eq!(shortcuts[0].location, "https://dst-store.example.net");
    assert_eq!(shortcuts[0].subpath, "/contoso/sales");
    assert_ne!(shortcuts[0].connection_id, "conn-lake");
}

#[test]
fn prune_deletes_exactly_the_orphan_and_spares_endpoints() {
    let env = InMemoryEnvironment::new();
    let ws = env.seed_workspace("Tenant-Contoso", "Sales solution");
    env.seed_artifact(
        &ws.id,
        "left-behind",
        ArtifactType::Notebook,
        DefinitionBundle::default(),
    );

    let result = deploy_with(
        &env,
        &NoopEventSink,
        &ReconcileOptions::new("Contoso").with_prune(true),
    );

    assert_eq!(result.pruned, 1);
    let remaining = env.list_artifacts(&ws.id).unwrap();
    assert!(remaining.iter().all(|a| a.display_name != "left-behind"));
    assert!(remaining
        .iter()
        .any(|a| a.artifact_type == ArtifactType::QueryEndpoint));
}

#[test]
fn run_emits_started_first_and_completed_last() {
    let env = InMemoryEnvironment::new();
    let sink = RecordingSink::new();
    let result = deploy_with(&env, &sink, &ReconcileOptions::new("Contoso"));

    let events = sink.events();
    assert!(matches!(events.first(), Some(DeployEvent::Started { .. })));
    match events.last() {
        Some(DeployEvent::Completed {
            created,
            updated,
            skipped,
            pruned,
            job_failures,
        }) => {
            assert_eq!(*created, result.created);
            assert_eq!(*updated, result.updated);
            assert_eq!(*skipped, result.skipped);
            assert_eq!(*pruned, result.pruned);
            assert_eq!(*job_failures, result.job_failures);
        }
        other => panic!("expected Completed, got {other:?}"),
    }

    let created_events = events
        .iter()
        .filter(|e| matches!(e, DeployEvent::ArtifactCreated { .. }))
        .count();
    assert_eq!(created_events, result.created);
}

#[test]
fn type_filter_limits_mutation_to_one_category() {
    let env = InMemoryEnvironment::new();
    deploy(&env);

    let ws = env.find_workspace("Tenant-Contoso").unwrap().unwrap();
    let updates_before = env.operation_count("update_artifact");

    deploy_with(
        &env,
        &NoopEventSink,
        &ReconcileOptions::new("Contoso").with_only_type(Some(ArtifactType::Report)),
    );

    let report_updates = env.operation_count("update_artifact sales report.Report");
    let all_updates = env.operation_count("update_artifact") - updates_before;
    assert_eq!(report_updates, 1);
    assert_eq!(all_updates, 1);
    // container + endpoint + notebook + pipeline + model + report
    assert_eq!(env.list_artifacts(&ws.id).unwrap().len(), 6);
}
