//! Packaged solution folders, read from disk and deployed end to end.

use std::fs;
use std::path::Path;

use caravan::{
    ArtifactRepository, ArtifactType, DeploymentPlan, InMemoryEnvironment, InstantSleeper,
    JobWaiter, NoopEventSink, ReconcileOptions, Reconciler, SolutionPackage, WaitPolicy,
};

fn write_item(root: &Path, name: &str, artifact_type: &str, parts: &[(&str, &str)]) {
    let dir = root.join(format!("{name}.{artifact_type}"));
    fs::create_dir_all(&dir).unwrap();
    let platform = serde_json::json!({
        "metadata": { "type": artifact_type, "displayName": name },
        "config": { "logicalId": format!("logical-{name}") },
    });
    fs::write(dir.join(".platform"), platform.to_string()).unwrap();
    for (path, body) in parts {
        let part = dir.join(path);
        fs::create_dir_all(part.parent().unwrap()).unwrap();
        fs::write(part, body).unwrap();
    }
}

fn write_sample_package(root: &Path) {
    write_item(
        root,
        "sales",
        "StorageContainer",
        &[],
    );
    write_item(
        root,
        "Create Tables",
        "Notebook",
        &[(
            "notebook-content.py",
            "container = \"lake-src\"\nsource = \"https://src/data/sales.csv\"\n",
        )],
    );
    write_item(
        root,
        "sales analysis",
        "SemanticModel",
        &[(
            "definition/expressions.tmdl",
            "let Server = \"sql-src.example.net\"\nlet Database = \"db-src\"",
        )],
    );
    write_item(
        root,
        "sales report",
        "Report",
        &[(
            "definition.pbir",
            r#"{"datasetReference": {"byConnection": "model-src"}}"#,
        )],
    );

    let manifest = serde_json::json!({
        "sourceWorkspaceId": "ws-src",
        "sourceWorkspaceDescription": "Sales solution",
        "sourceItems": [
            { "id": "lake-src", "displayName": "sales", "type": "StorageContainer" },
            { "id": "nb-src", "displayName": "Create Tables", "type": "Notebook" },
            { "id": "model-src", "displayName": "sales analysis", "type": "SemanticModel" },
            { "id": "rep-src", "displayName": "sales report", "type": "Report" }
        ],
        "sourceContainers": [{
            "id": "lake-src",
            "displayName": "sales",
            "server": "sql-src.example.net",
            "database": "db-src",
            "shortcuts": []
        }],
        "sourceConnections": [{
            "id": "conn-web",
            "displayName": "Web",
            "kind": "Web",
            "path": "https://src/data/"
        }],
    });
    fs::write(
        root.join("deploy.config.json"),
        serde_json::to_string_pretty(&manifest).unwrap(),
    )
    .unwrap();
}

#[test]
fn loading_is_deterministic_and_complete() {
    let dir = tempfile::tempdir().unwrap();
    write_sample_package(dir.path());

    let first = SolutionPackage::load(dir.path()).unwrap();
    let second = SolutionPackage::load(dir.path()).unwrap();

    let names: Vec<_> = first
        .items
        .iter()
        .map(|i| (i.display_name.clone(), i.artifact_type))
        .collect();
    let names_again: Vec<_> = second
        .items
        .iter()
        .map(|i| (i.display_name.clone(), i.artifact_type))
        .collect();
    assert_eq!(names, names_again);
    assert_eq!(first.items.len(), 4);
    assert_eq!(first.manifest.source_items.len(), 4);
}

#[test]
fn a_package_deploys_like_a_live_source() {
    let dir = tempfile::tempdir().unwrap();
    write_sample_package(dir.path());
    let source = SolutionPackage::load(dir.path()).unwrap().into_source();

    let mut plan = DeploymentPlan::new("Contoso");
    plan.add_parameter(
        DeploymentPlan::WEB_PATH,
        "https://src/data/",
        "https://dst/data/",
    )
    .unwrap();

    let env = InMemoryEnvironment::new();
    let engine = Reconciler::new(
        &env,
        &env,
        &env,
        &NoopEventSink,
        JobWaiter::with_sleeper(WaitPolicy::from_secs(1, 4, 600), InstantSleeper),
    );
    let result = engine
        .deploy(&source, &plan, &ReconcileOptions::new("Contoso"))
        .unwrap();

    // connection + container + notebook + model + report
    assert_eq!(result.created, 5);

    let ws = env.find_workspace("Tenant-Contoso").unwrap().unwrap();
    assert_eq!(ws.description, "Sales solution");
    let artifacts = env.list_artifacts(&ws.id).unwrap();

    let notebook = artifacts
        .iter()
        .find(|a| a.artifact_type == ArtifactType::Notebook)
        .unwrap();
    let body = notebook
        .definition
        .part("notebook-content.py")
        .unwrap()
        .text()
        .unwrap();
    assert!(body.contains("https://dst/data/sales.csv"));
    assert!(!body.contains("lake-src"));

    let model_id = &artifacts
        .iter()
        .find(|a| a.artifact_type == ArtifactType::SemanticModel)
        .unwrap()
        .id;
    let report = artifacts
        .iter()
        .find(|a| a.artifact_type == ArtifactType::Report)
        .unwrap();
    let report_body = report.definition.part("definition.pbir").unwrap().text().unwrap();
    assert!(report_body.contains(model_id.as_str()));
    assert!(!report_body.contains("model-src"));
}
