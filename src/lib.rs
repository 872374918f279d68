//! Caravan - workspace solution deployment and reconciliation tool
//!
//! Caravan migrates a graph of named, typed content artifacts (storage
//! containers, notebooks, pipelines, semantic models, reports) between
//! environments, recreating connections, rewriting every embedded
//! cross-reference through category-scoped redirect maps, and
//! reconciling the target workspace against the source in dependency
//! order.

pub mod config;
pub mod error;
pub mod events;
pub mod export;
pub mod jobs;
pub mod models;
pub mod package;
pub mod plan;
pub mod reconcile;
pub mod redirect;
pub mod remote;
pub mod rewrite;

// Re-exports for convenience
pub use config::Config;
pub use error::{CaravanError, CaravanResult};
pub use events::{ConsoleEventSink, DeployEvent, DeployEventSink, JsonEventSink, NoopEventSink};
pub use export::export_workspace;
pub use jobs::{InstantSleeper, JobOutcome, JobWaiter, Sleeper, ThreadSleeper, WaitPolicy};
pub use models::{
    ArtifactDescriptor, ArtifactType, Connection, ConnectionKind, DefinitionBundle,
    DefinitionPart, JobHandle, JobKind, JobStatus, QueryEndpointInfo, Shortcut, Workspace,
};
pub use package::{DeployManifest, SolutionPackage, SolutionSource, SourceContainer};
pub use plan::{DeploymentParameter, DeploymentPlan};
pub use reconcile::{ReconcileOptions, ReconcileResult, Reconciler};
pub use redirect::{RedirectCategory, RedirectMaps};
pub use remote::{ArtifactRepository, ConnectionRepository, InMemoryEnvironment, JobRunner};
pub use rewrite::{apply_redirects, rewrite_part};
