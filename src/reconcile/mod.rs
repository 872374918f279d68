//! Reconciliation engine
//!
//! Walks the artifact categories of a solution source in dependency
//! order and makes the target workspace match: connections first, then
//! storage containers, compute units, semantic models, reports, and
//! finally optional orphan pruning. Each category records the
//! source-to-target redirects the later categories rewrite with.

mod compute;
mod connections;
mod engine;
mod model;
mod orphan;
mod report;
mod storage;

pub use engine::{ReconcileOptions, ReconcileResult, Reconciler};
pub(crate) use engine::RunContext;
