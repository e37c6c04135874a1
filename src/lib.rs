//! RAG Trial Inspector - trial-result aggregation and vector-store collection
//! lifecycle for RAG evaluation runs.
//!
//! An external evaluator writes one trial per run: a top-level summary of
//! pipeline nodes and, per node, a table of evaluated module configurations.
//! This library loads those trials, selects the best module of each node,
//! compares trials side by side, and keeps the vector-store collection of a
//! test case consistent with the corpus it was last indexed from.
//!
//! # Quick Start
//!
//! ```no_run
//! use rag_trial_inspector::{
//!     config::Config,
//!     report::render_trial_summary,
//!     selector::BestModuleSelector,
//!     store::load_trial,
//!     testcase::TestCaseBook,
//!     runner::RunOrchestrator,
//!     vector_store::HttpConnector,
//! };
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load()?;
//!     config.validate()?;
//!
//!     // Evict the stale collection, run the evaluator, load the new trial
//!     let book = TestCaseBook::load(Path::new("scripts/test-config.yaml"))?;
//!     let orchestrator = RunOrchestrator::new(config, HttpConnector);
//!     let report = orchestrator.run(book.get("인사규정")?).await?;
//!
//!     // Summarize the best module of every node
//!     println!("{}", render_trial_summary(&report.trial, &BestModuleSelector::Flagged));
//!
//!     // Earlier trials can be read directly
//!     let trial = load_trial(Path::new("results/insa/trial/0"))?;
//!     println!("{} nodes", trial.node_count());
//!
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - **Trial**: Nodes and their module-result rows, loaded by [`store`]
//! - **BestModuleSelector**: Picks the best row of a node table
//! - **compare**: Pairs two trials node by node
//! - **CollectionIdentity**: Collection name derived from a test case label
//! - **CollectionLifecycleManager**: Evicts stale collections before a run

pub mod cache;
pub mod comparator;
pub mod config;
pub mod error;
pub mod identity;
pub mod params;
pub mod pipeline;
pub mod report;
pub mod runner;
pub mod selector;
pub mod store;
mod table;
pub mod testcase;
pub mod trial;
pub mod vector_store;

// Re-export commonly used types
pub use cache::TrialCache;
pub use comparator::{NodeComparison, compare};
pub use config::{Backend, Config, VectorStoreConfig};
pub use error::{EvalError, Result};
pub use identity::CollectionIdentity;
pub use params::ModuleParams;
pub use runner::{RunOrchestrator, RunReport};
pub use selector::{BOOKKEEPING_COLUMNS, BestModuleSelector, MetricVector};
pub use store::{LoadMode, latest_trial, list_trials, load_trial};
pub use testcase::{TestCase, TestCaseBook};
pub use trial::{MetricValue, ModuleResult, NodeRef, Trial};
pub use vector_store::{CollectionLifecycleManager, EvictionState, HttpConnector};
