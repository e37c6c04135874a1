//! In-memory model of one evaluation trial.
//!
//! A trial is produced once by the external evaluator and is read-only here.
//! Its layout on disk is:
//!
//! ```text
//! <root>/summary.csv                           node_line_name, node_type, ...
//! <root>/<node_line_name>/<node_type>/summary.csv
//! <root>/<node_line_name>/<node_type>/<filename>   per-module detail artifacts
//! ```

use crate::error::{EvalError, Result};
use crate::params::ModuleParams;
use crate::selector::{MetricVector, metric_vector};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// File name of every summary table in a trial.
pub const SUMMARY_FILENAME: &str = "summary.csv";

/// Extension of the per-module detail artifacts.
pub const DETAIL_EXTENSION: &str = "parquet";

/// One stage of the evaluated pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeRef {
    pub line_name: String,
    pub node_type: String,
}

impl NodeRef {
    pub fn new(line_name: impl Into<String>, node_type: impl Into<String>) -> Self {
        Self {
            line_name: line_name.into(),
            node_type: node_type.into(),
        }
    }

    /// Storage sub-path of this node under a trial root.
    pub fn dir_in(&self, trial_root: &Path) -> PathBuf {
        trial_root.join(&self.line_name).join(&self.node_type)
    }
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.line_name, self.node_type)
    }
}

/// A single cell value of a module-result row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MetricValue {
    Number(f64),
    Bool(bool),
    Text(String),
    Missing,
}

impl MetricValue {
    /// Interpret a raw CSV cell.
    pub fn parse(cell: &str) -> Self {
        let trimmed = cell.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("nan") {
            return MetricValue::Missing;
        }
        if let Some(flag) = parse_bool(trimmed) {
            return MetricValue::Bool(flag);
        }
        match trimmed.parse::<f64>() {
            Ok(number) => MetricValue::Number(number),
            Err(_) => MetricValue::Text(trimmed.to_string()),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetricValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            MetricValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

/// Accepts the spellings dataframe tooling uses for booleans.
pub(crate) fn parse_bool(cell: &str) -> Option<bool> {
    match cell.trim() {
        "True" | "true" | "TRUE" => Some(true),
        "False" | "false" | "FALSE" => Some(false),
        _ => None,
    }
}

/// One evaluated configuration of one node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleResult {
    /// Detail artifact for this row, relative to the node directory.
    pub filename: String,
    pub module_name: String,
    pub module_params: ModuleParams,
    pub execution_time: Option<f64>,
    /// Set by the evaluator on the module it selected for this node.
    pub is_best: bool,
    /// Every column of the row in table order, bookkeeping included.
    columns: Vec<(String, MetricValue)>,
}

impl ModuleResult {
    /// Assemble a row from its full column set.
    ///
    /// Typed fields are taken from the matching columns; `columns` keeps all of them.
    pub fn from_columns(columns: Vec<(String, String)>) -> Self {
        let find = |name: &str| {
            columns
                .iter()
                .find(|(column, _)| column == name)
                .map(|(_, value)| value.as_str())
                .unwrap_or_default()
        };

        let filename = find("filename").to_string();
        let module_name = find("module_name").to_string();
        let module_params = ModuleParams::parse(find("module_params"));
        let execution_time = MetricValue::parse(find("execution_time")).as_f64();
        let is_best = parse_bool(find("is_best")).unwrap_or(false);

        let columns = columns
            .into_iter()
            .map(|(name, value)| {
                let parsed = MetricValue::parse(&value);
                (name, parsed)
            })
            .collect();

        Self {
            filename,
            module_name,
            module_params,
            execution_time,
            is_best,
            columns,
        }
    }

    /// All columns in table order.
    pub fn columns(&self) -> &[(String, MetricValue)] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&MetricValue> {
        self.columns
            .iter()
            .find(|(column, _)| column == name)
            .map(|(_, value)| value)
    }

    /// Evaluation scores of this row.
    pub fn metric_vector(&self) -> MetricVector {
        metric_vector(self)
    }
}

/// Results of one node: its module rows, or nothing if the evaluator skipped it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeResults {
    pub node: NodeRef,
    pub rows: Vec<ModuleResult>,
    /// Whether the node's own summary table was present.
    pub has_table: bool,
}

/// One evaluation trial loaded from disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trial {
    root: PathBuf,
    nodes: Vec<NodeResults>,
}

impl Trial {
    pub(crate) fn new(root: PathBuf, nodes: Vec<NodeResults>) -> Self {
        Self { root, nodes }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Nodes in the order of the top-level summary.
    pub fn list_nodes(&self) -> impl Iterator<Item = &NodeRef> {
        self.nodes.iter().map(|n| &n.node)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn nodes(&self) -> &[NodeResults] {
        &self.nodes
    }

    pub fn contains(&self, node: &NodeRef) -> bool {
        self.results(node).is_some()
    }

    pub fn results(&self, node: &NodeRef) -> Option<&NodeResults> {
        self.nodes.iter().find(|n| &n.node == node)
    }

    /// Module rows of a node; empty when the node is unknown or was skipped.
    pub fn node_table(&self, node: &NodeRef) -> &[ModuleResult] {
        self.results(node).map(|n| n.rows.as_slice()).unwrap_or(&[])
    }

    /// First node with the given type, regardless of line.
    pub fn find_node_type(&self, node_type: &str) -> Option<&NodeRef> {
        self.list_nodes().find(|n| n.node_type == node_type)
    }

    pub fn node_dir(&self, node: &NodeRef) -> PathBuf {
        node.dir_in(&self.root)
    }

    /// Resolve a row's `filename` to its detail artifact path.
    pub fn artifact_path(&self, node: &NodeRef, row: &ModuleResult) -> PathBuf {
        self.node_dir(node).join(&row.filename)
    }

    /// Detail artifacts stored next to a node's summary table, sorted by name.
    pub fn detail_artifacts(&self, node: &NodeRef) -> Result<Vec<PathBuf>> {
        let dir = self.node_dir(node);
        if !dir.is_dir() {
            return Err(EvalError::NotFound(dir));
        }

        let mut artifacts = Vec::new();
        for entry in fs::read_dir(&dir).map_err(|e| EvalError::io(&dir, e))? {
            let path = entry.map_err(|e| EvalError::io(&dir, e))?.path();
            if path.is_file() && path.extension().and_then(|e| e.to_str()) == Some(DETAIL_EXTENSION)
            {
                artifacts.push(path);
            }
        }
        artifacts.sort();
        Ok(artifacts)
    }
}
