//! Loading trials from the evaluator's on-disk layout.
//!
//! Loading is read-only and synchronous. A trial directory is written once
//! by the evaluator, so concurrent readers need no coordination.

use crate::error::{EvalError, Result};
use crate::table::Table;
use crate::trial::{ModuleResult, NodeRef, NodeResults, SUMMARY_FILENAME, Trial};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Columns required in the top-level trial summary.
pub const TRIAL_SUMMARY_COLUMNS: [&str; 2] = ["node_line_name", "node_type"];

/// Columns required in every node summary. `average_output_token` only
/// appears on generator nodes, so it is not required.
pub const NODE_SUMMARY_COLUMNS: [&str; 5] = [
    "filename",
    "module_name",
    "module_params",
    "execution_time",
    "is_best",
];

/// How to treat a summary row whose node directory does not exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadMode {
    /// Fail with `MalformedData`.
    #[default]
    Strict,
    /// Warn and keep the node with an empty table.
    Lenient,
}

/// Load a trial, failing on any structural problem.
pub fn load_trial(root: &Path) -> Result<Trial> {
    load_trial_with_mode(root, LoadMode::Strict)
}

/// Load a trial with an explicit [`LoadMode`].
pub fn load_trial_with_mode(root: &Path, mode: LoadMode) -> Result<Trial> {
    let nodes = read_node_list(root)?;

    let mut results = Vec::with_capacity(nodes.len());
    for node in nodes {
        let dir = node.dir_in(root);
        if !dir.is_dir() {
            match mode {
                LoadMode::Strict => {
                    return Err(EvalError::malformed(
                        root.join(SUMMARY_FILENAME),
                        format!("node {} has no result directory at {}", node, dir.display()),
                    ));
                }
                LoadMode::Lenient => {
                    warn!(node = %node, dir = %dir.display(), "Node result directory missing");
                    results.push(NodeResults {
                        node,
                        rows: Vec::new(),
                        has_table: false,
                    });
                    continue;
                }
            }
        }

        let (rows, has_table) = match read_node_table(&dir)? {
            Some(rows) => (rows, true),
            None => {
                debug!(node = %node, "Node summary absent; treating node as skipped");
                (Vec::new(), false)
            }
        };
        results.push(NodeResults {
            node,
            rows,
            has_table,
        });
    }

    Ok(Trial::new(root.to_path_buf(), results))
}

/// Read the ordered, de-duplicated node list from the top-level summary.
pub fn read_node_list(root: &Path) -> Result<Vec<NodeRef>> {
    let table = Table::read(&root.join(SUMMARY_FILENAME))?;
    table.require_columns(&TRIAL_SUMMARY_COLUMNS)?;

    let mut seen = HashSet::new();
    let mut nodes = Vec::with_capacity(table.len());
    for (idx, record) in table.records().enumerate() {
        let line_name = record.get("node_line_name").unwrap_or_default().trim();
        let node_type = record.get("node_type").unwrap_or_default().trim();
        if line_name.is_empty() || node_type.is_empty() {
            return Err(EvalError::malformed(
                table.path(),
                format!("row {} has an empty node_line_name or node_type", idx),
            ));
        }

        let node = NodeRef::new(line_name, node_type);
        if seen.insert(node.clone()) {
            nodes.push(node);
        } else {
            warn!(node = %node, row = idx, "Duplicate node in trial summary; keeping first");
        }
    }

    Ok(nodes)
}

/// Read one node's module rows. `None` when the node summary is absent.
pub fn read_node_table(node_dir: &Path) -> Result<Option<Vec<ModuleResult>>> {
    let table = match Table::read(&node_dir.join(SUMMARY_FILENAME)) {
        Ok(table) => table,
        Err(err) if err.is_not_found() => return Ok(None),
        Err(err) => return Err(err),
    };
    table.require_columns(&NODE_SUMMARY_COLUMNS)?;

    let mut rows = Vec::with_capacity(table.len());
    for (idx, record) in table.records().enumerate() {
        let flag = record.get("is_best").unwrap_or_default();
        if crate::trial::parse_bool(flag).is_none() {
            return Err(EvalError::malformed(
                table.path(),
                format!("row {} has a non-boolean is_best value '{}'", idx, flag),
            ));
        }

        let columns = record
            .cells()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect();
        rows.push(ModuleResult::from_columns(columns));
    }

    Ok(Some(rows))
}

/// Check if a trial summary exists under `root`.
pub fn trial_exists(root: &Path) -> bool {
    root.join(SUMMARY_FILENAME).is_file()
}

/// Numbered trial directories of an evaluator project, ascending.
pub fn list_trials(project_dir: &Path) -> Result<Vec<PathBuf>> {
    if !project_dir.is_dir() {
        return Err(EvalError::NotFound(project_dir.to_path_buf()));
    }

    let mut trials: Vec<(u64, PathBuf)> = WalkDir::new(project_dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_dir())
        .filter_map(|entry| {
            let index = entry.file_name().to_str()?.parse::<u64>().ok()?;
            Some((index, entry.into_path()))
        })
        .filter(|(_, path)| trial_exists(path))
        .collect();

    trials.sort_by_key(|(index, _)| *index);
    Ok(trials.into_iter().map(|(_, path)| path).collect())
}

/// The highest-numbered trial of an evaluator project.
pub fn latest_trial(project_dir: &Path) -> Result<PathBuf> {
    list_trials(project_dir)?
        .pop()
        .ok_or_else(|| EvalError::NotFound(project_dir.join("0").join(SUMMARY_FILENAME)))
}

#[cfg(test)]
pub(crate) mod fixtures {
    use std::fs;
    use std::path::Path;

    pub const NODE_HEADER: &str =
        "filename,module_name,module_params,execution_time,average_output_token,is_best";

    /// Write a trial summary listing `nodes` as (line, type).
    pub fn write_summary(root: &Path, nodes: &[(&str, &str)]) {
        fs::create_dir_all(root).unwrap();
        let mut content = String::from("node_line_name,node_type,best_module_name\n");
        for (line, node_type) in nodes {
            content.push_str(&format!("{},{},x\n", line, node_type));
        }
        fs::write(root.join("summary.csv"), content).unwrap();
    }

    /// Write a node summary with extra metric columns.
    pub fn write_node(root: &Path, line: &str, node_type: &str, metrics: &[&str], rows: &[&str]) {
        let dir = root.join(line).join(node_type);
        fs::create_dir_all(&dir).unwrap();
        let mut content = NODE_HEADER.to_string();
        for metric in metrics {
            content.push(',');
            content.push_str(metric);
        }
        content.push('\n');
        for row in rows {
            content.push_str(row);
            content.push('\n');
        }
        fs::write(dir.join("summary.csv"), content).unwrap();
    }

    /// A two-node trial with one best module per node.
    pub fn write_basic_trial(root: &Path) {
        write_summary(
            root,
            &[
                ("retrieve_node_line", "semantic_retrieval"),
                ("post_retrieve_node_line", "generator"),
            ],
        );
        write_node(
            root,
            "retrieve_node_line",
            "semantic_retrieval",
            &["retrieval_f1", "retrieval_recall"],
            &[
                "0.parquet,vectordb,\"{'top_k': 3, 'vectordb': 'qdrant'}\",0.05,,False,0.31,0.80",
                "1.parquet,vectordb,\"{'top_k': 5, 'vectordb': 'qdrant'}\",0.06,,True,0.42,0.95",
            ],
        );
        write_node(
            root,
            "post_retrieve_node_line",
            "generator",
            &["rouge"],
            &["0.parquet,openai_llm,\"{'temperature': 0.1}\",1.43,120,True,0.4"],
        );
    }
}
