//! Best-module selection and metric extraction.

use crate::trial::{MetricValue, ModuleResult, NodeRef};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

/// Columns every module-result table carries that are not evaluation scores.
///
/// This is the schema contract with the evaluator; metric vectors are
/// whatever remains after removing these.
pub const BOOKKEEPING_COLUMNS: [&str; 6] = [
    "filename",
    "module_name",
    "module_params",
    "execution_time",
    "average_output_token",
    "is_best",
];

/// Whether a column name is one of [`BOOKKEEPING_COLUMNS`].
pub fn is_bookkeeping(column: &str) -> bool {
    BOOKKEEPING_COLUMNS.contains(&column)
}

/// Named evaluation scores of one module row, in table order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricVector {
    entries: Vec<(String, MetricValue)>,
}

impl MetricVector {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&MetricValue> {
        self.entries
            .iter()
            .find(|(metric, _)| metric == name)
            .map(|(_, value)| value)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &MetricValue)> {
        self.entries.iter().map(|(name, value)| (name.as_str(), value))
    }
}

/// Every non-bookkeeping column of `row`.
pub fn metric_vector(row: &ModuleResult) -> MetricVector {
    MetricVector {
        entries: row
            .columns()
            .iter()
            .filter(|(name, _)| !is_bookkeeping(name))
            .cloned()
            .collect(),
    }
}

/// A suspicious but usable condition in a node table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Anomaly {
    /// More than one row carries the best flag; `rows` are their table positions.
    MultipleBest { rows: Vec<usize> },
}

impl fmt::Display for Anomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Anomaly::MultipleBest { rows } => write!(
                f,
                "{} rows flagged as best (positions {:?}); using the first",
                rows.len(),
                rows
            ),
        }
    }
}

/// Inspect a node table for data-quality anomalies.
pub fn detect_anomalies(rows: &[ModuleResult]) -> Vec<Anomaly> {
    let flagged: Vec<usize> = rows
        .iter()
        .enumerate()
        .filter(|(_, row)| row.is_best)
        .map(|(idx, _)| idx)
        .collect();

    if flagged.len() > 1 {
        vec![Anomaly::MultipleBest { rows: flagged }]
    } else {
        Vec::new()
    }
}

/// Rule deciding which module of a node is "best".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum BestModuleSelector {
    /// Trust the evaluator's `is_best` flag.
    #[default]
    Flagged,
    /// Highest numeric value of the named metric.
    HighestMetric(String),
    /// Lowest numeric value of the named metric.
    LowestMetric(String),
}

impl BestModuleSelector {
    /// Pick the best row. Ties and duplicate flags resolve to table order.
    pub fn select<'a>(&self, rows: &'a [ModuleResult]) -> Option<&'a ModuleResult> {
        self.select_for(None, rows)
    }

    /// Like [`select`](Self::select), naming the node in anomaly warnings.
    pub fn select_for<'a>(
        &self,
        node: Option<&NodeRef>,
        rows: &'a [ModuleResult],
    ) -> Option<&'a ModuleResult> {
        match self {
            BestModuleSelector::Flagged => {
                for anomaly in detect_anomalies(rows) {
                    match node {
                        Some(node) => warn!(node = %node, %anomaly, "Node table anomaly"),
                        None => warn!(%anomaly, "Node table anomaly"),
                    }
                }
                rows.iter().find(|row| row.is_best)
            }
            BestModuleSelector::HighestMetric(metric) => {
                best_by(rows, metric, |candidate, current| candidate > current)
            }
            BestModuleSelector::LowestMetric(metric) => {
                best_by(rows, metric, |candidate, current| candidate < current)
            }
        }
    }

    pub fn describe(&self) -> String {
        match self {
            BestModuleSelector::Flagged => "flagged by evaluator".to_string(),
            BestModuleSelector::HighestMetric(metric) => format!("highest {}", metric),
            BestModuleSelector::LowestMetric(metric) => format!("lowest {}", metric),
        }
    }
}

fn best_by<'a>(
    rows: &'a [ModuleResult],
    metric: &str,
    better: impl Fn(f64, f64) -> bool,
) -> Option<&'a ModuleResult> {
    let mut best: Option<(&ModuleResult, f64)> = None;
    for row in rows {
        let Some(value) = row
            .column(metric)
            .and_then(MetricValue::as_f64)
            .filter(|v| !v.is_nan())
        else {
            continue;
        };
        match best {
            Some((_, current)) if !better(value, current) => {}
            _ => best = Some((row, value)),
        }
    }
    best.map(|(row, _)| row)
}
