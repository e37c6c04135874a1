//! Markdown reports over loaded trials.
//!
//! Rendering never fails: a trial that could not be loaded shows up as
//! unavailable next to whatever did load.

use crate::cache::TrialCache;
use crate::comparator::{NodeSide, compare};
use crate::error::{EvalError, Result};
use crate::selector::{BestModuleSelector, MetricVector};
use crate::store::load_trial;
use crate::testcase::TestCaseBook;
use crate::trial::{MetricValue, ModuleResult, Trial};
use std::path::Path;
use tracing::warn;

/// Metrics shown per test case on the scoreboard.
pub const HEADLINE_METRICS: [&str; 4] = [
    "retrieval_f1",
    "retrieval_recall",
    "retrieval_precision",
    "rouge",
];

/// Node type whose best execution time is reported.
pub const GENERATOR_NODE_TYPE: &str = "generator";

const DESCRIPTION_WIDTH: usize = 30;
const PARAMS_HEADING_LEVEL: usize = 4;

pub fn render_metric_value(value: &MetricValue) -> String {
    match value {
        MetricValue::Number(n) => format!("{:.4}", n),
        MetricValue::Bool(b) => b.to_string(),
        MetricValue::Text(text) => text.clone(),
        MetricValue::Missing => "-".to_string(),
    }
}

/// Two-column metric table, or `_no metrics_`.
pub fn render_metric_table(metrics: &MetricVector) -> String {
    if metrics.is_empty() {
        return "_no metrics_\n".to_string();
    }

    let mut out = String::from("| metric_name | metric_value |\n| --- | --- |\n");
    for (name, value) in metrics.iter() {
        out.push_str(&format!("| {} | {} |\n", name, render_metric_value(value)));
    }
    out
}

fn render_module(best: &ModuleResult) -> String {
    let mut out = String::new();
    out.push_str(&format!("**Module**: `{}`\n\n", best.module_name));
    out.push_str("**Params**\n\n");
    out.push_str(&best.module_params.to_markdown(PARAMS_HEADING_LEVEL));
    out.push('\n');
    out.push_str(&render_metric_table(&best.metric_vector()));
    out
}

/// Best module of every node that has one.
pub fn render_trial_summary(trial: &Trial, selector: &BestModuleSelector) -> String {
    let mut out = String::from("## Trial Result Summary\n\n");
    out.push_str(&format!("Trial directory: `{}`\n\n", trial.root().display()));

    for results in trial.nodes() {
        let Some(best) = selector.select_for(Some(&results.node), &results.rows) else {
            continue;
        };
        out.push_str(&format!("### {} best module\n\n", results.node.node_type));
        out.push_str(&render_module(best));
        out.push('\n');
    }
    out
}

/// One side of a comparison: a label and whatever loading produced.
#[derive(Debug)]
pub struct TrialSlot {
    pub label: String,
    pub trial: Result<Trial>,
}

impl TrialSlot {
    pub fn new(label: impl Into<String>, trial: Result<Trial>) -> Self {
        Self {
            label: label.into(),
            trial,
        }
    }

    /// Load the trial at `root`, keeping any error for display.
    pub fn load(label: impl Into<String>, root: &Path) -> Self {
        Self::new(label, load_trial(root))
    }
}

enum SideView<'a> {
    Present(Option<&'a ModuleResult>),
    Absent,
    Unavailable(&'a EvalError),
}

impl<'a> From<Option<NodeSide<'a>>> for SideView<'a> {
    fn from(side: Option<NodeSide<'a>>) -> Self {
        match side {
            Some(side) => SideView::Present(side.best),
            None => SideView::Absent,
        }
    }
}

fn render_side(out: &mut String, label: &str, side: SideView<'_>) {
    out.push_str(&format!("#### {}\n\n", label));
    match side {
        SideView::Present(Some(best)) => out.push_str(&render_module(best)),
        SideView::Present(None) => out.push_str("_no best module_\n"),
        SideView::Absent => out.push_str("_not present_\n"),
        SideView::Unavailable(err) => {
            out.push_str(&format!("_unavailable: {}_\n", err));
        }
    }
    out.push('\n');
}

/// Node-by-node comparison of two trials, rendered even when one side failed to load.
pub fn render_comparison(
    left: &TrialSlot,
    right: &TrialSlot,
    selector: &BestModuleSelector,
) -> String {
    let mut out = String::new();
    out.push_str(&format!("## Trial Comparison: {} vs {}\n\n", left.label, right.label));
    out.push_str(&format!("Best module: {}\n\n", selector.describe()));

    match (&left.trial, &right.trial) {
        (Ok(a), Ok(b)) => {
            for comparison in compare(a, b, selector) {
                out.push_str(&format!("### {}\n\n", comparison.node));
                render_side(&mut out, &left.label, comparison.a.into());
                render_side(&mut out, &right.label, comparison.b.into());
            }
        }
        (Ok(a), Err(err)) => {
            warn!(side = %right.label, error = %err, "Comparing against an unavailable trial");
            for results in a.nodes() {
                let best = selector.select_for(Some(&results.node), &results.rows);
                out.push_str(&format!("### {}\n\n", results.node));
                render_side(&mut out, &left.label, SideView::Present(best));
                render_side(&mut out, &right.label, SideView::Unavailable(err));
            }
        }
        (Err(err), Ok(b)) => {
            warn!(side = %left.label, error = %err, "Comparing against an unavailable trial");
            for results in b.nodes() {
                let best = selector.select_for(Some(&results.node), &results.rows);
                out.push_str(&format!("### {}\n\n", results.node));
                render_side(&mut out, &left.label, SideView::Unavailable(err));
                render_side(&mut out, &right.label, SideView::Present(best));
            }
        }
        (Err(left_err), Err(right_err)) => {
            render_side(&mut out, &left.label, SideView::Unavailable(left_err));
            render_side(&mut out, &right.label, SideView::Unavailable(right_err));
        }
    }
    out
}

/// One test case's headline numbers.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreRow {
    pub name: String,
    pub description: String,
    /// Aligned with [`HEADLINE_METRICS`].
    pub metrics: Vec<Option<f64>>,
    pub exec_time: Option<f64>,
}

impl ScoreRow {
    /// Take each headline metric from the first node whose best module reports it.
    pub fn from_trial(
        name: &str,
        description: &str,
        trial: &Trial,
        selector: &BestModuleSelector,
    ) -> Self {
        let best_vectors: Vec<MetricVector> = trial
            .nodes()
            .iter()
            .filter_map(|results| selector.select(&results.rows))
            .map(ModuleResult::metric_vector)
            .collect();

        let metrics = HEADLINE_METRICS
            .iter()
            .map(|metric| {
                best_vectors
                    .iter()
                    .find_map(|vector| vector.get(metric).and_then(MetricValue::as_f64))
            })
            .collect();

        let exec_time = trial
            .find_node_type(GENERATOR_NODE_TYPE)
            .and_then(|node| selector.select(trial.node_table(node)))
            .and_then(|best| best.execution_time);

        Self {
            name: name.to_string(),
            description: truncate(description, DESCRIPTION_WIDTH),
            metrics,
            exec_time,
        }
    }

    pub fn metric(&self, name: &str) -> Option<f64> {
        HEADLINE_METRICS
            .iter()
            .position(|m| *m == name)
            .and_then(|i| self.metrics.get(i).copied().flatten())
    }
}

fn truncate(text: &str, width: usize) -> String {
    text.chars().take(width).collect()
}

/// Headline metrics across every test case that has results.
#[derive(Debug, Clone, Default)]
pub struct Scoreboard {
    rows: Vec<ScoreRow>,
}

impl Scoreboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect rows for every case with results. Cases whose trial fails to load are skipped.
    pub fn from_book(
        book: &TestCaseBook,
        cache: &mut TrialCache,
        selector: &BestModuleSelector,
    ) -> Self {
        let mut board = Self::new();
        for case in book.list() {
            let Some(root) = case.latest_trial() else {
                continue;
            };
            match cache.get_or_load(&case.name, &root) {
                Ok(trial) => board.push(ScoreRow::from_trial(
                    &case.name,
                    &case.description,
                    &trial,
                    selector,
                )),
                Err(err) => {
                    warn!(test_case = %case.name, error = %err, "Skipping test case on scoreboard");
                }
            }
        }
        board
    }

    pub fn push(&mut self, row: ScoreRow) {
        self.rows.push(row);
    }

    pub fn rows(&self) -> &[ScoreRow] {
        &self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn render(&self) -> String {
        if self.rows.is_empty() {
            return "_No test cases have been run yet._\n".to_string();
        }

        let mut out = String::from("| test_case | description |");
        for metric in HEADLINE_METRICS {
            out.push_str(&format!(" {} |", metric));
        }
        out.push_str(" exec_time |\n|");
        for _ in 0..HEADLINE_METRICS.len() + 3 {
            out.push_str(" --- |");
        }
        out.push('\n');

        for row in &self.rows {
            out.push_str(&format!(
                "| {} | {} |",
                escape_cell(&row.name),
                escape_cell(&row.description)
            ));
            for value in &row.metrics {
                match value {
                    Some(v) => out.push_str(&format!(" {:.3} |", v)),
                    None => out.push_str(" - |"),
                }
            }
            match row.exec_time {
                Some(t) => out.push_str(&format!(" {:.2}s |\n", t)),
                None => out.push_str(" - |\n"),
            }
        }
        out
    }
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|")
}
