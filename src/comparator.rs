//! Side-by-side comparison of two trials.

use crate::selector::BestModuleSelector;
use crate::trial::{ModuleResult, NodeRef, NodeResults, Trial};
use std::collections::HashSet;

/// What one trial has for a node.
#[derive(Debug, Clone, Copy)]
pub struct NodeSide<'a> {
    pub results: &'a NodeResults,
    pub best: Option<&'a ModuleResult>,
}

/// A node paired across two trials. `None` means the trial lacks the node.
#[derive(Debug, Clone, Copy)]
pub struct NodeComparison<'a> {
    pub node: &'a NodeRef,
    pub a: Option<NodeSide<'a>>,
    pub b: Option<NodeSide<'a>>,
}

impl<'a> NodeComparison<'a> {
    pub fn best_a(&self) -> Option<&'a ModuleResult> {
        self.a.and_then(|side| side.best)
    }

    pub fn best_b(&self) -> Option<&'a ModuleResult> {
        self.b.and_then(|side| side.best)
    }

    /// Whether both trials contain the node.
    pub fn is_shared(&self) -> bool {
        self.a.is_some() && self.b.is_some()
    }
}

/// Pair every node of the union of both trials.
///
/// Order follows `a`'s listing, then nodes only in `b` in `b`'s order.
pub fn compare<'a>(
    a: &'a Trial,
    b: &'a Trial,
    selector: &BestModuleSelector,
) -> Vec<NodeComparison<'a>> {
    let side = |results: &'a NodeResults| NodeSide {
        results,
        best: selector.select_for(Some(&results.node), &results.rows),
    };

    let mut seen: HashSet<&NodeRef> = HashSet::new();
    let mut comparisons = Vec::with_capacity(a.node_count() + b.node_count());

    for results in a.nodes() {
        seen.insert(&results.node);
        comparisons.push(NodeComparison {
            node: &results.node,
            a: Some(side(results)),
            b: b.results(&results.node).map(side),
        });
    }

    for results in b.nodes() {
        if seen.insert(&results.node) {
            comparisons.push(NodeComparison {
                node: &results.node,
                a: None,
                b: Some(side(results)),
            });
        }
    }

    comparisons
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::fixtures::*;
    use crate::store::load_trial;
    use tempfile::TempDir;

    #[test]
    fn test_union_and_order() {
        let dir_a = TempDir::new().unwrap();
        let dir_b = TempDir::new().unwrap();

        write_summary(dir_a.path(), &[("l", "retrieval"), ("l", "generator")]);
        write_node(dir_a.path(), "l", "retrieval", &["f1"], &["0.parquet,m1,{},0.1,,True,0.5"]);
        write_node(dir_a.path(), "l", "generator", &["rouge"], &["0.parquet,g1,{},0.1,,True,0.3"]);

        write_summary(dir_b.path(), &[("l", "reranker"), ("l", "generator")]);
        write_node(dir_b.path(), "l", "reranker", &["f1"], &["0.parquet,r1,{},0.1,,False,0.5"]);
        write_node(dir_b.path(), "l", "generator", &["rouge"], &["0.parquet,g2,{},0.1,,True,0.6"]);

        let a = load_trial(dir_a.path()).unwrap();
        let b = load_trial(dir_b.path()).unwrap();
        let result = compare(&a, &b, &BestModuleSelector::Flagged);

        let order: Vec<String> = result.iter().map(|c| c.node.node_type.clone()).collect();
        assert_eq!(order, vec!["retrieval", "generator", "reranker"]);

        assert_eq!(result[0].best_a().unwrap().module_name, "m1");
        assert!(result[0].b.is_none());
        assert!(!result[0].is_shared());

        assert!(result[1].is_shared());
        assert_eq!(result[1].best_a().unwrap().module_name, "g1");
        assert_eq!(result[1].best_b().unwrap().module_name, "g2");

        assert!(result[2].a.is_none());
        assert!(result[2].b.is_some());
        assert!(result[2].best_b().is_none());
    }

    #[test]
    fn test_identical_trials_pair_every_node() {
        let dir = TempDir::new().unwrap();
        write_basic_trial(dir.path());
        let trial = load_trial(dir.path()).unwrap();

        let result = compare(&trial, &trial, &BestModuleSelector::Flagged);
        assert_eq!(result.len(), trial.node_count());
        assert!(result.iter().all(NodeComparison::is_shared));
    }
}
