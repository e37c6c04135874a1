//! End-to-end evaluation run for one test case.

use crate::config::Config;
use crate::error::{EvalError, Result};
use crate::identity::CollectionIdentity;
use crate::pipeline::EvaluatorCommand;
use crate::store::{latest_trial, list_trials, load_trial};
use crate::testcase::TestCase;
use crate::trial::Trial;
use crate::vector_store::{CollectionLifecycleManager, EvictionState, VectorStoreConnector};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Outcome of a completed run.
#[derive(Debug)]
pub struct RunReport {
    pub identity: CollectionIdentity,
    pub eviction: EvictionState,
    pub trial: Trial,
}

/// Evicts the stale collection, runs the evaluator and loads the new trial.
pub struct RunOrchestrator<C> {
    config: Config,
    lifecycle: CollectionLifecycleManager<C>,
}

impl<C: VectorStoreConnector> RunOrchestrator<C> {
    pub fn new(config: Config, connector: C) -> Self {
        Self {
            config,
            lifecycle: CollectionLifecycleManager::new(connector),
        }
    }

    pub fn identity_for(&self, case: &TestCase) -> CollectionIdentity {
        CollectionIdentity::derive(&case.name, &self.config.collection_prefix)
    }

    /// Run one test case.
    ///
    /// Eviction happens once, before the evaluator starts, and never fails
    /// the run. Missing inputs and evaluator failures do, as does an
    /// evaluator exit that leaves no new trial behind.
    pub async fn run(&self, case: &TestCase) -> Result<RunReport> {
        for input in [case.qa_path(), case.corpus_path()] {
            if !input.is_file() {
                return Err(EvalError::NotFound(input));
            }
        }

        let identity = self.identity_for(case);
        let store = case
            .vector_store
            .as_ref()
            .unwrap_or(&self.config.vector_store);

        info!(test_case = %case.name, collection = %identity, backend = %store.backend, "Preparing run");

        let eviction = self.lifecycle.evict(&identity, store).await;
        if !eviction.is_absent() {
            warn!(test_case = %case.name, "Proceeding without confirmed collection eviction");
        }

        let trial_dir = case.trial_dir();
        let previous = existing_trials(&trial_dir)?;

        EvaluatorCommand::for_test_case(&self.config.evaluator.command, case, &identity)
            .run()
            .await?;

        let root = latest_trial(&trial_dir)?;
        if previous.contains(&root) {
            return Err(EvalError::NotFound(trial_dir));
        }

        let trial = load_trial(&root)?;
        info!(test_case = %case.name, trial = %root.display(), nodes = trial.node_count(), "Loaded trial results");

        Ok(RunReport {
            identity,
            eviction,
            trial,
        })
    }
}

/// Trials already under `trial_dir`; none if the directory does not exist yet.
fn existing_trials(trial_dir: &Path) -> Result<Vec<PathBuf>> {
    match list_trials(trial_dir) {
        Ok(trials) => Ok(trials),
        Err(err) if err.is_not_found() => Ok(Vec::new()),
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Backend;
    use crate::store::fixtures::{write_node, write_summary};
    use crate::testcase::TestCaseBook;
    use crate::vector_store::fake::FakeStore;
    use std::fs;
    use tempfile::TempDir;

    fn case_in(dir: &Path) -> TestCase {
        let yaml = format!(
            "test_cases:\n  인사규정:\n    input_dir: in\n    output_dir: {}\n",
            dir.join("out").display()
        );
        TestCaseBook::from_yaml(&yaml)
            .unwrap()
            .get("인사규정")
            .unwrap()
            .clone()
    }

    fn write_inputs(case: &TestCase) {
        fs::create_dir_all(case.data_dir()).unwrap();
        fs::write(case.qa_path(), b"qa").unwrap();
        fs::write(case.corpus_path(), b"corpus").unwrap();
    }

    /// A one-node trial whose best generator module is `module`.
    fn write_trial(root: &Path, module: &str) {
        write_summary(root, &[("post_retrieve_node_line", "generator")]);
        write_node(
            root,
            "post_retrieve_node_line",
            "generator",
            &["rouge"],
            &[&format!("0.parquet,{},{{}},1.2,80,True,0.4", module)],
        );
    }

    /// Evaluator stand-in that copies `source` to `target`, as a new numbered trial.
    #[cfg(unix)]
    fn copying_evaluator(dir: &Path, source: &Path, target: &Path) -> String {
        use std::os::unix::fs::PermissionsExt;

        let script = dir.join("fake-evaluator.sh");
        fs::write(
            &script,
            format!(
                "#!/bin/sh\nmkdir -p '{target}'\ncp -R '{source}'/. '{target}'\n",
                source = source.display(),
                target = target.display()
            ),
        )
        .unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();
        script.display().to_string()
    }

    fn config(command: &str) -> Config {
        let mut config = Config::with_vector_store(Backend::Qdrant, "localhost");
        config.evaluator.command = command.to_string();
        config
    }

    #[tokio::test]
    async fn test_missing_inputs_stop_before_eviction() {
        let dir = TempDir::new().unwrap();
        let case = case_in(dir.path());
        let store = FakeStore::new(Backend::Qdrant).with_collection("rag_insa");
        let orchestrator = RunOrchestrator::new(config("true"), store.clone());

        let err = orchestrator.run(&case).await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(store.closes(), 0);
        assert!(store.contains("rag_insa"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_rerun_loads_the_new_trial() {
        let dir = TempDir::new().unwrap();
        let case = case_in(dir.path());
        write_inputs(&case);
        write_trial(&case.trial_dir().join("0"), "OLD");

        let source = dir.path().join("produced");
        write_trial(&source, "NEW");
        let evaluator = copying_evaluator(dir.path(), &source, &case.trial_dir().join("1"));

        let store = FakeStore::new(Backend::Qdrant).with_collection("rag_insa");
        let orchestrator = RunOrchestrator::new(config(&evaluator), store.clone());

        let report = orchestrator.run(&case).await.unwrap();
        assert_eq!(report.identity.as_str(), "rag_insa");
        assert!(matches!(report.eviction, EvictionState::Deleted { .. }));
        assert_eq!(report.trial.root(), case.trial_dir().join("1"));
        assert_eq!(report.trial.nodes()[0].rows[0].module_name, "NEW");
        assert!(!store.contains("rag_insa"));
        assert_eq!(store.closes(), 1);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_eviction_failure_does_not_abort() {
        let dir = TempDir::new().unwrap();
        let case = case_in(dir.path());
        write_inputs(&case);

        let source = dir.path().join("produced");
        write_trial(&source, "FIRST");
        let evaluator = copying_evaluator(dir.path(), &source, &case.trial_dir().join("0"));

        let store = FakeStore::new(Backend::Qdrant).failing_connect();
        let orchestrator = RunOrchestrator::new(config(&evaluator), store);

        let report = orchestrator.run(&case).await.unwrap();
        assert!(matches!(report.eviction, EvictionState::Degraded { .. }));
        assert_eq!(report.trial.root(), case.trial_dir().join("0"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_exit_without_new_trial_is_not_found() {
        let dir = TempDir::new().unwrap();
        let case = case_in(dir.path());
        write_inputs(&case);
        write_trial(&case.trial_dir().join("0"), "OLD");

        let store = FakeStore::new(Backend::Qdrant);
        let orchestrator = RunOrchestrator::new(config("true"), store);

        let err = orchestrator.run(&case).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_evaluator_failure_is_reported() {
        let dir = TempDir::new().unwrap();
        let case = case_in(dir.path());
        write_inputs(&case);

        let store = FakeStore::new(Backend::Qdrant);
        let orchestrator = RunOrchestrator::new(config("false"), store.clone());

        let err = orchestrator.run(&case).await.unwrap_err();
        assert!(matches!(err, EvalError::Pipeline(_)));
        assert_eq!(store.closes(), 1);
    }
}
