//! Invocation of the external evaluation pipeline.
//!
//! The evaluator is opaque: it receives a pipeline config, the qa and corpus
//! datasets and a project directory, and its exit status is all that is
//! checked. Trial artifacts are picked up from disk afterwards.

use crate::error::{EvalError, Result};
use crate::identity::CollectionIdentity;
use crate::testcase::TestCase;
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::time::Instant;
use tokio::process::Command;
use tracing::info;

/// Environment variable carrying the collection name to the evaluator.
pub const COLLECTION_ENV_VAR: &str = "RAG_COLLECTION_NAME";

/// A fully built evaluator invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluatorCommand {
    program: String,
    args: Vec<OsString>,
    env: BTreeMap<String, String>,
}

impl EvaluatorCommand {
    /// Build the `evaluate` invocation for a test case.
    pub fn for_test_case(program: &str, case: &TestCase, identity: &CollectionIdentity) -> Self {
        let args = vec![
            OsString::from("evaluate"),
            OsString::from("--config"),
            case.rag_config.clone().into_os_string(),
            OsString::from("--qa_data_path"),
            case.qa_path().into_os_string(),
            OsString::from("--corpus_data_path"),
            case.corpus_path().into_os_string(),
            OsString::from("--project_dir"),
            case.trial_dir().into_os_string(),
        ];

        let mut env = case.env.clone();
        env.insert(COLLECTION_ENV_VAR.to_string(), identity.to_string());

        Self {
            program: program.to_string(),
            args,
            env,
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[OsString] {
        &self.args
    }

    /// Variables overlaid on the inherited process environment.
    pub fn env(&self) -> &BTreeMap<String, String> {
        &self.env
    }

    /// Shell-like rendering for logs.
    pub fn command_line(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            line.push_str(&arg.to_string_lossy());
        }
        line
    }

    /// Run the evaluator to completion, inheriting stdio.
    pub async fn run(&self) -> Result<()> {
        info!(command = %self.command_line(), "Starting evaluation pipeline");
        let start = Instant::now();

        let status = Command::new(&self.program)
            .args(&self.args)
            .envs(&self.env)
            .status()
            .await
            .map_err(|e| EvalError::Pipeline(format!("failed to launch '{}': {}", self.program, e)))?;

        if !status.success() {
            return Err(EvalError::Pipeline(format!(
                "'{}' exited with {}",
                self.program, status
            )));
        }

        info!(
            elapsed_secs = start.elapsed().as_secs_f64(),
            "Evaluation pipeline finished"
        );
        Ok(())
    }
}
