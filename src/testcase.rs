//! Test case definitions.
//!
//! A test case file holds a `defaults:` mapping and a `test_cases:` mapping.
//! Each case is merged over the defaults key by key; keys that no case field
//! uses are ignored.
//!
//! ```yaml
//! defaults:
//!   num_qa: 20
//!   rag_config: sample_config/rag/simple.yaml
//! test_cases:
//!   인사규정:
//!     description: HR regulations
//!     input_dir: data/insa
//!     output_dir: results/insa
//!     env:
//!       EMBEDDING_MODEL: bge-m3
//! ```

use crate::config::VectorStoreConfig;
use crate::error::{EvalError, Result};
use crate::store;
use serde::{Deserialize, Deserializer};
use serde_yaml::{Mapping, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Pipeline configuration used when neither the case nor the defaults name one.
pub const DEFAULT_RAG_CONFIG: &str = "sample_config/rag/korean/non_gpu/simple_korean_custom.yaml";

/// Dataset file names written into a case's data directory.
pub const QA_FILENAME: &str = "qa.parquet";
pub const CORPUS_FILENAME: &str = "corpus.parquet";

/// One named evaluation scenario.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TestCase {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    #[serde(default = "default_num_qa")]
    pub num_qa: u32,
    #[serde(default = "default_rag_config")]
    pub rag_config: PathBuf,
    /// Environment overrides for the evaluator process.
    #[serde(default, deserialize_with = "env_strings")]
    pub env: BTreeMap<String, String>,
    /// Vector store for this case; the global one is used when absent.
    #[serde(default)]
    pub vector_store: Option<VectorStoreConfig>,
}

fn default_num_qa() -> u32 {
    20
}

fn default_rag_config() -> PathBuf {
    PathBuf::from(DEFAULT_RAG_CONFIG)
}

/// Accept scalar env values of any YAML type and keep them as strings.
fn env_strings<'de, D>(deserializer: D) -> std::result::Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<BTreeMap<String, Value>> = Option::deserialize(deserializer)?;
    let mut env = BTreeMap::new();
    for (key, value) in raw.unwrap_or_default() {
        let text = match value {
            Value::String(s) => s,
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => n.to_string(),
            Value::Null => String::new(),
            other => {
                return Err(serde::de::Error::custom(format!(
                    "env value for '{}' must be a scalar, got {:?}",
                    key, other
                )));
            }
        };
        env.insert(key, text);
    }
    Ok(env)
}

impl TestCase {
    /// Prepared qa/corpus datasets.
    pub fn data_dir(&self) -> PathBuf {
        self.output_dir.join("data")
    }

    /// Evaluator project directory.
    pub fn trial_dir(&self) -> PathBuf {
        self.output_dir.join("trial")
    }

    /// The most recent trial the evaluator wrote, if any.
    ///
    /// Each run adds a numbered trial under [`trial_dir`](Self::trial_dir).
    pub fn latest_trial(&self) -> Option<PathBuf> {
        store::latest_trial(&self.trial_dir()).ok()
    }

    pub fn qa_path(&self) -> PathBuf {
        self.data_dir().join(QA_FILENAME)
    }

    pub fn corpus_path(&self) -> PathBuf {
        self.data_dir().join(CORPUS_FILENAME)
    }

    pub fn has_results(&self) -> bool {
        self.latest_trial().is_some()
    }
}

/// All test cases of one file, in file order.
#[derive(Debug, Clone, Default)]
pub struct TestCaseBook {
    cases: Vec<TestCase>,
}

impl TestCaseBook {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(EvalError::NotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path).map_err(|e| EvalError::io(path, e))?;
        Self::from_yaml(&content)
            .map_err(|e| EvalError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Parse a test case document.
    pub fn from_yaml(content: &str) -> Result<Self> {
        let document: Value = serde_yaml::from_str(content)
            .map_err(|e| EvalError::Config(format!("Failed to parse test cases: {}", e)))?;

        let defaults = match document.get("defaults") {
            None | Some(Value::Null) => Mapping::new(),
            Some(Value::Mapping(map)) => map.clone(),
            Some(_) => return Err(EvalError::Config("'defaults' must be a mapping".to_string())),
        };

        let cases = match document.get("test_cases") {
            Some(Value::Mapping(map)) => map,
            Some(Value::Null) => return Ok(Self::default()),
            Some(_) => {
                return Err(EvalError::Config("'test_cases' must be a mapping".to_string()));
            }
            None => return Err(EvalError::Config("missing 'test_cases' section".to_string())),
        };

        let mut book = Vec::with_capacity(cases.len());
        for (key, case) in cases {
            let name = match key {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                other => {
                    return Err(EvalError::Config(format!(
                        "test case name must be a string, got {:?}",
                        other
                    )));
                }
            };

            let mut merged = defaults.clone();
            match case {
                Value::Mapping(fields) => {
                    for (field, value) in fields {
                        merged.insert(field.clone(), value.clone());
                    }
                }
                Value::Null => {}
                _ => {
                    return Err(EvalError::Config(format!(
                        "test case '{}' must be a mapping",
                        name
                    )));
                }
            }
            merged.insert(Value::String("name".to_string()), Value::String(name.clone()));

            let test_case: TestCase = serde_yaml::from_value(Value::Mapping(merged))
                .map_err(|e| EvalError::Config(format!("test case '{}': {}", name, e)))?;
            book.push(test_case);
        }

        Ok(Self { cases: book })
    }

    pub fn get(&self, name: &str) -> Result<&TestCase> {
        self.cases
            .iter()
            .find(|case| case.name == name)
            .ok_or_else(|| EvalError::UnknownTestCase {
                name: name.to_string(),
                available: self.names().map(str::to_string).collect(),
            })
    }

    pub fn list(&self) -> &[TestCase] {
        &self.cases
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.cases.iter().map(|case| case.name.as_str())
    }

    /// Cases whose trial has been written.
    pub fn with_results(&self) -> impl Iterator<Item = &TestCase> {
        self.cases.iter().filter(|case| case.has_results())
    }

    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }
}
