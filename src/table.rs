//! CSV summary tables written by the evaluator.

use crate::error::{EvalError, Result};
use std::path::{Path, PathBuf};

/// A header-addressed CSV table held in memory.
#[derive(Debug, Clone)]
pub(crate) struct Table {
    path: PathBuf,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    /// Read a table. A missing file is `NotFound`.
    ///
    /// Columns with an empty header (an unnamed index column written by
    /// dataframe tooling) are dropped.
    pub fn read(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(EvalError::NotFound(path.to_path_buf()));
        }

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_path(path)
            .map_err(|e| csv_error(path, e))?;

        let raw_headers = reader.headers().map_err(|e| csv_error(path, e))?.clone();
        let keep: Vec<usize> = raw_headers
            .iter()
            .enumerate()
            .filter(|(_, name)| !name.trim().is_empty())
            .map(|(idx, _)| idx)
            .collect();
        let headers = keep
            .iter()
            .map(|&idx| raw_headers[idx].trim().to_string())
            .collect();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|e| csv_error(path, e))?;
            rows.push(
                keep.iter()
                    .map(|&idx| record.get(idx).unwrap_or_default().to_string())
                    .collect(),
            );
        }

        Ok(Self {
            path: path.to_path_buf(),
            headers,
            rows,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Fail with `MalformedData` naming every missing column.
    pub fn require_columns(&self, required: &[&str]) -> Result<()> {
        let missing: Vec<&str> = required
            .iter()
            .copied()
            .filter(|name| !self.headers().iter().any(|h| h == name))
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(EvalError::malformed(
                &self.path,
                format!("missing required columns: {}", missing.join(", ")),
            ))
        }
    }

    /// Iterate rows as header-addressable records.
    pub fn records(&self) -> impl Iterator<Item = Record<'_>> {
        self.rows.iter().map(move |values| Record {
            headers: &self.headers,
            values,
        })
    }
}

/// One row of a [`Table`].
#[derive(Debug, Clone, Copy)]
pub(crate) struct Record<'a> {
    headers: &'a [String],
    values: &'a [String],
}

impl<'a> Record<'a> {
    pub fn get(&self, column: &str) -> Option<&'a str> {
        self.headers
            .iter()
            .position(|h| h == column)
            .and_then(|idx| self.values.get(idx))
            .map(String::as_str)
    }

    /// All `(column, value)` pairs in table order.
    pub fn cells(&self) -> impl Iterator<Item = (&'a str, &'a str)> {
        let values = self.values;
        self.headers
            .iter()
            .zip(values.iter())
            .map(|(h, v)| (h.as_str(), v.as_str()))
    }
}

fn csv_error(path: &Path, err: csv::Error) -> EvalError {
    if err.is_io_error() {
        match err.into_kind() {
            csv::ErrorKind::Io(source) => EvalError::io(path, source),
            other => EvalError::Csv {
                path: path.to_path_buf(),
                reason: format!("{:?}", other),
            },
        }
    } else {
        EvalError::Csv {
            path: path.to_path_buf(),
            reason: err.to_string(),
        }
    }
}
