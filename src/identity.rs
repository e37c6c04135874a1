//! Vector-store collection names derived from test case labels.
//!
//! Labels are human-readable and may be in any script. Collection names must
//! match `[a-z0-9_]`, and must stay stable across runs so the lifecycle
//! manager can find what a previous run created.
//!
//! Non-ASCII runs without a dictionary entry are replaced by `kr` plus the
//! first eight hex digits of their MD5. Two different runs can in principle
//! share those 32 bits; for realistic label sets this does not happen, but
//! it is not a uniqueness guarantee.

use md5::{Digest, Md5};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Known label fragments and their ASCII tokens, applied in order.
pub const DEFAULT_SUBSTITUTIONS: &[(&str, &str)] = &[("인사규정", "insa")];

static NON_ASCII_WORD_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\w&&[^\x00-\x7F]]+").expect("Valid non-ASCII word regex"));

static DISALLOWED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9_]").expect("Valid disallowed-character regex"));

static UNDERSCORE_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"_{2,}").expect("Valid underscore-run regex"));

/// A sanitized collection name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CollectionIdentity(String);

impl CollectionIdentity {
    /// Derive `"{prefix}_{normalized(label)}"` using [`DEFAULT_SUBSTITUTIONS`].
    pub fn derive(label: &str, prefix: &str) -> Self {
        LabelNormalizer::default().derive(label, prefix)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CollectionIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CollectionIdentity {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Label normalization with a configurable substitution dictionary.
#[derive(Debug, Clone)]
pub struct LabelNormalizer {
    substitutions: Vec<(String, String)>,
}

impl Default for LabelNormalizer {
    fn default() -> Self {
        Self::with_substitutions(DEFAULT_SUBSTITUTIONS.iter().copied())
    }
}

impl LabelNormalizer {
    pub fn with_substitutions<'s>(entries: impl IntoIterator<Item = (&'s str, &'s str)>) -> Self {
        Self {
            substitutions: entries
                .into_iter()
                .map(|(from, to)| (from.to_string(), to.to_string()))
                .collect(),
        }
    }

    pub fn derive(&self, label: &str, prefix: &str) -> CollectionIdentity {
        CollectionIdentity(format!("{}_{}", prefix, self.normalize(label)))
    }

    /// Normalize a label. The step order is fixed: each step must not
    /// re-mangle the output of the one before it.
    pub fn normalize(&self, label: &str) -> String {
        let mut text = label.to_string();
        for (from, to) in &self.substitutions {
            if !from.is_empty() {
                text = text.replace(from.as_str(), to);
            }
        }

        let hashed = NON_ASCII_WORD_RUN.replace_all(&text, |caps: &regex::Captures| {
            format!("kr{}", short_md5(&caps[0]))
        });
        let filtered = DISALLOWED.replace_all(&hashed, "_");
        let collapsed = UNDERSCORE_RUN.replace_all(&filtered, "_");

        collapsed.trim_matches('_').to_lowercase()
    }
}

fn short_md5(run: &str) -> String {
    let digest = Md5::digest(run.as_bytes());
    let hex = format!("{:x}", digest);
    hex[..8].to_string()
}
