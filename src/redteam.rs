// src/redteam.rs
//! Taxonomy hand-off to an external adversarial-sample generator.
//!
//! The engine only builds the digest and forwards it; generating samples is
//! the sink's business.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{QtraceError, Result};
use crate::types::{CodeUnit, Tag};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxonomyEntry {
    pub tag: Tag,
    pub count: usize,
    pub unit_ids: Vec<String>,
}

/// Per-tag unit counts, one entry per tag in taxonomy-code order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxonomyDigest {
    pub entries: Vec<TaxonomyEntry>,
}

impl TaxonomyDigest {
    #[must_use]
    pub fn from_units(units: &[CodeUnit]) -> Self {
        let entries = Tag::ALL
            .iter()
            .map(|&tag| {
                let unit_ids: Vec<String> = units
                    .iter()
                    .filter(|u| u.tag == tag)
                    .map(|u| u.id.clone())
                    .collect();
                TaxonomyEntry {
                    tag,
                    count: unit_ids.len(),
                    unit_ids,
                }
            })
            .collect();
        Self { entries }
    }

    #[must_use]
    pub fn count(&self, tag: Tag) -> usize {
        self.entries
            .iter()
            .find(|e| e.tag == tag)
            .map_or(0, |e| e.count)
    }

    /// Tags with at least one unit, excluding Benign.
    #[must_use]
    pub fn suspicious(&self) -> Vec<Tag> {
        self.entries
            .iter()
            .filter(|e| e.count > 0 && !e.tag.is_benign())
            .map(|e| e.tag)
            .collect()
    }
}

/// Receives the digest when red-team forwarding is enabled.
pub trait TaxonomySink: Send + Sync {
    /// # Errors
    /// Implementations report delivery failures; the engine logs them and
    /// carries on.
    fn accept(&self, digest: &TaxonomyDigest) -> Result<()>;
}

/// Appends each digest as one JSON line.
#[derive(Debug, Clone)]
pub struct JsonlSink {
    path: PathBuf,
}

impl JsonlSink {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl TaxonomySink for JsonlSink {
    fn accept(&self, digest: &TaxonomyDigest) -> Result<()> {
        let line = serde_json::to_string(digest)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| QtraceError::io(e, &self.path))?;
        writeln!(file, "{line}").map_err(|e| QtraceError::io(e, &self.path))
    }
}
