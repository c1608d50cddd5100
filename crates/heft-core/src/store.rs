//! Store query boundary.
//!
//! The analysis core never talks to a store directly. A [`StoreQuery`]
//! implementation hands it the records of one closure, and any failure it
//! reports is passed through to the caller unchanged (no retries).
//!
//! [`RecordFile`] is the in-memory implementation: it reads a JSON snapshot
//! of store metadata, which makes closures reproducible and testable without
//! a live store.
//!
//! # Accepted JSON shapes
//!
//! ```text
//! [{"path": "/nix/store/…-a", "size": 120, "references": ["/nix/store/…-b"]}, …]
//! [{"path": "/nix/store/…-a", "narSize": 120, "references": […], …}, …]   // nix path-info --json (array)
//! {"/nix/store/…-a": {"narSize": 120, "references": […], …}, …}           // nix path-info --json (object)
//! ```
//!
//! Unknown fields are ignored, and self-references are stripped.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::io::Read;
use std::path::Path;

use serde::Deserialize;
use tracing::{debug, instrument};

use crate::error::StoreError;
use crate::record::{NodeId, PathRecord};

/// Source of closure metadata.
pub trait StoreQuery {
    /// Records for `target` and everything it transitively references.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] when the store cannot be read or the target
    /// is unknown.
    fn query_closure(&self, target: &str) -> Result<Vec<PathRecord>, StoreError>;
}

// ---------------------------------------------------------------------------
// RecordFile
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RawEntry {
    #[serde(default, alias = "id")]
    path: Option<String>,
    #[serde(alias = "narSize")]
    size: u64,
    #[serde(default)]
    references: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawFile {
    List(Vec<RawEntry>),
    Map(BTreeMap<String, Option<RawEntry>>),
}

/// Closure metadata loaded from a JSON snapshot.
#[derive(Debug, Clone, Default)]
pub struct RecordFile {
    records: Vec<PathRecord>,
}

impl RecordFile {
    /// Wrap records that are already in memory.
    #[must_use]
    pub fn from_records(records: Vec<PathRecord>) -> Self {
        Self { records }
    }

    /// Parse a snapshot from a JSON string.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Json`] for malformed JSON and
    /// [`StoreError::Parse`] for entries without a usable path.
    pub fn parse(json: &str) -> Result<Self, StoreError> {
        let raw: RawFile = serde_json::from_str(json)?;
        Self::from_raw(raw)
    }

    /// Parse a snapshot from a reader.
    ///
    /// # Errors
    ///
    /// Same as [`RecordFile::parse`].
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, StoreError> {
        let raw: RawFile = serde_json::from_reader(reader)?;
        Self::from_raw(raw)
    }

    /// Load a snapshot file.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] when the file cannot be opened, otherwise
    /// the same errors as [`RecordFile::parse`].
    #[instrument]
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        let file = std::fs::File::open(path)?;
        let loaded = Self::from_reader(std::io::BufReader::new(file))?;
        debug!(records = loaded.records.len(), "record file loaded");
        Ok(loaded)
    }

    /// Records in file order.
    #[must_use]
    pub fn records(&self) -> &[PathRecord] {
        &self.records
    }

    /// Consume the snapshot, yielding records in file order.
    #[must_use]
    pub fn into_records(self) -> Vec<PathRecord> {
        self.records
    }

    fn from_raw(raw: RawFile) -> Result<Self, StoreError> {
        let entries: Vec<(String, RawEntry)> = match raw {
            RawFile::List(list) => list
                .into_iter()
                .enumerate()
                .map(|(position, entry)| match entry.path.clone() {
                    Some(path) => Ok((path, entry)),
                    None => Err(StoreError::Parse {
                        context: "reading record file".to_string(),
                        detail: format!("entry {position} has no path"),
                    }),
                })
                .collect::<Result<_, _>>()?,
            RawFile::Map(map) => map
                .into_iter()
                .map(|(path, entry)| match entry {
                    Some(entry) => Ok((path, entry)),
                    None => Err(StoreError::Parse {
                        context: "reading record file".to_string(),
                        detail: format!("{path} is not a valid store path"),
                    }),
                })
                .collect::<Result<_, _>>()?,
        };

        let records = entries
            .into_iter()
            .map(|(path, entry)| {
                PathRecord::new(path, entry.size)
                    .with_references(entry.references)
                    .without_self_reference()
            })
            .collect();

        Ok(Self { records })
    }
}

impl StoreQuery for RecordFile {
    /// An empty target selects every record. Otherwise only the target's
    /// closure is returned, in file order. References to paths missing from
    /// the file are kept so the graph builder reports them as dangling.
    fn query_closure(&self, target: &str) -> Result<Vec<PathRecord>, StoreError> {
        if target.is_empty() {
            return Ok(self.records.clone());
        }

        let by_id: HashMap<&NodeId, &PathRecord> =
            self.records.iter().map(|record| (&record.id, record)).collect();

        let start = self
            .records
            .iter()
            .find(|record| record.id.as_str() == target)
            .ok_or_else(|| StoreError::UnknownTarget(target.to_string()))?;

        let mut seen: HashSet<&NodeId> = HashSet::from([&start.id]);
        let mut queue: VecDeque<&PathRecord> = VecDeque::from([start]);
        while let Some(record) = queue.pop_front() {
            for reference in &record.references {
                if seen.insert(reference) {
                    if let Some(next) = by_id.get(reference) {
                        queue.push_back(next);
                    }
                }
            }
        }

        Ok(self
            .records
            .iter()
            .filter(|record| seen.contains(&record.id))
            .cloned()
            .collect())
    }
}
