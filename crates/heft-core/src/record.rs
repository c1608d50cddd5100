//! Path records as delivered by the store query boundary.
//!
//! A [`PathRecord`] is the raw, unvalidated input to graph construction: one
//! store path, its own on-disk size, and the set of paths it references
//! directly. Nothing in here checks that references resolve; that is the
//! graph builder's job.

use std::borrow::Borrow;
use std::collections::{BTreeSet, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// NodeId
// ---------------------------------------------------------------------------

/// Opaque identifier of one installed artifact (a store path).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    /// Wrap a store path.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the underlying path string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for NodeId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl Borrow<str> for NodeId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for NodeId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ---------------------------------------------------------------------------
// PathRecord
// ---------------------------------------------------------------------------

/// One store path with its exclusive size and direct references.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathRecord {
    /// Unique store path.
    pub id: NodeId,
    /// Bytes occupied by this path alone.
    pub size: u64,
    /// Paths this one references directly.
    #[serde(default)]
    pub references: BTreeSet<NodeId>,
}

impl PathRecord {
    /// Create a record with no references.
    #[must_use]
    pub fn new(id: impl Into<NodeId>, size: u64) -> Self {
        Self {
            id: id.into(),
            size,
            references: BTreeSet::new(),
        }
    }

    /// Builder-style helper that adds direct references.
    #[must_use]
    pub fn with_references<I, S>(mut self, references: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<NodeId>,
    {
        self.references
            .extend(references.into_iter().map(Into::into));
        self
    }

    /// Drop a reference from the record to itself.
    ///
    /// Store metadata lists self-references for paths that embed their own
    /// location; they add no storage cost and would otherwise read as a cycle.
    #[must_use]
    pub fn without_self_reference(mut self) -> Self {
        let id = self.id.clone();
        self.references.remove(&id);
        self
    }
}

// ---------------------------------------------------------------------------
// Short names
// ---------------------------------------------------------------------------

/// Shape of store paths, used to derive compact display labels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreLayout {
    /// Directory prefix shared by every store path, including the trailing `/`.
    pub prefix: String,
    /// Length of the hash part that follows the prefix.
    pub hash_len: usize,
}

impl Default for StoreLayout {
    fn default() -> Self {
        Self {
            prefix: "/nix/store/".to_string(),
            hash_len: 32,
        }
    }
}

impl StoreLayout {
    /// Split `path` into `(base, symbolic)` where `base` is `hash-name` and
    /// `symbolic` is `name`. Returns `None` for paths outside the layout.
    fn split<'a>(&self, path: &'a str) -> Option<(&'a str, &'a str)> {
        let base = path.strip_prefix(self.prefix.as_str())?;
        let rest = base.get(self.hash_len..)?;
        let symbolic = rest.strip_prefix('-')?;
        if symbolic.is_empty() {
            return None;
        }
        Some((base, symbolic))
    }
}

/// Derive the shortest unambiguous display label for each id.
///
/// Paths inside `layout` are labeled by their symbolic name (`hello-2.12`).
/// When two paths share a symbolic name, both fall back to `hash-name`.
/// Paths outside the layout keep their full id.
#[must_use]
pub fn short_names<'a, I>(ids: I, layout: &StoreLayout) -> HashMap<NodeId, String>
where
    I: IntoIterator<Item = &'a NodeId>,
{
    let ids: Vec<&NodeId> = ids.into_iter().collect();

    let mut symbolic_counts: HashMap<&str, usize> = HashMap::new();
    for id in &ids {
        if let Some((_, symbolic)) = layout.split(id.as_str()) {
            *symbolic_counts.entry(symbolic).or_insert(0) += 1;
        }
    }

    ids.into_iter()
        .map(|id| {
            let label = match layout.split(id.as_str()) {
                Some((_, symbolic)) if symbolic_counts.get(symbolic) == Some(&1) => symbolic,
                Some((base, _)) => base,
                None => id.as_str(),
            };
            (id.clone(), label.to_string())
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const HASH_A: &str = "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
    const HASH_B: &str = "bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";

    fn store_path(hash: &str, name: &str) -> NodeId {
        NodeId::new(format!("/nix/store/{hash}-{name}"))
    }

    #[test]
    fn references_are_a_set() {
        let record = PathRecord::new("a", 1).with_references(["b", "c", "b"]);
        assert_eq!(record.references.len(), 2);
    }

    #[test]
    fn self_reference_is_stripped() {
        let record = PathRecord::new("a", 1)
            .with_references(["a", "b"])
            .without_self_reference();
        assert_eq!(
            record.references.into_iter().collect::<Vec<_>>(),
            vec![NodeId::from("b")]
        );
    }

    #[test]
    fn unique_symbolic_names_are_used() {
        let hello = store_path(HASH_A, "hello-2.12");
        let glibc = store_path(HASH_B, "glibc-2.38");
        let names = short_names([&hello, &glibc], &StoreLayout::default());
        assert_eq!(names[&hello], "hello-2.12");
        assert_eq!(names[&glibc], "glibc-2.38");
    }

    #[test]
    fn colliding_symbolic_names_fall_back_to_hash_name() {
        let first = store_path(HASH_A, "bash-5.2");
        let second = store_path(HASH_B, "bash-5.2");
        let names = short_names([&first, &second], &StoreLayout::default());
        assert_eq!(names[&first], format!("{HASH_A}-bash-5.2"));
        assert_eq!(names[&second], format!("{HASH_B}-bash-5.2"));
    }

    #[test]
    fn foreign_paths_keep_full_id() {
        let odd = NodeId::from("/opt/thing");
        let short = NodeId::from("/nix/store/tooshort-x");
        let names = short_names([&odd, &short], &StoreLayout::default());
        assert_eq!(names[&odd], "/opt/thing");
        assert_eq!(names[&short], "/nix/store/tooshort-x");
    }

    #[test]
    fn record_deserializes_without_references() {
        let record: PathRecord =
            serde_json::from_str(r#"{"id":"/x","size":3}"#).expect("valid record");
        assert_eq!(record.id.as_str(), "/x");
        assert!(record.references.is_empty());
    }
}
