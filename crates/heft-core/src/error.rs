//! Error taxonomy for closure analysis.
//!
//! Every error here is terminal for the run: no partial attribution is ever
//! produced from a graph that failed validation.

use std::fmt;
use std::path::PathBuf;

use crate::record::NodeId;

/// Validation failures raised by the graph builder.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    /// Two input records share an identifier.
    #[error("duplicate node: {0}")]
    DuplicateNode(NodeId),

    /// A record references a path that is not part of the input set.
    #[error("dangling reference: {from} references missing path {missing}")]
    DanglingReference {
        /// The referenced id that has no record.
        missing: NodeId,
        /// The record holding the reference.
        from: NodeId,
    },

    /// The reference relation is not acyclic.
    #[error("cycle detected at {example} (cycle members: {})", join_ids(.members))]
    CycleDetected {
        /// One node on the offending cycle.
        example: NodeId,
        /// All members of the strongly connected component holding `example`, sorted.
        members: Vec<NodeId>,
    },

    /// The summed exclusive sizes do not fit in a `u64`.
    #[error("size overflow: total closure size exceeds {} bytes at {0}", u64::MAX)]
    SizeOverflow(NodeId),
}

fn join_ids(ids: &[NodeId]) -> String {
    ids.iter()
        .map(NodeId::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Failures from the store query boundary, passed through unchanged.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Reading store metadata failed at the OS level.
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A store command exited unsuccessfully.
    #[error("`{command}` failed with status {status}: {stderr}")]
    CommandFailed {
        /// Command line that was run.
        command: String,
        /// Exit status rendered for display.
        status: String,
        /// Captured standard error, trimmed.
        stderr: String,
    },

    /// Store output did not have the expected shape.
    #[error("unexpected store output while {context}: {detail}")]
    Parse {
        /// What was being read.
        context: String,
        /// What was wrong with it.
        detail: String,
    },

    /// A record file is not valid JSON for any supported shape.
    #[error("invalid record file: {0}")]
    Json(#[from] serde_json::Error),

    /// The requested build target is not known to the store.
    #[error("unknown target: {0}")]
    UnknownTarget(String),
}

/// Top-level error for a full analysis run.
#[derive(Debug, thiserror::Error)]
pub enum HeftError {
    /// The graph failed validation.
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// Querying the store failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A configuration file could not be read or parsed.
    #[error("config error in {}: {detail}", .path.display())]
    Config {
        /// Offending file.
        path: PathBuf,
        /// Parser or I/O message.
        detail: String,
    },

    /// Writing report output failed.
    #[error("output I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl HeftError {
    /// Machine-readable code for this error.
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Graph(GraphError::DuplicateNode(_)) => ErrorCode::DuplicateNode,
            Self::Graph(GraphError::DanglingReference { .. }) => ErrorCode::DanglingReference,
            Self::Graph(GraphError::CycleDetected { .. }) => ErrorCode::CycleDetected,
            Self::Graph(GraphError::SizeOverflow(_)) => ErrorCode::SizeOverflow,
            Self::Store(_) => ErrorCode::StoreQueryFailed,
            Self::Config { .. } => ErrorCode::ConfigParseError,
            Self::Io(_) => ErrorCode::OutputWriteFailed,
        }
    }
}

/// Machine-readable error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ConfigParseError,
    DuplicateNode,
    DanglingReference,
    CycleDetected,
    SizeOverflow,
    StoreQueryFailed,
    OutputWriteFailed,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::ConfigParseError => "E1001",
            Self::DuplicateNode => "E2001",
            Self::DanglingReference => "E2002",
            Self::CycleDetected => "E2003",
            Self::SizeOverflow => "E2004",
            Self::StoreQueryFailed => "E3001",
            Self::OutputWriteFailed => "E5001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::ConfigParseError => "Config file parse error",
            Self::DuplicateNode => "Duplicate store path in input",
            Self::DanglingReference => "Reference to a path outside the input",
            Self::CycleDetected => "Reference cycle in closure",
            Self::SizeOverflow => "Closure size exceeds 64-bit byte count",
            Self::StoreQueryFailed => "Store query failed",
            Self::OutputWriteFailed => "Report write failed",
        }
    }

    /// Optional remediation hint for operators.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::ConfigParseError => Some("Fix syntax in .heft.toml and retry."),
            Self::DuplicateNode => Some("Deduplicate the input records before analysis."),
            Self::DanglingReference => {
                Some("The store snapshot is incomplete; query the full closure (requisites).")
            }
            Self::CycleDetected => None,
            Self::SizeOverflow => Some("Check the snapshot for corrupt path sizes."),
            Self::StoreQueryFailed => {
                Some("Check that the target exists and the store is readable.")
            }
            Self::OutputWriteFailed => Some("Check disk space and write permissions."),
        }
    }

    /// Process exit status for this kind of failure.
    #[must_use]
    pub const fn exit_status(self) -> u8 {
        match self {
            Self::DuplicateNode
            | Self::DanglingReference
            | Self::CycleDetected
            | Self::SizeOverflow => 1,
            Self::StoreQueryFailed => 2,
            Self::ConfigParseError | Self::OutputWriteFailed => 3,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    const ALL: [ErrorCode; 7] = [
        ErrorCode::ConfigParseError,
        ErrorCode::DuplicateNode,
        ErrorCode::DanglingReference,
        ErrorCode::CycleDetected,
        ErrorCode::SizeOverflow,
        ErrorCode::StoreQueryFailed,
        ErrorCode::OutputWriteFailed,
    ];

    #[test]
    fn all_codes_are_unique() {
        let mut seen = HashSet::new();
        for code in ALL {
            assert!(seen.insert(code.code()), "duplicate code {}", code.code());
        }
    }

    #[test]
    fn code_format_is_machine_friendly() {
        for code in ALL {
            let code = code.code();
            assert_eq!(code.len(), 5);
            assert!(code.starts_with('E'));
            assert!(code.chars().skip(1).all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn every_code_fails_the_process() {
        assert!(ALL.iter().all(|code| code.exit_status() != 0));
    }

    #[test]
    fn dangling_reference_names_both_ids() {
        let err = GraphError::DanglingReference {
            missing: NodeId::from("/missing"),
            from: NodeId::from("/holder"),
        };
        let msg = err.to_string();
        assert!(msg.contains("/missing"));
        assert!(msg.contains("/holder"));
    }

    #[test]
    fn graph_errors_map_to_codes() {
        let err = HeftError::from(GraphError::CycleDetected {
            example: NodeId::from("a"),
            members: vec![NodeId::from("a"), NodeId::from("b")],
        });
        assert_eq!(err.code(), ErrorCode::CycleDetected);
        assert!(err.to_string().contains("a, b"));

        let err = HeftError::from(GraphError::SizeOverflow(NodeId::from("big")));
        assert_eq!(err.code(), ErrorCode::SizeOverflow);
        assert_eq!(err.code().exit_status(), 1);
        assert!(err.to_string().contains("big"));
    }
}
