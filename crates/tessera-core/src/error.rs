//! Error types for content tree operations.

use thiserror::Error;

use crate::node::{NodeId, NodeKind};

/// Errors that can occur while mutating or restoring the content tree.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum TreeError {
    /// The child kind is not allowed inside the parent kind.
    #[error("a {child} cannot be placed inside a {parent}")]
    InvalidContainment { child: NodeKind, parent: NodeKind },

    /// The node is no longer part of the tree.
    #[error("node {0} is not in the tree")]
    StaleReference(NodeId),

    /// Attempted to move a node into its own subtree.
    #[error("node {0} cannot be moved inside itself")]
    CyclicMove(NodeId),

    /// The root canvas cannot be removed, moved or duplicated.
    #[error("the root canvas cannot be detached")]
    RootImmutable,

    /// Content payload does not match the node kind.
    #[error("content payload does not fit a {0}")]
    PayloadMismatch(NodeKind),

    /// Every node id has been handed out.
    #[error("no node ids left to assign")]
    IdsExhausted,

    /// Template markup could not be parsed or was unsafe.
    #[error("malformed template: {0}")]
    MalformedTemplate(String),

    /// A snapshot parsed but describes an invalid tree.
    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(String),

    /// Snapshot (de)serialization failed.
    #[error("snapshot serialization error: {0}")]
    Snapshot(#[from] serde_json::Error),

    /// Editor configuration was rejected.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl TreeError {
    /// Whether this error is an expected near-miss during a gesture, rather
    /// than something the user should be told about.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            TreeError::InvalidContainment { .. }
                | TreeError::StaleReference(_)
                | TreeError::CyclicMove(_)
                | TreeError::RootImmutable
        )
    }
}
