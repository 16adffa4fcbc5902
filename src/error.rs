//! Error types for the game-record core.

use thiserror::Error;

use crate::tree::NodeId;
use crate::validator::IllegalMove;

/// Main error type for tree, model and edit-history operations.
///
/// Illegal moves are not errors at the model level (see
/// [`MoveSubmitResult`](crate::model::MoveSubmitResult)); they only surface
/// here when an edit object cannot perform its first application.
#[derive(Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum Error {
    #[error("parent node {parent} is not reachable from the root")]
    DetachedParent { parent: NodeId },

    #[error("the root node cannot be removed")]
    RootRemoval,

    #[error("cannot re-insert: intended parent {parent} is no longer part of the tree")]
    StaleParent { parent: NodeId },

    #[error("node {node} does not exist")]
    UnknownNode { node: NodeId },

    #[error("node {node} is not reachable from the root")]
    NotReachable { node: NodeId },

    #[error("node {node} is already attached to the tree")]
    AlreadyAttached { node: NodeId },

    #[error("point ({x}, {y}) is outside the {width}x{height} board")]
    PointOutOfBounds {
        x: usize,
        y: usize,
        width: usize,
        height: usize,
    },

    #[error("invalid board size {width}x{height}")]
    InvalidBoardSize { width: usize, height: usize },

    #[error("unknown rule set '{name}'")]
    UnknownRules { name: String },

    #[error("edit has not been performed")]
    NotPerformed,

    #[error("edit has already been performed")]
    AlreadyPerformed,

    #[error("edit cannot be rolled back directly; perform its re-insertion instead")]
    RollbackUnsupported,

    #[error("illegal move: {0}")]
    IllegalMove(#[from] IllegalMove),
}

impl Error {
    /// True for errors that mean an edit no longer matches the tree shape.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Error::DetachedParent { .. }
                | Error::RootRemoval
                | Error::StaleParent { .. }
                | Error::UnknownNode { .. }
                | Error::NotReachable { .. }
                | Error::AlreadyAttached { .. }
        )
    }
}

/// Convenience type alias for Results using the crate's Error type
pub type Result<T> = std::result::Result<T, Error>;
