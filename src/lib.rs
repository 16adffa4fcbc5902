//! goban-record: an editable Go game record.
//!
//! This crate keeps a tree of board positions (the main line and every
//! variation), validates moves under configurable rules, and records edits
//! in a bounded undo/redo history.
//!
//! ## Modules
//!
//! - [`constants`] - Board limits, default komi and history capacity
//! - [`board`] - Immutable-by-convention board positions, groups and scoring
//! - [`rules`] - Named rule sets (ko policy, scoring method, komi)
//! - [`validator`] - Move legality, captures, ko and superko
//! - [`tree`] - Arena-backed game tree with detachable subtrees
//! - [`model`] - Game model: current node, navigation and change events
//! - [`edit`] - Reversible edit objects (moves, removals, markers, comments)
//! - [`history`] - Linear undo/redo stack with session merging
//! - [`console`] - Line-oriented debug console
//! - [`error`] - Error types
//!
//! ## Example
//!
//! ```
//! use goban_record::edit::UndoableEdit;
//! use goban_record::history::EditHistory;
//! use goban_record::model::{GameConfig, GameModel};
//!
//! let mut model = GameModel::new(GameConfig::new().with_size(9))?;
//! let mut history = EditHistory::new();
//!
//! // Play a move and take it back
//! history.apply(&mut model, UndoableEdit::play(2, 2))?;
//! assert_eq!(model.tree().node_count(), 2);
//! history.undo(&mut model)?;
//! assert_eq!(model.current(), model.root());
//!
//! // Redo brings back the same node
//! history.redo(&mut model)?;
//! assert_eq!(model.tree().node_count(), 2);
//! # Ok::<(), goban_record::error::Error>(())
//! ```

pub mod board;
pub mod console;
pub mod constants;
pub mod edit;
pub mod error;
pub mod history;
pub mod model;
pub mod rules;
pub mod tree;
pub mod validator;
