//! Undoable edits.
//!
//! Each [`UndoableEdit`] captures one user-visible action with enough state
//! to perform it and roll it back, once in each direction at a time. Edits
//! hold node handles, never references, and re-check reachability before
//! touching the tree shape.
//!
//! A node removal is not rolled back directly: its undo is the paired
//! [`ReinsertNodeEdit`], which fails with [`Error::StaleParent`] when the
//! removed node's parent has itself left the tree in the meantime.

use std::fmt;

use tracing::{debug, warn};

use crate::board::{Color, Point};
use crate::error::{Error, Result};
use crate::model::GameModel;
use crate::tree::{Marker, NodeId};
use crate::validator::Move;

/// Groups edits made by one gesture so history can merge them into one step.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct SessionId(u64);

impl SessionId {
    pub fn new(raw: u64) -> Self {
        SessionId(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.0)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum EditState {
    Pending,
    Performed,
    RolledBack,
}

/// What a play-move edit submits on its first perform.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MoveRequest {
    /// A stone for the side to move.
    Stone(Point),
    /// A move with an explicit colour.
    Move(Move),
    /// A pass for the side to move.
    Pass,
    /// Setup stones (or erasures) below the current node.
    Setup(Vec<(Point, Option<Color>)>),
}

// =============================================================================
// Play move
// =============================================================================

/// Adds a node below the current node.
///
/// The first perform validates and creates the node; later performs put the
/// very same node back under the same parent without validating again.
#[derive(Clone, Debug)]
pub struct PlayMoveEdit {
    request: MoveRequest,
    parent: Option<NodeId>,
    node: Option<NodeId>,
    state: EditState,
}

impl PlayMoveEdit {
    pub fn new(request: MoveRequest) -> Self {
        Self {
            request,
            parent: None,
            node: None,
            state: EditState::Pending,
        }
    }

    pub fn request(&self) -> &MoveRequest {
        &self.request
    }

    /// The node created by the first perform.
    pub fn node(&self) -> Option<NodeId> {
        self.node
    }

    /// The node that was current when the edit was first performed.
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    fn perform(&mut self, model: &mut GameModel) -> Result<()> {
        match (self.state, self.parent, self.node) {
            (EditState::Performed, ..) => Err(Error::AlreadyPerformed),
            (EditState::RolledBack, Some(parent), Some(node)) => {
                if !model.tree().is_reachable(parent) {
                    return Err(Error::StaleParent { parent });
                }
                model.submit_node(parent, node)?;
                self.state = EditState::Performed;
                Ok(())
            }
            _ => {
                let parent = model.current();
                let result = match &self.request {
                    MoveRequest::Stone((x, y)) => model.submit_move(*x, *y)?,
                    MoveRequest::Move(mv) => model.submit(*mv)?,
                    MoveRequest::Pass => model.submit_pass()?,
                    MoveRequest::Setup(stones) => model.submit_setup(stones.clone())?,
                };
                let node = result.outcome?;
                self.parent = Some(parent);
                self.node = Some(node);
                self.state = EditState::Performed;
                Ok(())
            }
        }
    }

    fn rollback(&mut self, model: &mut GameModel) -> Result<()> {
        let (EditState::Performed, Some(parent), Some(node)) = (self.state, self.parent, self.node)
        else {
            return Err(Error::NotPerformed);
        };
        model.remove_node_subtree(node)?;
        model.set_current_node(parent)?;
        self.state = EditState::RolledBack;
        Ok(())
    }
}

// =============================================================================
// Remove node
// =============================================================================

/// Detaches a node and its subtree.
#[derive(Clone, Debug)]
pub struct RemoveNodeEdit {
    target: NodeId,
    parent: Option<NodeId>,
    index: usize,
    state: EditState,
}

impl RemoveNodeEdit {
    pub fn new(target: NodeId) -> Self {
        Self {
            target,
            parent: None,
            index: 0,
            state: EditState::Pending,
        }
    }

    pub fn target(&self) -> NodeId {
        self.target
    }

    fn perform(&mut self, model: &mut GameModel) -> Result<()> {
        if self.state == EditState::Performed {
            return Err(Error::AlreadyPerformed);
        }
        let parent = model.node(self.target)?.parent();
        self.index = model.remove_node_subtree(self.target)?;
        self.parent = parent;
        self.state = EditState::Performed;
        Ok(())
    }

    /// The action that puts the removed subtree back where it was.
    pub fn reinsertion(&self) -> Result<ReinsertNodeEdit> {
        match (self.state, self.parent) {
            (EditState::Performed, Some(parent)) => {
                Ok(ReinsertNodeEdit::new(parent, self.target, self.index))
            }
            _ => Err(Error::NotPerformed),
        }
    }

    fn restore(&mut self, model: &mut GameModel) -> Result<()> {
        self.reinsertion()?.perform(model)?;
        self.state = EditState::RolledBack;
        Ok(())
    }
}

/// Re-inserts a detached subtree under a parent that must still be in the tree.
#[derive(Clone, Debug)]
pub struct ReinsertNodeEdit {
    parent: NodeId,
    node: NodeId,
    index: usize,
    state: EditState,
}

impl ReinsertNodeEdit {
    pub fn new(parent: NodeId, node: NodeId, index: usize) -> Self {
        Self {
            parent,
            node,
            index,
            state: EditState::Pending,
        }
    }

    pub fn parent(&self) -> NodeId {
        self.parent
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    fn perform(&mut self, model: &mut GameModel) -> Result<()> {
        if self.state == EditState::Performed {
            return Err(Error::AlreadyPerformed);
        }
        let parent = self.parent;
        if !model.tree().is_reachable(parent) {
            warn!(node = %self.node, parent = %parent, "re-insertion target left the tree");
            return Err(Error::StaleParent { parent });
        }
        model
            .submit_node_at(parent, self.node, self.index)
            .map_err(|e| match e {
                Error::DetachedParent { parent } => Error::StaleParent { parent },
                other => other,
            })?;
        self.state = EditState::Performed;
        Ok(())
    }

    fn rollback(&mut self, model: &mut GameModel) -> Result<()> {
        if self.state != EditState::Performed {
            return Err(Error::NotPerformed);
        }
        model.remove_node_subtree(self.node)?;
        self.state = EditState::RolledBack;
        Ok(())
    }
}

// =============================================================================
// Annotations and comments
// =============================================================================

/// One marker change on one point.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MarkerChange {
    pub point: Point,
    /// What the point held before the change; filled in when performed.
    pub before: Option<Marker>,
    pub after: Option<Marker>,
}

/// Adds or removes markers on one node.
///
/// Same-session edits on the same node merge into one, whose rollback undoes
/// every change in reverse order.
#[derive(Clone, Debug)]
pub struct AnnotationEdit {
    node: NodeId,
    session: SessionId,
    changes: Vec<MarkerChange>,
    state: EditState,
}

impl AnnotationEdit {
    pub fn add(node: NodeId, point: Point, marker: Marker, session: SessionId) -> Self {
        Self::with_change(node, point, Some(marker), session)
    }

    pub fn remove(node: NodeId, point: Point, session: SessionId) -> Self {
        Self::with_change(node, point, None, session)
    }

    fn with_change(node: NodeId, point: Point, after: Option<Marker>, session: SessionId) -> Self {
        Self {
            node,
            session,
            changes: vec![MarkerChange {
                point,
                before: None,
                after,
            }],
            state: EditState::Pending,
        }
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn session(&self) -> SessionId {
        self.session
    }

    pub fn changes(&self) -> &[MarkerChange] {
        &self.changes
    }

    fn perform(&mut self, model: &mut GameModel) -> Result<()> {
        if self.state == EditState::Performed {
            return Err(Error::AlreadyPerformed);
        }
        let board = model.position(self.node)?;
        if let Some(c) = self.changes.iter().find(|c| !board.contains(c.point)) {
            return Err(Error::PointOutOfBounds {
                x: c.point.0,
                y: c.point.1,
                width: board.width(),
                height: board.height(),
            });
        }
        for c in &mut self.changes {
            c.before = model.set_marker(self.node, c.point, c.after.clone())?;
        }
        self.state = EditState::Performed;
        Ok(())
    }

    fn rollback(&mut self, model: &mut GameModel) -> Result<()> {
        if self.state != EditState::Performed {
            return Err(Error::NotPerformed);
        }
        for c in self.changes.iter().rev() {
            model.set_marker(self.node, c.point, c.before.clone())?;
        }
        self.state = EditState::RolledBack;
        Ok(())
    }

    fn can_absorb(&self, other: &AnnotationEdit) -> bool {
        self.node == other.node
            && self.session == other.session
            && self.state == EditState::Performed
            && other.state == EditState::Performed
    }
}

/// Replaces a node's comment. Merges like [`AnnotationEdit`].
#[derive(Clone, Debug)]
pub struct CommentEdit {
    node: NodeId,
    session: SessionId,
    text: String,
    previous: Option<String>,
    state: EditState,
}

impl CommentEdit {
    pub fn new(node: NodeId, text: impl Into<String>, session: SessionId) -> Self {
        Self {
            node,
            session,
            text: text.into(),
            previous: None,
            state: EditState::Pending,
        }
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    fn perform(&mut self, model: &mut GameModel) -> Result<()> {
        if self.state == EditState::Performed {
            return Err(Error::AlreadyPerformed);
        }
        let previous = model.set_comment(self.node, self.text.clone())?;
        // A redo must not overwrite the text the first perform replaced
        self.previous.get_or_insert(previous);
        self.state = EditState::Performed;
        Ok(())
    }

    fn rollback(&mut self, model: &mut GameModel) -> Result<()> {
        if self.state != EditState::Performed {
            return Err(Error::NotPerformed);
        }
        model.set_comment(self.node, self.previous.clone().unwrap_or_default())?;
        self.state = EditState::RolledBack;
        Ok(())
    }

    fn can_absorb(&self, other: &CommentEdit) -> bool {
        self.node == other.node
            && self.session == other.session
            && self.state == EditState::Performed
            && other.state == EditState::Performed
    }
}

// =============================================================================
// Edit variants
// =============================================================================

/// The closed set of edits the history records.
#[derive(Clone, Debug)]
pub enum UndoableEdit {
    PlayMove(PlayMoveEdit),
    RemoveNode(RemoveNodeEdit),
    Reinsert(ReinsertNodeEdit),
    Annotate(AnnotationEdit),
    Comment(CommentEdit),
}

impl UndoableEdit {
    /// A stone for the side to move at `(x, y)`.
    pub fn play(x: usize, y: usize) -> Self {
        UndoableEdit::PlayMove(PlayMoveEdit::new(MoveRequest::Stone((x, y))))
    }

    pub fn play_move(mv: Move) -> Self {
        UndoableEdit::PlayMove(PlayMoveEdit::new(MoveRequest::Move(mv)))
    }

    pub fn pass() -> Self {
        UndoableEdit::PlayMove(PlayMoveEdit::new(MoveRequest::Pass))
    }

    pub fn setup(stones: Vec<(Point, Option<Color>)>) -> Self {
        UndoableEdit::PlayMove(PlayMoveEdit::new(MoveRequest::Setup(stones)))
    }

    pub fn remove(node: NodeId) -> Self {
        UndoableEdit::RemoveNode(RemoveNodeEdit::new(node))
    }

    pub fn add_marker(node: NodeId, point: Point, marker: Marker, session: SessionId) -> Self {
        UndoableEdit::Annotate(AnnotationEdit::add(node, point, marker, session))
    }

    pub fn remove_marker(node: NodeId, point: Point, session: SessionId) -> Self {
        UndoableEdit::Annotate(AnnotationEdit::remove(node, point, session))
    }

    pub fn comment(node: NodeId, text: impl Into<String>, session: SessionId) -> Self {
        UndoableEdit::Comment(CommentEdit::new(node, text, session))
    }

    /// Apply the edit. A second perform after a rollback is a redo.
    pub fn perform(&mut self, model: &mut GameModel) -> Result<()> {
        let result = match self {
            UndoableEdit::PlayMove(e) => e.perform(model),
            UndoableEdit::RemoveNode(e) => e.perform(model),
            UndoableEdit::Reinsert(e) => e.perform(model),
            UndoableEdit::Annotate(e) => e.perform(model),
            UndoableEdit::Comment(e) => e.perform(model),
        };
        if result.is_ok() {
            debug!(edit = %self, "performed edit");
        }
        result
    }

    /// Revert a performed edit. Node removals refuse; see [`UndoableEdit::undo`].
    pub fn rollback(&mut self, model: &mut GameModel) -> Result<()> {
        let result = match self {
            UndoableEdit::PlayMove(e) => e.rollback(model),
            UndoableEdit::RemoveNode(_) => Err(Error::RollbackUnsupported),
            UndoableEdit::Reinsert(e) => e.rollback(model),
            UndoableEdit::Annotate(e) => e.rollback(model),
            UndoableEdit::Comment(e) => e.rollback(model),
        };
        if result.is_ok() {
            debug!(edit = %self, "rolled back edit");
        }
        result
    }

    /// Revert the edit the way history does: a rollback, or for a node
    /// removal, its paired re-insertion.
    pub fn undo(&mut self, model: &mut GameModel) -> Result<()> {
        match self {
            UndoableEdit::RemoveNode(e) => {
                e.restore(model)?;
                debug!(node = %e.target, "restored removed subtree");
                Ok(())
            }
            other => other.rollback(model),
        }
    }

    pub fn can_rollback(&self) -> bool {
        match self {
            UndoableEdit::RemoveNode(_) => false,
            other => other.is_performed(),
        }
    }

    pub fn is_performed(&self) -> bool {
        let state = match self {
            UndoableEdit::PlayMove(e) => e.state,
            UndoableEdit::RemoveNode(e) => e.state,
            UndoableEdit::Reinsert(e) => e.state,
            UndoableEdit::Annotate(e) => e.state,
            UndoableEdit::Comment(e) => e.state,
        };
        state == EditState::Performed
    }

    pub fn session(&self) -> Option<SessionId> {
        match self {
            UndoableEdit::Annotate(e) => Some(e.session),
            UndoableEdit::Comment(e) => Some(e.session),
            _ => None,
        }
    }

    /// Every node this edit may need to touch again.
    pub fn referenced_nodes(&self) -> Vec<NodeId> {
        match self {
            UndoableEdit::PlayMove(e) => e.parent.into_iter().chain(e.node).collect(),
            UndoableEdit::RemoveNode(e) => std::iter::once(e.target).chain(e.parent).collect(),
            UndoableEdit::Reinsert(e) => vec![e.parent, e.node],
            UndoableEdit::Annotate(e) => vec![e.node],
            UndoableEdit::Comment(e) => vec![e.node],
        }
    }

    /// Fold `other` into `self` if both are performed same-session edits of
    /// the same kind on the same node; otherwise hand `other` back.
    pub fn try_merge(&mut self, other: UndoableEdit) -> std::result::Result<(), UndoableEdit> {
        match (self, other) {
            (UndoableEdit::Annotate(a), UndoableEdit::Annotate(b)) if a.can_absorb(&b) => {
                a.changes.extend(b.changes);
                Ok(())
            }
            (UndoableEdit::Comment(a), UndoableEdit::Comment(b)) if a.can_absorb(&b) => {
                a.text = b.text;
                Ok(())
            }
            (_, other) => Err(other),
        }
    }
}

impl fmt::Display for UndoableEdit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UndoableEdit::PlayMove(e) => match &e.request {
                MoveRequest::Stone((x, y)) => write!(f, "play ({x}, {y})"),
                MoveRequest::Move(Move::Play { point, color }) => {
                    write!(f, "play {color} ({}, {})", point.0, point.1)
                }
                MoveRequest::Move(Move::Pass(color)) => write!(f, "pass {color}"),
                MoveRequest::Pass => f.write_str("pass"),
                MoveRequest::Setup(stones) => write!(f, "setup {} points", stones.len()),
            },
            UndoableEdit::RemoveNode(e) => write!(f, "remove node {}", e.target),
            UndoableEdit::Reinsert(e) => write!(f, "re-insert node {}", e.node),
            UndoableEdit::Annotate(e) => {
                write!(f, "annotate node {} ({} changes)", e.node, e.changes.len())
            }
            UndoableEdit::Comment(e) => write!(f, "comment node {}", e.node),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::GameConfig;

    fn model() -> GameModel {
        GameModel::new(GameConfig::new().with_size(9)).unwrap()
    }

    #[test]
    fn test_rollback_before_perform_is_rejected() {
        let mut m = model();
        let root = m.root();
        let s = SessionId::new(1);
        for mut edit in [
            UndoableEdit::play(0, 0),
            UndoableEdit::add_marker(root, (0, 0), Marker::Triangle, s),
            UndoableEdit::comment(root, "x", s),
        ] {
            assert!(!edit.can_rollback());
            assert_eq!(edit.rollback(&mut m), Err(Error::NotPerformed));
        }
    }

    #[test]
    fn test_play_move_round_trip_keeps_identity() {
        let mut m = model();
        let root = m.root();
        let mut edit = UndoableEdit::play(3, 3);
        edit.perform(&mut m).unwrap();
        let UndoableEdit::PlayMove(ref pm) = edit else {
            unreachable!()
        };
        let node = pm.node().unwrap();
        let position = m.position(node).unwrap().clone();
        assert_eq!(edit.perform(&mut m), Err(Error::AlreadyPerformed));

        edit.rollback(&mut m).unwrap();
        assert_eq!(m.current(), root);
        assert_eq!(m.tree().node_count(), 1);

        edit.perform(&mut m).unwrap();
        assert_eq!(m.current(), node);
        assert_eq!(m.position(node).unwrap(), &position);
        assert_eq!(m.tree().node_count(), 2);
    }

    #[test]
    fn test_illegal_first_perform_fails() {
        let mut m = model();
        let mut first = UndoableEdit::play(3, 3);
        first.perform(&mut m).unwrap();
        m.go_to_root();
        let mut again = UndoableEdit::play_move(Move::Play {
            point: (9, 9),
            color: Color::Black,
        });
        assert_eq!(
            again.perform(&mut m),
            Err(Error::IllegalMove(crate::validator::IllegalMove::OutOfBounds))
        );
        assert!(!again.is_performed());
    }

    #[test]
    fn test_remove_node_uses_reinsertion() {
        let mut m = model();
        let root = m.root();
        let mut play = UndoableEdit::play(3, 3);
        play.perform(&mut m).unwrap();
        let node = m.current();

        let mut remove = UndoableEdit::remove(node);
        remove.perform(&mut m).unwrap();
        assert!(!remove.can_rollback());
        assert_eq!(remove.rollback(&mut m), Err(Error::RollbackUnsupported));
        assert_eq!(m.current(), root);

        remove.undo(&mut m).unwrap();
        assert!(m.tree().is_reachable(node));
        assert_eq!(m.current(), node);

        // Redo removes again
        remove.perform(&mut m).unwrap();
        assert!(!m.tree().is_reachable(node));
    }

    #[test]
    fn test_reinsertion_under_removed_parent_is_stale() {
        let mut m = model();
        let parent = m.submit_move(0, 0).unwrap().node().unwrap();
        let child = m.submit_move(1, 1).unwrap().node().unwrap();

        let UndoableEdit::RemoveNode(mut remove) = UndoableEdit::remove(child) else {
            unreachable!()
        };
        remove.perform(&mut m).unwrap();
        m.remove_node_subtree(parent).unwrap();

        let mut reinsert = remove.reinsertion().unwrap();
        assert_eq!(reinsert.perform(&mut m), Err(Error::StaleParent { parent }));
        assert_eq!(m.tree().node_count(), 1);
        assert!(m.tree().is_reachable(m.current()));
    }

    #[test]
    fn test_remove_root_fails() {
        let mut m = model();
        let mut remove = UndoableEdit::remove(m.root());
        assert_eq!(remove.perform(&mut m), Err(Error::RootRemoval));
        assert!(!remove.is_performed());
    }

    #[test]
    fn test_annotation_merge_and_rollback() {
        let mut m = model();
        let root = m.root();
        let s = SessionId::new(7);
        let mut first = UndoableEdit::add_marker(root, (0, 0), Marker::Triangle, s);
        first.perform(&mut m).unwrap();
        for x in 1..3 {
            let mut next = UndoableEdit::add_marker(root, (x, 0), Marker::Triangle, s);
            next.perform(&mut m).unwrap();
            assert!(first.try_merge(next).is_ok());
        }
        assert_eq!(m.node(root).unwrap().markers().len(), 3);

        first.rollback(&mut m).unwrap();
        assert!(m.node(root).unwrap().markers().is_empty());

        first.perform(&mut m).unwrap();
        assert_eq!(m.node(root).unwrap().markers().len(), 3);
    }

    #[test]
    fn test_merge_rejects_other_session_or_node() {
        let mut m = model();
        let root = m.root();
        let child = m.submit_move(0, 0).unwrap().node().unwrap();
        let mut a = UndoableEdit::add_marker(root, (0, 0), Marker::Square, SessionId::new(1));
        a.perform(&mut m).unwrap();

        let mut other_session =
            UndoableEdit::add_marker(root, (1, 0), Marker::Square, SessionId::new(2));
        other_session.perform(&mut m).unwrap();
        assert!(a.try_merge(other_session).is_err());

        let mut other_node =
            UndoableEdit::add_marker(child, (1, 0), Marker::Square, SessionId::new(1));
        other_node.perform(&mut m).unwrap();
        assert!(a.try_merge(other_node).is_err());
    }

    #[test]
    fn test_replaced_marker_is_restored() {
        let mut m = model();
        let root = m.root();
        m.add_marker(root, (2, 2), Marker::Circle).unwrap();
        let mut edit = UndoableEdit::add_marker(root, (2, 2), Marker::Cross, SessionId::new(1));
        edit.perform(&mut m).unwrap();
        edit.rollback(&mut m).unwrap();
        assert_eq!(m.node(root).unwrap().marker((2, 2)), Some(&Marker::Circle));
    }

    #[test]
    fn test_comment_merge_restores_original() {
        let mut m = model();
        let root = m.root();
        m.set_comment(root, "original").unwrap();
        let s = SessionId::new(3);
        let mut first = UndoableEdit::comment(root, "dr", s);
        first.perform(&mut m).unwrap();
        let mut second = UndoableEdit::comment(root, "draft", s);
        second.perform(&mut m).unwrap();
        assert!(first.try_merge(second).is_ok());

        first.rollback(&mut m).unwrap();
        assert_eq!(m.node(root).unwrap().comment(), "original");
        first.perform(&mut m).unwrap();
        assert_eq!(m.node(root).unwrap().comment(), "draft");
    }
}
