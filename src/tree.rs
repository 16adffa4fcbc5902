//! The game tree: an arena of nodes addressed by [`NodeId`] handles.
//!
//! Each node owns its children through the arena; a node belongs to the
//! tree while its parent chain reaches the root. Removing a subtree only
//! unlinks it from its parent, so edit objects holding its handle can put it
//! back later. Slots are freed explicitly with [`GameTree::release`] once
//! nothing can re-insert the subtree; handles are never reused.

use std::collections::BTreeMap;
use std::fmt;

use tracing::trace;

use crate::board::{BoardPosition, Color, Point};
use crate::error::{Error, Result};
use crate::validator::Move;

/// Stable handle to a node in a [`GameTree`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn from_index(index: usize) -> Self {
        NodeId(index)
    }

    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A board marker attached to a point of a node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Marker {
    Triangle,
    Square,
    Circle,
    Cross,
    Label(String),
}

impl fmt::Display for Marker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Marker::Triangle => f.write_str("triangle"),
            Marker::Square => f.write_str("square"),
            Marker::Circle => f.write_str("circle"),
            Marker::Cross => f.write_str("cross"),
            Marker::Label(text) => write!(f, "label:{text}"),
        }
    }
}

/// What produced a node from its parent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NodeAction {
    Move(Move),
    /// Stones placed (or erased, with `None`) without capture resolution.
    Setup(Vec<(Point, Option<Color>)>),
}

/// One point in the game's history.
///
/// The action and board position are fixed at creation; only the comment
/// and markers change afterwards.
#[derive(Clone, Debug)]
pub struct GameNode {
    id: NodeId,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    action: Option<NodeAction>,
    position: BoardPosition,
    comment: String,
    markers: BTreeMap<Point, Marker>,
    move_number: u32,
    to_play: Color,
}

impl GameNode {
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// The parent, or `None` for the root and for detached subtrees.
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Children in variation order; the first child continues the main line.
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// The action that produced this node, or `None` for the root.
    pub fn action(&self) -> Option<&NodeAction> {
        self.action.as_ref()
    }

    /// The move that produced this node, if it was a move.
    pub fn last_move(&self) -> Option<Move> {
        match self.action {
            Some(NodeAction::Move(mv)) => Some(mv),
            _ => None,
        }
    }

    pub fn position(&self) -> &BoardPosition {
        &self.position
    }

    pub fn comment(&self) -> &str {
        &self.comment
    }

    pub fn markers(&self) -> &BTreeMap<Point, Marker> {
        &self.markers
    }

    pub fn marker(&self, pt: Point) -> Option<&Marker> {
        self.markers.get(&pt)
    }

    /// Number of moves (passes included) from the root to this node.
    pub fn move_number(&self) -> u32 {
        self.move_number
    }

    /// The colour whose turn it is after this node.
    pub fn to_play(&self) -> Color {
        self.to_play
    }
}

/// Walks from a node up to its topmost ancestor, the node itself first.
pub struct Ancestors<'a> {
    tree: &'a GameTree,
    next: Option<NodeId>,
}

impl Iterator for Ancestors<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.next?;
        self.next = self.tree.get(id).and_then(|n| n.parent);
        Some(id)
    }
}

/// Arena-backed tree of [`GameNode`]s.
#[derive(Clone, Debug)]
pub struct GameTree {
    nodes: Vec<Option<GameNode>>,
    root: NodeId,
}

impl GameTree {
    /// A tree holding only a root with the given starting position.
    pub fn new(position: BoardPosition) -> Self {
        let root = NodeId(0);
        Self {
            nodes: vec![Some(GameNode {
                id: root,
                parent: None,
                children: Vec::new(),
                action: None,
                position,
                comment: String::new(),
                markers: BTreeMap::new(),
                move_number: 0,
                to_play: Color::Black,
            })],
            root,
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// The node behind `id`, if its slot has not been released.
    pub fn get(&self, id: NodeId) -> Option<&GameNode> {
        self.nodes.get(id.0).and_then(Option::as_ref)
    }

    pub fn node(&self, id: NodeId) -> Result<&GameNode> {
        self.get(id).ok_or(Error::UnknownNode { node: id })
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut GameNode> {
        self.nodes
            .get_mut(id.0)
            .and_then(Option::as_mut)
            .ok_or(Error::UnknownNode { node: id })
    }

    pub fn ancestors(&self, id: NodeId) -> Ancestors<'_> {
        Ancestors {
            tree: self,
            next: self.get(id).map(|_| id),
        }
    }

    /// True if following parent links from `id` ends at the root.
    pub fn is_reachable(&self, id: NodeId) -> bool {
        self.ancestors(id).last() == Some(self.root)
    }

    /// True if `ancestor` is in the tree and `node` lies in its subtree
    /// (or is `ancestor` itself).
    pub fn is_continuation_of(&self, ancestor: NodeId, node: NodeId) -> bool {
        self.is_reachable(ancestor)
            && self.is_reachable(node)
            && self.ancestors(node).any(|a| a == ancestor)
    }

    /// Append a new node as the last child of `parent`.
    pub fn create_child(
        &mut self,
        parent: NodeId,
        action: NodeAction,
        position: BoardPosition,
    ) -> Result<NodeId> {
        let p = self.node(parent)?;
        if !self.is_reachable(parent) {
            return Err(Error::DetachedParent { parent });
        }
        let (move_number, to_play) = match &action {
            NodeAction::Move(mv) => (p.move_number + 1, mv.color().opponent()),
            NodeAction::Setup(_) => (p.move_number, p.to_play),
        };

        let id = NodeId(self.nodes.len());
        self.nodes.push(Some(GameNode {
            id,
            parent: Some(parent),
            children: Vec::new(),
            action: Some(action),
            position,
            comment: String::new(),
            markers: BTreeMap::new(),
            move_number,
            to_play,
        }));
        self.node_mut(parent)?.children.push(id);
        trace!(node = %id, parent = %parent, "created node");
        Ok(id)
    }

    /// Unlink `id` (and with it its whole subtree) from its parent.
    ///
    /// Returns the index `id` had among its siblings.
    pub fn remove_subtree(&mut self, id: NodeId) -> Result<usize> {
        if id == self.root {
            return Err(Error::RootRemoval);
        }
        let node = self.node(id)?;
        let parent = match node.parent {
            Some(parent) if self.is_reachable(parent) => parent,
            _ => return Err(Error::NotReachable { node: id }),
        };

        let siblings = &mut self.node_mut(parent)?.children;
        let index = siblings
            .iter()
            .position(|&c| c == id)
            .ok_or(Error::NotReachable { node: id })?;
        siblings.remove(index);
        self.node_mut(id)?.parent = None;
        trace!(node = %id, parent = %parent, index, "detached subtree");
        Ok(index)
    }

    /// Re-insert a detached subtree as the last child of `parent`.
    pub fn reattach_subtree(&mut self, parent: NodeId, id: NodeId) -> Result<()> {
        self.reattach_subtree_at(parent, id, usize::MAX)
    }

    /// Re-insert a detached subtree among `parent`'s children at `index`
    /// (clamped to the number of children).
    pub fn reattach_subtree_at(&mut self, parent: NodeId, id: NodeId, index: usize) -> Result<()> {
        let node = self.node(id)?;
        if id == self.root || node.parent.is_some() {
            return Err(Error::AlreadyAttached { node: id });
        }
        self.node(parent)?;
        if !self.is_reachable(parent) {
            return Err(Error::DetachedParent { parent });
        }

        let siblings = &mut self.node_mut(parent)?.children;
        let index = index.min(siblings.len());
        siblings.insert(index, id);
        self.node_mut(id)?.parent = Some(parent);
        trace!(node = %id, parent = %parent, index, "reattached subtree");
        Ok(())
    }

    /// Replace a node's comment, returning the previous text.
    pub fn set_comment(&mut self, id: NodeId, text: impl Into<String>) -> Result<String> {
        let node = self.node_mut(id)?;
        Ok(std::mem::replace(&mut node.comment, text.into()))
    }

    /// Put `marker` on `pt` (or clear it with `None`), returning what was there.
    pub fn set_marker(&mut self, id: NodeId, pt: Point, marker: Option<Marker>) -> Result<Option<Marker>> {
        let node = self.node_mut(id)?;
        let board = &node.position;
        if !board.contains(pt) {
            return Err(Error::PointOutOfBounds {
                x: pt.0,
                y: pt.1,
                width: board.width(),
                height: board.height(),
            });
        }
        Ok(match marker {
            Some(m) => node.markers.insert(pt, m),
            None => node.markers.remove(&pt),
        })
    }

    /// `id` and all its descendants in depth-first pre-order.
    pub fn subtree(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(n) = stack.pop() {
            let Some(node) = self.get(n) else {
                continue;
            };
            out.push(n);
            stack.extend(node.children.iter().rev());
        }
        out
    }

    /// Number of nodes reachable from the root.
    pub fn node_count(&self) -> usize {
        self.subtree(self.root).len()
    }

    /// Free the slots of a detached subtree.
    ///
    /// Does nothing (and returns an empty list) for attached or unknown nodes.
    pub fn release(&mut self, id: NodeId) -> Vec<NodeId> {
        match self.get(id) {
            Some(node) if id != self.root && node.parent.is_none() => {}
            _ => return Vec::new(),
        }
        let freed = self.subtree(id);
        for n in &freed {
            self.nodes[n.0] = None;
        }
        trace!(node = %id, count = freed.len(), "released subtree");
        freed
    }

    /// Nodes from the root down to `id`, both included.
    pub fn path_to(&self, id: NodeId) -> Vec<NodeId> {
        let mut path: Vec<NodeId> = self.ancestors(id).collect();
        path.reverse();
        path
    }

    /// Number of edges between the root and `id`.
    pub fn depth(&self, id: NodeId) -> usize {
        self.ancestors(id).count().saturating_sub(1)
    }

    /// The root followed by first children down to a leaf.
    pub fn main_line(&self) -> Vec<NodeId> {
        let mut line = vec![self.root];
        let mut cur = self.root;
        while let Some(&next) = self.get(cur).and_then(|n| n.children.first()) {
            line.push(next);
            cur = next;
        }
        line
    }

    /// True if `id` is reachable and every step from the root takes the first child.
    pub fn is_on_main_line(&self, id: NodeId) -> bool {
        if !self.is_reachable(id) {
            return false;
        }
        self.ancestors(id).all(|n| match self.get(n).and_then(|node| node.parent) {
            Some(p) => self.get(p).and_then(|pn| pn.children.first()) == Some(&n),
            None => true,
        })
    }
}
