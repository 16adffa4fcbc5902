//! The game model: a game tree, a cursor into it, and the mutation API.
//!
//! Every mutation runs to completion and notifies listeners synchronously
//! before returning, so a listener always observes a consistent tree.
//! Illegal moves come back as values inside [`MoveSubmitResult`]; structural
//! problems (a detached parent, removing the root, unknown handles) are
//! returned as [`Error`]s.

use std::collections::HashMap;

use tracing::debug;

use crate::board::{BoardPosition, Color, Point, Score};
use crate::constants::{DEFAULT_BOARD_SIZE, MAX_BOARD_SIZE, MIN_BOARD_SIZE};
use crate::error::{Error, Result};
use crate::rules::RuleSet;
use crate::tree::{GameNode, GameTree, Marker, NodeAction, NodeId};
use crate::validator::{IllegalMove, Move, apply_setup, validate_in_history};

/// Board dimensions and rules a model is created with.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct GameConfig {
    pub width: usize,
    pub height: usize,
    pub rules: RuleSet,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            width: DEFAULT_BOARD_SIZE,
            height: DEFAULT_BOARD_SIZE,
            rules: RuleSet::default(),
        }
    }
}

impl GameConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a square board.
    pub fn with_size(self, size: usize) -> Self {
        self.with_dimensions(size, size)
    }

    pub fn with_dimensions(mut self, width: usize, height: usize) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_rules(mut self, rules: RuleSet) -> Self {
        self.rules = rules;
        self
    }

    pub fn with_komi(mut self, komi: f32) -> Self {
        self.rules.komi = komi;
        self
    }

    /// Check both board dimensions are within the supported range.
    pub fn validate(&self) -> Result<()> {
        let valid = MIN_BOARD_SIZE..=MAX_BOARD_SIZE;
        if !valid.contains(&self.width) || !valid.contains(&self.height) {
            return Err(Error::InvalidBoardSize {
                width: self.width,
                height: self.height,
            });
        }
        Ok(())
    }
}

/// Change notifications delivered to model listeners.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GameEvent {
    /// The cursor moved.
    CurrentNodeChanged { previous: NodeId, current: NodeId },
    /// Children were added under or removed from `node`.
    SubtreeModified { node: NodeId },
    /// A node's comment or markers changed.
    NodeUpdated { node: NodeId },
}

/// Handle returned by [`GameModel::add_listener`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Box<dyn FnMut(&GameEvent)>;

/// Result of submitting a move to the model.
#[derive(Clone, Debug, PartialEq)]
pub struct MoveSubmitResult {
    /// The new node, or why the move was rejected.
    pub outcome: std::result::Result<NodeId, IllegalMove>,
    /// Stones taken by the move.
    pub captured: Vec<Point>,
}

impl MoveSubmitResult {
    fn legal(node: NodeId, captured: Vec<Point>) -> Self {
        Self {
            outcome: Ok(node),
            captured,
        }
    }

    fn illegal(reason: IllegalMove) -> Self {
        Self {
            outcome: Err(reason),
            captured: Vec::new(),
        }
    }

    pub fn is_legal(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn node(&self) -> Option<NodeId> {
        self.outcome.ok()
    }

    pub fn validation(&self) -> std::result::Result<(), IllegalMove> {
        self.outcome.map(|_| ())
    }
}

/// Owns the game tree and tracks the current node.
pub struct GameModel {
    tree: GameTree,
    current: NodeId,
    width: usize,
    height: usize,
    rules: RuleSet,
    /// Child last visited from each node, followed by [`GameModel::step_forward`].
    preferred_child: HashMap<NodeId, NodeId>,
    listeners: Vec<(ListenerId, Listener)>,
    next_listener: u64,
}

impl GameModel {
    pub fn new(config: GameConfig) -> Result<Self> {
        config.validate()?;
        let board = BoardPosition::new(config.width, config.height)?;
        let tree = GameTree::new(board);
        let current = tree.root();
        Ok(Self {
            tree,
            current,
            width: config.width,
            height: config.height,
            rules: config.rules,
            preferred_child: HashMap::new(),
            listeners: Vec::new(),
            next_listener: 0,
        })
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    pub fn tree(&self) -> &GameTree {
        &self.tree
    }

    pub fn root(&self) -> NodeId {
        self.tree.root()
    }

    pub fn current(&self) -> NodeId {
        self.current
    }

    pub fn node(&self, id: NodeId) -> Result<&GameNode> {
        self.tree.node(id)
    }

    pub fn current_node(&self) -> Result<&GameNode> {
        self.tree.node(self.current)
    }

    pub fn position(&self, id: NodeId) -> Result<&BoardPosition> {
        self.tree.node(id).map(GameNode::position)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// The colour to move at the current node.
    pub fn to_play(&self) -> Color {
        self.tree
            .get(self.current)
            .map_or(Color::Black, GameNode::to_play)
    }

    /// Children of the current node, in variation order.
    pub fn variations(&self) -> &[NodeId] {
        match self.tree.get(self.current) {
            Some(node) => node.children(),
            None => &[],
        }
    }

    pub fn is_continuation_of(&self, ancestor: NodeId, node: NodeId) -> bool {
        self.tree.is_continuation_of(ancestor, node)
    }

    /// Score of the current position under the model's rules.
    pub fn score(&self) -> Result<Score> {
        Ok(self.current_node()?.position().score(&self.rules))
    }

    // -------------------------------------------------------------------------
    // Listeners
    // -------------------------------------------------------------------------

    pub fn add_listener(&mut self, listener: impl FnMut(&GameEvent) + 'static) -> ListenerId {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Returns false if the listener was not registered.
    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(l, _)| *l != id);
        self.listeners.len() != before
    }

    /// Drop all listeners.
    pub fn dispose(&mut self) {
        self.listeners.clear();
    }

    fn fire(&mut self, event: GameEvent) {
        debug!(?event, "game event");
        for (_, listener) in &mut self.listeners {
            listener(&event);
        }
    }

    // -------------------------------------------------------------------------
    // Moves
    // -------------------------------------------------------------------------

    /// Play a stone for the side to move at `(x, y)`.
    pub fn submit_move(&mut self, x: usize, y: usize) -> Result<MoveSubmitResult> {
        let color = self.to_play();
        self.submit(Move::Play {
            point: (x, y),
            color,
        })
    }

    /// Pass for the side to move.
    pub fn submit_pass(&mut self) -> Result<MoveSubmitResult> {
        let color = self.to_play();
        self.submit(Move::Pass(color))
    }

    /// Play `mv` from the current node, whichever colour it names.
    pub fn submit(&mut self, mv: Move) -> Result<MoveSubmitResult> {
        let parent = self.current;
        let node = self.tree.node(parent)?;
        let history = self
            .tree
            .ancestors(parent)
            .filter_map(|id| self.tree.get(id))
            .map(GameNode::position);

        let validated = match validate_in_history(node.position(), mv, &self.rules, history) {
            Ok(v) => v,
            Err(reason) => {
                debug!(?mv, %reason, "rejected move");
                return Ok(MoveSubmitResult::illegal(reason));
            }
        };

        let id = self
            .tree
            .create_child(parent, NodeAction::Move(mv), validated.position)?;
        debug!(node = %id, ?mv, captured = validated.captured.len(), "played move");
        self.fire(GameEvent::SubtreeModified { node: parent });
        self.move_cursor(id);
        Ok(MoveSubmitResult::legal(id, validated.captured))
    }

    /// Add a setup node placing (or erasing) stones below the current node.
    pub fn submit_setup(&mut self, stones: Vec<(Point, Option<Color>)>) -> Result<MoveSubmitResult> {
        let parent = self.current;
        let position = match apply_setup(self.tree.node(parent)?.position(), &stones) {
            Ok(p) => p,
            Err(reason) => return Ok(MoveSubmitResult::illegal(reason)),
        };
        let id = self
            .tree
            .create_child(parent, NodeAction::Setup(stones), position)?;
        debug!(node = %id, "added setup node");
        self.fire(GameEvent::SubtreeModified { node: parent });
        self.move_cursor(id);
        Ok(MoveSubmitResult::legal(id, Vec::new()))
    }

    // -------------------------------------------------------------------------
    // Structure
    // -------------------------------------------------------------------------

    /// Re-insert a detached `node` as the last child of `parent` and make it current.
    pub fn submit_node(&mut self, parent: NodeId, node: NodeId) -> Result<()> {
        self.submit_node_at(parent, node, usize::MAX)
    }

    /// Like [`submit_node`](Self::submit_node), restoring a specific sibling index.
    pub fn submit_node_at(&mut self, parent: NodeId, node: NodeId, index: usize) -> Result<()> {
        self.tree.reattach_subtree_at(parent, node, index)?;
        debug!(node = %node, parent = %parent, "re-inserted subtree");
        self.fire(GameEvent::SubtreeModified { node: parent });
        self.move_cursor(node);
        Ok(())
    }

    /// Detach `node` and its subtree.
    ///
    /// If the current node was inside the subtree, the cursor moves to the
    /// removed node's parent. Returns the index `node` had among its siblings.
    ///
    /// The detached nodes keep their arena slots so an edit can re-insert
    /// them. [`EditHistory`](crate::history::EditHistory) frees them once no
    /// entry refers to them; callers removing nodes outside a history must
    /// call [`release_detached`](Self::release_detached) themselves.
    pub fn remove_node_subtree(&mut self, node: NodeId) -> Result<usize> {
        let parent = self.tree.node(node)?.parent();
        let held_current = self.tree.is_continuation_of(node, self.current);
        let index = self.tree.remove_subtree(node)?;

        for id in self.tree.subtree(node) {
            self.preferred_child.remove(&id);
        }
        let Some(parent) = parent else {
            return Ok(index);
        };
        if self.preferred_child.get(&parent) == Some(&node) {
            self.preferred_child.remove(&parent);
        }
        debug!(node = %node, parent = %parent, "removed subtree");
        self.fire(GameEvent::SubtreeModified { node: parent });
        if held_current {
            self.move_cursor(parent);
        }
        Ok(index)
    }

    /// Free a detached subtree's slots and forget everything keyed by them.
    pub fn release_detached(&mut self, node: NodeId) -> Vec<NodeId> {
        let freed = self.tree.release(node);
        for id in &freed {
            self.preferred_child.remove(id);
        }
        freed
    }

    // -------------------------------------------------------------------------
    // Navigation
    // -------------------------------------------------------------------------

    /// Make `node` current. Fires an event only if the cursor actually moves.
    pub fn set_current_node(&mut self, node: NodeId) -> Result<()> {
        self.tree.node(node)?;
        if !self.tree.is_reachable(node) {
            return Err(Error::NotReachable { node });
        }
        self.move_cursor(node);
        Ok(())
    }

    fn move_cursor(&mut self, node: NodeId) {
        let path = self.tree.path_to(node);
        for pair in path.windows(2) {
            self.preferred_child.insert(pair[0], pair[1]);
        }
        if node == self.current {
            return;
        }
        let previous = std::mem::replace(&mut self.current, node);
        self.fire(GameEvent::CurrentNodeChanged {
            previous,
            current: node,
        });
    }

    /// Move to the parent. Returns false at the root.
    pub fn step_back(&mut self) -> bool {
        match self.tree.get(self.current).and_then(GameNode::parent) {
            Some(parent) => {
                self.move_cursor(parent);
                true
            }
            None => false,
        }
    }

    /// Move to the last visited child, or the first child. Returns false at a leaf.
    pub fn step_forward(&mut self) -> bool {
        match self.next_child(self.current) {
            Some(child) => {
                self.move_cursor(child);
                true
            }
            None => false,
        }
    }

    pub fn go_to_root(&mut self) -> bool {
        let root = self.tree.root();
        let moved = self.current != root;
        self.move_cursor(root);
        moved
    }

    /// Step forward until a leaf is reached.
    pub fn go_to_end(&mut self) -> bool {
        let mut target = self.current;
        while let Some(child) = self.next_child(target) {
            target = child;
        }
        let moved = target != self.current;
        self.move_cursor(target);
        moved
    }

    fn next_child(&self, node: NodeId) -> Option<NodeId> {
        let children = self.tree.get(node)?.children();
        self.preferred_child
            .get(&node)
            .copied()
            .filter(|c| children.contains(c))
            .or_else(|| children.first().copied())
    }

    // -------------------------------------------------------------------------
    // Comments and markers
    // -------------------------------------------------------------------------

    /// Replace a node's comment, returning the previous text.
    pub fn set_comment(&mut self, node: NodeId, text: impl Into<String>) -> Result<String> {
        let previous = self.tree.set_comment(node, text)?;
        self.fire(GameEvent::NodeUpdated { node });
        Ok(previous)
    }

    /// Put (or with `None`, clear) a marker, returning what was on the point.
    pub fn set_marker(&mut self, node: NodeId, pt: Point, marker: Option<Marker>) -> Result<Option<Marker>> {
        let previous = self.tree.set_marker(node, pt, marker)?;
        self.fire(GameEvent::NodeUpdated { node });
        Ok(previous)
    }

    pub fn add_marker(&mut self, node: NodeId, pt: Point, marker: Marker) -> Result<Option<Marker>> {
        self.set_marker(node, pt, Some(marker))
    }

    pub fn remove_marker(&mut self, node: NodeId, pt: Point) -> Result<Option<Marker>> {
        self.set_marker(node, pt, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    use crate::rules::Rules;

    fn model(size: usize) -> GameModel {
        GameModel::new(GameConfig::new().with_size(size)).unwrap()
    }

    fn play(m: &mut GameModel, x: usize, y: usize) -> NodeId {
        m.submit_move(x, y).unwrap().node().unwrap()
    }

    #[test]
    fn test_invalid_config() {
        assert!(matches!(
            GameModel::new(GameConfig::new().with_dimensions(0, 9)),
            Err(Error::InvalidBoardSize { .. })
        ));
    }

    #[test]
    fn test_config_validate() {
        assert!(GameConfig::new().validate().is_ok());
        assert!(GameConfig::new().with_size(MAX_BOARD_SIZE).validate().is_ok());
        assert_eq!(
            GameConfig::new().with_dimensions(9, MAX_BOARD_SIZE + 1).validate(),
            Err(Error::InvalidBoardSize {
                width: 9,
                height: MAX_BOARD_SIZE + 1
            })
        );
    }

    #[test]
    fn test_direct_removal_then_release_frees_slots() {
        let mut m = model(9);
        let a = play(&mut m, 2, 2);
        let b = play(&mut m, 3, 3);
        m.remove_node_subtree(a).unwrap();
        assert!(m.tree().get(b).is_some());

        assert_eq!(m.release_detached(a), vec![a, b]);
        assert!(m.tree().get(a).is_none());
        assert!(m.tree().get(b).is_none());
        assert_eq!(m.tree().node_count(), 1);
    }

    /// Black takes a ko, both sides pass, and White retakes.
    fn ko_after_passes(rules: Rules) -> (GameModel, MoveSubmitResult) {
        let config = GameConfig::new().with_dimensions(4, 3).with_rules(rules.rule_set());
        let mut m = GameModel::new(config).unwrap();
        let mut stones = Vec::new();
        for pt in [(1, 0), (0, 1), (1, 2)] {
            stones.push((pt, Some(Color::Black)));
        }
        for pt in [(2, 0), (3, 1), (2, 2), (1, 1)] {
            stones.push((pt, Some(Color::White)));
        }
        m.submit_setup(stones).unwrap();

        let take = m.submit_move(2, 1).unwrap();
        assert_eq!(take.captured, vec![(1, 1)]);
        m.submit_pass().unwrap();
        m.submit_pass().unwrap();
        let retake = m.submit_move(1, 1).unwrap();
        (m, retake)
    }

    #[test]
    fn test_superko_sees_whole_line_of_play() {
        let (m, retake) = ko_after_passes(Rules::Chinese);
        assert_eq!(retake.outcome, Err(IllegalMove::Superko));
        assert_eq!(m.current_node().unwrap().move_number(), 3);
    }

    #[test]
    fn test_simple_ko_allows_retake_after_passes() {
        let (m, retake) = ko_after_passes(Rules::Japanese);
        assert!(retake.is_legal());
        assert_eq!(m.current_node().unwrap().position().get((2, 1)), None);
    }

    #[test]
    fn test_submit_move_advances_current() {
        let mut m = model(9);
        let root = m.root();
        let a = play(&mut m, 2, 2);
        assert_eq!(m.current(), a);
        assert_eq!(m.node(a).unwrap().parent(), Some(root));
        assert_eq!(m.to_play(), Color::White);
        assert_eq!(m.position(a).unwrap().get((2, 2)), Some(Color::Black));
    }

    #[test]
    fn test_illegal_move_leaves_tree_unchanged() {
        let mut m = model(9);
        let a = play(&mut m, 2, 2);
        let result = m.submit_move(2, 2).unwrap();
        assert_eq!(result.validation(), Err(IllegalMove::Occupied));
        assert_eq!(result.node(), None);
        assert_eq!(m.current(), a);
        assert_eq!(m.tree().node_count(), 2);
    }

    #[test]
    fn test_events_fire_synchronously() {
        let mut m = model(9);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let listener = m.add_listener(move |e| sink.borrow_mut().push(e.clone()));
        let root = m.root();
        let a = play(&mut m, 0, 0);
        assert_eq!(
            *seen.borrow(),
            vec![
                GameEvent::SubtreeModified { node: root },
                GameEvent::CurrentNodeChanged {
                    previous: root,
                    current: a
                },
            ]
        );

        // No event when the cursor stays put
        seen.borrow_mut().clear();
        m.set_current_node(a).unwrap();
        assert!(seen.borrow().is_empty());

        assert!(m.remove_listener(listener));
        m.step_back();
        assert!(seen.borrow().is_empty());
    }

    #[test]
    fn test_remove_ancestor_of_current_resets_cursor() {
        let mut m = model(9);
        let root = m.root();
        let a = play(&mut m, 0, 0);
        let _b = play(&mut m, 1, 1);
        let c = play(&mut m, 2, 2);
        m.remove_node_subtree(a).unwrap();
        assert_eq!(m.current(), root);
        assert!(!m.tree().is_reachable(c));
        assert_eq!(m.tree().node_count(), 1);
    }

    #[test]
    fn test_remove_sibling_keeps_cursor() {
        let mut m = model(9);
        let root = m.root();
        let a = play(&mut m, 0, 0);
        m.set_current_node(root).unwrap();
        let b = play(&mut m, 1, 1);
        m.remove_node_subtree(a).unwrap();
        assert_eq!(m.current(), b);
    }

    #[test]
    fn test_set_current_rejects_detached() {
        let mut m = model(9);
        let a = play(&mut m, 0, 0);
        m.remove_node_subtree(a).unwrap();
        assert_eq!(m.set_current_node(a), Err(Error::NotReachable { node: a }));
    }

    #[test]
    fn test_step_forward_follows_last_visited_variation() {
        let mut m = model(9);
        let root = m.root();
        let _main = play(&mut m, 0, 0);
        m.go_to_root();
        let side = play(&mut m, 4, 4);
        let side_reply = play(&mut m, 5, 5);
        assert!(m.go_to_root());
        assert!(m.step_forward());
        assert_eq!(m.current(), side);
        assert!(m.go_to_end());
        assert_eq!(m.current(), side_reply);
        assert!(!m.step_forward());
        assert!(m.step_back());
        assert!(m.step_back());
        assert_eq!(m.current(), root);
        assert!(!m.step_back());
    }

    #[test]
    fn test_pass_and_setup() {
        let mut m = model(5);
        let p = m.submit_pass().unwrap().node().unwrap();
        assert_eq!(m.to_play(), Color::White);
        assert_eq!(m.node(p).unwrap().move_number(), 1);

        let s = m
            .submit_setup(vec![((1, 1), Some(Color::Black)), ((2, 2), Some(Color::White))])
            .unwrap()
            .node()
            .unwrap();
        assert_eq!(m.to_play(), Color::White);
        assert_eq!(m.position(s).unwrap().stone_count(Color::Black), 1);

        let bad = m.submit_setup(vec![((7, 7), Some(Color::Black))]).unwrap();
        assert_eq!(bad.validation(), Err(IllegalMove::OutOfBounds));
        assert_eq!(m.current(), s);
    }

    #[test]
    fn test_ko_through_model() {
        let mut m = GameModel::new(
            GameConfig::new()
                .with_size(4)
                .with_rules(crate::rules::Rules::Chinese.rule_set()),
        )
        .unwrap();
        // Ko shape on the left edge:
        //   . X O .
        //   X O . O
        //   . X O .
        m.submit_setup(vec![
            ((1, 0), Some(Color::Black)),
            ((0, 1), Some(Color::Black)),
            ((1, 2), Some(Color::Black)),
            ((2, 0), Some(Color::White)),
            ((1, 1), Some(Color::White)),
            ((3, 1), Some(Color::White)),
            ((2, 2), Some(Color::White)),
        ])
        .unwrap();
        // Black takes at (2,1)
        let take = m.submit_move(2, 1).unwrap();
        assert_eq!(take.captured, vec![(1, 1)]);
        // White may not retake immediately
        let retake = m.submit_move(1, 1).unwrap();
        assert_eq!(retake.validation(), Err(IllegalMove::Ko));
    }

    #[test]
    fn test_markers_and_comments_fire_node_updated() {
        let mut m = model(9);
        let root = m.root();
        let seen = Rc::new(RefCell::new(0));
        let sink = Rc::clone(&seen);
        m.add_listener(move |e| {
            if matches!(e, GameEvent::NodeUpdated { .. }) {
                *sink.borrow_mut() += 1;
            }
        });
        m.add_marker(root, (3, 3), Marker::Circle).unwrap();
        m.set_comment(root, "hello").unwrap();
        assert_eq!(m.remove_marker(root, (3, 3)).unwrap(), Some(Marker::Circle));
        assert_eq!(*seen.borrow(), 3);
        m.dispose();
        m.set_comment(root, "bye").unwrap();
        assert_eq!(*seen.borrow(), 3);
    }
}
