//! Immutable board snapshots.
//!
//! A [`BoardPosition`] is the stone occupancy attached to one node of the
//! game tree, together with the prisoner counts and the ko point produced by
//! the move that led to it. Positions are never edited in place once a node
//! owns them; the validator derives a fresh one for every child.

use std::fmt;
use std::sync::OnceLock;

use crate::constants::{MAX_BOARD_POINTS, MAX_BOARD_SIZE, MIN_BOARD_SIZE, ZOBRIST_SEED};
use crate::error::{Error, Result};
use crate::rules::{RuleSet, Scoring};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Color {
    Black,
    White,
}

impl Color {
    pub fn opponent(self) -> Self {
        match self {
            Color::Black => Color::White,
            Color::White => Color::Black,
        }
    }

    fn index(self) -> usize {
        match self {
            Color::Black => 0,
            Color::White => 1,
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Color::Black => f.write_str("black"),
            Color::White => f.write_str("white"),
        }
    }
}

/// A point as `(x, y)`, with `(0, 0)` at the top-left corner.
pub type Point = (usize, usize);

/// A point the given colour may not play on the next move.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Ko {
    pub point: Point,
    pub forbidden: Color,
}

/// Stone occupancy of one tree node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BoardPosition {
    width: usize,
    height: usize,
    cells: Vec<Option<Color>>,
    /// Prisoners taken by Black and White, in that order.
    captures: [u32; 2],
    ko: Option<Ko>,
    hash: u64,
}

impl BoardPosition {
    /// An empty board of the given dimensions.
    pub fn new(width: usize, height: usize) -> Result<Self> {
        let valid = MIN_BOARD_SIZE..=MAX_BOARD_SIZE;
        if !valid.contains(&width) || !valid.contains(&height) {
            return Err(Error::InvalidBoardSize { width, height });
        }
        Ok(Self {
            width,
            height,
            cells: vec![None; width * height],
            captures: [0; 2],
            ko: None,
            hash: 0,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn contains(&self, (x, y): Point) -> bool {
        x < self.width && y < self.height
    }

    fn idx(&self, (x, y): Point) -> usize {
        y * self.width + x
    }

    /// The stone at `pt`, or `None` for an empty or off-board point.
    pub fn get(&self, pt: Point) -> Option<Color> {
        if !self.contains(pt) {
            return None;
        }
        self.cells[self.idx(pt)]
    }

    /// Prisoners taken so far by `color`.
    pub fn captures(&self, color: Color) -> u32 {
        self.captures[color.index()]
    }

    pub fn ko(&self) -> Option<Ko> {
        self.ko
    }

    /// Zobrist hash of the occupancy (prisoners and ko are not included).
    pub fn hash(&self) -> u64 {
        self.hash
    }

    /// True if both positions have the same stones on the same points.
    pub fn same_occupancy(&self, other: &BoardPosition) -> bool {
        self.hash == other.hash
            && self.width == other.width
            && self.height == other.height
            && self.cells == other.cells
    }

    pub fn stone_count(&self, color: Color) -> usize {
        self.cells.iter().filter(|&&c| c == Some(color)).count()
    }

    /// Every point on the board, row by row.
    pub fn points(&self) -> impl Iterator<Item = Point> + use<> {
        let (width, height) = (self.width, self.height);
        (0..height).flat_map(move |y| (0..width).map(move |x| (x, y)))
    }

    /// All points holding a stone, row by row.
    pub fn stones(&self) -> impl Iterator<Item = (Point, Color)> + '_ {
        self.cells.iter().enumerate().filter_map(move |(i, c)| {
            c.map(|color| ((i % self.width, i / self.width), color))
        })
    }

    pub(crate) fn set(&mut self, pt: Point, stone: Option<Color>) {
        let i = self.idx(pt);
        if let Some(old) = self.cells[i] {
            self.hash ^= zobrist(pt, old);
        }
        if let Some(new) = stone {
            self.hash ^= zobrist(pt, new);
        }
        self.cells[i] = stone;
    }

    pub(crate) fn add_captures(&mut self, color: Color, n: usize) {
        self.captures[color.index()] += n as u32;
    }

    pub(crate) fn set_ko(&mut self, ko: Option<Ko>) {
        self.ko = ko;
    }

    /// The orthogonal neighbours of `pt` that lie on the board.
    pub fn neighbors(&self, (x, y): Point) -> impl Iterator<Item = Point> + use<> {
        let (w, h) = (self.width, self.height);
        let mut v = Vec::with_capacity(4);
        if x > 0 {
            v.push((x - 1, y));
        }
        if x + 1 < w {
            v.push((x + 1, y));
        }
        if y > 0 {
            v.push((x, y - 1));
        }
        if y + 1 < h {
            v.push((x, y + 1));
        }
        v.into_iter()
    }

    /// Collect all stones connected to the stone at `start`.
    ///
    /// Appends the group's points to `out` and returns its size; an empty
    /// `start` yields an empty group.
    pub fn collect_group(&self, start: Point, out: &mut Vec<Point>) -> usize {
        let Some(color) = self.get(start) else {
            return 0;
        };
        let mut stack = vec![start];
        let mut visited = vec![false; self.cells.len()];
        let mut count = 0;
        while let Some(pt) = stack.pop() {
            let i = self.idx(pt);
            if visited[i] {
                continue;
            }
            visited[i] = true;
            out.push(pt);
            count += 1;
            for n in self.neighbors(pt) {
                if !visited[self.idx(n)] && self.get(n) == Some(color) {
                    stack.push(n);
                }
            }
        }
        count
    }

    /// Count the distinct empty points adjacent to the group at `start`.
    pub fn group_liberties(&self, start: Point) -> usize {
        let Some(color) = self.get(start) else {
            return 0;
        };
        let mut stack = vec![start];
        let mut visited = vec![false; self.cells.len()];
        let mut liberty_visited = vec![false; self.cells.len()];
        let mut libs = 0;
        while let Some(pt) = stack.pop() {
            let i = self.idx(pt);
            if visited[i] {
                continue;
            }
            visited[i] = true;
            for n in self.neighbors(pt) {
                let ni = self.idx(n);
                match self.get(n) {
                    None => {
                        if !liberty_visited[ni] {
                            liberty_visited[ni] = true;
                            libs += 1;
                        }
                    }
                    Some(c) if c == color && !visited[ni] => stack.push(n),
                    _ => {}
                }
            }
        }
        libs
    }

    /// Count the position under the given rules.
    ///
    /// Empty regions bordered by a single colour count for that colour.
    /// No dead-stone removal is attempted.
    pub fn score(&self, rules: &RuleSet) -> Score {
        let mut points = [0.0f32; 2];
        let mut visited = vec![false; self.cells.len()];

        for start in 0..self.cells.len() {
            if visited[start] || self.cells[start].is_some() {
                continue;
            }
            // Flood-fill one empty region and note which colours border it
            let mut region = 0usize;
            let mut borders = [false; 2];
            let mut stack = vec![(start % self.width, start / self.width)];
            visited[start] = true;
            while let Some(pt) = stack.pop() {
                region += 1;
                for n in self.neighbors(pt) {
                    let ni = self.idx(n);
                    match self.cells[ni] {
                        Some(c) => borders[c.index()] = true,
                        None if !visited[ni] => {
                            visited[ni] = true;
                            stack.push(n);
                        }
                        None => {}
                    }
                }
            }
            match borders {
                [true, false] => points[0] += region as f32,
                [false, true] => points[1] += region as f32,
                _ => {}
            }
        }

        for color in [Color::Black, Color::White] {
            points[color.index()] += match rules.scoring {
                Scoring::Area => self.stone_count(color) as f32,
                Scoring::Territory => self.captures(color) as f32,
            };
        }

        Score {
            black: points[0],
            white: points[1] + rules.komi,
        }
    }
}

/// Points for each side, komi included.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Score {
    pub black: f32,
    pub white: f32,
}

impl Score {
    /// Positive when Black is ahead.
    pub fn margin(&self) -> f32 {
        self.black - self.white
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = self.margin();
        if m > 0.0 {
            write!(f, "B+{m}")
        } else if m < 0.0 {
            write!(f, "W+{}", -m)
        } else {
            f.write_str("0")
        }
    }
}

impl fmt::Display for BoardPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for y in 0..self.height {
            for x in 0..self.width {
                let ch = match self.get((x, y)) {
                    Some(Color::Black) => 'X',
                    Some(Color::White) => 'O',
                    None => '.',
                };
                write!(f, "{ch} ")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Zobrist key for a stone of `color` at `pt`.
///
/// Keys are laid out on the largest supported board so a point keeps its key
/// regardless of the actual board width.
fn zobrist((x, y): Point, color: Color) -> u64 {
    static TABLE: OnceLock<Vec<[u64; 2]>> = OnceLock::new();
    let table = TABLE.get_or_init(|| {
        let mut rng = fastrand::Rng::with_seed(ZOBRIST_SEED);
        (0..MAX_BOARD_POINTS)
            .map(|_| [rng.u64(..), rng.u64(..)])
            .collect()
    });
    table[y * MAX_BOARD_SIZE + x][color.index()]
}
