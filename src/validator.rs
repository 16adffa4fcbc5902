//! Move legality and capture resolution.
//!
//! Validation is a pure function of the current position, the move, the
//! rule set and (for superko) the positions earlier on the same line of
//! play. Nothing here touches the game tree.

use thiserror::Error;

use crate::board::{BoardPosition, Color, Ko, Point};
use crate::rules::{KoRule, RuleSet};

/// A move by one side: a stone on a point, or a pass.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Move {
    Play { point: Point, color: Color },
    Pass(Color),
}

impl Move {
    pub fn color(&self) -> Color {
        match *self {
            Move::Play { color, .. } | Move::Pass(color) => color,
        }
    }

    /// The point played, or `None` for a pass.
    pub fn point(&self) -> Option<Point> {
        match *self {
            Move::Play { point, .. } => Some(point),
            Move::Pass(_) => None,
        }
    }
}

/// Why a move was rejected.
#[derive(Error, Copy, Clone, Debug, PartialEq, Eq)]
pub enum IllegalMove {
    #[error("point not empty")]
    Occupied,
    #[error("point is off the board")]
    OutOfBounds,
    #[error("suicide")]
    Suicide,
    #[error("retakes ko")]
    Ko,
    #[error("repeats an earlier position")]
    Superko,
}

/// A legal move's outcome.
#[derive(Clone, Debug)]
pub struct Validated {
    /// The position after the move, captures removed.
    pub position: BoardPosition,
    /// Opponent stones taken by the move.
    pub captured: Vec<Point>,
}

/// Validate `mv` against `position` with no earlier positions to compare.
///
/// Under positional superko only the ko point recorded on `position` is
/// enforced; use [`validate_in_history`] to check full repetition.
pub fn validate(
    position: &BoardPosition,
    mv: Move,
    rules: &RuleSet,
) -> Result<Validated, IllegalMove> {
    validate_in_history(position, mv, rules, std::iter::empty())
}

/// Validate `mv` against `position`, treating `history` as the positions
/// that came before it on the same line of play.
pub fn validate_in_history<'a>(
    position: &BoardPosition,
    mv: Move,
    rules: &RuleSet,
    history: impl IntoIterator<Item = &'a BoardPosition>,
) -> Result<Validated, IllegalMove> {
    let (pt, color) = match mv {
        Move::Pass(_) => {
            // A pass never repeats a position and clears any ko
            let mut next = position.clone();
            next.set_ko(None);
            return Ok(Validated {
                position: next,
                captured: Vec::new(),
            });
        }
        Move::Play { point, color } => (point, color),
    };

    if !position.contains(pt) {
        return Err(IllegalMove::OutOfBounds);
    }
    if position.get(pt).is_some() {
        return Err(IllegalMove::Occupied);
    }
    if position.ko() == Some(Ko { point: pt, forbidden: color }) {
        return Err(IllegalMove::Ko);
    }

    let mut next = position.clone();
    next.set(pt, Some(color));

    let opp = color.opponent();
    let mut captured: Vec<Point> = Vec::new();
    for n in position.neighbors(pt) {
        // Groups are removed as soon as they are found so a group touching
        // the new stone twice is only taken once
        if next.get(n) == Some(opp) && next.group_liberties(n) == 0 {
            let start = captured.len();
            next.collect_group(n, &mut captured);
            for &r in &captured[start..] {
                next.set(r, None);
            }
        }
    }

    if captured.is_empty() && next.group_liberties(pt) == 0 {
        return Err(IllegalMove::Suicide);
    }

    next.add_captures(color, captured.len());

    // A lone stone that took a lone stone and now sits in atari is a ko
    let ko = if captured.len() == 1
        && next.group_liberties(pt) == 1
        && next.collect_group(pt, &mut Vec::new()) == 1
    {
        Some(Ko {
            point: captured[0],
            forbidden: opp,
        })
    } else {
        None
    };
    next.set_ko(ko);

    if rules.ko == KoRule::PositionalSuperko
        && history.into_iter().any(|prev| prev.same_occupancy(&next))
    {
        return Err(IllegalMove::Superko);
    }

    Ok(Validated {
        position: next,
        captured,
    })
}

/// Place (or erase, with `None`) setup stones without resolving captures.
///
/// Setup never creates a ko; the result's ko point is cleared.
pub fn apply_setup(
    position: &BoardPosition,
    stones: &[(Point, Option<Color>)],
) -> Result<BoardPosition, IllegalMove> {
    if stones.iter().any(|&(pt, _)| !position.contains(pt)) {
        return Err(IllegalMove::OutOfBounds);
    }
    let mut next = position.clone();
    for &(pt, stone) in stones {
        next.set(pt, stone);
    }
    next.set_ko(None);
    Ok(next)
}
