//! Constants for board dimensions, komi, and edit history sizing.
//!
//! Board dimensions are chosen at runtime when a game model is created;
//! the values here only bound and seed that choice.

// =============================================================================
// Board Geometry
// =============================================================================

/// Default board size (NxN) used when no size is configured.
pub const DEFAULT_BOARD_SIZE: usize = 19;

/// Smallest accepted board dimension.
pub const MIN_BOARD_SIZE: usize = 1;

/// Largest accepted board dimension (GTP vertex letters run out after 25 columns).
pub const MAX_BOARD_SIZE: usize = 25;

/// Number of points on the largest supported board.
pub const MAX_BOARD_POINTS: usize = MAX_BOARD_SIZE * MAX_BOARD_SIZE;

// =============================================================================
// Komi
// =============================================================================

/// Komi under area scoring (Chinese, AGA, New Zealand).
pub const AREA_KOMI: f32 = 7.5;

/// Komi under territory scoring (Japanese, Korean).
pub const TERRITORY_KOMI: f32 = 6.5;

// =============================================================================
// Edit History
// =============================================================================

/// Number of undo steps retained when no capacity is configured.
pub const DEFAULT_HISTORY_CAPACITY: usize = 100;

// =============================================================================
// Position Hashing
// =============================================================================

/// Seed for the Zobrist table. Fixed so hashes are stable across runs.
pub const ZOBRIST_SEED: u64 = 0x9E37_79B9_7F4A_7C15;
