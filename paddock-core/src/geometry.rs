//! Grid coordinates, directed edges and agent identity.
//!
//! Rows grow downward. Row 0 is the grid's entry row; negative rows belong to
//! the staging area above it.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Discrete simulation step.
pub type Tick = u32;

/// Four-neighbourhood offsets in search order: down, right, left, up.
///
/// Every BFS in the workspace expands neighbours in this order, which keeps
/// tie-breaking deterministic.
pub const DIRS4: [(i32, i32); 4] = [(0, 1), (1, 0), (-1, 0), (0, -1)];

// ============================================================================
// COORDINATES
// ============================================================================

/// A grid cell position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Coord {
    pub col: i32,
    pub row: i32,
}

impl Coord {
    pub const fn new(col: i32, row: i32) -> Self {
        Self { col, row }
    }

    /// Manhattan distance to `other`.
    pub fn manhattan(&self, other: Coord) -> u32 {
        self.col.abs_diff(other.col) + self.row.abs_diff(other.row)
    }

    pub fn offset(&self, dc: i32, dr: i32) -> Coord {
        Coord::new(self.col + dc, self.row + dr)
    }

    /// The four orthogonal neighbours in [`DIRS4`] order. No bounds check.
    pub fn neighbors4(&self) -> impl Iterator<Item = Coord> + '_ {
        DIRS4.iter().map(move |&(dc, dr)| self.offset(dc, dr))
    }

    pub fn is_adjacent(&self, other: Coord) -> bool {
        self.manhattan(other) == 1
    }

    /// True for cells in the staging area above the grid.
    pub fn is_staging_row(&self) -> bool {
        self.row < 0
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.col, self.row)
    }
}

impl From<(i32, i32)> for Coord {
    fn from((col, row): (i32, i32)) -> Self {
        Coord::new(col, row)
    }
}

/// Inclusive rectangle a search may visit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bounds {
    pub min_col: i32,
    pub max_col: i32,
    pub min_row: i32,
    pub max_row: i32,
}

impl Bounds {
    pub fn contains(&self, c: Coord) -> bool {
        c.col >= self.min_col && c.col <= self.max_col && c.row >= self.min_row && c.row <= self.max_row
    }
}

/// A directed move between two adjacent cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Edge {
    pub from: Coord,
    pub to: Coord,
}

impl Edge {
    pub const fn new(from: Coord, to: Coord) -> Self {
        Self { from, to }
    }

    pub fn reversed(&self) -> Edge {
        Edge::new(self.to, self.from)
    }

    /// A wait in place is not a real edge.
    pub fn is_wait(&self) -> bool {
        self.from == self.to
    }
}

// ============================================================================
// AGENT IDENTITY
// ============================================================================

/// Stable agent identifier. Agents are numbered in spawn order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(u32);

impl AgentId {
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn get(&self) -> u32 {
        self.0
    }

    /// Position of this agent in per-agent vectors.
    pub const fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "agent-{}", self.0)
    }
}

// =============================================================================
// TESTS
// =============================================================================
