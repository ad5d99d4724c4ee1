//! Immutable grid context: geometry, initial amounts, level buckets and
//! reachability helpers.

use crate::{Bounds, Coord, GridError, PaddockResult, ResourceField, SpawnConfig};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

// ============================================================================
// INPUT CELLS
// ============================================================================

/// One input cell with its initial resource amount. Zero means open terrain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridCell {
    pub coord: Coord,
    pub amount: u32,
}

impl GridCell {
    pub const fn new(col: i32, row: i32, amount: u32) -> Self {
        Self {
            coord: Coord::new(col, row),
            amount,
        }
    }
}

// ============================================================================
// RESOURCE LEVELS
// ============================================================================

/// Quartile bucket of a resource amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ResourceLevel {
    None,
    Low,
    MediumLow,
    MediumHigh,
    High,
}

impl ResourceLevel {
    pub fn as_u8(&self) -> u8 {
        match self {
            ResourceLevel::None => 0,
            ResourceLevel::Low => 1,
            ResourceLevel::MediumLow => 2,
            ResourceLevel::MediumHigh => 3,
            ResourceLevel::High => 4,
        }
    }
}

/// Quartile thresholds over the non-zero amounts of a grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quartiles {
    pub q1: u32,
    pub q2: u32,
    pub q3: u32,
}

impl Quartiles {
    /// Thresholds sit at `floor(n * 0.25)`, `floor(n * 0.5)` and
    /// `floor(n * 0.75)` of the sorted non-zero amounts. A zero threshold is
    /// lifted to 1. Without any non-zero amount all thresholds are 0.
    pub fn from_amounts(amounts: impl IntoIterator<Item = u32>) -> Self {
        let mut sorted: Vec<u32> = amounts.into_iter().filter(|&a| a > 0).collect();
        if sorted.is_empty() {
            return Self { q1: 0, q2: 0, q3: 0 };
        }
        sorted.sort_unstable();
        let n = sorted.len();
        let at = |num: usize| {
            let v = sorted[(n * num / 4).min(n - 1)];
            if v == 0 {
                1
            } else {
                v
            }
        };
        Self {
            q1: at(1),
            q2: at(2),
            q3: at(3),
        }
    }

    pub fn level(&self, amount: u32) -> ResourceLevel {
        if amount == 0 {
            ResourceLevel::None
        } else if amount < self.q1 {
            ResourceLevel::Low
        } else if amount < self.q2 {
            ResourceLevel::MediumLow
        } else if amount < self.q3 {
            ResourceLevel::MediumHigh
        } else {
            ResourceLevel::High
        }
    }
}

// ============================================================================
// GRID CONTEXT
// ============================================================================

/// Static description of the grid. Built once per run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridContext {
    #[serde(with = "crate::serde_helpers::coord_map")]
    initial: BTreeMap<Coord, u32>,
    max_col: i32,
    max_row: i32,
    quartiles: Quartiles,
}

impl GridContext {
    /// Build the context from input cells.
    ///
    /// An empty input is valid and yields a context with no cells.
    pub fn from_cells(cells: impl IntoIterator<Item = GridCell>) -> PaddockResult<Self> {
        let mut initial = BTreeMap::new();
        let mut max_col = -1;
        let mut max_row = -1;
        for cell in cells {
            let c = cell.coord;
            if c.col < 0 || c.row < 0 {
                return Err(GridError::NegativeCoordinate { cell: c }.into());
            }
            if initial.insert(c, cell.amount).is_some() {
                return Err(GridError::DuplicateCell { cell: c }.into());
            }
            max_col = max_col.max(c.col);
            max_row = max_row.max(c.row);
        }
        let quartiles = Quartiles::from_amounts(initial.values().copied());
        Ok(Self {
            initial,
            max_col,
            max_row,
            quartiles,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.initial.is_empty()
    }

    pub fn max_col(&self) -> i32 {
        self.max_col
    }

    pub fn max_row(&self) -> i32 {
        self.max_row
    }

    pub fn center_col(&self) -> i32 {
        self.max_col.max(0) / 2
    }

    pub fn quartiles(&self) -> Quartiles {
        self.quartiles
    }

    /// Inside the bounding box of the grid (rows `0..=max_row`).
    pub fn in_bounds(&self, c: Coord) -> bool {
        c.col >= 0 && c.col <= self.max_col && c.row >= 0 && c.row <= self.max_row
    }

    /// The grid box extended upward to `entry_row` for the staging area.
    pub fn bounds(&self, entry_row: i32) -> Bounds {
        Bounds {
            min_col: 0,
            max_col: self.max_col,
            min_row: entry_row.min(0),
            max_row: self.max_row,
        }
    }

    /// Present in the input. Cells inside the box but absent are voids.
    pub fn contains(&self, c: Coord) -> bool {
        self.initial.contains_key(&c)
    }

    pub fn initial_amount(&self, c: Coord) -> u32 {
        self.initial.get(&c).copied().unwrap_or(0)
    }

    pub fn is_resource(&self, c: Coord) -> bool {
        self.initial_amount(c) > 0
    }

    pub fn level_of(&self, amount: u32) -> ResourceLevel {
        self.quartiles.level(amount)
    }

    /// All input cells in coordinate order.
    pub fn cells(&self) -> impl Iterator<Item = GridCell> + '_ {
        self.initial.iter().map(|(&coord, &amount)| GridCell { coord, amount })
    }

    /// Cells with a positive initial amount.
    pub fn resources(&self) -> impl Iterator<Item = Coord> + '_ {
        self.initial
            .iter()
            .filter(|(_, &a)| a > 0)
            .map(|(&c, _)| c)
    }

    pub fn resource_count(&self) -> usize {
        self.resources().count()
    }

    /// Every position of the bounding box in row-major order.
    pub fn scan(&self) -> impl Iterator<Item = Coord> + '_ {
        (0..=self.max_row).flat_map(move |row| (0..=self.max_col).map(move |col| Coord::new(col, row)))
    }

    /// Maximum number of agents for this grid.
    ///
    /// Zero without resources, otherwise one agent per `resources_per_agent`
    /// resources, at least `min(min_agents, resources)` and at most `max_agents`.
    pub fn agent_cap(&self, spawn: &SpawnConfig) -> usize {
        let resources = self.resource_count();
        if resources == 0 {
            return 0;
        }
        let base = resources / spawn.resources_per_agent.max(1) as usize;
        let floor = (spawn.min_agents as usize).min(resources);
        (spawn.max_agents as usize).min(base.max(floor))
    }

    /// Open cells next to a live resource, in row-major order.
    ///
    /// Falls back to every open cell when no such cell exists.
    pub fn depletion_seeds(&self, field: &ResourceField) -> Vec<Coord> {
        let seeds: Vec<Coord> = self
            .scan()
            .filter(|&c| field.is_open(c))
            .filter(|c| {
                c.neighbors4()
                    .any(|n| self.in_bounds(n) && field.is_live(n))
            })
            .collect();
        if !seeds.is_empty() {
            return seeds;
        }
        self.scan().filter(|&c| field.is_open(c)).collect()
    }

    /// Live resources bordering `region`, ordered by coordinate.
    pub fn bordering_resources<'a>(
        &self,
        region: impl IntoIterator<Item = &'a Coord>,
        field: &ResourceField,
    ) -> Vec<Coord> {
        let mut out: Vec<Coord> = region
            .into_iter()
            .flat_map(|c| c.neighbors4())
            .filter(|&n| self.in_bounds(n) && field.is_live(n))
            .collect();
        out.sort_unstable();
        out.dedup();
        out
    }
}

// ============================================================================
// REGION BFS
// ============================================================================

/// Result of a multi-source BFS: visit order and depth per cell.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Region {
    pub order: Vec<Coord>,
    pub depth: HashMap<Coord, u32>,
}

impl Region {
    pub fn contains(&self, c: Coord) -> bool {
        self.depth.contains_key(&c)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn cells(&self) -> HashSet<Coord> {
        self.order.iter().copied().collect()
    }
}

/// BFS over cells accepted by `open`, starting from every seed at depth 0.
///
/// Seeds rejected by `open` are skipped.
pub fn bfs_region<F>(seeds: impl IntoIterator<Item = Coord>, open: F) -> Region
where
    F: Fn(Coord) -> bool,
{
    let mut region = Region::default();
    let mut queue = VecDeque::new();
    for seed in seeds {
        if !open(seed) || region.depth.contains_key(&seed) {
            continue;
        }
        region.depth.insert(seed, 0);
        region.order.push(seed);
        queue.push_back(seed);
    }
    while let Some(cur) = queue.pop_front() {
        let d = region.depth.get(&cur).copied().unwrap_or(0);
        for n in cur.neighbors4() {
            if region.depth.contains_key(&n) || !open(n) {
                continue;
            }
            region.depth.insert(n, d + 1);
            region.order.push(n);
            queue.push_back(n);
        }
    }
    region
}

// =============================================================================
// TESTS
// =============================================================================
