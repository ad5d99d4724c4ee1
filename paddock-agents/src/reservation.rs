//! Time-indexed reservation table.
//!
//! Cells are reserved per tick. Moves are reserved as directed edges keyed by
//! their arrival tick, so `reserve_edge(t, a, b)` means "leave `a` at `t - 1`,
//! be in `b` at `t`". An edge conflicts with its own reverse owned by someone
//! else in the same tick (a swap).

use paddock_core::{AgentId, Coord, Edge, Tick};
use std::collections::{BTreeMap, HashMap};

/// Read-only reservation queries used by the planner.
pub trait ReservationView {
    /// `cell` is unreserved at `tick`, or reserved by `agent` itself.
    fn is_free(&self, tick: Tick, cell: Coord, agent: AgentId) -> bool;

    /// Moving `from -> to` arriving at `tick` would not clash with another
    /// agent's move over the same edge in either direction.
    fn edge_free(&self, tick: Tick, from: Coord, to: Coord, agent: AgentId) -> bool;
}

/// Per-tick cell and edge ownership.
#[derive(Debug, Clone, Default)]
pub struct ReservationTable {
    cells: BTreeMap<Tick, HashMap<Coord, AgentId>>,
    edges: BTreeMap<Tick, HashMap<Edge, AgentId>>,
}

impl ReservationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve `cell` at `tick`. Fails without mutating when another agent
    /// owns it. Re-reserving your own cell succeeds.
    pub fn reserve(&mut self, tick: Tick, cell: Coord, agent: AgentId) -> bool {
        let slot = self.cells.entry(tick).or_default();
        match slot.get(&cell) {
            Some(&owner) if owner != agent => false,
            _ => {
                slot.insert(cell, agent);
                true
            }
        }
    }

    /// Reserve the move `from -> to` arriving at `tick`. Waits always succeed
    /// and record nothing.
    pub fn reserve_edge(&mut self, tick: Tick, from: Coord, to: Coord, agent: AgentId) -> bool {
        let edge = Edge::new(from, to);
        if edge.is_wait() {
            return true;
        }
        if !self.edge_free(tick, from, to, agent) {
            return false;
        }
        self.edges.entry(tick).or_default().insert(edge, agent);
        true
    }

    pub fn owner(&self, tick: Tick, cell: Coord) -> Option<AgentId> {
        self.cells.get(&tick).and_then(|m| m.get(&cell)).copied()
    }

    pub fn edge_owner(&self, tick: Tick, edge: Edge) -> Option<AgentId> {
        self.edges.get(&tick).and_then(|m| m.get(&edge)).copied()
    }

    /// Drop every tick strictly before `before`.
    pub fn prune(&mut self, before: Tick) {
        self.cells = self.cells.split_off(&before);
        self.edges = self.edges.split_off(&before);
    }

    /// Remove `agent`'s cell and edge reservations for ticks `from..=to`.
    pub fn release_range(&mut self, agent: AgentId, from: Tick, to: Tick) {
        if from > to {
            return;
        }
        for slot in self.cells.range_mut(from..=to).map(|(_, m)| m) {
            slot.retain(|_, owner| *owner != agent);
        }
        for slot in self.edges.range_mut(from..=to).map(|(_, m)| m) {
            slot.retain(|_, owner| *owner != agent);
        }
    }

    /// Take every cell reservation at `tick` out of the table, clearing that
    /// tick's edges as well.
    pub fn take_tick(&mut self, tick: Tick) -> HashMap<Coord, AgentId> {
        self.edges.remove(&tick);
        self.cells.remove(&tick).unwrap_or_default()
    }

    /// Cell reservations at `tick`.
    pub fn cells_at(&self, tick: Tick) -> impl Iterator<Item = (Coord, AgentId)> + '_ {
        self.cells
            .get(&tick)
            .into_iter()
            .flat_map(|m| m.iter().map(|(&c, &a)| (c, a)))
    }

    /// Edge reservations at `tick`.
    pub fn edges_at(&self, tick: Tick) -> impl Iterator<Item = (Edge, AgentId)> + '_ {
        self.edges
            .get(&tick)
            .into_iter()
            .flat_map(|m| m.iter().map(|(&e, &a)| (e, a)))
    }

    /// Earliest tick still held.
    pub fn oldest_tick(&self) -> Option<Tick> {
        let c = self.cells.keys().next().copied();
        let e = self.edges.keys().next().copied();
        match (c, e) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.cells.values().all(|m| m.is_empty()) && self.edges.values().all(|m| m.is_empty())
    }
}

impl ReservationView for ReservationTable {
    fn is_free(&self, tick: Tick, cell: Coord, agent: AgentId) -> bool {
        match self.owner(tick, cell) {
            Some(owner) => owner == agent,
            None => true,
        }
    }

    fn edge_free(&self, tick: Tick, from: Coord, to: Coord, agent: AgentId) -> bool {
        let Some(slot) = self.edges.get(&tick) else {
            return true;
        };
        let edge = Edge::new(from, to);
        let fwd = slot.get(&edge).map_or(true, |&o| o == agent);
        let rev = slot.get(&edge.reversed()).map_or(true, |&o| o == agent);
        fwd && rev
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const A: AgentId = AgentId::new(0);
    const B: AgentId = AgentId::new(1);

    fn c(col: i32, row: i32) -> Coord {
        Coord::new(col, row)
    }

    #[test]
    fn test_reserve_conflict_leaves_table_unchanged() {
        let mut table = ReservationTable::new();
        assert!(table.reserve(3, c(1, 1), A));
        assert!(!table.reserve(3, c(1, 1), B));
        assert_eq!(table.owner(3, c(1, 1)), Some(A));
        // same agent again is fine
        assert!(table.reserve(3, c(1, 1), A));
        // other tick is independent
        assert!(table.reserve(4, c(1, 1), B));
    }

    #[test]
    fn test_is_free_is_pure() {
        let mut table = ReservationTable::new();
        table.reserve(1, c(0, 0), A);
        assert!(table.is_free(1, c(0, 0), A));
        assert!(!table.is_free(1, c(0, 0), B));
        assert!(table.is_free(2, c(0, 0), B));
        assert_eq!(table.owner(2, c(0, 0)), None);
    }

    #[test]
    fn test_edge_swap_rejected() {
        let mut table = ReservationTable::new();
        assert!(table.reserve_edge(5, c(0, 0), c(1, 0), A));
        assert!(!table.reserve_edge(5, c(1, 0), c(0, 0), B));
        assert!(!table.reserve_edge(5, c(0, 0), c(1, 0), B));
        assert!(table.reserve_edge(6, c(1, 0), c(0, 0), B));
        assert!(!table.edge_free(5, c(1, 0), c(0, 0), B));
        assert!(table.edge_free(5, c(1, 0), c(0, 0), A));
    }

    #[test]
    fn test_waits_are_not_edges() {
        let mut table = ReservationTable::new();
        assert!(table.reserve_edge(2, c(3, 3), c(3, 3), A));
        assert_eq!(table.edges_at(2).count(), 0);
    }

    #[test]
    fn test_prune_discards_old_ticks() {
        let mut table = ReservationTable::new();
        for t in 0..6 {
            table.reserve(t, c(0, t as i32), A);
            table.reserve_edge(t, c(0, 0), c(0, 1), A);
        }
        table.prune(3);
        assert_eq!(table.oldest_tick(), Some(3));
        assert_eq!(table.owner(2, c(0, 2)), None);
        assert_eq!(table.owner(3, c(0, 3)), Some(A));
    }

    #[test]
    fn test_release_range_only_touches_own_entries() {
        let mut table = ReservationTable::new();
        table.reserve(1, c(0, 0), A);
        table.reserve(2, c(0, 1), A);
        table.reserve(2, c(5, 5), B);
        table.reserve(3, c(0, 2), A);
        table.reserve_edge(2, c(0, 0), c(0, 1), A);

        table.release_range(A, 2, 3);
        assert_eq!(table.owner(1, c(0, 0)), Some(A));
        assert_eq!(table.owner(2, c(0, 1)), None);
        assert_eq!(table.owner(2, c(5, 5)), Some(B));
        assert_eq!(table.owner(3, c(0, 2)), None);
        assert_eq!(table.edges_at(2).count(), 0);
    }

    #[test]
    fn test_take_tick() {
        let mut table = ReservationTable::new();
        table.reserve(4, c(1, 1), A);
        table.reserve_edge(4, c(1, 0), c(1, 1), A);
        let taken = table.take_tick(4);
        assert_eq!(taken.get(&c(1, 1)), Some(&A));
        assert!(table.is_empty());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Property: Each (tick, cell) has at most one owner no matter the order of requests
        #[test]
        fn prop_unique_cell_owner(
            requests in prop::collection::vec((0u32..4, 0i32..3, 0i32..3, 0u32..4), 1..60)
        ) {
            let mut table = ReservationTable::new();
            let mut first: HashMap<(Tick, Coord), AgentId> = HashMap::new();
            for (tick, col, row, agent) in requests {
                let cell = Coord::new(col, row);
                let agent = AgentId::new(agent);
                let ok = table.reserve(tick, cell, agent);
                let expected = first.entry((tick, cell)).or_insert(agent);
                prop_assert_eq!(ok, *expected == agent);
                prop_assert_eq!(table.owner(tick, cell), Some(*expected));
            }
        }

        /// Property: An edge and its reverse never belong to different agents in one tick
        #[test]
        fn prop_no_opposing_edges(
            requests in prop::collection::vec((0u32..3, 0usize..4, any::<bool>(), 0u32..3), 1..40)
        ) {
            let pairs = [
                (Coord::new(0, 0), Coord::new(1, 0)),
                (Coord::new(1, 0), Coord::new(1, 1)),
                (Coord::new(1, 1), Coord::new(0, 1)),
                (Coord::new(0, 1), Coord::new(0, 0)),
            ];
            let mut table = ReservationTable::new();
            for (tick, idx, flip, agent) in requests {
                let (a, b) = pairs[idx];
                let (from, to) = if flip { (b, a) } else { (a, b) };
                table.reserve_edge(tick, from, to, AgentId::new(agent));
            }
            for tick in 0..3 {
                for (edge, owner) in table.edges_at(tick) {
                    if let Some(rev) = table.edge_owner(tick, edge.reversed()) {
                        prop_assert_eq!(rev, owner);
                    }
                }
            }
        }
    }
}
