//! Windowed time-expanded BFS.
//!
//! Searches `(col, row, tick)` for `tick` in `start..=start + window`. A step
//! is either a wait or a move to one of the four neighbours. The search only
//! sees the world through the injected passability predicate and
//! [`ReservationView`], so it is a pure function of its inputs.

use paddock_agents::ReservationView;
use paddock_core::{AgentId, Bounds, Coord, EntryRelief, Tick};
use std::collections::{HashMap, HashSet, VecDeque};

/// One planning call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowQuery {
    pub agent: AgentId,
    pub from: Coord,
    pub start_tick: Tick,
    pub goal: Coord,
    pub window: u32,
    pub bounds: Bounds,
    pub relief: EntryRelief,
}

/// Result of [`plan_windowed`]. Paths hold positions for ticks
/// `start_tick + 1` onward.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WindowOutcome {
    /// The goal is reached inside the window.
    Reached(Vec<Coord>),
    /// Best effort toward the goal, ending where the closest horizon cell
    /// is first reached.
    Partial(Vec<Coord>),
    /// Nothing survives to the horizon.
    Blocked,
}

impl WindowOutcome {
    pub fn path(&self) -> Option<&[Coord]> {
        match self {
            WindowOutcome::Reached(p) | WindowOutcome::Partial(p) => Some(p),
            WindowOutcome::Blocked => None,
        }
    }

    pub fn into_path(self) -> Option<Vec<Coord>> {
        match self {
            WindowOutcome::Reached(p) | WindowOutcome::Partial(p) => Some(p),
            WindowOutcome::Blocked => None,
        }
    }

    /// A partial path counts only if it ends strictly closer to the goal.
    pub fn makes_progress(&self, from: Coord, goal: Coord) -> bool {
        match self {
            WindowOutcome::Reached(_) => true,
            WindowOutcome::Partial(p) => p
                .last()
                .is_some_and(|end| end.manhattan(goal) < from.manhattan(goal)),
            WindowOutcome::Blocked => false,
        }
    }
}

type Node = (Coord, Tick);

/// Plan from `query.from` toward `query.goal`.
///
/// A destination must be in bounds, passable and free at its arrival tick.
/// Moves must not oppose an edge reserved by another agent. The entry relief
/// policy may waive the reservation checks inside the staging funnel.
pub fn plan_windowed<P, R>(query: &WindowQuery, passable: P, reservations: &R) -> WindowOutcome
where
    P: Fn(Coord) -> bool,
    R: ReservationView + ?Sized,
{
    let start: Node = (query.from, query.start_tick);
    if query.from == query.goal {
        return WindowOutcome::Reached(Vec::new());
    }
    let horizon = query.start_tick + query.window;

    let mut search = Search {
        seen: HashSet::from([start]),
        parent: HashMap::new(),
        first_arrival: HashMap::from([(query.from, query.start_tick)]),
        frontier: Vec::new(),
        queue: VecDeque::from([start]),
        horizon,
    };

    let cell_ok = |to: Coord, tick: Tick| {
        query.relief.relaxes_cell(to) || reservations.is_free(tick, to, query.agent)
    };

    while let Some(cur) = search.queue.pop_front() {
        let (pos, tick) = cur;
        if pos == query.goal {
            return WindowOutcome::Reached(search.trace(start, cur));
        }
        if tick >= horizon {
            continue;
        }
        let next_tick = tick + 1;

        for next in pos.neighbors4() {
            if !query.bounds.contains(next) || !passable(next) {
                continue;
            }
            if !cell_ok(next, next_tick) {
                continue;
            }
            if !query.relief.relaxes_edge(pos, next)
                && !reservations.edge_free(next_tick, pos, next, query.agent)
            {
                continue;
            }
            search.visit((next, next_tick), cur);
        }

        if cell_ok(pos, next_tick) {
            search.visit((pos, next_tick), cur);
        }
    }

    // Goal not reached: the horizon cell closest to the goal, first found
    // wins. The path leads to the earliest arrival in that cell.
    let mut best: Option<(u32, Coord)> = None;
    for &(cell, _) in &search.frontier {
        let d = cell.manhattan(query.goal);
        if best.map_or(true, |(bd, _)| d < bd) {
            best = Some((d, cell));
        }
    }
    let Some((_, end)) = best else {
        return WindowOutcome::Blocked;
    };
    let arrival = search.first_arrival.get(&end).copied().unwrap_or(horizon);
    WindowOutcome::Partial(search.trace(start, (end, arrival)))
}

struct Search {
    seen: HashSet<Node>,
    parent: HashMap<Node, Node>,
    first_arrival: HashMap<Coord, Tick>,
    frontier: Vec<Node>,
    queue: VecDeque<Node>,
    horizon: Tick,
}

impl Search {
    fn visit(&mut self, node: Node, from: Node) {
        if !self.seen.insert(node) {
            return;
        }
        self.parent.insert(node, from);
        self.first_arrival.entry(node.0).or_insert(node.1);
        if node.1 == self.horizon {
            self.frontier.push(node);
        }
        self.queue.push_back(node);
    }

    fn trace(&self, start: Node, end: Node) -> Vec<Coord> {
        let mut chain = Vec::new();
        let mut cur = end;
        while cur != start {
            chain.push(cur.0);
            match self.parent.get(&cur) {
                Some(&p) => cur = p,
                None => break,
            }
        }
        chain.reverse();
        chain
    }
}

// =============================================================================
// TESTS
// =============================================================================
