//! Per-agent state machine.
//!
//! ```text
//! Unassigned ── assign() ──→ Traveling ── arrive ──→ Consuming ── finish ──→ Unassigned
//!     ↑                         │                                    └────→ Retired
//!     └──── target reached ── Escaping ←── escape() ──┘ (from Unassigned/Traveling)
//! ```

use paddock_core::{AgentId, Coord, Tick};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// What an agent is doing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AgentPhase {
    /// No goal. Will search for one.
    Unassigned,
    /// Heading for a claimed resource. An empty plan means "plan me".
    Traveling { goal: Coord, plan: VecDeque<Coord> },
    /// Pulling over to a roomier cell after a deadlock.
    Escaping { target: Coord, plan: VecDeque<Coord> },
    /// Standing on a resource until the tick it is depleted.
    Consuming { resource: Coord, until: Tick },
    /// Meal quota reached. Stays on the grid.
    Retired,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agent {
    pub id: AgentId,
    pub position: Coord,
    pub phase: AgentPhase,
    pub spawn_tick: Tick,
    /// Set once the agent has entered the grid.
    pub active: bool,
    pub stuck: u32,
    pub idle_ticks: u32,
    pub meals: u32,
    /// Most recent goal, kept after the claim is gone to bias escapes.
    pub last_goal: Option<Coord>,
}

impl Agent {
    pub fn new(id: AgentId, spawn: Coord, spawn_tick: Tick) -> Self {
        Self {
            id,
            position: spawn,
            phase: AgentPhase::Unassigned,
            spawn_tick,
            active: false,
            stuck: 0,
            idle_ticks: 0,
            meals: 0,
            last_goal: None,
        }
    }

    /// Active, not consuming and not retired.
    pub fn can_act(&self) -> bool {
        self.active && !self.is_consuming() && !self.is_retired()
    }

    pub fn is_consuming(&self) -> bool {
        matches!(self.phase, AgentPhase::Consuming { .. })
    }

    pub fn is_retired(&self) -> bool {
        matches!(self.phase, AgentPhase::Retired)
    }

    pub fn is_unassigned(&self) -> bool {
        matches!(self.phase, AgentPhase::Unassigned)
    }

    pub fn goal(&self) -> Option<Coord> {
        match &self.phase {
            AgentPhase::Traveling { goal, .. } => Some(*goal),
            _ => None,
        }
    }

    pub fn plan(&self) -> Option<&VecDeque<Coord>> {
        match &self.phase {
            AgentPhase::Traveling { plan, .. } | AgentPhase::Escaping { plan, .. } => Some(plan),
            _ => None,
        }
    }

    pub fn next_step(&self) -> Option<Coord> {
        self.plan().and_then(|p| p.front().copied())
    }

    /// Traveling with nothing planned.
    pub fn needs_plan(&self) -> bool {
        matches!(&self.phase, AgentPhase::Traveling { plan, .. } if plan.is_empty())
    }

    pub fn distance_to_goal(&self) -> Option<u32> {
        self.goal().map(|g| self.position.manhattan(g))
    }

    /// Head for `goal` with an empty plan.
    pub fn assign(&mut self, goal: Coord) {
        self.phase = AgentPhase::Traveling {
            goal,
            plan: VecDeque::new(),
        };
        self.last_goal = Some(goal);
    }

    pub fn set_plan(&mut self, steps: impl IntoIterator<Item = Coord>) {
        if let AgentPhase::Traveling { plan, .. } | AgentPhase::Escaping { plan, .. } = &mut self.phase {
            *plan = steps.into_iter().collect();
        }
    }

    /// Drop the plan. An escape without a plan is over.
    pub fn clear_plan(&mut self) {
        if matches!(self.phase, AgentPhase::Escaping { .. }) {
            self.phase = AgentPhase::Unassigned;
        } else {
            self.set_plan(std::iter::empty());
        }
    }

    pub fn unassign(&mut self) {
        if !self.is_retired() {
            self.phase = AgentPhase::Unassigned;
        }
    }

    pub fn escape(&mut self, target: Coord, steps: impl IntoIterator<Item = Coord>) {
        tracing::debug!(agent = %self.id, from = %self.position, to = %target, "Pulling over");
        self.phase = AgentPhase::Escaping {
            target,
            plan: steps.into_iter().collect(),
        };
        self.stuck = 0;
    }

    /// Take the next planned step (a move or a planned wait) ending at `to`.
    pub fn advance(&mut self, to: Coord) {
        if self.next_step() == Some(to) {
            if let AgentPhase::Traveling { plan, .. } | AgentPhase::Escaping { plan, .. } = &mut self.phase {
                plan.pop_front();
            }
        }
        self.position = to;
        if let AgentPhase::Escaping { target, plan } = &self.phase {
            if *target == self.position || plan.is_empty() {
                self.phase = AgentPhase::Unassigned;
            }
        }
    }

    pub fn start_consuming(&mut self, resource: Coord, until: Tick) {
        self.phase = AgentPhase::Consuming { resource, until };
        self.meals += 1;
        self.stuck = 0;
        self.idle_ticks = 0;
    }

    /// Leave the consuming phase, retiring once `max_meals` is reached.
    pub fn finish_consuming(&mut self, max_meals: u32) {
        if self.meals >= max_meals {
            tracing::debug!(agent = %self.id, meals = self.meals, "Agent retired");
            self.phase = AgentPhase::Retired;
        } else {
            self.phase = AgentPhase::Unassigned;
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn agent() -> Agent {
        let mut a = Agent::new(AgentId::new(0), Coord::new(0, 0), 0);
        a.active = true;
        a
    }

    #[test]
    fn test_new_agent_is_inactive_and_unassigned() {
        let a = Agent::new(AgentId::new(3), Coord::new(1, 2), 16);
        assert!(!a.active);
        assert!(!a.can_act());
        assert!(a.is_unassigned());
        assert_eq!(a.spawn_tick, 16);
    }

    #[test]
    fn test_travel_and_advance() {
        let mut a = agent();
        a.assign(Coord::new(2, 0));
        assert!(a.needs_plan());
        a.set_plan(vec![Coord::new(1, 0), Coord::new(2, 0)]);
        assert_eq!(a.next_step(), Some(Coord::new(1, 0)));
        a.advance(Coord::new(1, 0));
        assert_eq!(a.position, Coord::new(1, 0));
        assert_eq!(a.next_step(), Some(Coord::new(2, 0)));
        assert_eq!(a.distance_to_goal(), Some(1));
    }

    #[test]
    fn test_planned_wait_consumes_step() {
        let mut a = agent();
        a.assign(Coord::new(3, 0));
        a.set_plan(vec![Coord::new(0, 0), Coord::new(1, 0)]);
        a.advance(Coord::new(0, 0));
        assert_eq!(a.next_step(), Some(Coord::new(1, 0)));
    }

    #[test]
    fn test_escape_ends_at_target() {
        let mut a = agent();
        a.stuck = 7;
        a.escape(Coord::new(0, 1), vec![Coord::new(0, 1)]);
        assert_eq!(a.stuck, 0);
        assert!(a.goal().is_none());
        a.advance(Coord::new(0, 1));
        assert!(a.is_unassigned());
    }

    #[test]
    fn test_clearing_an_escape_ends_it() {
        let mut a = agent();
        a.escape(Coord::new(0, 2), vec![Coord::new(0, 1), Coord::new(0, 2)]);
        a.clear_plan();
        assert!(a.is_unassigned());

        a.assign(Coord::new(3, 0));
        a.set_plan(vec![Coord::new(1, 0)]);
        a.clear_plan();
        assert!(a.needs_plan());
    }

    #[test]
    fn test_consumption_and_retirement() {
        let mut a = agent();
        a.assign(Coord::new(1, 0));
        a.start_consuming(Coord::new(1, 0), 7);
        assert!(a.is_consuming());
        assert!(!a.can_act());
        a.finish_consuming(2);
        assert!(a.is_unassigned());
        a.start_consuming(Coord::new(2, 0), 14);
        a.finish_consuming(2);
        assert!(a.is_retired());
        a.unassign();
        assert!(a.is_retired());
        assert_eq!(a.last_goal, Some(Coord::new(1, 0)));
    }
}
