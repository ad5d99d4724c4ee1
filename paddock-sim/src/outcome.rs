//! What a finished run hands back to the renderer.

use paddock_core::{AgentId, Coord, ResourceLevel, Tick};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// EVENTS
// ============================================================================

/// An agent stepping onto a cell that started with a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Arrival {
    pub tick: Tick,
    pub agent: AgentId,
    /// Amount left on the cell when the agent arrived.
    pub residual: u32,
    /// Level bucket of the cell's initial amount.
    pub level: ResourceLevel,
}

/// A resource consumed down to zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Depletion {
    pub resource: Coord,
    pub agent: AgentId,
    pub arrival_tick: Tick,
    pub depleted_tick: Tick,
}

/// Why the loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// No reachable resource has anything left.
    ResourcesExhausted,
    /// Every agent has spawned and retired.
    QuotaReached,
    TickLimit,
    TimeBudget,
    /// No cells, no resources or no agents. Nothing was simulated.
    EmptyInput,
}

/// Non-fatal trouble the loop works around.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Incident {
    /// No path that makes progress toward the goal.
    PlanningFailure,
    /// A planned path could not be reserved.
    ResourceContention,
    /// Stuck past the escape threshold with nowhere to pull over.
    Deadlock,
    TimeBudgetExceeded,
}

// ============================================================================
// STATISTICS
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationStats {
    pub planning_failures: u32,
    pub contentions: u32,
    pub deadlocks: u32,
    pub time_budget_exceeded: bool,
    /// Claims taken from another agent, forced takeovers included.
    pub steals: u32,
    pub escapes: u32,
    /// Meals per agent, indexed by agent id.
    pub meals: Vec<u32>,
}

impl SimulationStats {
    pub fn record(&mut self, incident: Incident) {
        match incident {
            Incident::PlanningFailure => self.planning_failures += 1,
            Incident::ResourceContention => self.contentions += 1,
            Incident::Deadlock => self.deadlocks += 1,
            Incident::TimeBudgetExceeded => self.time_budget_exceeded = true,
        }
    }

    pub fn incidents(&self) -> u32 {
        self.planning_failures + self.contentions + self.deadlocks + u32::from(self.time_budget_exceeded)
    }

    pub fn total_meals(&self) -> u32 {
        self.meals.iter().sum()
    }
}

// ============================================================================
// RESULT
// ============================================================================

/// Trajectories and events of one run.
///
/// `trajectories[agent][tick]` is the agent's position at `tick`, `None`
/// before it spawns. Every trajectory holds `final_tick + 1` entries unless
/// the input was empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    pub trajectories: Vec<Vec<Option<Coord>>>,
    /// Arrivals per resource cell in tick order.
    #[serde(with = "paddock_core::serde_helpers::coord_map")]
    pub arrivals: BTreeMap<Coord, Vec<Arrival>>,
    pub depletions: Vec<Depletion>,
    pub final_tick: Tick,
    pub termination: Termination,
    pub stats: SimulationStats,
}

impl SimulationResult {
    pub fn empty() -> Self {
        Self {
            trajectories: Vec::new(),
            arrivals: BTreeMap::new(),
            depletions: Vec::new(),
            final_tick: 0,
            termination: Termination::EmptyInput,
            stats: SimulationStats::default(),
        }
    }

    pub fn agent_count(&self) -> usize {
        self.trajectories.len()
    }

    pub fn position_at(&self, agent: AgentId, tick: Tick) -> Option<Coord> {
        self.trajectories
            .get(agent.index())
            .and_then(|t| t.get(tick as usize))
            .copied()
            .flatten()
    }

    pub fn depletion_of(&self, resource: Coord) -> Option<&Depletion> {
        self.depletions.iter().find(|d| d.resource == resource)
    }
}

// =============================================================================
// TESTS
// =============================================================================
