//! Configuration types

use crate::{ConfigError, EntryRelief, PaddockError, PaddockResult, PriorityCriterion, PriorityPolicy};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

/// Windowed planning limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanningConfig {
    /// Ticks a single planning call may search ahead.
    pub window: u32,
    /// How many planned steps get reserved.
    pub reserve_ahead: u32,
    /// Blocked commits in a row before the plan is dropped.
    pub plan_stall_clear: u32,
}

/// Goal claim lifetimes and stealing thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimConfig {
    /// Claims older than this many ticks expire.
    pub ttl: u32,
    /// Stuck count at which the holder loses its claim.
    pub stuck_release: u32,
    /// Idle ticks after which an agent drops its claim and may take over others.
    pub idle_release: u32,
    /// Minimum age of another agent's claim before an adjacent agent may take it.
    pub adjacent_steal_age: u32,
    /// ETA advantage needed to steal a claim.
    pub steal_margin: u32,
    /// Candidate search stops after this many hits.
    pub max_candidates: usize,
}

/// Consumption timing and quota.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsumptionConfig {
    /// Ticks between arrival and depletion.
    pub duration: u32,
    /// Meals after which an agent retires.
    pub max_meals: u32,
}

/// Where agents appear.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpawnMode {
    /// On the approach cell of the first target.
    Drop,
    /// In the staging triangle above the grid.
    Funnel,
}

/// Agent population and spawn schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpawnConfig {
    pub mode: SpawnMode,
    /// Ticks between consecutive spawns.
    pub interval: u32,
    pub max_agents: u32,
    pub min_agents: u32,
    pub resources_per_agent: u32,
}

/// Tick and wall-clock limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetConfig {
    pub max_ticks: u32,
    /// Wall-clock limit, in milliseconds on the wire.
    #[serde(with = "crate::serde_helpers::duration_millis")]
    pub time_budget: Duration,
    /// The wall clock is read every this many ticks.
    pub check_interval: u32,
}

/// Candidate scoring weights. Lower scores win.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringPolicy {
    pub distance_weight: f64,
    pub richness_weight: f64,
    pub contention_penalty: f64,
    /// Added to ETAs of agents at or above the entry row.
    pub staging_eta_penalty: u32,
}

/// Deadlock escape search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EscapePolicy {
    /// Stuck count that triggers an escape.
    pub threshold: u32,
    pub radius: u32,
    pub min_open_neighbors: u32,
    /// Added when the candidate lies toward the entry.
    pub backward_penalty: u32,
    /// Added when the candidate is farther from the goal than the agent.
    pub goal_penalty: u32,
}

/// Master configuration struct.
/// ALL values are required - no serde defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimConfig {
    pub planning: PlanningConfig,
    pub claims: ClaimConfig,
    pub consumption: ConsumptionConfig,
    pub spawn: SpawnConfig,
    pub budget: BudgetConfig,
    pub scoring: ScoringPolicy,
    pub escape: EscapePolicy,
    pub relief: EntryRelief,
    pub priority: PriorityPolicy,
}

impl SimConfig {
    /// The tuned defaults used by the renderer.
    pub fn standard() -> Self {
        Self {
            planning: PlanningConfig {
                window: 30,
                reserve_ahead: 6,
                plan_stall_clear: 2,
            },
            claims: ClaimConfig {
                ttl: 80,
                stuck_release: 6,
                idle_release: 6,
                adjacent_steal_age: 6,
                steal_margin: 2,
                max_candidates: 8,
            },
            consumption: ConsumptionConfig {
                duration: 6,
                max_meals: 50,
            },
            spawn: SpawnConfig {
                mode: SpawnMode::Drop,
                interval: 8,
                max_agents: 40,
                min_agents: 5,
                resources_per_agent: 3,
            },
            budget: BudgetConfig {
                max_ticks: 4000,
                time_budget: Duration::from_secs(45),
                check_interval: 100,
            },
            scoring: ScoringPolicy {
                distance_weight: 2.0,
                richness_weight: 1.5,
                contention_penalty: 6.0,
                staging_eta_penalty: 1,
            },
            escape: EscapePolicy {
                threshold: 6,
                radius: 6,
                min_open_neighbors: 3,
                backward_penalty: 20,
                goal_penalty: 8,
            },
            relief: EntryRelief::Disabled,
            priority: PriorityPolicy::standard(),
        }
    }

    /// Standard values with agents queued in the staging funnel.
    pub fn funnel() -> Self {
        let mut config = Self::standard();
        config.spawn.mode = SpawnMode::Funnel;
        config.relief = EntryRelief::funnel();
        config
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(text: &str) -> PaddockResult<Self> {
        let config: SimConfig = toml::from_str(text).map_err(|e| ConfigError::Parse {
            format: "toml".to_string(),
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate a JSON document.
    pub fn from_json_str(text: &str) -> PaddockResult<Self> {
        let config: SimConfig = serde_json::from_str(text).map_err(|e| ConfigError::Parse {
            format: "json".to_string(),
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> PaddockResult<()> {
        positive("planning.window", self.planning.window)?;
        positive("planning.reserve_ahead", self.planning.reserve_ahead)?;
        if self.planning.reserve_ahead > self.planning.window {
            return Err(invalid(
                "planning.reserve_ahead",
                self.planning.reserve_ahead,
                "reserve_ahead must not exceed the planning window",
            ));
        }
        positive("planning.plan_stall_clear", self.planning.plan_stall_clear)?;

        positive("claims.ttl", self.claims.ttl)?;
        positive("claims.stuck_release", self.claims.stuck_release)?;
        positive("claims.idle_release", self.claims.idle_release)?;
        positive("claims.max_candidates", self.claims.max_candidates)?;

        positive("consumption.duration", self.consumption.duration)?;
        positive("consumption.max_meals", self.consumption.max_meals)?;

        positive("spawn.resources_per_agent", self.spawn.resources_per_agent)?;
        if self.spawn.min_agents > self.spawn.max_agents {
            return Err(invalid(
                "spawn.min_agents",
                self.spawn.min_agents,
                "min_agents must not exceed max_agents",
            ));
        }

        positive("budget.max_ticks", self.budget.max_ticks)?;
        positive("budget.check_interval", self.budget.check_interval)?;
        if self.budget.time_budget.is_zero() {
            return Err(invalid(
                "budget.time_budget",
                format!("{:?}", self.budget.time_budget),
                "time_budget must be positive",
            ));
        }

        for (field, weight) in [
            ("scoring.distance_weight", self.scoring.distance_weight),
            ("scoring.richness_weight", self.scoring.richness_weight),
            ("scoring.contention_penalty", self.scoring.contention_penalty),
        ] {
            if !weight.is_finite() || weight < 0.0 {
                return Err(invalid(field, weight, "weights must be finite and non-negative"));
            }
        }

        positive("escape.threshold", self.escape.threshold)?;
        positive("escape.radius", self.escape.radius)?;
        if !(1..=4).contains(&self.escape.min_open_neighbors) {
            return Err(invalid(
                "escape.min_open_neighbors",
                self.escape.min_open_neighbors,
                "a cell has between 1 and 4 neighbours",
            ));
        }

        if let EntryRelief::Funnel { chokepoint_row } = self.relief {
            if chokepoint_row >= 0 {
                return Err(invalid(
                    "relief.chokepoint_row",
                    chokepoint_row,
                    "chokepoint must lie above the grid (negative row)",
                ));
            }
        }

        if self.priority.criteria.is_empty() {
            return Err(invalid(
                "priority.criteria",
                "[]",
                "at least one criterion is required",
            ));
        }
        let unique: HashSet<PriorityCriterion> = self.priority.criteria.iter().copied().collect();
        if unique.len() != self.priority.criteria.len() {
            return Err(invalid(
                "priority.criteria",
                format!("{:?}", self.priority.criteria),
                "criteria must not repeat",
            ));
        }

        Ok(())
    }
}

fn invalid(field: &str, value: impl ToString, reason: &str) -> PaddockError {
    PaddockError::Config(ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    })
}

fn positive<T: PartialOrd + Default + ToString>(field: &str, value: T) -> PaddockResult<()> {
    if value <= T::default() {
        return Err(invalid(field, value, "must be greater than 0"));
    }
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================
