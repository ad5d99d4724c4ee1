//! Initial target planning: reachable region, (resource, approach) targets,
//! spawn positions and the staging funnel.

use paddock_core::{
    bfs_region, Coord, GridContext, Region, ResourceField, SimConfig, SpawnMode, Tick,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};

// ============================================================================
// PLAN TYPES
// ============================================================================

/// Where and when one agent enters, and what it heads for first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentSeed {
    pub spawn: Coord,
    pub goal: Option<Coord>,
    /// Initial steps, positions for the ticks after spawning.
    pub plan: Vec<Coord>,
    pub spawn_tick: Tick,
}

impl AgentSeed {
    pub fn new(spawn: Coord, spawn_tick: Tick) -> Self {
        Self {
            spawn,
            goal: None,
            plan: Vec::new(),
            spawn_tick,
        }
    }

    pub fn with_goal(mut self, goal: Coord, plan: Vec<Coord>) -> Self {
        self.goal = Some(goal);
        self.plan = plan;
        self
    }
}

/// Everything the simulation loop needs before tick 0.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetPlan {
    pub agents: Vec<AgentSeed>,
    /// Distance from the entry to each target's approach cell.
    #[serde(with = "paddock_core::serde_helpers::coord_map")]
    pub base_distance: BTreeMap<Coord, u32>,
    /// Open cells reachable at tick 0, staging cells included.
    pub reachable_empty: BTreeSet<Coord>,
    pub reachable_resources: BTreeSet<Coord>,
    /// Funnel cells above the grid. Empty in drop mode.
    pub staging: BTreeSet<Coord>,
    /// Topmost row agents may occupy.
    pub entry_row: i32,
}

impl TargetPlan {
    pub fn empty() -> Self {
        Self {
            agents: Vec::new(),
            base_distance: BTreeMap::new(),
            reachable_empty: BTreeSet::new(),
            reachable_resources: BTreeSet::new(),
            staging: BTreeSet::new(),
            entry_row: 0,
        }
    }

    /// Replace the planned agents, keeping the reachability tables.
    pub fn with_agents(mut self, agents: Vec<AgentSeed>) -> Self {
        self.agents = agents;
        self
    }

    pub fn agent_count(&self) -> usize {
        self.agents.len()
    }
}

/// A live resource and the open cell an agent eats it from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Target {
    pub resource: Coord,
    pub approach: Coord,
}

// ============================================================================
// REACHABILITY
// ============================================================================

/// Cells agents can walk to.
///
/// Without staging cells the BFS starts from the open cells next to live
/// resources. With a funnel it starts from the staging cells and may walk
/// through them.
pub fn reachable_region(ctx: &GridContext, field: &ResourceField, staging: &BTreeSet<Coord>) -> Region {
    if staging.is_empty() {
        bfs_region(ctx.depletion_seeds(field), |c| field.is_open(c))
    } else {
        bfs_region(staging.iter().copied(), |c| {
            staging.contains(&c) || field.is_open(c)
        })
    }
}

/// One target per live resource bordering `region`, in region visit order.
pub fn build_targets(ctx: &GridContext, field: &ResourceField, region: &Region) -> Vec<Target> {
    let mut seen: HashSet<Coord> = HashSet::new();
    let mut out = Vec::new();
    for &cell in &region.order {
        for n in cell.neighbors4() {
            if ctx.in_bounds(n) && field.is_live(n) && seen.insert(n) {
                out.push(Target {
                    resource: n,
                    approach: cell,
                });
            }
        }
    }
    out
}

// ============================================================================
// FUNNEL
// ============================================================================

/// Staging triangle above the grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunnelLayout {
    pub cells: BTreeSet<Coord>,
    /// One spawn cell per agent, filled row by row from row -3 upward.
    pub spawns: Vec<Coord>,
    pub entry_row: i32,
}

/// Lay out the funnel for `count` agents.
///
/// The gate row -1 spans `center-1..=center`, row -2 spans
/// `center-2..=center+1` and row -k spans `center-k..=center+k-1`, all
/// clamped to the grid columns.
pub fn funnel_layout(count: usize, center_col: i32, max_col: i32) -> FunnelLayout {
    let mut cells = BTreeSet::new();
    let mut spawns = Vec::with_capacity(count);
    let span = |row: i32, start: i32, end: i32, cells: &mut BTreeSet<Coord>| {
        let cols: Vec<i32> = (start.max(0)..=end.min(max_col)).collect();
        cells.extend(cols.iter().map(|&col| Coord::new(col, row)));
        cols
    };

    span(-1, center_col - 1, center_col, &mut cells);
    span(-2, center_col - 2, center_col + 1, &mut cells);

    let mut row = -3;
    while spawns.len() < count {
        let k = -row;
        let cols = span(row, center_col - k, center_col + k - 1, &mut cells);
        if cols.is_empty() {
            break;
        }
        for col in cols {
            if spawns.len() == count {
                break;
            }
            spawns.push(Coord::new(col, row));
        }
        row -= 1;
    }

    let entry_row = cells.iter().map(|c| c.row).min().unwrap_or(0);
    FunnelLayout {
        cells,
        spawns,
        entry_row,
    }
}

// ============================================================================
// TARGET PLANNER
// ============================================================================

/// Compute spawn cells, first goals and reachability tables.
pub fn plan_targets(ctx: &GridContext, config: &SimConfig) -> TargetPlan {
    let field = ResourceField::from_context(ctx);
    let cap = ctx.agent_cap(&config.spawn);
    if cap == 0 {
        return TargetPlan::empty();
    }

    let plan = match config.spawn.mode {
        SpawnMode::Drop => plan_drop(ctx, &field, cap, config.spawn.interval),
        SpawnMode::Funnel => plan_funnel(ctx, &field, cap, config.spawn.interval),
    };
    tracing::info!(
        agents = plan.agents.len(),
        resources = plan.reachable_resources.len(),
        reachable = plan.reachable_empty.len(),
        mode = ?config.spawn.mode,
        "Targets planned"
    );
    plan
}

fn plan_drop(ctx: &GridContext, field: &ResourceField, cap: usize, interval: u32) -> TargetPlan {
    let staging = BTreeSet::new();
    let region = reachable_region(ctx, field, &staging);
    let targets = build_targets(ctx, field, &region);
    let count = cap.min(region.len()).min(targets.len());

    // Prefer a fresh approach cell. Once those run out, queue on a used one
    // but never hand out a resource twice.
    let mut used: HashSet<Coord> = HashSet::new();
    let mut assigned: HashSet<Coord> = HashSet::new();
    let mut agents = Vec::with_capacity(count);
    for i in 0..count {
        let fresh = targets
            .iter()
            .find(|t| !used.contains(&t.approach) && !assigned.contains(&t.resource));
        let Some(target) = fresh.or_else(|| targets.iter().find(|t| !assigned.contains(&t.resource))) else {
            break;
        };
        used.insert(target.approach);
        assigned.insert(target.resource);
        agents.push(
            AgentSeed::new(target.approach, i as Tick * interval)
                .with_goal(target.resource, vec![target.resource]),
        );
    }

    finish(ctx, field, &region, &targets, agents, staging, 0)
}

fn plan_funnel(ctx: &GridContext, field: &ResourceField, cap: usize, interval: u32) -> TargetPlan {
    let center = ctx.center_col();
    let trial = funnel_layout(cap, center, ctx.max_col());
    let trial_region = reachable_region(ctx, field, &trial.cells);
    let count = cap.min(build_targets(ctx, field, &trial_region).len());

    let layout = funnel_layout(count, center, ctx.max_col());
    let region = reachable_region(ctx, field, &layout.cells);
    let targets = build_targets(ctx, field, &region);

    // Agents entering through the left gate column prefer resources on the
    // left half, the rest prefer the right half.
    let (left, right): (Vec<&Target>, Vec<&Target>) =
        targets.iter().partition(|t| t.resource.col < center);
    let mut assigned: HashSet<Coord> = HashSet::new();

    let mut agents = Vec::with_capacity(layout.spawns.len());
    for (i, &spawn) in layout.spawns.iter().enumerate() {
        let gate = spawn.col.clamp(center - 1, center);
        let (preferred, other) = if gate == center - 1 {
            (&left, &right)
        } else {
            (&right, &left)
        };
        let seed = AgentSeed::new(spawn, i as Tick * interval);
        let hit = match pick_free(preferred, &mut assigned) {
            Some(t) => Some(t),
            None => pick_free(other, &mut assigned),
        };
        agents.push(match hit {
            Some(t) => seed.with_goal(t.resource, Vec::new()),
            None => seed,
        });
    }

    finish(ctx, field, &region, &targets, agents, layout.cells, layout.entry_row)
}

fn pick_free<'a>(list: &[&'a Target], assigned: &mut HashSet<Coord>) -> Option<&'a Target> {
    let hit = list.iter().find(|t| !assigned.contains(&t.resource)).copied()?;
    assigned.insert(hit.resource);
    Some(hit)
}

fn finish(
    ctx: &GridContext,
    field: &ResourceField,
    region: &Region,
    targets: &[Target],
    agents: Vec<AgentSeed>,
    staging: BTreeSet<Coord>,
    entry_row: i32,
) -> TargetPlan {
    let base_distance = targets
        .iter()
        .map(|t| (t.resource, region.depth.get(&t.approach).copied().unwrap_or(0)))
        .collect();
    TargetPlan {
        agents,
        base_distance,
        reachable_empty: region.order.iter().copied().collect(),
        reachable_resources: ctx
            .bordering_resources(region.order.iter(), field)
            .into_iter()
            .collect(),
        staging,
        entry_row,
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use paddock_core::{GridCell, PaddockResult};

    fn c(col: i32, row: i32) -> Coord {
        Coord::new(col, row)
    }

    fn grid(rows: &[&str]) -> PaddockResult<GridContext> {
        let mut cells = Vec::new();
        for (r, line) in rows.iter().enumerate() {
            for (col, ch) in line.chars().enumerate() {
                match ch {
                    '#' => {}
                    '.' => cells.push(GridCell::new(col as i32, r as i32, 0)),
                    d => cells.push(GridCell::new(col as i32, r as i32, d.to_digit(10).unwrap_or(1))),
                }
            }
        }
        GridContext::from_cells(cells)
    }

    #[test]
    fn test_drop_mode_seeds() -> PaddockResult<()> {
        let ctx = grid(&["1.1", "..."])?;
        let plan = plan_targets(&ctx, &SimConfig::standard());

        assert_eq!(plan.agent_count(), 2);
        assert_eq!(
            plan.agents[0],
            AgentSeed::new(c(1, 0), 0).with_goal(c(2, 0), vec![c(2, 0)])
        );
        // every target shares the approach (1,0), so the second agent falls
        // back to the second target and spawns after the first has moved on
        assert_eq!(
            plan.agents[1],
            AgentSeed::new(c(1, 0), 8).with_goal(c(0, 0), vec![c(0, 0)])
        );
        assert_eq!(plan.base_distance.get(&c(0, 0)), Some(&0));
        assert_eq!(
            plan.reachable_resources,
            BTreeSet::from([c(0, 0), c(2, 0)])
        );
        assert_eq!(plan.entry_row, 0);
        assert!(plan.staging.is_empty());
        Ok(())
    }

    #[test]
    fn test_drop_mode_never_repeats_a_goal() -> PaddockResult<()> {
        // (2,0) and (0,0) share the approach (1,0); (4,0) has (3,0) to itself
        let ctx = grid(&["1.1.1", "....."])?;
        let plan = plan_targets(&ctx, &SimConfig::standard());

        assert_eq!(plan.agent_count(), 3);
        let goals: Vec<Option<Coord>> = plan.agents.iter().map(|a| a.goal).collect();
        assert_eq!(goals, vec![Some(c(2, 0)), Some(c(4, 0)), Some(c(0, 0))]);
        assert_eq!(plan.agents[1].spawn, c(3, 0));
        assert_eq!(plan.agents[2].spawn, c(1, 0));
        Ok(())
    }

    #[test]
    fn test_no_resources_no_agents() -> PaddockResult<()> {
        let ctx = grid(&["...", "..."])?;
        let plan = plan_targets(&ctx, &SimConfig::standard());
        assert_eq!(plan, TargetPlan::empty());

        let empty = GridContext::from_cells(Vec::new())?;
        assert_eq!(plan_targets(&empty, &SimConfig::funnel()), TargetPlan::empty());
        Ok(())
    }

    #[test]
    fn test_unreachable_resource_excluded() -> PaddockResult<()> {
        // (3,0) sits behind voids, with no open neighbour
        let ctx = grid(&["1.#1", "..##"])?;
        let plan = plan_targets(&ctx, &SimConfig::standard());
        assert_eq!(plan.reachable_resources, BTreeSet::from([c(0, 0)]));
        assert_eq!(plan.agent_count(), 1);
        Ok(())
    }

    #[test]
    fn test_funnel_layout_rows() {
        let layout = funnel_layout(5, 3, 6);
        assert_eq!(layout.spawns, vec![c(0, -3), c(1, -3), c(2, -3), c(3, -3), c(4, -3)]);
        assert_eq!(layout.cells.len(), 2 + 4 + 6);
        assert!(layout.cells.contains(&c(2, -1)));
        assert!(!layout.cells.contains(&c(1, -1)));
        assert_eq!(layout.entry_row, -3);
    }

    #[test]
    fn test_funnel_layout_clamped() {
        let layout = funnel_layout(8, 1, 2);
        // rows -3 and -4 hold three cells each, row -5 the last two agents
        assert_eq!(layout.spawns.len(), 8);
        assert_eq!(layout.spawns[6], c(0, -5));
        assert_eq!(layout.entry_row, -5);
        assert!(layout.cells.iter().all(|p| p.col >= 0 && p.col <= 2));
    }

    #[test]
    fn test_funnel_mode_seeds() -> PaddockResult<()> {
        let ctx = grid(&["1..1", "...."])?;
        let plan = plan_targets(&ctx, &SimConfig::funnel());

        assert_eq!(plan.agent_count(), 2);
        assert_eq!(plan.agents[0].spawn, c(0, -3));
        assert_eq!(plan.agents[1].spawn, c(1, -3));
        assert_eq!(plan.agents[0].goal, Some(c(0, 0)));
        assert_eq!(plan.agents[1].goal, Some(c(3, 0)));
        assert!(plan.agents.iter().all(|a| a.plan.is_empty()));
        assert_eq!(plan.agents[1].spawn_tick, 8);

        assert_eq!(plan.entry_row, -3);
        assert!(plan.staging.contains(&c(1, -1)));
        assert!(plan.reachable_empty.contains(&c(0, -2)));
        assert_eq!(plan.base_distance.get(&c(0, 0)), Some(&0));
        assert_eq!(plan.base_distance.get(&c(3, 0)), Some(&2));
        Ok(())
    }

    #[test]
    fn test_plan_json_shape() -> PaddockResult<()> {
        let ctx = grid(&["1."])?;
        let plan = plan_targets(&ctx, &SimConfig::standard());
        let json = serde_json::to_value(&plan).map_err(|e| paddock_core::ConfigError::Parse {
            format: "json".to_string(),
            reason: e.to_string(),
        })?;
        assert_eq!(json["agents"][0]["spawn"]["col"], 1);
        assert!(json["base_distance"].is_array());
        Ok(())
    }
}
