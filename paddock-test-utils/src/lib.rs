//! PADDOCK Test Utilities
//!
//! Centralized test infrastructure for the PADDOCK workspace:
//! - Proptest generators for grids
//! - Fixtures for the common scheduling scenarios
//! - Assertions over simulation results

pub use paddock_core::{
    AgentId, ConfigError, Coord, GridCell, GridContext, PaddockError, PaddockResult, SimConfig,
};
pub use paddock_planner::{plan_targets, AgentSeed, TargetPlan};
pub use paddock_sim::{simulate, Simulation, SimulationResult, Termination};

use tracing_subscriber::EnvFilter;

/// Install a test-friendly subscriber once. `RUST_LOG` overrides the
/// default `warn` filter.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

// ============================================================================
// GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for generating grids.

    use super::*;
    use proptest::prelude::*;

    /// Mostly open terrain with the occasional rich cell.
    pub fn arb_amount() -> impl Strategy<Value = u32> {
        prop_oneof![
            3 => Just(0u32),
            2 => 1u32..=9,
        ]
    }

    /// Cells of a box up to `max_cols` x `max_rows`, with about one void in ten.
    pub fn arb_grid_cells(max_cols: i32, max_rows: i32) -> impl Strategy<Value = Vec<GridCell>> {
        (1..=max_cols, 1..=max_rows).prop_flat_map(|(cols, rows)| {
            prop::collection::vec(prop::option::weighted(0.9, arb_amount()), (cols * rows) as usize).prop_map(
                move |slots| {
                    slots
                        .into_iter()
                        .enumerate()
                        .filter_map(|(i, amount)| {
                            let i = i as i32;
                            amount.map(|a| GridCell::new(i % cols, i / cols, a))
                        })
                        .collect()
                },
            )
        })
    }

    pub fn arb_grid(max_cols: i32, max_rows: i32) -> impl Strategy<Value = GridContext> {
        arb_grid_cells(max_cols, max_rows).prop_filter_map("grid must build", |cells| GridContext::from_cells(cells).ok())
    }
}

// ============================================================================
// FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built grids and plans for the standard scenarios.

    use super::*;

    /// Parse rows of text: `#` is a void, `.` open terrain, a digit a
    /// resource of that amount.
    pub fn grid_from_rows(rows: &[&str]) -> PaddockResult<GridContext> {
        let mut cells = Vec::new();
        for (row, line) in rows.iter().enumerate() {
            for (col, ch) in line.chars().enumerate() {
                let amount = match ch {
                    '#' => continue,
                    '.' => 0,
                    d => d.to_digit(10).unwrap_or(1),
                };
                cells.push(GridCell::new(col as i32, row as i32, amount));
            }
        }
        GridContext::from_cells(cells)
    }

    /// Standard config with a short tick limit.
    pub fn quick_config(max_ticks: u32) -> SimConfig {
        let mut config = SimConfig::standard();
        config.budget.max_ticks = max_ticks;
        config
    }

    /// Plan `ctx` and replace the planned agents with `seeds`.
    pub fn seeded(ctx: &GridContext, config: &SimConfig, seeds: Vec<AgentSeed>) -> TargetPlan {
        plan_targets(ctx, config).with_agents(seeds)
    }

    /// 3x3 with one resource of 3 at (1,0) and an agent right below it,
    /// already heading there.
    pub fn single_resource() -> PaddockResult<(GridContext, TargetPlan)> {
        let ctx = grid_from_rows(&[".3.", "...", "..."])?;
        let seed = AgentSeed::new(Coord::new(1, 1), 0).with_goal(Coord::new(1, 0), vec![Coord::new(1, 0)]);
        let plan = seeded(&ctx, &SimConfig::standard(), vec![seed]);
        Ok((ctx, plan))
    }

    /// 3x2 with one resource at (1,0) and two goal-less agents equally far
    /// from it.
    pub fn contended_resource() -> PaddockResult<(GridContext, TargetPlan)> {
        let ctx = grid_from_rows(&[".3.", "..."])?;
        let seeds = vec![
            AgentSeed::new(Coord::new(0, 1), 0),
            AgentSeed::new(Coord::new(2, 1), 0),
        ];
        let plan = seeded(&ctx, &SimConfig::standard(), seeds);
        Ok((ctx, plan))
    }

    /// 6x3 where the goal at (4,0) is walled off from the agent at (2,0).
    pub fn walled_goal() -> PaddockResult<(GridContext, TargetPlan)> {
        let ctx = grid_from_rows(&["...#5.", "...##.", "....#."])?;
        let seed = AgentSeed::new(Coord::new(2, 0), 0).with_goal(Coord::new(4, 0), Vec::new());
        let plan = seeded(&ctx, &SimConfig::standard(), vec![seed]);
        Ok((ctx, plan))
    }

    /// `cols` x `rows` with a resource of `amount` on every other cell of
    /// every other row.
    pub fn checkerboard(cols: i32, rows: i32, amount: u32) -> PaddockResult<GridContext> {
        let cells = (0..rows).flat_map(|row| {
            (0..cols).map(move |col| {
                let rich = row % 2 == 0 && col % 2 == 1;
                GridCell::new(col, row, if rich { amount } else { 0 })
            })
        });
        GridContext::from_cells(cells)
    }
}

// ============================================================================
// ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions over errors and simulation results.

    use super::*;
    use std::collections::HashMap;

    #[track_caller]
    pub fn assert_ok<T: std::fmt::Debug>(result: &PaddockResult<T>) {
        assert!(result.is_ok(), "Expected Ok, got Err: {:?}", result);
    }

    #[track_caller]
    pub fn assert_config_error<T: std::fmt::Debug>(result: &PaddockResult<T>) {
        match result {
            Err(PaddockError::Config(_)) => {}
            other => panic!("Expected Config error, got: {:?}", other),
        }
    }

    /// Every trajectory covers ticks `0..=final_tick`.
    #[track_caller]
    pub fn assert_trajectory_lengths(result: &SimulationResult) {
        for (i, trajectory) in result.trajectories.iter().enumerate() {
            assert_eq!(
                trajectory.len(),
                result.final_tick as usize + 1,
                "agent {} trajectory length",
                i
            );
        }
    }

    /// No two agents share a cell at any tick.
    #[track_caller]
    pub fn assert_no_collisions(result: &SimulationResult) {
        let ticks = result.trajectories.iter().map(Vec::len).max().unwrap_or(0);
        for tick in 0..ticks {
            let mut seen: HashMap<Coord, usize> = HashMap::new();
            for (agent, trajectory) in result.trajectories.iter().enumerate() {
                if let Some(Some(pos)) = trajectory.get(tick) {
                    if let Some(other) = seen.insert(*pos, agent) {
                        panic!("agents {} and {} share {} at tick {}", other, agent, pos, tick);
                    }
                }
            }
        }
    }

    /// No two agents trade cells between consecutive ticks.
    #[track_caller]
    pub fn assert_no_swaps(result: &SimulationResult) {
        let steps = |t: &Vec<Option<Coord>>, tick: usize| match (t.get(tick), t.get(tick + 1)) {
            (Some(Some(a)), Some(Some(b))) if a != b => Some((*a, *b)),
            _ => None,
        };
        let ticks = result.trajectories.iter().map(Vec::len).max().unwrap_or(0);
        for tick in 0..ticks.saturating_sub(1) {
            let mut moves: HashMap<(Coord, Coord), usize> = HashMap::new();
            for (agent, trajectory) in result.trajectories.iter().enumerate() {
                if let Some(edge) = steps(trajectory, tick) {
                    moves.insert(edge, agent);
                }
            }
            for (&(a, b), &agent) in &moves {
                if let Some(&other) = moves.get(&(b, a)) {
                    panic!("agents {} and {} swap {} <-> {} at tick {}", agent, other, a, b, tick);
                }
            }
        }
    }

    /// Agents move at most one orthogonal step per tick and never vanish
    /// once spawned.
    #[track_caller]
    pub fn assert_unit_steps(result: &SimulationResult) {
        for (agent, trajectory) in result.trajectories.iter().enumerate() {
            for (tick, pair) in trajectory.windows(2).enumerate() {
                match (pair[0], pair[1]) {
                    (Some(a), Some(b)) => assert!(
                        a == b || a.is_adjacent(b),
                        "agent {} jumps {} -> {} at tick {}",
                        agent,
                        a,
                        b,
                        tick
                    ),
                    (Some(a), None) => panic!("agent {} vanished from {} at tick {}", agent, a, tick),
                    _ => {}
                }
            }
        }
    }

    /// Each resource is depleted at most once, exactly `duration` ticks
    /// after its consumer arrived, while the consumer stood on it.
    #[track_caller]
    pub fn assert_depletion_timing(result: &SimulationResult, duration: u32) {
        let mut seen = std::collections::HashSet::new();
        for d in &result.depletions {
            assert!(seen.insert(d.resource), "{} depleted twice", d.resource);
            assert_eq!(d.depleted_tick, d.arrival_tick + duration, "depletion timing of {}", d.resource);
            for tick in d.arrival_tick..=d.depleted_tick {
                assert_eq!(
                    result.position_at(d.agent, tick),
                    Some(d.resource),
                    "{} left {} at tick {}",
                    d.agent,
                    d.resource,
                    tick
                );
            }
        }
    }

    /// Arrivals per cell are in tick order and the amounts seen never grow.
    #[track_caller]
    pub fn assert_arrivals_monotone(result: &SimulationResult) {
        for (cell, arrivals) in &result.arrivals {
            for pair in arrivals.windows(2) {
                assert!(pair[0].tick <= pair[1].tick, "arrivals at {} out of order", cell);
                assert!(pair[0].residual >= pair[1].residual, "amount at {} grew", cell);
            }
        }
    }

    /// All of the above.
    #[track_caller]
    pub fn assert_well_formed(result: &SimulationResult, duration: u32) {
        assert_trajectory_lengths(result);
        assert_no_collisions(result);
        assert_no_swaps(result);
        assert_unit_steps(result);
        assert_depletion_timing(result, duration);
        assert_arrivals_monotone(result);
    }
}
