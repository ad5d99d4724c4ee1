//! End-to-end runs over small hand-built grids.

use paddock_core::{AgentId, Coord, GridContext, PaddockResult, SimConfig};
use paddock_sim::{simulate, AgentSeed, Simulation, Termination};
use paddock_test_utils::assertions::{assert_config_error, assert_well_formed};
use paddock_test_utils::fixtures::{
    checkerboard, contended_resource, grid_from_rows, quick_config, seeded, single_resource, walled_goal,
};
use paddock_test_utils::init_tracing;
use std::time::Duration;

fn c(col: i32, row: i32) -> Coord {
    Coord::new(col, row)
}

const FIRST: AgentId = AgentId::new(0);

#[test]
fn test_single_agent_consumes_adjacent_resource() -> PaddockResult<()> {
    init_tracing();
    let (ctx, plan) = single_resource()?;
    let result = Simulation::new(ctx, plan, SimConfig::standard())?.run();

    assert_eq!(result.position_at(FIRST, 0), Some(c(1, 1)));
    assert_eq!(result.position_at(FIRST, 1), Some(c(1, 0)));

    let arrivals = &result.arrivals[&c(1, 0)];
    assert_eq!(arrivals.len(), 1);
    assert_eq!(arrivals[0].tick, 1);
    assert_eq!(arrivals[0].residual, 3);

    let depletion = result.depletion_of(c(1, 0)).expect("resource depleted");
    assert_eq!(depletion.arrival_tick, 1);
    assert_eq!(depletion.depleted_tick, 7);

    assert_eq!(result.termination, Termination::ResourcesExhausted);
    assert_eq!(result.final_tick, 8);
    assert_eq!(result.stats.meals, vec![1]);
    assert_well_formed(&result, 6);
    Ok(())
}

#[test]
fn test_contended_resource_claimed_once() -> PaddockResult<()> {
    init_tracing();
    let (ctx, plan) = contended_resource()?;
    let mut sim = Simulation::new(ctx, plan, SimConfig::standard())?;

    assert_eq!(sim.step(), None);
    assert_eq!(sim.claims().len(), 1);
    assert_eq!(sim.claims().holder(c(1, 0)), Some(FIRST));
    assert!(sim.agents()[1].is_unassigned());

    let result = sim.run();
    assert_eq!(result.depletions.len(), 1);
    assert_eq!(result.depletions[0].agent, FIRST);
    assert_eq!(result.termination, Termination::ResourcesExhausted);
    assert_eq!(result.stats.total_meals(), 1);
    assert_well_formed(&result, 6);
    Ok(())
}

#[test]
fn test_walled_goal_pulls_over() -> PaddockResult<()> {
    init_tracing();
    let (ctx, plan) = walled_goal()?;
    let result = Simulation::new(ctx, plan, quick_config(30))?.run();

    for tick in 0..=6 {
        assert_eq!(result.position_at(FIRST, tick), Some(c(2, 0)), "tick {}", tick);
    }
    assert_eq!(result.position_at(FIRST, 7), Some(c(1, 0)));
    assert_eq!(result.stats.planning_failures, 6);
    assert_eq!(result.stats.escapes, 1);
    assert!(result.depletions.is_empty());
    assert_eq!(result.termination, Termination::TickLimit);
    assert_eq!(result.final_tick, 30);
    assert_well_formed(&result, 6);
    Ok(())
}

#[test]
fn test_no_resources_is_empty_input() -> PaddockResult<()> {
    let result = simulate(grid_from_rows(&["...", "..."])?, SimConfig::standard())?;
    assert_eq!(result.termination, Termination::EmptyInput);
    assert!(result.trajectories.is_empty());
    assert_eq!(result.final_tick, 0);

    let result = simulate(GridContext::from_cells(Vec::new())?, SimConfig::standard())?;
    assert_eq!(result.termination, Termination::EmptyInput);
    Ok(())
}

#[test]
fn test_invalid_config_rejected() -> PaddockResult<()> {
    let (ctx, plan) = single_resource()?;
    let mut config = SimConfig::standard();
    config.planning.window = 0;
    assert_config_error(&Simulation::new(ctx, plan, config));
    Ok(())
}

#[test]
fn test_quota_reached_when_everyone_retires() -> PaddockResult<()> {
    let ctx = grid_from_rows(&[".3.3", "...."])?;
    let mut config = SimConfig::standard();
    config.consumption.max_meals = 1;
    let seed = AgentSeed::new(c(1, 1), 0).with_goal(c(1, 0), vec![c(1, 0)]);
    let plan = seeded(&ctx, &config, vec![seed]);

    let result = Simulation::new(ctx, plan, config)?.run();
    assert_eq!(result.termination, Termination::QuotaReached);
    assert_eq!(result.final_tick, 8);
    assert_eq!(result.depletions.len(), 1);
    assert_eq!(result.stats.meals, vec![1]);
    Ok(())
}

#[test]
fn test_time_budget_stops_the_loop() -> PaddockResult<()> {
    let (ctx, plan) = walled_goal()?;
    let mut config = SimConfig::standard();
    config.budget.max_ticks = u32::MAX;
    config.budget.check_interval = 1;
    config.budget.time_budget = Duration::from_millis(1);

    let result = Simulation::new(ctx, plan, config)?.run();
    assert_eq!(result.termination, Termination::TimeBudget);
    assert!(result.stats.time_budget_exceeded);
    assert_well_formed(&result, 6);
    Ok(())
}

#[test]
fn test_depletion_reopens_terrain() -> PaddockResult<()> {
    // the 5 sits behind the 2 and only becomes reachable once the 2 is gone
    let ctx = grid_from_rows(&["25", ".#"])?;
    let seed = AgentSeed::new(c(0, 1), 0).with_goal(c(0, 0), vec![c(0, 0)]);
    let plan = seeded(&ctx, &SimConfig::standard(), vec![seed]);
    let mut sim = Simulation::new(ctx, plan, SimConfig::standard())?;
    assert!(!sim.terrain().is_passable(c(0, 0)));

    while sim.step().is_none() {
        if sim.field().amount(c(0, 0)) == 0 {
            assert!(sim.terrain().is_passable(c(0, 0)));
        }
    }
    let result = sim.into_result();
    assert_eq!(result.depletions.len(), 2);
    assert_eq!(result.termination, Termination::ResourcesExhausted);
    assert_well_formed(&result, 6);
    Ok(())
}

#[test]
fn test_drop_mode_run_is_well_formed() -> PaddockResult<()> {
    init_tracing();
    let ctx = checkerboard(7, 5, 2)?;
    let resources = ctx.resource_count();
    let result = simulate(ctx, quick_config(800))?;

    assert!(result.agent_count() > 1);
    assert!(!result.depletions.is_empty());
    assert!(result.depletions.len() <= resources);
    assert_well_formed(&result, 6);
    Ok(())
}

#[test]
fn test_funnel_run_enters_from_above() -> PaddockResult<()> {
    init_tracing();
    let ctx = checkerboard(7, 5, 2)?;
    let mut config = SimConfig::funnel();
    config.budget.max_ticks = 800;
    let result = simulate(ctx, config)?;

    let first = result.trajectories[0].iter().flatten().next().copied();
    assert!(first.is_some_and(|p| p.row < 0));
    assert!(!result.depletions.is_empty());
    assert_well_formed(&result, 6);
    Ok(())
}

#[test]
fn test_funnel_run_clears_a_crowded_grid() -> PaddockResult<()> {
    init_tracing();
    let ctx = checkerboard(21, 11, 3)?;
    let resources = ctx.resource_count();
    let mut config = SimConfig::funnel();
    config.budget.max_ticks = 2000;
    let result = simulate(ctx, config)?;

    assert_eq!(result.termination, Termination::ResourcesExhausted);
    assert_eq!(result.depletions.len(), resources);
    assert_well_formed(&result, 6);
    Ok(())
}

#[test]
fn test_result_serializes_to_json() -> PaddockResult<()> {
    let (ctx, plan) = single_resource()?;
    let result = Simulation::new(ctx, plan, SimConfig::standard())?.run();
    let json = serde_json::to_string(&result).expect("serialize");
    assert!(json.contains("resources_exhausted"));
    Ok(())
}
