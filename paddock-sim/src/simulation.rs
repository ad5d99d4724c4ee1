//! The tick loop.
//!
//! Each tick runs the same phases in order: spawn, finish consumptions,
//! expire claims, adjacent claims, steals, escapes, goal selection, path
//! planning, final-approach reservations, then the movement commit. Agents
//! are visited in id order everywhere except the commit, which follows the
//! configured [`PriorityPolicy`](paddock_core::PriorityPolicy).

use crate::outcome::{Arrival, Depletion, Incident, SimulationResult, SimulationStats, Termination};
use crate::priority::commit_order;
use crate::terrain::Terrain;
use paddock_agents::{Agent, Claim, GoalClaims, ReservationTable, ReservationView};
use paddock_core::{AgentId, Bounds, Coord, GridContext, PaddockResult, ResourceField, SimConfig, Tick};
use paddock_planner::{
    estimate_eta, find_candidates, find_escape_target, pick_best, plan_targets, plan_windowed, AgentSeed, Candidate,
    TargetPlan, WindowOutcome, WindowQuery,
};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::Instant;

/// Plan and run a whole simulation over `ctx`.
pub fn simulate(ctx: GridContext, config: SimConfig) -> PaddockResult<SimulationResult> {
    let plan = plan_targets(&ctx, &config);
    Ok(Simulation::new(ctx, plan, config)?.run())
}

/// One run in progress.
#[derive(Debug)]
pub struct Simulation {
    ctx: GridContext,
    config: SimConfig,
    terrain: Terrain,
    agents: Vec<Agent>,
    seeds: Vec<AgentSeed>,
    base_distance: BTreeMap<Coord, u32>,
    bounds: Bounds,
    reservations: ReservationTable,
    claims: GoalClaims,
    /// Active agents by cell. Fixed between spawning and the commit.
    occupied: HashMap<Coord, AgentId>,
    tick: Tick,
    started: Option<Instant>,
    trajectories: Vec<Vec<Option<Coord>>>,
    arrivals: BTreeMap<Coord, Vec<Arrival>>,
    depletions: Vec<Depletion>,
    stats: SimulationStats,
    finished: Option<Termination>,
}

impl Simulation {
    /// Set up a run from a target plan. Fails only on invalid configuration.
    pub fn new(ctx: GridContext, plan: TargetPlan, config: SimConfig) -> PaddockResult<Self> {
        config.validate()?;

        let agents: Vec<Agent> = plan
            .agents
            .iter()
            .enumerate()
            .map(|(i, seed)| Agent::new(AgentId::new(i as u32), seed.spawn, seed.spawn_tick))
            .collect();
        let empty = ctx.is_empty() || ctx.resource_count() == 0 || agents.is_empty();

        let sim = Self {
            terrain: Terrain::new(&ctx, &plan),
            bounds: ctx.bounds(plan.entry_row),
            trajectories: vec![Vec::new(); agents.len()],
            stats: SimulationStats {
                meals: vec![0; agents.len()],
                ..SimulationStats::default()
            },
            agents,
            seeds: plan.agents,
            base_distance: plan.base_distance,
            reservations: ReservationTable::new(),
            claims: GoalClaims::new(),
            occupied: HashMap::new(),
            tick: 0,
            started: None,
            arrivals: BTreeMap::new(),
            depletions: Vec::new(),
            finished: empty.then_some(Termination::EmptyInput),
            ctx,
            config,
        };
        if empty {
            tracing::info!(cells = sim.ctx.cells().count(), agents = sim.agents.len(), "Nothing to simulate");
        }
        Ok(sim)
    }

    pub fn tick(&self) -> Tick {
        self.tick
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    pub fn claims(&self) -> &GoalClaims {
        &self.claims
    }

    pub fn reservations(&self) -> &ReservationTable {
        &self.reservations
    }

    pub fn field(&self) -> &ResourceField {
        self.terrain.field()
    }

    pub fn terrain(&self) -> &Terrain {
        &self.terrain
    }

    pub fn stats(&self) -> &SimulationStats {
        &self.stats
    }

    pub fn termination(&self) -> Option<Termination> {
        self.finished
    }

    /// Run until a termination condition holds.
    pub fn run(mut self) -> SimulationResult {
        let span = tracing::info_span!(
            "simulation",
            agents = self.agents.len(),
            resources = self.terrain.reachable_resources().len()
        );
        let _guard = span.enter();
        while self.step().is_none() {}
        self.into_result()
    }

    /// Advance one tick. Returns the termination once the run is over.
    pub fn step(&mut self) -> Option<Termination> {
        if let Some(done) = self.finished {
            return Some(done);
        }
        let t = self.tick;
        if t >= self.config.budget.max_ticks {
            return Some(self.finish(Termination::TickLimit));
        }
        let started = *self.started.get_or_insert_with(Instant::now);
        if t % self.config.budget.check_interval == 0 && started.elapsed() > self.config.budget.time_budget {
            self.stats.record(Incident::TimeBudgetExceeded);
            tracing::warn!(tick = t, elapsed_ms = started.elapsed().as_millis() as u64, "Time budget exceeded");
            return Some(self.finish(Termination::TimeBudget));
        }

        self.reservations.prune(t.saturating_sub(1));
        self.spawn_agents(t);
        self.record_positions();
        self.reserve_current(t);

        let dirty = self.finish_consumptions(t);
        self.expire_claims(t);
        self.claim_adjacent(t);
        self.steal_goals(t);
        self.escape_deadlocks(t);
        self.select_goals(t);
        self.plan_paths(t);
        self.reserve_final_approach(t);
        self.commit_moves(t);

        if dirty {
            self.terrain.refresh(&self.ctx);
        }
        self.tick = t + 1;

        if self.terrain.reachable_resources().is_empty() {
            return Some(self.finish(Termination::ResourcesExhausted));
        }
        if self.agents.iter().all(|a| a.active && a.is_retired()) {
            return Some(self.finish(Termination::QuotaReached));
        }
        None
    }

    /// Package everything recorded so far.
    pub fn into_result(self) -> SimulationResult {
        let termination = self.finished.unwrap_or(Termination::TickLimit);
        if termination == Termination::EmptyInput {
            return SimulationResult::empty();
        }
        let mut stats = self.stats;
        stats.meals = self.agents.iter().map(|a| a.meals).collect();
        SimulationResult {
            trajectories: self.trajectories,
            arrivals: self.arrivals,
            depletions: self.depletions,
            final_tick: self.tick,
            termination,
            stats,
        }
    }

    fn finish(&mut self, termination: Termination) -> Termination {
        self.record_positions();
        self.finished = Some(termination);
        tracing::info!(
            final_tick = self.tick,
            termination = ?termination,
            depleted = self.depletions.len(),
            incidents = self.stats.incidents(),
            "Simulation finished"
        );
        termination
    }

    // ========================================================================
    // BOOKKEEPING
    // ========================================================================

    fn record_positions(&mut self) {
        for (trajectory, agent) in self.trajectories.iter_mut().zip(&self.agents) {
            trajectory.push(agent.active.then_some(agent.position));
        }
    }

    fn record(&mut self, incident: Incident, agent: AgentId, tick: Tick) {
        self.stats.record(incident);
        tracing::debug!(agent = %agent, tick, incident = ?incident, "Incident");
    }

    fn window_end(&self, t: Tick) -> Tick {
        t + self.config.planning.window
    }

    /// Drop `agent`'s reservations after tick `t`.
    fn release_ahead(&mut self, agent: AgentId, t: Tick) {
        let end = self.window_end(t);
        self.reservations.release_range(agent, t + 1, end);
    }

    /// Someone else took `agent`'s claim.
    fn displace(&mut self, agent: AgentId, t: Tick) {
        self.agents[agent.index()].unassign();
        self.release_ahead(agent, t);
    }

    fn take_claim(&mut self, resource: Coord, agent: AgentId, t: Tick) -> bool {
        let change = self.claims.claim(resource, agent, t);
        match change.displaced {
            Some(prev) => {
                self.displace(prev, t);
                true
            }
            None => false,
        }
    }

    // ========================================================================
    // SPAWNING
    // ========================================================================

    fn spawn_agents(&mut self, t: Tick) {
        let mut taken: HashSet<Coord> = self
            .agents
            .iter()
            .filter(|a| a.active)
            .map(|a| a.position)
            .collect();

        for i in 0..self.agents.len() {
            let agent = &self.agents[i];
            if agent.active || t < agent.spawn_tick {
                continue;
            }
            let (id, spot) = (agent.id, agent.position);
            if !taken.insert(spot) {
                tracing::trace!(agent = %id, at = %spot, tick = t, "Spawn deferred");
                continue;
            }
            self.agents[i].active = true;

            if let Some(goal) = self.seeds[i].goal {
                if self.terrain.field().is_available(goal) {
                    match self.claims.try_claim(goal, id, t) {
                        Ok(_) => {
                            let plan = self.seeds[i].plan.clone();
                            let agent = &mut self.agents[i];
                            agent.assign(goal);
                            agent.set_plan(plan);
                        }
                        Err(e) => tracing::debug!(agent = %id, error = %e, "Initial goal taken"),
                    }
                }
            }
            tracing::debug!(agent = %id, at = %spot, tick = t, "Agent spawned");
        }

        self.occupied = self
            .agents
            .iter()
            .filter(|a| a.active)
            .map(|a| (a.position, a.id))
            .collect();
    }

    /// Every active agent holds its own cell now; retired agents hold it for
    /// the whole window.
    fn reserve_current(&mut self, t: Tick) {
        let end = self.window_end(t);
        for agent in self.agents.iter().filter(|a| a.active) {
            let last = if agent.is_retired() { end } else { t };
            for tick in t..=last {
                self.reservations.reserve(tick, agent.position, agent.id);
            }
        }
    }

    // ========================================================================
    // CLAIMS
    // ========================================================================

    fn finish_consumptions(&mut self, t: Tick) -> bool {
        let due = self.terrain.field().due(t);
        let duration = self.config.consumption.duration;
        let max_meals = self.config.consumption.max_meals;

        for &(resource, consumption) in &due {
            self.terrain.deplete(resource);
            self.claims.release_resource(resource);
            self.depletions.push(Depletion {
                resource,
                agent: consumption.agent,
                arrival_tick: consumption.done_tick.saturating_sub(duration),
                depleted_tick: t,
            });
            if let Some(agent) = self.agents.get_mut(consumption.agent.index()) {
                agent.finish_consuming(max_meals);
            }
            tracing::debug!(agent = %consumption.agent, resource = %resource, tick = t, "Resource depleted");
        }
        !due.is_empty()
    }

    /// Drop stale claims: too old, or held by an agent that is stuck, or
    /// held for a while by an agent that has been idle just as long.
    fn expire_claims(&mut self, t: Tick) {
        let rules = &self.config.claims;
        let agents = &self.agents;
        let dropped = self.claims.expire(|claim| {
            let holder = &agents[claim.holder.index()];
            if holder.is_consuming() {
                return false;
            }
            let idle = holder.idle_ticks >= rules.idle_release && claim.age(t) >= rules.idle_release;
            claim.age(t) > rules.ttl || holder.stuck >= rules.stuck_release || idle
        });

        for claim in dropped {
            tracing::trace!(agent = %claim.holder, resource = %claim.resource, tick = t, "Claim expired");
            self.displace(claim.holder, t);
        }
    }

    /// An agent next to an available resource takes it, unless another
    /// agent's fresh claim protects it.
    fn claim_adjacent(&mut self, t: Tick) {
        let min_age = self.config.claims.adjacent_steal_age;

        for i in 0..self.agents.len() {
            let agent = &self.agents[i];
            if !agent.can_act() {
                continue;
            }
            let (id, pos) = (agent.id, agent.position);
            let hit = pos.neighbors4().find(|&n| {
                if !self.ctx.in_bounds(n) || !self.terrain.field().is_available(n) {
                    return false;
                }
                if let Some(claim) = self.claims.get(n) {
                    if claim.holder != id && (claim.age(t) < min_age || !self.contestable(claim, id, t)) {
                        return false;
                    }
                }
                self.reservations.is_free(t + 1, n, id)
            });
            let Some(resource) = hit else {
                continue;
            };

            if self.agents[i].goal() != Some(resource) {
                self.release_ahead(id, t);
            }
            if self.take_claim(resource, id, t) {
                self.stats.steals += 1;
            }
            let agent = &mut self.agents[i];
            agent.assign(resource);
            agent.set_plan([resource]);
        }
    }

    /// An idle agent takes a nearer resource claimed by someone who would
    /// get there clearly later.
    fn steal_goals(&mut self, t: Tick) {
        for i in 0..self.agents.len() {
            let agent = &self.agents[i];
            if !agent.can_act() || agent.idle_ticks < 1 {
                continue;
            }
            let Some(own) = agent.goal() else {
                continue;
            };
            let (id, pos) = (agent.id, agent.position);
            let own_distance = pos.manhattan(own);

            let held: HashSet<Coord> = self
                .claims
                .iter()
                .filter(|claim| self.contestable(claim, id, t))
                .map(|claim| claim.resource)
                .collect();
            if held.is_empty() {
                continue;
            }
            let found = self.search(id, pos, |c| held.contains(&c));

            let prize = found.iter().find_map(|cand| {
                if pos.manhattan(cand.resource) >= own_distance {
                    return None;
                }
                let holder = self.claims.holder(cand.resource)?;
                self.outbids(pos, cand.resource, holder).then_some((cand.resource, holder))
            });
            let Some((resource, holder)) = prize else {
                continue;
            };

            self.release_ahead(id, t);
            self.take_claim(resource, id, t);
            self.agents[i].assign(resource);
            self.stats.steals += 1;
            tracing::debug!(agent = %id, from = %holder, resource = %resource, tick = t, "Goal stolen");
        }
    }

    // ========================================================================
    // ESCAPE AND SELECTION
    // ========================================================================

    fn escape_deadlocks(&mut self, t: Tick) {
        let threshold = self.config.escape.threshold;

        for i in 0..self.agents.len() {
            let agent = &self.agents[i];
            if !agent.can_act() || agent.stuck < threshold {
                continue;
            }
            let (id, pos) = (agent.id, agent.position);
            let bias = self.claims.claim_of(id).map(|c| c.resource).or(agent.last_goal);
            let target = find_escape_target(
                pos,
                bias,
                self.bounds,
                |c| self.terrain.is_passable(c),
                &self.config.escape,
            );

            let path = target.and_then(|to| {
                let outcome = self.plan_route(id, pos, to, t);
                outcome.makes_progress(pos, to).then(|| (to, outcome.into_path().unwrap_or_default()))
            });
            let Some((to, path)) = path else {
                self.record(Incident::Deadlock, id, t);
                continue;
            };

            self.release_ahead(id, t);
            if !self.reserve_path(id, pos, t, &path) {
                self.release_ahead(id, t);
                self.record(Incident::Deadlock, id, t);
                continue;
            }
            self.claims.release_agent(id);
            self.agents[i].escape(to, path);
            self.stats.escapes += 1;
        }
    }

    /// Unassigned agents pick the best nearby resource. One idle for
    /// `idle_release` ticks may also take a claimed resource it would reach
    /// clearly sooner than the holder.
    fn select_goals(&mut self, t: Tick) {
        let idle_release = self.config.claims.idle_release;

        for i in 0..self.agents.len() {
            if self.terrain.reachable_resources().is_empty() {
                break;
            }
            let agent = &self.agents[i];
            if !agent.can_act() || !agent.is_unassigned() {
                continue;
            }
            let (id, pos) = (agent.id, agent.position);
            let forced = agent.idle_ticks >= idle_release;
            let found = self.search(id, pos, |c| match self.claims.get(c) {
                None => true,
                Some(claim) => forced && self.contestable(claim, id, t) && self.outbids(pos, c, claim.holder),
            });
            let Some(best) = self.choose(id, &found) else {
                continue;
            };

            if self.take_claim(best.resource, id, t) {
                self.stats.steals += 1;
                tracing::debug!(agent = %id, resource = %best.resource, tick = t, "Claim taken over");
            }
            self.agents[i].assign(best.resource);
        }
    }

    // ========================================================================
    // PLANNING
    // ========================================================================

    fn plan_paths(&mut self, t: Tick) {
        let mut order: Vec<usize> = (0..self.agents.len())
            .filter(|&i| self.agents[i].can_act() && self.agents[i].needs_plan())
            .collect();
        order.sort_by_key(|&i| self.agents[i].distance_to_goal().unwrap_or(u32::MAX));

        for i in order {
            let agent = &self.agents[i];
            let Some(goal) = agent.goal() else {
                continue;
            };
            let (id, pos) = (agent.id, agent.position);

            self.release_ahead(id, t);
            let outcome = self.plan_route(id, pos, goal, t);

            if !outcome.makes_progress(pos, goal) {
                self.record(Incident::PlanningFailure, id, t);
                self.claims.release_agent(id);
                let found = self.search(id, pos, |c| c != goal && !self.claims.is_claimed(c));
                match self.choose(id, &found) {
                    Some(alt) => {
                        self.claims.claim(alt.resource, id, t);
                        self.agents[i].assign(alt.resource);
                    }
                    None => {
                        self.claims.claim(goal, id, t);
                        self.agents[i].stuck += 1;
                    }
                }
                continue;
            }

            // Only a committed move clears `stuck`; a fresh plan does not.
            let path = outcome.into_path().unwrap_or_default();
            if self.reserve_path(id, pos, t, &path) {
                self.agents[i].set_plan(path);
            } else {
                self.release_ahead(id, t);
                self.agents[i].stuck += 1;
                self.record(Incident::ResourceContention, id, t);
            }
        }
    }

    fn plan_route(&self, agent: AgentId, from: Coord, goal: Coord, t: Tick) -> WindowOutcome {
        let query = WindowQuery {
            agent,
            from,
            start_tick: t,
            goal,
            window: self.config.planning.window,
            bounds: self.bounds,
            relief: self.config.relief,
        };
        plan_windowed(&query, |c| c == goal || self.terrain.is_passable(c), &self.reservations)
    }

    /// Reserve the first `reserve_ahead` steps of `path`. Stops at the first
    /// conflict and returns false; the caller rolls back.
    fn reserve_path(&mut self, agent: AgentId, from: Coord, t: Tick, path: &[Coord]) -> bool {
        let relief = self.config.relief;
        let mut prev = from;
        for (k, &cell) in path.iter().take(self.config.planning.reserve_ahead as usize).enumerate() {
            let tick = t + 1 + k as Tick;
            if !relief.relaxes_cell(cell) {
                if !self.reservations.reserve(tick, cell, agent) {
                    return false;
                }
                if !relief.relaxes_edge(prev, cell) && !self.reservations.reserve_edge(tick, prev, cell, agent) {
                    return false;
                }
            }
            prev = cell;
        }
        true
    }

    /// Agents next to their goal lock in the last step.
    fn reserve_final_approach(&mut self, t: Tick) {
        for i in 0..self.agents.len() {
            let agent = &self.agents[i];
            if !agent.can_act() {
                continue;
            }
            let Some(goal) = agent.goal() else {
                continue;
            };
            let (id, pos) = (agent.id, agent.position);
            if !pos.is_adjacent(goal)
                || !self.reservations.is_free(t + 1, goal, id)
                || !self.reservations.edge_free(t + 1, pos, goal, id)
            {
                continue;
            }
            if agent.next_step() != Some(goal) {
                self.release_ahead(id, t);
                self.agents[i].set_plan([goal]);
            }
            self.reservations.reserve(t + 1, goal, id);
            self.reservations.reserve_edge(t + 1, pos, goal, id);
        }
    }

    // ========================================================================
    // COMMIT
    // ========================================================================

    /// Move agents in priority order. A move is refused when the target is
    /// occupied right now, consumed by someone else, promised to another
    /// agent, or its reservation clashes.
    fn commit_moves(&mut self, t: Tick) {
        let next = t + 1;
        let stall = self.config.planning.plan_stall_clear;
        let order = commit_order(&self.agents, &self.config.priority, t);
        let intents = self.reservations.take_tick(next);
        let mut occupied = std::mem::take(&mut self.occupied);

        for i in order {
            let agent = &self.agents[i];
            let (id, from) = (agent.id, agent.position);
            if !agent.can_act() {
                self.reservations.reserve(next, from, id);
                continue;
            }
            let to = agent.next_step().unwrap_or(from);

            if to == from {
                self.reservations.reserve(next, from, id);
                let agent = &mut self.agents[i];
                agent.idle_ticks += 1;
                if agent.next_step() == Some(from) {
                    agent.advance(from);
                }
                continue;
            }

            let enterable = self.terrain.is_passable(to) || agent.goal() == Some(to);
            let blocked = !enterable
                || occupied.contains_key(&to)
                || self.terrain.field().consumer(to).is_some_and(|c| c != id)
                || intents.get(&to).is_some_and(|&owner| owner != id)
                || !self.reservations.is_free(next, to, id)
                || !self.reservations.edge_free(next, from, to, id);
            if blocked {
                self.reservations.reserve(next, from, id);
                let agent = &mut self.agents[i];
                agent.stuck += 1;
                agent.idle_ticks += 1;
                if agent.stuck >= stall {
                    agent.clear_plan();
                }
                tracing::trace!(agent = %id, from = %from, to = %to, tick = t, "Move blocked");
                continue;
            }

            self.reservations.reserve(next, to, id);
            self.reservations.reserve_edge(next, from, to, id);
            occupied.remove(&from);
            occupied.insert(to, id);
            let agent = &mut self.agents[i];
            agent.advance(to);
            agent.stuck = 0;
            agent.idle_ticks = 0;
            self.arrive(i, to, next);
        }
        self.occupied = occupied;
    }

    /// Record an arrival on a resource cell and start consuming if it is
    /// still there.
    fn arrive(&mut self, i: usize, cell: Coord, tick: Tick) {
        let initial = self.ctx.initial_amount(cell);
        if initial == 0 {
            return;
        }
        let id = self.agents[i].id;
        self.arrivals.entry(cell).or_default().push(Arrival {
            tick,
            agent: id,
            residual: self.terrain.field().amount(cell),
            level: self.ctx.level_of(initial),
        });
        if !self.terrain.field().is_available(cell) {
            return;
        }

        let until = tick + self.config.consumption.duration;
        if let Err(e) = self.terrain.field_mut().start_consuming(cell, id, until) {
            tracing::warn!(agent = %id, resource = %cell, error = %e, "Could not start consuming");
            return;
        }
        self.take_claim(cell, id, tick - 1);
        self.reservations.release_range(id, tick + 1, self.window_end(tick));
        self.agents[i].start_consuming(cell, until);
        tracing::debug!(agent = %id, resource = %cell, until, "Consuming");
    }

    /// A claim `agent` could take over: someone else's, not already moved
    /// this tick, and not being consumed.
    fn contestable(&self, claim: &Claim, agent: AgentId, t: Tick) -> bool {
        claim.holder != agent && claim.since < t && !self.terrain.field().is_consuming(claim.resource)
    }

    /// `challenger` would reach `resource` at least `steal_margin` ticks
    /// before `holder`.
    fn outbids(&self, challenger: Coord, resource: Coord, holder: AgentId) -> bool {
        let scoring = &self.config.scoring;
        let base = self.base_distance.get(&resource).copied().unwrap_or(0);
        let mine = estimate_eta(challenger, resource, base, scoring);
        let theirs = estimate_eta(self.agents[holder.index()].position, resource, base, scoring);
        mine + self.config.claims.steal_margin <= theirs
    }

    /// Candidate search from `from`, restricted to available resources that
    /// pass `wanted` and approach cells no other agent stands on.
    fn search<W>(&self, agent: AgentId, from: Coord, wanted: W) -> Vec<Candidate>
    where
        W: Fn(Coord) -> bool,
    {
        find_candidates(
            from,
            self.bounds,
            self.config.claims.max_candidates,
            |c| self.terrain.is_passable(c),
            |c| self.terrain.field().is_available(c) && wanted(c),
            |c| self.occupied.get(&c).map_or(true, |&o| o == agent),
        )
    }

    fn choose(&self, agent: AgentId, found: &[Candidate]) -> Option<Candidate> {
        pick_best(
            found,
            &self.config.scoring,
            |r| self.ctx.initial_amount(r),
            |r| self.claims.holder(r).is_some_and(|h| h != agent),
        )
    }
}
