//! Nearest-resource search, candidate scoring and arrival estimates.

use paddock_core::{Bounds, Coord, ScoringPolicy};
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};

/// A resource an agent could head for, and the open cell it would eat from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub resource: Coord,
    pub approach: Coord,
    /// BFS steps from the searcher to `approach`.
    pub distance: u32,
}

/// Breadth-first search from `from` over `passable` cells.
///
/// Every visited cell is checked for neighbours accepted by `available`
/// before the search expands further, so candidates come out in distance
/// order. Approach cells rejected by `approach_ok` (occupied or reserved by
/// someone else) yield nothing. Each resource is recorded once. The search
/// stops after `max` hits.
pub fn find_candidates<P, A, O>(
    from: Coord,
    bounds: Bounds,
    max: usize,
    passable: P,
    available: A,
    approach_ok: O,
) -> Vec<Candidate>
where
    P: Fn(Coord) -> bool,
    A: Fn(Coord) -> bool,
    O: Fn(Coord) -> bool,
{
    let mut out: Vec<Candidate> = Vec::new();
    if max == 0 {
        return out;
    }
    let mut found: HashSet<Coord> = HashSet::new();
    let mut seen: HashSet<Coord> = HashSet::from([from]);
    let mut queue: VecDeque<(Coord, u32)> = VecDeque::from([(from, 0)]);

    while let Some((cur, dist)) = queue.pop_front() {
        if approach_ok(cur) {
            for n in cur.neighbors4() {
                if !bounds.contains(n) || !available(n) || !found.insert(n) {
                    continue;
                }
                out.push(Candidate {
                    resource: n,
                    approach: cur,
                    distance: dist,
                });
                if out.len() >= max {
                    return out;
                }
            }
        }
        for n in cur.neighbors4() {
            if !bounds.contains(n) || !passable(n) || !seen.insert(n) {
                continue;
            }
            queue.push_back((n, dist + 1));
        }
    }
    out
}

/// Score of one candidate. Lower is better.
pub fn score(candidate: &Candidate, policy: &ScoringPolicy, richness: u32, contended: bool) -> f64 {
    let mut s = policy.distance_weight * candidate.distance as f64
        - policy.richness_weight * richness as f64;
    if contended {
        s += policy.contention_penalty;
    }
    s
}

/// Pick the lowest-scoring candidate.
///
/// `richness` yields the initial amount of a resource, `contended` whether
/// another agent claims it. Ties go to the lower row, then the lower column.
pub fn pick_best<R, C>(candidates: &[Candidate], policy: &ScoringPolicy, richness: R, contended: C) -> Option<Candidate>
where
    R: Fn(Coord) -> u32,
    C: Fn(Coord) -> bool,
{
    candidates
        .iter()
        .map(|c| (score(c, policy, richness(c.resource), contended(c.resource)), c))
        .min_by(|(sa, a), (sb, b)| {
            sa.total_cmp(sb)
                .then(a.resource.row.cmp(&b.resource.row))
                .then(a.resource.col.cmp(&b.resource.col))
        })
        .map(|(_, c)| *c)
}

/// Rough arrival estimate in ticks, only meant for comparisons.
///
/// `base` is the precomputed distance from the entry to the resource's
/// approach cell. Agents still at or above the entry row pay
/// `staging_eta_penalty` so agents already inside the grid win ties.
pub fn estimate_eta(from: Coord, resource: Coord, base: u32, policy: &ScoringPolicy) -> u32 {
    let penalty = if from.row <= 0 {
        policy.staging_eta_penalty
    } else {
        0
    };
    base + from.manhattan(resource) + penalty
}

// =============================================================================
// TESTS
// =============================================================================
