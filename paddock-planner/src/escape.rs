//! Deadlock escape: find a roomier cell for a stuck agent to pull over to.

use paddock_core::{Bounds, Coord, EscapePolicy};

/// Search the square of `policy.radius` around `from` for a passable cell
/// with at least `policy.min_open_neighbors` passable neighbours.
///
/// Score is the Manhattan distance from `from`, plus `backward_penalty` for
/// cells on a row above the agent, plus `goal_penalty` for cells farther
/// from `goal` than the agent is. Cells are scanned row-major and a later cell
/// only wins with a strictly lower score. The agent's own cell is never
/// returned.
pub fn find_escape_target<P>(from: Coord, goal: Option<Coord>, bounds: Bounds, passable: P, policy: &EscapePolicy) -> Option<Coord>
where
    P: Fn(Coord) -> bool,
{
    let open = |c: Coord| bounds.contains(c) && passable(c);
    let radius = policy.radius as i32;
    let mut best: Option<(u32, Coord)> = None;

    for row in (from.row - radius)..=(from.row + radius) {
        for col in (from.col - radius)..=(from.col + radius) {
            let cell = Coord::new(col, row);
            if cell == from || !open(cell) {
                continue;
            }
            let room = cell.neighbors4().filter(|&n| open(n)).count() as u32;
            if room < policy.min_open_neighbors {
                continue;
            }
            let mut score = from.manhattan(cell);
            if row < from.row {
                score += policy.backward_penalty;
            }
            if let Some(g) = goal {
                if cell.manhattan(g) > from.manhattan(g) {
                    score += policy.goal_penalty;
                }
            }
            if best.map_or(true, |(s, _)| score < s) {
                best = Some((score, cell));
            }
        }
    }
    best.map(|(_, c)| c)
}

// =============================================================================
// TESTS
// =============================================================================
