//! Commit order for one tick.

use paddock_agents::Agent;
use paddock_core::{PriorityKey, PriorityPolicy, Tick};

/// Indices of the active agents in the order their moves are committed.
pub fn commit_order(agents: &[Agent], policy: &PriorityPolicy, tick: Tick) -> Vec<usize> {
    let mut keys: Vec<PriorityKey> = agents
        .iter()
        .enumerate()
        .filter(|(_, a)| a.active)
        .map(|(index, a)| PriorityKey {
            index,
            stuck: a.stuck,
            distance: a.distance_to_goal(),
        })
        .collect();
    policy.sort(&mut keys, tick, agents.len());
    keys.into_iter().map(|k| k.index).collect()
}
