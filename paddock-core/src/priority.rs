//! Movement priority for the commit phase.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// One ordering criterion. Earlier criteria dominate later ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriorityCriterion {
    /// Higher stuck counter moves first.
    MostStuck,
    /// Smaller Manhattan distance to the goal moves first. No goal sorts last.
    NearestGoal,
    /// `(index + tick) % n` ascending, so the head of the line rotates.
    RoundRobin,
}

/// What the policy needs to know about one agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriorityKey {
    pub index: usize,
    pub stuck: u32,
    pub distance: Option<u32>,
}

/// Ordered list of criteria deciding who commits first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorityPolicy {
    pub criteria: Vec<PriorityCriterion>,
}

impl PriorityPolicy {
    pub fn standard() -> Self {
        Self {
            criteria: vec![
                PriorityCriterion::MostStuck,
                PriorityCriterion::NearestGoal,
                PriorityCriterion::RoundRobin,
            ],
        }
    }

    /// Compare two keys. `population` is the total agent count.
    pub fn compare(&self, a: &PriorityKey, b: &PriorityKey, tick: u32, population: usize) -> Ordering {
        let n = population.max(1);
        for criterion in &self.criteria {
            let ord = match criterion {
                PriorityCriterion::MostStuck => b.stuck.cmp(&a.stuck),
                PriorityCriterion::NearestGoal => a
                    .distance
                    .unwrap_or(u32::MAX)
                    .cmp(&b.distance.unwrap_or(u32::MAX)),
                PriorityCriterion::RoundRobin => {
                    ((a.index + tick as usize) % n).cmp(&((b.index + tick as usize) % n))
                }
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        a.index.cmp(&b.index)
    }

    /// Sort `keys` into commit order.
    pub fn sort(&self, keys: &mut [PriorityKey], tick: u32, population: usize) {
        keys.sort_by(|a, b| self.compare(a, b, tick, population));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(index: usize, stuck: u32, distance: Option<u32>) -> PriorityKey {
        PriorityKey {
            index,
            stuck,
            distance,
        }
    }

    fn order(policy: &PriorityPolicy, mut keys: Vec<PriorityKey>, tick: u32) -> Vec<usize> {
        let n = keys.len();
        policy.sort(&mut keys, tick, n);
        keys.iter().map(|k| k.index).collect()
    }

    #[test]
    fn test_stuck_agents_move_first() {
        let p = PriorityPolicy::standard();
        let keys = vec![key(0, 0, Some(1)), key(1, 3, Some(9)), key(2, 1, None)];
        assert_eq!(order(&p, keys, 0), vec![1, 2, 0]);
    }

    #[test]
    fn test_nearest_goal_breaks_stuck_ties() {
        let p = PriorityPolicy::standard();
        let keys = vec![key(0, 0, None), key(1, 0, Some(4)), key(2, 0, Some(2))];
        assert_eq!(order(&p, keys, 0), vec![2, 1, 0]);
    }

    #[test]
    fn test_round_robin_rotates_with_tick() {
        let p = PriorityPolicy::standard();
        let keys = vec![key(0, 0, Some(1)), key(1, 0, Some(1)), key(2, 0, Some(1))];
        assert_eq!(order(&p, keys.clone(), 0), vec![0, 1, 2]);
        // tick 1: (0+1)%3=1, (1+1)%3=2, (2+1)%3=0
        assert_eq!(order(&p, keys.clone(), 1), vec![2, 0, 1]);
        assert_eq!(order(&p, keys, 2), vec![1, 2, 0]);
    }

    #[test]
    fn test_custom_policy_order() {
        let p = PriorityPolicy {
            criteria: vec![PriorityCriterion::NearestGoal],
        };
        let keys = vec![key(0, 5, Some(3)), key(1, 0, Some(1))];
        assert_eq!(order(&p, keys, 0), vec![1, 0]);
    }
}
