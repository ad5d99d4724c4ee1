//! Goal claim ledger.
//!
//! A claim binds one resource to one agent. Each agent holds at most one
//! claim and each resource has at most one holder.

use paddock_core::{AgentId, CoordinationError, Coord, PaddockResult, Tick};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// An active claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    pub resource: Coord,
    pub holder: AgentId,
    pub since: Tick,
}

impl Claim {
    pub fn age(&self, now: Tick) -> Tick {
        now.saturating_sub(self.since)
    }
}

/// Outcome of a forced claim.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClaimChange {
    /// Resource the claimant held before and gave up.
    pub released: Option<Coord>,
    /// Previous holder of the claimed resource.
    pub displaced: Option<AgentId>,
}

#[derive(Debug, Clone, Default)]
pub struct GoalClaims {
    by_resource: BTreeMap<Coord, Claim>,
    by_agent: HashMap<AgentId, Coord>,
}

impl GoalClaims {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `resource` for `agent` unless someone else holds it.
    ///
    /// Any other claim held by `agent` is released first.
    pub fn try_claim(&mut self, resource: Coord, agent: AgentId, tick: Tick) -> PaddockResult<Option<Coord>> {
        if let Some(existing) = self.by_resource.get(&resource) {
            if existing.holder != agent {
                return Err(CoordinationError::ClaimHeld {
                    resource,
                    holder: existing.holder,
                }
                .into());
            }
        }
        Ok(self.claim(resource, agent, tick).released)
    }

    /// Claim `resource` for `agent`, displacing any other holder.
    pub fn claim(&mut self, resource: Coord, agent: AgentId, tick: Tick) -> ClaimChange {
        let mut change = ClaimChange::default();
        if let Some(prev) = self.by_agent.get(&agent).copied() {
            if prev == resource {
                if let Some(claim) = self.by_resource.get_mut(&resource) {
                    claim.since = tick;
                }
                return change;
            }
            self.by_resource.remove(&prev);
            change.released = Some(prev);
        }
        if let Some(old) = self.by_resource.remove(&resource) {
            self.by_agent.remove(&old.holder);
            change.displaced = Some(old.holder);
        }
        self.by_resource.insert(
            resource,
            Claim {
                resource,
                holder: agent,
                since: tick,
            },
        );
        self.by_agent.insert(agent, resource);
        change
    }

    /// Drop whatever `agent` holds.
    pub fn release_agent(&mut self, agent: AgentId) -> Option<Coord> {
        let resource = self.by_agent.remove(&agent)?;
        self.by_resource.remove(&resource);
        Some(resource)
    }

    /// Drop the claim on `resource`.
    pub fn release_resource(&mut self, resource: Coord) -> Option<AgentId> {
        let claim = self.by_resource.remove(&resource)?;
        self.by_agent.remove(&claim.holder);
        Some(claim.holder)
    }

    pub fn holder(&self, resource: Coord) -> Option<AgentId> {
        self.by_resource.get(&resource).map(|c| c.holder)
    }

    pub fn claim_of(&self, agent: AgentId) -> Option<Claim> {
        self.by_agent
            .get(&agent)
            .and_then(|r| self.by_resource.get(r))
            .copied()
    }

    pub fn get(&self, resource: Coord) -> Option<&Claim> {
        self.by_resource.get(&resource)
    }

    pub fn is_claimed(&self, resource: Coord) -> bool {
        self.by_resource.contains_key(&resource)
    }

    /// Release every claim matching `expired`, returning what was dropped.
    pub fn expire<F>(&mut self, mut expired: F) -> Vec<Claim>
    where
        F: FnMut(&Claim) -> bool,
    {
        let dropped: Vec<Claim> = self
            .by_resource
            .values()
            .filter(|c| expired(c))
            .copied()
            .collect();
        for claim in &dropped {
            self.by_resource.remove(&claim.resource);
            self.by_agent.remove(&claim.holder);
        }
        dropped
    }

    pub fn iter(&self) -> impl Iterator<Item = &Claim> {
        self.by_resource.values()
    }

    pub fn len(&self) -> usize {
        self.by_resource.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_resource.is_empty()
    }
}

// =============================================================================
// TESTS
// =============================================================================
