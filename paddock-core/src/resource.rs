//! Mutable per-cell resource state.

use crate::{AgentId, CoordinationError, Coord, GridContext, PaddockResult, Tick};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// An agent consuming a resource, and the tick at which it finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Consumption {
    pub agent: AgentId,
    pub done_tick: Tick,
}

/// Current state of one input cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceCell {
    pub initial: u32,
    pub amount: u32,
    pub consuming: Option<Consumption>,
}

/// Amounts and consumption markers for every input cell.
///
/// Amounts only ever go down, and a resource goes from its initial amount to
/// zero in a single [`finalize`](ResourceField::finalize).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceField {
    cells: BTreeMap<Coord, ResourceCell>,
}

impl ResourceField {
    pub fn from_context(ctx: &GridContext) -> Self {
        let cells = ctx
            .cells()
            .map(|c| {
                (
                    c.coord,
                    ResourceCell {
                        initial: c.amount,
                        amount: c.amount,
                        consuming: None,
                    },
                )
            })
            .collect();
        Self { cells }
    }

    pub fn get(&self, c: Coord) -> Option<&ResourceCell> {
        self.cells.get(&c)
    }

    pub fn amount(&self, c: Coord) -> u32 {
        self.cells.get(&c).map(|cell| cell.amount).unwrap_or(0)
    }

    /// Present with a positive amount.
    pub fn is_live(&self, c: Coord) -> bool {
        self.amount(c) > 0
    }

    /// Present with nothing left: walkable terrain.
    pub fn is_open(&self, c: Coord) -> bool {
        matches!(self.cells.get(&c), Some(cell) if cell.amount == 0)
    }

    pub fn consumer(&self, c: Coord) -> Option<AgentId> {
        self.cells
            .get(&c)
            .and_then(|cell| cell.consuming)
            .map(|m| m.agent)
    }

    pub fn is_consuming(&self, c: Coord) -> bool {
        self.consumer(c).is_some()
    }

    /// Live resource nobody is consuming.
    pub fn is_available(&self, c: Coord) -> bool {
        matches!(self.cells.get(&c), Some(cell) if cell.amount > 0 && cell.consuming.is_none())
    }

    /// Mark `c` as consumed by `agent` until `done_tick`.
    pub fn start_consuming(&mut self, c: Coord, agent: AgentId, done_tick: Tick) -> PaddockResult<()> {
        let cell = match self.cells.get_mut(&c) {
            Some(cell) if cell.amount > 0 => cell,
            _ => return Err(CoordinationError::ResourceDepleted { resource: c }.into()),
        };
        if let Some(existing) = cell.consuming {
            if existing.agent != agent {
                return Err(CoordinationError::ResourceBusy {
                    resource: c,
                    consumer: existing.agent,
                }
                .into());
            }
        }
        cell.consuming = Some(Consumption { agent, done_tick });
        Ok(())
    }

    /// Consumptions whose completion tick has been reached.
    pub fn due(&self, tick: Tick) -> Vec<(Coord, Consumption)> {
        self.cells
            .iter()
            .filter_map(|(&c, cell)| cell.consuming.map(|m| (c, m)))
            .filter(|(_, m)| m.done_tick <= tick)
            .collect()
    }

    /// Drop the amount to zero and clear the marker.
    pub fn finalize(&mut self, c: Coord) -> Option<Consumption> {
        let cell = self.cells.get_mut(&c)?;
        let marker = cell.consuming.take();
        cell.amount = 0;
        marker
    }

    pub fn live_resources(&self) -> impl Iterator<Item = Coord> + '_ {
        self.cells
            .iter()
            .filter(|(_, cell)| cell.amount > 0)
            .map(|(&c, _)| c)
    }

    pub fn live_count(&self) -> usize {
        self.live_resources().count()
    }

    /// Resources that started positive and are now empty.
    pub fn depleted_count(&self) -> usize {
        self.cells
            .values()
            .filter(|cell| cell.initial > 0 && cell.amount == 0)
            .count()
    }
}

// =============================================================================
// TESTS
// =============================================================================
