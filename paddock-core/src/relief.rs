//! Entry congestion relief for the staging funnel.

use crate::Coord;
use serde::{Deserialize, Serialize};

/// Which reservation checks are waived near the grid entry.
///
/// With `Funnel`, destinations strictly above `chokepoint_row` ignore cell
/// reservations, and moves touching such rows ignore edge reservations. The
/// chokepoint row itself is always reserved. Collisions are still prevented
/// at commit time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntryRelief {
    Disabled,
    Funnel { chokepoint_row: i32 },
}

impl EntryRelief {
    pub fn funnel() -> Self {
        EntryRelief::Funnel { chokepoint_row: -1 }
    }

    pub fn relaxes_cell(&self, to: Coord) -> bool {
        match self {
            EntryRelief::Disabled => false,
            EntryRelief::Funnel { chokepoint_row } => to.row < *chokepoint_row,
        }
    }

    pub fn relaxes_edge(&self, from: Coord, to: Coord) -> bool {
        self.relaxes_cell(from) || self.relaxes_cell(to)
    }
}
