//! Walkable terrain as it changes with depletion.

use paddock_core::{Coord, GridContext, ResourceField};
use paddock_planner::{reachable_region, TargetPlan};
use std::collections::BTreeSet;

/// The resource field plus the staging funnel and the reachability tables
/// derived from them.
#[derive(Debug, Clone)]
pub struct Terrain {
    field: ResourceField,
    staging: BTreeSet<Coord>,
    reachable_empty: BTreeSet<Coord>,
    reachable_resources: BTreeSet<Coord>,
}

impl Terrain {
    pub fn new(ctx: &GridContext, plan: &TargetPlan) -> Self {
        Self {
            field: ResourceField::from_context(ctx),
            staging: plan.staging.clone(),
            reachable_empty: plan.reachable_empty.clone(),
            reachable_resources: plan.reachable_resources.clone(),
        }
    }

    pub fn field(&self) -> &ResourceField {
        &self.field
    }

    pub fn field_mut(&mut self) -> &mut ResourceField {
        &mut self.field
    }

    /// Staging cells and input cells with nothing left.
    pub fn is_passable(&self, c: Coord) -> bool {
        self.staging.contains(&c) || self.field.is_open(c)
    }

    pub fn is_staging(&self, c: Coord) -> bool {
        self.staging.contains(&c)
    }

    pub fn reachable_empty(&self) -> &BTreeSet<Coord> {
        &self.reachable_empty
    }

    pub fn reachable_resources(&self) -> &BTreeSet<Coord> {
        &self.reachable_resources
    }

    pub fn is_reachable_resource(&self, c: Coord) -> bool {
        self.reachable_resources.contains(&c)
    }

    /// Zero out a consumed resource and drop it from the reachable set.
    pub fn deplete(&mut self, c: Coord) {
        self.field.finalize(c);
        self.reachable_resources.remove(&c);
    }

    /// Recompute reachability after depletions opened new cells.
    pub fn refresh(&mut self, ctx: &GridContext) {
        let region = reachable_region(ctx, &self.field, &self.staging);
        self.reachable_resources = ctx
            .bordering_resources(region.order.iter(), &self.field)
            .into_iter()
            .collect();
        self.reachable_empty = region.order.into_iter().collect();
        tracing::trace!(
            open = self.reachable_empty.len(),
            resources = self.reachable_resources.len(),
            "Reachability refreshed"
        );
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use paddock_core::{GridCell, SimConfig};
    use paddock_planner::plan_targets;

    fn c(col: i32, row: i32) -> Coord {
        Coord::new(col, row)
    }

    #[test]
    fn test_depletion_opens_the_way() {
        // row 0: ". 2 5", the 5 is only reachable through the 2
        let ctx = GridContext::from_cells([
            GridCell::new(0, 0, 0),
            GridCell::new(1, 0, 2),
            GridCell::new(2, 0, 5),
        ])
        .expect("grid");
        let plan = plan_targets(&ctx, &SimConfig::standard());
        let mut terrain = Terrain::new(&ctx, &plan);
        assert!(terrain.is_reachable_resource(c(1, 0)));
        assert!(!terrain.is_reachable_resource(c(2, 0)));
        assert!(!terrain.is_passable(c(1, 0)));

        terrain.deplete(c(1, 0));
        assert!(terrain.is_passable(c(1, 0)));
        assert!(!terrain.is_reachable_resource(c(1, 0)));

        terrain.refresh(&ctx);
        assert!(terrain.is_reachable_resource(c(2, 0)));
        assert!(terrain.reachable_empty().contains(&c(1, 0)));
    }

    #[test]
    fn test_staging_is_passable() {
        let ctx = GridContext::from_cells([GridCell::new(0, 0, 0), GridCell::new(1, 0, 4)]).expect("grid");
        let plan = plan_targets(&ctx, &SimConfig::funnel());
        let terrain = Terrain::new(&ctx, &plan);
        let staged = plan.staging.iter().next().copied().expect("staging cell");
        assert!(staged.row < 0);
        assert!(terrain.is_staging(staged));
        assert!(terrain.is_passable(staged));
    }
}
