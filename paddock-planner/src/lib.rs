//! PADDOCK Planner - Pathfinding and Goal Selection
//!
//! Pure algorithms over injected capabilities:
//! - Windowed time-expanded BFS against a reservation view
//! - Nearest-resource candidate search, scoring and ETA estimates
//! - Deadlock escape target search
//! - Initial target planning and the staging funnel

mod candidates;
mod escape;
mod targets;
mod window;

pub use candidates::{estimate_eta, find_candidates, pick_best, score, Candidate};
pub use escape::find_escape_target;
pub use targets::{
    build_targets, funnel_layout, plan_targets, reachable_region, AgentSeed, FunnelLayout, Target,
    TargetPlan,
};
pub use window::{plan_windowed, WindowOutcome, WindowQuery};
