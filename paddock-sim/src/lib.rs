//! PADDOCK Simulation - Discrete-Tick Scheduler
//!
//! Drives a population of agents across a grid of consumable resources:
//! - Target planning and staggered spawning
//! - Goal claims, steals and forced takeovers
//! - Windowed reservation-based planning with deadlock escape
//! - Collision-free movement commit and timed consumption
//!
//! The loop is single-threaded and deterministic apart from the wall-clock
//! budget check.

mod outcome;
mod priority;
mod simulation;
mod terrain;

pub use outcome::{Arrival, Depletion, Incident, SimulationResult, SimulationStats, Termination};
pub use priority::commit_order;
pub use simulation::{simulate, Simulation};
pub use terrain::Terrain;

pub use paddock_planner::{AgentSeed, TargetPlan};
