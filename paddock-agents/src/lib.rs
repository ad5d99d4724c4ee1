//! PADDOCK Agents - Multi-Agent Coordination
//!
//! Provides the coordination primitives the scheduler shares between agents:
//! - Time-indexed cell and edge reservations
//! - Goal claims with ages
//! - The per-agent phase machine

mod agent;
mod claims;
mod reservation;

pub use agent::{Agent, AgentPhase};
pub use claims::{Claim, ClaimChange, GoalClaims};
pub use reservation::{ReservationTable, ReservationView};
