//! Error types for PADDOCK operations

use crate::{AgentId, Coord};
use thiserror::Error;

/// Grid construction errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GridError {
    #[error("Negative coordinate in grid input: {cell}")]
    NegativeCoordinate { cell: Coord },

    #[error("Duplicate cell in grid input: {cell}")]
    DuplicateCell { cell: Coord },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Failed to parse {format} configuration: {reason}")]
    Parse { format: String, reason: String },
}

/// Goal coordination errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CoordinationError {
    #[error("Claim on {resource} already held by {holder}")]
    ClaimHeld { resource: Coord, holder: AgentId },

    #[error("Resource {resource} is being consumed by {consumer}")]
    ResourceBusy { resource: Coord, consumer: AgentId },

    #[error("Resource {resource} has nothing left to consume")]
    ResourceDepleted { resource: Coord },
}

/// Master error type for all PADDOCK errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PaddockError {
    #[error("Grid error: {0}")]
    Grid(#[from] GridError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Coordination error: {0}")]
    Coordination(#[from] CoordinationError),
}

/// Result type alias for PADDOCK operations.
pub type PaddockResult<T> = Result<T, PaddockError>;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_error_display_duplicate() {
        let err = GridError::DuplicateCell {
            cell: Coord::new(3, 4),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("Duplicate cell"));
        assert!(msg.contains("(3, 4)"));
    }

    #[test]
    fn test_config_error_display_invalid_value() {
        let err = ConfigError::InvalidValue {
            field: "window".to_string(),
            value: "0".to_string(),
            reason: "window must be greater than 0".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("window"));
        assert!(msg.contains("greater than 0"));
    }

    #[test]
    fn test_coordination_error_display_claim_held() {
        let err = CoordinationError::ClaimHeld {
            resource: Coord::new(1, 0),
            holder: AgentId::new(7),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("(1, 0)"));
        assert!(msg.contains("agent-7"));
    }

    #[test]
    fn test_paddock_error_from_conversions() {
        let err: PaddockError = GridError::NegativeCoordinate {
            cell: Coord::new(-1, 0),
        }
        .into();
        assert!(matches!(err, PaddockError::Grid(_)));
        assert!(format!("{}", err).starts_with("Grid error"));

        let err: PaddockError = ConfigError::Parse {
            format: "toml".to_string(),
            reason: "expected a table".to_string(),
        }
        .into();
        assert!(matches!(err, PaddockError::Config(_)));
    }
}
