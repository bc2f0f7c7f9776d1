use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::fuzzy::{validate_degree, Aggregation, DEFAULT_SUCCESS_THRESHOLD};

/// Per-agent configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Label used in logs and snapshots.
    pub name: String,
    /// Fold for plan scores and frame degrees.
    pub aggregation: Aggregation,
    /// Truth degree at which tests, guards and actions count as success.
    pub success_threshold: f64,
    /// Pending-trigger backlog above which a warning is logged. Events are
    /// never dropped.
    pub max_pending_events: usize,
    /// Intention reports kept until drained; the oldest go first.
    pub report_capacity: usize,
    /// Weight of the consistency score when a consistency reader is attached.
    pub consistency_bias: f64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: "agent".to_string(),
            aggregation: Aggregation::Mean,
            success_threshold: DEFAULT_SUCCESS_THRESHOLD,
            max_pending_events: 1024,
            report_capacity: 256,
            consistency_bias: 0.5,
        }
    }
}

impl AgentConfig {
    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidConfig` naming the offending field.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if validate_degree(self.success_threshold).is_err() {
            return Err(ValidationError::InvalidConfig {
                reason: format!("success_threshold {} not in [0, 1]", self.success_threshold),
            });
        }
        if validate_degree(self.consistency_bias).is_err() {
            return Err(ValidationError::InvalidConfig {
                reason: format!("consistency_bias {} not in [0, 1]", self.consistency_bias),
            });
        }
        if self.report_capacity == 0 {
            return Err(ValidationError::InvalidConfig {
                reason: "report_capacity must be positive".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(AgentConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_out_of_range() {
        let config = AgentConfig {
            success_threshold: 1.5,
            ..AgentConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ValidationError::InvalidConfig { reason }) if reason.contains("success_threshold")
        ));

        let config = AgentConfig {
            report_capacity: 0,
            ..AgentConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: AgentConfig = serde_json::from_str(r#"{"name": "scout", "aggregation": "min"}"#).unwrap();
        assert_eq!(config.name, "scout");
        assert_eq!(config.aggregation, Aggregation::Min);
        assert_eq!(config.report_capacity, 256);
    }
}
