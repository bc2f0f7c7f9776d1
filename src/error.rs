//! Error types for the reasoning engine.
//!
//! All errors are strongly typed using thiserror. Unification failure is a
//! control outcome, not an error, and lives in [`crate::unify::UnifyFail`].

use thiserror::Error;

use crate::agent::AgentId;

/// Validation errors raised while constructing values or consuming configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Fuzzy degree {value} is out of range [0.0, 1.0]")]
    FuzzyOutOfRange {
        value: f64,
    },

    #[error("Functor cannot be empty")]
    EmptyFunctor,

    #[error("Literal '{literal}' is not ground")]
    NonGroundLiteral {
        literal: String,
    },

    #[error("Invalid configuration: {reason}")]
    InvalidConfig {
        reason: String,
    },
}

/// Errors raised while executing a single plan-body instruction.
///
/// These fail the current frame and propagate to its parent. They never
/// crash the agent.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InstructionError {
    #[error("Variable '{name}' is unbound")]
    UnboundVariable {
        name: String,
    },

    #[error("Type mismatch: expected {expected}, found '{found}'")]
    TypeMismatch {
        expected: &'static str,
        found: String,
    },

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Literal '{literal}' is not ground")]
    NonGround {
        literal: String,
    },

    #[error("Unification failed: {context}")]
    UnificationFailed {
        context: String,
    },

    #[error("No applicable plan for '{trigger}'")]
    NoApplicablePlan {
        trigger: String,
    },

    #[error("Action '{name}' failed: {reason}")]
    ActionFailed {
        name: String,
        reason: String,
    },

    #[error("Action '{name}' is not registered")]
    UnknownAction {
        name: String,
    },

    #[error("Action '{name}' needs at least {minimum} arguments, got {actual}")]
    ArgumentCount {
        name: String,
        minimum: usize,
        actual: usize,
    },

    #[error("Test '{expression}' failed with degree {degree}")]
    TestFailed {
        expression: String,
        degree: f64,
    },
}

impl InstructionError {
    /// Truth degree the failed instruction contributes to its frame.
    #[must_use]
    pub const fn truth(&self) -> f64 {
        match self {
            Self::TestFailed { degree, .. } => *degree,
            _ => 0.0,
        }
    }
}

/// Fatal configuration errors. Raised once while building an agent and abort
/// that agent's creation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigurationError {
    #[error("Plan '{plan}' references undefined action '{action}'")]
    UndefinedAction {
        plan: String,
        action: String,
    },

    #[error("Action '{name}' is registered twice")]
    DuplicateAction {
        name: String,
    },
}

/// Errors from the consistency subsystem. They never interrupt agent ticking.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConsistencyError {
    #[error("Metric '{metric}' failed: {reason}")]
    MetricFailed {
        metric: String,
        reason: String,
    },

    #[error("Agent {id} is not part of the population")]
    UnknownAgent {
        id: AgentId,
    },
}

/// Errors of the multi-agent worker pool.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeError {
    #[error("Queue '{pool}' is full (capacity {capacity})")]
    QueueFull {
        pool: String,
        capacity: usize,
    },

    #[error("Channel '{pool}' disconnected")]
    Disconnected {
        pool: String,
    },

    #[error("Timed out after {duration_ms}ms")]
    Timeout {
        duration_ms: u64,
    },
}

/// Top-level error type for the engine.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Instruction error: {0}")]
    Instruction(#[from] InstructionError),

    #[error("Fatal configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Consistency error: {0}")]
    Consistency(#[from] ConsistencyError),

    #[error("Runtime error: {0}")]
    Runtime(#[from] RuntimeError),

    #[error("Internal error: {message}")]
    Internal {
        message: String,
    },
}

impl EngineError {
    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true if this is a validation error.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns true if this is an instruction error.
    #[must_use]
    pub const fn is_instruction(&self) -> bool {
        matches!(self, Self::Instruction(_))
    }

    /// Returns true if this error aborts agent construction.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }

    /// Returns true if this is an internal error.
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        matches!(self, Self::Internal { .. })
    }

    /// Returns true if this error is retryable.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Runtime(RuntimeError::QueueFull { .. } | RuntimeError::Timeout { .. })
        )
    }
}

/// Result type alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_fuzzy() {
        let err = ValidationError::FuzzyOutOfRange { value: 1.2 };
        let msg = format!("{err}");
        assert!(msg.contains("1.2"));
        assert!(msg.contains("out of range"));
    }

    #[test]
    fn test_instruction_error_no_plan() {
        let err = InstructionError::NoApplicablePlan {
            trigger: "+!goal(1)".to_string(),
        };
        assert!(err.to_string().contains("+!goal(1)"));
    }

    #[test]
    fn test_configuration_error_is_fatal() {
        let err: EngineError = ConfigurationError::UndefinedAction {
            plan: "+!go".to_string(),
            action: "print".to_string(),
        }
        .into();
        assert!(err.is_fatal());
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("print"));
    }

    #[test]
    fn test_engine_error_from_instruction() {
        let err: EngineError = InstructionError::DivisionByZero.into();
        assert!(err.is_instruction());
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_engine_error_internal() {
        let err = EngineError::internal("unexpected state");
        assert!(err.is_internal());
        assert!(err.to_string().contains("unexpected state"));
    }

    #[test]
    fn test_engine_error_retryable() {
        let full: EngineError = RuntimeError::QueueFull {
            pool: "agents".to_string(),
            capacity: 4,
        }
        .into();
        assert!(full.is_retryable());

        let gone: EngineError = RuntimeError::Disconnected {
            pool: "agents".to_string(),
        }
        .into();
        assert!(!gone.is_retryable());

        let invalid: EngineError = ValidationError::EmptyFunctor.into();
        assert!(invalid.is_validation());
        assert!(!invalid.is_retryable());
    }
}
