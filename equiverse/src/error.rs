use derive_more::TryFrom;
use thiserror::Error;

/// Failures raised by engines and the orchestration around them.
///
/// The four variants mirror the codes that can be carried across the worker
/// isolation boundary; anything that does not fit the first three classes
/// must be mapped to [`EngineError::Other`].
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("runtime error: {0}")]
    RuntimeError(String),
    #[error("logic error: {0}")]
    LogicError(String),
    #[error("{0}")]
    Other(String),
}

impl EngineError {
    #[must_use]
    pub fn kind(&self) -> ExceptionKind {
        match self {
            EngineError::InvalidArgument(_) => ExceptionKind::InvalidArgument,
            EngineError::RuntimeError(_) => ExceptionKind::RuntimeError,
            EngineError::LogicError(_) => ExceptionKind::LogicError,
            EngineError::Other(_) => ExceptionKind::Other,
        }
    }
}

impl From<gatewise::CircuitError> for EngineError {
    fn from(err: gatewise::CircuitError) -> Self {
        use gatewise::CircuitError;
        match err {
            CircuitError::NonUnitary(_) | CircuitError::MeasurementNotDeferrable(_) => {
                EngineError::InvalidArgument(err.to_string())
            }
            CircuitError::UnknownLogicalQubit(_)
            | CircuitError::QubitNotIdle(_)
            | CircuitError::QubitOutOfRange(..) => EngineError::LogicError(err.to_string()),
        }
    }
}

/// Exception class codes carried across the isolation boundary.
///
/// Message text does not survive the boundary; the orchestrator re-raises a
/// fresh error of the matching class with a generic message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, TryFrom)]
#[try_from(repr)]
#[repr(i32)]
pub enum ExceptionKind {
    InvalidArgument = 1,
    RuntimeError = 2,
    LogicError = 3,
    Other = 99,
}

impl ExceptionKind {
    #[must_use]
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Reconstruct an error of this class in the orchestrating context.
    #[must_use]
    pub fn into_error(self, context: &str) -> EngineError {
        match self {
            ExceptionKind::InvalidArgument => EngineError::InvalidArgument(context.to_string()),
            ExceptionKind::RuntimeError => EngineError::RuntimeError(context.to_string()),
            ExceptionKind::LogicError => EngineError::LogicError(context.to_string()),
            ExceptionKind::Other => EngineError::Other(context.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_round_trip_through_codes() {
        for kind in [
            ExceptionKind::InvalidArgument,
            ExceptionKind::RuntimeError,
            ExceptionKind::LogicError,
            ExceptionKind::Other,
        ] {
            assert_eq!(ExceptionKind::try_from(kind.code()).unwrap(), kind);
        }
        assert!(ExceptionKind::try_from(0).is_err());
        assert!(ExceptionKind::try_from(7).is_err());
    }

    #[test]
    fn error_kind_matches_variant() {
        assert_eq!(
            EngineError::InvalidArgument("x".into()).kind(),
            ExceptionKind::InvalidArgument
        );
        assert_eq!(
            EngineError::Other("x".into()).kind(),
            ExceptionKind::Other
        );
    }

    #[test]
    fn reconstructed_errors_carry_the_class() {
        let err = ExceptionKind::LogicError.into_error("exception in parallel checker");
        assert!(matches!(err, EngineError::LogicError(_)));
    }
}
