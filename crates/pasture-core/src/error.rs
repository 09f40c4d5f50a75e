//! Error taxonomy for the pasture model.
//!
//! Configuration problems are reported before the daily loop starts. Conservation
//! and allocation failures abort the day in which they are detected.
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PastureError {
    #[error("{name} = {value} is out of bounds [{min}, {max}]")]
    InvalidParameter {
        name: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("unknown {kind} '{value}'")]
    UnknownMethod { kind: &'static str, value: String },

    #[error("{what}: expected length {expected}, got {actual}")]
    LengthMismatch {
        what: String,
        expected: usize,
        actual: usize,
    },

    #[error("missing or non-finite input '{what}' on day {day}")]
    MissingInput { what: &'static str, day: u32 },

    #[error("mass balance lost in {context}: expected {expected}, got {actual}")]
    MassBalance {
        context: &'static str,
        expected: f64,
        actual: f64,
    },

    #[error("allocation error in {context}: requested {requested} but only {available} available")]
    Allocation {
        context: String,
        requested: f64,
        available: f64,
    },

    #[error("negative pool in {organ} stage {stage}: dm = {dm}, n = {n}")]
    NegativePool {
        organ: &'static str,
        stage: usize,
        dm: f64,
        n: f64,
    },

    #[error("negative demand {value} computed for {organ}")]
    NegativeDemand { organ: &'static str, value: f64 },

    #[error("plant is not alive; {0} is not possible after end of crop")]
    PlantNotAlive(&'static str),

    #[error("configuration could not be parsed: {0}")]
    Parse(String),
}

impl From<serde_json::Error> for PastureError {
    fn from(err: serde_json::Error) -> Self {
        PastureError::Parse(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PastureError>;

/// Divide, falling back to `default` when the denominator is zero or the
/// quotient is not finite.
pub fn divide(numerator: f64, denominator: f64, default: f64) -> f64 {
    if denominator == 0.0 {
        return default;
    }
    let q = numerator / denominator;
    if q.is_finite() {
        q
    } else {
        default
    }
}

/// Fail with [`PastureError::MassBalance`] if `actual` differs from `expected`
/// by more than `tolerance`.
pub fn check_balance(context: &'static str, expected: f64, actual: f64, tolerance: f64) -> Result<()> {
    if (expected - actual).abs() > tolerance {
        tracing::error!(context, expected, actual, "mass balance violated");
        return Err(PastureError::MassBalance {
            context,
            expected,
            actual,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn divide_guards_zero_denominator() {
        assert_eq!(divide(3.0, 0.0, 0.0), 0.0);
        assert_eq!(divide(3.0, 0.0, 1.0), 1.0);
        assert_eq!(divide(3.0, 1.5, 0.0), 2.0);
    }

    #[test]
    fn check_balance_within_tolerance() {
        assert!(check_balance("partition", 1.0, 1.00005, 1e-4).is_ok());
    }

    #[test]
    fn check_balance_reports_context() {
        let err = check_balance("partition", 1.0, 1.01, 1e-4).unwrap_err();
        assert!(err.to_string().contains("partition"));
        assert!(matches!(err, PastureError::MassBalance { .. }));
    }

    #[test]
    fn parameter_error_message_matches_bounds_format() {
        let err = PastureError::InvalidParameter {
            name: "light_extinction",
            value: 2.0,
            min: 0.1,
            max: 1.0,
        };
        assert_eq!(err.to_string(), "light_extinction = 2 is out of bounds [0.1, 1]");
    }
}
