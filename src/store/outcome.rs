//! Mutation outcomes and arithmetic operators.

use std::fmt;
use std::str::FromStr;

use crate::error::StoreError;
use crate::value::Value;

// == Outcome ==
/// What a compound mutation did. Skipped mutations never touch the backing file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The mutation was applied and persisted
    Applied,
    /// A non-array value was replaced by an array before appending
    Coerced,
    /// Nothing changed
    Skipped(Skip),
}

impl Outcome {
    pub(crate) fn type_mismatch(expected: &'static str, found: Option<&Value>) -> Self {
        Outcome::Skipped(Skip::TypeMismatch {
            expected,
            found: found.map_or("missing", Value::type_name),
        })
    }

    /// True unless the mutation was skipped.
    pub fn is_applied(&self) -> bool {
        !matches!(self, Outcome::Skipped(_))
    }
}

/// Reason a mutation was skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Skip {
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },
}

impl fmt::Display for Skip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Skip::TypeMismatch { expected, found } => {
                write!(f, "type mismatch: expected {}, found {}", expected, found)
            }
        }
    }
}

// == Math Operator ==
/// Arithmetic applied by `Database::math`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MathOp {
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl MathOp {
    /// Applies the operator with IEEE-754 semantics; division by zero is not rejected.
    pub fn apply(self, lhs: f64, rhs: f64) -> f64 {
        match self {
            MathOp::Add => lhs + rhs,
            MathOp::Subtract => lhs - rhs,
            MathOp::Multiply => lhs * rhs,
            MathOp::Divide => lhs / rhs,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            MathOp::Add => "+",
            MathOp::Subtract => "-",
            MathOp::Multiply => "*",
            MathOp::Divide => "/",
        }
    }
}

impl fmt::Display for MathOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for MathOp {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "+" => Ok(MathOp::Add),
            "-" => Ok(MathOp::Subtract),
            "*" => Ok(MathOp::Multiply),
            "/" => Ok(MathOp::Divide),
            other => Err(StoreError::InvalidOperator(other.to_string())),
        }
    }
}
