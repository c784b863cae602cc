//! Enumerated comparison operators used by threshold queries.

use std::fmt;
use std::str::FromStr;

use crate::ModelError;

/// A numeric comparison applied as `value <op> threshold`.
///
/// # Examples
///
/// ```
/// use ehr_types::ComparisonOperator;
///
/// let op: ComparisonOperator = ">=".parse().unwrap();
/// assert_eq!(op, ComparisonOperator::GreaterOrEqual);
/// assert!(op.evaluate(4.0, 4.0));
/// assert!(">>".parse::<ComparisonOperator>().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ComparisonOperator {
    /// `<`
    Less,
    /// `<=`
    LessOrEqual,
    /// `>`
    Greater,
    /// `>=`
    GreaterOrEqual,
    /// `==`
    Equal,
    /// `!=`
    NotEqual,
}

impl ComparisonOperator {
    /// All supported operators.
    pub const ALL: [ComparisonOperator; 6] = [
        Self::Less,
        Self::LessOrEqual,
        Self::Greater,
        Self::GreaterOrEqual,
        Self::Equal,
        Self::NotEqual,
    ];

    /// Creates an operator from its textual token.
    ///
    /// Returns `None` if the token is not a supported operator.
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "<" => Some(Self::Less),
            "<=" => Some(Self::LessOrEqual),
            ">" => Some(Self::Greater),
            ">=" => Some(Self::GreaterOrEqual),
            "==" => Some(Self::Equal),
            "!=" => Some(Self::NotEqual),
            _ => None,
        }
    }

    /// Returns the textual token for this operator.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Less => "<",
            Self::LessOrEqual => "<=",
            Self::Greater => ">",
            Self::GreaterOrEqual => ">=",
            Self::Equal => "==",
            Self::NotEqual => "!=",
        }
    }

    /// Evaluates `lhs <op> rhs`.
    pub fn evaluate(self, lhs: f64, rhs: f64) -> bool {
        match self {
            Self::Less => lhs < rhs,
            Self::LessOrEqual => lhs <= rhs,
            Self::Greater => lhs > rhs,
            Self::GreaterOrEqual => lhs >= rhs,
            Self::Equal => lhs == rhs,
            Self::NotEqual => lhs != rhs,
        }
    }
}

impl FromStr for ComparisonOperator {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_token(s).ok_or_else(|| ModelError::InvalidOperator {
            token: s.to_string(),
        })
    }
}

impl fmt::Display for ComparisonOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
