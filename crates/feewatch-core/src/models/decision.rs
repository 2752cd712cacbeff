//! Decision models

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::codec;
use crate::error::Result;

/// How the relative change is compared against the threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Comparator {
    /// Strictly greater than
    Gt,
    /// Greater than or equal to
    #[default]
    Gte,
}

impl Comparator {
    /// Apply the comparator
    pub fn holds<T: PartialOrd>(self, value: T, threshold: T) -> bool {
        match self {
            Self::Gt => value > threshold,
            Self::Gte => value >= threshold,
        }
    }

    /// Symbol used in reason strings
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Gt => ">",
            Self::Gte => ">=",
        }
    }
}

impl std::fmt::Display for Comparator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.symbol())
    }
}

impl std::str::FromStr for Comparator {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gt" | ">" => Ok(Self::Gt),
            "gte" | ">=" => Ok(Self::Gte),
            other => Err(crate::error::Error::config(format!(
                "unknown comparator '{other}' (expected gt or gte)"
            ))),
        }
    }
}

/// Result of one decision engine call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    /// Whether the relay should be invoked
    pub triggered: bool,

    /// ABI-encoded reason string
    pub reason: Bytes,
}

impl Decision {
    /// A positive decision with the given reason text
    pub fn trigger(reason: &str) -> Self {
        Self {
            triggered: true,
            reason: codec::encode_string(reason),
        }
    }

    /// A negative decision with the given reason text
    pub fn hold(reason: &str) -> Self {
        Self {
            triggered: false,
            reason: codec::encode_string(reason),
        }
    }

    /// Decode the reason payload back into text
    pub fn reason_text(&self) -> Result<String> {
        codec::decode_string(&self.reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_comparator_boundary() {
        assert!(Comparator::Gte.holds(3, 3));
        assert!(!Comparator::Gt.holds(3, 3));
        assert!(Comparator::Gt.holds(4, 3));
    }

    #[test]
    fn test_comparator_parse() {
        assert_eq!("gt".parse::<Comparator>().unwrap(), Comparator::Gt);
        assert_eq!(">=".parse::<Comparator>().unwrap(), Comparator::Gte);
        assert!("lt".parse::<Comparator>().is_err());
    }

    #[test]
    fn test_comparator_serde() {
        let json = serde_json::to_string(&Comparator::Gte).unwrap();
        assert_eq!(json, "\"gte\"");
    }

    #[test]
    fn test_reason_text() {
        let decision = Decision::hold("Insufficient data");
        assert!(!decision.triggered);
        assert_eq!(decision.reason_text().unwrap(), "Insufficient data");
    }
}
