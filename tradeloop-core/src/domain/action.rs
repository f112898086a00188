//! Trade action — the discrete decision produced once per episode step.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Action {
    Buy,
    Sell,
    Hold,
}

impl Action {
    pub const ALL: [Action; 3] = [Action::Buy, Action::Sell, Action::Hold];

    /// BUY and SELL open exposure; HOLD does not.
    pub fn is_directional(&self) -> bool {
        matches!(self, Action::Buy | Action::Sell)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Buy => write!(f, "BUY"),
            Action::Sell => write!(f, "SELL"),
            Action::Hold => write!(f, "HOLD"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("not a trade action: {0:?}")]
pub struct ParseActionError(pub String);

impl FromStr for Action {
    type Err = ParseActionError;

    /// Case-insensitive exact match after trimming surrounding whitespace.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BUY" => Ok(Action::Buy),
            "SELL" => Ok(Action::Sell),
            "HOLD" => Ok(Action::Hold),
            _ => Err(ParseActionError(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_case_insensitively() {
        assert_eq!("buy".parse::<Action>(), Ok(Action::Buy));
        assert_eq!("  Sell\n".parse::<Action>(), Ok(Action::Sell));
        assert_eq!("HOLD".parse::<Action>(), Ok(Action::Hold));
    }

    #[test]
    fn rejects_anything_but_an_exact_token() {
        assert!("".parse::<Action>().is_err());
        assert!("BUY NOW".parse::<Action>().is_err());
        assert!("<think>BUY".parse::<Action>().is_err());
    }

    #[test]
    fn display_matches_wire_token() {
        for action in Action::ALL {
            assert_eq!(action.to_string().parse::<Action>(), Ok(action));
        }
        assert_eq!(serde_json::to_string(&Action::Sell).unwrap(), "\"SELL\"");
    }
}
