//! Discrete trading signal emitted by the classifier.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Three-class trading signal. Discriminants are the wire/label encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Signal {
    Hold = 0,
    Buy = 1,
    Sell = 2,
}

impl Signal {
    /// Class order used by confusion matrices and probability vectors.
    pub const ALL: [Signal; 3] = [Signal::Hold, Signal::Buy, Signal::Sell];

    pub const COUNT: usize = 3;

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(Signal::Hold),
            1 => Some(Signal::Buy),
            2 => Some(Signal::Sell),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Signal::Hold => "hold",
            Signal::Buy => "buy",
            Signal::Sell => "sell",
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_roundtrip() {
        for s in Signal::ALL {
            assert_eq!(Signal::from_index(s.index()), Some(s));
        }
        assert_eq!(Signal::from_index(3), None);
    }

    #[test]
    fn label_encoding_matches_discriminants() {
        assert_eq!(Signal::Hold as u8, 0);
        assert_eq!(Signal::Buy as u8, 1);
        assert_eq!(Signal::Sell as u8, 2);
    }
}
