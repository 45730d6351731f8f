//! Player strength grammar and the rank-difference handicap rule

use crate::error::GameError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Largest handicap ever granted, regardless of the rank gap.
pub const MAX_HANDICAP: u8 = 9;

/// A validated rank string: `1k`..`30k`, `1d`..`9d` or `1p`..`9p`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Rank {
    Kyu(u8),
    Dan(u8),
    Pro(u8),
}

impl Rank {
    /// Position on a single ascending scale: 30k is 0, 1k is 29, 1d is 30,
    /// 9d is 38, 1p is 39 and 9p is 47.
    pub fn value(self) -> u8 {
        match self {
            Rank::Kyu(n) => 30 - n,
            Rank::Dan(n) => 29 + n,
            Rank::Pro(n) => 38 + n,
        }
    }
}

impl FromStr for Rank {
    type Err = GameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        let invalid = || GameError::InvalidRequest(format!("invalid rank: {:?}", s));

        let mut chars = normalized.chars();
        let suffix = chars.next_back().ok_or_else(invalid)?;
        let n: u8 = chars.as_str().parse().map_err(|_| invalid())?;

        match suffix {
            'k' if (1..=30).contains(&n) => Ok(Rank::Kyu(n)),
            'd' if (1..=9).contains(&n) => Ok(Rank::Dan(n)),
            'p' if (1..=9).contains(&n) => Ok(Rank::Pro(n)),
            _ => Err(invalid()),
        }
    }
}

impl TryFrom<String> for Rank {
    type Error = GameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Rank> for String {
    fn from(rank: Rank) -> Self {
        rank.to_string()
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rank::Kyu(n) => write!(f, "{}k", n),
            Rank::Dan(n) => write!(f, "{}d", n),
            Rank::Pro(n) => write!(f, "{}p", n),
        }
    }
}

/// Number of handicap stones for a pairing: the rank gap, capped at nine.
pub fn handicap_between(a: Rank, b: Rank) -> u8 {
    a.value().abs_diff(b.value()).min(MAX_HANDICAP)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rank_scale_endpoints() {
        assert_eq!("30k".parse::<Rank>().unwrap().value(), 0);
        assert_eq!("1k".parse::<Rank>().unwrap().value(), 29);
        assert_eq!("1d".parse::<Rank>().unwrap().value(), 30);
        assert_eq!("9d".parse::<Rank>().unwrap().value(), 38);
        assert_eq!("1p".parse::<Rank>().unwrap().value(), 39);
        assert_eq!("9p".parse::<Rank>().unwrap().value(), 47);
    }

    #[test]
    fn test_rank_parsing_normalizes() {
        assert_eq!(" 5K ".parse::<Rank>().unwrap(), Rank::Kyu(5));
        assert_eq!("3D".parse::<Rank>().unwrap(), Rank::Dan(3));
    }

    #[test]
    fn test_rank_rejects_out_of_grammar() {
        for bad in ["", "k", "0k", "31k", "10d", "10p", "5x", "-1k", "abc"] {
            assert!(bad.parse::<Rank>().is_err(), "accepted {:?}", bad);
        }
    }

    #[test]
    fn test_handicap_between() {
        let five_kyu: Rank = "5k".parse().unwrap();
        let one_dan: Rank = "1d".parse().unwrap();
        assert_eq!(handicap_between(five_kyu, one_dan), 5);
        assert_eq!(handicap_between(one_dan, five_kyu), 5);

        let beginner: Rank = "25k".parse().unwrap();
        assert_eq!(handicap_between(beginner, one_dan), MAX_HANDICAP);
        assert_eq!(handicap_between(one_dan, one_dan), 0);
    }

    #[test]
    fn test_rank_serializes_as_string() {
        let json = serde_json::to_string(&Rank::Dan(2)).unwrap();
        assert_eq!(json, "\"2d\"");
        let back: Rank = serde_json::from_str("\"12k\"").unwrap();
        assert_eq!(back, Rank::Kyu(12));
        assert!(serde_json::from_str::<Rank>("\"40k\"").is_err());
    }
}
