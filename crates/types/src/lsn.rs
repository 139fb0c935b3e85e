use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// A log sequence number: a monotonically non-decreasing 64-bit position in a
/// write-ahead log. The wire form is the `HI/LO` hex pair (e.g. `1/16B9188`).
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Lsn(pub u64);

impl Lsn {
    /// The distinguished "nothing observed yet" value.
    pub const INVALID: Self = Self(0);

    /// Whether a position has actually been observed (not [`Self::INVALID`]).
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 != 0
    }
}

/// Error returned when parsing an LSN from its `HI/LO` wire form.
#[derive(Debug, Error)]
#[error("invalid LSN wire form: {0:?}")]
pub struct LsnParseError(pub String);

impl fmt::Display for Lsn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:X}/{:X}", self.0 >> 32, self.0 & 0xffff_ffff)
    }
}

impl fmt::Debug for Lsn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}

impl FromStr for Lsn {
    type Err = LsnParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (hi, lo) = s.split_once('/').ok_or_else(|| LsnParseError(s.into()))?;
        let hi = u64::from_str_radix(hi, 16).map_err(|_| LsnParseError(s.into()))?;
        let lo = u64::from_str_radix(lo, 16).map_err(|_| LsnParseError(s.into()))?;
        if hi > u64::from(u32::MAX) || lo > u64::from(u32::MAX) {
            return Err(LsnParseError(s.into()));
        }
        Ok(Self(hi << 32 | lo))
    }
}

impl From<u64> for Lsn {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

impl Serialize for Lsn {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Lsn {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_wire_form() {
        assert_eq!("1/16B9188".parse::<Lsn>().unwrap(), Lsn(0x1_016B_9188));
        assert_eq!("0/0".parse::<Lsn>().unwrap(), Lsn::INVALID);
    }

    #[test]
    fn display_round_trips() {
        for raw in [0u64, 1, 0x1_016B_9188, u64::MAX] {
            let lsn = Lsn(raw);
            assert_eq!(lsn.to_string().parse::<Lsn>().unwrap(), lsn);
        }
        assert_eq!(Lsn::INVALID.to_string(), "0/0");
    }

    #[test]
    fn numeric_ordering() {
        assert!(Lsn(5) < Lsn(6));
        assert!("2/0".parse::<Lsn>().unwrap() > "1/FFFFFFFF".parse::<Lsn>().unwrap());
    }

    #[test]
    fn rejects_garbage() {
        assert!("".parse::<Lsn>().is_err());
        assert!("12345".parse::<Lsn>().is_err());
        assert!("1/zzz".parse::<Lsn>().is_err());
        assert!("100000000/0".parse::<Lsn>().is_err());
    }
}
