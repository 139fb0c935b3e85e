use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Error returned when parsing a tenant or timeline id from its hex form.
#[derive(Debug, Error)]
pub enum IdParseError {
    /// The input was not exactly 32 hex characters.
    #[error("id must be 32 hex characters, got {0}")]
    BadLength(usize),

    /// The input contained a non-hex character.
    #[error("invalid hex in id: {0}")]
    BadHex(#[from] hex::FromHexError),
}

macro_rules! opaque_id {
    ($name:ident, $doc:literal) => {
        #[doc = $doc]
        ///
        /// Opaque 128-bit identifier, rendered as 32 lowercase hex characters.
        /// Assigned externally at creation time and immutable afterwards.
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name([u8; 16]);

        impl $name {
            /// Wraps raw bytes as an id.
            #[must_use]
            pub const fn from_bytes(bytes: [u8; 16]) -> Self {
                Self(bytes)
            }

            /// Returns the raw byte representation.
            #[must_use]
            pub const fn as_bytes(&self) -> &[u8; 16] {
                &self.0
            }

            /// Generates a fresh random id. Only the external service assigns
            /// real ids; this exists for fixtures and tests.
            #[must_use]
            pub fn generate() -> Self {
                Self(rand::random())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&hex::encode(self.0))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self)
            }
        }

        impl FromStr for $name {
            type Err = IdParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                if s.len() != 32 {
                    return Err(IdParseError::BadLength(s.len()));
                }
                let mut bytes = [0u8; 16];
                hex::decode_to_slice(s, &mut bytes)?;
                Ok(Self(bytes))
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_string())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

opaque_id!(TenantId, "Identifier of a tenant, the isolation unit owning one or more timelines.");
opaque_id!(TimelineId, "Identifier of a timeline within a tenant.");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_round_trip() {
        let id = TenantId::generate();
        let rendered = id.to_string();
        assert_eq!(rendered.len(), 32);
        assert_eq!(rendered.parse::<TenantId>().unwrap(), id);
    }

    #[test]
    fn rejects_bad_length() {
        assert!(matches!(
            "abcd".parse::<TimelineId>(),
            Err(IdParseError::BadLength(4))
        ));
    }

    #[test]
    fn rejects_non_hex() {
        let s = "zz".repeat(16);
        assert!(matches!(
            s.parse::<TenantId>(),
            Err(IdParseError::BadHex(_))
        ));
    }

    #[test]
    fn serde_as_string() {
        let id: TenantId = "0123456789abcdef0123456789abcdef".parse().unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"0123456789abcdef0123456789abcdef\"");
        let back: TenantId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
