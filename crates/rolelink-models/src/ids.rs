//! Discord snowflake identifiers and the external user id.
//!
//! Discord names every guild, channel and role with a 64-bit "snowflake".
//! Each kind gets its own newtype so a role id can never be passed where a
//! guild id is expected.
//!
//! Snowflakes travel as decimal strings in JSON and environment variables;
//! [`FromStr`] and the serde impls accept and produce that form.
//!
//! The user id returned by the identity provider is kept as an opaque
//! string ([`ExternalUserId`]): it is forwarded verbatim as the game
//! backend custom id and only interpreted as a snowflake when a guild
//! member has to be looked up.

use std::fmt;
use std::num::NonZeroU64;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::ModelError;

macro_rules! snowflake_id {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(NonZeroU64);

        impl $name {
            /// Create an identifier from a raw snowflake.
            ///
            /// Returns `None` for `0`, which Discord never assigns.
            pub fn new(raw: u64) -> Option<Self> {
                NonZeroU64::new(raw).map(Self)
            }

            /// Return the raw snowflake value.
            pub fn get(self) -> u64 {
                self.0.get()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = ModelError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                parse_snowflake(s, $kind).map(Self)
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = String::deserialize(deserializer)?;
                raw.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

snowflake_id!(
    /// Identifier of a Discord guild (server).
    GuildId,
    "guild id"
);

snowflake_id!(
    /// Identifier of a Discord text channel.
    ChannelId,
    "channel id"
);

snowflake_id!(
    /// Identifier of a role inside a guild.
    RoleId,
    "role id"
);

/// Identifier of a user at the identity provider, as returned by the OAuth
/// profile endpoint.
///
/// Any non-empty string is accepted; it doubles verbatim as the PlayFab
/// custom id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExternalUserId(String);

impl ExternalUserId {
    /// Create a user id, trimming surrounding whitespace.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::MissingField`] when `raw` is blank.
    pub fn new(raw: impl Into<String>) -> Result<Self, ModelError> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ModelError::MissingField {
                field: "user id".into(),
            });
        }
        Ok(Self(trimmed.to_string()))
    }

    /// The id as received.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The id as a Discord snowflake, if it is one.
    pub fn snowflake(&self) -> Option<NonZeroU64> {
        parse_snowflake(&self.0, "user id").ok()
    }
}

impl fmt::Display for ExternalUserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ExternalUserId {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl Serialize for ExternalUserId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ExternalUserId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::new(raw).map_err(serde::de::Error::custom)
    }
}

fn parse_snowflake(s: &str, kind: &'static str) -> Result<NonZeroU64, ModelError> {
    let invalid = |reason: &str| ModelError::InvalidSnowflake {
        kind,
        value: s.to_string(),
        reason: reason.to_string(),
    };

    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Err(invalid("must not be empty"));
    }
    let raw: u64 = trimmed
        .parse()
        .map_err(|_| invalid("must be a positive integer"))?;
    NonZeroU64::new(raw).ok_or_else(|| invalid("must not be zero"))
}
