//! Typed identifiers for platform entities.
//!
//! All ids are 64-bit snowflakes on the wire. Newtypes keep a guild id from
//! ever being handed to an API that wanted a user id.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

macro_rules! snowflake_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<u64> for $name {
            fn from(raw: u64) -> Self {
                Self(raw)
            }
        }

        impl FromStr for $name {
            type Err = ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim().parse().map(Self)
            }
        }
    };
}

snowflake_id!(
    /// An isolated community/server namespace. All moderation state is
    /// partitioned per guild.
    GuildId
);
snowflake_id!(
    /// A platform user account.
    UserId
);
snowflake_id!(
    /// A text channel within a guild, or a DM channel.
    ChannelId
);
snowflake_id!(
    /// A single chat message.
    MessageId
);
snowflake_id!(
    /// A guild role, used for level rewards.
    RoleId
);
