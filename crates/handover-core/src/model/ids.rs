// ── Identity types ──
//
// Row identifiers are UUID strings on the wire. They stay opaque strings
// here so rows created by other clients (or seeded by hand) never fail to
// parse.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $name {
            type Err = std::convert::Infallible;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(s.to_owned()))
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }

        impl From<uuid::Uuid> for $name {
            fn from(u: uuid::Uuid) -> Self {
                Self(u.to_string())
            }
        }
    };
}

string_id! {
    /// Primary key of a row in the `announcements` table.
    ListingId
}

string_id! {
    /// Auth user id; the foreign key for listing ownership.
    UserId
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_transparent_on_the_wire() {
        let id = ListingId::from("6f1c2a9e-0000-4000-8000-00000000000a");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"6f1c2a9e-0000-4000-8000-00000000000a\"");

        let back: ListingId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn non_uuid_ids_are_accepted() {
        let id: UserId = "seed-user".parse().unwrap();
        assert_eq!(id.as_str(), "seed-user");
        assert_eq!(id.to_string(), "seed-user");
    }
}
