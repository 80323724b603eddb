use serde_derive::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

macro_rules! opaque_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            #[inline]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            #[inline]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Numeric value of the id, if it is a plain integer string.
            #[inline]
            pub fn as_number(&self) -> Option<u64> {
                self.0.trim().parse().ok()
            }

            /// Returns `max(numeric ids) + 1`, or `0` when there are none.
            /// When the maximum is `u64::MAX` the lowest unused number is
            /// taken instead.
            pub fn next_available<'a, I>(ids: I) -> Self
            where
                I: IntoIterator<Item = &'a Self>,
            {
                let taken: BTreeSet<u64> = ids.into_iter().filter_map(Self::as_number).collect();

                let next = match taken.iter().next_back() {
                    None => 0,
                    Some(max) => max
                        .checked_add(1)
                        .or_else(|| (0..).zip(&taken).find(|(n, t)| n != *t).map(|(n, _)| n))
                        .unwrap_or(0),
                };

                Self(next.to_string())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            #[inline]
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl From<String> for $name {
            #[inline]
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl From<u32> for $name {
            #[inline]
            fn from(id: u32) -> Self {
                Self(id.to_string())
            }
        }
    };
}

opaque_id!(
    /// Identifier of a subject category. Opaque, but numeric in practice.
    ClassId
);

opaque_id!(
    /// Identifier of one subject within a class.
    TrackId
);
