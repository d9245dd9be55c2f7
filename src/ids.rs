//! Integer identifiers for the tracked entity kinds.
//!
//! Identifiers are opaque database keys. Wrapping them in newtypes keeps
//! an `AssetId` from being handed to an operation expecting a `PersonId`,
//! which raw `i64` values would happily allow.

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! id_type {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Wraps a raw database key.
            #[must_use]
            pub const fn new(raw: i64) -> Self {
                Self(raw)
            }

            /// Returns the raw database key.
            #[must_use]
            pub const fn raw(self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(raw: i64) -> Self {
                Self(raw)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

id_type! {
    /// Identifier of a tracked asset.
    AssetId
}

id_type! {
    /// Identifier of a person assets can be lent to.
    PersonId
}

id_type! {
    /// Identifier of an asset type (category).
    AssetTypeId
}

id_type! {
    /// Identifier of a single assignment interval.
    AssignmentId
}

id_type! {
    /// Identifier of a custom field definition.
    CustomFieldId
}
