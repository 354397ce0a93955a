//! Strongly typed identifier wrappers.
//!
//! All IDs are `Copy + Ord + Hash` so they can be used as map keys and sorted
//! collection elements without ceremony.  Unlike dense array indices, these
//! are the identifiers used by the persistence layer: node 7 is node 7 in
//! every trace, event, and error message.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Generate a typed ID wrapper around a primitive integer.
macro_rules! typed_id {
    ($(#[$attr:meta])* $vis:vis struct $name:ident($inner:ty);) => {
        $(#[$attr])*
        #[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Default, Serialize, Deserialize)]
        #[serde(transparent)]
        $vis struct $name(pub $inner);

        impl $name {
            /// The raw integer value.
            #[inline(always)]
            pub fn get(self) -> $inner {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<$inner> for $name {
            #[inline(always)]
            fn from(raw: $inner) -> $name {
                $name(raw)
            }
        }
    };
}

typed_id! {
    /// A city whose road network is routed independently of all others.
    pub struct CityId(u32);
}

typed_id! {
    /// A road-network node (intersection, hospital, or patient snap point).
    pub struct NodeId(u32);
}

typed_id! {
    /// A directed road segment.
    pub struct EdgeId(u32);
}

typed_id! {
    /// An emergency request.  Minted by the dispatcher, never reused.
    pub struct RequestId(u64);
}
