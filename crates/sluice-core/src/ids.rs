//! Identifier types used across the engine.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            /// Create a new identifier.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Get the ID as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

string_id!(
    /// Obligor (borrower / counterparty) identifier.
    ObligorId
);

string_id!(
    /// Transaction identifier.
    TransactionId
);

string_id!(
    /// Tranche identifier (e.g. `senior`, `mezzanine`, `equity`).
    TrancheId
);

string_id!(
    /// Stress scenario identifier (e.g. `severe_recession`).
    ScenarioId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_order_and_display() {
        let a = ObligorId::new("OBL001");
        let b: ObligorId = "OBL002".into();
        assert!(a < b);
        assert_eq!(a.to_string(), "OBL001");
        assert_eq!(b.as_str(), "OBL002");
    }

    #[test]
    fn test_transparent_serde() {
        let id = TrancheId::new("senior");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"senior\"");
        let back: TrancheId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
