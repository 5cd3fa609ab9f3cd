//! Opaque string identifiers and the generator that mints them.

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }
    };
}

string_id!(
    /// Identifier of a whole scenario document.
    ScenarioId
);
string_id!(
    /// Identifier of a phase module.
    ModuleId
);
string_id!(
    /// Identifier of an inject, unique across the scenario.
    InjectId
);
string_id!(DiscussionQuestionId);
string_id!(BranchOptionId);
string_id!(AttachmentId);
string_id!(MaterialId);
string_id!(ResponseOptionId);

/// Source of fresh identifiers.
///
/// Ids are UUID v4 strings built from the generator's random bytes, so a
/// seeded generator yields a reproducible id sequence.
#[derive(Debug, Clone)]
pub struct IdGen {
    rng: StdRng,
}

impl IdGen {
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Mint a fresh id of any identifier type.
    pub fn next<T: From<String>>(&mut self) -> T {
        let mut bytes = [0u8; 16];
        self.rng.fill_bytes(&mut bytes);
        T::from(uuid::Builder::from_random_bytes(bytes).into_uuid().to_string())
    }
}

impl Default for IdGen {
    fn default() -> Self {
        Self::from_entropy()
    }
}
