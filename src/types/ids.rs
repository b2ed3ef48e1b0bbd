//! Strongly-typed identifiers.
//!
//! All IDs are validated at construction time and implement common traits.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

const ADJECTIVES: &[&str] = &[
    "amber", "brave", "calm", "clever", "crimson", "daring", "eager", "fancy", "gentle", "golden",
    "happy", "hidden", "jolly", "keen", "lively", "lucky", "mellow", "misty", "nimble", "proud",
    "quiet", "rapid", "silent", "steady", "swift", "tidy", "vivid", "witty", "young", "zesty",
];

const NOUNS: &[&str] = &[
    "badger", "beacon", "cedar", "comet", "falcon", "fern", "glacier", "harbor", "heron", "lantern",
    "lynx", "maple", "meadow", "otter", "panda", "pebble", "pine", "puffin", "raven", "river",
    "rocket", "sparrow", "summit", "thistle", "tiger", "tulip", "walrus", "willow", "wombat", "zephyr",
];

/// Produce a human-readable random name such as `brave-otter-042`.
pub fn random_name() -> String {
    let mut rng = rand::thread_rng();
    let adjective = ADJECTIVES.choose(&mut rng).copied().unwrap_or("plain");
    let noun = NOUNS.choose(&mut rng).copied().unwrap_or("id");
    let number: u16 = rng.gen_range(0..1000);
    format!("{adjective}-{noun}-{number:03}")
}

/// Macro to define a strongly-typed ID newtype wrapper.
///
/// Generates: struct, `from_string()`, `as_str()`, Display, Serialize, Deserialize.
/// Deserialization goes through `from_string()`, so the same checks apply.
/// With the `named` flag it also generates `generate()` (random readable name).
macro_rules! define_id {
    ($name:ident, named) => {
        define_id!($name);

        impl $name {
            pub fn generate() -> Self {
                Self(random_name())
            }
        }
    };
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            pub fn from_string(s: String) -> Result<Self, &'static str> {
                if s.is_empty() {
                    return Err(concat!(stringify!($name), " cannot be empty"));
                }
                Ok(Self(s))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl TryFrom<String> for $name {
            type Error = &'static str;

            fn try_from(s: String) -> Result<Self, Self::Error> {
                Self::from_string(s)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id!(CorrelationId, named);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_names_are_readable() {
        let id = CorrelationId::generate();
        let parts: Vec<&str> = id.as_str().split('-').collect();
        assert_eq!(parts.len(), 3);
        assert!(ADJECTIVES.contains(&parts[0]));
        assert!(NOUNS.contains(&parts[1]));
        assert_eq!(parts[2].len(), 3);
        assert!(parts[2].chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn test_empty_id_rejected() {
        assert!(CorrelationId::from_string(String::new()).is_err());
        let id = CorrelationId::from_string("upstream-1".to_string()).unwrap();
        assert_eq!(id.to_string(), "upstream-1");
    }

    #[test]
    fn test_deserialize_checks_like_constructor() {
        let err = serde_json::from_value::<CorrelationId>(serde_json::json!("")).unwrap_err();
        assert!(err.to_string().contains("cannot be empty"), "{err}");

        let id: CorrelationId = serde_json::from_value(serde_json::json!("quiet-heron-007")).unwrap();
        assert_eq!(id.as_str(), "quiet-heron-007");
        assert_eq!(serde_json::to_value(&id).unwrap(), serde_json::json!("quiet-heron-007"));
    }
}
