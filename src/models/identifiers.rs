use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

macro_rules! impl_id_type {
    ($name:ident) => {
        #[derive(Clone, Debug, Serialize, Deserialize)]
        pub struct $name(String);

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
                write!(f, "{}", self.0)
            }
        }

        impl PartialEq for $name {
            fn eq(&self, other: &Self) -> bool {
                self.0 == other.0
            }
        }

        impl Eq for $name {}

        // Identity doubles as the deterministic tie-break key in orderings,
        // so ids are totally ordered by their string form.
        impl PartialOrd for $name {
            fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
                Some(self.cmp(other))
            }
        }

        impl Ord for $name {
            fn cmp(&self, other: &Self) -> std::cmp::Ordering {
                self.0.cmp(&other.0)
            }
        }

        impl Hash for $name {
            fn hash<H: Hasher>(&self, state: &mut H) {
                self.0.hash(state);
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

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl FromStr for $name {
            type Err = std::convert::Infallible;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(s.to_string()))
            }
        }
    };
}

impl_id_type!(ShowId);
impl_id_type!(EpisodeId);
impl_id_type!(MovieId);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creation_and_conversion() {
        let id = ShowId::new("show_42");
        assert_eq!(id.as_str(), "show_42");
        assert_eq!(id.to_string(), "show_42");
        assert_eq!(EpisodeId::from("ep_1"), EpisodeId::new("ep_1"));
    }

    #[test]
    fn equality_and_hashing() {
        use std::collections::HashSet;

        let mut set = HashSet::new();
        set.insert(EpisodeId::new("ep_1"));
        assert!(set.contains(&EpisodeId::new("ep_1")));
        assert!(!set.contains(&EpisodeId::new("ep_2")));
    }

    #[test]
    fn ordering_is_stable_by_string() {
        let mut ids = vec![MovieId::new("m3"), MovieId::new("m1"), MovieId::new("m2")];
        ids.sort();
        assert_eq!(ids[0].as_str(), "m1");
        assert_eq!(ids[2].as_str(), "m3");
    }

    #[test]
    fn serialization() {
        let id = ShowId::new("show_42");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"show_42\"");

        let back: ShowId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
