use serde::{Deserialize, Serialize};
use std::fmt;

pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

macro_rules! string_id {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(String);

        impl $name {
            pub fn new() -> Self {
                Self(new_id())
            }

            pub fn from_raw(raw: impl Into<String>) -> Self {
                Self(raw.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

string_id!(PaneId);
string_id!(TabId);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_id_is_valid_uuid() {
        let id = new_id();
        let parsed = uuid::Uuid::parse_str(&id);
        assert!(parsed.is_ok());
        assert_eq!(parsed.unwrap().get_version_num(), 4);
    }

    #[test]
    fn ids_are_unique() {
        assert_ne!(TabId::new(), TabId::new());
        assert_ne!(PaneId::new(), PaneId::new());
    }

    #[test]
    fn id_display_matches_as_str() {
        let id = PaneId::new();
        assert_eq!(id.to_string(), id.as_str());
    }

    #[test]
    fn id_serialization_round_trip() {
        let id = TabId::new();
        let json = serde_json::to_string(&id).unwrap();
        let back: TabId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, back);
    }

    #[test]
    fn id_from_raw_preserves_value() {
        let id = TabId::from_raw("tab-1");
        assert_eq!(id.as_str(), "tab-1");
    }

    #[test]
    fn id_hash_dedups_clones() {
        use std::collections::HashSet;
        let id = TabId::new();
        let mut set = HashSet::new();
        set.insert(id.clone());
        set.insert(id);
        assert_eq!(set.len(), 1);
    }
}
