use std::collections::HashMap;

/// A stored record: attribute name to typed value
pub type Item = HashMap<String, StorageValue>;

/// Typed value as held by the store.
///
/// Numbers are carried as decimal text, the way the store compares them.
#[derive(Debug, Clone, PartialEq)]
pub enum StorageValue {
    S(String),
    N(String),
    Bool(bool),
    L(Vec<StorageValue>),
    M(HashMap<String, StorageValue>),
    Null,
}

impl StorageValue {
    pub fn as_n(&self) -> Option<&str> {
        match self {
            Self::N(n) => Some(n),
            _ => None,
        }
    }

    /// Short type tag, matching the store's wire names
    pub fn kind(&self) -> &'static str {
        match self {
            Self::S(_) => "S",
            Self::N(_) => "N",
            Self::Bool(_) => "BOOL",
            Self::L(_) => "L",
            Self::M(_) => "M",
            Self::Null => "NULL",
        }
    }
}
