use std::collections::{BTreeMap, BTreeSet};

use crate::command::{Key, Value, NIL};

/// State is the replicated application data.
///
/// It is only mutated by the executor while applying a strongly connected
/// component, never concurrently with another apply.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct State {
    pub store: BTreeMap<Key, Value>,

    /// likes maps a post to the set of users that liked it. Only the social
    /// workload uses it.
    pub likes: BTreeMap<Key, BTreeSet<Value>>,
}

impl State {
    pub fn new() -> State {
        Default::default()
    }

    /// get returns the stored value of `key` or NIL.
    pub fn get(&self, key: Key) -> Value {
        self.store.get(&key).copied().unwrap_or(NIL)
    }

    pub fn like_count(&self, key: Key) -> Value {
        self.likes.get(&key).map(|s| s.len() as Value).unwrap_or(0)
    }
}
