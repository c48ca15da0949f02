//! Collection aliases used across the crate.
//!
//! Kept behind aliases so the hasher can be swapped in one place.

pub type HashMap<K, V> = std::collections::HashMap<K, V>;
pub type HashSet<T> = std::collections::HashSet<T>;
pub type BTreeMap<K, V> = std::collections::BTreeMap<K, V>;
