//! The duplicate contract.
//!
//! Anything admitted to the entry cache or the object store must be able to
//! produce an independent, state-equal copy of itself. The cache hands out
//! duplicates on every lookup so a caller can never mutate cached state.

use std::collections::BTreeMap;

/// Produce an independent copy with equal observable state.
///
/// The copy must share no mutable state with `self`. For plain owned data
/// this is `Clone`; types with interior sharing (`Arc<Mutex<_>>` fields and
/// the like) must deep-copy instead.
pub trait Duplicate: Sized {
    fn duplicate(&self) -> Self;
}

macro_rules! duplicate_via_clone {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Duplicate for $ty {
                fn duplicate(&self) -> Self {
                    self.clone()
                }
            }
        )*
    };
}

duplicate_via_clone!(String, u8, bool, i64, u64, serde_json::Value);

impl<T: Duplicate> Duplicate for Option<T> {
    fn duplicate(&self) -> Self {
        self.as_ref().map(Duplicate::duplicate)
    }
}

impl<K: Ord + Clone, V: Duplicate> Duplicate for BTreeMap<K, V> {
    fn duplicate(&self) -> Self {
        self.iter().map(|(k, v)| (k.clone(), v.duplicate())).collect()
    }
}

impl<T: Duplicate> Duplicate for Vec<T> {
    fn duplicate(&self) -> Self {
        self.iter().map(Duplicate::duplicate).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_is_independent() {
        let original = vec!["a".to_string(), "b".to_string()];
        let mut copy = original.duplicate();
        copy.push("c".into());
        assert_eq!(original.len(), 2);
        assert_eq!(copy.len(), 3);
    }

    #[test]
    fn json_duplicate_equal_state() {
        let value = serde_json::json!({"k": [1, 2, 3]});
        assert_eq!(value.duplicate(), value);
    }
}
