//! Dirty-attribute computation over current/original snapshots.

use crate::compare::Comparison;
use crate::types::Attributes;

/// Get the attributes that changed since the last sync with the original
/// snapshot.
///
/// An attribute is dirty when it has no recorded original, or when its
/// current value differs from the original under `comparison`. The returned
/// map holds the current values.
pub fn get_dirty(
    attributes: &Attributes,
    original: &Attributes,
    comparison: Comparison,
) -> Attributes {
    attributes
        .iter()
        .filter(|(key, value)| match original.get(key.as_str()) {
            None => true,
            Some(previous) => !comparison.same(value, previous),
        })
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

/// Whether a single attribute is part of the dirty set.
pub fn is_dirty(
    attribute: &str,
    attributes: &Attributes,
    original: &Attributes,
    comparison: Comparison,
) -> bool {
    get_dirty(attributes, original, comparison).contains_key(attribute)
}
