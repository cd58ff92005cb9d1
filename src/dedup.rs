use std::collections::HashSet;

use crate::record::IndexEntry;

/// Keep the entries whose link is not already stored, preserving order.
pub fn filter_new(index: Vec<IndexEntry>, persisted: &HashSet<String>) -> Vec<IndexEntry> {
    index
        .into_iter()
        .filter(|entry| !persisted.contains(&entry.link))
        .collect()
}
