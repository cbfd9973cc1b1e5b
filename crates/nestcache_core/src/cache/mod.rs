//! The facet-keyed cache: entries, tables, and the merge algorithm.

mod entry;
mod merge;
mod table;

pub use entry::{CacheEntry, CachedObject, Lookup};
pub use merge::{MergePolicy, PreferIncoming, ValueMerge};
pub use table::CacheTable;
