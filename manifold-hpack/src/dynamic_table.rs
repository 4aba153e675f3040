//! The HPACK dynamic table (RFC 7541 Section 4).
//!
//! A bounded FIFO of header fields shared by one endpoint's encoder or
//! decoder. Entries are addressed together with the static table: indices
//! 1 through 61 are static, 62 and up are dynamic, newest first.
//!
//! Reverse maps give O(1) lookup by field and by name. Each map points at
//! the most recently inserted entry with that key, which is also the entry
//! with the smallest unified index.

use std::collections::{HashMap, VecDeque};

use bytes::Bytes;

use crate::field::HeaderField;
use crate::static_table;

/// SETTINGS_HEADER_TABLE_SIZE default (RFC 7540 Section 6.5.2).
pub const DEFAULT_MAX_SIZE: usize = 4096;

/// Unified index of the newest dynamic entry.
pub const FIRST_DYNAMIC_INDEX: u64 = static_table::NUM_ENTRIES as u64 + 1;

#[derive(Debug)]
pub struct DynamicTable {
    // Front is the newest entry, back the oldest.
    entries: VecDeque<HeaderField>,

    // Total number of insertions ever performed. An entry's absolute id is
    // its value of this counter at insertion time; ids stay valid across
    // evictions, which keeps the reverse maps stable.
    insert_count: u64,

    /// Occupied size in octets per RFC 7541 Section 4.1.
    size: usize,
    max_size: usize,

    /// SETTINGS_HEADER_TABLE_SIZE bound that `max_size` may never exceed.
    protocol_max_size_setting: usize,

    reverse: HashMap<(Bytes, Bytes), u64>,
    reverse_name: HashMap<Bytes, u64>,
}

impl Default for DynamicTable {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SIZE)
    }
}

impl DynamicTable {
    pub fn new(max_size: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            insert_count: 0,
            size: 0,
            max_size,
            protocol_max_size_setting: DEFAULT_MAX_SIZE,
            reverse: HashMap::new(),
            reverse_name: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn protocol_max_size_setting(&self) -> usize {
        self.protocol_max_size_setting
    }

    pub fn set_protocol_max_size_setting(&mut self, setting: usize) {
        self.protocol_max_size_setting = setting;
    }

    /// Inserts a field, evicting from the oldest end until it fits.
    ///
    /// A field larger than the whole table clears every entry and is not
    /// inserted; per RFC 7541 Section 4.4 that is not an error.
    pub fn insert(&mut self, field: HeaderField) {
        let entry_size = field.hpack_size();
        if entry_size > self.max_size {
            self.clear();
            return;
        }

        while self.size + entry_size > self.max_size {
            self.evict_oldest();
        }

        let absolute = self.insert_count;
        self.insert_count += 1;
        self.size += entry_size;
        self.reverse
            .insert((field.name.clone(), field.value.clone()), absolute);
        self.reverse_name.insert(field.name.clone(), absolute);
        self.entries.push_front(field);
    }

    /// Lowers or raises the table's maximum size, evicting as needed.
    ///
    /// Callers enforce the protocol bound before announcing or applying a
    /// size update; this just maintains the size invariant.
    pub fn resize(&mut self, new_max_size: usize) {
        self.max_size = new_max_size;
        while self.size > self.max_size {
            self.evict_oldest();
        }
    }

    /// Fetches a header by unified index: 1 through 61 addresses the static
    /// table, 62 and up the dynamic entries, newest first.
    pub fn get(&self, index: u64) -> Option<HeaderField> {
        if let Some(entry) = static_table::get(index) {
            return Some(HeaderField::new(entry.name, entry.value));
        }
        let offset = index.checked_sub(FIRST_DYNAMIC_INDEX)?;
        self.entries.get(offset as usize).cloned()
    }

    /// Finds a field by `(name, value)`, then by name. Returns the unified
    /// index and whether the value matched, or `(0, false)`.
    pub fn find_name_and_value(&self, field: &HeaderField) -> (u64, bool) {
        let key = (field.name.clone(), field.value.clone());
        if let Some(&absolute) = self.reverse.get(&key) {
            return (self.unified_index(absolute), true);
        }
        if let Some(&absolute) = self.reverse_name.get(&field.name) {
            return (self.unified_index(absolute), false);
        }
        (0, false)
    }

    /// Finds the newest entry with the given name, or 0.
    pub fn find_name_only(&self, name: &[u8]) -> u64 {
        self.reverse_name
            .get(name)
            .map_or(0, |&absolute| self.unified_index(absolute))
    }

    fn unified_index(&self, absolute: u64) -> u64 {
        // Newest entry has absolute id insert_count - 1 and unified index 62.
        static_table::NUM_ENTRIES as u64 + (self.insert_count - absolute)
    }

    fn oldest_absolute(&self) -> u64 {
        self.insert_count - self.entries.len() as u64
    }

    fn evict_oldest(&mut self) {
        let absolute = self.oldest_absolute();
        let Some(evicted) = self.entries.pop_back() else {
            return;
        };
        self.size -= evicted.hpack_size();

        // The maps track the newest entry per key. If they still point at
        // the evicted entry, no newer duplicate exists and the key is gone.
        let key = (evicted.name.clone(), evicted.value.clone());
        if self.reverse.get(&key) == Some(&absolute) {
            self.reverse.remove(&key);
        }
        if self.reverse_name.get(&evicted.name) == Some(&absolute) {
            self.reverse_name.remove(&evicted.name);
        }
    }

    fn clear(&mut self) {
        self.entries.clear();
        self.reverse.clear();
        self.reverse_name.clear();
        self.size = 0;
    }
}
