//! HPACK static table (RFC 7541 Appendix A).
//!
//! 61 predefined entries with fixed 1-based indices. Lookups go through
//! lazily-built reverse maps; the indices themselves are load-bearing wire
//! format and must match the RFC exactly.

use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::field::HeaderField;

/// A static table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticEntry {
    pub name: &'static str,
    pub value: &'static str,
}

macro_rules! entry {
    ($name:expr) => {
        StaticEntry {
            name: $name,
            value: "",
        }
    };
    ($name:expr, $value:expr) => {
        StaticEntry {
            name: $name,
            value: $value,
        }
    };
}

/// The 61 entries of RFC 7541 Appendix A. `ENTRIES[i]` is index `i + 1`.
pub static ENTRIES: [StaticEntry; 61] = [
    entry!(":authority"),                    // 1
    entry!(":method", "GET"),                // 2
    entry!(":method", "POST"),               // 3
    entry!(":path", "/"),                    // 4
    entry!(":path", "/index.html"),          // 5
    entry!(":scheme", "http"),               // 6
    entry!(":scheme", "https"),              // 7
    entry!(":status", "200"),                // 8
    entry!(":status", "204"),                // 9
    entry!(":status", "206"),                // 10
    entry!(":status", "304"),                // 11
    entry!(":status", "400"),                // 12
    entry!(":status", "404"),                // 13
    entry!(":status", "500"),                // 14
    entry!("accept-charset"),                // 15
    entry!("accept-encoding", "gzip, deflate"), // 16
    entry!("accept-language"),               // 17
    entry!("accept-ranges"),                 // 18
    entry!("accept"),                        // 19
    entry!("access-control-allow-origin"),   // 20
    entry!("age"),                           // 21
    entry!("allow"),                         // 22
    entry!("authorization"),                 // 23
    entry!("cache-control"),                 // 24
    entry!("content-disposition"),           // 25
    entry!("content-encoding"),              // 26
    entry!("content-language"),              // 27
    entry!("content-length"),                // 28
    entry!("content-location"),              // 29
    entry!("content-range"),                 // 30
    entry!("content-type"),                  // 31
    entry!("cookie"),                        // 32
    entry!("date"),                          // 33
    entry!("etag"),                          // 34
    entry!("expect"),                        // 35
    entry!("expires"),                       // 36
    entry!("from"),                          // 37
    entry!("host"),                          // 38
    entry!("if-match"),                      // 39
    entry!("if-modified-since"),             // 40
    entry!("if-none-match"),                 // 41
    entry!("if-range"),                      // 42
    entry!("if-unmodified-since"),           // 43
    entry!("last-modified"),                 // 44
    entry!("link"),                          // 45
    entry!("location"),                      // 46
    entry!("max-forwards"),                  // 47
    entry!("proxy-authenticate"),            // 48
    entry!("proxy-authorization"),           // 49
    entry!("range"),                         // 50
    entry!("referer"),                       // 51
    entry!("refresh"),                       // 52
    entry!("retry-after"),                   // 53
    entry!("server"),                        // 54
    entry!("set-cookie"),                    // 55
    entry!("strict-transport-security"),     // 56
    entry!("transfer-encoding"),             // 57
    entry!("user-agent"),                    // 58
    entry!("vary"),                          // 59
    entry!("via"),                           // 60
    entry!("www-authenticate"),              // 61
];

/// Number of static table entries.
pub const NUM_ENTRIES: usize = 61;

// name -> list of (index, value), in ascending index order so that the
// first entry is also the first name match.
static NAME_MAP: Lazy<HashMap<&'static [u8], Vec<(usize, &'static [u8])>>> = Lazy::new(|| {
    let mut map: HashMap<&'static [u8], Vec<(usize, &'static [u8])>> = HashMap::new();
    for (i, entry) in ENTRIES.iter().enumerate() {
        map.entry(entry.name.as_bytes())
            .or_default()
            .push((i + 1, entry.value.as_bytes()));
    }
    map
});

/// Fetches the entry at a 1-based RFC index.
pub fn get(index: u64) -> Option<&'static StaticEntry> {
    if (1..=NUM_ENTRIES as u64).contains(&index) {
        Some(&ENTRIES[index as usize - 1])
    } else {
        None
    }
}

/// Finds a header in the static table.
///
/// Returns `(index, has_value)`: the index of the exact `(name, value)`
/// match with `has_value` true, or the first name-only match with
/// `has_value` false, or `(0, false)` when the name is absent entirely.
pub fn find_name_and_value(header: &HeaderField) -> (usize, bool) {
    let Some(candidates) = NAME_MAP.get(header.name.as_ref()) else {
        return (0, false);
    };
    for &(index, value) in candidates {
        if value == header.value.as_ref() {
            return (index, true);
        }
    }
    (candidates[0].0, false)
}

/// Finds the first static entry with the given name, or 0.
pub fn find_name_only(name: &[u8]) -> usize {
    NAME_MAP.get(name).map_or(0, |candidates| candidates[0].0)
}
