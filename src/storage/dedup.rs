use crate::storage::{Store, StoreResult};
use std::collections::HashSet;

/// Zero-width characters that show up in scraped headers
const INVISIBLE_CHARS: &[char] = &['\u{200B}', '\u{200C}', '\u{200D}', '\u{FEFF}'];

/// Normalizes a header (or any key material) into a dedup key
///
/// # Normalization Steps
///
/// 1. Lowercase
/// 2. Strip zero-width characters (ZWSP, ZWNJ, ZWJ, BOM)
/// 3. Collapse whitespace runs into single spaces
/// 4. Trim leading and trailing whitespace
///
/// Total and idempotent: `normalize(&normalize(x)) == normalize(x)`.
///
/// # Examples
///
/// ```
/// use newsline::storage::normalize;
///
/// assert_eq!(normalize("  Путин\u{200B} и   Си\n"), "путин и си");
/// ```
pub fn normalize(value: &str) -> String {
    let lowered: String = value
        .to_lowercase()
        .chars()
        .filter(|c| !INVISIBLE_CHARS.contains(c))
        .collect();

    lowered.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// In-memory copy of the key log
#[derive(Debug, Clone, Default)]
pub struct DedupIndex {
    keys: HashSet<String>,
}

impl DedupIndex {
    /// Loads every key from the store's key log
    pub fn load(store: &dyn Store) -> StoreResult<Self> {
        Ok(Self {
            keys: store.load_keys()?,
        })
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    /// Inserts a key; only call once the key is on disk
    pub fn insert(&mut self, key: String) -> bool {
        self.keys.insert(key)
    }

    pub(crate) fn len(&self) -> usize {
        self.keys.len()
    }
}

impl FromIterator<String> for DedupIndex {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self {
            keys: iter.into_iter().collect(),
        }
    }
}
