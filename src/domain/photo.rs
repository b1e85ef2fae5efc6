use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// One photograph discovered in the input folder, with everything the
/// ordering step needs. Immutable after the scan.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SourcePhoto {
    pub path: PathBuf,
    pub name: String,
    /// EXIF capture datetime in epoch milliseconds, when the file has one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub taken: Option<i64>,
    /// File modification time in epoch milliseconds, the ordering fallback.
    pub modified: i64,
    /// Position in the lexically sorted directory listing.
    pub order: usize,
}

impl SourcePhoto {
    /// Composite ordering key: photos with a capture timestamp first, by
    /// that timestamp; the rest after, by modification time; the discovery
    /// index breaks every remaining tie so the order is total.
    pub fn sort_key(&self) -> (u8, i64, usize) {
        match self.taken {
            Some(taken) => (0, taken, self.order),
            None => (1, self.modified, self.order),
        }
    }

    pub fn effective_millis(&self) -> i64 {
        self.taken.unwrap_or(self.modified)
    }
}
