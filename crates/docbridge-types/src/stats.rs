//! Operational counters captured from repositories and cursors.
//!
//! A [`StatsSnapshot`] is a point-in-time copy of the counters a repository or
//! cursor accumulated. [`Counter`] names each value as it appears in the
//! pipeline's counter system.

use std::fmt;

use serde::{Deserialize, Serialize};

// ── Counter names ───────────────────────────────────────────────────

/// Named counter in the pipeline's counter system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Counter {
    BytesWritten,
    BytesRead,
    BytesRetried,
    BytesRecorded,
    DocsWritten,
    DocsRead,
    DocsRetried,
    DocsRecorded,
    BulkWrites,
    BulkRetries,
    NodeRetries,
    NetRetries,
}

impl Counter {
    /// Every counter, in reporting order.
    pub const ALL: [Counter; 12] = [
        Self::BytesWritten,
        Self::BytesRead,
        Self::BytesRetried,
        Self::BytesRecorded,
        Self::DocsWritten,
        Self::DocsRead,
        Self::DocsRetried,
        Self::DocsRecorded,
        Self::BulkWrites,
        Self::BulkRetries,
        Self::NodeRetries,
        Self::NetRetries,
    ];

    /// Name under which the counter is published.
    pub fn name(self) -> &'static str {
        match self {
            Self::BytesWritten => "bytes_written",
            Self::BytesRead => "bytes_read",
            Self::BytesRetried => "bytes_retried",
            Self::BytesRecorded => "bytes_recorded",
            Self::DocsWritten => "docs_written",
            Self::DocsRead => "docs_read",
            Self::DocsRetried => "docs_retried",
            Self::DocsRecorded => "docs_recorded",
            Self::BulkWrites => "bulk_writes",
            Self::BulkRetries => "bulk_retries",
            Self::NodeRetries => "node_retries",
            Self::NetRetries => "net_retries",
        }
    }

    /// Position of the counter in [`Counter::ALL`].
    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Counter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ── Snapshot ────────────────────────────────────────────────────────

/// Counters captured from a repository or cursor at one point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub bytes_written: u64,
    pub bytes_read: u64,
    pub bytes_retried: u64,
    /// Bytes the store acknowledged as stored.
    pub bytes_recorded: u64,
    pub docs_written: u64,
    pub docs_read: u64,
    pub docs_retried: u64,
    /// Documents the store acknowledged as stored.
    pub docs_recorded: u64,
    pub bulk_writes: u64,
    pub bulk_retries: u64,
    pub node_retries: u64,
    pub net_retries: u64,
}

impl StatsSnapshot {
    /// Value of a single named counter.
    pub fn get(&self, counter: Counter) -> u64 {
        match counter {
            Counter::BytesWritten => self.bytes_written,
            Counter::BytesRead => self.bytes_read,
            Counter::BytesRetried => self.bytes_retried,
            Counter::BytesRecorded => self.bytes_recorded,
            Counter::DocsWritten => self.docs_written,
            Counter::DocsRead => self.docs_read,
            Counter::DocsRetried => self.docs_retried,
            Counter::DocsRecorded => self.docs_recorded,
            Counter::BulkWrites => self.bulk_writes,
            Counter::BulkRetries => self.bulk_retries,
            Counter::NodeRetries => self.node_retries,
            Counter::NetRetries => self.net_retries,
        }
    }

    /// Build a snapshot by reading each counter from `value_of`.
    pub fn from_counters(value_of: impl Fn(Counter) -> u64) -> Self {
        Self {
            bytes_written: value_of(Counter::BytesWritten),
            bytes_read: value_of(Counter::BytesRead),
            bytes_retried: value_of(Counter::BytesRetried),
            bytes_recorded: value_of(Counter::BytesRecorded),
            docs_written: value_of(Counter::DocsWritten),
            docs_read: value_of(Counter::DocsRead),
            docs_retried: value_of(Counter::DocsRetried),
            docs_recorded: value_of(Counter::DocsRecorded),
            bulk_writes: value_of(Counter::BulkWrites),
            bulk_retries: value_of(Counter::BulkRetries),
            node_retries: value_of(Counter::NodeRetries),
            net_retries: value_of(Counter::NetRetries),
        }
    }

    /// `(counter, value)` pairs in reporting order.
    pub fn entries(&self) -> impl Iterator<Item = (Counter, u64)> + '_ {
        Counter::ALL.into_iter().map(|c| (c, self.get(c)))
    }

    pub fn is_empty(&self) -> bool {
        self.entries().all(|(_, v)| v == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_index_matches_all_order() {
        for (i, c) in Counter::ALL.iter().enumerate() {
            assert_eq!(c.index(), i);
        }
    }

    #[test]
    fn get_reads_matching_field() {
        let s = StatsSnapshot {
            docs_read: 7,
            net_retries: 2,
            ..StatsSnapshot::default()
        };
        assert_eq!(s.get(Counter::DocsRead), 7);
        assert_eq!(s.get(Counter::NetRetries), 2);
        assert_eq!(s.get(Counter::BytesRead), 0);
    }

    #[test]
    fn default_snapshot_is_empty() {
        assert!(StatsSnapshot::default().is_empty());
        let s = StatsSnapshot {
            bulk_writes: 1,
            ..StatsSnapshot::default()
        };
        assert!(!s.is_empty());
    }

    #[test]
    fn from_counters_inverts_get() {
        let s = StatsSnapshot::from_counters(|c| c.index() as u64 + 1);
        for c in Counter::ALL {
            assert_eq!(s.get(c), c.index() as u64 + 1);
        }
    }

    #[test]
    fn counter_serializes_as_published_name() {
        let json = serde_json::to_value(Counter::DocsRecorded).unwrap();
        assert_eq!(json, serde_json::json!("docs_recorded"));
    }
}
