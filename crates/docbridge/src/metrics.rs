//! Forwarding of repository and cursor stats into pipeline counters.

use docbridge_types::StatsSnapshot;

use crate::counters::CounterSink;

/// Add every counter of `stats` to `sink`.
///
/// `source` only labels the debug event. Each distinct snapshot must be
/// reported exactly once; nothing here deduplicates.
pub fn report<S: CounterSink + ?Sized>(sink: &S, source: &str, stats: StatsSnapshot) {
    tracing::debug!(
        source,
        docs_read = stats.docs_read,
        docs_written = stats.docs_written,
        bytes_read = stats.bytes_read,
        bytes_written = stats.bytes_written,
        bulk_writes = stats.bulk_writes,
        "reporting store counters"
    );
    for (counter, value) in stats.entries() {
        sink.increment(counter, value);
    }
}
