//! Per-server store of the latest known record for every client.
//!
//! Records are replaced whole under last-writer-wins on the client-supplied
//! report timestamp. The check and the replace happen under the same shard
//! lock, so concurrent updates for one client never interleave, while
//! updates for different clients rarely contend at all.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use log::debug;
use shared::ClientRecord;

#[derive(Debug, Default)]
pub struct Directory {
    records: DashMap<String, ClientRecord>,
}

impl Directory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `record` if it is the first for its client or strictly newer
    /// than the stored one. Returns whether it was applied; callers only
    /// propagate applied records.
    pub fn upsert(&self, record: ClientRecord) -> bool {
        match self.records.entry(record.client_id.clone()) {
            Entry::Occupied(mut current) => {
                if record.supersedes(current.get()) {
                    current.insert(record);
                    true
                } else {
                    debug!(
                        "Ignoring stale report for {} ({} <= {})",
                        record.client_id,
                        record.report_timestamp,
                        current.get().report_timestamp
                    );
                    false
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(record);
                true
            }
        }
    }

    pub fn lookup(&self, client_id: &str) -> Option<ClientRecord> {
        self.records.get(client_id).map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
