//! Alert Deduplicator
//!
//! Polls overlap, so the same alert record arrives many times. The
//! watermark (highest alert id already surfaced) decides what is new;
//! wall-clock time plays no part.

use crate::api::SimulationHistoryRecord;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlertDeduplicator {
    last_seen_id: i64,
}

impl AlertDeduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resume from a known watermark.
    pub fn with_watermark(last_seen_id: i64) -> Self {
        Self { last_seen_id }
    }

    pub fn watermark(&self) -> i64 {
        self.last_seen_id
    }

    /// Inspect one fetched batch.
    ///
    /// Returns the newest unseen alert, or `None`. Older unseen alerts in
    /// the same batch are passed over but still move the watermark.
    pub fn ingest<'a>(&mut self, batch: &'a [SimulationHistoryRecord]) -> Option<&'a SimulationHistoryRecord> {
        let newest = batch
            .iter()
            .filter(|r| r.has_alert() && r.id > self.last_seen_id)
            .max_by_key(|r| r.id)?;

        let skipped = batch
            .iter()
            .filter(|r| r.has_alert() && r.id > self.last_seen_id && r.id != newest.id)
            .count();
        if skipped > 0 {
            tracing::debug!("{} older alert(s) superseded by alert #{}", skipped, newest.id);
        }

        self.last_seen_id = newest.id;
        Some(newest)
    }
}
