use std::collections::HashSet;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};

use super::domain::DocumentKey;
use crate::workflows::questionnaire::AnswerMap;

/// Trailing-edge debounce for continuous edits. Fields are staged until the window has passed
/// since the last edit.
#[derive(Debug, Clone)]
pub struct SaveCoalescer {
    window: Duration,
    staged: AnswerMap,
    last_edit: Option<DateTime<Utc>>,
}

impl SaveCoalescer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            staged: AnswerMap::new(),
            last_edit: None,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn stage(&mut self, fields: AnswerMap, now: DateTime<Utc>) {
        if fields.is_empty() {
            return;
        }
        self.staged.extend(fields);
        self.last_edit = Some(now);
    }

    /// Put back fields from a failed dispatch. Values staged since then win.
    pub fn restage(&mut self, fields: AnswerMap, now: DateTime<Utc>) {
        for (field, value) in fields {
            self.staged.entry(field).or_insert(value);
        }
        if !self.staged.is_empty() && self.last_edit.is_none() {
            self.last_edit = Some(now);
        }
    }

    pub fn has_pending(&self) -> bool {
        !self.staged.is_empty()
    }

    pub fn staged(&self) -> &AnswerMap {
        &self.staged
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        match self.last_edit {
            Some(last_edit) if self.has_pending() => now - last_edit >= self.window,
            _ => false,
        }
    }

    pub fn take(&mut self) -> AnswerMap {
        self.last_edit = None;
        std::mem::take(&mut self.staged)
    }
}

/// Logical clock for saves. Responses are adopted only when newer than the last adopted one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveSequencer {
    issued: u64,
    adopted: u64,
}

impl SaveSequencer {
    pub fn new(base: u64) -> Self {
        Self {
            issued: base,
            adopted: base,
        }
    }

    pub fn next(&mut self) -> u64 {
        self.issued += 1;
        self.issued
    }

    pub fn adopt(&mut self, revision: u64) -> bool {
        if revision > self.adopted {
            self.adopted = revision;
            true
        } else {
            false
        }
    }

    pub fn adopted(&self) -> u64 {
        self.adopted
    }

    pub fn issued(&self) -> u64 {
        self.issued
    }
}

/// Keys with an upload in flight.
#[derive(Debug, Default)]
pub struct UploadLedger {
    pending: Mutex<HashSet<DocumentKey>>,
}

impl UploadLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `key`; `None` while another upload of it is pending.
    pub fn begin(&self, key: DocumentKey) -> Option<UploadGuard<'_>> {
        let mut pending = self
            .pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if pending.insert(key) {
            Some(UploadGuard { ledger: self, key })
        } else {
            None
        }
    }

    pub fn is_pending(&self, key: DocumentKey) -> bool {
        self.pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains(&key)
    }
}

/// Releases its key when dropped, whether the upload finished or was abandoned.
#[derive(Debug)]
pub struct UploadGuard<'a> {
    ledger: &'a UploadLedger,
    key: DocumentKey,
}

impl Drop for UploadGuard<'_> {
    fn drop(&mut self) {
        self.ledger
            .pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::questionnaire::AnswerValue;
    use chrono::TimeZone;

    fn at(millis: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 1, 8, 0, 0).unwrap() + Duration::milliseconds(millis)
    }

    fn fields(pairs: &[(&str, &str)]) -> AnswerMap {
        pairs
            .iter()
            .map(|(field, value)| (field.to_string(), AnswerValue::text(*value)))
            .collect()
    }

    #[test]
    fn coalescer_waits_for_quiet_window() {
        let mut coalescer = SaveCoalescer::new(Duration::milliseconds(800));
        assert!(!coalescer.is_due(at(0)));

        coalescer.stage(fields(&[("city", "Ra")]), at(0));
        coalescer.stage(fields(&[("city", "Rabat")]), at(500));
        assert!(!coalescer.is_due(at(1000)));
        assert!(coalescer.is_due(at(1300)));

        let taken = coalescer.take();
        assert_eq!(taken.get("city"), Some(&AnswerValue::text("Rabat")));
        assert!(!coalescer.has_pending());
        assert!(!coalescer.is_due(at(5000)));
    }

    #[test]
    fn restage_keeps_newer_values() {
        let mut coalescer = SaveCoalescer::new(Duration::milliseconds(800));
        coalescer.stage(fields(&[("city", "Fes")]), at(0));
        let in_flight = coalescer.take();

        coalescer.stage(fields(&[("city", "Tangier")]), at(100));
        coalescer.restage(in_flight, at(200));

        assert_eq!(
            coalescer.staged().get("city"),
            Some(&AnswerValue::text("Tangier"))
        );
        assert!(coalescer.is_due(at(900)));
    }

    #[test]
    fn sequencer_ignores_stale_revisions() {
        let mut sequencer = SaveSequencer::new(4);
        let first = sequencer.next();
        let second = sequencer.next();
        assert_eq!((first, second), (5, 6));

        assert!(sequencer.adopt(second));
        assert!(!sequencer.adopt(first));
        assert_eq!(sequencer.adopted(), 6);
    }

    #[test]
    fn ledger_releases_key_when_guard_drops() {
        let ledger = UploadLedger::new();
        let guard = ledger.begin(DocumentKey::Passport).expect("first claim");
        assert!(ledger.begin(DocumentKey::Passport).is_none());
        assert!(ledger.begin(DocumentKey::StudyPlan).is_some());

        drop(guard);
        assert!(!ledger.is_pending(DocumentKey::Passport));
        assert!(ledger.begin(DocumentKey::Passport).is_some());
    }
}
