//! Model call accounting.
//!
//! A [`UsageLedger`] is cheap to clone; every clone appends to the same
//! record list, so one ledger can be handed to every agent's generator and
//! read back by the orchestrator at the end of a game.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// One model call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallRecord {
    pub timestamp: DateTime<Utc>,
    pub model: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub latency_ms: u64,
}

impl CallRecord {
    pub fn new(model: impl Into<String>, input_tokens: u64, output_tokens: u64, latency: Duration) -> Self {
        Self {
            timestamp: Utc::now(),
            model: model.into(),
            input_tokens,
            output_tokens,
            latency_ms: u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
        }
    }

    pub fn total_tokens(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

/// Per-model totals.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelUsage {
    pub calls: usize,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Aggregate view of a ledger.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageSummary {
    pub calls: usize,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
    /// Mean over calls with a non-zero latency.
    pub average_latency_ms: f64,
    pub by_model: BTreeMap<String, ModelUsage>,
}

impl std::fmt::Display for UsageSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} calls, {} tokens ({} in / {} out), avg latency {:.0} ms",
            self.calls,
            self.total_tokens,
            self.input_tokens,
            self.output_tokens,
            self.average_latency_ms
        )
    }
}

/// Shared, append-only list of [`CallRecord`]s.
#[derive(Debug, Clone, Default)]
pub struct UsageLedger {
    records: Arc<Mutex<Vec<CallRecord>>>,
}

impl UsageLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, record: CallRecord) {
        self.lock().push(record);
    }

    pub fn records(&self) -> Vec<CallRecord> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn summary(&self) -> UsageSummary {
        let records = self.lock();
        let mut summary = UsageSummary {
            calls: records.len(),
            ..UsageSummary::default()
        };

        let mut latency_total = 0u64;
        let mut latency_count = 0u64;
        for record in records.iter() {
            summary.input_tokens += record.input_tokens;
            summary.output_tokens += record.output_tokens;
            if record.latency_ms > 0 {
                latency_total += record.latency_ms;
                latency_count += 1;
            }
            let model = summary.by_model.entry(record.model.clone()).or_default();
            model.calls += 1;
            model.input_tokens += record.input_tokens;
            model.output_tokens += record.output_tokens;
        }
        summary.total_tokens = summary.input_tokens + summary.output_tokens;
        if latency_count > 0 {
            summary.average_latency_ms = latency_total as f64 / latency_count as f64;
        }
        summary
    }

    // A panic while holding the lock cannot leave a half-pushed record.
    fn lock(&self) -> MutexGuard<'_, Vec<CallRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_summary() {
        let ledger = UsageLedger::new();
        let summary = ledger.summary();
        assert_eq!(summary.calls, 0);
        assert_eq!(summary.total_tokens, 0);
        assert_eq!(summary.average_latency_ms, 0.0);
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_clones_share_records() {
        let ledger = UsageLedger::new();
        let clone = ledger.clone();
        clone.record(CallRecord::new("m1", 100, 20, Duration::from_millis(300)));
        ledger.record(CallRecord::new("m1", 50, 10, Duration::from_millis(100)));
        ledger.record(CallRecord::new("m2", 5, 5, Duration::ZERO));

        assert_eq!(ledger.len(), 3);
        let summary = clone.summary();
        assert_eq!(summary.calls, 3);
        assert_eq!(summary.input_tokens, 155);
        assert_eq!(summary.output_tokens, 35);
        assert_eq!(summary.total_tokens, 190);
        assert_eq!(summary.average_latency_ms, 200.0);
        assert_eq!(summary.by_model["m1"].calls, 2);
        assert_eq!(summary.by_model["m2"].input_tokens, 5);
    }

    #[test]
    fn test_summary_display() {
        let ledger = UsageLedger::new();
        ledger.record(CallRecord::new("m", 1, 2, Duration::from_millis(10)));
        assert_eq!(
            ledger.summary().to_string(),
            "1 calls, 3 tokens (1 in / 2 out), avg latency 10 ms"
        );
    }
}
