use std::collections::VecDeque;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TraceEntry {
    pub seq:       u64,
    pub operation: String,
    pub task_type: Option<String>,
    pub detail:    String,
    pub timestamp: DateTime<Utc>,
}

/// Bounded log of ledger operations, oldest entries dropped first.
#[derive(Debug, Serialize, Deserialize)]
pub struct LedgerTrace {
    entries:  VecDeque<TraceEntry>,
    capacity: usize,
    next_seq: u64,
}

impl LedgerTrace {
    pub fn new(capacity: usize) -> Self {
        Self { entries: VecDeque::new(), capacity: capacity.max(1), next_seq: 0 }
    }

    pub fn record(&mut self, operation: &str, task_type: Option<&str>, detail: impl Into<String>) {
        let detail = detail.into();
        tracing::trace!(operation, task_type, detail = %detail, "ledger trace");

        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(TraceEntry {
            seq:       self.next_seq,
            operation: operation.to_string(),
            task_type: task_type.map(str::to_string),
            detail,
            timestamp: Utc::now(),
        });
        self.next_seq += 1;
    }

    pub fn entries(&self) -> Vec<TraceEntry> {
        self.entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns all entries for a given operation name
    pub fn for_operation(&self, operation: &str) -> Vec<TraceEntry> {
        self.entries.iter().filter(|e| e.operation == operation).cloned().collect()
    }

    /// Serializes the retained entries to a pretty-printed JSON string
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(&self.entries)
            .unwrap_or_else(|_| "[]".to_string())
    }
}

impl Default for LedgerTrace {
    fn default() -> Self { Self::new(256) }
}
