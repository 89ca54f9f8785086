use std::collections::HashMap;
use std::path::Path;
use serde::{Deserialize, Serialize};
use crate::error::LedgerError;

/// Cost charged for task types missing from the table.
pub const DEFAULT_TASK_COST: u32 = 1;

/// Built-in task costs, grouped by tool family.
const DEFAULT_COSTS: &[(&str, u32)] = &[
    // Chat and basic queries
    ("chat_message",              1),
    ("basic_query",               1),
    ("history_lookup",            1),
    // Search and generation
    ("simple_search",             2),
    ("text_generation",           2),
    ("web_search",                3),
    ("document_summary",          4),
    // Prime Agent
    ("prime_agent_task",          5),
    ("prime_agent_complex",       8),
    ("agent_wave_document",      10),
    ("agent_wave_design",        12),
    // Call assistant and live browser
    ("call_assistant_session",    6),
    ("live_browser_session",      8),
    ("live_browser_action",       2),
    // Research
    ("research_basic",           10),
    ("research_comprehensive",   30),
    // Code assistant
    ("code_completion",           2),
    ("code_generation_simple",    5),
    ("code_generation",          15),
    ("code_generation_complex",  35),
    ("code_review",              10),
    // Context7 documentation tools
    ("context7_resolve_library",  2),
    ("context7_search",           3),
    ("context7_get_docs",         5),
    ("context7_code_examples",    8),
    ("context7_best_practices",  10),
    ("context7_full_analysis",   15),
];

/// Maps task-type identifiers to their credit cost.
///
/// The table is fixed once the ledger is built; callers that need different
/// prices construct a new table (from JSON or with overrides) up front.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CostTable {
    costs: HashMap<String, u32>,
}

impl CostTable {
    /// An empty table: every task costs [`DEFAULT_TASK_COST`].
    pub fn empty() -> Self {
        Self { costs: HashMap::new() }
    }

    /// The built-in platform prices.
    pub fn builtin() -> Self {
        Self {
            costs: DEFAULT_COSTS
                .iter()
                .map(|(task, cost)| (task.to_string(), *cost))
                .collect(),
        }
    }

    /// Parse a JSON object of `{ "task_type": cost }`. Costs must be >= 1.
    pub fn from_json_str(json: &str) -> Result<Self, LedgerError> {
        let costs: HashMap<String, u32> = serde_json::from_str(json)
            .map_err(|e| LedgerError::Config(format!("Invalid cost table: {}", e)))?;
        Self::validated(costs)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, LedgerError> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path)
            .map_err(|e| LedgerError::Config(format!("Cannot read {}: {}", path.display(), e)))?;
        Self::from_json_str(&data)
    }

    fn validated(costs: HashMap<String, u32>) -> Result<Self, LedgerError> {
        if let Some((task, _)) = costs.iter().find(|(_, cost)| **cost == 0) {
            return Err(LedgerError::Config(format!(
                "Cost for '{}' must be at least 1", task
            )));
        }
        Ok(Self { costs })
    }

    /// Set or replace the cost of a task type. Zero is raised to 1.
    pub fn with_cost(mut self, task_type: impl Into<String>, cost: u32) -> Self {
        self.costs.insert(task_type.into(), cost.max(1));
        self
    }

    /// Overlay `other` on top of this table.
    pub fn merged(mut self, other: CostTable) -> Self {
        self.costs.extend(other.costs);
        self
    }

    /// Cost of `task_type`, or [`DEFAULT_TASK_COST`] when unknown.
    pub fn get_cost(&self, task_type: &str) -> u32 {
        self.costs.get(task_type).copied().unwrap_or(DEFAULT_TASK_COST)
    }

    pub fn contains(&self, task_type: &str) -> bool {
        self.costs.contains_key(task_type)
    }

    /// Task types whose name starts with `prefix`, e.g. `"context7_"`.
    pub fn family(&self, prefix: &str) -> Vec<(&str, u32)> {
        let mut out: Vec<(&str, u32)> = self.costs
            .iter()
            .filter(|(task, _)| task.starts_with(prefix))
            .map(|(task, cost)| (task.as_str(), *cost))
            .collect();
        out.sort_by(|a, b| a.0.cmp(b.0));
        out
    }

    pub fn len(&self) -> usize {
        self.costs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.costs.is_empty()
    }
}

impl Default for CostTable {
    fn default() -> Self { Self::builtin() }
}
