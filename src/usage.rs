//! Token and cost accounting across model calls.
//!
//! [`UsageTracker`] is an explicit value owned by the caller and lent to the
//! generator by `&mut`, so every counter update is visible and testable.
//! Counters only ever grow; the tracker lives for one run.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Token counts reported by the API for one completion.
///
/// Fields missing from the response body deserialize as zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

/// Cumulative usage for a run. Serialised as-is by `--save-stats`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageStats {
    pub api_calls: u64,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
    pub total_cost: f64,
    /// Unix time (seconds) of the last recorded call, 0 before the first.
    pub last_update: f64,
}

impl UsageStats {
    /// One-line form for a progress bar suffix.
    pub fn brief(&self) -> String {
        format!(
            "calls: {} | tokens: {} | cost: {:.4}",
            self.api_calls,
            group_thousands(self.total_tokens),
            self.total_cost
        )
    }
}

impl fmt::Display for UsageStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "=".repeat(50);
        writeln!(f, "{rule}")?;
        writeln!(f, "API calls:          {}", self.api_calls)?;
        writeln!(f)?;
        writeln!(f, "Prompt tokens:      {}", group_thousands(self.prompt_tokens))?;
        writeln!(f, "Completion tokens:  {}", group_thousands(self.completion_tokens))?;
        writeln!(f, "Total tokens:       {}", group_thousands(self.total_tokens))?;
        writeln!(f)?;
        writeln!(f, "Total cost:         {:.4}", self.total_cost)?;
        write!(f, "{rule}")
    }
}

/// Accumulates [`TokenUsage`] into [`UsageStats`].
#[derive(Debug, Default)]
pub struct UsageTracker {
    stats: UsageStats,
}

impl UsageTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one successful API response and return that call's cost.
    ///
    /// `api_calls` grows by exactly one; cost is
    /// `total_tokens / 1_000_000 * price_per_million_tokens`.
    pub fn record(&mut self, usage: &TokenUsage, price_per_million_tokens: f64) -> f64 {
        let cost = (usage.total_tokens as f64 / 1_000_000.0) * price_per_million_tokens.max(0.0);

        let s = &mut self.stats;
        s.api_calls = s.api_calls.saturating_add(1);
        s.prompt_tokens = s.prompt_tokens.saturating_add(usage.prompt_tokens);
        s.completion_tokens = s.completion_tokens.saturating_add(usage.completion_tokens);
        s.total_tokens = s.total_tokens.saturating_add(usage.total_tokens);
        s.total_cost += cost;
        s.last_update = unix_now();

        cost
    }

    /// An owned copy of the current counters.
    pub fn snapshot(&self) -> UsageStats {
        self.stats.clone()
    }
}

fn unix_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// `1234567` → `"1,234,567"`.
fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
