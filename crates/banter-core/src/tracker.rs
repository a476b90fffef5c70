//! Lifecycle tracking for tool calls across one conversation turn.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationStatus {
    Running,
    Completed,
}

/// One tracked tool call, from the request leaving the model to the result
/// coming back.
#[derive(Debug, Clone)]
pub struct ToolInvocation {
    pub id: String,
    pub name: String,
    pub arguments: Value,
    pub started_at: Instant,
    pub duration: Option<Duration>,
    pub result: Option<String>,
    pub status: InvocationStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolStats {
    pub count: usize,
    pub total: Duration,
    pub average: Duration,
}

/// Aggregate statistics over the completed calls of a turn. `average` and the
/// per-tool averages are zero when nothing completed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolUsageSummary {
    pub count: usize,
    pub total: Duration,
    pub average: Duration,
    pub per_tool: BTreeMap<String, ToolStats>,
}

/// Tracks running and completed tool invocations.
///
/// Records move from the active list to the completed list exactly once, at
/// completion. The active list holds at most one record per call id.
#[derive(Debug, Default)]
pub struct ToolTracker {
    active: Vec<ToolInvocation>,
    completed: Vec<ToolInvocation>,
}

impl ToolTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a running invocation stamped with the current instant.
    ///
    /// A second start for an id that is still active is rejected: the
    /// original record and its start time stay in place, a warning is
    /// logged, and `false` is returned.
    pub fn start(&mut self, name: impl Into<String>, id: impl Into<String>, arguments: Value) -> bool {
        let id = id.into();
        if self.active.iter().any(|inv| inv.id == id) {
            tracing::warn!(call_id = %id, "duplicate start for an active tool call, keeping the original record");
            return false;
        }
        let name = name.into();
        tracing::debug!(tool = %name, call_id = %id, "tool call started");
        self.active.push(ToolInvocation {
            id,
            name,
            arguments,
            started_at: Instant::now(),
            duration: None,
            result: None,
            status: InvocationStatus::Running,
        });
        true
    }

    /// Completes an active invocation and returns the finished record.
    ///
    /// Matching prefers the call id when the result carries one; otherwise
    /// (or when the id is unknown) the oldest active record with the given
    /// name is taken. No match is a no-op returning `None`; a stray result
    /// is recoverable, not an error.
    pub fn complete(
        &mut self,
        name: &str,
        call_id: Option<&str>,
        result: impl Into<String>,
    ) -> Option<&ToolInvocation> {
        let index = call_id
            .and_then(|id| self.active.iter().position(|inv| inv.id == id))
            .or_else(|| self.active.iter().position(|inv| inv.name == name))?;
        let mut inv = self.active.remove(index);
        inv.duration = Some(inv.started_at.elapsed());
        inv.result = Some(result.into());
        inv.status = InvocationStatus::Completed;
        tracing::debug!(tool = %inv.name, call_id = %inv.id, elapsed = ?inv.duration, "tool call completed");
        self.completed.push(inv);
        self.completed.last()
    }

    pub fn summary(&self) -> ToolUsageSummary {
        let mut per_tool: BTreeMap<String, ToolStats> = BTreeMap::new();
        let mut total = Duration::ZERO;
        for inv in &self.completed {
            let elapsed = inv.duration.unwrap_or_default();
            total += elapsed;
            let stats = per_tool.entry(inv.name.clone()).or_default();
            stats.count += 1;
            stats.total += elapsed;
        }
        for stats in per_tool.values_mut() {
            stats.average = stats.total / stats.count as u32;
        }
        let count = self.completed.len();
        let average = if count == 0 {
            Duration::ZERO
        } else {
            total / count as u32
        };
        ToolUsageSummary {
            count,
            total,
            average,
            per_tool,
        }
    }

    pub fn clear(&mut self) {
        self.active.clear();
        self.completed.clear();
    }

    pub fn active(&self) -> &[ToolInvocation] {
        &self.active
    }

    pub fn completed(&self) -> &[ToolInvocation] {
        &self.completed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_start_then_complete() {
        let mut tracker = ToolTracker::new();
        assert!(tracker.start("get_weather", "call_0", json!({"city": "sf"})));
        assert_eq!(tracker.active().len(), 1);

        let record = tracker
            .complete("get_weather", Some("call_0"), "It's always sunny in sf!")
            .cloned();
        let record = record.unwrap();
        assert_eq!(record.status, InvocationStatus::Completed);
        assert_eq!(record.result.as_deref(), Some("It's always sunny in sf!"));
        assert!(record.duration.is_some());
        assert!(tracker.active().is_empty());
        assert_eq!(tracker.completed().len(), 1);
    }

    #[test]
    fn test_complete_without_start_is_noop() {
        let mut tracker = ToolTracker::new();
        assert!(tracker.complete("get_weather", None, "orphan result").is_none());
        assert!(tracker.active().is_empty());
        assert!(tracker.completed().is_empty());
    }

    #[test]
    fn test_duplicate_start_is_rejected() {
        let mut tracker = ToolTracker::new();
        assert!(tracker.start("get_weather", "call_0", json!({"city": "sf"})));
        assert!(!tracker.start("get_weather", "call_0", json!({"city": "la"})));
        assert_eq!(tracker.active().len(), 1);
        assert_eq!(tracker.active()[0].arguments, json!({"city": "sf"}));
    }

    #[test]
    fn test_complete_prefers_call_id() {
        let mut tracker = ToolTracker::new();
        tracker.start("get_weather", "call_0", json!({"city": "sf"}));
        tracker.start("get_weather", "call_1", json!({"city": "la"}));

        let record = tracker.complete("get_weather", Some("call_1"), "sunny").cloned();
        assert_eq!(record.unwrap().id, "call_1");
        assert_eq!(tracker.active().len(), 1);
        assert_eq!(tracker.active()[0].id, "call_0");
    }

    #[test]
    fn test_complete_falls_back_to_oldest_by_name() {
        let mut tracker = ToolTracker::new();
        tracker.start("get_weather", "call_0", json!({"city": "sf"}));
        tracker.start("get_weather", "call_1", json!({"city": "la"}));

        let record = tracker.complete("get_weather", None, "sunny").cloned();
        assert_eq!(record.unwrap().id, "call_0");
        assert_eq!(tracker.active()[0].id, "call_1");
    }

    #[test]
    fn test_summary_on_empty_tracker() {
        let tracker = ToolTracker::new();
        let summary = tracker.summary();
        assert_eq!(summary.count, 0);
        assert_eq!(summary.total, Duration::ZERO);
        assert_eq!(summary.average, Duration::ZERO);
        assert!(summary.per_tool.is_empty());
    }

    #[test]
    fn test_summary_groups_by_tool() {
        let mut tracker = ToolTracker::new();
        tracker.start("get_weather", "call_0", json!({"city": "sf"}));
        tracker.start("get_weather", "call_1", json!({"city": "la"}));
        tracker.start("fetch_page", "call_2", json!({"url": "http://example.com"}));
        tracker.complete("get_weather", Some("call_0"), "sunny");
        tracker.complete("get_weather", Some("call_1"), "sunny");
        tracker.complete("fetch_page", Some("call_2"), "<html>");

        let summary = tracker.summary();
        assert_eq!(summary.count, 3);
        assert_eq!(summary.per_tool.len(), 2);
        assert_eq!(summary.per_tool["get_weather"].count, 2);
        assert_eq!(summary.per_tool["fetch_page"].count, 1);
    }

    #[test]
    fn test_clear_empties_both_lists() {
        let mut tracker = ToolTracker::new();
        tracker.start("get_weather", "call_0", json!({}));
        tracker.start("get_weather", "call_1", json!({}));
        tracker.complete("get_weather", Some("call_0"), "sunny");

        tracker.clear();
        assert!(tracker.active().is_empty());
        assert!(tracker.completed().is_empty());
        assert_eq!(tracker.summary().count, 0);
    }
}
