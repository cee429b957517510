//! Token-budgeted history truncation.
//!
//! [`HistoryBudgetManager::truncate`] keeps the longest suffix of a history
//! whose token cost, together with the system preamble, fits a ceiling.
//! Eviction is strictly FIFO by age: the walk goes newest to oldest and stops
//! at the first turn that does not fit, so an older cheap turn is never kept
//! once a newer one has been dropped.
//!
//! # Counter failures
//!
//! Counting is fail-open. When the counter errors, the text is treated as
//! costing zero tokens, a warning is logged and the failure is recorded in
//! [`HistoryBudgetManager::count_failures`]. A counting outage therefore keeps
//! more history than the real limit allows, but never fails the request.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::counter::TokenCounter;
use super::types::{History, Turn};
use crate::log_component;

/// Result of one truncation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Truncation {
    /// Turns kept, oldest first.
    pub kept: History,
    /// Number of older turns evicted.
    pub dropped: usize,
    /// Counted cost of the preamble plus all kept turns.
    pub tokens_used: usize,
}

/// Keeps conversation history inside a model's context budget.
pub struct HistoryBudgetManager {
    counter: Arc<dyn TokenCounter>,
    count_failures: AtomicU64,
}

impl std::fmt::Debug for HistoryBudgetManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HistoryBudgetManager")
            .field("counter", &self.counter.name())
            .field("count_failures", &self.count_failures())
            .finish()
    }
}

impl HistoryBudgetManager {
    /// Create a manager that prices text with `counter`.
    pub fn new(counter: Arc<dyn TokenCounter>) -> Self {
        Self {
            counter,
            count_failures: AtomicU64::new(0),
        }
    }

    /// Name of the underlying counter backend.
    pub fn counter_name(&self) -> &str {
        self.counter.name()
    }

    /// Number of counter calls that failed and were priced at zero.
    pub fn count_failures(&self) -> u64 {
        self.count_failures.load(Ordering::Relaxed)
    }

    /// `true` once any count has fallen back to zero.
    pub fn is_degraded(&self) -> bool {
        self.count_failures() > 0
    }

    /// Token cost of `text`, failing open to 0 when the counter errors.
    pub async fn token_count(&self, text: &str) -> usize {
        match self.counter.count(text).await {
            Ok(tokens) => tokens,
            Err(e) => {
                let failures = self.count_failures.fetch_add(1, Ordering::Relaxed) + 1;
                log_component!(
                    warn,
                    "budget",
                    "Token counter unavailable, pricing text at 0 tokens",
                    counter = self.counter.name(),
                    error = e.to_string(),
                    failures = failures,
                );
                0
            }
        }
    }

    /// Combined cost of both halves of a turn.
    pub async fn turn_cost(&self, turn: &Turn) -> usize {
        let user = self.token_count(turn.user_text()).await;
        let model = self.token_count(turn.model_text()).await;
        user.saturating_add(model)
    }

    /// Longest suffix of `history` that fits `max_tokens` after reserving the
    /// preamble's cost.
    ///
    /// Returns an empty history when `history` is empty, when `max_tokens` is
    /// zero, when the preamble alone exceeds the budget, or when the newest
    /// turn does not fit. The input is never modified.
    pub async fn truncate(
        &self,
        history: &History,
        max_tokens: usize,
        preamble: Option<&str>,
    ) -> History {
        self.truncate_with_report(history, max_tokens, preamble)
            .await
            .kept
    }

    /// Same as [`truncate`](Self::truncate) but also reports what was evicted.
    pub async fn truncate_with_report(
        &self,
        history: &History,
        max_tokens: usize,
        preamble: Option<&str>,
    ) -> Truncation {
        if history.is_empty() || max_tokens == 0 {
            return Truncation {
                kept: History::new(),
                dropped: history.len(),
                tokens_used: 0,
            };
        }

        let mut reserved = match preamble {
            Some(text) => self.token_count(text).await,
            None => 0,
        };

        if reserved > max_tokens {
            log_component!(
                warn,
                "budget",
                "Preamble alone exceeds the context budget, sending no history",
                preamble_tokens = reserved,
                max_tokens = max_tokens,
            );
            return Truncation {
                kept: History::new(),
                dropped: history.len(),
                tokens_used: reserved,
            };
        }

        let turns = history.turns();
        let mut keep_from = turns.len();
        for (index, turn) in turns.iter().enumerate().rev() {
            let cost = self.turn_cost(turn).await;
            match reserved.checked_add(cost) {
                Some(total) if total <= max_tokens => {
                    reserved = total;
                    keep_from = index;
                }
                _ => break,
            }
        }

        let kept = History::from_turns(turns[keep_from..].to_vec());
        let dropped = keep_from;
        if dropped > 0 {
            log_component!(
                debug,
                "budget",
                "History truncated to fit context budget",
                kept = kept.len(),
                dropped = dropped,
                tokens_used = reserved,
                max_tokens = max_tokens,
            );
        }

        Truncation {
            kept,
            dropped,
            tokens_used: reserved,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ClipchatError, Result};
    use crate::history::counter::HeuristicTokenCounter;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::AtomicUsize;

    /// Prices texts from a lookup table; unknown text costs 0.
    /// Records how many times it was asked.
    struct TableCounter {
        costs: HashMap<String, usize>,
        calls: AtomicUsize,
    }

    impl TableCounter {
        fn new(entries: &[(&str, usize)]) -> Self {
            Self {
                costs: entries.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl TokenCounter for TableCounter {
        async fn count(&self, text: &str) -> Result<usize> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.costs.get(text).copied().unwrap_or(0))
        }

        fn name(&self) -> &str {
            "table"
        }
    }

    struct FailingCounter;

    #[async_trait]
    impl TokenCounter for FailingCounter {
        async fn count(&self, _text: &str) -> Result<usize> {
            Err(ClipchatError::TokenCount("service down".into()))
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    /// Turns whose user half carries the whole cost.
    fn priced_history(costs: &[usize]) -> (History, Vec<(String, usize)>) {
        let mut table = Vec::new();
        let turns = costs
            .iter()
            .enumerate()
            .map(|(i, cost)| {
                let user = format!("user-{}", i);
                table.push((user.clone(), *cost));
                Turn::new(user, format!("model-{}", i))
            })
            .collect();
        (History::from_turns(turns), table)
    }

    fn manager_for(table: &[(String, usize)], extra: &[(&str, usize)]) -> HistoryBudgetManager {
        let mut entries: Vec<(&str, usize)> =
            table.iter().map(|(k, v)| (k.as_str(), *v)).collect();
        entries.extend_from_slice(extra);
        HistoryBudgetManager::new(Arc::new(TableCounter::new(&entries)))
    }

    #[tokio::test]
    async fn test_keeps_only_newest_when_next_overflows() {
        // preamble 50, budget 120, turns 40/30/60 oldest to newest
        let (history, table) = priced_history(&[40, 30, 60]);
        let manager = manager_for(&table, &[("PREAMBLE", 50)]);

        let report = manager
            .truncate_with_report(&history, 120, Some("PREAMBLE"))
            .await;

        assert_eq!(report.kept.len(), 1);
        assert_eq!(report.kept.turns()[0].user_text(), "user-2");
        assert_eq!(report.dropped, 2);
        assert_eq!(report.tokens_used, 110);
    }

    #[tokio::test]
    async fn test_preamble_over_budget_yields_empty() {
        let (history, table) = priced_history(&[1, 1, 1, 1]);
        let manager = manager_for(&table, &[("BIG", 200)]);

        let kept = manager.truncate(&history, 100, Some("BIG")).await;
        assert!(kept.is_empty());
    }

    #[tokio::test]
    async fn test_empty_history_makes_no_turn_counts() {
        let counter = Arc::new(TableCounter::new(&[]));
        let manager = HistoryBudgetManager::new(counter.clone());

        let kept = manager.truncate(&History::new(), 100, None).await;
        assert!(kept.is_empty());
        assert_eq!(counter.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_zero_budget_yields_empty() {
        let (history, table) = priced_history(&[0, 0]);
        let manager = manager_for(&table, &[]);
        assert!(manager.truncate(&history, 0, None).await.is_empty());
    }

    #[tokio::test]
    async fn test_newest_turn_too_large_drops_everything() {
        let (history, table) = priced_history(&[1, 1, 500]);
        let manager = manager_for(&table, &[]);
        let report = manager.truncate_with_report(&history, 100, None).await;
        assert!(report.kept.is_empty());
        assert_eq!(report.dropped, 3);
    }

    #[tokio::test]
    async fn test_stops_at_first_overflow_even_if_older_turn_fits() {
        // newest 50 fits, middle 80 overflows, oldest 1 would fit but is behind the gap
        let (history, table) = priced_history(&[1, 80, 50]);
        let manager = manager_for(&table, &[]);
        let kept = manager.truncate(&history, 100, None).await;
        assert_eq!(kept.len(), 1);
        assert_eq!(kept.turns()[0].user_text(), "user-2");
    }

    #[tokio::test]
    async fn test_exact_fit_is_kept() {
        let (history, table) = priced_history(&[30, 70]);
        let manager = manager_for(&table, &[]);
        let kept = manager.truncate(&history, 100, None).await;
        assert_eq!(kept, history);
    }

    #[tokio::test]
    async fn test_both_halves_are_priced() {
        let history = History::from_turns(vec![
            Turn::new("u0", "m0"),
            Turn::new("u1", "m1"),
        ]);
        let counter = TableCounter::new(&[("u0", 10), ("m0", 10), ("u1", 10), ("m1", 10)]);
        let manager = HistoryBudgetManager::new(Arc::new(counter));

        let report = manager.truncate_with_report(&history, 39, None).await;
        assert_eq!(report.kept.len(), 1);
        assert_eq!(report.tokens_used, 20);
    }

    #[tokio::test]
    async fn test_failing_counter_keeps_everything() {
        let history = History::from_turns(
            (0..50)
                .map(|i| Turn::new("x".repeat(1000 + i), "y".repeat(1000)))
                .collect(),
        );
        let manager = HistoryBudgetManager::new(Arc::new(FailingCounter));

        let kept = manager.truncate(&history, 10, Some("preamble")).await;
        assert_eq!(kept, history);
        assert!(manager.is_degraded());
        // preamble + two halves per turn
        assert_eq!(manager.count_failures(), 1 + 2 * 50);
    }

    #[tokio::test]
    async fn test_token_count_fails_open() {
        let manager = HistoryBudgetManager::new(Arc::new(FailingCounter));
        assert_eq!(manager.token_count("anything").await, 0);
        assert_eq!(manager.count_failures(), 1);
    }

    #[tokio::test]
    async fn test_input_not_mutated() {
        let (history, table) = priced_history(&[60, 60, 60]);
        let snapshot = history.clone();
        let manager = manager_for(&table, &[]);
        let _ = manager.truncate(&history, 100, None).await;
        assert_eq!(history, snapshot);
    }

    #[tokio::test]
    async fn test_heuristic_counter_integration() {
        let history = History::from_turns(vec![
            Turn::new("a".repeat(40), "b".repeat(40)), // 20 tokens
            Turn::new("c".repeat(40), "d".repeat(40)), // 20 tokens
        ]);
        let manager = HistoryBudgetManager::new(Arc::new(HeuristicTokenCounter::new()));
        assert_eq!(manager.truncate(&history, 40, None).await.len(), 2);
        assert_eq!(manager.truncate(&history, 39, None).await.len(), 1);
        assert!(!manager.is_degraded());
    }

    #[test]
    fn test_debug_shows_counter_name() {
        let manager = HistoryBudgetManager::new(Arc::new(HeuristicTokenCounter::new()));
        let debug = format!("{:?}", manager);
        assert!(debug.contains("heuristic"));
    }
}
