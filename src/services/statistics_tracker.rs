//! Statistics Tracker - Per-Source Counters, Route Statistics and Learning State
//!
//! Accumulates raw request records and failover events, recomputes
//! windowed `RouteStatistics` on demand, and derives per-source
//! `PerformanceMetrics` during the periodic learning update. Usage
//! counters are cumulative on purpose: they feed load balancing and
//! survive a learning reset.

use crate::types::{DataSource, StatisticsPeriod};
use crate::utils::logger::Logger;
use crate::utils::time::get_current_timestamp_ms;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

/// Hard cap on retained raw records, independent of the retention window
const MAX_REQUEST_RECORDS: usize = 100_000;
const MAX_FAILOVER_EVENTS: usize = 10_000;

/// Aggregate over a statistics window
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteStatistics {
    pub period: StatisticsPeriod,
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failover_count: u64,
    pub average_response_time_ms: f64,
    /// Requests per source inside the window
    pub source_usage: HashMap<String, u64>,
    pub computed_at: u64,
}

/// Derived per-source metrics, recomputed by the learning update
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub source_id: String,
    pub throughput_rps: f64,
    pub error_rate: f64,
    pub resource_utilization: f64,
    pub computed_at: u64,
}

/// One routed (or failed) request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestRecord {
    pub timestamp: u64,
    pub source_id: String,
    pub success: bool,
    pub response_time_ms: u64,
}

/// One completed failover attempt sequence
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailoverEvent {
    pub timestamp: u64,
    pub success: bool,
    pub attempts: u32,
    pub duration_ms: u64,
}

/// Shared statistics and learning state
#[derive(Clone)]
pub struct StatisticsTracker {
    logger: Logger,
    usage_counts: Arc<Mutex<HashMap<String, u64>>>,
    records: Arc<Mutex<VecDeque<RequestRecord>>>,
    failover_events: Arc<Mutex<VecDeque<FailoverEvent>>>,
    performance_metrics: Arc<Mutex<HashMap<String, PerformanceMetrics>>>,
}

impl StatisticsTracker {
    pub fn new(logger: Logger) -> Self {
        Self {
            logger,
            usage_counts: Arc::new(Mutex::new(HashMap::new())),
            records: Arc::new(Mutex::new(VecDeque::new())),
            failover_events: Arc::new(Mutex::new(VecDeque::new())),
            performance_metrics: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Record a routing decision for a source. Only the cumulative
    /// usage counter moves; request totals wait for the caller to
    /// report the measured outcome.
    pub fn record_selection(&self, source_id: &str) {
        if let Ok(mut usage) = self.usage_counts.lock() {
            *usage.entry(source_id.to_string()).or_insert(0) += 1;
        }
    }

    /// Record a request outcome against a source
    pub fn record_request(&self, source_id: &str, success: bool, response_time_ms: u64) {
        if let Ok(mut records) = self.records.lock() {
            records.push_back(RequestRecord {
                timestamp: get_current_timestamp_ms(),
                source_id: source_id.to_string(),
                success,
                response_time_ms,
            });
            while records.len() > MAX_REQUEST_RECORDS {
                records.pop_front();
            }
        }
    }

    /// Record a completed failover attempt sequence
    pub fn record_failover_event(&self, success: bool, attempts: u32, duration_ms: u64) {
        if let Ok(mut events) = self.failover_events.lock() {
            events.push_back(FailoverEvent {
                timestamp: get_current_timestamp_ms(),
                success,
                attempts,
                duration_ms,
            });
            while events.len() > MAX_FAILOVER_EVENTS {
                events.pop_front();
            }
        }
    }

    /// Recompute windowed statistics from raw records
    pub fn get_route_statistics(&self, period: StatisticsPeriod) -> RouteStatistics {
        let now = get_current_timestamp_ms();
        let cutoff = now.saturating_sub(period.duration_ms());

        let mut total = 0u64;
        let mut successful = 0u64;
        let mut response_time_sum = 0u64;
        let mut source_usage: HashMap<String, u64> = HashMap::new();

        if let Ok(records) = self.records.lock() {
            for record in records.iter().filter(|r| r.timestamp >= cutoff) {
                total += 1;
                if record.success {
                    successful += 1;
                }
                response_time_sum += record.response_time_ms;
                *source_usage.entry(record.source_id.clone()).or_insert(0) += 1;
            }
        }

        let failover_count = self
            .failover_events
            .lock()
            .map(|events| events.iter().filter(|e| e.timestamp >= cutoff).count() as u64)
            .unwrap_or(0);

        RouteStatistics {
            period,
            total_requests: total,
            successful_requests: successful,
            failover_count,
            average_response_time_ms: if total > 0 {
                response_time_sum as f64 / total as f64
            } else {
                0.0
            },
            source_usage,
            computed_at: now,
        }
    }

    /// Measured average response time for a source inside a window
    pub fn average_response_time_for(&self, source_id: &str, window_ms: u64) -> Option<f64> {
        let cutoff = get_current_timestamp_ms().saturating_sub(window_ms);
        let records = self.records.lock().ok()?;
        let samples: Vec<u64> = records
            .iter()
            .filter(|r| r.timestamp >= cutoff && r.source_id == source_id)
            .map(|r| r.response_time_ms)
            .collect();
        if samples.is_empty() {
            return None;
        }
        Some(samples.iter().sum::<u64>() as f64 / samples.len() as f64)
    }

    /// Measured success rate for a source inside a window
    pub fn success_rate_for(&self, source_id: &str, window_ms: u64) -> Option<f64> {
        let cutoff = get_current_timestamp_ms().saturating_sub(window_ms);
        let records = self.records.lock().ok()?;
        let mut total = 0u64;
        let mut successful = 0u64;
        for record in records
            .iter()
            .filter(|r| r.timestamp >= cutoff && r.source_id == source_id)
        {
            total += 1;
            if record.success {
                successful += 1;
            }
        }
        if total == 0 {
            return None;
        }
        Some(successful as f64 / total as f64)
    }

    /// Measured failover success rate across all recorded events.
    /// Reports 1.0 when nothing has failed over yet.
    pub fn failover_success_rate(&self) -> f64 {
        let events = match self.failover_events.lock() {
            Ok(events) => events,
            Err(_) => return 1.0,
        };
        if events.is_empty() {
            return 1.0;
        }
        let successful = events.iter().filter(|e| e.success).count();
        successful as f64 / events.len() as f64
    }

    /// Cumulative usage counter for a source
    pub fn usage_count(&self, source_id: &str) -> u64 {
        self.usage_counts
            .lock()
            .map(|usage| usage.get(source_id).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    /// Snapshot of the cumulative usage counters
    pub fn usage_snapshot(&self) -> HashMap<String, u64> {
        self.usage_counts
            .lock()
            .map(|usage| usage.clone())
            .unwrap_or_default()
    }

    /// Recompute derived per-source metrics from the last-hour window
    pub fn recompute_performance_metrics(&self, sources: &[DataSource]) {
        let window_ms = StatisticsPeriod::LastHour.duration_ms();
        let now = get_current_timestamp_ms();
        let mut computed: HashMap<String, PerformanceMetrics> = HashMap::new();

        for source in sources {
            let total = self
                .records
                .lock()
                .map(|records| {
                    records
                        .iter()
                        .filter(|r| {
                            r.timestamp >= now.saturating_sub(window_ms) && r.source_id == source.id
                        })
                        .count() as u64
                })
                .unwrap_or(0);
            let success_rate = self.success_rate_for(&source.id, window_ms).unwrap_or(1.0);

            computed.insert(
                source.id.clone(),
                PerformanceMetrics {
                    source_id: source.id.clone(),
                    throughput_rps: total as f64 / (window_ms as f64 / 1000.0),
                    error_rate: 1.0 - success_rate,
                    resource_utilization: source.load_ratio(),
                    computed_at: now,
                },
            );
        }

        if let Ok(mut metrics) = self.performance_metrics.lock() {
            *metrics = computed;
        }
        self.logger.debug(&format!(
            "Recomputed performance metrics for {} sources",
            sources.len()
        ));
    }

    pub fn get_performance_metrics(&self, source_id: &str) -> Option<PerformanceMetrics> {
        self.performance_metrics
            .lock()
            .ok()
            .and_then(|metrics| metrics.get(source_id).cloned())
    }

    pub fn performance_metrics_snapshot(&self) -> HashMap<String, PerformanceMetrics> {
        self.performance_metrics
            .lock()
            .map(|metrics| metrics.clone())
            .unwrap_or_default()
    }

    /// Drop raw records and events older than the retention cutoff.
    /// Returns how many entries were removed.
    pub fn prune_older_than(&self, retention_ms: u64) -> usize {
        let cutoff = get_current_timestamp_ms().saturating_sub(retention_ms);
        let mut removed = 0usize;

        if let Ok(mut records) = self.records.lock() {
            while matches!(records.front(), Some(r) if r.timestamp < cutoff) {
                records.pop_front();
                removed += 1;
            }
        }
        if let Ok(mut events) = self.failover_events.lock() {
            while matches!(events.front(), Some(e) if e.timestamp < cutoff) {
                events.pop_front();
                removed += 1;
            }
        }
        removed
    }

    /// Partial reset used by `reset_route_learning`: derived metrics go,
    /// cumulative usage counters stay.
    pub fn clear_learning_state(&self) {
        if let Ok(mut metrics) = self.performance_metrics.lock() {
            metrics.clear();
        }
        if let Ok(mut records) = self.records.lock() {
            records.clear();
        }
        if let Ok(mut events) = self.failover_events.lock() {
            events.clear();
        }
    }
}
