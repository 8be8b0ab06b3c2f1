//! Quality Evaluator - Multi-Factor Source Scoring
//!
//! Scores each data source on performance, reliability, data quality and
//! cost, caches the snapshot under a TTL, and appends a history point on
//! every fresh evaluation. Batch evaluation fans out concurrently and
//! isolates per-source failures.

use crate::services::failover_manager::FailureTracker;
use crate::services::statistics_tracker::StatisticsTracker;
use crate::types::{DataSource, RequestContext, SourceHealth, StatisticsPeriod};
use crate::utils::error::{EvaluationError, RouterResult};
use crate::utils::logger::Logger;
use crate::utils::time::get_current_timestamp_ms;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

// Sub-score weights for the overall composite
const PERFORMANCE_WEIGHT: f64 = 0.3;
const RELIABILITY_WEIGHT: f64 = 0.3;
const DATA_QUALITY_WEIGHT: f64 = 0.3;
const COST_WEIGHT: f64 = 0.1;

const CONSECUTIVE_FAILURE_PENALTY: f64 = 0.2;
const COOLDOWN_PENALTY: f64 = 0.3;

/// How much detail an evaluation carries in its metrics map
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationType {
    #[default]
    Standard,
    Thorough,
}

/// Cached quality snapshot for one source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSourceQuality {
    pub source_id: String,
    pub overall_score: f64,
    pub performance_score: f64,
    pub reliability_score: f64,
    pub data_quality_score: f64,
    pub cost_score: f64,
    /// Epoch milliseconds of the (possibly cached) computation
    pub evaluation_time: u64,
    pub metrics: HashMap<String, f64>,
}

impl DataSourceQuality {
    /// Zeroed snapshot standing in for a source whose evaluation failed
    pub fn degraded(source_id: &str, now: u64) -> Self {
        let mut metrics = HashMap::new();
        metrics.insert("evaluation_failed".to_string(), 1.0);
        Self {
            source_id: source_id.to_string(),
            overall_score: 0.0,
            performance_score: 0.0,
            reliability_score: 0.0,
            data_quality_score: 0.0,
            cost_score: 0.0,
            evaluation_time: now,
            metrics,
        }
    }
}

/// Timestamped quality sample kept in the bounded per-source history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityHistoryPoint {
    pub timestamp: u64,
    pub quality_score: f64,
    pub response_time_ms: f64,
    pub success_rate: f64,
}

/// Multi-factor quality evaluator with a TTL cache
#[derive(Clone)]
pub struct QualityEvaluator {
    logger: Logger,
    cache_ttl_ms: Arc<AtomicU64>,
    history_limit: usize,
    cache: Arc<Mutex<HashMap<String, DataSourceQuality>>>,
    history: Arc<Mutex<HashMap<String, VecDeque<QualityHistoryPoint>>>>,
    failures: FailureTracker,
    stats: StatisticsTracker,
}

impl QualityEvaluator {
    pub fn new(
        logger: Logger,
        cache_ttl_ms: u64,
        history_limit: usize,
        failures: FailureTracker,
        stats: StatisticsTracker,
    ) -> Self {
        Self {
            logger,
            cache_ttl_ms: Arc::new(AtomicU64::new(cache_ttl_ms)),
            history_limit,
            cache: Arc::new(Mutex::new(HashMap::new())),
            history: Arc::new(Mutex::new(HashMap::new())),
            failures,
            stats,
        }
    }

    pub fn cache_ttl_ms(&self) -> u64 {
        self.cache_ttl_ms.load(Ordering::Relaxed)
    }

    /// Runtime-adjustable TTL, used by routing optimization
    pub fn set_cache_ttl_ms(&self, ttl_ms: u64) {
        self.cache_ttl_ms.store(ttl_ms, Ordering::Relaxed);
    }

    /// Evaluate a source, serving from the TTL cache when fresh.
    /// A cache hit returns the stored snapshot untouched, including its
    /// original `evaluation_time`. A request context whose deadline has
    /// passed fails the evaluation up front.
    pub async fn evaluate(
        &self,
        source: &DataSource,
        evaluation_type: EvaluationType,
        context: Option<&RequestContext>,
    ) -> RouterResult<DataSourceQuality> {
        if source.max_capacity == 0 {
            return Err(EvaluationError::InvalidSource(format!(
                "source {} has zero capacity",
                source.id
            ))
            .into());
        }

        let now = get_current_timestamp_ms();
        if let Some(ctx) = context {
            if ctx.is_expired(now) {
                return Err(EvaluationError::DeadlineExceeded(source.id.clone()).into());
            }
        }
        let ttl = self.cache_ttl_ms();
        {
            let cache = self
                .cache
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if let Some(cached) = cache.get(&source.id) {
                if now < cached.evaluation_time.saturating_add(ttl) {
                    return Ok(cached.clone());
                }
            }
        }

        let quality = self.compute_quality(source, evaluation_type, now);

        {
            let mut cache = self
                .cache
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            cache.insert(source.id.clone(), quality.clone());
        }
        self.append_history_point(&quality);

        self.logger.debug(&format!(
            "Evaluated source {}: overall={:.3} perf={:.3} rel={:.3}",
            source.id, quality.overall_score, quality.performance_score, quality.reliability_score
        ));

        Ok(quality)
    }

    /// Evaluate many sources concurrently. A failing source degrades to
    /// a zeroed snapshot instead of aborting the batch.
    pub async fn evaluate_batch(
        &self,
        sources: &[DataSource],
        context: Option<&RequestContext>,
    ) -> Vec<DataSourceQuality> {
        let evaluations = sources
            .iter()
            .map(|source| self.evaluate(source, EvaluationType::Standard, context));
        let results = join_all(evaluations).await;

        let now = get_current_timestamp_ms();
        results
            .into_iter()
            .zip(sources.iter())
            .map(|(result, source)| match result {
                Ok(quality) => quality,
                Err(e) => {
                    self.logger.warn(&format!(
                        "Evaluation failed for source {}, degrading: {}",
                        source.id, e
                    ));
                    DataSourceQuality::degraded(&source.id, now)
                }
            })
            .collect()
    }

    fn compute_quality(
        &self,
        source: &DataSource,
        evaluation_type: EvaluationType,
        now: u64,
    ) -> DataSourceQuality {
        let window_ms = StatisticsPeriod::LastHour.duration_ms();
        let expected_rt = self.expected_response_time_ms(source);
        let success_rate = self
            .stats
            .success_rate_for(&source.id, window_ms)
            .unwrap_or(1.0);

        let performance_score = ((1.0 - expected_rt / 1000.0).clamp(0.0, 1.0))
            * (1.0 - 0.5 * source.load_ratio());

        let consecutive_failures = self.failures.consecutive_failures(&source.id);
        let cooldown_penalty = if self.failures.is_under_cooldown(&source.id) {
            COOLDOWN_PENALTY
        } else {
            0.0
        };
        let health_penalty = match source.health {
            SourceHealth::Healthy => 0.0,
            SourceHealth::Warning => 0.1,
            SourceHealth::Unknown => 0.2,
            SourceHealth::Unhealthy => 0.5,
        };
        let reliability_score = (success_rate
            - CONSECUTIVE_FAILURE_PENALTY * consecutive_failures as f64
            - cooldown_penalty
            - health_penalty)
            .clamp(0.0, 1.0);

        let data_quality_score = source.source_type.data_quality_score();
        let cost_score = source.source_type.cost_score();

        let overall_score = (PERFORMANCE_WEIGHT * performance_score
            + RELIABILITY_WEIGHT * reliability_score
            + DATA_QUALITY_WEIGHT * data_quality_score
            + COST_WEIGHT * cost_score)
            .clamp(0.0, 1.0);

        let mut metrics = HashMap::new();
        metrics.insert("expected_response_time_ms".to_string(), expected_rt);
        if evaluation_type == EvaluationType::Thorough {
            metrics.insert("load_ratio".to_string(), source.load_ratio());
            metrics.insert(
                "consecutive_failures".to_string(),
                consecutive_failures as f64,
            );
            metrics.insert("success_rate".to_string(), success_rate);
        }

        DataSourceQuality {
            source_id: source.id.clone(),
            overall_score,
            performance_score: performance_score.clamp(0.0, 1.0),
            reliability_score,
            data_quality_score,
            cost_score,
            evaluation_time: now,
            metrics,
        }
    }

    /// Expected response time: measured average when samples exist,
    /// type baseline otherwise.
    pub fn expected_response_time_ms(&self, source: &DataSource) -> f64 {
        self.stats
            .average_response_time_for(&source.id, StatisticsPeriod::LastHour.duration_ms())
            .unwrap_or(source.source_type.base_response_time_ms() as f64)
    }

    /// Measured success rate with an optimistic default
    pub fn measured_success_rate(&self, source_id: &str) -> f64 {
        self.stats
            .success_rate_for(source_id, StatisticsPeriod::LastHour.duration_ms())
            .unwrap_or(1.0)
    }

    fn append_history_point(&self, quality: &DataSourceQuality) {
        let point = QualityHistoryPoint {
            timestamp: quality.evaluation_time,
            quality_score: quality.overall_score,
            response_time_ms: quality
                .metrics
                .get("expected_response_time_ms")
                .copied()
                .unwrap_or(0.0),
            success_rate: self.measured_success_rate(&quality.source_id),
        };

        if let Ok(mut history) = self.history.lock() {
            let entries = history.entry(quality.source_id.clone()).or_default();
            entries.push_back(point);
            while entries.len() > self.history_limit {
                entries.pop_front();
            }
        }
    }

    /// Quality history for a source, optionally bounded by timestamps
    pub fn get_history(
        &self,
        source_id: &str,
        start_time: Option<u64>,
        end_time: Option<u64>,
    ) -> Vec<QualityHistoryPoint> {
        let history = match self.history.lock() {
            Ok(history) => history,
            Err(_) => return Vec::new(),
        };
        history
            .get(source_id)
            .map(|entries| {
                entries
                    .iter()
                    .filter(|p| {
                        start_time.map(|s| p.timestamp >= s).unwrap_or(true)
                            && end_time.map(|e| p.timestamp <= e).unwrap_or(true)
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Drop cache entries whose TTL elapsed. Returns how many were removed.
    pub fn prune_expired_cache(&self) -> usize {
        let now = get_current_timestamp_ms();
        let ttl = self.cache_ttl_ms();
        let mut cache = match self.cache.lock() {
            Ok(cache) => cache,
            Err(_) => return 0,
        };
        let before = cache.len();
        cache.retain(|_, q| now < q.evaluation_time.saturating_add(ttl));
        before - cache.len()
    }

    /// Drop history points older than the retention cutoff
    pub fn prune_history_older_than(&self, retention_ms: u64) -> usize {
        let cutoff = get_current_timestamp_ms().saturating_sub(retention_ms);
        let mut removed = 0usize;
        if let Ok(mut history) = self.history.lock() {
            for entries in history.values_mut() {
                while matches!(entries.front(), Some(p) if p.timestamp < cutoff) {
                    entries.pop_front();
                    removed += 1;
                }
            }
            history.retain(|_, entries| !entries.is_empty());
        }
        removed
    }

    pub fn clear_cache(&self) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.clear();
        }
    }

    pub fn clear_history(&self) {
        if let Ok(mut history) = self.history.lock() {
            history.clear();
        }
    }

    pub fn cached_quality(&self, source_id: &str) -> Option<DataSourceQuality> {
        self.cache
            .lock()
            .ok()
            .and_then(|cache| cache.get(source_id).cloned())
    }
}
