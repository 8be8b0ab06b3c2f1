//! Routing Engine - Candidate Filtering, Scoring and Selection
//!
//! Turns an operation plus optional selection criteria into a single
//! best source. Candidates are filtered (cooldown, type compatibility,
//! capacity headroom), scored through the quality evaluator with a
//! criteria-dependent blend, then handed to the load balancer for the
//! final usage-weighted pick. Batch selection shares one pattern
//! analysis pass across operations, and preselection warms likely
//! targets ahead of demand.

use crate::services::failover_manager::FailureTracker;
use crate::services::load_balancer::{LoadBalancer, ScoredCandidate};
use crate::services::quality_evaluator::{DataSourceQuality, EvaluationType, QualityEvaluator};
use crate::services::router::DataRouterConfig;
use crate::services::statistics_tracker::StatisticsTracker;
use crate::services::{DataSourceProvider, OperationExecutor};
use crate::types::{
    DataOperation, DataSource, OperationPriority, OperationType, PerformanceRequirements,
    ReliabilityRequirements, RequestContext, SelectionCriteria,
};
use crate::utils::error::{RouterError, RouterResult};
use crate::utils::logger::Logger;
use crate::utils::time::get_current_timestamp_ms;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Capacity headroom gate: sources at or above this load ratio are
/// excluded from selection.
const CAPACITY_EXCLUSION_RATIO: f64 = 0.9;

/// Operation types seen at least this often in a batch count as hot
/// during preselection.
const PRESELECTION_HOT_COUNT: usize = 2;

/// Why a source won the selection, classified from its final score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionReason {
    BestPerformance,
    HighestReliability,
    FreshestData,
    LoadBalancing,
    LowestCost,
}

impl SelectionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SelectionReason::BestPerformance => "best_performance",
            SelectionReason::HighestReliability => "highest_reliability",
            SelectionReason::FreshestData => "freshest_data",
            SelectionReason::LoadBalancing => "load_balancing",
            SelectionReason::LowestCost => "lowest_cost",
        }
    }

    fn from_score(score: f64) -> Self {
        if score >= 0.9 {
            SelectionReason::BestPerformance
        } else if score >= 0.8 {
            SelectionReason::HighestReliability
        } else if score >= 0.7 {
            SelectionReason::FreshestData
        } else if score >= 0.6 {
            SelectionReason::LoadBalancing
        } else {
            SelectionReason::LowestCost
        }
    }
}

/// What the caller should expect from the selected source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpectedPerformance {
    pub response_time_ms: f64,
    pub success_rate: f64,
}

/// Result of a single selection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectedDataSource {
    pub data_source: DataSource,
    pub reason: SelectionReason,
    pub expected_performance: ExpectedPerformance,
    /// How far the winner stood above the candidate field, in [0, 1]
    pub confidence: f64,
    pub selection_time: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarmupStatus {
    WarmedUp,
    WarmupFailed,
    Skipped,
}

/// A source warmed ahead of anticipated demand
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreselectedSource {
    pub operation_type: OperationType,
    pub selection: SelectedDataSource,
    pub warmup: WarmupStatus,
}

#[derive(Clone)]
pub struct RoutingEngine {
    logger: Logger,
    config: Arc<DataRouterConfig>,
    provider: Arc<dyn DataSourceProvider>,
    executor: Arc<dyn OperationExecutor>,
    evaluator: QualityEvaluator,
    failures: FailureTracker,
    stats: StatisticsTracker,
    balancer: LoadBalancer,
}

impl RoutingEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        logger: Logger,
        config: Arc<DataRouterConfig>,
        provider: Arc<dyn DataSourceProvider>,
        executor: Arc<dyn OperationExecutor>,
        evaluator: QualityEvaluator,
        failures: FailureTracker,
        stats: StatisticsTracker,
        balancer: LoadBalancer,
    ) -> Self {
        Self {
            logger,
            config,
            provider,
            executor,
            evaluator,
            failures,
            stats,
            balancer,
        }
    }

    /// Select the best source for one operation.
    pub async fn select_best_data_source(
        &self,
        operation: &DataOperation,
        criteria: Option<&SelectionCriteria>,
        context: Option<&RequestContext>,
    ) -> RouterResult<SelectedDataSource> {
        let now = get_current_timestamp_ms();
        if let Some(ctx) = context {
            if ctx.is_expired(now) {
                return Err(RouterError::timeout_error(format!(
                    "Request {} deadline exceeded before selection",
                    ctx.request_id
                )));
            }
        }

        let sources = self.provider.list_sources().await?;
        let candidates = self.filter_candidates(&sources, operation);
        if candidates.is_empty() {
            return Err(RouterError::no_available_source(format!(
                "No candidate sources for {} operation {}",
                operation.operation_type.as_str(),
                operation.id
            )));
        }

        let mut scored: Vec<(DataSource, DataSourceQuality, f64)> = Vec::new();
        for candidate in candidates {
            match self
                .evaluator
                .evaluate(&candidate, EvaluationType::Standard, context)
                .await
            {
                Ok(quality) => {
                    let score = self.blend_score(&candidate, &quality, criteria);
                    scored.push((candidate, quality, score));
                }
                Err(e) => {
                    self.logger.warn(&format!(
                        "Excluding {} from selection, evaluation failed: {}",
                        candidate.id, e
                    ));
                }
            }
        }

        if scored.is_empty() {
            return Err(RouterError::no_available_source(format!(
                "All candidates failed evaluation for operation {}",
                operation.id
            )));
        }

        let pool: Vec<ScoredCandidate> = scored
            .iter()
            .map(|(source, _, score)| ScoredCandidate {
                source_id: source.id.clone(),
                score: *score,
            })
            .collect();
        let picked_id = self
            .balancer
            .pick(&pool)
            .map(|c| c.source_id.clone())
            .ok_or_else(|| RouterError::internal_error("balancer returned no pick"))?;

        let (source, quality, score) = scored
            .iter()
            .find(|(s, _, _)| s.id == picked_id)
            .cloned()
            .ok_or_else(|| RouterError::internal_error("picked source missing from pool"))?;

        let confidence = Self::confidence(score, &pool);
        let expected_response_time_ms = self.evaluator.expected_response_time_ms(&source);
        let selection = SelectedDataSource {
            reason: SelectionReason::from_score(score),
            expected_performance: ExpectedPerformance {
                response_time_ms: expected_response_time_ms,
                success_rate: quality.reliability_score,
            },
            confidence,
            selection_time: get_current_timestamp_ms(),
            data_source: source,
        };

        self.stats.record_selection(&selection.data_source.id);
        self.logger.info(&format!(
            "Selected {} for operation {} (score {:.3}, reason {}, confidence {:.2})",
            selection.data_source.id,
            operation.id,
            score,
            selection.reason.as_str(),
            confidence
        ));
        Ok(selection)
    }

    /// Select sources for a batch of operations. The batch is analyzed
    /// once and the derived criteria applied to every operation; one
    /// operation failing does not abort the rest.
    pub async fn select_data_sources_batch(
        &self,
        operations: &[DataOperation],
        context: Option<&RequestContext>,
    ) -> RouterResult<Vec<RouterResult<SelectedDataSource>>> {
        if operations.is_empty() {
            return Ok(Vec::new());
        }
        let derived = Self::analyze_batch(operations);
        let mut results = Vec::with_capacity(operations.len());
        for operation in operations {
            results.push(
                self.select_best_data_source(operation, Some(&derived), context)
                    .await,
            );
        }
        let failures = results.iter().filter(|r| r.is_err()).count();
        if failures > 0 {
            self.logger.warn(&format!(
                "Batch selection completed with {}/{} failures",
                failures,
                operations.len()
            ));
        }
        Ok(results)
    }

    /// Warm likely targets for operation types that appear repeatedly
    /// in the upcoming workload. Only selections above the confidence
    /// threshold are warmed, and only when predictive routing is on.
    pub async fn preselect_data_sources(
        &self,
        upcoming: &[DataOperation],
    ) -> RouterResult<Vec<PreselectedSource>> {
        let mut counts: HashMap<OperationType, &DataOperation> = HashMap::new();
        let mut tallies: HashMap<OperationType, usize> = HashMap::new();
        for operation in upcoming {
            *tallies.entry(operation.operation_type).or_insert(0) += 1;
            counts.entry(operation.operation_type).or_insert(operation);
        }

        let mut preselected = Vec::new();
        for (op_type, count) in &tallies {
            if *count < PRESELECTION_HOT_COUNT {
                continue;
            }
            let representative = match counts.get(op_type) {
                Some(op) => *op,
                None => continue,
            };
            let selection = match self
                .select_best_data_source(representative, None, None)
                .await
            {
                Ok(s) => s,
                Err(e) => {
                    self.logger.warn(&format!(
                        "Preselection for {} operations failed: {}",
                        op_type.as_str(),
                        e
                    ));
                    continue;
                }
            };

            let warmup = if !self.config.enable_predictive_routing
                || selection.confidence < self.config.preselection_confidence_threshold
            {
                WarmupStatus::Skipped
            } else {
                match self.executor.warm_up(&selection.data_source).await {
                    Ok(()) => WarmupStatus::WarmedUp,
                    Err(e) => {
                        self.logger.warn(&format!(
                            "Warm-up of {} failed: {}",
                            selection.data_source.id, e
                        ));
                        WarmupStatus::WarmupFailed
                    }
                }
            };

            preselected.push(PreselectedSource {
                operation_type: *op_type,
                selection,
                warmup,
            });
        }
        Ok(preselected)
    }

    fn filter_candidates(
        &self,
        sources: &[DataSource],
        operation: &DataOperation,
    ) -> Vec<DataSource> {
        sources
            .iter()
            .filter(|s| {
                !self.failures.is_under_cooldown(&s.id)
                    && operation.operation_type.is_compatible_with(s.source_type)
                    && s.load_ratio() < CAPACITY_EXCLUSION_RATIO
            })
            .cloned()
            .collect()
    }

    /// Blend raw quality with how well the source fits the caller's
    /// requirement values. Performance criteria blend 0.7 quality with
    /// 0.3 performance fit; reliability criteria blend 0.8 quality with
    /// 0.2 reliability fit; both present averages the two blends.
    fn blend_score(
        &self,
        source: &DataSource,
        quality: &DataSourceQuality,
        criteria: Option<&SelectionCriteria>,
    ) -> f64 {
        let criteria = match criteria {
            Some(c) => c,
            None => return quality.overall_score,
        };
        let performance_blend = criteria.performance.as_ref().map(|req| {
            let fit = Self::performance_fit(
                self.evaluator.expected_response_time_ms(source),
                source,
                req,
            );
            0.7 * quality.overall_score + 0.3 * fit
        });
        let reliability_blend = criteria.reliability.as_ref().map(|req| {
            let fit =
                Self::reliability_fit(self.evaluator.measured_success_rate(&source.id), source, req);
            0.8 * quality.overall_score + 0.2 * fit
        });
        match (performance_blend, reliability_blend) {
            (Some(p), Some(r)) => (p + r) / 2.0,
            (Some(p), None) => p,
            (None, Some(r)) => r,
            (None, None) => quality.overall_score,
        }
    }

    /// How well a source meets performance requirements:
    /// `0.6 × clamp(1 − expected_rt / max_rt) + 0.4 × capacity_fit`.
    /// Expected concurrency and minimum throughput tighten the capacity
    /// term when the source cannot cover them.
    fn performance_fit(
        expected_rt_ms: f64,
        source: &DataSource,
        req: &PerformanceRequirements,
    ) -> f64 {
        let max_rt = req.max_response_time_ms.max(1) as f64;
        let rt_fit = (1.0 - expected_rt_ms / max_rt).clamp(0.0, 1.0);

        let mut capacity_fit = 1.0 - source.load_ratio();
        if let Some(concurrency) = req.expected_concurrency {
            let headroom = source.max_capacity.saturating_sub(source.current_load);
            capacity_fit = capacity_fit
                .min((headroom as f64 / concurrency.max(1) as f64).clamp(0.0, 1.0));
        }
        if let Some(min_rps) = req.min_throughput_rps {
            if min_rps > 0.0 {
                // Headroom per second stands in for attainable throughput
                let attainable = source.max_capacity.saturating_sub(source.current_load) as f64;
                capacity_fit = capacity_fit.min((attainable / min_rps).clamp(0.0, 1.0));
            }
        }
        0.6 * rt_fit + 0.4 * capacity_fit
    }

    /// How well a source meets reliability requirements: the mean of
    /// availability fit, error-rate fit and consistency fit.
    fn reliability_fit(
        success_rate: f64,
        source: &DataSource,
        req: &ReliabilityRequirements,
    ) -> f64 {
        let availability_fit = if req.min_availability <= 0.0 {
            1.0
        } else {
            (success_rate / req.min_availability).clamp(0.0, 1.0)
        };

        let error_rate = 1.0 - success_rate;
        let error_fit = if error_rate <= req.max_error_rate {
            1.0
        } else {
            (req.max_error_rate / error_rate).clamp(0.0, 1.0)
        };

        let consistency_fit = if !req.require_consistency {
            1.0
        } else if source.source_type.supports_strong_consistency() {
            1.0
        } else {
            0.5
        };

        (availability_fit + error_fit + consistency_fit) / 3.0
    }

    /// Normalized margin of the winner over the candidate field.
    /// An undifferentiated field yields 0.5.
    fn confidence(selected_score: f64, pool: &[ScoredCandidate]) -> f64 {
        if pool.len() < 2 {
            return 0.5;
        }
        let sum: f64 = pool.iter().map(|c| c.score).sum();
        let mean = sum / pool.len() as f64;
        let max = pool.iter().map(|c| c.score).fold(f64::MIN, f64::max);
        if (max - mean).abs() < f64::EPSILON {
            return 0.5;
        }
        ((selected_score - mean) / (max - mean)).clamp(0.0, 1.0)
    }

    /// Derive shared criteria from the shape of a batch. Read-heavy
    /// batches get performance requirements sized from the average
    /// expected payload; write-heavy or priority-heavy batches get
    /// reliability requirements. High and urgent priorities halve the
    /// response time ceiling and raise the availability floor.
    fn analyze_batch(operations: &[DataOperation]) -> SelectionCriteria {
        let total = operations.len().max(1);
        let read_like = operations
            .iter()
            .filter(|op| {
                matches!(
                    op.operation_type,
                    OperationType::Read | OperationType::Search
                )
            })
            .count();
        let write_like = operations
            .iter()
            .filter(|op| op.operation_type == OperationType::Write)
            .count();
        let high_priority = operations
            .iter()
            .filter(|op| {
                matches!(
                    op.priority,
                    OperationPriority::High | OperationPriority::Urgent
                )
            })
            .count();
        let priority_heavy = high_priority * 2 >= total;
        let avg_size_bytes = operations
            .iter()
            .map(|op| op.expected_data_size_bytes)
            .sum::<u64>()
            / total as u64;

        let mut criteria = SelectionCriteria::default();
        if read_like * 2 >= total {
            // Payloads above a mebibyte cannot realistically clear the
            // tight ceiling, so large batches get a looser one.
            let mut max_response_time_ms = if avg_size_bytes > 1_048_576 { 500 } else { 200 };
            if priority_heavy {
                max_response_time_ms /= 2;
            }
            criteria.performance = Some(PerformanceRequirements {
                max_response_time_ms,
                min_throughput_rps: None,
                expected_concurrency: Some(total as u32),
            });
        }
        if write_like * 2 >= total || priority_heavy {
            criteria.reliability = Some(ReliabilityRequirements {
                min_availability: if priority_heavy { 0.999 } else { 0.99 },
                max_error_rate: 0.01,
                require_consistency: write_like * 2 >= total,
            });
        }
        criteria
    }
}
