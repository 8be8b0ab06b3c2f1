//! Health Reporter - Route Health, Diagnostics and Recommendations
//!
//! Read-only reporting over the evaluator and statistics state. Nothing
//! here mutates routing behavior; the reports feed operators and the
//! optimization pass.

use crate::services::failover_manager::FailureTracker;
use crate::services::quality_evaluator::{EvaluationType, QualityEvaluator};
use crate::services::router::DataRouterConfig;
use crate::services::statistics_tracker::StatisticsTracker;
use crate::services::DataSourceProvider;
use crate::types::{
    DataOperation, DataSource, DataSourceType, SourceHealth, StatisticsPeriod,
};
use crate::utils::error::RouterResult;
use crate::utils::logger::Logger;
use crate::utils::time::get_current_timestamp_ms;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthIssueKind {
    SourceFailure,
    PerformanceDegradation,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteHealthIssue {
    pub kind: HealthIssueKind,
    pub source_id: String,
    pub message: String,
}

/// Per-source entry inside a health report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceHealthSnapshot {
    pub source_id: String,
    pub health: SourceHealth,
    pub quality_score: f64,
    pub average_response_time_ms: Option<f64>,
    pub under_cooldown: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteHealthReport {
    pub is_healthy: bool,
    pub total_sources: usize,
    pub healthy_sources: usize,
    pub degraded_sources: usize,
    pub unhealthy_sources: usize,
    pub routing_success_rate: f64,
    pub failover_success_rate: f64,
    pub sources: Vec<SourceHealthSnapshot>,
    pub issues: Vec<RouteHealthIssue>,
    pub generated_at: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticsStatus {
    Normal,
    Warning,
    Error,
}

/// Predicted behavior of one source for a hypothetical operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcePrediction {
    pub source_id: String,
    pub predicted_response_time_ms: f64,
    pub predicted_success_rate: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteDiagnostics {
    pub status: DiagnosticsStatus,
    pub predictions: Vec<SourcePrediction>,
    /// Up to three source ids, best predicted success first
    pub recommended_sources: Vec<String>,
    pub generated_at: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationCategory {
    Performance,
    Reliability,
    Cost,
    Feature,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EstimatedBenefit {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImplementationDifficulty {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteRecommendation {
    pub category: RecommendationCategory,
    pub message: String,
    pub estimated_benefit: EstimatedBenefit,
    pub implementation_difficulty: ImplementationDifficulty,
}

#[derive(Clone)]
pub struct HealthReporter {
    logger: Logger,
    config: Arc<DataRouterConfig>,
    provider: Arc<dyn DataSourceProvider>,
    evaluator: QualityEvaluator,
    failures: FailureTracker,
    stats: StatisticsTracker,
}

impl HealthReporter {
    pub fn new(
        logger: Logger,
        config: Arc<DataRouterConfig>,
        provider: Arc<dyn DataSourceProvider>,
        evaluator: QualityEvaluator,
        failures: FailureTracker,
        stats: StatisticsTracker,
    ) -> Self {
        Self {
            logger,
            config,
            provider,
            evaluator,
            failures,
            stats,
        }
    }

    /// Aggregate health across all registered sources.
    pub async fn get_route_health_report(&self) -> RouterResult<RouteHealthReport> {
        let sources = self.provider.list_sources().await?;
        let qualities = self.evaluator.evaluate_batch(&sources, None).await;
        let window_ms = StatisticsPeriod::LastHour.duration_ms();

        let mut snapshots = Vec::with_capacity(sources.len());
        let mut issues = Vec::new();
        let (mut healthy, mut degraded, mut unhealthy) = (0usize, 0usize, 0usize);

        for quality in &qualities {
            let health = self.classify(quality.overall_score);
            match health {
                SourceHealth::Healthy => healthy += 1,
                SourceHealth::Warning => degraded += 1,
                SourceHealth::Unhealthy => unhealthy += 1,
                SourceHealth::Unknown => {}
            }
            if quality.overall_score < self.config.unhealthy_quality_threshold {
                issues.push(RouteHealthIssue {
                    kind: HealthIssueKind::SourceFailure,
                    source_id: quality.source_id.clone(),
                    message: format!(
                        "Source {} quality {:.2} is below failure threshold {:.2}",
                        quality.source_id,
                        quality.overall_score,
                        self.config.unhealthy_quality_threshold
                    ),
                });
            }
            let average_response_time_ms = self
                .stats
                .average_response_time_for(&quality.source_id, window_ms);
            if let Some(avg_rt) = average_response_time_ms {
                if avg_rt > self.config.max_healthy_response_time_ms as f64 {
                    issues.push(RouteHealthIssue {
                        kind: HealthIssueKind::PerformanceDegradation,
                        source_id: quality.source_id.clone(),
                        message: format!(
                            "Source {} averages {:.0} ms over the last hour, above {} ms",
                            quality.source_id, avg_rt, self.config.max_healthy_response_time_ms
                        ),
                    });
                }
            }
            snapshots.push(SourceHealthSnapshot {
                source_id: quality.source_id.clone(),
                health,
                quality_score: quality.overall_score,
                average_response_time_ms,
                under_cooldown: self.failures.is_under_cooldown(&quality.source_id),
            });
        }

        let day_stats = self.stats.get_route_statistics(StatisticsPeriod::LastDay);
        let routing_success_rate = if day_stats.total_requests == 0 {
            1.0
        } else {
            day_stats.successful_requests as f64 / day_stats.total_requests as f64
        };

        let has_source_failure = issues
            .iter()
            .any(|i| i.kind == HealthIssueKind::SourceFailure);
        let is_healthy = !has_source_failure && healthy >= self.config.min_healthy_sources;

        let report = RouteHealthReport {
            is_healthy,
            total_sources: sources.len(),
            healthy_sources: healthy,
            degraded_sources: degraded,
            unhealthy_sources: unhealthy,
            routing_success_rate,
            failover_success_rate: self.stats.failover_success_rate(),
            sources: snapshots,
            issues,
            generated_at: get_current_timestamp_ms(),
        };
        if !report.is_healthy {
            self.logger.warn(&format!(
                "Route health degraded: {}/{} healthy, {} issues",
                report.healthy_sources,
                report.total_sources,
                report.issues.len()
            ));
        }
        Ok(report)
    }

    /// Predict per-source behavior for a concrete operation and rank
    /// the viable targets.
    pub async fn perform_route_diagnostics(
        &self,
        operation: &DataOperation,
    ) -> RouterResult<RouteDiagnostics> {
        let sources = self.provider.list_sources().await?;
        let compatible: Vec<DataSource> = sources
            .into_iter()
            .filter(|s| operation.operation_type.is_compatible_with(s.source_type))
            .collect();

        let size_factor =
            1.0 + (operation.expected_data_size_bytes.max(1) as f64).ln() / 10.0;
        let param_factor = 1.0 + 0.05 * operation.parameters.len() as f64;
        let difficulty = operation.operation_type.difficulty_factor();

        let mut predictions = Vec::with_capacity(compatible.len());
        for source in &compatible {
            let quality = match self
                .evaluator
                .evaluate(source, EvaluationType::Standard, None)
                .await
            {
                Ok(q) => q,
                Err(e) => {
                    self.logger
                        .warn(&format!("Diagnostics skipped {}: {}", source.id, e));
                    continue;
                }
            };
            let base = self.evaluator.expected_response_time_ms(source);
            predictions.push(SourcePrediction {
                source_id: source.id.clone(),
                predicted_response_time_ms: base * size_factor * param_factor,
                predicted_success_rate: (0.6 * quality.reliability_score
                    + 0.4 * quality.performance_score)
                    * (1.0 - difficulty),
            });
        }

        predictions.sort_by(|a, b| {
            b.predicted_success_rate
                .partial_cmp(&a.predicted_success_rate)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        let recommended_sources: Vec<String> = predictions
            .iter()
            .take(3)
            .map(|p| p.source_id.clone())
            .collect();

        let strong = predictions
            .iter()
            .filter(|p| p.predicted_success_rate >= 0.7)
            .count();
        let viable = predictions
            .iter()
            .filter(|p| p.predicted_success_rate >= 0.5)
            .count();
        let status = if strong >= 2 {
            DiagnosticsStatus::Normal
        } else if viable >= 1 {
            DiagnosticsStatus::Warning
        } else {
            DiagnosticsStatus::Error
        };

        Ok(RouteDiagnostics {
            status,
            predictions,
            recommended_sources,
            generated_at: get_current_timestamp_ms(),
        })
    }

    /// Rule-based improvement suggestions, optionally narrowed to one
    /// category.
    pub async fn get_route_recommendations(
        &self,
        category: Option<RecommendationCategory>,
    ) -> RouterResult<Vec<RouteRecommendation>> {
        let sources = self.provider.list_sources().await?;
        let qualities = self.evaluator.evaluate_batch(&sources, None).await;
        let window_ms = StatisticsPeriod::LastDay.duration_ms();
        let mut recommendations = Vec::new();

        for source in &sources {
            if let Some(avg_rt) = self.stats.average_response_time_for(&source.id, window_ms) {
                if avg_rt > self.config.max_healthy_response_time_ms as f64 {
                    recommendations.push(RouteRecommendation {
                        category: RecommendationCategory::Performance,
                        message: format!(
                            "Source {} averages {:.0} ms; add caching or reduce its routing share",
                            source.id, avg_rt
                        ),
                        estimated_benefit: EstimatedBenefit::High,
                        implementation_difficulty: ImplementationDifficulty::Medium,
                    });
                }
            }
            if let Some(success) = self.stats.success_rate_for(&source.id, window_ms) {
                if success < 0.9 {
                    recommendations.push(RouteRecommendation {
                        category: RecommendationCategory::Reliability,
                        message: format!(
                            "Source {} error rate {:.0}% exceeds 10%; investigate failures",
                            source.id,
                            (1.0 - success) * 100.0
                        ),
                        estimated_benefit: EstimatedBenefit::High,
                        implementation_difficulty: ImplementationDifficulty::Medium,
                    });
                }
            }
        }

        let healthy = qualities
            .iter()
            .filter(|q| q.overall_score >= self.config.healthy_quality_threshold)
            .count();
        if healthy < self.config.min_healthy_sources {
            recommendations.push(RouteRecommendation {
                category: RecommendationCategory::Reliability,
                message: format!(
                    "Only {} healthy sources, minimum is {}; provision additional capacity",
                    healthy, self.config.min_healthy_sources
                ),
                estimated_benefit: EstimatedBenefit::High,
                implementation_difficulty: ImplementationDifficulty::High,
            });
        }

        let usage = self.stats.usage_snapshot();
        let total_usage: u64 = usage.values().sum();
        if total_usage > 0 {
            if let Some((dominant, count)) = usage.iter().max_by_key(|(_, c)| **c) {
                if *count as f64 / total_usage as f64 > 0.7 {
                    recommendations.push(RouteRecommendation {
                        category: RecommendationCategory::Cost,
                        message: format!(
                            "Source {} serves {:.0}% of traffic; rebalance to spread load",
                            dominant,
                            *count as f64 / total_usage as f64 * 100.0
                        ),
                        estimated_benefit: EstimatedBenefit::Medium,
                        implementation_difficulty: ImplementationDifficulty::Low,
                    });
                }
            }
            let api_usage: u64 = sources
                .iter()
                .filter(|s| s.source_type == DataSourceType::RemoteApi)
                .filter_map(|s| usage.get(&s.id))
                .sum();
            if api_usage as f64 / total_usage as f64 > 0.5 {
                recommendations.push(RouteRecommendation {
                    category: RecommendationCategory::Cost,
                    message: format!(
                        "Remote APIs serve {:.0}% of traffic; cache hot reads locally",
                        api_usage as f64 / total_usage as f64 * 100.0
                    ),
                    estimated_benefit: EstimatedBenefit::Medium,
                    implementation_difficulty: ImplementationDifficulty::Medium,
                });
            }
        }

        if !self.config.enable_predictive_routing {
            recommendations.push(RouteRecommendation {
                category: RecommendationCategory::Feature,
                message: "Predictive routing is disabled; enabling it warms likely targets ahead of demand".to_string(),
                estimated_benefit: EstimatedBenefit::Low,
                implementation_difficulty: ImplementationDifficulty::Low,
            });
        }

        if let Some(wanted) = category {
            recommendations.retain(|r| r.category == wanted);
        }
        Ok(recommendations)
    }

    /// Scores below the unhealthy threshold carry too little signal to
    /// classify and come back as Unknown.
    fn classify(&self, quality_score: f64) -> SourceHealth {
        if quality_score >= self.config.healthy_quality_threshold {
            SourceHealth::Healthy
        } else if quality_score >= self.config.degraded_quality_threshold {
            SourceHealth::Warning
        } else if quality_score >= self.config.unhealthy_quality_threshold {
            SourceHealth::Unhealthy
        } else {
            SourceHealth::Unknown
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::OperationType;

    #[test]
    fn test_diagnostics_size_factor_grows_with_payload() {
        let small = DataOperation::new(OperationType::Read).with_expected_size(1);
        let large = DataOperation::new(OperationType::Read).with_expected_size(1_000_000);
        let small_factor =
            1.0 + (small.expected_data_size_bytes.max(1) as f64).ln() / 10.0;
        let large_factor =
            1.0 + (large.expected_data_size_bytes.max(1) as f64).ln() / 10.0;
        assert!(large_factor > small_factor);
        assert!((small_factor - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_prediction_ordering_is_stable_for_equal_rates() {
        let mut predictions = vec![
            SourcePrediction {
                source_id: "a".to_string(),
                predicted_response_time_ms: 10.0,
                predicted_success_rate: 0.8,
            },
            SourcePrediction {
                source_id: "b".to_string(),
                predicted_response_time_ms: 20.0,
                predicted_success_rate: 0.8,
            },
        ];
        predictions.sort_by(|a, b| {
            b.predicted_success_rate
                .partial_cmp(&a.predicted_success_rate)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        assert_eq!(predictions[0].source_id, "a");
    }
}
