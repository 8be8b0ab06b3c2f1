//! Failover Manager - Failure Recording, Cooldown and Transfer Orchestration
//!
//! Owns the per-source failure state machine: healthy -> (failure) ->
//! cooldown -> (window elapsed AND probe passes) -> healthy. A source
//! only leaves cooldown through the periodic health check, never through
//! a selection call. The manager also finds and validates replacement
//! sources and executes the actual transfer against the execution
//! adapter.

use crate::services::quality_evaluator::QualityEvaluator;
use crate::services::router::DataRouterConfig;
use crate::services::statistics_tracker::StatisticsTracker;
use crate::services::{DataSourceProvider, OperationExecutor};
use crate::types::{DataOperation, DataSource, RequestContext, SourceHealth};
use crate::utils::error::{RouterError, RouterResult};
use crate::utils::logger::Logger;
use crate::utils::time::get_current_timestamp_ms;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Per-source failure bookkeeping
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FailureEntry {
    pub consecutive_failures: u32,
    pub last_failure_time: u64,
    pub under_cooldown: bool,
}

/// Shared cooldown and consecutive-failure state.
///
/// `is_under_cooldown` reports the membership flag only; elapsed time is
/// irrelevant until the health check clears the entry.
#[derive(Clone)]
pub struct FailureTracker {
    cooldown_ms: Arc<AtomicU64>,
    entries: Arc<Mutex<HashMap<String, FailureEntry>>>,
}

impl FailureTracker {
    pub fn new(cooldown_ms: u64) -> Self {
        Self {
            cooldown_ms: Arc::new(AtomicU64::new(cooldown_ms)),
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn cooldown_ms(&self) -> u64 {
        self.cooldown_ms.load(Ordering::Relaxed)
    }

    /// Runtime-adjustable cooldown window, used by routing optimization
    pub fn set_cooldown_ms(&self, cooldown_ms: u64) {
        self.cooldown_ms.store(cooldown_ms, Ordering::Relaxed);
    }

    /// Increment the consecutive-failure counter. Returns the new count.
    pub fn record_failure(&self, source_id: &str) -> u32 {
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let entry = entries.entry(source_id.to_string()).or_default();
        entry.consecutive_failures += 1;
        entry.last_failure_time = get_current_timestamp_ms();
        entry.consecutive_failures
    }

    pub fn place_under_cooldown(&self, source_id: &str) {
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let entry = entries.entry(source_id.to_string()).or_default();
        entry.under_cooldown = true;
        entry.last_failure_time = get_current_timestamp_ms();
    }

    pub fn is_under_cooldown(&self, source_id: &str) -> bool {
        self.entries
            .lock()
            .map(|entries| {
                entries
                    .get(source_id)
                    .map(|e| e.under_cooldown)
                    .unwrap_or(false)
            })
            .unwrap_or(false)
    }

    pub fn consecutive_failures(&self, source_id: &str) -> u32 {
        self.entries
            .lock()
            .map(|entries| {
                entries
                    .get(source_id)
                    .map(|e| e.consecutive_failures)
                    .unwrap_or(0)
            })
            .unwrap_or(0)
    }

    /// Sources whose cooldown window has elapsed and are due for a probe
    pub fn expired_cooldowns(&self) -> Vec<String> {
        let now = get_current_timestamp_ms();
        let cooldown = self.cooldown_ms();
        self.entries
            .lock()
            .map(|entries| {
                entries
                    .iter()
                    .filter(|(_, e)| {
                        e.under_cooldown && now >= e.last_failure_time.saturating_add(cooldown)
                    })
                    .map(|(id, _)| id.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Clear cooldown membership and the failure counter after a
    /// passing health probe
    pub fn clear_cooldown(&self, source_id: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            if let Some(entry) = entries.get_mut(source_id) {
                entry.under_cooldown = false;
                entry.consecutive_failures = 0;
            }
        }
    }

    /// Restart the cooldown window after a failing health probe
    pub fn rearm_cooldown(&self, source_id: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            if let Some(entry) = entries.get_mut(source_id) {
                entry.under_cooldown = true;
                entry.last_failure_time = get_current_timestamp_ms();
            }
        }
    }

    pub fn sources_under_cooldown(&self) -> Vec<String> {
        self.entries
            .lock()
            .map(|entries| {
                entries
                    .iter()
                    .filter(|(_, e)| e.under_cooldown)
                    .map(|(id, _)| id.clone())
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Outcome of a single failure-handling call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailoverResult {
    pub success: bool,
    pub original_source_id: String,
    pub target_source: Option<DataSource>,
    pub duration_ms: u64,
    pub reason: String,
    pub error: Option<RouterError>,
}

/// Input to `perform_failover`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailoverRequest {
    pub operation: DataOperation,
    pub failed_source_id: String,
}

/// Outcome of iterating alternatives until one serves the operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailoverResponse {
    pub success: bool,
    pub used_source: Option<DataSource>,
    /// Number of execution attempts, successful or not
    pub failover_count: u32,
    pub duration_ms: u64,
    pub attempted_sources: Vec<String>,
}

/// Statically validated failover plan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailoverStrategy {
    pub id: String,
    pub name: String,
    pub alternative_sources: Vec<DataSource>,
    pub max_retries: u32,
    pub failover_timeout_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueSeverity {
    Critical,
    Warning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueCategory {
    Configuration,
    Quality,
    Retry,
    Timeout,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub severity: IssueSeverity,
    pub category: IssueCategory,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailoverValidationResult {
    pub is_valid: bool,
    pub issues: Vec<ValidationIssue>,
}

/// Failover orchestration service
#[derive(Clone)]
pub struct FailoverManager {
    logger: Logger,
    config: Arc<DataRouterConfig>,
    provider: Arc<dyn DataSourceProvider>,
    executor: Arc<dyn OperationExecutor>,
    evaluator: QualityEvaluator,
    failures: FailureTracker,
    stats: StatisticsTracker,
}

impl FailoverManager {
    pub fn new(
        logger: Logger,
        config: Arc<DataRouterConfig>,
        provider: Arc<dyn DataSourceProvider>,
        executor: Arc<dyn OperationExecutor>,
        evaluator: QualityEvaluator,
        failures: FailureTracker,
        stats: StatisticsTracker,
    ) -> Self {
        Self {
            logger,
            config,
            provider,
            executor,
            evaluator,
            failures,
            stats,
        }
    }

    /// Record a source failure, place it in cooldown and propose a
    /// validated replacement. Quality gaps and missing alternatives are
    /// expected operational outcomes and come back as an unsuccessful
    /// result, not an error.
    pub async fn handle_data_source_failure(
        &self,
        source: &DataSource,
        error: &RouterError,
        context: Option<&RequestContext>,
    ) -> RouterResult<FailoverResult> {
        let started = get_current_timestamp_ms();
        if let Some(ctx) = context {
            if ctx.is_expired(started) {
                return Err(
                    RouterError::timeout_error("Failure handling deadline exceeded")
                        .with_source_id(source.id.clone()),
                );
            }
        }

        let failure_count = self.failures.record_failure(&source.id);
        self.failures.place_under_cooldown(&source.id);
        self.stats.record_request(&source.id, false, 0);

        self.logger.warn(&format!(
            "Source {} failed ({} consecutive): {}",
            source.id, failure_count, error
        ));

        let all_sources = self.provider.list_sources().await?;
        let alternatives: Vec<DataSource> = all_sources
            .into_iter()
            .filter(|s| {
                s.id != source.id
                    && !self.failures.is_under_cooldown(&s.id)
                    && s.health != SourceHealth::Unhealthy
            })
            .collect();

        if alternatives.is_empty() {
            return Ok(FailoverResult {
                success: false,
                original_source_id: source.id.clone(),
                target_source: None,
                duration_ms: get_current_timestamp_ms().saturating_sub(started),
                reason: format!("No alternative sources available for {}", source.id),
                error: Some(RouterError::no_available_source(
                    "no alternatives after excluding failed, cooled-down and unhealthy sources",
                )),
            });
        }

        let mut ranked = self.evaluator.evaluate_batch(&alternatives, context).await;
        ranked.sort_by(|a, b| {
            b.overall_score
                .partial_cmp(&a.overall_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        let best = &ranked[0];

        if best.overall_score < self.config.min_failover_quality {
            let reason = format!(
                "Best alternative {} scored {:.2}, below required failover quality {:.2}",
                best.source_id, best.overall_score, self.config.min_failover_quality
            );
            return Ok(FailoverResult {
                success: false,
                original_source_id: source.id.clone(),
                target_source: None,
                duration_ms: get_current_timestamp_ms().saturating_sub(started),
                reason,
                error: Some(
                    RouterError::quality_below_threshold("failover target quality gap")
                        .with_source_id(best.source_id.clone()),
                ),
            });
        }

        let target = alternatives
            .iter()
            .find(|s| s.id == best.source_id)
            .cloned();
        self.logger.info(&format!(
            "Failing over {} -> {} (quality {:.2})",
            source.id, best.source_id, best.overall_score
        ));

        Ok(FailoverResult {
            success: true,
            original_source_id: source.id.clone(),
            target_source: target,
            duration_ms: get_current_timestamp_ms().saturating_sub(started),
            reason: format!("Failed over to {} (quality {:.2})", best.source_id, best.overall_score),
            error: None,
        })
    }

    /// Try each alternative in order until one executes the operation.
    /// Sources under cooldown are skipped without counting as attempts.
    pub async fn perform_failover(
        &self,
        request: &FailoverRequest,
        alternative_sources: &[DataSource],
    ) -> RouterResult<FailoverResponse> {
        let started = get_current_timestamp_ms();
        let timeout = Duration::from_secs(self.config.max_failover_timeout_secs);
        let mut attempts: u32 = 0;
        let mut attempted: Vec<String> = Vec::new();

        for alternative in alternative_sources {
            if self.failures.is_under_cooldown(&alternative.id) {
                self.logger.debug(&format!(
                    "Skipping cooled-down alternative {}",
                    alternative.id
                ));
                continue;
            }

            attempts += 1;
            attempted.push(alternative.id.clone());

            match tokio::time::timeout(
                timeout,
                self.executor.execute(alternative, &request.operation),
            )
            .await
            {
                Ok(Ok(receipt)) => {
                    let duration_ms = get_current_timestamp_ms().saturating_sub(started);
                    self.stats
                        .record_request(&alternative.id, true, receipt.response_time_ms);
                    self.stats.record_failover_event(true, attempts, duration_ms);
                    self.logger.info(&format!(
                        "Failover for operation {} succeeded on {} after {} attempts",
                        request.operation.id, alternative.id, attempts
                    ));
                    return Ok(FailoverResponse {
                        success: true,
                        used_source: Some(alternative.clone()),
                        failover_count: attempts,
                        duration_ms,
                        attempted_sources: attempted,
                    });
                }
                Ok(Err(e)) => {
                    self.logger.warn(&format!(
                        "Failover attempt on {} failed: {}",
                        alternative.id, e
                    ));
                    self.failures.record_failure(&alternative.id);
                    self.stats.record_request(&alternative.id, false, 0);
                }
                Err(_) => {
                    self.logger.warn(&format!(
                        "Failover attempt on {} timed out after {:?}",
                        alternative.id, timeout
                    ));
                    self.failures.record_failure(&alternative.id);
                    self.stats.record_request(&alternative.id, false, 0);
                }
            }
        }

        let duration_ms = get_current_timestamp_ms().saturating_sub(started);
        self.stats.record_failover_event(false, attempts, duration_ms);

        let mut details = crate::utils::error::ErrorDetails::new();
        details.insert("attempted_sources".to_string(), serde_json::json!(attempted));
        details.insert("failover_count".to_string(), serde_json::json!(attempts));
        Err(RouterError::all_sources_unavailable(format!(
            "All {} failover alternatives exhausted for operation {}",
            attempts, request.operation.id
        ))
        .with_details(details))
    }

    /// Static strategy validation. Never fails the call; problems come
    /// back as issues for the caller to act on.
    pub async fn validate_failover_strategy(
        &self,
        strategy: &FailoverStrategy,
    ) -> RouterResult<FailoverValidationResult> {
        let mut issues: Vec<ValidationIssue> = Vec::new();

        if strategy.alternative_sources.is_empty() {
            issues.push(ValidationIssue {
                severity: IssueSeverity::Critical,
                category: IssueCategory::Configuration,
                message: format!("Strategy {} has no alternative sources", strategy.id),
            });
        } else {
            let qualities = self
                .evaluator
                .evaluate_batch(&strategy.alternative_sources, None)
                .await;
            for quality in &qualities {
                if quality.overall_score < self.config.min_failover_quality {
                    issues.push(ValidationIssue {
                        severity: IssueSeverity::Warning,
                        category: IssueCategory::Quality,
                        message: format!(
                            "Alternative {} quality {:.2} is below {:.2}",
                            quality.source_id,
                            quality.overall_score,
                            self.config.min_failover_quality
                        ),
                    });
                }
            }
        }

        if strategy.max_retries > self.config.max_retries {
            issues.push(ValidationIssue {
                severity: IssueSeverity::Warning,
                category: IssueCategory::Retry,
                message: format!(
                    "Retry count {} exceeds configured maximum {}",
                    strategy.max_retries, self.config.max_retries
                ),
            });
        }

        let timeout_ceiling_ms = self.config.max_failover_timeout_secs * 1000;
        if strategy.failover_timeout_ms > timeout_ceiling_ms {
            issues.push(ValidationIssue {
                severity: IssueSeverity::Warning,
                category: IssueCategory::Timeout,
                message: format!(
                    "Timeout {} ms exceeds ceiling {} ms",
                    strategy.failover_timeout_ms, timeout_ceiling_ms
                ),
            });
        }

        let is_valid = !issues
            .iter()
            .any(|i| i.severity == IssueSeverity::Critical);
        Ok(FailoverValidationResult { is_valid, issues })
    }
}
