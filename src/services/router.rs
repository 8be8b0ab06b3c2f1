//! Data Router - Configuration, Wiring and Lifecycle
//!
//! `DataRouter` is the facade callers hold. It validates configuration,
//! wires the evaluator, routing engine, failover manager, statistics
//! tracker and health reporter around shared failure state, and runs
//! three periodic background tasks: health probing of cooled-down
//! sources, metrics retention cleanup, and the learning update.

use crate::services::failover_manager::{
    FailoverManager, FailoverRequest, FailoverResponse, FailoverResult, FailoverStrategy,
    FailoverValidationResult, FailureTracker,
};
use crate::services::health_reporter::{
    HealthReporter, RecommendationCategory, RouteDiagnostics, RouteHealthReport,
    RouteRecommendation,
};
use crate::services::load_balancer::LoadBalancer;
use crate::services::quality_evaluator::{
    DataSourceQuality, EvaluationType, QualityEvaluator, QualityHistoryPoint,
};
use crate::services::routing_engine::{PreselectedSource, RoutingEngine, SelectedDataSource};
use crate::services::statistics_tracker::{
    PerformanceMetrics, RouteStatistics, StatisticsTracker,
};
use crate::services::{DataSourceProvider, OperationExecutor};
use crate::types::{
    DataOperation, DataSource, RequestContext, SelectionCriteria, StatisticsPeriod,
};
use crate::utils::error::{RouterError, RouterResult};
use crate::utils::logger::{LogLevel, Logger};
use crate::utils::time::get_current_timestamp_ms;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Router configuration. Durations are seconds, quality thresholds are
/// fractions in [0, 1].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataRouterConfig {
    pub health_check_interval_secs: u64,
    pub metrics_cleanup_interval_secs: u64,
    pub learning_update_interval_secs: u64,
    pub quality_cache_ttl_secs: u64,
    pub source_cooldown_secs: u64,
    pub max_failover_timeout_secs: u64,
    pub statistics_retention_secs: u64,
    pub max_retries: u32,
    pub min_healthy_sources: usize,
    pub min_failover_quality: f64,
    pub max_healthy_response_time_ms: u64,
    pub preselection_confidence_threshold: f64,
    pub enable_predictive_routing: bool,
    pub healthy_quality_threshold: f64,
    pub degraded_quality_threshold: f64,
    pub unhealthy_quality_threshold: f64,
    pub quality_history_limit: usize,
    pub log_level: String,
}

impl Default for DataRouterConfig {
    fn default() -> Self {
        Self {
            health_check_interval_secs: 60,
            metrics_cleanup_interval_secs: 3600,
            learning_update_interval_secs: 1800,
            quality_cache_ttl_secs: 600,
            source_cooldown_secs: 300,
            max_failover_timeout_secs: 30,
            statistics_retention_secs: 604_800,
            max_retries: 3,
            min_healthy_sources: 2,
            min_failover_quality: 0.5,
            max_healthy_response_time_ms: 200,
            preselection_confidence_threshold: 0.6,
            enable_predictive_routing: true,
            healthy_quality_threshold: 0.8,
            degraded_quality_threshold: 0.6,
            unhealthy_quality_threshold: 0.3,
            quality_history_limit: 1000,
            log_level: "info".to_string(),
        }
    }
}

impl DataRouterConfig {
    /// Short intervals and verbose logging for local work
    pub fn development() -> Self {
        Self {
            health_check_interval_secs: 5,
            metrics_cleanup_interval_secs: 60,
            learning_update_interval_secs: 30,
            quality_cache_ttl_secs: 5,
            source_cooldown_secs: 10,
            max_failover_timeout_secs: 5,
            statistics_retention_secs: 3600,
            min_healthy_sources: 1,
            log_level: "debug".to_string(),
            ..Self::default()
        }
    }

    /// Production profile, identical to the defaults
    pub fn production() -> Self {
        Self::default()
    }

    pub fn validate(&self) -> RouterResult<()> {
        if self.health_check_interval_secs == 0 {
            return Err(RouterError::config_error(
                "health_check_interval_secs must be positive",
            ));
        }
        if self.metrics_cleanup_interval_secs == 0 || self.learning_update_interval_secs == 0 {
            return Err(RouterError::config_error(
                "background task intervals must be positive",
            ));
        }
        if self.max_failover_timeout_secs == 0 {
            return Err(RouterError::config_error(
                "max_failover_timeout_secs must be positive",
            ));
        }
        if !(0.0..=1.0).contains(&self.min_failover_quality) {
            return Err(RouterError::config_error(
                "min_failover_quality must be within [0, 1]",
            ));
        }
        if !(0.0..=1.0).contains(&self.preselection_confidence_threshold) {
            return Err(RouterError::config_error(
                "preselection_confidence_threshold must be within [0, 1]",
            ));
        }
        let thresholds_ordered = self.unhealthy_quality_threshold
            < self.degraded_quality_threshold
            && self.degraded_quality_threshold < self.healthy_quality_threshold
            && (0.0..=1.0).contains(&self.healthy_quality_threshold)
            && self.unhealthy_quality_threshold >= 0.0;
        if !thresholds_ordered {
            return Err(RouterError::config_error(
                "quality thresholds must satisfy unhealthy < degraded < healthy within [0, 1]",
            ));
        }
        if self.quality_history_limit == 0 {
            return Err(RouterError::config_error(
                "quality_history_limit must be positive",
            ));
        }
        Ok(())
    }
}

/// What the optimization pass is allowed to touch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OptimizationScope {
    Cache,
    Cooldown,
    #[default]
    Full,
}

/// One tunable changed by the optimization pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingAdjustment {
    pub parameter: String,
    pub previous_value: u64,
    pub new_value: u64,
    pub rationale: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteOptimizationResult {
    pub scope: OptimizationScope,
    pub adjustments: Vec<RoutingAdjustment>,
    /// Rough fraction of routing outcomes expected to improve
    pub expected_improvement: f64,
    pub optimization_time_ms: u64,
}

/// Facade over the routing services. Cheap to clone; clones share all
/// state including the background task handles.
#[derive(Clone)]
pub struct DataRouter {
    config: Arc<DataRouterConfig>,
    logger: Logger,
    provider: Arc<dyn DataSourceProvider>,
    executor: Arc<dyn OperationExecutor>,
    evaluator: QualityEvaluator,
    engine: RoutingEngine,
    failover: FailoverManager,
    stats: StatisticsTracker,
    failures: FailureTracker,
    health: HealthReporter,
    shutdown_tx: Arc<Mutex<Option<watch::Sender<bool>>>>,
    task_handles: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl DataRouter {
    pub fn new(
        config: DataRouterConfig,
        provider: Arc<dyn DataSourceProvider>,
        executor: Arc<dyn OperationExecutor>,
    ) -> RouterResult<Self> {
        config.validate()?;
        let config = Arc::new(config);
        let logger = Logger::new(LogLevel::from_string(&config.log_level))
            .component("data_router");

        let failures = FailureTracker::new(config.source_cooldown_secs * 1000);
        let stats = StatisticsTracker::new(logger.component("statistics"));
        let evaluator = QualityEvaluator::new(
            logger.component("quality"),
            config.quality_cache_ttl_secs * 1000,
            config.quality_history_limit,
            failures.clone(),
            stats.clone(),
        );
        let balancer = LoadBalancer::new(logger.component("balancer"), stats.clone());
        let engine = RoutingEngine::new(
            logger.component("routing"),
            config.clone(),
            provider.clone(),
            executor.clone(),
            evaluator.clone(),
            failures.clone(),
            stats.clone(),
            balancer,
        );
        let failover = FailoverManager::new(
            logger.component("failover"),
            config.clone(),
            provider.clone(),
            executor.clone(),
            evaluator.clone(),
            failures.clone(),
            stats.clone(),
        );
        let health = HealthReporter::new(
            logger.component("health"),
            config.clone(),
            provider.clone(),
            evaluator.clone(),
            failures.clone(),
            stats.clone(),
        );

        Ok(Self {
            config,
            logger,
            provider,
            executor,
            evaluator,
            engine,
            failover,
            stats,
            failures,
            health,
            shutdown_tx: Arc::new(Mutex::new(None)),
            task_handles: Arc::new(Mutex::new(Vec::new())),
        })
    }

    pub fn config(&self) -> &DataRouterConfig {
        &self.config
    }

    /// Spawn the background tasks. Calling `start` twice is an error.
    pub fn start(&self) -> RouterResult<()> {
        let (tx, rx) = watch::channel(false);
        {
            let mut guard = self
                .shutdown_tx
                .lock()
                .map_err(|_| RouterError::internal_error("shutdown state poisoned"))?;
            if guard.is_some() {
                return Err(RouterError::validation_error("router already started"));
            }
            *guard = Some(tx);
        }

        let mut handles = Vec::with_capacity(3);
        handles.push(self.spawn_cycle(
            "health_check",
            self.config.health_check_interval_secs,
            rx.clone(),
            |router| async move {
                router.run_health_check_cycle().await.map(|_| ())
            },
        ));
        handles.push(self.spawn_cycle(
            "metrics_cleanup",
            self.config.metrics_cleanup_interval_secs,
            rx.clone(),
            |router| async move {
                router.run_metrics_cleanup_cycle().await.map(|_| ())
            },
        ));
        handles.push(self.spawn_cycle(
            "learning_update",
            self.config.learning_update_interval_secs,
            rx,
            |router| async move { router.run_learning_update_cycle().await },
        ));

        if let Ok(mut guard) = self.task_handles.lock() {
            guard.extend(handles);
        }
        self.logger.info("Data router background tasks started");
        Ok(())
    }

    fn spawn_cycle<F, Fut>(
        &self,
        name: &'static str,
        interval_secs: u64,
        mut shutdown_rx: watch::Receiver<bool>,
        cycle: F,
    ) -> JoinHandle<()>
    where
        F: Fn(DataRouter) -> Fut + Send + 'static,
        Fut: std::future::Future<Output = RouterResult<()>> + Send + 'static,
    {
        let router = self.clone();
        tokio::spawn(async move {
            // Stagger task start so cycles do not line up
            let jitter_ms = rand::thread_rng().gen_range(0..1000);
            tokio::time::sleep(Duration::from_millis(jitter_ms)).await;

            let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = cycle(router.clone()).await {
                            router.logger.warn(&format!("{} cycle failed: {}", name, e));
                        }
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            router.logger.debug(&format!("{} task stopping", name));
                            break;
                        }
                    }
                }
            }
        })
    }

    /// Signal the background tasks and wait for them to stop.
    pub async fn shutdown(&self) -> RouterResult<()> {
        let tx = self
            .shutdown_tx
            .lock()
            .map_err(|_| RouterError::internal_error("shutdown state poisoned"))?
            .take();
        if let Some(tx) = tx {
            let _ = tx.send(true);
        }
        let handles: Vec<JoinHandle<()>> = match self.task_handles.lock() {
            Ok(mut guard) => guard.drain(..).collect(),
            Err(_) => Vec::new(),
        };
        for handle in handles {
            let _ = handle.await;
        }
        self.logger.info("Data router shut down");
        Ok(())
    }

    /// Probe sources whose cooldown window has elapsed. A passing probe
    /// clears the cooldown and failure count; a failing one restarts
    /// the window. Returns the number of recovered sources.
    pub async fn run_health_check_cycle(&self) -> RouterResult<usize> {
        let due = self.failures.expired_cooldowns();
        let mut recovered = 0usize;
        for source_id in due {
            match self.provider.get_source(&source_id).await {
                Ok(Some(source)) => match self.executor.probe(&source).await {
                    Ok(()) => {
                        self.failures.clear_cooldown(&source_id);
                        recovered += 1;
                        self.logger
                            .info(&format!("Source {} recovered from cooldown", source_id));
                    }
                    Err(e) => {
                        self.failures.rearm_cooldown(&source_id);
                        self.logger.warn(&format!(
                            "Probe of {} failed, cooldown restarted: {}",
                            source_id, e
                        ));
                    }
                },
                Ok(None) => {
                    // Source was deregistered; drop its cooldown state
                    self.failures.clear_cooldown(&source_id);
                }
                Err(e) => {
                    self.failures.rearm_cooldown(&source_id);
                    self.logger
                        .warn(&format!("Lookup of {} failed during probe: {}", source_id, e));
                }
            }
        }
        Ok(recovered)
    }

    /// Drop quality history and request records older than the
    /// retention window. Returns the number of entries removed.
    pub async fn run_metrics_cleanup_cycle(&self) -> RouterResult<usize> {
        let retention_ms = self.config.statistics_retention_secs * 1000;
        let pruned = self.evaluator.prune_history_older_than(retention_ms)
            + self.stats.prune_older_than(retention_ms);
        if pruned > 0 {
            self.logger
                .debug(&format!("Metrics cleanup removed {} entries", pruned));
        }
        Ok(pruned)
    }

    /// Refresh learned state: expire stale quality snapshots and
    /// recompute per-source performance metrics.
    pub async fn run_learning_update_cycle(&self) -> RouterResult<()> {
        self.evaluator.prune_expired_cache();
        let sources = self.provider.list_sources().await?;
        self.stats.recompute_performance_metrics(&sources);
        Ok(())
    }

    /// Adjust runtime tunables from observed outcomes. Unstable routing
    /// shortens the quality cache TTL; slow-recovering sources lengthen
    /// the cooldown window. Changes are bounded to [0.5x, 2x] of the
    /// configured values.
    pub fn optimize_routing_strategy(&self, scope: OptimizationScope) -> RouteOptimizationResult {
        let started = get_current_timestamp_ms();
        let mut adjustments = Vec::new();

        if matches!(scope, OptimizationScope::Cache | OptimizationScope::Full) {
            let day_stats = self.stats.get_route_statistics(StatisticsPeriod::LastDay);
            if day_stats.total_requests > 0 {
                let success_rate =
                    day_stats.successful_requests as f64 / day_stats.total_requests as f64;
                let configured_ttl = self.config.quality_cache_ttl_secs * 1000;
                let current_ttl = self.evaluator.cache_ttl_ms();
                let target_ttl = if success_rate < 0.9 {
                    ((current_ttl / 2).max(configured_ttl / 2), "routing instability, re-evaluate sources more often")
                } else if success_rate > 0.98 {
                    ((current_ttl * 3 / 2).min(configured_ttl * 2), "stable routing, quality snapshots can live longer")
                } else {
                    (current_ttl, "")
                };
                if target_ttl.0 != current_ttl {
                    self.evaluator.set_cache_ttl_ms(target_ttl.0);
                    adjustments.push(RoutingAdjustment {
                        parameter: "quality_cache_ttl_ms".to_string(),
                        previous_value: current_ttl,
                        new_value: target_ttl.0,
                        rationale: target_ttl.1.to_string(),
                    });
                }
            }
        }

        if matches!(scope, OptimizationScope::Cooldown | OptimizationScope::Full) {
            let failover_rate = self.stats.failover_success_rate();
            let configured_cooldown = self.config.source_cooldown_secs * 1000;
            let current_cooldown = self.failures.cooldown_ms();
            let target_cooldown = if failover_rate < 0.7 {
                ((current_cooldown * 3 / 2).min(configured_cooldown * 2), "failovers keep failing, hold sources out longer")
            } else if failover_rate > 0.95 {
                ((current_cooldown * 3 / 4).max(configured_cooldown / 2), "failovers reliably succeed, retry sources sooner")
            } else {
                (current_cooldown, "")
            };
            if target_cooldown.0 != current_cooldown {
                self.failures.set_cooldown_ms(target_cooldown.0);
                adjustments.push(RoutingAdjustment {
                    parameter: "source_cooldown_ms".to_string(),
                    previous_value: current_cooldown,
                    new_value: target_cooldown.0,
                    rationale: target_cooldown.1.to_string(),
                });
            }
        }

        let expected_improvement = (adjustments.len() as f64 * 0.05).min(0.2);
        if !adjustments.is_empty() {
            self.logger.info(&format!(
                "Routing optimization applied {} adjustments",
                adjustments.len()
            ));
        }
        RouteOptimizationResult {
            scope,
            adjustments,
            expected_improvement,
            optimization_time_ms: get_current_timestamp_ms().saturating_sub(started),
        }
    }

    // Selection

    pub async fn select_best_data_source(
        &self,
        operation: &DataOperation,
        criteria: Option<&SelectionCriteria>,
        context: Option<&RequestContext>,
    ) -> RouterResult<SelectedDataSource> {
        self.engine
            .select_best_data_source(operation, criteria, context)
            .await
    }

    pub async fn select_data_sources_batch(
        &self,
        operations: &[DataOperation],
        context: Option<&RequestContext>,
    ) -> RouterResult<Vec<RouterResult<SelectedDataSource>>> {
        self.engine
            .select_data_sources_batch(operations, context)
            .await
    }

    pub async fn preselect_data_sources(
        &self,
        upcoming: &[DataOperation],
    ) -> RouterResult<Vec<PreselectedSource>> {
        self.engine.preselect_data_sources(upcoming).await
    }

    // Quality

    pub async fn evaluate_data_source_quality(
        &self,
        source: &DataSource,
        evaluation_type: EvaluationType,
    ) -> RouterResult<DataSourceQuality> {
        self.evaluator.evaluate(source, evaluation_type, None).await
    }

    pub async fn evaluate_data_sources_batch(
        &self,
        sources: &[DataSource],
    ) -> Vec<DataSourceQuality> {
        self.evaluator.evaluate_batch(sources, None).await
    }

    pub fn get_quality_history(
        &self,
        source_id: &str,
        start_time: Option<u64>,
        end_time: Option<u64>,
    ) -> Vec<QualityHistoryPoint> {
        self.evaluator.get_history(source_id, start_time, end_time)
    }

    // Failover

    pub async fn handle_data_source_failure(
        &self,
        source: &DataSource,
        error: &RouterError,
        context: Option<&RequestContext>,
    ) -> RouterResult<FailoverResult> {
        self.failover
            .handle_data_source_failure(source, error, context)
            .await
    }

    pub async fn perform_failover(
        &self,
        request: &FailoverRequest,
        alternative_sources: &[DataSource],
    ) -> RouterResult<FailoverResponse> {
        self.failover
            .perform_failover(request, alternative_sources)
            .await
    }

    pub async fn validate_failover_strategy(
        &self,
        strategy: &FailoverStrategy,
    ) -> RouterResult<FailoverValidationResult> {
        self.failover.validate_failover_strategy(strategy).await
    }

    pub fn sources_under_cooldown(&self) -> Vec<String> {
        self.failures.sources_under_cooldown()
    }

    // Learning and statistics

    /// Feed an observed routing outcome back into the learning state.
    pub fn record_route_result(&self, source_id: &str, success: bool, response_time_ms: u64) {
        self.stats.record_request(source_id, success, response_time_ms);
        if !success {
            self.failures.record_failure(source_id);
        }
    }

    pub fn get_route_statistics(&self, period: StatisticsPeriod) -> RouteStatistics {
        self.stats.get_route_statistics(period)
    }

    pub fn get_performance_metrics(&self, source_id: &str) -> Option<PerformanceMetrics> {
        self.stats.get_performance_metrics(source_id)
    }

    /// Discard learned state (quality cache, history, request records,
    /// failover events, performance metrics). Cumulative usage counts
    /// survive so load balancing keeps its long-term spread.
    pub fn reset_route_learning(&self) {
        self.evaluator.clear_cache();
        self.evaluator.clear_history();
        self.stats.clear_learning_state();
        self.logger.info("Route learning state reset");
    }

    // Health and diagnostics

    pub async fn get_route_health_report(&self) -> RouterResult<RouteHealthReport> {
        self.health.get_route_health_report().await
    }

    pub async fn perform_route_diagnostics(
        &self,
        operation: &DataOperation,
    ) -> RouterResult<RouteDiagnostics> {
        self.health.perform_route_diagnostics(operation).await
    }

    pub async fn get_route_recommendations(
        &self,
        category: Option<RecommendationCategory>,
    ) -> RouterResult<Vec<RouteRecommendation>> {
        self.health.get_route_recommendations(category).await
    }
}
