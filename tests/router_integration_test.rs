// tests/router_integration_test.rs
//
// End-to-end selection, lifecycle and learning behavior against
// in-memory provider and executor implementations.

mod common;

use anyhow::Result;
use common::{standard_sources, MockExecutor, MockProvider};
use route_edge::{
    DataOperation, DataRouter, DataRouterConfig, OperationType, OptimizationScope,
    RequestContext, StatisticsPeriod, WarmupStatus,
};
use std::sync::Arc;

fn test_config() -> DataRouterConfig {
    DataRouterConfig {
        source_cooldown_secs: 0,
        min_healthy_sources: 1,
        log_level: "error".to_string(),
        ..DataRouterConfig::default()
    }
}

fn build_router(config: DataRouterConfig) -> (DataRouter, MockExecutor) {
    let executor = MockExecutor::new();
    let router = DataRouter::new(
        config,
        Arc::new(MockProvider::new(standard_sources())),
        Arc::new(executor.clone()),
    )
    .expect("router construction");
    (router, executor)
}

#[tokio::test]
async fn test_read_selects_lightly_loaded_cache() -> Result<()> {
    let (router, _) = build_router(test_config());
    let operation = DataOperation::new(OperationType::Read);

    let selected = router
        .select_best_data_source(&operation, None, None)
        .await?;

    // The API source sits at 95% capacity and is excluded outright;
    // between cache and database the cache scores higher on a cold start.
    assert_eq!(selected.data_source.id, "cache-1");
    assert_ne!(selected.data_source.id, "api-1");
    assert!(selected.confidence >= 0.0 && selected.confidence <= 1.0);
    Ok(())
}

#[tokio::test]
async fn test_repeated_selection_spreads_load() -> Result<()> {
    let (router, _) = build_router(test_config());
    let operation = DataOperation::new(OperationType::Read);

    let first = router
        .select_best_data_source(&operation, None, None)
        .await?;
    let second = router
        .select_best_data_source(&operation, None, None)
        .await?;

    // Usage-weighted balancing: the first winner is demoted on the
    // second pick, so two calls land on two different sources.
    assert_ne!(first.data_source.id, second.data_source.id);
    Ok(())
}

#[tokio::test]
async fn test_stream_routes_to_message_queue_or_api_only() -> Result<()> {
    let (router, _) = build_router(test_config());
    let operation = DataOperation::new(OperationType::Stream);

    // The standard field has no message queue and the API is over
    // capacity, so a stream operation finds no candidates.
    let result = router.select_best_data_source(&operation, None, None).await;
    assert!(result.is_err());
    Ok(())
}

#[tokio::test]
async fn test_expired_deadline_rejected_before_selection() -> Result<()> {
    let (router, _) = build_router(test_config());
    let operation = DataOperation::new(OperationType::Read);
    let context = RequestContext::new().with_deadline_ms(1);

    let result = router
        .select_best_data_source(&operation, None, Some(&context))
        .await;
    assert!(result.is_err());
    Ok(())
}

#[tokio::test]
async fn test_cooldown_excludes_source_until_probe_passes() -> Result<()> {
    let (router, executor) = build_router(test_config());
    let sources = standard_sources();
    let cache = sources[0].clone();
    let operation = DataOperation::new(OperationType::Read);

    executor.set_failing("cache-1", true);
    let error = route_edge::RouterError::execution_error("cache read failed");
    let outcome = router
        .handle_data_source_failure(&cache, &error, None)
        .await?;
    assert!(outcome.success);
    assert_eq!(outcome.target_source.as_ref().map(|s| s.id.as_str()), Some("db-1"));
    assert!(router.sources_under_cooldown().contains(&"cache-1".to_string()));

    // Under cooldown the cache cannot win a selection
    let selected = router
        .select_best_data_source(&operation, None, None)
        .await?;
    assert_eq!(selected.data_source.id, "db-1");

    // Probe still failing: the health cycle rearms the cooldown
    let recovered = router.run_health_check_cycle().await?;
    assert_eq!(recovered, 0);
    assert!(router.sources_under_cooldown().contains(&"cache-1".to_string()));

    // Probe passing: the cycle clears the cooldown
    executor.set_failing("cache-1", false);
    let recovered = router.run_health_check_cycle().await?;
    assert_eq!(recovered, 1);
    assert!(router.sources_under_cooldown().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_batch_selection_tolerates_per_operation_failures() -> Result<()> {
    let (router, _) = build_router(test_config());
    let operations = vec![
        DataOperation::new(OperationType::Read),
        DataOperation::new(OperationType::Stream),
        DataOperation::new(OperationType::Read),
    ];

    let results = router.select_data_sources_batch(&operations, None).await?;
    assert_eq!(results.len(), 3);
    assert!(results[0].is_ok());
    assert!(results[1].is_err());
    assert!(results[2].is_ok());
    Ok(())
}

#[tokio::test]
async fn test_preselection_warms_hot_operation_types() -> Result<()> {
    let (router, executor) = build_router(test_config());
    let upcoming = vec![
        DataOperation::new(OperationType::Read),
        DataOperation::new(OperationType::Read),
        DataOperation::new(OperationType::Read),
        DataOperation::new(OperationType::Write),
    ];

    let preselected = router.preselect_data_sources(&upcoming).await?;

    // Only the read workload repeats often enough to count as hot
    assert_eq!(preselected.len(), 1);
    assert_eq!(preselected[0].operation_type, OperationType::Read);
    assert_eq!(preselected[0].warmup, WarmupStatus::WarmedUp);
    assert!(!executor.warmups.lock().unwrap().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_statistics_reflect_recorded_outcomes() -> Result<()> {
    let (router, _) = build_router(test_config());

    router.record_route_result("cache-1", true, 5);
    router.record_route_result("cache-1", true, 7);
    router.record_route_result("db-1", false, 0);

    let stats = router.get_route_statistics(StatisticsPeriod::LastHour);
    assert_eq!(stats.total_requests, 3);
    assert_eq!(stats.successful_requests, 2);
    Ok(())
}

#[tokio::test]
async fn test_routed_and_reported_call_counts_once() -> Result<()> {
    let (router, _) = build_router(test_config());
    let operation = DataOperation::new(OperationType::Read);

    let selected = router
        .select_best_data_source(&operation, None, None)
        .await?;
    router.record_route_result(&selected.data_source.id, true, 6);

    // Selection moves only the usage counter; the reported outcome is
    // the single request on the books.
    let stats = router.get_route_statistics(StatisticsPeriod::LastHour);
    assert_eq!(stats.total_requests, 1);
    assert_eq!(stats.successful_requests, 1);
    assert_eq!(
        stats.source_usage.get(&selected.data_source.id).copied(),
        Some(1)
    );
    Ok(())
}

#[tokio::test]
async fn test_criteria_requirements_shift_selection_reason() -> Result<()> {
    use route_edge::{PerformanceRequirements, SelectionCriteria, SelectionReason};

    let operation = DataOperation::new(OperationType::Read);
    let criteria_with_ceiling = |max_response_time_ms| SelectionCriteria {
        performance: Some(PerformanceRequirements {
            max_response_time_ms,
            min_throughput_rps: None,
            expected_concurrency: None,
        }),
        reliability: None,
    };

    // An unmeetable 1ms ceiling drags every candidate's blended score
    // down even though the cache still wins the field.
    let (router, _) = build_router(test_config());
    let strict = router
        .select_best_data_source(&operation, Some(&criteria_with_ceiling(1)), None)
        .await?;
    assert_eq!(strict.data_source.id, "cache-1");
    assert_eq!(strict.reason, SelectionReason::FreshestData);

    // A lenient ceiling leaves the cache near its raw quality
    let (router, _) = build_router(test_config());
    let lenient = router
        .select_best_data_source(&operation, Some(&criteria_with_ceiling(10_000)), None)
        .await?;
    assert_eq!(lenient.data_source.id, "cache-1");
    assert_eq!(lenient.reason, SelectionReason::BestPerformance);
    Ok(())
}

#[tokio::test]
async fn test_health_report_on_healthy_field() -> Result<()> {
    let (router, _) = build_router(test_config());

    let report = router.get_route_health_report().await?;
    assert_eq!(report.total_sources, 3);
    assert!(report.is_healthy);
    assert!(report.healthy_sources >= 1);
    assert_eq!(report.routing_success_rate, 1.0);
    Ok(())
}

#[tokio::test]
async fn test_diagnostics_recommend_compatible_sources() -> Result<()> {
    let (router, _) = build_router(test_config());
    let operation = DataOperation::new(OperationType::Read).with_expected_size(4096);

    let diagnostics = router.perform_route_diagnostics(&operation).await?;
    assert!(!diagnostics.predictions.is_empty());
    assert!(diagnostics.recommended_sources.len() <= 3);
    for prediction in &diagnostics.predictions {
        assert!(prediction.predicted_response_time_ms > 0.0);
        assert!((0.0..=1.0).contains(&prediction.predicted_success_rate));
    }
    Ok(())
}

#[tokio::test]
async fn test_reset_learning_keeps_usage_counts() -> Result<()> {
    let (router, _) = build_router(test_config());
    let operation = DataOperation::new(OperationType::Read);

    let first = router
        .select_best_data_source(&operation, None, None)
        .await?;
    router.record_route_result(&first.data_source.id, true, 5);
    router.reset_route_learning();

    let stats = router.get_route_statistics(StatisticsPeriod::LastHour);
    assert_eq!(stats.total_requests, 0);
    // Usage survives the reset so balancing keeps its spread
    let second = router
        .select_best_data_source(&operation, None, None)
        .await?;
    assert_ne!(first.data_source.id, second.data_source.id);
    Ok(())
}

#[tokio::test]
async fn test_optimization_tightens_cache_under_instability() -> Result<()> {
    let (router, _) = build_router(test_config());

    // Mostly failing outcomes push routing success below 0.9
    for _ in 0..8 {
        router.record_route_result("db-1", false, 0);
    }
    router.record_route_result("db-1", true, 50);

    let result = router.optimize_routing_strategy(OptimizationScope::Cache);
    assert_eq!(result.adjustments.len(), 1);
    let adjustment = &result.adjustments[0];
    assert_eq!(adjustment.parameter, "quality_cache_ttl_ms");
    assert!(adjustment.new_value < adjustment.previous_value);
    Ok(())
}

#[tokio::test]
async fn test_lifecycle_start_and_shutdown() -> Result<()> {
    let (router, _) = build_router(test_config());

    router.start()?;
    assert!(router.start().is_err());
    router.shutdown().await?;
    // A stopped router can be started again
    router.start()?;
    router.shutdown().await?;
    Ok(())
}
