// tests/failover_scenarios_test.rs
//
// Failover ordering, exhaustion and strategy validation scenarios.

mod common;

use anyhow::Result;
use common::{standard_sources, MockExecutor, MockProvider};
use route_edge::{
    DataOperation, DataRouter, DataRouterConfig, DataSource, DataSourceType, FailoverRequest,
    FailoverStrategy, OperationType, RouterError,
};
use std::sync::Arc;

fn test_config() -> DataRouterConfig {
    DataRouterConfig {
        min_healthy_sources: 1,
        max_failover_timeout_secs: 1,
        log_level: "error".to_string(),
        ..DataRouterConfig::default()
    }
}

fn build_router(sources: Vec<DataSource>) -> (DataRouter, MockExecutor) {
    let executor = MockExecutor::new();
    let router = DataRouter::new(
        test_config(),
        Arc::new(MockProvider::new(sources)),
        Arc::new(executor.clone()),
    )
    .expect("router construction");
    (router, executor)
}

fn alternatives() -> Vec<DataSource> {
    vec![
        DataSource::new("alt-a", "Alternative A", DataSourceType::Database, 10, 100),
        DataSource::new("alt-b", "Alternative B", DataSourceType::Database, 10, 100),
        DataSource::new("alt-c", "Alternative C", DataSourceType::RemoteApi, 10, 100),
    ]
}

#[tokio::test]
async fn test_failover_walks_alternatives_in_order() -> Result<()> {
    let (router, executor) = build_router(alternatives());
    executor.set_failing("alt-a", true);
    executor.set_failing("alt-b", true);

    let request = FailoverRequest {
        operation: DataOperation::new(OperationType::Read),
        failed_source_id: "primary".to_string(),
    };
    let response = router.perform_failover(&request, &alternatives()).await?;

    assert!(response.success);
    assert_eq!(response.used_source.as_ref().map(|s| s.id.as_str()), Some("alt-c"));
    assert_eq!(response.failover_count, 3);
    assert_eq!(
        response.attempted_sources,
        vec!["alt-a".to_string(), "alt-b".to_string(), "alt-c".to_string()]
    );
    Ok(())
}

#[tokio::test]
async fn test_failover_exhaustion_reports_attempts() -> Result<()> {
    let (router, executor) = build_router(alternatives());
    for id in ["alt-a", "alt-b", "alt-c"] {
        executor.set_failing(id, true);
    }

    let request = FailoverRequest {
        operation: DataOperation::new(OperationType::Read),
        failed_source_id: "primary".to_string(),
    };
    let result = router.perform_failover(&request, &alternatives()).await;

    let error = result.expect_err("all alternatives failing");
    let details = error.details.expect("attempt details");
    assert_eq!(details["failover_count"], 3);
    Ok(())
}

#[tokio::test]
async fn test_failover_skips_cooled_down_alternatives() -> Result<()> {
    let (router, executor) = build_router(alternatives());
    let failed = DataSource::new("alt-a", "Alternative A", DataSourceType::Database, 10, 100);

    // Put alt-a under cooldown through a recorded failure
    executor.set_failing("alt-a", true);
    let error = RouterError::execution_error("write failed");
    router
        .handle_data_source_failure(&failed, &error, None)
        .await?;
    assert!(router.sources_under_cooldown().contains(&"alt-a".to_string()));

    let request = FailoverRequest {
        operation: DataOperation::new(OperationType::Read),
        failed_source_id: "primary".to_string(),
    };
    let response = router.perform_failover(&request, &alternatives()).await?;

    // alt-a never counts as an attempt
    assert!(response.success);
    assert_eq!(response.failover_count, 1);
    assert_eq!(response.attempted_sources, vec!["alt-b".to_string()]);
    Ok(())
}

#[tokio::test]
async fn test_failure_with_no_alternatives_is_unsuccessful_not_error() -> Result<()> {
    let only = DataSource::new("solo", "Only Source", DataSourceType::Database, 10, 100);
    let (router, _) = build_router(vec![only.clone()]);

    let error = RouterError::execution_error("query failed");
    let outcome = router
        .handle_data_source_failure(&only, &error, None)
        .await?;

    assert!(!outcome.success);
    assert!(outcome.reason.contains("No alternative sources"));
    assert!(outcome.error.is_some());
    assert!(outcome.target_source.is_none());
    Ok(())
}

#[tokio::test]
async fn test_failure_handling_proposes_best_alternative() -> Result<()> {
    let (router, _) = build_router(standard_sources());
    let sources = standard_sources();
    let cache = sources[0].clone();

    let error = RouterError::execution_error("cache miss storm");
    let outcome = router
        .handle_data_source_failure(&cache, &error, None)
        .await?;

    assert!(outcome.success);
    // The database outranks the loaded remote API as a failover target
    assert_eq!(outcome.target_source.as_ref().map(|s| s.id.as_str()), Some("db-1"));
    assert!(router.sources_under_cooldown().contains(&"cache-1".to_string()));
    Ok(())
}

#[tokio::test]
async fn test_repeated_failures_accumulate() -> Result<()> {
    let (router, _) = build_router(standard_sources());
    let sources = standard_sources();
    let cache = sources[0].clone();
    let error = RouterError::execution_error("repeated failure");

    router
        .handle_data_source_failure(&cache, &error, None)
        .await?;
    router
        .handle_data_source_failure(&cache, &error, None)
        .await?;

    // Consecutive failures depress the reliability score
    let quality = router
        .evaluate_data_source_quality(&cache, route_edge::EvaluationType::Thorough)
        .await?;
    assert!(quality.reliability_score < 0.5);
    Ok(())
}

#[tokio::test]
async fn test_empty_strategy_is_critically_invalid() -> Result<()> {
    let (router, _) = build_router(standard_sources());
    let strategy = FailoverStrategy {
        id: "s-empty".to_string(),
        name: "Empty".to_string(),
        alternative_sources: Vec::new(),
        max_retries: 1,
        failover_timeout_ms: 500,
    };

    let validation = router.validate_failover_strategy(&strategy).await?;
    assert!(!validation.is_valid);
    assert_eq!(validation.issues.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_aggressive_strategy_warns_but_validates() -> Result<()> {
    let (router, _) = build_router(standard_sources());
    let strategy = FailoverStrategy {
        id: "s-aggressive".to_string(),
        name: "Aggressive".to_string(),
        alternative_sources: alternatives(),
        max_retries: 10,
        failover_timeout_ms: 120_000,
    };

    let validation = router.validate_failover_strategy(&strategy).await?;
    // Excessive retries and timeout are warnings, not hard failures
    assert!(validation.is_valid);
    assert_eq!(validation.issues.len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_failover_success_rate_is_measured() -> Result<()> {
    let (router, executor) = build_router(alternatives());
    let request = FailoverRequest {
        operation: DataOperation::new(OperationType::Read),
        failed_source_id: "primary".to_string(),
    };

    // One successful failover, then one exhausted
    router.perform_failover(&request, &alternatives()).await?;
    for id in ["alt-a", "alt-b", "alt-c"] {
        executor.set_failing(id, true);
    }
    let _ = router.perform_failover(&request, &alternatives()).await;

    let report = router.get_route_health_report().await?;
    assert!((report.failover_success_rate - 0.5).abs() < 1e-9);
    Ok(())
}
