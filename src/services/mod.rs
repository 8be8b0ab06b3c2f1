// src/services/mod.rs

pub mod failover_manager;
pub mod health_reporter;
pub mod load_balancer;
pub mod quality_evaluator;
pub mod router;
pub mod routing_engine;
pub mod statistics_tracker;

use crate::types::{DataOperation, DataSource, ExecutionReceipt};
use crate::utils::error::RouterResult;
use async_trait::async_trait;

/// Source registry the router selects from. Implementations are
/// expected to be cheap to call; the router queries them on every
/// selection and health cycle.
#[async_trait]
pub trait DataSourceProvider: Send + Sync {
    async fn list_sources(&self) -> RouterResult<Vec<DataSource>>;
    async fn get_source(&self, source_id: &str) -> RouterResult<Option<DataSource>>;
}

/// Adapter that runs operations against concrete sources. `probe` is a
/// lightweight liveness check used to clear cooldowns; `warm_up`
/// prepares a source for anticipated traffic and may be a no-op.
#[async_trait]
pub trait OperationExecutor: Send + Sync {
    async fn execute(
        &self,
        source: &DataSource,
        operation: &DataOperation,
    ) -> RouterResult<ExecutionReceipt>;
    async fn warm_up(&self, source: &DataSource) -> RouterResult<()>;
    async fn probe(&self, source: &DataSource) -> RouterResult<()>;
}

pub use failover_manager::{
    FailoverManager, FailoverRequest, FailoverResponse, FailoverResult, FailoverStrategy,
    FailoverValidationResult, FailureTracker, IssueCategory, IssueSeverity, ValidationIssue,
};
pub use health_reporter::{
    DiagnosticsStatus, EstimatedBenefit, HealthIssueKind, HealthReporter,
    ImplementationDifficulty, RecommendationCategory, RouteDiagnostics, RouteHealthIssue,
    RouteHealthReport, RouteRecommendation, SourceHealthSnapshot, SourcePrediction,
};
pub use load_balancer::{LoadBalancer, ScoredCandidate};
pub use quality_evaluator::{
    DataSourceQuality, EvaluationType, QualityEvaluator, QualityHistoryPoint,
};
pub use router::{
    DataRouter, DataRouterConfig, OptimizationScope, RouteOptimizationResult, RoutingAdjustment,
};
pub use routing_engine::{
    ExpectedPerformance, PreselectedSource, RoutingEngine, SelectedDataSource, SelectionReason,
    WarmupStatus,
};
pub use statistics_tracker::{
    FailoverEvent, PerformanceMetrics, RequestRecord, RouteStatistics, StatisticsTracker,
};
