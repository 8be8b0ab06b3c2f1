//! route_edge - Intelligent Data Source Router
//!
//! Routes data operations to the best available source by blending
//! measured performance, reliability, intrinsic data quality and cost.
//! Failed sources enter a cooldown cleared only by a passing health
//! probe, failover walks ranked alternatives, and routing outcomes feed
//! a learning loop that tunes the evaluator at runtime.
//!
//! Callers implement [`DataSourceProvider`] for source discovery and
//! [`OperationExecutor`] for execution, probing and warm-up, then drive
//! everything through [`DataRouter`].

// Module declarations
pub mod services;
pub mod types;
pub mod utils;

pub use services::{
    DataRouter, DataRouterConfig, DataSourceProvider, DataSourceQuality, EvaluationType,
    FailoverRequest, FailoverResponse, FailoverResult, FailoverStrategy,
    FailoverValidationResult, OperationExecutor, OptimizationScope, PreselectedSource,
    RecommendationCategory, RouteDiagnostics, RouteHealthReport, RouteOptimizationResult,
    RouteRecommendation, RouteStatistics, SelectedDataSource, SelectionReason, WarmupStatus,
};
pub use types::{
    DataOperation, DataSource, DataSourceType, ExecutionReceipt, OperationParameter,
    OperationPriority, OperationType, PerformanceRequirements, ReliabilityRequirements,
    RequestContext, SelectionCriteria, SourceHealth, StatisticsPeriod,
};
pub use utils::{RouterError, RouterResult};
