// src/types.rs
// Shared value model for the data source router.

use serde::{Deserialize, Serialize};

/// Backend kinds a data operation can be routed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSourceType {
    LocalCache,
    Database,
    RemoteApi,
    MessageQueue,
    FileSystem,
}

impl DataSourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataSourceType::LocalCache => "local_cache",
            DataSourceType::Database => "database",
            DataSourceType::RemoteApi => "remote_api",
            DataSourceType::MessageQueue => "message_queue",
            DataSourceType::FileSystem => "file_system",
        }
    }

    /// Static data-quality heuristic per backend kind
    pub fn data_quality_score(&self) -> f64 {
        match self {
            DataSourceType::Database => 0.95,
            DataSourceType::LocalCache => 0.90,
            DataSourceType::MessageQueue => 0.80,
            DataSourceType::RemoteApi => 0.75,
            DataSourceType::FileSystem => 0.70,
        }
    }

    /// Inverse of access cost per backend kind
    pub fn cost_score(&self) -> f64 {
        match self {
            DataSourceType::LocalCache => 1.00,
            DataSourceType::FileSystem => 0.85,
            DataSourceType::Database => 0.70,
            DataSourceType::MessageQueue => 0.60,
            DataSourceType::RemoteApi => 0.40,
        }
    }

    /// Baseline response time used until measured samples exist
    pub fn base_response_time_ms(&self) -> u64 {
        match self {
            DataSourceType::LocalCache => 5,
            DataSourceType::FileSystem => 30,
            DataSourceType::Database => 50,
            DataSourceType::MessageQueue => 100,
            DataSourceType::RemoteApi => 200,
        }
    }

    /// Whether the backend offers strong read-your-writes consistency
    pub fn supports_strong_consistency(&self) -> bool {
        matches!(self, DataSourceType::Database | DataSourceType::LocalCache)
    }
}

/// Health of a source as reported by the external registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SourceHealth {
    Healthy,
    Warning,
    Unhealthy,
    #[default]
    Unknown,
}

impl SourceHealth {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceHealth::Healthy => "healthy",
            SourceHealth::Warning => "warning",
            SourceHealth::Unhealthy => "unhealthy",
            SourceHealth::Unknown => "unknown",
        }
    }
}

/// Immutable snapshot of a candidate backend, owned by the external
/// registry. The router only reads it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSource {
    pub id: String,
    pub name: String,
    pub source_type: DataSourceType,
    pub current_load: u32,
    pub max_capacity: u32,
    pub health: SourceHealth,
}

impl DataSource {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        source_type: DataSourceType,
        current_load: u32,
        max_capacity: u32,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            source_type,
            current_load,
            max_capacity,
            health: SourceHealth::Healthy,
        }
    }

    pub fn with_health(mut self, health: SourceHealth) -> Self {
        self.health = health;
        self
    }

    /// Current load as a fraction of capacity, clamped to [0, 1]
    pub fn load_ratio(&self) -> f64 {
        if self.max_capacity == 0 {
            return 1.0;
        }
        (self.current_load as f64 / self.max_capacity as f64).clamp(0.0, 1.0)
    }
}

/// Logical operation kinds the router dispatches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationType {
    Read,
    Write,
    Search,
    Stream,
    Batch,
}

impl OperationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationType::Read => "read",
            OperationType::Write => "write",
            OperationType::Search => "search",
            OperationType::Stream => "stream",
            OperationType::Batch => "batch",
        }
    }

    /// Source kinds able to serve this operation
    pub fn compatible_source_types(&self) -> &'static [DataSourceType] {
        match self {
            OperationType::Read | OperationType::Search => &[
                DataSourceType::LocalCache,
                DataSourceType::Database,
                DataSourceType::RemoteApi,
            ],
            OperationType::Write => &[DataSourceType::Database, DataSourceType::RemoteApi],
            OperationType::Stream => &[DataSourceType::RemoteApi, DataSourceType::MessageQueue],
            // Batch runs everywhere except the queue
            OperationType::Batch => &[
                DataSourceType::LocalCache,
                DataSourceType::Database,
                DataSourceType::RemoteApi,
                DataSourceType::FileSystem,
            ],
        }
    }

    pub fn is_compatible_with(&self, source_type: DataSourceType) -> bool {
        self.compatible_source_types().contains(&source_type)
    }

    /// Relative failure risk used by diagnostics predictions
    pub fn difficulty_factor(&self) -> f64 {
        match self {
            OperationType::Read => 0.02,
            OperationType::Write => 0.05,
            OperationType::Search => 0.08,
            OperationType::Stream => 0.10,
            OperationType::Batch => 0.12,
        }
    }
}

/// Request priority levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OperationPriority {
    Low,
    #[default]
    Normal,
    High,
    Urgent,
}

/// Typed operation parameter. Replaces an untyped string map with a
/// closed key set so unknown keys cannot slip through.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationParameter {
    Key(String),
    Collection(String),
    Query(String),
    Topic(String),
    Path(String),
    Limit(u32),
    TtlSeconds(u64),
    ConsistencyToken(String),
}

/// A single logical data operation submitted for routing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataOperation {
    pub id: String,
    pub operation_type: OperationType,
    pub priority: OperationPriority,
    pub expected_data_size_bytes: u64,
    pub parameters: Vec<OperationParameter>,
}

impl DataOperation {
    pub fn new(operation_type: OperationType) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            operation_type,
            priority: OperationPriority::Normal,
            expected_data_size_bytes: 0,
            parameters: Vec::new(),
        }
    }

    pub fn with_priority(mut self, priority: OperationPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_expected_size(mut self, size_bytes: u64) -> Self {
        self.expected_data_size_bytes = size_bytes;
        self
    }

    pub fn with_parameter(mut self, parameter: OperationParameter) -> Self {
        self.parameters.push(parameter);
        self
    }
}

/// Performance requirements attached to a selection call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceRequirements {
    pub max_response_time_ms: u64,
    pub min_throughput_rps: Option<f64>,
    pub expected_concurrency: Option<u32>,
}

/// Reliability requirements attached to a selection call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReliabilityRequirements {
    /// Required availability in [0, 1]
    pub min_availability: f64,
    /// Tolerated error rate in [0, 1]
    pub max_error_rate: f64,
    pub require_consistency: bool,
}

/// Optional selection constraints; absent fields mean "no requirement"
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SelectionCriteria {
    pub performance: Option<PerformanceRequirements>,
    pub reliability: Option<ReliabilityRequirements>,
}

/// Per-call context carrying identity and an optional deadline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestContext {
    pub request_id: String,
    /// Absolute deadline, epoch milliseconds
    pub deadline_ms: Option<u64>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            deadline_ms: None,
        }
    }

    pub fn with_deadline_ms(mut self, deadline_ms: u64) -> Self {
        self.deadline_ms = Some(deadline_ms);
        self
    }

    pub fn is_expired(&self, now_ms: u64) -> bool {
        matches!(self.deadline_ms, Some(deadline) if now_ms >= deadline)
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Receipt returned by the execution adapter after running an operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionReceipt {
    pub source_id: String,
    pub response_time_ms: u64,
    pub payload_size_bytes: u64,
}

/// Statistics window selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StatisticsPeriod {
    #[default]
    LastHour,
    LastDay,
    LastWeek,
    LastMonth,
}

impl StatisticsPeriod {
    pub fn duration_ms(&self) -> u64 {
        const HOUR_MS: u64 = 60 * 60 * 1000;
        match self {
            StatisticsPeriod::LastHour => HOUR_MS,
            StatisticsPeriod::LastDay => 24 * HOUR_MS,
            StatisticsPeriod::LastWeek => 7 * 24 * HOUR_MS,
            StatisticsPeriod::LastMonth => 30 * 24 * HOUR_MS,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StatisticsPeriod::LastHour => "last_hour",
            StatisticsPeriod::LastDay => "last_day",
            StatisticsPeriod::LastWeek => "last_week",
            StatisticsPeriod::LastMonth => "last_month",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_ratio_bounds() {
        let source = DataSource::new("db", "Primary DB", DataSourceType::Database, 50, 100);
        assert!((source.load_ratio() - 0.5).abs() < f64::EPSILON);

        let overloaded = DataSource::new("db", "Primary DB", DataSourceType::Database, 150, 100);
        assert_eq!(overloaded.load_ratio(), 1.0);

        let zero_capacity = DataSource::new("db", "Primary DB", DataSourceType::Database, 0, 0);
        assert_eq!(zero_capacity.load_ratio(), 1.0);
    }

    #[test]
    fn test_operation_compatibility() {
        assert!(OperationType::Read.is_compatible_with(DataSourceType::LocalCache));
        assert!(OperationType::Read.is_compatible_with(DataSourceType::Database));
        assert!(!OperationType::Read.is_compatible_with(DataSourceType::MessageQueue));

        assert!(OperationType::Write.is_compatible_with(DataSourceType::Database));
        assert!(!OperationType::Write.is_compatible_with(DataSourceType::LocalCache));

        assert!(OperationType::Stream.is_compatible_with(DataSourceType::MessageQueue));
        assert!(!OperationType::Stream.is_compatible_with(DataSourceType::FileSystem));

        // Batch excludes the queue but accepts the filesystem
        assert!(!OperationType::Batch.is_compatible_with(DataSourceType::MessageQueue));
        assert!(OperationType::Batch.is_compatible_with(DataSourceType::FileSystem));
    }

    #[test]
    fn test_type_heuristic_tables_are_normalized() {
        let types = [
            DataSourceType::LocalCache,
            DataSourceType::Database,
            DataSourceType::RemoteApi,
            DataSourceType::MessageQueue,
            DataSourceType::FileSystem,
        ];
        for t in types {
            assert!((0.0..=1.0).contains(&t.data_quality_score()));
            assert!((0.0..=1.0).contains(&t.cost_score()));
            assert!(t.base_response_time_ms() > 0);
        }
        // Database carries the strongest data-quality heuristic
        assert!(
            DataSourceType::Database.data_quality_score()
                > DataSourceType::LocalCache.data_quality_score()
        );
    }

    #[test]
    fn test_request_context_deadline() {
        let ctx = RequestContext::new().with_deadline_ms(1_000);
        assert!(!ctx.is_expired(999));
        assert!(ctx.is_expired(1_000));
        assert!(ctx.is_expired(2_000));

        let no_deadline = RequestContext::new();
        assert!(!no_deadline.is_expired(u64::MAX));
    }

    #[test]
    fn test_statistics_period_durations() {
        assert_eq!(StatisticsPeriod::LastHour.duration_ms(), 3_600_000);
        assert!(StatisticsPeriod::LastDay.duration_ms() > StatisticsPeriod::LastHour.duration_ms());
        assert!(
            StatisticsPeriod::LastMonth.duration_ms() > StatisticsPeriod::LastWeek.duration_ms()
        );
    }
}
