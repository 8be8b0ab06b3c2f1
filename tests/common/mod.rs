// tests/common/mod.rs
//
// Shared in-memory provider and executor for integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use route_edge::{
    DataOperation, DataSource, DataSourceProvider, DataSourceType, ExecutionReceipt,
    OperationExecutor, RouterError, RouterResult,
};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

/// Fixed source registry
pub struct MockProvider {
    sources: Arc<Mutex<Vec<DataSource>>>,
}

impl MockProvider {
    pub fn new(sources: Vec<DataSource>) -> Self {
        Self {
            sources: Arc::new(Mutex::new(sources)),
        }
    }
}

#[async_trait]
impl DataSourceProvider for MockProvider {
    async fn list_sources(&self) -> RouterResult<Vec<DataSource>> {
        Ok(self.sources.lock().unwrap().clone())
    }

    async fn get_source(&self, source_id: &str) -> RouterResult<Option<DataSource>> {
        Ok(self
            .sources
            .lock()
            .unwrap()
            .iter()
            .find(|s| s.id == source_id)
            .cloned())
    }
}

/// Executor that fails for sources in a configurable set and records
/// every execution and warm-up it sees.
#[derive(Clone)]
pub struct MockExecutor {
    failing: Arc<Mutex<HashSet<String>>>,
    pub executions: Arc<Mutex<Vec<String>>>,
    pub warmups: Arc<Mutex<Vec<String>>>,
}

impl MockExecutor {
    pub fn new() -> Self {
        Self {
            failing: Arc::new(Mutex::new(HashSet::new())),
            executions: Arc::new(Mutex::new(Vec::new())),
            warmups: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn set_failing(&self, source_id: &str, failing: bool) {
        let mut set = self.failing.lock().unwrap();
        if failing {
            set.insert(source_id.to_string());
        } else {
            set.remove(source_id);
        }
    }

    fn is_failing(&self, source_id: &str) -> bool {
        self.failing.lock().unwrap().contains(source_id)
    }
}

#[async_trait]
impl OperationExecutor for MockExecutor {
    async fn execute(
        &self,
        source: &DataSource,
        _operation: &DataOperation,
    ) -> RouterResult<ExecutionReceipt> {
        self.executions.lock().unwrap().push(source.id.clone());
        if self.is_failing(&source.id) {
            return Err(RouterError::execution_error(format!(
                "simulated failure on {}",
                source.id
            )));
        }
        Ok(ExecutionReceipt {
            source_id: source.id.clone(),
            response_time_ms: source.source_type.base_response_time_ms(),
            payload_size_bytes: 256,
        })
    }

    async fn warm_up(&self, source: &DataSource) -> RouterResult<()> {
        self.warmups.lock().unwrap().push(source.id.clone());
        Ok(())
    }

    async fn probe(&self, source: &DataSource) -> RouterResult<()> {
        if self.is_failing(&source.id) {
            return Err(RouterError::execution_error(format!(
                "probe failed on {}",
                source.id
            )));
        }
        Ok(())
    }
}

/// Three-source field used across the tests: a lightly loaded cache, a
/// moderately loaded database and a remote API near capacity.
pub fn standard_sources() -> Vec<DataSource> {
    vec![
        DataSource::new("cache-1", "Local Cache", DataSourceType::LocalCache, 10, 100),
        DataSource::new("db-1", "Primary Database", DataSourceType::Database, 20, 100),
        DataSource::new("api-1", "Remote API", DataSourceType::RemoteApi, 95, 100),
    ]
}
