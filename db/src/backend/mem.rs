//! Scripted in-memory client library for tests.
//!
//! Scripts resolve against a fixed table of responses. Connect, batch and
//! script failures can be injected a given number of times, and every
//! connection that is opened or closed is recorded for assertions.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::{
    BackendError, Closeable, Connector, MessageHandler, PooledConnection, ScriptTask,
    SingleConnection, StreamClient, StreamMessage, SubscribeRequest,
};
use crate::types::DataForm;

#[derive(Default)]
struct MemState {
    scripts: HashMap<String, Result<DataForm, String>>,
    fail_connects: usize,
    fail_executes: usize,
    fail_scripts: usize,
    pools: Vec<ConnectionRecord>,
    singles: Vec<ConnectionRecord>,
    executions: usize,
    script_runs: usize,
}

impl MemState {
    fn take_failure(counter: &mut usize) -> bool {
        if *counter > 0 {
            *counter -= 1;
            true
        } else {
            false
        }
    }

    fn resolve(&mut self, script: &str) -> Result<DataForm, String> {
        if Self::take_failure(&mut self.fail_scripts) {
            return Err(format!("injected failure running '{}'", script));
        }
        self.scripts
            .get(script)
            .cloned()
            .unwrap_or_else(|| Err(format!("unknown script '{}'", script)))
    }
}

struct ConnectionRecord {
    address: String,
    pool_size: usize,
    closed: Arc<AtomicBool>,
}

type SharedState = Arc<Mutex<MemState>>;

fn lock(state: &SharedState) -> MutexGuard<'_, MemState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// In-memory [`Connector`].
#[derive(Clone, Default)]
pub struct MemConnector {
    state: SharedState,
}

impl MemConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the result of a script.
    pub fn with_script(self, script: &str, result: DataForm) -> Self {
        lock(&self.state).scripts.insert(script.to_string(), Ok(result));
        self
    }

    /// Register a script that always reports failure.
    pub fn with_script_error(self, script: &str, message: &str) -> Self {
        lock(&self.state)
            .scripts
            .insert(script.to_string(), Err(message.to_string()));
        self
    }

    /// The next `n` connect attempts (pooled or single) fail.
    pub fn fail_next_connects(&self, n: usize) {
        lock(&self.state).fail_connects = n;
    }

    /// The next `n` batch executions fail at the connection level.
    pub fn fail_next_executes(&self, n: usize) {
        lock(&self.state).fail_executes = n;
    }

    /// The next `n` scripts (batch tasks or serial runs) report failure.
    pub fn fail_next_scripts(&self, n: usize) {
        lock(&self.state).fail_scripts = n;
    }

    pub fn pools_created(&self) -> usize {
        lock(&self.state).pools.len()
    }

    pub fn singles_created(&self) -> usize {
        lock(&self.state).singles.len()
    }

    pub fn pool_sizes(&self) -> Vec<usize> {
        lock(&self.state).pools.iter().map(|p| p.pool_size).collect()
    }

    pub fn pool_addresses(&self) -> Vec<String> {
        lock(&self.state).pools.iter().map(|p| p.address.clone()).collect()
    }

    pub fn closed_pools(&self) -> usize {
        count_closed(&lock(&self.state).pools)
    }

    pub fn closed_singles(&self) -> usize {
        count_closed(&lock(&self.state).singles)
    }

    /// Batch executions that reached a live pool.
    pub fn executions(&self) -> usize {
        lock(&self.state).executions
    }

    /// Serial scripts that reached a live connection.
    pub fn script_runs(&self) -> usize {
        lock(&self.state).script_runs
    }

    fn connect(&self, address: &str, pool_size: usize, pooled: bool) -> Result<Arc<AtomicBool>, BackendError> {
        let mut state = lock(&self.state);
        if MemState::take_failure(&mut state.fail_connects) {
            return Err(format!("connection to {} refused", address).into());
        }
        let closed = Arc::new(AtomicBool::new(false));
        let record = ConnectionRecord {
            address: address.to_string(),
            pool_size,
            closed: Arc::clone(&closed),
        };
        if pooled {
            state.pools.push(record);
        } else {
            state.singles.push(record);
        }
        Ok(closed)
    }
}

fn count_closed(records: &[ConnectionRecord]) -> usize {
    records
        .iter()
        .filter(|r| r.closed.load(Ordering::SeqCst))
        .count()
}

impl Connector for MemConnector {
    fn connect_pool(
        &self,
        address: &str,
        _username: &str,
        _password: &str,
        pool_size: usize,
    ) -> Result<Arc<dyn PooledConnection>, BackendError> {
        let closed = self.connect(address, pool_size, true)?;
        Ok(Arc::new(MemPool {
            state: Arc::clone(&self.state),
            pool_size,
            closed,
        }))
    }

    fn connect_single(
        &self,
        address: &str,
        _username: &str,
        _password: &str,
    ) -> Result<Arc<dyn SingleConnection>, BackendError> {
        let closed = self.connect(address, 1, false)?;
        Ok(Arc::new(MemSingle {
            state: Arc::clone(&self.state),
            closed,
        }))
    }
}

struct MemPool {
    state: SharedState,
    pool_size: usize,
    closed: Arc<AtomicBool>,
}

impl Closeable for MemPool {
    fn close(&self) -> Result<(), BackendError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Err("pool already closed".into());
        }
        Ok(())
    }
}

impl PooledConnection for MemPool {
    fn execute(&self, tasks: &[Arc<ScriptTask>]) -> Result<(), BackendError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err("pool is closed".into());
        }
        {
            let mut state = lock(&self.state);
            if MemState::take_failure(&mut state.fail_executes) {
                return Err("connection reset by peer".into());
            }
            state.executions += 1;
        }

        if tasks.is_empty() {
            return Ok(());
        }
        let chunk_size = tasks.len().div_ceil(self.pool_size.max(1));
        std::thread::scope(|scope| {
            for chunk in tasks.chunks(chunk_size) {
                let state = &self.state;
                scope.spawn(move || {
                    for task in chunk {
                        let outcome = lock(state).resolve(task.script());
                        match outcome {
                            Ok(result) => task.succeed(result),
                            Err(message) => task.fail(message),
                        }
                    }
                });
            }
        });
        Ok(())
    }
}

struct MemSingle {
    state: SharedState,
    closed: Arc<AtomicBool>,
}

impl Closeable for MemSingle {
    fn close(&self) -> Result<(), BackendError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Err("connection already closed".into());
        }
        Ok(())
    }
}

impl SingleConnection for MemSingle {
    fn run_script(&self, script: &str) -> Result<DataForm, BackendError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err("connection is closed".into());
        }
        let mut state = lock(&self.state);
        state.script_runs += 1;
        state.resolve(script).map_err(Into::into)
    }
}

/// One pushed row: column name to scalar dataform.
#[derive(Debug, Clone, Default)]
pub struct MemRow {
    values: HashMap<String, DataForm>,
}

impl MemRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: DataForm) -> Self {
        self.values.insert(name.to_string(), value);
        self
    }
}

impl StreamMessage for MemRow {
    fn value_by_name(&self, name: &str) -> Option<&DataForm> {
        self.values.get(name)
    }
}

#[derive(Default)]
struct StreamState {
    subscriptions: Vec<(SubscribeRequest, Arc<dyn MessageHandler>)>,
    unsubscribed: Vec<SubscribeRequest>,
    fail_subscribe: bool,
}

/// In-memory [`StreamClient`]. Rows are delivered synchronously by [`push`](Self::push).
#[derive(Default)]
pub struct MemStreamClient {
    state: Mutex<StreamState>,
}

impl MemStreamClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_subscribe(&self, fail: bool) {
        self.lock().fail_subscribe = fail;
    }

    /// Deliver a row to every live subscription on `table`.
    pub fn push(&self, table: &str, row: &MemRow) -> usize {
        let handlers: Vec<_> = self
            .lock()
            .subscriptions
            .iter()
            .filter(|(req, _)| req.table_name == table)
            .map(|(_, handler)| Arc::clone(handler))
            .collect();
        for handler in &handlers {
            handler.do_event(row);
        }
        handlers.len()
    }

    pub fn active(&self) -> Vec<SubscribeRequest> {
        self.lock().subscriptions.iter().map(|(req, _)| req.clone()).collect()
    }

    pub fn unsubscribed(&self) -> Vec<SubscribeRequest> {
        self.lock().unsubscribed.clone()
    }

    fn lock(&self) -> MutexGuard<'_, StreamState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl StreamClient for MemStreamClient {
    fn subscribe(
        &self,
        request: &SubscribeRequest,
        handler: Arc<dyn MessageHandler>,
    ) -> Result<(), BackendError> {
        let mut state = self.lock();
        if state.fail_subscribe {
            return Err(format!("cannot subscribe to {}", request.table_name).into());
        }
        let duplicate = state.subscriptions.iter().any(|(req, _)| {
            req.action_name == request.action_name && req.table_name == request.table_name
        });
        if duplicate {
            return Err(format!("action {} already subscribed", request.action_name).into());
        }
        state.subscriptions.push((request.clone(), handler));
        Ok(())
    }

    fn unsubscribe(&self, request: &SubscribeRequest) -> Result<(), BackendError> {
        let mut state = self.lock();
        let before = state.subscriptions.len();
        state.subscriptions.retain(|(req, _)| req != request);
        if state.subscriptions.len() == before {
            return Err(format!("no subscription for action {}", request.action_name).into());
        }
        state.unsubscribed.push(request.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DataType, Scalar};

    fn one() -> DataForm {
        DataForm::Scalar(Scalar::new(DataType::Int, 1))
    }

    #[test]
    fn test_pool_runs_scripts() {
        let connector = MemConnector::new().with_script("1", one());
        let pool = connector.connect_pool("h:1", "a", "b", 2).unwrap();
        let tasks: Vec<_> = (0..5).map(|i| Arc::new(ScriptTask::new(i.to_string(), "1"))).collect();

        pool.execute(&tasks).unwrap();

        assert!(tasks.iter().all(|t| t.is_success()));
        assert_eq!(connector.executions(), 1);
        assert_eq!(connector.pool_sizes(), vec![2]);
    }

    #[test]
    fn test_unknown_script_fails_task() {
        let connector = MemConnector::new();
        let pool = connector.connect_pool("h:1", "a", "b", 1).unwrap();
        let task = Arc::new(ScriptTask::new("A", "nope"));
        pool.execute(&[Arc::clone(&task)]).unwrap();
        assert!(task.error().unwrap().contains("unknown script"));
    }

    #[test]
    fn test_injected_failures_are_consumed() {
        let connector = MemConnector::new().with_script("1", one());
        connector.fail_next_connects(1);
        assert!(connector.connect_single("h:1", "a", "b").is_err());
        let single = connector.connect_single("h:1", "a", "b").unwrap();

        connector.fail_next_scripts(1);
        assert!(single.run_script("1").is_err());
        assert_eq!(single.run_script("1").unwrap(), one());
        assert_eq!(connector.script_runs(), 2);
    }

    #[test]
    fn test_closed_connection_rejects_work() {
        let connector = MemConnector::new().with_script("1", one());
        let single = connector.connect_single("h:1", "a", "b").unwrap();
        single.close().unwrap();
        assert!(single.run_script("1").is_err());
        assert!(single.close().is_err());
        assert_eq!(connector.closed_singles(), 1);
    }

    #[test]
    fn test_stream_push_and_unsubscribe() {
        struct Count(Mutex<usize>);
        impl MessageHandler for Count {
            fn do_event(&self, _message: &dyn StreamMessage) {
                *self.0.lock().unwrap() += 1;
            }
        }

        let client = MemStreamClient::new();
        let handler = Arc::new(Count(Mutex::new(0)));
        let request = SubscribeRequest {
            address: "h:1".to_string(),
            table_name: "trades".to_string(),
            action_name: "action1".to_string(),
            offset: -1,
            reconnect: true,
        };
        client.subscribe(&request, handler.clone()).unwrap();
        assert!(client.subscribe(&request, handler.clone()).is_err());

        assert_eq!(client.push("trades", &MemRow::new()), 1);
        assert_eq!(client.push("quotes", &MemRow::new()), 0);
        assert_eq!(*handler.0.lock().unwrap(), 1);

        client.unsubscribe(&request).unwrap();
        assert!(client.unsubscribe(&request).is_err());
        assert_eq!(client.unsubscribed(), vec![request]);
        assert!(client.active().is_empty());
    }
}
