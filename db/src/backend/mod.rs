//! Client-library abstraction.
//!
//! The wire protocol belongs to the database's client library. This module
//! defines the calls the data-access layer issues against it: opening pooled
//! and single connections, executing scripts, and subscribing to change
//! streams. Implementations must be thread-safe (Send + Sync); a pooled
//! connection is expected to fan a batch out across its capacity internally.

use std::error::Error;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::types::DataForm;

/// Error type returned by client-library calls.
pub type BackendError = Box<dyn Error + Send + Sync>;

/// Outcome of one [`ScriptTask`].
#[derive(Debug, Clone, PartialEq)]
pub enum TaskState {
    Pending,
    Succeeded(DataForm),
    Failed(String),
}

/// A single script bound to one execution attempt.
///
/// Tasks are shared between the caller and the pool executing them, so the
/// outcome lives behind a lock. The caller correlates results through `ref_id`.
#[derive(Debug)]
pub struct ScriptTask {
    ref_id: String,
    script: String,
    state: Mutex<TaskState>,
}

impl ScriptTask {
    pub fn new(ref_id: impl Into<String>, script: impl Into<String>) -> Self {
        Self {
            ref_id: ref_id.into(),
            script: script.into(),
            state: Mutex::new(TaskState::Pending),
        }
    }

    pub fn ref_id(&self) -> &str {
        &self.ref_id
    }

    pub fn script(&self) -> &str {
        &self.script
    }

    pub fn state(&self) -> TaskState {
        self.lock().clone()
    }

    pub fn is_success(&self) -> bool {
        matches!(*self.lock(), TaskState::Succeeded(_))
    }

    /// The result, if the task succeeded.
    pub fn result(&self) -> Option<DataForm> {
        match &*self.lock() {
            TaskState::Succeeded(df) => Some(df.clone()),
            _ => None,
        }
    }

    /// The error message, if the task failed.
    pub fn error(&self) -> Option<String> {
        match &*self.lock() {
            TaskState::Failed(msg) => Some(msg.clone()),
            _ => None,
        }
    }

    pub fn succeed(&self, result: DataForm) {
        *self.lock() = TaskState::Succeeded(result);
    }

    pub fn fail(&self, message: impl Into<String>) {
        *self.lock() = TaskState::Failed(message.into());
    }

    pub(crate) fn reset(&self) {
        *self.lock() = TaskState::Pending;
    }

    fn lock(&self) -> MutexGuard<'_, TaskState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Anything the connection cache owns and must close on eviction.
pub trait Closeable: Send + Sync {
    fn close(&self) -> Result<(), BackendError>;
}

/// A connection pool able to run a batch of scripts concurrently.
pub trait PooledConnection: Closeable {
    /// Execute every task, recording each task's outcome on the task itself.
    ///
    /// An `Err` means the batch as a whole could not run (connection-level
    /// failure); individual script failures are reported through the tasks.
    fn execute(&self, tasks: &[Arc<ScriptTask>]) -> Result<(), BackendError>;
}

/// A single lightweight connection for serial scripts.
pub trait SingleConnection: Closeable {
    fn run_script(&self, script: &str) -> Result<DataForm, BackendError>;
}

/// Factory for connections. Connecting performs network I/O.
pub trait Connector: Send + Sync {
    fn connect_pool(
        &self,
        address: &str,
        username: &str,
        password: &str,
        pool_size: usize,
    ) -> Result<Arc<dyn PooledConnection>, BackendError>;

    fn connect_single(
        &self,
        address: &str,
        username: &str,
        password: &str,
    ) -> Result<Arc<dyn SingleConnection>, BackendError>;
}

/// Parameters identifying one stream subscription.
///
/// The same request must be passed to unsubscribe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscribeRequest {
    pub address: String,
    pub table_name: String,
    pub action_name: String,
    /// Start position in the stream; -1 means "from now".
    pub offset: i64,
    pub reconnect: bool,
}

/// One row pushed by the server.
pub trait StreamMessage {
    /// Value of the named column in this row.
    fn value_by_name(&self, name: &str) -> Option<&DataForm>;
}

/// Receives pushed rows. Called from the client library's own threads.
pub trait MessageHandler: Send + Sync {
    fn do_event(&self, message: &dyn StreamMessage);
}

/// Server-side change-stream subscriptions.
pub trait StreamClient: Send + Sync {
    fn subscribe(
        &self,
        request: &SubscribeRequest,
        handler: Arc<dyn MessageHandler>,
    ) -> Result<(), BackendError>;

    fn unsubscribe(&self, request: &SubscribeRequest) -> Result<(), BackendError>;
}

#[cfg(any(test, feature = "test-utils"))]
pub mod mem;
