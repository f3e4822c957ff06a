//! Script execution with discard-and-recreate retries.
//!
//! Any failure is assumed to have poisoned the connection: the connection is
//! closed, its cache entry removed, and the whole batch or script is run again
//! on a freshly acquired one. Tasks are never retried individually.

use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::backend::{Closeable, ScriptTask};
use crate::cache::ConnectionRegistry;
use crate::config::ConnectionConfig;
use crate::error::DatasourceError;
use crate::types::DataForm;

/// Bounded retry budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: usize,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 3 }
    }
}

/// Runs scripts against cached connections.
pub struct RetryingExecutor {
    registry: Arc<ConnectionRegistry>,
    policy: RetryPolicy,
}

impl RetryingExecutor {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self::with_policy(registry, RetryPolicy::default())
    }

    pub fn with_policy(registry: Arc<ConnectionRegistry>, policy: RetryPolicy) -> Self {
        Self { registry, policy }
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Run every task as one batch on a pooled connection.
    ///
    /// Succeeds only when the batch ran and every task reports success. On
    /// exhaustion the last error is returned and the tasks keep the outcomes
    /// of the final attempt.
    pub fn run_batch(
        &self,
        tasks: &[Arc<ScriptTask>],
        identity: &str,
        config: &ConnectionConfig,
    ) -> Result<(), DatasourceError> {
        let attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            for task in tasks {
                task.reset();
            }

            let pool = match self.registry.acquire_pooled(identity, config) {
                Ok(pool) => pool,
                Err(e) if !e.is_retryable() => return Err(e),
                Err(e) => {
                    if self.give_up("run batch", identity, attempt, attempts, &e) {
                        return Err(e);
                    }
                    continue;
                }
            };

            let outcome = pool
                .execute(tasks)
                .map_err(DatasourceError::connection)
                .and_then(|()| first_task_failure(tasks));

            let e = match outcome {
                Ok(()) => {
                    debug!(identity, attempt, tasks = tasks.len(), "batch succeeded");
                    return Ok(());
                }
                Err(e) => e,
            };

            close_quietly(identity, pool.as_ref());
            self.registry.pools().invalidate_if_same(identity, &pool);

            if self.give_up("run batch", identity, attempt, attempts, &e) {
                return Err(e);
            }
        }
    }

    /// Run one script on the single-connection path.
    pub fn run_script(
        &self,
        script: &str,
        identity: &str,
        config: &ConnectionConfig,
    ) -> Result<DataForm, DatasourceError> {
        let attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;

            let conn = match self.registry.acquire_single(identity, config) {
                Ok(conn) => conn,
                Err(e) if !e.is_retryable() => return Err(e),
                Err(e) => {
                    if self.give_up("run script", identity, attempt, attempts, &e) {
                        return Err(e);
                    }
                    continue;
                }
            };

            let e = match conn.run_script(script) {
                Ok(result) => return Ok(result),
                Err(e) => DatasourceError::execution(e),
            };

            close_quietly(identity, conn.as_ref());
            self.registry.singles().invalidate_if_same(identity, &conn);

            if self.give_up("run script", identity, attempt, attempts, &e) {
                return Err(e);
            }
        }
    }

    fn give_up(
        &self,
        operation: &str,
        identity: &str,
        attempt: usize,
        attempts: usize,
        e: &DatasourceError,
    ) -> bool {
        if attempt >= attempts {
            error!(identity, attempts, error = %e, "failed to {} after {} attempts", operation, attempts);
            true
        } else {
            warn!(identity, attempt, error = %e, "{} failed, retrying with a new connection", operation);
            false
        }
    }
}

fn first_task_failure(tasks: &[Arc<ScriptTask>]) -> Result<(), DatasourceError> {
    match tasks.iter().find(|t| !t.is_success()) {
        None => Ok(()),
        Some(task) => {
            let message = task
                .error()
                .unwrap_or_else(|| format!("task {} did not complete", task.ref_id()));
            Err(DatasourceError::execution(message))
        }
    }
}

pub(crate) fn close_quietly<C: Closeable + ?Sized>(identity: &str, conn: &C) {
    if let Err(e) = conn.close() {
        warn!(identity, error = %e, "failed to close connection");
    }
}
