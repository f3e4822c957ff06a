//! Connection caches keyed by datasource identity.
//!
//! A cache maps an identity to a live connection and the config it was opened
//! with. The lock guards only the map: lookups, inserts and removals happen
//! under it, while connecting and closing happen after it is released, so a
//! slow server never stalls requests for other datasources.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, warn};

use crate::backend::{Closeable, Connector, PooledConnection, SingleConnection};
use crate::config::ConnectionConfig;
use crate::error::DatasourceError;

struct CacheEntry<C: ?Sized> {
    connection: Arc<C>,
    config: ConnectionConfig,
}

/// Registry of connections of one kind.
pub struct ConnectionCache<C: ?Sized + Closeable> {
    kind: &'static str,
    entries: Mutex<HashMap<String, CacheEntry<C>>>,
}

impl<C: ?Sized + Closeable> ConnectionCache<C> {
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Return the connection cached for `identity` if its config equals
    /// `config`; otherwise open one with `open` and cache it.
    ///
    /// A cached connection with a different config is removed and closed
    /// before the replacement is opened. Errors from `open` are returned and
    /// nothing is cached.
    pub fn acquire<F>(
        &self,
        identity: &str,
        config: &ConnectionConfig,
        open: F,
    ) -> Result<Arc<C>, DatasourceError>
    where
        F: FnOnce(&ConnectionConfig) -> Result<Arc<C>, DatasourceError>,
    {
        let stale = {
            let mut entries = self.lock();
            match entries.get(identity) {
                Some(entry) if entry.config == *config => {
                    info!(kind = self.kind, identity, "reused connection");
                    return Ok(Arc::clone(&entry.connection));
                }
                Some(_) => entries.remove(identity),
                None => None,
            }
        };

        if let Some(stale) = stale {
            info!(kind = self.kind, identity, "config changed, recycling connection");
            self.close_quietly(identity, &stale.connection);
        }

        info!(kind = self.kind, identity, address = %config.url, "opening connection");
        let connection = open(config)?;

        let mut entries = self.lock();
        if let Some(existing) = entries.get(identity) {
            if existing.config == *config {
                // Another caller won the race with the same config; keep theirs.
                let winner = Arc::clone(&existing.connection);
                drop(entries);
                debug!(kind = self.kind, identity, "discarding duplicate connection");
                self.close_quietly(identity, &connection);
                return Ok(winner);
            }
        }
        let replaced = entries.insert(
            identity.to_string(),
            CacheEntry {
                connection: Arc::clone(&connection),
                config: config.clone(),
            },
        );
        drop(entries);

        if let Some(replaced) = replaced {
            self.close_quietly(identity, &replaced.connection);
        }
        Ok(connection)
    }

    /// Remove the entry for `identity` without closing it.
    ///
    /// Returns the removed connection so a caller that does not already hold
    /// a reference can close it.
    pub fn invalidate(&self, identity: &str) -> Option<Arc<C>> {
        let removed = self.lock().remove(identity).map(|entry| entry.connection);
        if removed.is_some() {
            debug!(kind = self.kind, identity, "invalidated connection");
        }
        removed
    }

    /// Remove the entry for `identity` only if it still holds `connection`.
    ///
    /// Used after a failed attempt so a fresh connection cached concurrently
    /// by another caller is not thrown away.
    pub fn invalidate_if_same(&self, identity: &str, connection: &Arc<C>) -> bool {
        let mut entries = self.lock();
        let same = entries
            .get(identity)
            .is_some_and(|entry| Arc::ptr_eq(&entry.connection, connection));
        if same {
            entries.remove(identity);
            debug!(kind = self.kind, identity, "invalidated connection");
        }
        same
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.lock().contains_key(identity)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Close and drop every cached connection.
    pub fn clear(&self) {
        let drained: Vec<_> = self.lock().drain().collect();
        for (identity, entry) in drained {
            self.close_quietly(&identity, &entry.connection);
        }
    }

    fn close_quietly(&self, identity: &str, connection: &Arc<C>) {
        if let Err(e) = connection.close() {
            warn!(kind = self.kind, identity, error = %e, "failed to close connection");
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, CacheEntry<C>>> {
        // The map is never left half-updated, so a poisoned lock is still usable.
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// The two process-wide connection registries plus the connector that fills
/// them. Created once at service start and shared by every request.
pub struct ConnectionRegistry {
    connector: Arc<dyn Connector>,
    pools: ConnectionCache<dyn PooledConnection>,
    singles: ConnectionCache<dyn SingleConnection>,
}

impl ConnectionRegistry {
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self {
            connector,
            pools: ConnectionCache::new("pool"),
            singles: ConnectionCache::new("single"),
        }
    }

    /// Pooled connection for concurrent batch execution.
    ///
    /// The pool capacity is parsed only when a new pool has to be opened; a
    /// malformed capacity is a configuration error.
    pub fn acquire_pooled(
        &self,
        identity: &str,
        config: &ConnectionConfig,
    ) -> Result<Arc<dyn PooledConnection>, DatasourceError> {
        self.pools.acquire(identity, config, |config| {
            let pool_size = config.pool_size()?;
            debug!(identity, pool_size, "connecting connection pool");
            self.connector
                .connect_pool(&config.url, &config.username, &config.password, pool_size)
                .map_err(DatasourceError::connection)
        })
    }

    /// Single lightweight connection for serial scripts.
    pub fn acquire_single(
        &self,
        identity: &str,
        config: &ConnectionConfig,
    ) -> Result<Arc<dyn SingleConnection>, DatasourceError> {
        self.singles.acquire(identity, config, |config| {
            self.connector
                .connect_single(&config.url, &config.username, &config.password)
                .map_err(DatasourceError::connection)
        })
    }

    /// Drop the pooled entry for `identity` without closing it.
    pub fn invalidate_pooled(&self, identity: &str) -> Option<Arc<dyn PooledConnection>> {
        self.pools.invalidate(identity)
    }

    /// Drop the single-connection entry for `identity` without closing it.
    pub fn invalidate_single(&self, identity: &str) -> Option<Arc<dyn SingleConnection>> {
        self.singles.invalidate(identity)
    }

    pub fn pools(&self) -> &ConnectionCache<dyn PooledConnection> {
        &self.pools
    }

    pub fn singles(&self) -> &ConnectionCache<dyn SingleConnection> {
        &self.singles
    }

    /// Close everything, e.g. on service shutdown.
    pub fn close_all(&self) {
        self.pools.clear();
        self.singles.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mem::MemConnector;
    use crate::config::ConfigError;
    use rstest::{fixture, rstest};

    struct Fixture {
        connector: MemConnector,
        registry: ConnectionRegistry,
    }

    #[fixture]
    fn fx() -> Fixture {
        let connector = MemConnector::new();
        let registry = ConnectionRegistry::new(Arc::new(connector.clone()));
        Fixture { connector, registry }
    }

    fn config(capacity: &str) -> ConnectionConfig {
        ConnectionConfig::new("host:1", "a", "b", capacity)
    }

    #[rstest]
    fn test_same_config_reuses_pool(fx: Fixture) {
        let first = fx.registry.acquire_pooled("ds1", &config("5")).unwrap();
        let second = fx.registry.acquire_pooled("ds1", &config("5")).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(fx.connector.pools_created(), 1);
        assert_eq!(fx.connector.pool_sizes(), vec![5]);
        assert_eq!(fx.connector.closed_pools(), 0);
    }

    #[rstest]
    fn test_changed_config_recycles_pool(fx: Fixture) {
        let first = fx.registry.acquire_pooled("ds1", &config("5")).unwrap();
        let again = fx.registry.acquire_pooled("ds1", &config("5")).unwrap();
        assert!(Arc::ptr_eq(&first, &again));

        let second = fx.registry.acquire_pooled("ds1", &config("6")).unwrap();

        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(fx.connector.pools_created(), 2);
        assert_eq!(fx.connector.pool_sizes(), vec![5, 6]);
        assert_eq!(fx.connector.closed_pools(), 1);
        assert_eq!(fx.registry.pools().len(), 1);
    }

    #[rstest]
    fn test_changed_url_reconnects_to_new_host(fx: Fixture) {
        fx.registry.acquire_pooled("ds1", &config("2")).unwrap();
        let moved = ConnectionConfig::new("host:2", "a", "b", "2");
        fx.registry.acquire_pooled("ds1", &moved).unwrap();

        assert_eq!(fx.connector.pool_addresses(), vec!["host:1", "host:2"]);
        assert_eq!(fx.connector.closed_pools(), 1);
    }

    #[rstest]
    fn test_identities_are_independent(fx: Fixture) {
        let a = fx.registry.acquire_pooled("ds1", &config("2")).unwrap();
        let b = fx.registry.acquire_pooled("ds2", &config("2")).unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(fx.registry.pools().len(), 2);
    }

    #[rstest]
    fn test_pool_and_single_caches_are_separate(fx: Fixture) {
        fx.registry.acquire_pooled("ds1", &config("2")).unwrap();
        fx.registry.acquire_single("ds1", &config("2")).unwrap();

        assert!(fx.registry.pools().contains("ds1"));
        assert!(fx.registry.singles().contains("ds1"));
        assert_eq!(fx.connector.pools_created(), 1);
        assert_eq!(fx.connector.singles_created(), 1);
    }

    #[rstest]
    fn test_invalid_capacity_is_config_error(fx: Fixture) {
        let err = fx.registry.acquire_pooled("ds1", &config("lots")).err().unwrap();
        assert!(matches!(
            err,
            DatasourceError::Config(ConfigError::InvalidPoolCapacity { .. })
        ));
        assert_eq!(fx.connector.pools_created(), 0);
        assert!(!fx.registry.pools().contains("ds1"));
    }

    #[rstest]
    fn test_single_ignores_capacity(fx: Fixture) {
        assert!(fx.registry.acquire_single("ds1", &config("lots")).is_ok());
    }

    #[rstest]
    fn test_connect_failure_caches_nothing(fx: Fixture) {
        fx.connector.fail_next_connects(1);
        let err = fx.registry.acquire_pooled("ds1", &config("1")).err().unwrap();
        assert!(matches!(err, DatasourceError::Connection { .. }));
        assert!(fx.registry.pools().is_empty());

        assert!(fx.registry.acquire_pooled("ds1", &config("1")).is_ok());
    }

    #[rstest]
    fn test_invalidate_does_not_close(fx: Fixture) {
        let pool = fx.registry.acquire_pooled("ds1", &config("1")).unwrap();
        let removed = fx.registry.invalidate_pooled("ds1").unwrap();

        assert!(Arc::ptr_eq(&pool, &removed));
        assert_eq!(fx.connector.closed_pools(), 0);
        assert!(fx.registry.invalidate_pooled("ds1").is_none());

        let fresh = fx.registry.acquire_pooled("ds1", &config("1")).unwrap();
        assert!(!Arc::ptr_eq(&pool, &fresh));
    }

    #[rstest]
    fn test_invalidate_if_same_spares_newer_connection(fx: Fixture) {
        let old = fx.registry.acquire_pooled("ds1", &config("1")).unwrap();
        fx.registry.invalidate_pooled("ds1");
        let _new = fx.registry.acquire_pooled("ds1", &config("1")).unwrap();

        assert!(!fx.registry.pools().invalidate_if_same("ds1", &old));
        assert!(fx.registry.pools().contains("ds1"));
    }

    #[rstest]
    fn test_close_all(fx: Fixture) {
        fx.registry.acquire_pooled("ds1", &config("1")).unwrap();
        fx.registry.acquire_single("ds1", &config("1")).unwrap();
        fx.registry.close_all();

        assert!(fx.registry.pools().is_empty());
        assert!(fx.registry.singles().is_empty());
        assert_eq!(fx.connector.closed_pools(), 1);
        assert_eq!(fx.connector.closed_singles(), 1);
    }

    #[rstest]
    fn test_concurrent_acquire_settles_on_one_pool(fx: Fixture) {
        let registry = &fx.registry;
        let pools: Vec<_> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| scope.spawn(|| registry.acquire_pooled("ds1", &config("3")).unwrap()))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let cached = fx.registry.acquire_pooled("ds1", &config("3")).unwrap();
        assert!(pools.iter().all(|p| Arc::ptr_eq(p, &cached)));
        // Losers of a connect race are closed, never leaked.
        assert_eq!(
            fx.connector.pools_created() - fx.connector.closed_pools(),
            1
        );
    }
}
