//! Registry of live connections.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::connection::{Connection, ConnectionId};
use crate::error::RealtimeError;

/// Default maximum number of concurrent connections.
pub const DEFAULT_MAX_CONNECTIONS: usize = 10_000;

/// Set of live connections, keyed by id.
///
/// A registered connection is assumed deliverable; an absent one is never
/// delivered to.
#[derive(Debug)]
pub struct ConnectionRegistry {
    connections: RwLock<HashMap<ConnectionId, Arc<Connection>>>,
    max_connections: usize,
}

impl ConnectionRegistry {
    /// Create an empty registry with the default capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_CONNECTIONS)
    }

    /// Create an empty registry holding at most `max_connections`.
    pub fn with_capacity(max_connections: usize) -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            max_connections,
        }
    }

    /// Register a connection and mark it alive.
    ///
    /// Returns `false` if it was already registered.
    pub fn add(&self, connection: Arc<Connection>) -> Result<bool, RealtimeError> {
        let mut connections = self.connections.write();
        if connections.contains_key(&connection.id) {
            connection.mark_alive();
            return Ok(false);
        }
        if connections.len() >= self.max_connections {
            return Err(RealtimeError::ConnectionLimit(self.max_connections));
        }

        connection.mark_alive();
        debug!(client_id = %connection.id, "Connection registered");
        connections.insert(connection.id.clone(), connection);
        Ok(true)
    }

    /// Unregister a connection. No-op if absent.
    pub fn remove(&self, id: &str) -> Option<Arc<Connection>> {
        let removed = self.connections.write().remove(id);
        if removed.is_some() {
            debug!(client_id = %id, "Connection unregistered");
        }
        removed
    }

    /// Apply `f` to every connection registered at call time.
    ///
    /// The set is copied before iterating, so `f` may add or remove
    /// connections freely.
    pub fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(&Arc<Connection>),
    {
        for connection in self.snapshot() {
            f(&connection);
        }
    }

    /// Copy of the registered connections.
    pub fn snapshot(&self) -> Vec<Arc<Connection>> {
        self.connections.read().values().cloned().collect()
    }

    /// Mark a connection alive. Returns whether it was found.
    pub fn mark_alive(&self, id: &str) -> bool {
        match self.connections.read().get(id) {
            Some(connection) => {
                connection.mark_alive();
                true
            }
            None => false,
        }
    }

    /// Mark a probe outstanding. Returns whether it was found.
    pub fn mark_dead(&self, id: &str) -> bool {
        match self.connections.read().get(id) {
            Some(connection) => {
                connection.mark_dead();
                true
            }
            None => false,
        }
    }

    /// Get a connection by id.
    pub fn get(&self, id: &str) -> Option<Arc<Connection>> {
        self.connections.read().get(id).cloned()
    }

    /// Whether a connection is registered.
    pub fn contains(&self, id: &str) -> bool {
        self.connections.read().contains_key(id)
    }

    /// Number of registered connections.
    pub fn len(&self) -> usize {
        self.connections.read().len()
    }

    /// Whether no connection is registered.
    pub fn is_empty(&self) -> bool {
        self.connections.read().is_empty()
    }

    /// Capacity limit.
    pub fn max_connections(&self) -> usize {
        self.max_connections
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::create_connection_with_id;

    #[test]
    fn test_add_is_idempotent() {
        let registry = ConnectionRegistry::new();
        let (conn, _rx) = create_connection_with_id("c1".into(), None);

        assert!(registry.add(conn.clone()).unwrap());
        assert!(!registry.add(conn).unwrap());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_add_marks_alive() {
        let registry = ConnectionRegistry::new();
        let (conn, _rx) = create_connection_with_id("c1".into(), None);
        conn.mark_dead();

        registry.add(conn.clone()).unwrap();
        assert!(conn.is_alive());
    }

    #[test]
    fn test_remove_twice() {
        let registry = ConnectionRegistry::new();
        let (conn, _rx) = create_connection_with_id("c1".into(), None);
        registry.add(conn).unwrap();

        assert!(registry.remove("c1").is_some());
        assert!(registry.remove("c1").is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_capacity_limit() {
        let registry = ConnectionRegistry::with_capacity(1);
        let (a, _ra) = create_connection_with_id("a".into(), None);
        let (b, _rb) = create_connection_with_id("b".into(), None);

        registry.add(a.clone()).unwrap();
        assert!(matches!(
            registry.add(b),
            Err(RealtimeError::ConnectionLimit(1))
        ));
        // Re-adding a registered connection does not count against the limit.
        assert!(!registry.add(a).unwrap());
    }

    #[test]
    fn test_mark_alive_and_dead() {
        let registry = ConnectionRegistry::new();
        let (conn, _rx) = create_connection_with_id("c1".into(), None);
        registry.add(conn.clone()).unwrap();

        assert!(registry.mark_dead("c1"));
        assert!(!conn.is_alive());
        assert!(registry.mark_alive("c1"));
        assert!(conn.is_alive());

        assert!(!registry.mark_alive("missing"));
        assert!(!registry.mark_dead("missing"));
    }

    #[test]
    fn test_for_each_tolerates_mutation() {
        let registry = ConnectionRegistry::new();
        let mut receivers = Vec::new();
        for i in 0..5 {
            let (conn, rx) = create_connection_with_id(format!("c{i}"), None);
            registry.add(conn).unwrap();
            receivers.push(rx);
        }

        let mut visited = 0;
        registry.for_each(|conn| {
            visited += 1;
            registry.remove(&conn.id);
            let (extra, _rx) = create_connection_with_id(format!("{}-new", conn.id), None);
            registry.add(extra).unwrap();
        });

        assert_eq!(visited, 5);
        assert_eq!(registry.len(), 5);
        assert!(registry.snapshot().iter().all(|c| c.id.ends_with("-new")));
    }

    #[test]
    fn test_concurrent_add_remove() {
        let registry = Arc::new(ConnectionRegistry::new());
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    let mut keep = Vec::new();
                    for i in 0..100 {
                        let (conn, rx) = create_connection_with_id(format!("t{t}-{i}"), None);
                        registry.add(conn).unwrap();
                        if i % 2 == 0 {
                            registry.remove(&format!("t{t}-{i}"));
                        } else {
                            keep.push(rx);
                        }
                        registry.for_each(|_| {});
                    }
                    keep
                })
            })
            .collect();

        let mut kept = 0;
        for handle in handles {
            kept += handle.join().unwrap().len();
        }
        assert_eq!(registry.len(), kept);
        assert_eq!(kept, 200);
    }
}
