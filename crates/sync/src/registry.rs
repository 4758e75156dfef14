//! In-flight pass registry
//!
//! At most one pass per connector type. Registration is a check-and-insert
//! under one lock; the returned guard releases the slot when dropped, so a
//! panicking or aborted pass never leaves a stale entry.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use stride_connectors::Connector;
use stride_protocol::ConnectorType;

/// Registry of running passes, keyed by connector type
#[derive(Clone, Default)]
pub struct InFlightRegistry {
    passes: Arc<Mutex<HashMap<ConnectorType, Arc<dyn Connector>>>>,
}

/// Releases a registry slot when dropped
pub struct RegistryGuard {
    registry: InFlightRegistry,
    connector_type: ConnectorType,
}

impl InFlightRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the slot for `connector_type`
    ///
    /// Returns `None` when a pass of that type is already registered.
    pub fn try_register(
        &self,
        connector_type: ConnectorType,
        connector: Arc<dyn Connector>,
    ) -> Option<RegistryGuard> {
        let mut passes = self.passes.lock();
        if passes.contains_key(&connector_type) {
            return None;
        }
        passes.insert(connector_type, connector);
        debug!(connector = %connector_type, "pass registered");

        Some(RegistryGuard {
            registry: self.clone(),
            connector_type,
        })
    }

    /// Check if a pass of this type is registered
    pub fn is_running(&self, connector_type: ConnectorType) -> bool {
        self.passes.lock().contains_key(&connector_type)
    }

    /// Registered connector types, in a stable order
    pub fn running(&self) -> Vec<ConnectorType> {
        let mut types: Vec<_> = self.passes.lock().keys().copied().collect();
        types.sort();
        types
    }

    /// Ask the registered pass of this type to stop
    ///
    /// Returns false when nothing is registered.
    pub fn stop(&self, connector_type: ConnectorType) -> bool {
        // Clone out so the connector runs its stop hook without the lock held
        let connector = self.passes.lock().get(&connector_type).cloned();
        match connector {
            Some(connector) => {
                connector.stop();
                true
            }
            None => false,
        }
    }
}

impl RegistryGuard {
    pub fn connector_type(&self) -> ConnectorType {
        self.connector_type
    }
}

impl Drop for RegistryGuard {
    fn drop(&mut self) {
        self.registry.passes.lock().remove(&self.connector_type);
        debug!(connector = %self.connector_type, "pass released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;
    use stride_connectors::{EventSink, Result, SyncOutcome, SyncRequest};

    #[derive(Default)]
    struct Idle {
        stopped: AtomicBool,
    }

    #[async_trait]
    impl Connector for Idle {
        fn connector_type(&self) -> ConnectorType {
            ConnectorType::File
        }

        async fn sync(&self, _: SyncRequest, _: EventSink) -> Result<SyncOutcome> {
            Ok(SyncOutcome::Completed)
        }

        fn stop(&self) {
            self.stopped.store(true, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_single_slot_per_type() {
        let registry = InFlightRegistry::new();
        let guard = registry
            .try_register(ConnectorType::File, Arc::new(Idle::default()))
            .unwrap();

        assert!(
            registry
                .try_register(ConnectorType::File, Arc::new(Idle::default()))
                .is_none()
        );
        // Other types are independent
        let remote = registry
            .try_register(ConnectorType::Remote, Arc::new(Idle::default()))
            .unwrap();
        assert_eq!(
            registry.running(),
            vec![ConnectorType::Remote, ConnectorType::File]
        );

        drop(guard);
        assert!(!registry.is_running(ConnectorType::File));
        assert!(registry.is_running(ConnectorType::Remote));
        drop(remote);
        assert!(registry.running().is_empty());
    }

    #[test]
    fn test_stop_reaches_connector() {
        let registry = InFlightRegistry::new();
        assert!(!registry.stop(ConnectorType::File));

        let connector = Arc::new(Idle::default());
        let _guard = registry
            .try_register(ConnectorType::File, connector.clone())
            .unwrap();

        assert!(registry.stop(ConnectorType::File));
        assert!(connector.stopped.load(Ordering::SeqCst));
    }
}
