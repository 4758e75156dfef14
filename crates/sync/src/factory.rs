//! Building connectors from stored connection parameters

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use stride_connectors::{Connector, FileSystemConnector, RemoteConnector, ResilienceConfig};
use stride_protocol::{ConnectorInfo, ConnectorType};
use stride_store::ConnectorInfoStore;

use crate::error::{Result, SyncError};

/// Creates a fresh connector for each pass
#[async_trait]
pub trait ConnectorFactory: Send + Sync {
    /// Build a connector for `connector_type` from its current parameters
    async fn create(&self, connector_type: ConnectorType) -> Result<Arc<dyn Connector>>;

    /// Store new parameters (linking, renewed credentials)
    async fn save_info(&self, info: ConnectorInfo) -> Result<()>;
}

/// Factory backed by a `ConnectorInfoStore`
pub struct DefaultConnectorFactory {
    infos: Arc<dyn ConnectorInfoStore>,
    resilience: ResilienceConfig,
}

impl DefaultConnectorFactory {
    pub fn new(infos: Arc<dyn ConnectorInfoStore>, resilience: ResilienceConfig) -> Self {
        Self { infos, resilience }
    }

    /// Parameter store this factory reads from
    pub fn infos(&self) -> &Arc<dyn ConnectorInfoStore> {
        &self.infos
    }
}

#[async_trait]
impl ConnectorFactory for DefaultConnectorFactory {
    async fn create(&self, connector_type: ConnectorType) -> Result<Arc<dyn Connector>> {
        let info = self
            .infos
            .get(connector_type)
            .await?
            .ok_or(SyncError::NotConfigured(connector_type))?;

        debug!(connector = %connector_type, "building connector");
        let connector: Arc<dyn Connector> = match info {
            ConnectorInfo::Remote(remote) => {
                Arc::new(RemoteConnector::new(remote, self.resilience.clone())?)
            }
            ConnectorInfo::FileSystem(fs) => Arc::new(FileSystemConnector::new(fs)),
        };
        Ok(connector)
    }

    async fn save_info(&self, info: ConnectorInfo) -> Result<()> {
        self.infos.save(info).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stride_protocol::{FileSystemConnectorInfo, RemoteConnectorInfo};
    use stride_store::MemoryConnectorInfoStore;

    fn factory(infos: Vec<ConnectorInfo>) -> DefaultConnectorFactory {
        DefaultConnectorFactory::new(
            Arc::new(MemoryConnectorInfoStore::with_infos(infos)),
            ResilienceConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_create_by_type() {
        let factory = factory(vec![
            ConnectorInfo::FileSystem(FileSystemConnectorInfo::new("/data")),
            ConnectorInfo::Remote(RemoteConnectorInfo::default()),
        ]);

        let file = factory.create(ConnectorType::File).await.unwrap();
        assert_eq!(file.connector_type(), ConnectorType::File);
        let remote = factory.create(ConnectorType::Remote).await.unwrap();
        assert_eq!(remote.connector_type(), ConnectorType::Remote);
    }

    #[tokio::test]
    async fn test_unknown_type_is_not_configured() {
        let factory = factory(Vec::new());
        let err = factory.create(ConnectorType::Remote).await.err().unwrap();
        assert!(matches!(err, SyncError::NotConfigured(ConnectorType::Remote)));
    }

    #[tokio::test]
    async fn test_saved_info_used_by_next_create() {
        let factory = factory(Vec::new());
        factory
            .save_info(ConnectorInfo::FileSystem(FileSystemConnectorInfo::new("/x")))
            .await
            .unwrap();

        assert!(factory.create(ConnectorType::File).await.is_ok());
        assert!(factory.infos().get(ConnectorType::File).await.unwrap().is_some());
    }
}
