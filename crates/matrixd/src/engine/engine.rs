use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use tokio::sync::Mutex;
use tokio::sync::mpsc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;
use tracing::info;

use super::controller::RoutingController;
use super::device::DeviceIdentity;
use super::device::DeviceInfo;
use super::entity;
use super::entity::EntityDescriptor;
use super::message::ConfigSnapshot;
use super::message::EngineMessage;
use super::message::EngineReceiver;
use super::message::EngineSender;
use super::naming::NamingRegistry;
use super::store::MatrixStateStore;
use crate::client::MatrixClient;
use crate::config::ConfigStore;
use crate::config::MatrixConfig;

/// Controller and registry built from the same configuration snapshot
struct Components {
    controller: Arc<RoutingController>,
    naming: Arc<NamingRegistry>,
}

/// matrixd engine
///
/// Owns the state store and the controller/registry pair for the current
/// configuration. Reconfiguration arrives as a message and replaces the pair
/// in one atomic store, so readers see either the old names or the new ones.
pub struct Engine {
    identity: DeviceIdentity,
    client: Arc<dyn MatrixClient>,
    store: Arc<MatrixStateStore>,
    config_store: Arc<dyn ConfigStore>,

    /// Current controller/registry pair (readers load the Arc, reconfigure stores a new one)
    components: ArcSwap<Components>,

    message_tx: EngineSender,
    message_rx: Mutex<EngineReceiver>,

    /// Publishes the configuration version after each reload
    version_tx: watch::Sender<u64>,
}

impl Engine {
    /// Create a new Engine instance
    pub fn new(
        matrix: MatrixConfig,
        client: Arc<dyn MatrixClient>,
        config_store: Arc<dyn ConfigStore>,
    ) -> Self {
        let identity = DeviceIdentity::from_config(&matrix);
        let store = Arc::new(MatrixStateStore::new(client.clone()));
        let (message_tx, message_rx) = mpsc::unbounded_channel();
        let snapshot = Arc::new(ConfigSnapshot::new(matrix));
        let (version_tx, _) = watch::channel(snapshot.version);

        let components = Self::build(&store, &client, &config_store, &message_tx, snapshot);

        Self {
            identity,
            client,
            store,
            config_store,
            components: ArcSwap::from_pointee(components),
            message_tx,
            message_rx: Mutex::new(message_rx),
            version_tx,
        }
    }

    fn build(
        store: &Arc<MatrixStateStore>,
        client: &Arc<dyn MatrixClient>,
        config_store: &Arc<dyn ConfigStore>,
        message_tx: &EngineSender,
        snapshot: Arc<ConfigSnapshot>,
    ) -> Components {
        Components {
            controller: Arc::new(RoutingController::new(
                snapshot.clone(),
                store.clone(),
                client.clone(),
            )),
            naming: Arc::new(NamingRegistry::new(
                snapshot,
                config_store.clone(),
                message_tx.clone(),
            )),
        }
    }

    pub fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }

    pub fn store(&self) -> &Arc<MatrixStateStore> {
        &self.store
    }

    pub fn controller(&self) -> Arc<RoutingController> {
        self.components.load().controller.clone()
    }

    pub fn naming(&self) -> Arc<NamingRegistry> {
        self.components.load().naming.clone()
    }

    pub fn snapshot(&self) -> Arc<ConfigSnapshot> {
        self.controller().snapshot().clone()
    }

    pub fn device_info(&self) -> DeviceInfo {
        DeviceInfo::new(&self.identity, &self.store.current())
    }

    pub fn entities(&self) -> Vec<EntityDescriptor> {
        entity::describe(&self.identity, &self.snapshot())
    }

    /// Sender for messages to the engine
    pub fn sender(&self) -> EngineSender {
        self.message_tx.clone()
    }

    /// Watch the configuration version; changes after every reload
    pub fn watch_version(&self) -> watch::Receiver<u64> {
        self.version_tx.subscribe()
    }

    /// Start periodic polling at the configured interval
    pub fn spawn_poller(&self) -> JoinHandle<()> {
        let interval = Duration::from_secs(self.snapshot().matrix.poll_interval_secs.max(1));
        info!("Polling matrix every {:?}", interval);
        self.store.spawn_poller(interval)
    }

    /// Run the engine's event loop until a `Shutdown` message arrives
    pub async fn run(&self) {
        info!("Engine starting");

        let mut rx = self.message_rx.lock().await;
        while let Some(msg) = rx.recv().await {
            match msg {
                EngineMessage::Reconfigure(snapshot) => self.reconfigure(snapshot),
                EngineMessage::Shutdown => break,
            }
        }

        info!("Engine shutting down");
    }

    fn reconfigure(&self, snapshot: Arc<ConfigSnapshot>) {
        let current = self.snapshot().version;
        if snapshot.version <= current {
            debug!(
                "Ignoring configuration version {} (current is {})",
                snapshot.version, current
            );
            return;
        }

        let version = snapshot.version;
        let components = Self::build(
            &self.store,
            &self.client,
            &self.config_store,
            &self.message_tx,
            snapshot,
        );
        self.components.store(Arc::new(components));

        info!("Reloaded configuration version {}", version);
        self.version_tx.send_replace(version);
    }
}
