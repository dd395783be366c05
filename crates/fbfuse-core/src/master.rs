// ── Master controller ──
//
// Owns the product registry, the worker and multicast pools and the sensor
// store. Requests arrive either through `execute` (the command channel
// served by a background processor task) or through the direct async
// methods, which the processor itself calls.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashSet;
use fbfuse_api::{TransportConfig, WorkerConnector};
use indexmap::IndexMap;
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::command::{Command, CommandEnvelope, CommandResult};
use crate::config::MasterConfig;
use crate::error::CoreError;
use crate::metadata::{StaticMetadata, TelescopeMetadata};
use crate::model::{StreamDescriptors, WorkerEndpoint, parse_antenna_csv};
use crate::pool::{PoolError, ResourcePools};
use crate::product::{self, ObservingBand, ProductController, ProductEnv, ProductParams};
use crate::sensor::{SensorReading, SensorStore};

const COMMAND_CHANNEL_SIZE: usize = 64;
const PRODUCTS_SENSOR: &str = "products";

// ── MasterController ─────────────────────────────────────────────────

/// The main entry point for consumers.
///
/// Cheaply cloneable via `Arc<MasterInner>`. Call [`start`](Self::start)
/// before using [`execute`](Self::execute); the direct methods work
/// without the processor task.
#[derive(Clone)]
pub struct MasterController {
    inner: Arc<MasterInner>,
}

struct MasterInner {
    config: Arc<MasterConfig>,
    metadata: Arc<dyn TelescopeMetadata>,
    pools: Arc<ResourcePools>,
    sensors: SensorStore,
    workers: WorkerConnector,
    products: Mutex<IndexMap<String, ProductController>>,
    /// Names removed from the registry whose teardown is still running.
    retiring: DashSet<String>,
    command_tx: mpsc::Sender<CommandEnvelope>,
    command_rx: Mutex<Option<mpsc::Receiver<CommandEnvelope>>>,
    running: watch::Sender<bool>,
    cancel: CancellationToken,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl MasterController {
    /// Create a master with the built-in static metadata service.
    pub fn new(config: MasterConfig) -> Result<Self, CoreError> {
        Self::with_metadata(config, Arc::new(StaticMetadata::default()))
    }

    pub fn with_metadata(
        config: MasterConfig,
        metadata: Arc<dyn TelescopeMetadata>,
    ) -> Result<Self, CoreError> {
        let transport = TransportConfig::with_timeout(config.worker_timeout);
        let workers = WorkerConnector::new(&transport).map_err(|e| CoreError::Config {
            message: format!("cannot build worker HTTP client: {e}"),
        })?;
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_SIZE);
        let (running, _) = watch::channel(false);
        let sensors = SensorStore::new();
        sensors.set(PRODUCTS_SENSOR, "");

        Ok(Self {
            inner: Arc::new(MasterInner {
                pools: Arc::new(ResourcePools::new(config.multicast_range)),
                config: Arc::new(config),
                metadata,
                sensors,
                workers,
                products: Mutex::new(IndexMap::new()),
                retiring: DashSet::new(),
                command_tx,
                command_rx: Mutex::new(Some(command_rx)),
                running,
                cancel: CancellationToken::new(),
                task_handles: Mutex::new(Vec::new()),
            }),
        })
    }

    pub fn config(&self) -> &MasterConfig {
        &self.inner.config
    }

    pub fn sensors(&self) -> &SensorStore {
        &self.inner.sensors
    }

    pub fn is_running(&self) -> bool {
        *self.inner.running.borrow()
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Spawn the command processor. Calling it twice is a no-op.
    pub async fn start(&self) -> Result<(), CoreError> {
        if self.inner.cancel.is_cancelled() {
            return Err(CoreError::ControllerStopped);
        }
        let Some(rx) = self.inner.command_rx.lock().await.take() else {
            return Ok(());
        };
        let handle = tokio::spawn(command_processor_task(self.clone(), rx));
        self.inner.task_handles.lock().await.push(handle);
        self.inner.running.send_replace(true);
        info!(dummy = self.inner.config.dummy, "master controller started");
        Ok(())
    }

    /// Stop accepting commands and deconfigure every product.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();
        self.inner.running.send_replace(false);

        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            let _ = handle.await;
        }
        drop(handles);

        let products: Vec<_> = {
            let mut registry = self.inner.products.lock().await;
            registry.drain(..).map(|(_, p)| p).collect()
        };
        for product in products {
            product.deconfigure().await;
        }
        self.inner.sensors.set(PRODUCTS_SENSOR, "");
        info!("master controller stopped");
    }

    // ── Command execution ────────────────────────────────────────────

    /// Execute a command through the command processor and await the
    /// result.
    pub async fn execute(&self, cmd: Command) -> Result<CommandResult, CoreError> {
        if !self.is_running() {
            return Err(CoreError::ControllerStopped);
        }

        let (tx, rx) = tokio::sync::oneshot::channel();
        self.inner
            .command_tx
            .send(CommandEnvelope {
                command: cmd,
                response_tx: tx,
            })
            .await
            .map_err(|_| CoreError::ControllerStopped)?;

        rx.await.map_err(|_| CoreError::ControllerStopped)?
    }

    // ── Product registry ─────────────────────────────────────────────

    /// Register a new product in IDLE.
    pub async fn configure(
        &self,
        name: &str,
        antennas_csv: &str,
        nchans: u32,
        streams_json: &str,
        proxy: &str,
    ) -> Result<(), CoreError> {
        if name.is_empty() || name.chars().any(char::is_whitespace) {
            return Err(CoreError::invalid(format!("invalid product name '{name}'")));
        }

        let subarray = parse_antenna_csv(antennas_csv)?;
        if subarray.is_empty() {
            return Err(CoreError::InvalidAntennas {
                reason: "no antennas given".into(),
            });
        }
        for (i, antenna) in subarray.iter().enumerate() {
            if subarray[..i].contains(antenna) {
                return Err(CoreError::InvalidAntennas {
                    reason: format!("antenna '{antenna}' listed twice"),
                });
            }
            self.inner.metadata.observer(antenna)?;
        }

        if nchans == 0 || nchans > self.inner.config.max_channels {
            return Err(CoreError::invalid(format!(
                "channel count {nchans} outside 1..={}",
                self.inner.config.max_channels
            )));
        }
        let streams = StreamDescriptors::parse(streams_json)?;

        let metadata = &self.inner.metadata;
        let band = ObservingBand {
            bandwidth_hz: metadata.bandwidth_hz(streams.feng_stream()),
            centre_frequency_hz: metadata.centre_frequency_hz(streams.feng_stream()),
            sideband: metadata.sideband(streams.feng_stream()),
            sync_epoch: metadata.sync_epoch(),
        };

        let mut products = self.inner.products.lock().await;
        if self.inner.cancel.is_cancelled() {
            return Err(CoreError::ControllerStopped);
        }
        if products.contains_key(name) {
            return Err(CoreError::Conflict {
                message: format!("product '{name}' is already configured"),
            });
        }
        if self.inner.retiring.contains(name) {
            return Err(CoreError::Conflict {
                message: format!("product '{name}' is still being deconfigured"),
            });
        }

        let product = ProductController::new(
            ProductParams {
                name: name.to_string(),
                proxy: proxy.to_string(),
                subarray,
                nchans,
                streams,
                band,
            },
            ProductEnv {
                config: Arc::clone(&self.inner.config),
                pools: Arc::clone(&self.inner.pools),
                sensors: self.inner.sensors.clone(),
                workers: self.inner.workers.clone(),
                cancel: self.inner.cancel.child_token(),
            },
        );
        products.insert(name.to_string(), product);
        self.publish_products(&products);
        info!(product = name, antennas = antennas_csv, nchans, "product configured");
        Ok(())
    }

    /// Remove a product, cancelling its in-flight work and releasing
    /// everything it holds.
    pub async fn deconfigure(&self, name: &str) -> Result<(), CoreError> {
        let product = self.detach(name).await?;
        self.teardown(product).await;
        Ok(())
    }

    /// Take a product out of the registry. Its name stays reserved until
    /// [`teardown`](Self::teardown) finishes.
    async fn detach(&self, name: &str) -> Result<ProductController, CoreError> {
        let mut products = self.inner.products.lock().await;
        let product = products
            .shift_remove(name)
            .ok_or_else(|| CoreError::product_not_found(name))?;
        self.inner.retiring.insert(name.to_string());
        self.publish_products(&products);
        Ok(product)
    }

    async fn teardown(&self, product: ProductController) {
        product.deconfigure().await;
        self.inner.retiring.remove(product.name());
    }

    /// Look up a configured product.
    pub async fn product(&self, name: &str) -> Result<ProductController, CoreError> {
        self.inner
            .products
            .lock()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| CoreError::product_not_found(name))
    }

    pub async fn product_names(&self) -> Vec<String> {
        self.inner.products.lock().await.keys().cloned().collect()
    }

    /// Wait until a product finishes provisioning.
    pub async fn wait_until_ready(&self, name: &str, timeout: Duration) -> Result<(), CoreError> {
        self.product(name).await?.wait_until_ready(timeout).await
    }

    fn publish_products(&self, products: &IndexMap<String, ProductController>) {
        let names: Vec<&str> = products.keys().map(String::as_str).collect();
        self.inner.sensors.set(PRODUCTS_SENSOR, names.join(","));
    }

    // ── Worker registry ──────────────────────────────────────────────

    pub async fn register_worker_server(&self, host: &str, port: u16) -> Result<(), CoreError> {
        let endpoint = WorkerEndpoint::new(host, port)?;
        let added = self
            .inner
            .pools
            .workers
            .lock()
            .await
            .register(endpoint.clone());
        if added {
            info!(worker = %endpoint, "worker server registered");
        } else {
            debug!(worker = %endpoint, "worker server already registered");
        }
        Ok(())
    }

    /// Remove an idle worker. Unknown workers are ignored; allocated ones
    /// are refused.
    pub async fn deregister_worker_server(&self, host: &str, port: u16) -> Result<(), CoreError> {
        let endpoint = WorkerEndpoint::new(host, port)?;
        match self.inner.pools.workers.lock().await.deregister(&endpoint) {
            Ok(()) => {
                info!(worker = %endpoint, "worker server deregistered");
                Ok(())
            }
            Err(PoolError::UnknownWorker { .. }) => {
                debug!(worker = %endpoint, "deregister of unknown worker ignored");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Every registered worker with `true` when it is allocated.
    pub async fn worker_server_list(&self) -> Vec<(WorkerEndpoint, bool)> {
        self.inner.pools.workers.lock().await.entries()
    }

    pub async fn available_workers(&self) -> Vec<WorkerEndpoint> {
        self.inner.pools.workers.lock().await.available()
    }

    pub async fn allocated_workers(&self) -> Vec<WorkerEndpoint> {
        self.inner.pools.workers.lock().await.allocated()
    }

    /// Ping every registered worker concurrently.
    pub async fn ping_workers(&self) -> Vec<(WorkerEndpoint, bool)> {
        let workers: Vec<_> = self
            .worker_server_list()
            .await
            .into_iter()
            .map(|(endpoint, _)| endpoint)
            .collect();
        if self.inner.config.dummy {
            return workers.into_iter().map(|w| (w, true)).collect();
        }
        let results = product::ping_all(&self.inner.workers, &workers).await;
        let unhealthy = results.iter().filter(|(_, ok)| !ok).count();
        if unhealthy > 0 {
            warn!(unhealthy, total = results.len(), "some worker servers are unreachable");
        }
        results
    }

    // ── Sensors ──────────────────────────────────────────────────────

    pub fn sensor_value(&self, name: &str) -> Result<SensorReading, CoreError> {
        self.inner
            .sensors
            .get(name)
            .ok_or_else(|| CoreError::NotFound {
                entity_type: "Sensor".into(),
                identifier: name.into(),
            })
    }

    /// Sensors matching `pattern` (exact name, `prefix*`, or empty for all).
    pub fn sensor_list(&self, pattern: &str) -> Result<Vec<SensorReading>, CoreError> {
        let readings = self.inner.sensors.list(pattern);
        if readings.is_empty() {
            return Err(CoreError::NotFound {
                entity_type: "Sensor".into(),
                identifier: pattern.into(),
            });
        }
        Ok(readings)
    }
}

// ── Command processor ────────────────────────────────────────────────

/// Registry changes run inline so configure/deconfigure stay ordered.
/// Anything that waits on the network runs on its own task: product-scoped
/// commands, worker pings and the teardown half of a deconfigure.
async fn command_processor_task(master: MasterController, mut rx: mpsc::Receiver<CommandEnvelope>) {
    let cancel = master.inner.cancel.clone();

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            envelope = rx.recv() => {
                let Some(envelope) = envelope else { break };
                let CommandEnvelope { command, response_tx } = envelope;
                match command {
                    Command::Deconfigure { product } => match master.detach(&product).await {
                        Ok(product) => {
                            let master = master.clone();
                            tokio::spawn(async move {
                                master.teardown(product).await;
                                let _ = response_tx.send(Ok(CommandResult::Ok));
                            });
                        }
                        Err(e) => {
                            let _ = response_tx.send(Err(e));
                        }
                    },
                    command if command.product().is_none()
                        && !matches!(command, Command::PingWorkers) =>
                    {
                        let result = route_command(&master, command).await;
                        let _ = response_tx.send(result);
                    }
                    command => {
                        let master = master.clone();
                        tokio::spawn(async move {
                            let result = route_command(&master, command).await;
                            let _ = response_tx.send(result);
                        });
                    }
                }
            }
        }
    }
    debug!("command processor stopped");
}

// ── Command routing ──────────────────────────────────────────────────

#[allow(clippy::too_many_lines)]
async fn route_command(master: &MasterController, cmd: Command) -> Result<CommandResult, CoreError> {
    match cmd {
        // ── Registry ─────────────────────────────────────────────────
        Command::Configure {
            product,
            antennas,
            nchans,
            streams_json,
            proxy,
        } => {
            master
                .configure(&product, &antennas, nchans, &streams_json, &proxy)
                .await?;
        }
        Command::Deconfigure { product } => master.deconfigure(&product).await?,

        // ── Product lifecycle ────────────────────────────────────────
        Command::ProvisionBeams { product } => master.product(&product).await?.provision_beams().await?,
        Command::ResetBeams { product } => master.product(&product).await?.reset_beams().await?,
        Command::CaptureStart { product } => master.product(&product).await?.capture_start().await?,
        Command::CaptureStop { product } => master.product(&product).await?.capture_stop().await?,

        // ── Beams ────────────────────────────────────────────────────
        Command::ConfigureCoherentBeams {
            product,
            nbeams,
            antennas,
            fscrunch,
            tscrunch,
        } => {
            master
                .product(&product)
                .await?
                .configure_coherent_beams(nbeams, &antennas, fscrunch, tscrunch)
                .await?;
        }
        Command::ConfigureIncoherentBeam {
            product,
            antennas,
            fscrunch,
            tscrunch,
        } => {
            master
                .product(&product)
                .await?
                .configure_incoherent_beam(&antennas, fscrunch, tscrunch)
                .await?;
        }
        Command::AddBeam { product, target } => {
            master.product(&product).await?.add_beam(&target).await?;
        }
        Command::AddTiling {
            product,
            target,
            nbeams,
            reference_frequency,
            overlap,
            epoch,
        } => {
            master
                .product(&product)
                .await?
                .add_tiling(&target, nbeams, reference_frequency, overlap, epoch)
                .await?;
        }

        // ── Configuration authority ──────────────────────────────────
        Command::SetConfigurationAuthority { product, host, port } => {
            master
                .product(&product)
                .await?
                .set_configuration_authority(&host, port)
                .await?;
        }
        Command::SetDefaultSbConfiguration { product, json } => {
            master
                .product(&product)
                .await?
                .set_default_sb_configuration(&json)
                .await?;
        }
        Command::SetDefaultTargetConfiguration { product, json } => {
            master
                .product(&product)
                .await?
                .set_default_target_configuration(&json)
                .await?;
        }
        Command::TargetStart { product, target } => {
            master.product(&product).await?.target_start(&target).await?;
        }
        Command::TargetStop { product } => master.product(&product).await?.target_stop().await?,

        // ── Workers ──────────────────────────────────────────────────
        Command::RegisterWorkerServer { host, port } => {
            master.register_worker_server(&host, port).await?;
        }
        Command::DeregisterWorkerServer { host, port } => {
            master.deregister_worker_server(&host, port).await?;
        }
        Command::WorkerServerList => {
            return Ok(CommandResult::WorkerList(master.worker_server_list().await));
        }
        Command::PingWorkers => {
            return Ok(CommandResult::WorkerHealth(master.ping_workers().await));
        }

        // ── Sensors ──────────────────────────────────────────────────
        Command::SensorValue { name } => {
            return Ok(CommandResult::Sensor(master.sensor_value(&name)?));
        }
        Command::SensorList { pattern } => {
            return Ok(CommandResult::SensorList(master.sensor_list(&pattern)?));
        }
    }
    Ok(CommandResult::Ok)
}
