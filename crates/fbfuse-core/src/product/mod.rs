// ── Product controller ──
//
// One state machine per configured product. All mutable state lives in
// `ProductCore` behind a single async mutex; long-running work
// (provisioning, worker start/stop, the live target subscription) runs on
// spawned tasks that re-take the lock to publish their outcome and bail
// out once the product's cancellation token fires.

mod pointing;
mod provision;
mod state;
mod targets;
mod workers;

use std::sync::Arc;
use std::time::Duration;

use fbfuse_api::{AuthorityClient, SubarrayConfig, TransportConfig, WorkerConnector};
use tokio::sync::{Mutex, MutexGuard, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::beam::{BeamValidator, CoherentBeamConfig, IncoherentBeamConfig};
use crate::config::MasterConfig;
use crate::error::CoreError;
use crate::model::{Antenna, StreamDescriptors, Target, WorkerEndpoint, format_antenna_csv};
use crate::pool::{AddressBlock, ResourcePools};
use crate::sensor::{SensorStatus, SensorStore};

use pointing::PointingTable;
pub use state::ProductState;
pub(crate) use workers::ping_all;
use workers::{BeamLayout, WorkerCall};

pub(crate) const AUTHORITY: &str = "configuration authority";

// ── Construction inputs ──────────────────────────────────────────────

/// Observing band reported by the metadata service at configure time.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservingBand {
    pub bandwidth_hz: f64,
    pub centre_frequency_hz: f64,
    pub sideband: String,
    pub sync_epoch: f64,
}

/// What `configure` fixed for the lifetime of the product.
pub(crate) struct ProductParams {
    pub name: String,
    pub proxy: String,
    pub subarray: Vec<Antenna>,
    pub nchans: u32,
    pub streams: StreamDescriptors,
    pub band: ObservingBand,
}

/// Shared services handed down by the master.
pub(crate) struct ProductEnv {
    pub config: Arc<MasterConfig>,
    pub pools: Arc<ResourcePools>,
    pub sensors: SensorStore,
    pub workers: WorkerConnector,
    pub cancel: CancellationToken,
}

// ── ProductController ────────────────────────────────────────────────

/// Handle to one product. Cheap to clone.
#[derive(Clone)]
pub struct ProductController {
    inner: Arc<ProductInner>,
}

struct ProductInner {
    params: ProductParams,
    env: ProductEnv,
    core: Mutex<ProductCore>,
    state_tx: watch::Sender<ProductState>,
    pointings: PointingTable,
}

struct AuthorityHandle {
    address: String,
    client: Arc<AuthorityClient>,
}

struct Subscription {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

struct ProductCore {
    state: ProductState,
    coherent: Option<CoherentBeamConfig>,
    incoherent: Option<IncoherentBeamConfig>,
    coherent_block: Option<AddressBlock>,
    incoherent_block: Option<AddressBlock>,
    workers: Vec<WorkerEndpoint>,
    authority: Option<AuthorityHandle>,
    /// Last schedule-block configuration fetched from the authority.
    authority_sb: Option<SubarrayConfig>,
    default_sb: Option<SubarrayConfig>,
    default_target: Option<Vec<Target>>,
    /// Beam layout changed since the workers were last prepared.
    needs_prepare: bool,
    tasks: Vec<JoinHandle<()>>,
    subscription: Option<Subscription>,
    tilings: u32,
}

impl ProductController {
    pub(crate) fn new(params: ProductParams, env: ProductEnv) -> Self {
        let (state_tx, _) = watch::channel(ProductState::Idle);
        let controller = Self {
            inner: Arc::new(ProductInner {
                params,
                env,
                core: Mutex::new(ProductCore {
                    state: ProductState::Idle,
                    coherent: None,
                    incoherent: None,
                    coherent_block: None,
                    incoherent_block: None,
                    workers: Vec::new(),
                    authority: None,
                    authority_sb: None,
                    default_sb: None,
                    default_target: None,
                    needs_prepare: false,
                    tasks: Vec::new(),
                    subscription: None,
                    tilings: 0,
                }),
                state_tx,
                pointings: PointingTable::new(),
            }),
        };
        controller.publish_static();
        controller
    }

    pub fn name(&self) -> &str {
        &self.inner.params.name
    }

    pub fn proxy(&self) -> &str {
        &self.inner.params.proxy
    }

    pub fn subarray(&self) -> &[Antenna] {
        &self.inner.params.subarray
    }

    pub fn state(&self) -> ProductState {
        *self.inner.state_tx.borrow()
    }

    pub fn is_ready(&self) -> bool {
        self.state() == ProductState::Ready
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ProductState> {
        self.inner.state_tx.subscribe()
    }

    /// Current pointing of every coherent beam slot.
    pub fn pointings(&self) -> Vec<Option<Target>> {
        self.inner.pointings.snapshot().as_ref().clone()
    }

    pub async fn workers(&self) -> Vec<WorkerEndpoint> {
        self.inner.core.lock().await.workers.clone()
    }

    /// Wait until provisioning settles. `Ready` (or a later capture state)
    /// is success; anything else is reported as an invalid state.
    pub async fn wait_until_ready(&self, timeout: Duration) -> Result<(), CoreError> {
        let mut rx = self.subscribe_state();
        let settled =
            tokio::time::timeout(timeout, rx.wait_for(|s| !s.is_transitional())).await;
        let state = match settled {
            Err(_) => {
                return Err(CoreError::Timeout {
                    service: format!("provisioning of '{}'", self.name()),
                    timeout_secs: timeout.as_secs(),
                });
            }
            Ok(Err(_)) => {
                return Err(CoreError::Cancelled {
                    operation: "provisioning".into(),
                });
            }
            Ok(Ok(state)) => *state,
        };
        match state {
            ProductState::Ready | ProductState::Capturing => Ok(()),
            other => Err(CoreError::InvalidState {
                product: self.name().to_string(),
                operation: "wait for ready".into(),
                state: other.to_string(),
            }),
        }
    }

    // ── Beam configuration ───────────────────────────────────────────

    pub async fn configure_coherent_beams(
        &self,
        nbeams: u32,
        antennas_csv: &str,
        fscrunch: u32,
        tscrunch: u32,
    ) -> Result<(), CoreError> {
        let mut core = self.lock().await?;
        core.state.require(
            &[ProductState::Idle, ProductState::Ready],
            self.name(),
            "configure-coherent-beams",
        )?;

        let granularity = core.coherent.as_ref().map_or(
            self.inner.env.config.beam_defaults.coherent_granularity,
            CoherentBeamConfig::granularity,
        );
        let config =
            self.validator()
                .coherent(nbeams, antennas_csv, fscrunch, tscrunch, granularity)?;

        if core.state == ProductState::Ready {
            let old: Vec<_> = core.coherent_block.into_iter().collect();
            let mut fresh = self.replace_blocks(&old, &[config.ngroups()]).await?;
            core.coherent_block = fresh.pop();
            core.needs_prepare = true;
        }
        info!(product = %self.name(), nbeams, "coherent beams configured");
        self.set_coherent(&mut core, Some(config));
        Ok(())
    }

    pub async fn configure_incoherent_beam(
        &self,
        antennas_csv: &str,
        fscrunch: u32,
        tscrunch: u32,
    ) -> Result<(), CoreError> {
        let mut core = self.lock().await?;
        core.state.require(
            &[ProductState::Idle, ProductState::Ready],
            self.name(),
            "configure-incoherent-beam",
        )?;

        let config = self
            .validator()
            .incoherent(antennas_csv, fscrunch, tscrunch)?;

        if core.state == ProductState::Ready {
            if core.incoherent_block.is_none() {
                core.incoherent_block = Some(self.allocate_block(1).await?);
            }
            core.needs_prepare = true;
        }
        info!(product = %self.name(), "incoherent beam configured");
        core.incoherent = Some(config);
        self.publish_beams(&core);
        Ok(())
    }

    /// Discard explicit beam settings and pointings, then rebuild the beam
    /// configuration from the defaults. Worker allocation is untouched.
    pub async fn reset_beams(&self) -> Result<(), CoreError> {
        let mut core = self.lock().await?;
        core.state.require(
            &[ProductState::Idle, ProductState::Ready],
            self.name(),
            "reset-beams",
        )?;

        let (coherent, incoherent) = self.resolve_plan(&core, false)?;

        if core.state == ProductState::Ready {
            let old: Vec<_> = [core.incoherent_block, core.coherent_block]
                .into_iter()
                .flatten()
                .collect();
            let counts: Vec<u32> = incoherent
                .iter()
                .map(|_| 1)
                .chain(coherent.as_ref().map(CoherentBeamConfig::ngroups))
                .collect();
            let mut fresh = self.replace_blocks(&old, &counts).await?.into_iter();
            core.incoherent_block = incoherent.as_ref().and_then(|_| fresh.next());
            core.coherent_block = coherent.as_ref().and_then(|_| fresh.next());
            core.needs_prepare = true;
        }

        core.incoherent = incoherent;
        core.tilings = 0;
        self.inner.env.sensors.set(self.sensor("tilings"), 0_u32);
        self.inner.pointings.clear();
        self.set_coherent(&mut core, coherent);
        info!(product = %self.name(), "beams reset");
        Ok(())
    }

    pub async fn add_beam(&self, target: &str) -> Result<(), CoreError> {
        let target = Target::parse(target)?;
        let core = self.lock().await?;
        self.require_pointable(&core, "add-beam")?;

        let slot = self.inner.pointings.free_run(1).ok_or_else(|| {
            CoreError::InsufficientResources {
                message: format!("no free coherent beam slot on '{}'", self.name()),
            }
        })?;
        self.inner.pointings.fill(slot, 1, &target);
        self.inner
            .pointings
            .publish(&self.inner.env.sensors, self.name());
        debug!(product = %self.name(), slot, target = %target, "beam added");
        Ok(())
    }

    /// Point `nbeams` consecutive free slots at `target`.
    pub async fn add_tiling(
        &self,
        target: &str,
        nbeams: u32,
        reference_frequency: f64,
        overlap: f64,
        epoch: f64,
    ) -> Result<(), CoreError> {
        let target = Target::parse(target)?;
        if nbeams == 0 {
            return Err(CoreError::invalid("tiling needs at least one beam"));
        }
        if !(reference_frequency.is_finite() && reference_frequency > 0.0) {
            return Err(CoreError::invalid(format!(
                "reference frequency must be positive (got {reference_frequency})"
            )));
        }
        if !(overlap > 0.0 && overlap <= 1.0) {
            return Err(CoreError::invalid(format!(
                "overlap must lie in (0, 1] (got {overlap})"
            )));
        }
        if !epoch.is_finite() {
            return Err(CoreError::invalid("tiling epoch must be finite"));
        }

        let mut core = self.lock().await?;
        self.require_pointable(&core, "add-tiling")?;

        let count = usize::try_from(nbeams).unwrap_or(usize::MAX);
        let start = self.inner.pointings.free_run(count).ok_or_else(|| {
            CoreError::InsufficientResources {
                message: format!(
                    "no run of {nbeams} free coherent beam slots on '{}'",
                    self.name()
                ),
            }
        })?;
        self.inner.pointings.fill(start, count, &target);
        self.inner
            .pointings
            .publish(&self.inner.env.sensors, self.name());
        core.tilings += 1;
        self.inner
            .env
            .sensors
            .set(self.sensor("tilings"), core.tilings);
        debug!(product = %self.name(), start, nbeams, target = %target, "tiling added");
        Ok(())
    }

    // ── Defaults and authority ───────────────────────────────────────

    pub async fn set_configuration_authority(&self, host: &str, port: u16) -> Result<(), CoreError> {
        let host = host.trim();
        if host.is_empty() || port == 0 {
            return Err(CoreError::invalid(format!(
                "invalid configuration authority address '{host}:{port}'"
            )));
        }
        let transport = TransportConfig::with_timeout(self.inner.env.config.authority_timeout);
        let client = AuthorityClient::new(host, port, &transport)
            .map_err(|e| CoreError::external(AUTHORITY, e))?;

        let mut core = self.lock().await?;
        core.state.require(
            &[ProductState::Idle, ProductState::Ready, ProductState::Capturing],
            self.name(),
            "set-configuration-authority",
        )?;
        let address = format!("{host}:{port}");
        self.inner
            .env
            .sensors
            .set(self.sensor("configuration-authority"), address.as_str());
        info!(product = %self.name(), authority = %address, "configuration authority set");
        core.authority = Some(AuthorityHandle {
            address,
            client: Arc::new(client),
        });
        Ok(())
    }

    pub async fn set_default_sb_configuration(&self, json: &str) -> Result<(), CoreError> {
        let config: SubarrayConfig = serde_json::from_str(json).map_err(|e| {
            CoreError::invalid(format!("invalid schedule-block configuration: {e}"))
        })?;

        let mut core = self.lock().await?;
        core.state.require(
            &[ProductState::Idle, ProductState::Ready],
            self.name(),
            "set-default-sb-configuration",
        )?;

        let merged = self.builtin_defaults().merged_with(&config);
        self.coherent_from(&merged)?;
        self.incoherent_from(&merged)?;

        debug!(product = %self.name(), "default schedule-block configuration stored");
        core.default_sb = Some(config);
        Ok(())
    }

    /// Store pointings applied whenever the product becomes ready; applied
    /// at once if it already is and no subscription owns the slots.
    pub async fn set_default_target_configuration(&self, json: &str) -> Result<(), CoreError> {
        let config: fbfuse_api::TargetConfig = serde_json::from_str(json).map_err(|e| {
            CoreError::invalid(format!("invalid target configuration: {e}"))
        })?;
        let targets = targets::parse_all(&config.beams)?;

        let mut core = self.lock().await?;
        core.state.require(
            &[ProductState::Idle, ProductState::Ready, ProductState::Capturing],
            self.name(),
            "set-default-target-configuration",
        )?;

        let live = matches!(core.state, ProductState::Ready | ProductState::Capturing);
        if live && core.subscription.is_none() {
            self.apply_pointings(&targets, "default target configuration");
        }
        core.default_target = Some(targets);
        Ok(())
    }

    // ── Capture ──────────────────────────────────────────────────────

    pub async fn capture_start(&self) -> Result<(), CoreError> {
        let mut core = self.lock().await?;
        if core.state == ProductState::Stopping {
            return Err(CoreError::Conflict {
                message: format!("product '{}' is still stopping", self.name()),
            });
        }
        core.state
            .require(&[ProductState::Ready], self.name(), "capture-start")?;

        self.set_state(&mut core, ProductState::Capturing);
        if self.inner.env.config.dummy || core.workers.is_empty() {
            core.needs_prepare = false;
            return Ok(());
        }

        let prepare = core
            .needs_prepare
            .then(|| self.layout(&core).prepare_requests(&core.workers));
        core.needs_prepare = false;
        let endpoints = core.workers.clone();
        let product = self.clone();
        self.track(
            &mut core,
            tokio::spawn(async move { product.run_capture_start(prepare, endpoints).await }),
        );
        Ok(())
    }

    pub async fn capture_stop(&self) -> Result<(), CoreError> {
        let mut core = self.lock().await?;
        match core.state {
            ProductState::Ready => return Ok(()),
            ProductState::Capturing => {}
            other => {
                return Err(CoreError::InvalidState {
                    product: self.name().to_string(),
                    operation: "capture-stop".into(),
                    state: other.to_string(),
                });
            }
        }

        self.end_subscription(&mut core);
        if self.inner.env.config.dummy || core.workers.is_empty() {
            self.set_state(&mut core, ProductState::Ready);
            return Ok(());
        }

        self.set_state(&mut core, ProductState::Stopping);
        let endpoints = core.workers.clone();
        let product = self.clone();
        self.track(
            &mut core,
            tokio::spawn(async move { product.run_capture_stop(endpoints).await }),
        );
        Ok(())
    }

    async fn run_capture_start(
        &self,
        prepare: Option<Vec<(WorkerEndpoint, fbfuse_api::PrepareRequest)>>,
        endpoints: Vec<WorkerEndpoint>,
    ) {
        let connector = &self.inner.env.workers;
        let result = tokio::select! {
            biased;
            () = self.inner.env.cancel.cancelled() => return,
            r = async {
                if let Some(requests) = &prepare {
                    workers::prepare_all(connector, requests).await?;
                }
                workers::call_all(connector, &endpoints, WorkerCall::CaptureStart).await
            } => r,
        };

        if let Err(e) = result {
            let Ok(mut core) = self.lock().await else { return };
            if core.state == ProductState::Capturing {
                error!(product = %self.name(), error = %e, "capture start failed");
                self.set_state(&mut core, ProductState::Error);
            }
        }
    }

    async fn run_capture_stop(&self, endpoints: Vec<WorkerEndpoint>) {
        let connector = &self.inner.env.workers;
        let result = tokio::select! {
            biased;
            () = self.inner.env.cancel.cancelled() => return,
            r = workers::call_all(connector, &endpoints, WorkerCall::CaptureStop) => r,
        };

        let Ok(mut core) = self.lock().await else { return };
        if core.state != ProductState::Stopping {
            return;
        }
        match result {
            Ok(()) => self.set_state(&mut core, ProductState::Ready),
            Err(e) => {
                error!(product = %self.name(), error = %e, "capture stop failed");
                self.set_state(&mut core, ProductState::Error);
            }
        }
    }

    // ── Teardown ─────────────────────────────────────────────────────

    /// Cancel in-flight work, return every resource and drop all sensors.
    pub(crate) async fn deconfigure(&self) {
        self.inner.env.cancel.cancel();

        let (tasks, subscription) = {
            let mut core = self.inner.core.lock().await;
            (std::mem::take(&mut core.tasks), core.subscription.take())
        };
        if let Some(sub) = subscription {
            sub.cancel.cancel();
            let _ = sub.handle.await;
        }
        for task in tasks {
            let _ = task.await;
        }

        let mut core = self.inner.core.lock().await;
        if !self.inner.env.config.dummy && !core.workers.is_empty() {
            workers::call_all_best_effort(
                &self.inner.env.workers,
                &core.workers,
                WorkerCall::Deconfigure,
            )
            .await;
        }
        self.release_resources(&mut core).await;
        let removed = self
            .inner
            .env
            .sensors
            .remove_prefix(&format!("{}.", self.name()));
        info!(product = %self.name(), sensors = removed, "product deconfigured");
    }

    // ── Internals ────────────────────────────────────────────────────

    /// Take the product lock, failing once deconfigure has begun.
    async fn lock(&self) -> Result<MutexGuard<'_, ProductCore>, CoreError> {
        let core = self.inner.core.lock().await;
        if self.inner.env.cancel.is_cancelled() {
            return Err(CoreError::Cancelled {
                operation: format!("product '{}' is being deconfigured", self.name()),
            });
        }
        Ok(core)
    }

    fn track(&self, core: &mut ProductCore, handle: JoinHandle<()>) {
        core.tasks.retain(|h| !h.is_finished());
        core.tasks.push(handle);
    }

    fn sensor(&self, suffix: &str) -> String {
        format!("{}.{suffix}", self.name())
    }

    fn validator(&self) -> BeamValidator<'_> {
        BeamValidator::new(&self.inner.params.subarray, self.inner.params.nchans)
    }

    fn require_pointable(&self, core: &ProductCore, operation: &str) -> Result<(), CoreError> {
        core.state.require(
            &[ProductState::Idle, ProductState::Ready, ProductState::Capturing],
            self.name(),
            operation,
        )?;
        if core.coherent.is_none() {
            return Err(CoreError::invalid(format!(
                "product '{}' has no coherent beam configuration",
                self.name()
            )));
        }
        Ok(())
    }

    fn set_state(&self, core: &mut ProductCore, state: ProductState) {
        if core.state == state {
            return;
        }
        info!(product = %self.name(), from = %core.state, to = %state, "state transition");
        core.state = state;
        self.inner.state_tx.send_replace(state);
        let status = if state == ProductState::Error {
            SensorStatus::Error
        } else {
            SensorStatus::Nominal
        };
        self.inner
            .env
            .sensors
            .set_with_status(self.sensor("state"), state.to_string(), status);
    }

    fn set_coherent(&self, core: &mut ProductCore, config: Option<CoherentBeamConfig>) {
        let nbeams = config
            .as_ref()
            .map_or(0, |c| usize::try_from(c.nbeams()).unwrap_or(usize::MAX));
        core.coherent = config;
        self.inner.pointings.resize(nbeams);
        self.inner
            .pointings
            .publish(&self.inner.env.sensors, self.name());
        self.publish_beams(core);
    }

    fn layout<'a>(&'a self, core: &'a ProductCore) -> BeamLayout<'a> {
        BeamLayout {
            product: self.name(),
            nchans: self.inner.params.nchans,
            feng_groups: self.inner.params.streams.feng_groups(),
            groups_per_worker: self.inner.env.config.groups_per_worker,
            coherent: core
                .coherent
                .as_ref()
                .zip(core.coherent_block.map(|b| b.range())),
            incoherent: core
                .incoherent
                .as_ref()
                .zip(core.incoherent_block.map(|b| b.range())),
        }
    }

    async fn allocate_block(&self, count: u32) -> Result<AddressBlock, CoreError> {
        let block = self.inner.env.pools.addresses.lock().await.allocate(count)?;
        debug!(product = %self.name(), block = %block, "multicast block allocated");
        Ok(block)
    }

    /// Swap the product's blocks for new ones in a single allocator step.
    /// The product keeps its old blocks if the new sizes do not fit.
    async fn replace_blocks(
        &self,
        old: &[AddressBlock],
        counts: &[u32],
    ) -> Result<Vec<AddressBlock>, CoreError> {
        let fresh = self
            .inner
            .env
            .pools
            .addresses
            .lock()
            .await
            .replace(old, counts)?;
        debug!(product = %self.name(), blocks = fresh.len(), "multicast blocks reallocated");
        Ok(fresh)
    }

    /// Give every worker and address block back to the pools.
    async fn release_resources(&self, core: &mut ProductCore) {
        if !core.workers.is_empty() {
            let workers = std::mem::take(&mut core.workers);
            if let Err(e) = self.inner.env.pools.workers.lock().await.deallocate(&workers) {
                warn!(product = %self.name(), error = %e, "failed to release worker servers");
            }
        }
        let blocks = [core.incoherent_block.take(), core.coherent_block.take()];
        if blocks.iter().any(Option::is_some) {
            let mut addresses = self.inner.env.pools.addresses.lock().await;
            for block in blocks.into_iter().flatten() {
                if let Err(e) = addresses.release(&block) {
                    warn!(product = %self.name(), error = %e, "failed to release multicast block");
                }
            }
        }
        core.needs_prepare = false;
    }

    // ── Sensor publication ───────────────────────────────────────────

    fn publish_static(&self) {
        let params = &self.inner.params;
        let sensors = &self.inner.env.sensors;
        sensors.set_many([
            (self.sensor("state"), ProductState::Idle.to_string()),
            (self.sensor("antennas"), format_antenna_csv(&params.subarray)),
            (self.sensor("proxy"), params.proxy.clone()),
            (self.sensor("sideband"), params.band.sideband.clone()),
            (self.sensor("configuration-authority"), String::new()),
            (self.sensor("servers"), String::new()),
            (self.sensor("target"), String::new()),
        ]);
        sensors.set_many([
            (self.sensor("bandwidth"), params.band.bandwidth_hz),
            (self.sensor("centre-frequency"), params.band.centre_frequency_hz),
            (self.sensor("sync-epoch"), params.band.sync_epoch),
        ]);
        sensors.set(self.sensor("nchannels"), params.nchans);
        sensors.set(self.sensor("tilings"), 0_u32);
        if let Ok(core) = self.inner.core.try_lock() {
            self.publish_beams(&core);
        }
    }

    /// Beam parameter sensors. Unconfigured beams read as zero / empty.
    fn publish_beams(&self, core: &ProductCore) {
        let sensors = &self.inner.env.sensors;
        let coherent = core.coherent.as_ref();
        let incoherent = core.incoherent.as_ref();
        sensors.set_many([
            (
                self.sensor("coherent-beam-count"),
                coherent.map_or(0, CoherentBeamConfig::nbeams),
            ),
            (
                self.sensor("coherent-beam-tscrunch"),
                coherent.map_or(0, CoherentBeamConfig::tscrunch),
            ),
            (
                self.sensor("coherent-beam-fscrunch"),
                coherent.map_or(0, CoherentBeamConfig::fscrunch),
            ),
            (
                self.sensor("coherent-beam-granularity"),
                coherent.map_or(0, CoherentBeamConfig::granularity),
            ),
            (
                self.sensor("coherent-beam-ngroups"),
                coherent.map_or(0, CoherentBeamConfig::ngroups),
            ),
            (
                self.sensor("incoherent-beam-tscrunch"),
                incoherent.map_or(0, IncoherentBeamConfig::tscrunch),
            ),
            (
                self.sensor("incoherent-beam-fscrunch"),
                incoherent.map_or(0, IncoherentBeamConfig::fscrunch),
            ),
        ]);
        sensors.set_many([
            (
                self.sensor("coherent-beam-antennas"),
                coherent.map(CoherentBeamConfig::antennas_csv).unwrap_or_default(),
            ),
            (
                self.sensor("incoherent-beam-antennas"),
                incoherent
                    .map(IncoherentBeamConfig::antennas_csv)
                    .unwrap_or_default(),
            ),
            (
                self.sensor("coherent-beam-multicast-groups"),
                core.coherent_block
                    .map(|b| b.to_string())
                    .unwrap_or_default(),
            ),
            (
                self.sensor("incoherent-beam-multicast-group"),
                core.incoherent_block
                    .map(|b| b.to_string())
                    .unwrap_or_default(),
            ),
        ]);
    }

    fn publish_servers(&self, core: &ProductCore) {
        let servers: Vec<String> = core.workers.iter().map(ToString::to_string).collect();
        self.inner
            .env
            .sensors
            .set(self.sensor("servers"), servers.join(","));
    }

    /// Map `targets` onto the beam slots by position and republish.
    fn apply_pointings(&self, targets: &[Target], source: &str) {
        let applied = self.inner.pointings.apply(targets);
        self.inner
            .pointings
            .publish(&self.inner.env.sensors, self.name());
        debug!(product = %self.name(), applied, source, "pointings applied");
    }
}
