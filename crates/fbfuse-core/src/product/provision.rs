// ── Provisioning ──
//
// `provision-beams` flips the product to PROVISIONING and hands the rest to
// a background task: fetch the schedule-block configuration (when an
// authority is set), resolve the beam plan, take workers and multicast
// groups from the shared pools, then prepare the workers.
//
// A failed fetch holds nothing yet, so the product drops back to IDLE with
// the reason on `<product>.provisioning-error`. Failures after that roll
// every allocation back and park the product in ERROR.

use std::sync::Arc;

use fbfuse_api::SubarrayConfig;
use tracing::{debug, error, info, warn};

use super::{AUTHORITY, ProductController, ProductCore, ProductState, workers};
use crate::beam::{CoherentBeamConfig, IncoherentBeamConfig};
use crate::error::CoreError;
use crate::model::format_antenna_csv;
use crate::sensor::SensorStatus;

const PROVISIONING_ERROR: &str = "provisioning-error";

type BeamPlan = (Option<CoherentBeamConfig>, Option<IncoherentBeamConfig>);

impl ProductController {
    pub async fn provision_beams(&self) -> Result<(), CoreError> {
        let mut core = self.lock().await?;
        core.state
            .require(&[ProductState::Idle], self.name(), "provision-beams")?;
        self.set_state(&mut core, ProductState::Provisioning);
        self.inner
            .env
            .sensors
            .set(self.sensor(PROVISIONING_ERROR), "");

        let product = self.clone();
        self.track(
            &mut core,
            tokio::spawn(async move { product.run_provisioning().await }),
        );
        Ok(())
    }

    async fn run_provisioning(&self) {
        let fetched = match self.fetch_schedule_block().await {
            Ok(fetched) => fetched,
            Err(CoreError::Cancelled { .. }) => {
                debug!(product = %self.name(), "provisioning cancelled");
                return;
            }
            Err(e) => return self.abandon_provisioning(&e).await,
        };
        match self.provision(fetched).await {
            Ok(()) => info!(product = %self.name(), "provisioning complete"),
            Err(CoreError::Cancelled { .. }) => {
                debug!(product = %self.name(), "provisioning cancelled");
            }
            Err(e) => self.abort_provisioning(&e).await,
        }
    }

    /// Ask the configuration authority, if one is set, for this product's
    /// schedule-block configuration.
    async fn fetch_schedule_block(&self) -> Result<Option<SubarrayConfig>, CoreError> {
        let config = &self.inner.env.config;
        let authority = {
            let core = self.lock().await?;
            core.authority
                .as_ref()
                .map(|a| (a.address.clone(), Arc::clone(&a.client)))
        };
        let Some((address, client)) = authority else {
            return Ok(None);
        };

        debug!(
            product = %self.name(),
            authority = %address,
            sb_id = %config.sb_id,
            "fetching schedule-block configuration"
        );
        let sb = tokio::select! {
            biased;
            () = self.inner.env.cancel.cancelled() => return Err(cancelled()),
            r = client.fetch_subarray_config(self.proxy(), &config.sb_id) => r,
        };
        sb.map(Some).map_err(|e| CoreError::external(AUTHORITY, e))
    }

    async fn provision(&self, fetched: Option<SubarrayConfig>) -> Result<(), CoreError> {
        let cancel = &self.inner.env.cancel;
        let config = &self.inner.env.config;

        let requests = {
            let mut core = self.lock().await?;
            if fetched.is_some() {
                core.authority_sb = fetched;
            }
            let (coherent, incoherent) = self.resolve_plan(&core, true)?;
            core.incoherent = incoherent;
            self.set_coherent(&mut core, coherent);

            let nworkers = config.workers_for(self.inner.params.streams.feng_groups().count());
            core.workers = {
                let mut pool = self.inner.env.pools.workers.lock().await;
                // Dummy products run on whatever is free, possibly nothing.
                let nworkers = if config.dummy {
                    nworkers.min(pool.available_count())
                } else {
                    nworkers
                };
                pool.allocate(nworkers)?
            };
            if core.incoherent.is_some() {
                core.incoherent_block = Some(self.allocate_block(1).await?);
            }
            if let Some(ngroups) = core.coherent.as_ref().map(CoherentBeamConfig::ngroups) {
                core.coherent_block = Some(self.allocate_block(ngroups).await?);
            }

            self.publish_beams(&core);
            self.publish_servers(&core);
            info!(
                product = %self.name(),
                workers = core.workers.len(),
                "resources allocated"
            );
            self.layout(&core).prepare_requests(&core.workers)
        };

        if !config.dummy && !requests.is_empty() {
            tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(cancelled()),
                r = workers::prepare_all(&self.inner.env.workers, &requests) => r?,
            }
        }

        let mut core = self.lock().await?;
        core.needs_prepare = false;
        if let Some(targets) = core.default_target.clone() {
            self.apply_pointings(&targets, "default target configuration");
        }
        self.set_state(&mut core, ProductState::Ready);
        Ok(())
    }

    /// Back to IDLE after a failure that happened before any allocation.
    async fn abandon_provisioning(&self, err: &CoreError) {
        let Ok(mut core) = self.lock().await else {
            return;
        };
        warn!(product = %self.name(), error = %err, "provisioning abandoned");
        self.inner.env.sensors.set_with_status(
            self.sensor(PROVISIONING_ERROR),
            err.to_string(),
            SensorStatus::Warning,
        );
        self.set_state(&mut core, ProductState::Idle);
    }

    async fn abort_provisioning(&self, err: &CoreError) {
        let Ok(mut core) = self.lock().await else {
            return;
        };
        error!(product = %self.name(), error = %err, "provisioning failed, rolling back");
        self.release_resources(&mut core).await;
        self.publish_beams(&core);
        self.publish_servers(&core);
        self.set_state(&mut core, ProductState::Error);
    }

    // ── Beam plan resolution ─────────────────────────────────────────

    /// Work out both beam configurations.
    ///
    /// A fetched authority configuration wins over everything, layered on
    /// the built-in and local defaults. Otherwise an explicit configuration
    /// (when `keep_explicit`) is kept, then local defaults apply; with none
    /// of these the beam kind stays unconfigured.
    pub(super) fn resolve_plan(
        &self,
        core: &ProductCore,
        keep_explicit: bool,
    ) -> Result<BeamPlan, CoreError> {
        let local = core
            .default_sb
            .as_ref()
            .map(|d| self.builtin_defaults().merged_with(d));

        if let Some(authority) = &core.authority_sb {
            let merged = local
                .unwrap_or_else(|| self.builtin_defaults())
                .merged_with(authority);
            return Ok((
                Some(self.coherent_from(&merged)?),
                Some(self.incoherent_from(&merged)?),
            ));
        }

        let coherent = match (core.coherent.as_ref().filter(|_| keep_explicit), &local) {
            (Some(explicit), _) => Some(explicit.clone()),
            (None, Some(local)) => Some(self.coherent_from(local)?),
            (None, None) => None,
        };
        let incoherent = match (core.incoherent.as_ref().filter(|_| keep_explicit), &local) {
            (Some(explicit), _) => Some(explicit.clone()),
            (None, Some(local)) => Some(self.incoherent_from(local)?),
            (None, None) => None,
        };
        Ok((coherent, incoherent))
    }

    pub(super) fn builtin_defaults(&self) -> SubarrayConfig {
        self.inner
            .env
            .config
            .beam_defaults
            .as_subarray_config(self.subarray())
    }

    pub(super) fn coherent_from(
        &self,
        sb: &SubarrayConfig,
    ) -> Result<CoherentBeamConfig, CoreError> {
        let defaults = &self.inner.env.config.beam_defaults;
        let antennas = sb
            .coherent_beams_antennas
            .clone()
            .unwrap_or_else(|| format_antenna_csv(self.subarray()));
        self.validator().coherent(
            sb.coherent_beams_nbeams.unwrap_or(defaults.coherent_nbeams),
            &antennas,
            sb.coherent_beams_fscrunch
                .unwrap_or(defaults.coherent_fscrunch),
            sb.coherent_beams_tscrunch
                .unwrap_or(defaults.coherent_tscrunch),
            sb.coherent_beams_granularity
                .unwrap_or(defaults.coherent_granularity),
        )
    }

    pub(super) fn incoherent_from(
        &self,
        sb: &SubarrayConfig,
    ) -> Result<IncoherentBeamConfig, CoreError> {
        let defaults = &self.inner.env.config.beam_defaults;
        let antennas = sb
            .incoherent_beam_antennas
            .clone()
            .unwrap_or_else(|| format_antenna_csv(self.subarray()));
        self.validator().incoherent(
            &antennas,
            sb.incoherent_beam_fscrunch
                .unwrap_or(defaults.incoherent_fscrunch),
            sb.incoherent_beam_tscrunch
                .unwrap_or(defaults.incoherent_tscrunch),
        )
    }
}

fn cancelled() -> CoreError {
    CoreError::Cancelled {
        operation: "provision-beams".into(),
    }
}
