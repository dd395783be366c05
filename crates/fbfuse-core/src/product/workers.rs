// Fan-out of product lifecycle calls to the allocated worker servers.
//
// Every call runs against all workers concurrently and fails as a whole if
// any worker fails; the first error is reported.

use fbfuse_api::{BeamParams, PrepareRequest, WorkerClient, WorkerConnector};
use futures_util::future::{join_all, try_join_all};
use tracing::{debug, warn};

use crate::beam::{CoherentBeamConfig, IncoherentBeamConfig};
use crate::error::CoreError;
use crate::model::{AddressRange, WorkerEndpoint};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WorkerCall {
    CaptureStart,
    CaptureStop,
    Deconfigure,
}

impl WorkerCall {
    fn name(self) -> &'static str {
        match self {
            Self::CaptureStart => "capture-start",
            Self::CaptureStop => "capture-stop",
            Self::Deconfigure => "deconfigure",
        }
    }
}

/// Everything a worker needs to know about the product's beams.
pub(crate) struct BeamLayout<'a> {
    pub product: &'a str,
    pub nchans: u32,
    pub feng_groups: AddressRange,
    pub groups_per_worker: u32,
    pub coherent: Option<(&'a CoherentBeamConfig, AddressRange)>,
    pub incoherent: Option<(&'a IncoherentBeamConfig, AddressRange)>,
}

impl BeamLayout<'_> {
    /// One `prepare` request per worker. Worker `i` ingests the `i`-th
    /// slice of `groups_per_worker` F-engine groups and emits every beam.
    pub(crate) fn prepare_requests(
        &self,
        workers: &[WorkerEndpoint],
    ) -> Vec<(WorkerEndpoint, PrepareRequest)> {
        let coherent = self.coherent.map(|(cfg, groups)| BeamParams {
            nbeams: cfg.nbeams(),
            antennas: cfg.antennas().iter().map(ToString::to_string).collect(),
            fscrunch: cfg.fscrunch(),
            tscrunch: cfg.tscrunch(),
            multicast_groups: groups.to_string(),
        });
        let incoherent = self.incoherent.map(|(cfg, group)| BeamParams {
            nbeams: 1,
            antennas: cfg.antennas().iter().map(ToString::to_string).collect(),
            fscrunch: cfg.fscrunch(),
            tscrunch: cfg.tscrunch(),
            multicast_groups: group.to_string(),
        });

        let per_worker = self.groups_per_worker.max(1);
        let total = self.feng_groups.count();
        workers
            .iter()
            .zip(0_u32..)
            .map(|(endpoint, i)| {
                let offset = i.saturating_mul(per_worker);
                let count = total.saturating_sub(offset).min(per_worker);
                let slice = self
                    .feng_groups
                    .sub_range(offset, count)
                    .unwrap_or(self.feng_groups);
                let request = PrepareRequest {
                    product: self.product.to_string(),
                    nchans: self.nchans,
                    feng_groups: slice.to_string(),
                    coherent: coherent.clone(),
                    incoherent: incoherent.clone(),
                };
                (endpoint.clone(), request)
            })
            .collect()
    }
}

fn connect(connector: &WorkerConnector, endpoint: &WorkerEndpoint) -> Result<WorkerClient, CoreError> {
    connector
        .connect(endpoint.host(), endpoint.port())
        .map_err(|e| worker_error(endpoint, e))
}

fn worker_error(endpoint: &WorkerEndpoint, err: fbfuse_api::Error) -> CoreError {
    CoreError::external(&format!("worker server {endpoint}"), err)
}

pub(crate) async fn prepare_all(
    connector: &WorkerConnector,
    requests: &[(WorkerEndpoint, PrepareRequest)],
) -> Result<(), CoreError> {
    try_join_all(requests.iter().map(|(endpoint, request)| async move {
        let client = connect(connector, endpoint)?;
        client
            .prepare(request)
            .await
            .map_err(|e| worker_error(endpoint, e))?;
        debug!(worker = %endpoint, product = %request.product, "worker prepared");
        Ok::<_, CoreError>(())
    }))
    .await?;
    Ok(())
}

async fn call_one(
    connector: &WorkerConnector,
    endpoint: &WorkerEndpoint,
    call: WorkerCall,
) -> Result<(), CoreError> {
    let client = connect(connector, endpoint)?;
    let result = match call {
        WorkerCall::CaptureStart => client.capture_start().await,
        WorkerCall::CaptureStop => client.capture_stop().await,
        WorkerCall::Deconfigure => client.deconfigure().await,
    };
    result.map_err(|e| worker_error(endpoint, e))?;
    debug!(worker = %endpoint, call = call.name(), "worker call succeeded");
    Ok(())
}

pub(crate) async fn call_all(
    connector: &WorkerConnector,
    workers: &[WorkerEndpoint],
    call: WorkerCall,
) -> Result<(), CoreError> {
    try_join_all(
        workers
            .iter()
            .map(|endpoint| call_one(connector, endpoint, call)),
    )
    .await?;
    Ok(())
}

/// Like [`call_all`] but never fails: every worker is tried and failures
/// are logged.
pub(crate) async fn call_all_best_effort(
    connector: &WorkerConnector,
    workers: &[WorkerEndpoint],
    call: WorkerCall,
) {
    let results = join_all(workers.iter().map(|endpoint| async move {
        (endpoint, call_one(connector, endpoint, call).await)
    }))
    .await;

    for (endpoint, outcome) in results {
        if let Err(e) = outcome {
            warn!(worker = %endpoint, call = call.name(), error = %e, "worker call failed");
        }
    }
}

/// Ping each worker; `true` means it answered `ok` in time.
pub(crate) async fn ping_all(
    connector: &WorkerConnector,
    workers: &[WorkerEndpoint],
) -> Vec<(WorkerEndpoint, bool)> {
    join_all(workers.iter().map(|endpoint| async move {
        let healthy = match connect(connector, endpoint) {
            Ok(client) => match client.ping().await {
                Ok(()) => true,
                Err(e) => {
                    debug!(worker = %endpoint, error = %e, "worker ping failed");
                    false
                }
            },
            Err(_) => false,
        };
        (endpoint.clone(), healthy)
    }))
    .await
}
