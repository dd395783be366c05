// Beamformer worker-server RPC client
//
// Workers are addressed only as (host, port) endpoints. Every call answers
// with a `{ "status": "ok" | "fail", "message": ... }` envelope which is
// unwrapped here so callers only see success or `Error::Rejected`.

use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::transport::{self, TransportConfig};

/// Beam parameters shipped to a worker during preparation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeamParams {
    pub nbeams: u32,
    pub antennas: Vec<String>,
    pub fscrunch: u32,
    pub tscrunch: u32,
    /// Multicast destination(s) in `spead://` notation.
    pub multicast_groups: String,
}

/// Body of `POST /prepare`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrepareRequest {
    pub product: String,
    pub nchans: u32,
    /// F-engine input groups assigned to this worker, in `spead://` notation.
    pub feng_groups: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coherent: Option<BeamParams>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub incoherent: Option<BeamParams>,
}

#[derive(Debug, Deserialize)]
struct WorkerReply {
    status: String,
    #[serde(default)]
    message: Option<String>,
}

/// Hands out [`WorkerClient`]s that share one connection pool.
#[derive(Clone)]
pub struct WorkerConnector {
    http: reqwest::Client,
    transport: TransportConfig,
}

impl WorkerConnector {
    pub fn new(transport: &TransportConfig) -> Result<Self, Error> {
        Ok(Self {
            http: transport.build_client()?,
            transport: transport.clone(),
        })
    }

    /// Client for the worker listening on `host:port`.
    pub fn connect(&self, host: &str, port: u16) -> Result<WorkerClient, Error> {
        Ok(WorkerClient::with_client(
            self.http.clone(),
            transport::base_url(host, port)?,
            self.transport.clone(),
        ))
    }
}

/// Client for a single worker server.
pub struct WorkerClient {
    http: reqwest::Client,
    base_url: Url,
    transport: TransportConfig,
}

impl WorkerClient {
    pub fn new(host: &str, port: u16, transport: &TransportConfig) -> Result<Self, Error> {
        Ok(Self {
            http: transport.build_client()?,
            base_url: transport::base_url(host, port)?,
            transport: transport.clone(),
        })
    }

    /// Create a client with a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: Url, transport: TransportConfig) -> Self {
        Self {
            http,
            base_url,
            transport,
        }
    }

    pub async fn ping(&self) -> Result<(), Error> {
        let url = self.base_url.join("ping")?;
        debug!("GET {}", url);
        let resp = self
            .http
            .get(url.clone())
            .send()
            .await
            .map_err(|e| self.transport.classify(e))?;
        self.unwrap_reply(url, resp).await
    }

    pub async fn prepare(&self, request: &PrepareRequest) -> Result<(), Error> {
        self.post("prepare", Some(request)).await
    }

    pub async fn capture_start(&self) -> Result<(), Error> {
        self.post::<()>("capture-start", None).await
    }

    pub async fn capture_stop(&self) -> Result<(), Error> {
        self.post::<()>("capture-stop", None).await
    }

    pub async fn deconfigure(&self) -> Result<(), Error> {
        self.post::<()>("deconfigure", None).await
    }

    // ── Request helpers ──────────────────────────────────────────────

    async fn post<B: Serialize>(&self, path: &str, body: Option<&B>) -> Result<(), Error> {
        let url = self.base_url.join(path)?;
        debug!("POST {}", url);

        let mut request = self.http.post(url.clone());
        if let Some(body) = body {
            request = request.json(body);
        }
        let resp = request
            .send()
            .await
            .map_err(|e| self.transport.classify(e))?;
        self.unwrap_reply(url, resp).await
    }

    async fn unwrap_reply(&self, url: Url, resp: reqwest::Response) -> Result<(), Error> {
        let status = resp.status();
        let body = resp.text().await.map_err(|e| self.transport.classify(e))?;

        if !status.is_success() {
            return Err(Error::Status {
                status: status.as_u16(),
                url: url.to_string(),
                body,
            });
        }

        let reply: WorkerReply =
            serde_json::from_str(&body).map_err(|e| Error::Deserialization {
                message: e.to_string(),
                body: body.clone(),
            })?;

        match reply.status.as_str() {
            "ok" => Ok(()),
            other => Err(Error::Rejected {
                message: reply
                    .message
                    .unwrap_or_else(|| format!("status={other}")),
            }),
        }
    }
}
