// Configuration authority HTTP client
//
// The authority is addressed by (host, port) and keyed by the product's
// proxy name. Every call is bounded by the transport timeout.

use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use super::models::{SubarrayConfig, TargetConfig};
use crate::error::Error;
use crate::transport::{self, TransportConfig};

/// Client for a single configuration authority.
pub struct AuthorityClient {
    http: reqwest::Client,
    base_url: Url,
    transport: TransportConfig,
}

impl AuthorityClient {
    /// Create a client for the authority listening on `host:port`.
    pub fn new(host: &str, port: u16, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self {
            http,
            base_url: transport::base_url(host, port)?,
            transport: transport.clone(),
        })
    }

    /// Create a client with a pre-built `reqwest::Client` and root URL.
    pub fn with_client(http: reqwest::Client, base_url: Url, transport: TransportConfig) -> Self {
        Self {
            http,
            base_url,
            transport,
        }
    }

    /// The authority root URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// One-shot fetch of the schedule-block defaults for `proxy`.
    pub async fn fetch_subarray_config(
        &self,
        proxy: &str,
        sb_id: &str,
    ) -> Result<SubarrayConfig, Error> {
        let mut url = self.base_url.join("sb-config")?;
        url.query_pairs_mut()
            .append_pair("proxy", proxy)
            .append_pair("sb_id", sb_id);
        self.get(url).await
    }

    /// Fetch the beam pointings the authority wants for `target`.
    pub async fn fetch_target_config(
        &self,
        proxy: &str,
        target: &str,
    ) -> Result<TargetConfig, Error> {
        let mut url = self.base_url.join("target-config")?;
        url.query_pairs_mut()
            .append_pair("proxy", proxy)
            .append_pair("target", target);
        self.get(url).await
    }

    /// Fetch the most recent target configuration pushed for `proxy`.
    ///
    /// This is the endpoint the live [`TargetFeed`](super::TargetFeed) follows.
    pub async fn latest_target_config(&self, proxy: &str) -> Result<TargetConfig, Error> {
        let mut url = self.base_url.join("target-config/latest")?;
        url.query_pairs_mut().append_pair("proxy", proxy);
        self.get(url).await
    }

    // ── Request helpers ──────────────────────────────────────────────

    async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<T, Error> {
        debug!("GET {}", url);

        let resp = self
            .http
            .get(url.clone())
            .send()
            .await
            .map_err(|e| self.transport.classify(e))?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| self.transport.classify(e))?;

        if !status.is_success() {
            return Err(Error::Status {
                status: status.as_u16(),
                url: url.to_string(),
                body,
            });
        }

        serde_json::from_str(&body).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body,
        })
    }
}
