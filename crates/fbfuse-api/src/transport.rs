// Shared transport configuration for building reqwest::Client instances.
//
// The authority client and every worker client share timeout and
// user-agent settings through this module.

use std::time::Duration;

use url::Url;

use crate::error::Error;

const USER_AGENT: &str = concat!("fbfuse-control/", env!("CARGO_PKG_VERSION"));

/// Shared transport configuration for building HTTP clients.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Upper bound for a single request, connect included.
    pub timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
        }
    }
}

impl TransportConfig {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Build a `reqwest::Client` from this config.
    pub fn build_client(&self) -> Result<reqwest::Client, Error> {
        reqwest::Client::builder()
            .timeout(self.timeout)
            .connect_timeout(self.timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| Error::ClientBuild(e.to_string()))
    }

    /// Translate a reqwest failure, folding timeouts into [`Error::Timeout`]
    /// so callers see the configured budget instead of a transport string.
    pub(crate) fn classify(&self, err: reqwest::Error) -> Error {
        if err.is_timeout() {
            Error::Timeout {
                timeout_secs: self.timeout.as_secs(),
            }
        } else {
            Error::Transport(err)
        }
    }
}

/// Build the `http://host:port/` root URL for a remote service.
pub fn base_url(host: &str, port: u16) -> Result<Url, Error> {
    let host = if host.contains(':') && !host.starts_with('[') {
        format!("[{host}]")
    } else {
        host.to_string()
    };
    Ok(Url::parse(&format!("http://{host}:{port}/"))?)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn base_url_for_ipv4_host() {
        let url = base_url("10.8.67.235", 7147).unwrap();
        assert_eq!(url.as_str(), "http://10.8.67.235:7147/");
    }

    #[test]
    fn base_url_brackets_ipv6_host() {
        let url = base_url("::1", 8080).unwrap();
        assert_eq!(url.as_str(), "http://[::1]:8080/");
    }

    #[test]
    fn base_url_rejects_garbage() {
        assert!(base_url("not a host", 1).is_err());
    }
}
