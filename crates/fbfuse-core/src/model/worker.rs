use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// A beamformer worker server, identified by `(host, port)`.
///
/// Two endpoints are the same worker exactly when host and port match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WorkerEndpoint {
    host: String,
    port: u16,
}

impl WorkerEndpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Result<Self, CoreError> {
        let host: String = host.into();
        let host = host.trim();
        if host.is_empty() || host.chars().any(char::is_whitespace) {
            return Err(CoreError::invalid(format!("invalid worker host '{host}'")));
        }
        if port == 0 {
            return Err(CoreError::invalid("worker port must be non-zero"));
        }
        Ok(Self {
            host: host.to_string(),
            port,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

impl fmt::Display for WorkerEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn equality_is_by_host_and_port() {
        let a = WorkerEndpoint::new("127.0.0.1", 10000).unwrap();
        let b = WorkerEndpoint::new("127.0.0.1", 10000).unwrap();
        let c = WorkerEndpoint::new("127.0.0.1", 10001).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn display_is_host_colon_port() {
        let w = WorkerEndpoint::new(" 192.168.1.150 ", 5000).unwrap();
        assert_eq!(w.to_string(), "192.168.1.150:5000");
    }

    #[test]
    fn rejects_empty_host_and_zero_port() {
        assert!(WorkerEndpoint::new("", 5000).is_err());
        assert!(WorkerEndpoint::new("host", 0).is_err());
    }
}
