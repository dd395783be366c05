// fbfuse-api: Async HTTP clients for the collaborators of the FBFUSE
// control plane (configuration authority + beamformer worker servers).

pub mod authority;
pub mod error;
pub mod transport;
pub mod worker;

pub use authority::{AuthorityClient, BackoffConfig, SubarrayConfig, TargetConfig, TargetFeed};
pub use error::Error;
pub use transport::TransportConfig;
pub use worker::{BeamParams, PrepareRequest, WorkerClient, WorkerConnector};
