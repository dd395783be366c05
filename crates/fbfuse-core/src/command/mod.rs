// ── Command API ──
//
// Every control request flows through a unified `Command` enum. The master
// routes registry commands itself and forwards product-scoped commands to
// the named product.

use crate::error::CoreError;
use crate::model::WorkerEndpoint;
use crate::sensor::SensorReading;

/// A command envelope sent through the command channel.
/// Contains the command and a oneshot response channel.
pub(crate) struct CommandEnvelope {
    pub command: Command,
    pub response_tx: tokio::sync::oneshot::Sender<Result<CommandResult, CoreError>>,
}

/// All requests the master controller accepts.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    // ── Product registry ─────────────────────────────────────────────
    Configure {
        product: String,
        antennas: String,
        nchans: u32,
        streams_json: String,
        proxy: String,
    },
    Deconfigure {
        product: String,
    },

    // ── Product lifecycle ────────────────────────────────────────────
    ProvisionBeams {
        product: String,
    },
    ResetBeams {
        product: String,
    },
    CaptureStart {
        product: String,
    },
    CaptureStop {
        product: String,
    },

    // ── Beam configuration ───────────────────────────────────────────
    ConfigureCoherentBeams {
        product: String,
        nbeams: u32,
        antennas: String,
        fscrunch: u32,
        tscrunch: u32,
    },
    ConfigureIncoherentBeam {
        product: String,
        antennas: String,
        fscrunch: u32,
        tscrunch: u32,
    },
    AddBeam {
        product: String,
        target: String,
    },
    AddTiling {
        product: String,
        target: String,
        nbeams: u32,
        reference_frequency: f64,
        overlap: f64,
        epoch: f64,
    },

    // ── Configuration authority ──────────────────────────────────────
    SetConfigurationAuthority {
        product: String,
        host: String,
        port: u16,
    },
    SetDefaultSbConfiguration {
        product: String,
        json: String,
    },
    SetDefaultTargetConfiguration {
        product: String,
        json: String,
    },
    TargetStart {
        product: String,
        target: String,
    },
    TargetStop {
        product: String,
    },

    // ── Worker registry ──────────────────────────────────────────────
    RegisterWorkerServer {
        host: String,
        port: u16,
    },
    DeregisterWorkerServer {
        host: String,
        port: u16,
    },
    WorkerServerList,
    PingWorkers,

    // ── Sensors ──────────────────────────────────────────────────────
    SensorValue {
        name: String,
    },
    SensorList {
        pattern: String,
    },
}

impl Command {
    /// The product a command is addressed to, if it is product-scoped.
    pub fn product(&self) -> Option<&str> {
        match self {
            Self::Deconfigure { product }
            | Self::ProvisionBeams { product }
            | Self::ResetBeams { product }
            | Self::CaptureStart { product }
            | Self::CaptureStop { product }
            | Self::ConfigureCoherentBeams { product, .. }
            | Self::ConfigureIncoherentBeam { product, .. }
            | Self::AddBeam { product, .. }
            | Self::AddTiling { product, .. }
            | Self::SetConfigurationAuthority { product, .. }
            | Self::SetDefaultSbConfiguration { product, .. }
            | Self::SetDefaultTargetConfiguration { product, .. }
            | Self::TargetStart { product, .. }
            | Self::TargetStop { product } => Some(product),
            Self::Configure { .. }
            | Self::RegisterWorkerServer { .. }
            | Self::DeregisterWorkerServer { .. }
            | Self::WorkerServerList
            | Self::PingWorkers
            | Self::SensorValue { .. }
            | Self::SensorList { .. } => None,
        }
    }
}

/// Result of a successfully executed command.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandResult {
    Ok,
    /// Every registered worker with its allocation flag.
    WorkerList(Vec<(WorkerEndpoint, bool)>),
    /// Every registered worker with its ping outcome.
    WorkerHealth(Vec<(WorkerEndpoint, bool)>),
    Sensor(SensorReading),
    SensorList(Vec<SensorReading>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn product_scope() {
        let cmd = Command::CaptureStart {
            product: "p0".into(),
        };
        assert_eq!(cmd.product(), Some("p0"));
        assert_eq!(Command::WorkerServerList.product(), None);
        let configure = Command::Configure {
            product: "p0".into(),
            antennas: "m007".into(),
            nchans: 4096,
            streams_json: "{}".into(),
            proxy: "proxy".into(),
        };
        assert_eq!(configure.product(), None);
    }
}
