use crate::error::CoreError;
use crate::model::Antenna;

/// Read-only view of the telescope metadata service.
///
/// Only the interface matters to the control plane; the real service sits
/// behind the CAM portal. Implementations are called synchronously from
/// `configure` and must not block.
pub trait TelescopeMetadata: Send + Sync {
    /// Observer description for `antenna`, or an error if the telescope has
    /// no such antenna.
    fn observer(&self, antenna: &Antenna) -> Result<String, CoreError>;

    /// Bandwidth of the F-engine stream in Hz.
    fn bandwidth_hz(&self, stream: &str) -> f64;

    /// Centre frequency of the F-engine stream in Hz.
    fn centre_frequency_hz(&self, stream: &str) -> f64;

    fn sideband(&self, stream: &str) -> String;

    /// Unix time the F-engine timestamps count from.
    fn sync_epoch(&self) -> f64;
}

/// Fixed L-band answers used when no metadata service is wired in.
#[derive(Debug, Clone)]
pub struct StaticMetadata {
    pub bandwidth_hz: f64,
    pub centre_frequency_hz: f64,
    pub sideband: String,
    pub sync_epoch: f64,
}

impl Default for StaticMetadata {
    fn default() -> Self {
        Self {
            bandwidth_hz: 856e6,
            centre_frequency_hz: 1.28e9,
            sideband: "upper".into(),
            sync_epoch: 1_532_530_856.0,
        }
    }
}

impl TelescopeMetadata for StaticMetadata {
    fn observer(&self, antenna: &Antenna) -> Result<String, CoreError> {
        Ok(format!("{antenna}, -30:42:39.8, 21:26:38.0, 1035.0, 13.5"))
    }

    fn bandwidth_hz(&self, _stream: &str) -> f64 {
        self.bandwidth_hz
    }

    fn centre_frequency_hz(&self, _stream: &str) -> f64 {
        self.centre_frequency_hz
    }

    fn sideband(&self, _stream: &str) -> String {
        self.sideband.clone()
    }

    fn sync_epoch(&self) -> f64 {
        self.sync_epoch
    }
}
