// ── Runtime controller configuration ──
//
// These types describe how the master sizes and talks to its resources.
// The binary builds a `MasterConfig` (usually via fbfuse-config) and hands
// it in; core never reads config files.

use std::time::Duration;

use fbfuse_api::SubarrayConfig;

use crate::model::{AddressRange, Antenna, format_antenna_csv};

/// Built-in beam parameters used when neither the authority nor the
/// product's local defaults say otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BeamDefaults {
    pub coherent_nbeams: u32,
    pub coherent_tscrunch: u32,
    pub coherent_fscrunch: u32,
    pub coherent_granularity: u32,
    pub incoherent_tscrunch: u32,
    pub incoherent_fscrunch: u32,
}

impl Default for BeamDefaults {
    fn default() -> Self {
        Self {
            coherent_nbeams: 400,
            coherent_tscrunch: 16,
            coherent_fscrunch: 1,
            coherent_granularity: 8,
            incoherent_tscrunch: 16,
            incoherent_fscrunch: 1,
        }
    }
}

impl BeamDefaults {
    /// Express the defaults in authority terms, using the whole subarray
    /// for both beam kinds.
    pub fn as_subarray_config(&self, subarray: &[Antenna]) -> SubarrayConfig {
        let antennas = format_antenna_csv(subarray);
        SubarrayConfig {
            coherent_beams_nbeams: Some(self.coherent_nbeams),
            coherent_beams_tscrunch: Some(self.coherent_tscrunch),
            coherent_beams_fscrunch: Some(self.coherent_fscrunch),
            coherent_beams_antennas: Some(antennas.clone()),
            coherent_beams_granularity: Some(self.coherent_granularity),
            incoherent_beam_tscrunch: Some(self.incoherent_tscrunch),
            incoherent_beam_fscrunch: Some(self.incoherent_fscrunch),
            incoherent_beam_antennas: Some(antennas),
        }
    }
}

/// Configuration for the master controller.
#[derive(Debug, Clone)]
pub struct MasterConfig {
    /// Skip every worker RPC (simulation and tests).
    pub dummy: bool,
    /// Largest channel count `configure` accepts.
    pub max_channels: u32,
    /// F-engine multicast groups one worker ingests.
    pub groups_per_worker: u32,
    /// Output multicast block shared by all products.
    pub multicast_range: AddressRange,
    pub worker_timeout: Duration,
    pub authority_timeout: Duration,
    /// How often a live target subscription polls the authority.
    pub target_poll_interval: Duration,
    /// Schedule-block id sent with subarray configuration queries.
    pub sb_id: String,
    pub beam_defaults: BeamDefaults,
}

impl Default for MasterConfig {
    fn default() -> Self {
        Self {
            dummy: false,
            max_channels: 4096,
            groups_per_worker: 4,
            multicast_range: AddressRange::DEFAULT_OUTPUT,
            worker_timeout: Duration::from_secs(10),
            authority_timeout: Duration::from_secs(10),
            target_poll_interval: Duration::from_millis(500),
            sb_id: "default_subarray".into(),
            beam_defaults: BeamDefaults::default(),
        }
    }
}

impl MasterConfig {
    /// Defaults with worker RPCs disabled.
    pub fn dummy() -> Self {
        Self {
            dummy: true,
            ..Self::default()
        }
    }

    /// Workers needed to ingest `feng_groups` multicast groups.
    pub fn workers_for(&self, feng_groups: u32) -> usize {
        let per_worker = self.groups_per_worker.max(1);
        usize::try_from(feng_groups.div_ceil(per_worker).max(1)).unwrap_or(usize::MAX)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::parse_antenna_csv;

    #[test]
    fn default_range_text() {
        assert_eq!(
            MasterConfig::default().multicast_range.to_string(),
            "spead://239.11.1.0+255:7147"
        );
    }

    #[test]
    fn worker_sizing() {
        let cfg = MasterConfig::default();
        assert_eq!(cfg.workers_for(16), 4);
        assert_eq!(cfg.workers_for(17), 5);
        assert_eq!(cfg.workers_for(1), 1);
        assert_eq!(cfg.workers_for(0), 1);
    }

    #[test]
    fn defaults_cover_every_authority_key() {
        let sub = parse_antenna_csv("m007,m008").unwrap();
        let cfg = BeamDefaults::default().as_subarray_config(&sub);
        assert_eq!(cfg.coherent_beams_antennas.as_deref(), Some("m007,m008"));
        assert_eq!(cfg.coherent_beams_granularity, Some(8));
        assert_eq!(cfg.incoherent_beam_tscrunch, Some(16));
    }
}
