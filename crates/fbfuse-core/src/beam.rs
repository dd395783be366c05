// ── Beam configuration ──
//
// Validated coherent/incoherent beam parameters. Construction goes through
// `BeamValidator`, which knows the product's subarray and channel count;
// a config value that exists is always valid for its product.

use std::collections::HashSet;

use serde::Serialize;

use crate::error::CoreError;
use crate::model::{Antenna, format_antenna_csv, parse_antenna_csv};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CoherentBeamConfig {
    nbeams: u32,
    antennas: Vec<Antenna>,
    fscrunch: u32,
    tscrunch: u32,
    granularity: u32,
}

impl CoherentBeamConfig {
    pub fn nbeams(&self) -> u32 {
        self.nbeams
    }

    pub fn antennas(&self) -> &[Antenna] {
        &self.antennas
    }

    pub fn antennas_csv(&self) -> String {
        format_antenna_csv(&self.antennas)
    }

    pub fn fscrunch(&self) -> u32 {
        self.fscrunch
    }

    pub fn tscrunch(&self) -> u32 {
        self.tscrunch
    }

    /// Beams carried per multicast group.
    pub fn granularity(&self) -> u32 {
        self.granularity
    }

    /// Number of multicast groups needed: `ceil(nbeams / granularity)`.
    pub fn ngroups(&self) -> u32 {
        self.nbeams.div_ceil(self.granularity)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IncoherentBeamConfig {
    antennas: Vec<Antenna>,
    fscrunch: u32,
    tscrunch: u32,
}

impl IncoherentBeamConfig {
    pub fn antennas(&self) -> &[Antenna] {
        &self.antennas
    }

    pub fn antennas_csv(&self) -> String {
        format_antenna_csv(&self.antennas)
    }

    pub fn fscrunch(&self) -> u32 {
        self.fscrunch
    }

    pub fn tscrunch(&self) -> u32 {
        self.tscrunch
    }
}

/// Validates beam requests against one product's subarray.
pub struct BeamValidator<'a> {
    subarray: &'a [Antenna],
    total_channels: u32,
}

impl<'a> BeamValidator<'a> {
    pub fn new(subarray: &'a [Antenna], total_channels: u32) -> Self {
        Self {
            subarray,
            total_channels,
        }
    }

    /// Parse and check an antenna list: non-empty, no duplicates, every
    /// antenna part of the subarray.
    pub fn antennas(&self, csv: &str) -> Result<Vec<Antenna>, CoreError> {
        let antennas = parse_antenna_csv(csv)?;
        if antennas.is_empty() {
            return Err(CoreError::InvalidAntennas {
                reason: "antenna list is empty".into(),
            });
        }

        let mut seen = HashSet::with_capacity(antennas.len());
        for antenna in &antennas {
            if !seen.insert(antenna) {
                return Err(CoreError::InvalidAntennas {
                    reason: format!("antenna {antenna} listed more than once"),
                });
            }
            if !self.subarray.contains(antenna) {
                return Err(CoreError::InvalidAntennas {
                    reason: format!(
                        "antenna {antenna} is not part of the subarray ({})",
                        format_antenna_csv(self.subarray)
                    ),
                });
            }
        }
        Ok(antennas)
    }

    pub fn coherent(
        &self,
        nbeams: u32,
        antennas_csv: &str,
        fscrunch: u32,
        tscrunch: u32,
        granularity: u32,
    ) -> Result<CoherentBeamConfig, CoreError> {
        if nbeams == 0 {
            return Err(CoreError::invalid("number of coherent beams must be at least 1"));
        }
        if granularity == 0 {
            return Err(CoreError::invalid("coherent beam granularity must be positive"));
        }
        self.scrunch(fscrunch, tscrunch)?;
        let antennas = self.antennas(antennas_csv)?;
        Ok(CoherentBeamConfig {
            nbeams,
            antennas,
            fscrunch,
            tscrunch,
            granularity,
        })
    }

    pub fn incoherent(
        &self,
        antennas_csv: &str,
        fscrunch: u32,
        tscrunch: u32,
    ) -> Result<IncoherentBeamConfig, CoreError> {
        self.scrunch(fscrunch, tscrunch)?;
        let antennas = self.antennas(antennas_csv)?;
        Ok(IncoherentBeamConfig {
            antennas,
            fscrunch,
            tscrunch,
        })
    }

    fn scrunch(&self, fscrunch: u32, tscrunch: u32) -> Result<(), CoreError> {
        if fscrunch == 0 || tscrunch == 0 {
            return Err(CoreError::invalid(format!(
                "fscrunch and tscrunch must be positive (got {fscrunch}, {tscrunch})"
            )));
        }
        if self.total_channels % fscrunch != 0 {
            return Err(CoreError::invalid(format!(
                "fscrunch {fscrunch} does not divide {} channels",
                self.total_channels
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn subarray() -> Vec<Antenna> {
        parse_antenna_csv("m007,m008,m009,m010").unwrap()
    }

    #[test]
    fn valid_coherent_config() {
        let sub = subarray();
        let v = BeamValidator::new(&sub, 4096);
        let cfg = v.coherent(100, "m007,m008", 2, 6, 8).unwrap();
        assert_eq!(cfg.nbeams(), 100);
        assert_eq!(cfg.antennas_csv(), "m007,m008");
        assert_eq!(cfg.ngroups(), 13);
    }

    #[test]
    fn ngroups_rounds_up() {
        let sub = subarray();
        let v = BeamValidator::new(&sub, 4096);
        assert_eq!(v.coherent(100, "m007", 1, 16, 6).unwrap().ngroups(), 17);
        assert_eq!(v.coherent(96, "m007", 1, 16, 6).unwrap().ngroups(), 16);
        assert_eq!(v.coherent(1, "m007", 1, 16, 6).unwrap().ngroups(), 1);
    }

    #[test]
    fn rejects_invalid_antenna_sets() {
        let sub = subarray();
        let v = BeamValidator::new(&sub, 4096);
        for csv in ["m007,m008,m011", "m007,m008,m009,m010,m011", "", "m007,m007,m008,m009"] {
            assert!(
                matches!(v.coherent(100, csv, 1, 16, 8), Err(CoreError::InvalidAntennas { .. })),
                "{csv:?} should be rejected"
            );
            assert!(v.incoherent(csv, 1, 16).is_err(), "{csv:?} should be rejected");
        }
    }

    #[test]
    fn rejects_bad_scrunch_factors() {
        let sub = subarray();
        let v = BeamValidator::new(&sub, 4096);
        assert!(v.incoherent("m007", 0, 16).is_err());
        assert!(v.incoherent("m007", 1, 0).is_err());
        assert!(v.incoherent("m007", 3, 16).is_err());
        assert!(v.incoherent("m007", 4, 16).is_ok());
    }

    #[test]
    fn rejects_zero_beams_or_granularity() {
        let sub = subarray();
        let v = BeamValidator::new(&sub, 4096);
        assert!(v.coherent(0, "m007", 1, 16, 8).is_err());
        assert!(v.coherent(10, "m007", 1, 16, 0).is_err());
    }
}
