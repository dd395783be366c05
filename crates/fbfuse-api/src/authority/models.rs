use serde::{Deserialize, Serialize};

/// Schedule-block level beam configuration served by the authority.
///
/// Every field is optional: the authority only sends what it wants to
/// override, and the product fills the gaps from its local defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SubarrayConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coherent_beams_nbeams: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coherent_beams_tscrunch: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coherent_beams_fscrunch: Option<u32>,
    /// Comma-separated antenna list.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coherent_beams_antennas: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coherent_beams_granularity: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub incoherent_beam_tscrunch: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub incoherent_beam_fscrunch: Option<u32>,
    /// Comma-separated antenna list.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub incoherent_beam_antennas: Option<String>,
}

impl SubarrayConfig {
    /// Overlay `other` on top of `self`: every field `other` sets wins.
    pub fn merged_with(&self, other: &Self) -> Self {
        Self {
            coherent_beams_nbeams: other.coherent_beams_nbeams.or(self.coherent_beams_nbeams),
            coherent_beams_tscrunch: other
                .coherent_beams_tscrunch
                .or(self.coherent_beams_tscrunch),
            coherent_beams_fscrunch: other
                .coherent_beams_fscrunch
                .or(self.coherent_beams_fscrunch),
            coherent_beams_antennas: other
                .coherent_beams_antennas
                .clone()
                .or_else(|| self.coherent_beams_antennas.clone()),
            coherent_beams_granularity: other
                .coherent_beams_granularity
                .or(self.coherent_beams_granularity),
            incoherent_beam_tscrunch: other
                .incoherent_beam_tscrunch
                .or(self.incoherent_beam_tscrunch),
            incoherent_beam_fscrunch: other
                .incoherent_beam_fscrunch
                .or(self.incoherent_beam_fscrunch),
            incoherent_beam_antennas: other
                .incoherent_beam_antennas
                .clone()
                .or_else(|| self.incoherent_beam_antennas.clone()),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Target-level configuration: one pointing descriptor per coherent beam,
/// in slot order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetConfig {
    #[serde(default)]
    pub beams: Vec<String>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn deserialize_kebab_case_keys() {
        let json = r#"{
            "coherent-beams-nbeams": 100,
            "coherent-beams-tscrunch": 22,
            "coherent-beams-fscrunch": 2,
            "coherent-beams-antennas": "m007",
            "coherent-beams-granularity": 6,
            "incoherent-beam-tscrunch": 16,
            "incoherent-beam-fscrunch": 1,
            "incoherent-beam-antennas": "m008"
        }"#;
        let cfg: SubarrayConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.coherent_beams_nbeams, Some(100));
        assert_eq!(cfg.coherent_beams_granularity, Some(6));
        assert_eq!(cfg.incoherent_beam_antennas.as_deref(), Some("m008"));
    }

    #[test]
    fn empty_object_is_empty_config() {
        let cfg: SubarrayConfig = serde_json::from_str("{}").unwrap();
        assert!(cfg.is_empty());
    }

    #[test]
    fn merge_prefers_overlay() {
        let base = SubarrayConfig {
            coherent_beams_nbeams: Some(400),
            coherent_beams_tscrunch: Some(16),
            ..SubarrayConfig::default()
        };
        let overlay = SubarrayConfig {
            coherent_beams_nbeams: Some(100),
            incoherent_beam_antennas: Some("m008".into()),
            ..SubarrayConfig::default()
        };
        let merged = base.merged_with(&overlay);
        assert_eq!(merged.coherent_beams_nbeams, Some(100));
        assert_eq!(merged.coherent_beams_tscrunch, Some(16));
        assert_eq!(merged.incoherent_beam_antennas.as_deref(), Some("m008"));
    }

    #[test]
    fn target_config_defaults_to_no_beams() {
        let cfg: TargetConfig = serde_json::from_str("{}").unwrap();
        assert!(cfg.beams.is_empty());
    }
}
