use indexmap::IndexMap;
use serde_json::Value;

use super::address::AddressRange;
use crate::error::CoreError;

const CAM_HTTP: &str = "cam.http";
const FENG_STREAMS: &str = "cbf.antenna_channelised_voltage";

/// The stream families handed over at `configure` time.
///
/// Only two families matter to the control plane: the CAM HTTP endpoint
/// and the F-engine channelised-voltage multicast groups. Everything else
/// is kept verbatim so it can be forwarded to workers unchanged.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamDescriptors {
    camdata: String,
    feng_stream: String,
    feng_groups: AddressRange,
    raw: IndexMap<String, Value>,
}

impl StreamDescriptors {
    pub fn parse(json: &str) -> Result<Self, CoreError> {
        let bad = |reason: String| CoreError::invalid(format!("invalid streams JSON: {reason}"));

        let raw: IndexMap<String, Value> =
            serde_json::from_str(json).map_err(|e| bad(e.to_string()))?;

        let camdata = first_string_entry(&raw, CAM_HTTP)
            .map_err(bad)?
            .1
            .to_string();

        let (feng_stream, feng_uri) = first_string_entry(&raw, FENG_STREAMS).map_err(bad)?;
        let feng_groups: AddressRange = feng_uri.parse()?;

        Ok(Self {
            camdata,
            feng_stream: feng_stream.to_string(),
            feng_groups,
            raw,
        })
    }

    /// CAM data URL (first entry of `cam.http`).
    pub fn camdata(&self) -> &str {
        &self.camdata
    }

    /// Name of the F-engine stream, e.g. `i0.antenna-channelised-voltage`.
    pub fn feng_stream(&self) -> &str {
        &self.feng_stream
    }

    pub fn feng_groups(&self) -> AddressRange {
        self.feng_groups
    }

    /// The full stream map as received.
    pub fn raw(&self) -> &IndexMap<String, Value> {
        &self.raw
    }
}

fn first_string_entry<'a>(
    raw: &'a IndexMap<String, Value>,
    family: &str,
) -> Result<(&'a str, &'a str), String> {
    let entries = raw
        .get(family)
        .and_then(Value::as_object)
        .ok_or_else(|| format!("missing '{family}' stream family"))?;
    let (name, value) = entries
        .iter()
        .next()
        .ok_or_else(|| format!("'{family}' has no streams"))?;
    let value = value
        .as_str()
        .ok_or_else(|| format!("'{family}.{name}' is not a string"))?;
    Ok((name.as_str(), value))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const STREAMS: &str = r#"{"cam.http": {"camdata": "http://10.8.67.235/api/client/1"},
        "cbf.antenna_channelised_voltage": {"i0.antenna-channelised-voltage": "spead://239.2.1.150+15:7148"}}"#;

    #[test]
    fn parse_default_streams() {
        let s = StreamDescriptors::parse(STREAMS).unwrap();
        assert_eq!(s.camdata(), "http://10.8.67.235/api/client/1");
        assert_eq!(s.feng_stream(), "i0.antenna-channelised-voltage");
        assert_eq!(s.feng_groups().count(), 16);
        assert_eq!(s.raw().len(), 2);
    }

    #[test]
    fn empty_object_is_rejected() {
        assert!(StreamDescriptors::parse("{}").is_err());
    }

    #[test]
    fn missing_feng_family_is_rejected() {
        let json = r#"{"cam.http": {"camdata": "http://x"}}"#;
        let err = StreamDescriptors::parse(json).unwrap_err();
        assert!(err.to_string().contains("cbf.antenna_channelised_voltage"));
    }

    #[test]
    fn bad_multicast_uri_is_rejected() {
        let json = r#"{"cam.http": {"camdata": "http://x"},
            "cbf.antenna_channelised_voltage": {"i0": "not-a-range"}}"#;
        assert!(StreamDescriptors::parse(json).is_err());
    }

    #[test]
    fn non_json_is_rejected() {
        assert!(StreamDescriptors::parse("streams").is_err());
    }
}
