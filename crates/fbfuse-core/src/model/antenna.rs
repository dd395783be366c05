use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// A receptor name such as `m007`.
///
/// Only the naming pattern is checked here (`m` or `M` followed by three
/// digits); whether the telescope actually has that antenna is a question
/// for the [`TelescopeMetadata`](crate::metadata::TelescopeMetadata) service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Antenna(String);

impl Antenna {
    pub fn parse(name: &str) -> Result<Self, CoreError> {
        let mut chars = name.chars();
        let prefix_ok = matches!(chars.next(), Some('m' | 'M'));
        let digits: Vec<char> = chars.collect();
        if prefix_ok && digits.len() == 3 && digits.iter().all(char::is_ascii_digit) {
            Ok(Self(name.to_string()))
        } else {
            Err(CoreError::InvalidAntennas {
                reason: format!("'{name}' is not a valid antenna name"),
            })
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Antenna {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Antenna {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Antenna {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Antenna> for String {
    fn from(value: Antenna) -> Self {
        value.0
    }
}

/// Parse a comma-separated antenna list, keeping order and duplicates.
///
/// Whitespace around names is ignored and an empty string yields an empty
/// list; set-level rules (non-empty, unique, subset) belong to the caller.
pub fn parse_antenna_csv(csv: &str) -> Result<Vec<Antenna>, CoreError> {
    csv.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(Antenna::parse)
        .collect()
}

/// Render antennas back into the comma-separated wire form.
pub fn format_antenna_csv(antennas: &[Antenna]) -> String {
    antennas
        .iter()
        .map(Antenna::as_str)
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn accepts_meerkat_names() {
        assert_eq!(Antenna::parse("m007").unwrap().as_str(), "m007");
        assert!(Antenna::parse("M063").is_ok());
    }

    #[test]
    fn rejects_other_names() {
        for bad in ["NotAnAntenna", "m07", "m0071", "x007", "m00a", ""] {
            assert!(Antenna::parse(bad).is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn csv_round_trip_keeps_order() {
        let list = parse_antenna_csv("m008, m007,m010").unwrap();
        assert_eq!(format_antenna_csv(&list), "m008,m007,m010");
    }

    #[test]
    fn empty_csv_is_empty_list() {
        assert!(parse_antenna_csv("").unwrap().is_empty());
    }

    #[test]
    fn csv_keeps_duplicates_for_caller() {
        let list = parse_antenna_csv("m007,m007").unwrap();
        assert_eq!(list.len(), 2);
    }
}
