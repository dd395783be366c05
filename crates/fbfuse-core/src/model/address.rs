use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

const SCHEME: &str = "spead://";

/// `count` consecutive IPv4 addresses sharing one UDP port.
///
/// The text form follows the SPEAD stream convention used throughout the
/// telescope: `spead://239.11.1.0+15:7147` names sixteen addresses
/// starting at `239.11.1.0`, and `spead://239.11.1.0:7147` names one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AddressRange {
    base: Ipv4Addr,
    port: u16,
    count: u32,
}

impl AddressRange {
    /// `spead://239.11.1.0+255:7147`, the default beamformer output block.
    pub const DEFAULT_OUTPUT: Self = Self {
        base: Ipv4Addr::new(239, 11, 1, 0),
        port: 7147,
        count: 256,
    };

    pub fn new(base: Ipv4Addr, port: u16, count: u32) -> Result<Self, CoreError> {
        if count == 0 {
            return Err(CoreError::invalid("address range must contain at least one address"));
        }
        u32::from(base).checked_add(count - 1).ok_or_else(|| {
            CoreError::invalid(format!("address range {base}+{} overflows IPv4 space", count - 1))
        })?;
        Ok(Self { base, port, count })
    }

    pub fn base(&self) -> Ipv4Addr {
        self.base
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    /// The last address in the range (inclusive).
    pub fn last(&self) -> Ipv4Addr {
        Ipv4Addr::from(u32::from(self.base) + (self.count - 1))
    }

    /// Address at `index`, if inside the range.
    pub fn address(&self, index: u32) -> Option<Ipv4Addr> {
        (index < self.count).then(|| Ipv4Addr::from(u32::from(self.base) + index))
    }

    /// Iterate every address in the range in ascending order.
    pub fn addresses(&self) -> impl Iterator<Item = Ipv4Addr> + '_ {
        (0..self.count).filter_map(|i| self.address(i))
    }

    /// A contiguous slice of this range starting `offset` addresses in.
    pub fn sub_range(&self, offset: u32, count: u32) -> Result<Self, CoreError> {
        let inside = offset
            .checked_add(count)
            .is_some_and(|end| end <= self.count);
        if !inside {
            return Err(CoreError::invalid(format!(
                "sub-range {offset}+{count} lies outside {self}"
            )));
        }
        Self::new(
            Ipv4Addr::from(u32::from(self.base) + offset),
            self.port,
            count,
        )
    }

    /// Offset of `other`'s base address relative to this range's base.
    pub fn offset_of(&self, other: &Self) -> Option<u32> {
        u32::from(other.base).checked_sub(u32::from(self.base))
    }

    pub fn overlaps(&self, other: &Self) -> bool {
        let (a0, a1) = (u32::from(self.base), u32::from(self.last()));
        let (b0, b1) = (u32::from(other.base), u32::from(other.last()));
        a0 <= b1 && b0 <= a1
    }

    pub fn contains(&self, other: &Self) -> bool {
        u32::from(self.base) <= u32::from(other.base)
            && u32::from(other.last()) <= u32::from(self.last())
    }

    /// `true` if every address in the range is an IPv4 multicast address.
    pub fn is_multicast(&self) -> bool {
        self.base.is_multicast() && self.last().is_multicast()
    }
}

impl fmt::Display for AddressRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.count == 1 {
            write!(f, "{SCHEME}{}:{}", self.base, self.port)
        } else {
            write!(f, "{SCHEME}{}+{}:{}", self.base, self.count - 1, self.port)
        }
    }
}

impl FromStr for AddressRange {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = |reason: &str| CoreError::invalid(format!("malformed address range '{s}': {reason}"));

        let body = s.trim().strip_prefix(SCHEME).unwrap_or_else(|| s.trim());
        let (addr_part, port_part) = body.rsplit_once(':').ok_or_else(|| bad("missing port"))?;
        let port: u16 = port_part.parse().map_err(|_| bad("invalid port"))?;

        let (base_part, extra) = match addr_part.split_once('+') {
            Some((base, extra)) => (
                base,
                extra.parse::<u32>().map_err(|_| bad("invalid address count"))?,
            ),
            None => (addr_part, 0),
        };
        let base: Ipv4Addr = base_part.parse().map_err(|_| bad("invalid IPv4 address"))?;
        let count = extra.checked_add(1).ok_or_else(|| bad("address count too large"))?;

        Self::new(base, port, count)
    }
}

impl TryFrom<String> for AddressRange {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<AddressRange> for String {
    fn from(value: AddressRange) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn parse_spead_range() {
        let range: AddressRange = "spead://239.2.1.150+15:7148".parse().unwrap();
        assert_eq!(range.base(), Ipv4Addr::new(239, 2, 1, 150));
        assert_eq!(range.count(), 16);
        assert_eq!(range.port(), 7148);
        assert_eq!(range.last(), Ipv4Addr::new(239, 2, 1, 165));
        assert!(range.is_multicast());
    }

    #[test]
    fn single_address_has_no_plus() {
        let range = AddressRange::new(Ipv4Addr::new(239, 11, 1, 0), 7147, 1).unwrap();
        assert_eq!(range.to_string(), "spead://239.11.1.0:7147");
        let back: AddressRange = range.to_string().parse().unwrap();
        assert_eq!(back, range);
    }

    #[test]
    fn display_uses_inclusive_offset() {
        let range = AddressRange::new(Ipv4Addr::new(239, 11, 1, 1), 7147, 17).unwrap();
        assert_eq!(range.to_string(), "spead://239.11.1.1+16:7147");
    }

    #[test]
    fn scheme_is_optional_when_parsing() {
        let range: AddressRange = "239.11.1.0+3:7147".parse().unwrap();
        assert_eq!(range.count(), 4);
    }

    #[test]
    fn rejects_malformed_text() {
        for bad in ["spead://239.11.1.0", "spead://239.11.1.0+x:1", "spead://nope:1", "spead://1.2.3.4:99999"] {
            assert!(bad.parse::<AddressRange>().is_err(), "{bad} should not parse");
        }
    }

    #[test]
    fn rejects_zero_and_overflowing_ranges() {
        assert!(AddressRange::new(Ipv4Addr::new(239, 0, 0, 0), 1, 0).is_err());
        assert!(AddressRange::new(Ipv4Addr::new(255, 255, 255, 255), 1, 2).is_err());
    }

    #[test]
    fn sub_range_and_overlap() {
        let master: AddressRange = "spead://239.11.1.0+255:7147".parse().unwrap();
        let a = master.sub_range(0, 1).unwrap();
        let b = master.sub_range(1, 17).unwrap();
        assert!(!a.overlaps(&b));
        assert!(master.contains(&b));
        assert_eq!(master.offset_of(&b), Some(1));
        assert!(master.sub_range(250, 10).is_err());
        assert!(b.overlaps(&master.sub_range(17, 2).unwrap()));
    }

    #[test]
    fn unicast_range_is_not_multicast() {
        let range: AddressRange = "10.0.0.1+3:7147".parse().unwrap();
        assert!(!range.is_multicast());
    }
}
