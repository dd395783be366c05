use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Sky or horizon coordinates of a pointing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "frame", rename_all = "lowercase")]
pub enum Coordinates {
    /// Right ascension in hours, declination in degrees.
    RaDec { ra_hours: f64, dec_deg: f64 },
    /// Azimuth and elevation in degrees.
    AzEl { az_deg: f64, el_deg: f64 },
}

/// A named pointing, e.g. `J0437-4715, radec, 4:37:15.9, -47:15:09.1`.
///
/// The descriptor is four comma-separated fields: name, frame tag
/// (`radec` or `azel`), and two angles. Angles are either sexagesimal
/// (`H:M:S` for right ascension, `D:M:S` otherwise) or decimal values in
/// the same unit. [`Display`](fmt::Display) renders the canonical form
/// published on the per-beam sensors, so two descriptors that differ only
/// in spacing or precision render identically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Target {
    name: String,
    coordinates: Coordinates,
}

impl Target {
    pub fn new(name: impl Into<String>, coordinates: Coordinates) -> Self {
        Self {
            name: name.into(),
            coordinates,
        }
    }

    pub fn parse(descriptor: &str) -> Result<Self, CoreError> {
        let bad = |reason: &str| {
            CoreError::invalid(format!("malformed target '{descriptor}': {reason}"))
        };

        let fields: Vec<&str> = descriptor.split(',').map(str::trim).collect();
        let [name, frame, first, second] = fields.as_slice() else {
            return Err(bad("expected 'name, frame, angle, angle'"));
        };

        let coordinates = match frame.to_ascii_lowercase().as_str() {
            "radec" => {
                let ra_hours = parse_angle(first).ok_or_else(|| bad("invalid right ascension"))?;
                let dec_deg = parse_angle(second).ok_or_else(|| bad("invalid declination"))?;
                if !(0.0..24.0).contains(&ra_hours) {
                    return Err(bad("right ascension must lie in [0h, 24h)"));
                }
                if !(-90.0..=90.0).contains(&dec_deg) {
                    return Err(bad("declination must lie in [-90, 90] degrees"));
                }
                Coordinates::RaDec { ra_hours, dec_deg }
            }
            "azel" => {
                let az_deg = parse_angle(first).ok_or_else(|| bad("invalid azimuth"))?;
                let el_deg = parse_angle(second).ok_or_else(|| bad("invalid elevation"))?;
                if !(-360.0..360.0).contains(&az_deg) {
                    return Err(bad("azimuth must lie in (-360, 360) degrees"));
                }
                if !(-90.0..=90.0).contains(&el_deg) {
                    return Err(bad("elevation must lie in [-90, 90] degrees"));
                }
                Coordinates::AzEl {
                    az_deg: az_deg.rem_euclid(360.0),
                    el_deg,
                }
            }
            other => return Err(bad(&format!("unsupported frame '{other}'"))),
        };

        Ok(Self {
            name: (*name).to_string(),
            coordinates,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn coordinates(&self) -> Coordinates {
        self.coordinates
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.coordinates {
            Coordinates::RaDec { ra_hours, dec_deg } => write!(
                f,
                "{}, radec, {}, {}",
                self.name,
                sexagesimal(ra_hours, 2),
                sexagesimal(dec_deg, 1)
            ),
            Coordinates::AzEl { az_deg, el_deg } => write!(
                f,
                "{}, azel, {}, {}",
                self.name,
                sexagesimal(az_deg, 1),
                sexagesimal(el_deg, 1)
            ),
        }
    }
}

impl FromStr for Target {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

// ── Angle helpers ────────────────────────────────────────────────────

/// Parse `D:M:S`, `D:M` or a decimal value. The sign of the leading field
/// applies to the whole angle.
fn parse_angle(text: &str) -> Option<f64> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    if !text.contains(':') {
        return text.parse::<f64>().ok().filter(|v| v.is_finite());
    }

    let (negative, body) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };

    let parts: Vec<f64> = body
        .split(':')
        .map(|p| p.trim().parse::<f64>().ok().filter(|v| v.is_finite() && *v >= 0.0))
        .collect::<Option<_>>()?;

    let (whole, minutes, seconds) = match parts.as_slice() {
        [w, m] => (*w, *m, 0.0),
        [w, m, s] => (*w, *m, *s),
        _ => return None,
    };
    if minutes >= 60.0 || seconds >= 60.0 {
        return None;
    }

    let magnitude = whole + minutes / 60.0 + seconds / 3600.0;
    Some(if negative { -magnitude } else { magnitude })
}

/// Render a value as `[-]W:MM:SS.f…` with `decimals` fractional digits on
/// the seconds field, carrying rounding into the higher fields.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::as_conversions)]
fn sexagesimal(value: f64, decimals: u32) -> String {
    let scale = 10_u64.pow(decimals);
    let total = (value.abs() * 3600.0 * scale as f64).round() as u64;

    let frac = total % scale;
    let secs = (total / scale) % 60;
    let mins = (total / scale / 60) % 60;
    let whole = total / scale / 3600;

    let sign = if value < 0.0 && total > 0 { "-" } else { "" };
    let width = usize::try_from(decimals).unwrap_or(0);
    format!("{sign}{whole}:{mins:02}:{secs:02}.{frac:0width$}")
}
