// ── Sensors ──
//
// Named, typed, timestamped values published by the master and by every
// product. External callers only read them.

mod store;

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

pub use store::SensorStore;

/// The value carried by a sensor.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SensorValue {
    Integer(i64),
    Float(f64),
    String(String),
    List(Vec<String>),
}

impl fmt::Display for SensorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::String(v) => f.write_str(v),
            Self::List(items) => f.write_str(&items.join(",")),
        }
    }
}

impl From<i64> for SensorValue {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<u32> for SensorValue {
    fn from(v: u32) -> Self {
        Self::Integer(i64::from(v))
    }
}

impl From<f64> for SensorValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<String> for SensorValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<&str> for SensorValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<Vec<String>> for SensorValue {
    fn from(v: Vec<String>) -> Self {
        Self::List(v)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display, strum::EnumString)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SensorStatus {
    Nominal,
    Warning,
    Error,
    Unknown,
}

/// A point-in-time reading of one sensor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorReading {
    pub name: String,
    pub value: SensorValue,
    pub status: SensorStatus,
    pub updated_at: DateTime<Utc>,
}

impl SensorReading {
    pub fn nominal(name: impl Into<String>, value: impl Into<SensorValue>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            status: SensorStatus::Nominal,
            updated_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_forms() {
        assert_eq!(SensorValue::from(100_u32).to_string(), "100");
        assert_eq!(SensorValue::from(1.28e9).to_string(), "1280000000");
        assert_eq!(SensorValue::from("m007,m008").to_string(), "m007,m008");
        assert_eq!(
            SensorValue::from(vec!["a".to_string(), "b".to_string()]).to_string(),
            "a,b"
        );
    }

    #[test]
    fn status_is_lowercase() {
        assert_eq!(SensorStatus::Nominal.to_string(), "nominal");
        assert_eq!("error".parse::<SensorStatus>().ok(), Some(SensorStatus::Error));
    }
}
