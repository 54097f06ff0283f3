//! AIS message decoding.
//!
//! Input lines are AISStream JSON envelopes:
//!
//! ```json
//! {
//!   "MessageType": "PositionReport",
//!   "MetaData": { "MMSI": 244123456, "ShipName": "EXCELSIOR ", "time_utc": "2024-06-01 12:00:00.5 +0000 UTC" },
//!   "Message": { "PositionReport": { "Latitude": 52.1, "Longitude": 4.2, "Sog": 11.5, "Cog": 87.0, "TrueHeading": 511 } }
//! }
//! ```
//!
//! Only `PositionReport` and `ShipStaticData` are decoded; every other
//! message type is skipped.

use chrono::{DateTime, Utc};
use encounter_core::{AisEvent, PositionReport, StaticReport};
use serde::Deserialize;
use thiserror::Error;

/// AIS heading value meaning "not available"
pub const HEADING_NOT_AVAILABLE: f64 = 511.0;

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Malformed AIS message: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0} message without a {0} body")]
    MissingBody(String),
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "MessageType", default)]
    message_type: String,
    #[serde(rename = "MetaData")]
    meta: MetaData,
    #[serde(rename = "Message", default)]
    message: Body,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Mmsi {
    Number(u64),
    Text(String),
}

impl Mmsi {
    fn into_string(self) -> String {
        match self {
            Mmsi::Number(n) => n.to_string(),
            Mmsi::Text(s) => s.trim().to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct MetaData {
    #[serde(rename = "MMSI")]
    mmsi: Mmsi,
    #[serde(rename = "ShipName", default)]
    ship_name: Option<String>,
    #[serde(default)]
    time_utc: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Body {
    #[serde(rename = "PositionReport")]
    position_report: Option<AisPosition>,
    #[serde(rename = "ShipStaticData")]
    ship_static_data: Option<AisStatic>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AisPosition {
    latitude: f64,
    longitude: f64,
    #[serde(default)]
    sog: f64,
    #[serde(default)]
    cog: f64,
    #[serde(default)]
    true_heading: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AisStatic {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    r#type: Option<u32>,
    #[serde(default)]
    dimension: Option<Dimension>,
}

/// Distances from the reference point to bow, stern, port and starboard
#[derive(Debug, Default, Deserialize)]
struct Dimension {
    #[serde(rename = "A", default)]
    a: f64,
    #[serde(rename = "B", default)]
    b: f64,
    #[serde(rename = "C", default)]
    c: f64,
    #[serde(rename = "D", default)]
    d: f64,
}

/// Decode one message
///
/// Returns `Ok(None)` for message types that carry nothing the engine uses.
/// `received_at` stands in for the report time when the message has none.
pub fn decode(line: &str, received_at: DateTime<Utc>) -> Result<Option<AisEvent>, DecodeError> {
    let envelope: Envelope = serde_json::from_str(line)?;
    let Envelope {
        message_type,
        meta,
        message,
    } = envelope;

    match message_type.as_str() {
        "PositionReport" => {
            let report = message
                .position_report
                .ok_or_else(|| DecodeError::MissingBody(message_type.clone()))?;
            let timestamp = meta
                .time_utc
                .as_deref()
                .and_then(parse_time_utc)
                .unwrap_or(received_at);

            Ok(Some(AisEvent::Position(PositionReport {
                mmsi: meta.mmsi.into_string(),
                timestamp,
                lat: report.latitude,
                lon: report.longitude,
                sog: report.sog,
                cog: report.cog,
                heading: report
                    .true_heading
                    .filter(|h| *h != HEADING_NOT_AVAILABLE && (0.0..360.0).contains(h)),
                name: trimmed(meta.ship_name),
            })))
        }
        "ShipStaticData" => {
            let data = message
                .ship_static_data
                .ok_or_else(|| DecodeError::MissingBody(message_type.clone()))?;
            let dimension = data.dimension.unwrap_or_default();

            Ok(Some(AisEvent::Static(StaticReport {
                mmsi: meta.mmsi.into_string(),
                name: trimmed(data.name).or_else(|| trimmed(meta.ship_name)),
                // Type 0 means "not available"
                ship_type: data
                    .r#type
                    .filter(|t| *t != 0)
                    .and_then(|t| u8::try_from(t).ok()),
                length: positive(dimension.a + dimension.b),
                width: positive(dimension.c + dimension.d),
            })))
        }
        _ => Ok(None),
    }
}

/// Parse `2024-06-01 12:00:00.123456 +0000 UTC` or RFC 3339
pub fn parse_time_utc(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(time) = DateTime::parse_from_rfc3339(text) {
        return Some(time.with_timezone(&Utc));
    }
    let text = text.strip_suffix("UTC").unwrap_or(text).trim_end();
    DateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f %z")
        .ok()
        .map(|time| time.with_timezone(&Utc))
}

fn trimmed(name: Option<String>) -> Option<String> {
    name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty())
}

fn positive(value: f64) -> Option<f64> {
    (value.is_finite() && value > 0.0).then_some(value)
}
