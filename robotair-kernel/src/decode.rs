/**
 * SNAPSHOT DECODER - Validation et normalisation des trames amont
 *
 * RÔLE :
 * Transforme une trame texte du flux (tableau JSON d'entrées robots,
 * champs historiques "Robot ID", "Battery Percentage"...) en records
 * typés, sans accès stringly-typed côté consommateurs.
 *
 * FONCTIONNEMENT :
 * - Trame non-JSON ou non-tableau → MalformedPayload (trame entière rejetée)
 * - Entrée invalide (id/localisation manquants, types faux) → droppée et
 *   comptée, les entrées sœurs valides passent quand même
 * - "Last Updated" accepté en epoch millis, RFC 3339, ou le format
 *   "YYYY-MM-DD hh:mm:ss" du backend historique (interprété UTC)
 * - Battery/CPU bornés à [0,100], RAM à ≥ 0 (l'amont ne garantit rien)
 */

use crate::models::RobotRecord;
use serde::Deserialize;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime};

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("malformed payload: {0}")]
    MalformedPayload(#[from] serde_json::Error),
    #[error("invalid entry: {0}")]
    InvalidEntry(String),
}

/// Résultat d'un décodage : records valides + compteur d'entrées droppées.
#[derive(Debug)]
pub struct DecodedSnapshot {
    pub records: Vec<RobotRecord>,
    pub dropped: usize,
}

/// Entrée au format du flux amont (clés avec espaces, héritées du backend).
#[derive(Debug, Deserialize)]
struct WireEntry {
    #[serde(rename = "Robot ID")]
    robot_id: String,
    #[serde(rename = "Online/Offline")]
    online: bool,
    #[serde(rename = "Battery Percentage")]
    battery: f64,
    #[serde(rename = "CPU Usage")]
    cpu: f64,
    #[serde(rename = "RAM Consumption")]
    ram: f64,
    #[serde(rename = "Location Coordinates")]
    location: [f64; 2],
    #[serde(rename = "Last Updated")]
    last_updated: serde_json::Value,
}

pub fn decode(raw: &str) -> Result<DecodedSnapshot, DecodeError> {
    let entries: Vec<serde_json::Value> = serde_json::from_str(raw)?;

    let mut records = Vec::with_capacity(entries.len());
    let mut dropped = 0usize;

    for entry in entries {
        match decode_entry(entry) {
            Ok(rec) => records.push(rec),
            Err(e) => {
                eprintln!("[decode] {e}");
                dropped += 1;
            }
        }
    }

    Ok(DecodedSnapshot { records, dropped })
}

fn decode_entry(entry: serde_json::Value) -> Result<RobotRecord, DecodeError> {
    let wire: WireEntry = serde_json::from_value(entry)
        .map_err(|e| DecodeError::InvalidEntry(e.to_string()))?;

    let last_updated = parse_timestamp(&wire.last_updated)?;

    Ok(RobotRecord {
        robot_id: wire.robot_id,
        online: wire.online,
        battery_percent: wire.battery.clamp(0.0, 100.0),
        cpu_percent: wire.cpu.clamp(0.0, 100.0),
        ram_mb: wire.ram.max(0.0),
        location: (wire.location[0], wire.location[1]),
        last_updated,
        stale: false,
    })
}

/// Parse "Last Updated" : epoch millis, RFC 3339, ou format backend legacy.
fn parse_timestamp(value: &serde_json::Value) -> Result<OffsetDateTime, DecodeError> {
    match value {
        serde_json::Value::Number(n) => {
            let millis = n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f as i64))
                .ok_or_else(|| DecodeError::InvalidEntry(format!("timestamp illisible: {n}")))?;
            OffsetDateTime::from_unix_timestamp_nanos(millis as i128 * 1_000_000)
                .map_err(|e| DecodeError::InvalidEntry(format!("timestamp hors plage: {e}")))
        }
        serde_json::Value::String(s) => {
            if let Ok(ts) = OffsetDateTime::parse(s, &Rfc3339) {
                return Ok(ts);
            }
            let legacy = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
            PrimitiveDateTime::parse(s, &legacy)
                .map(|dt| dt.assume_utc())
                .map_err(|_| DecodeError::InvalidEntry(format!("timestamp illisible: {s}")))
        }
        other => Err(DecodeError::InvalidEntry(format!("timestamp illisible: {other}"))),
    }
}
