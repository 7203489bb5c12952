use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use time::OffsetDateTime;

/// Dernier état connu d'un robot (clé : `robot_id`).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RobotRecord {
    pub robot_id: String,
    pub online: bool,
    pub battery_percent: f64,
    pub cpu_percent: f64,
    pub ram_mb: f64,
    /// (latitude, longitude)
    pub location: (f64, f64),
    #[serde(with = "time::serde::rfc3339")]
    pub last_updated: OffsetDateTime,
    /// Dérivé par le staleness monitor, jamais par le décodeur.
    pub stale: bool,
}

pub type FleetMap = HashMap<String, RobotRecord>;

/// Filtre opérateur — ensemble fermé, évalué à chaque lecture.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FilterPredicate {
    All,
    OnlineOnly,
    OfflineOnly,
    LowBattery { threshold: f64 },
}

impl Default for FilterPredicate {
    fn default() -> Self {
        FilterPredicate::All
    }
}

/// État de la connexion au flux amont, exposé au front pour l'indicateur.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
    #[serde(rename = "shutdown")]
    ShutDown,
}
