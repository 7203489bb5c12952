use crate::models::ConnectionStatus;
use crate::store::{SharedFleetStore, StoreStats};
use serde::Serialize;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Santé du backend dashboard, servie sur /system/health.
#[derive(Debug, Serialize)]
pub struct KernelHealth {
    pub uptime_seconds: u64,
    pub connection_status: ConnectionStatus,
    pub reconnect_attempts: u32,
    pub malformed_frames: u64,
    #[serde(flatten)]
    pub store: StoreStats,
}

/// Suivi de la connexion au flux amont, partagé entre feed et API.
#[derive(Clone)]
pub struct FeedHealth {
    start_time: Instant,
    status: Arc<parking_lot::Mutex<ConnectionStatus>>,
    reconnects: Arc<AtomicU32>,
    malformed_frames: Arc<AtomicU64>,
}

impl FeedHealth {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            status: Arc::new(parking_lot::Mutex::new(ConnectionStatus::Disconnected)),
            reconnects: Arc::new(AtomicU32::new(0)),
            malformed_frames: Arc::new(AtomicU64::new(0)),
        }
    }

    /// ShutDown est terminal : une tentative de connexion encore en vol qui
    /// aboutit après l'arrêt ne doit pas réanimer le statut.
    pub fn set_status(&self, status: ConnectionStatus) {
        let mut current = self.status.lock();
        if *current == ConnectionStatus::ShutDown && status != ConnectionStatus::ShutDown {
            return;
        }
        *current = status;
    }

    pub fn status(&self) -> ConnectionStatus {
        *self.status.lock()
    }

    pub fn increment_reconnects(&self) {
        self.reconnects.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_malformed(&self) {
        self.malformed_frames.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_health(&self, store: &SharedFleetStore) -> KernelHealth {
        KernelHealth {
            uptime_seconds: self.start_time.elapsed().as_secs(),
            connection_status: self.status(),
            reconnect_attempts: self.reconnects.load(Ordering::Relaxed),
            malformed_frames: self.malformed_frames.load(Ordering::Relaxed),
            store: store.stats(),
        }
    }
}

impl Default for FeedHealth {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shutdown_status_is_terminal() {
        let health = FeedHealth::new();
        health.set_status(ConnectionStatus::Connecting);
        assert_eq!(health.status(), ConnectionStatus::Connecting);

        health.set_status(ConnectionStatus::ShutDown);
        // Un connect en vol qui aboutit après l'arrêt est ignoré.
        health.set_status(ConnectionStatus::Connected);
        assert_eq!(health.status(), ConnectionStatus::ShutDown);
    }
}
