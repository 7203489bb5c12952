/**
 * FLEET STATE STORE - État autoritaire de la flotte
 *
 * RÔLE : Mapping robot_id → dernier record connu. Seul apply() écrit les
 * records, seul mark_stale() écrit le flag stale (staleness monitor).
 *
 * ARCHITECTURE : Merge-by-id (un frame partiel ne fait pas disparaître les
 * robots absents du frame). Les snapshots plus vieux que l'état stocké sont
 * ignorés et comptés, jamais appliqués. Un write lock couvre le batch
 * entier : un snapshot() ne voit jamais un batch à moitié appliqué.
 */

use crate::models::{FleetMap, RobotRecord};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::hash_map::Entry;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

pub struct FleetStore {
    robots: RwLock<FleetMap>,
    applied: AtomicU64,
    out_of_order: AtomicU64,
    entries_dropped: AtomicU64,
}

/// Compteurs du store, exposés via /system/health.
#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    pub robots_tracked: u64,
    pub snapshots_applied: u64,
    pub out_of_order_ignored: u64,
    pub entries_dropped: u64,
}

impl FleetStore {
    pub fn new() -> Self {
        Self {
            robots: RwLock::new(FleetMap::new()),
            applied: AtomicU64::new(0),
            out_of_order: AtomicU64::new(0),
            entries_dropped: AtomicU64::new(0),
        }
    }

    /// Applique un batch de records décodés (merge-by-id).
    pub fn apply(&self, records: Vec<RobotRecord>) {
        let mut map = self.robots.write();
        for mut rec in records {
            match map.entry(rec.robot_id.clone()) {
                Entry::Occupied(mut entry) => {
                    let existing = entry.get_mut();
                    if rec.last_updated < existing.last_updated {
                        self.out_of_order.fetch_add(1, Ordering::Relaxed);
                        eprintln!(
                            "[store] snapshot out-of-order ignoré pour {} ({} < {})",
                            rec.robot_id, rec.last_updated, existing.last_updated
                        );
                        continue;
                    }
                    if rec.last_updated == existing.last_updated {
                        // Doublon exact : idempotent, rien à faire.
                        continue;
                    }
                    // Le flag stale reste la propriété du monitor.
                    rec.stale = existing.stale;
                    *existing = rec;
                    self.applied.fetch_add(1, Ordering::Relaxed);
                }
                Entry::Vacant(entry) => {
                    entry.insert(rec);
                    self.applied.fetch_add(1, Ordering::Relaxed);
                }
            }
        }
    }

    /// Vue cohérente de la flotte (copie, jamais un batch à moitié appliqué).
    pub fn snapshot(&self) -> FleetMap {
        self.robots.read().clone()
    }

    pub fn get(&self, robot_id: &str) -> Option<RobotRecord> {
        self.robots.read().get(robot_id).cloned()
    }

    pub fn mark_stale(&self, robot_id: &str, stale: bool) {
        if let Some(rec) = self.robots.write().get_mut(robot_id) {
            rec.stale = stale;
        }
    }

    pub fn len(&self) -> usize {
        self.robots.read().len()
    }

    /// Comptabilise des entrées droppées par le décodeur (observabilité).
    pub fn note_dropped_entries(&self, count: usize) {
        self.entries_dropped.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            robots_tracked: self.robots.read().len() as u64,
            snapshots_applied: self.applied.load(Ordering::Relaxed),
            out_of_order_ignored: self.out_of_order.load(Ordering::Relaxed),
            entries_dropped: self.entries_dropped.load(Ordering::Relaxed),
        }
    }
}

impl Default for FleetStore {
    fn default() -> Self {
        Self::new()
    }
}

pub type SharedFleetStore = Arc<FleetStore>;

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;
    use time::OffsetDateTime;

    fn rec(id: &str, battery: f64, ts: OffsetDateTime) -> RobotRecord {
        RobotRecord {
            robot_id: id.into(),
            online: true,
            battery_percent: battery,
            cpu_percent: 50.0,
            ram_mb: 1024.0,
            location: (48.85, 2.35),
            last_updated: ts,
            stale: false,
        }
    }

    #[test]
    fn keeps_one_record_per_id_with_max_timestamp() {
        let store = FleetStore::new();
        let t0 = datetime!(2025-01-15 10:00:00 UTC);
        let t1 = datetime!(2025-01-15 10:00:05 UTC);
        let t2 = datetime!(2025-01-15 10:00:10 UTC);

        store.apply(vec![rec("r1", 90.0, t0), rec("r2", 80.0, t0)]);
        store.apply(vec![rec("r1", 85.0, t2)]);
        store.apply(vec![rec("r1", 88.0, t1)]); // plus vieux que t2

        let snap = store.snapshot();
        assert_eq!(snap.len(), 2);
        assert_eq!(snap["r1"].last_updated, t2);
        assert_eq!(snap["r1"].battery_percent, 85.0);
        assert_eq!(snap["r2"].last_updated, t0);
    }

    #[test]
    fn out_of_order_is_noop_and_counted() {
        let store = FleetStore::new();
        let newer = datetime!(2025-01-15 10:00:10 UTC);
        let older = datetime!(2025-01-15 10:00:00 UTC);

        store.apply(vec![rec("r1", 15.0, newer)]);
        let before = store.snapshot();

        store.apply(vec![rec("r1", 15.0, older)]);
        let after = store.snapshot();

        assert_eq!(before["r1"], after["r1"]);
        assert_eq!(store.stats().out_of_order_ignored, 1);
    }

    #[test]
    fn same_timestamp_reapply_is_idempotent() {
        let store = FleetStore::new();
        let t = datetime!(2025-01-15 10:00:00 UTC);

        store.apply(vec![rec("r1", 42.0, t)]);
        let applied_once = store.stats().snapshots_applied;
        store.apply(vec![rec("r1", 42.0, t)]);

        assert_eq!(store.stats().snapshots_applied, applied_once);
        assert_eq!(store.stats().out_of_order_ignored, 0);
        assert_eq!(store.snapshot()["r1"].battery_percent, 42.0);
    }

    #[test]
    fn update_preserves_stale_flag_for_monitor() {
        let store = FleetStore::new();
        let t0 = datetime!(2025-01-15 10:00:00 UTC);
        let t1 = datetime!(2025-01-15 10:00:05 UTC);

        store.apply(vec![rec("r1", 90.0, t0)]);
        store.mark_stale("r1", true);
        store.apply(vec![rec("r1", 89.0, t1)]);

        // Le décodeur produit stale=false mais n'a pas le droit de
        // dé-staler un record : seul le prochain tick du monitor le fera.
        assert!(store.snapshot()["r1"].stale);
    }

    #[test]
    fn mark_stale_unknown_id_is_noop() {
        let store = FleetStore::new();
        store.mark_stale("fantome", true);
        assert_eq!(store.len(), 0);
    }
}
