/**
 * STALENESS MONITOR - Re-dérivation périodique du flag stale
 *
 * RÔLE : Toutes les interval_ms (5s par défaut), recalcule pour chaque
 * robot stale = (now - last_updated) > seuil et l'écrit via mark_stale.
 * Re-dérivation pure et idempotente : deux passes sur le même état donnent
 * le même résultat, et rien d'autre que `stale` n'est touché.
 */

use crate::config::MonitorConf;
use crate::store::SharedFleetStore;
use std::time::Duration;
use time::OffsetDateTime;
use tokio::sync::watch;
use tokio::task::JoinHandle;

pub fn is_stale(last_updated: OffsetDateTime, now: OffsetDateTime, threshold: Duration) -> bool {
    (now - last_updated) > threshold
}

/// Une passe complète : collecte sous read lock, marquage ensuite
/// (même découpage que les writes du feed, pas de lock tenu pendant le scan).
pub fn run_once(store: &SharedFleetStore, threshold: Duration) {
    let now = OffsetDateTime::now_utc();
    let flags: Vec<(String, bool)> = store
        .snapshot()
        .into_iter()
        .map(|(id, rec)| (id, is_stale(rec.last_updated, now, threshold)))
        .collect();

    for (id, stale) in flags {
        store.mark_stale(&id, stale);
    }
}

pub fn spawn_staleness_monitor(
    store: SharedFleetStore,
    conf: MonitorConf,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    println!(
        "[monitor] staleness monitor démarré (interval: {}ms, seuil: {}ms)",
        conf.interval_ms, conf.stale_threshold_ms
    );
    let threshold = Duration::from_millis(conf.stale_threshold_ms);

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_millis(conf.interval_ms));
        loop {
            tokio::select! {
                _ = interval.tick() => run_once(&store, threshold),
                _ = shutdown.changed() => {
                    println!("[monitor] arrêt du staleness monitor");
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RobotRecord;
    use crate::store::FleetStore;
    use std::sync::Arc;

    fn rec(id: &str, age: Duration) -> RobotRecord {
        RobotRecord {
            robot_id: id.into(),
            online: true,
            battery_percent: 50.0,
            cpu_percent: 10.0,
            ram_mb: 512.0,
            location: (0.0, 0.0),
            last_updated: OffsetDateTime::now_utc() - age,
            stale: false,
        }
    }

    #[test]
    fn stale_derivation_is_a_pure_threshold() {
        let now = OffsetDateTime::now_utc();
        let threshold = Duration::from_secs(30);
        assert!(!is_stale(now - Duration::from_secs(10), now, threshold));
        assert!(!is_stale(now - Duration::from_secs(30), now, threshold));
        assert!(is_stale(now - Duration::from_secs(31), now, threshold));
    }

    #[test]
    fn run_once_flags_only_old_records_and_is_repeatable() {
        let store = Arc::new(FleetStore::new());
        store.apply(vec![
            rec("vieux", Duration::from_secs(120)),
            rec("frais", Duration::from_secs(1)),
        ]);

        let threshold = Duration::from_secs(30);
        run_once(&store, threshold);
        let snap = store.snapshot();
        assert!(snap["vieux"].stale);
        assert!(!snap["frais"].stale);

        // Monotone sans nouvelle update : un second tick redonne pareil.
        run_once(&store, threshold);
        let snap = store.snapshot();
        assert!(snap["vieux"].stale);
        assert!(!snap["frais"].stale);
    }

    #[test]
    fn fresh_update_clears_stale_on_next_tick() {
        let store = Arc::new(FleetStore::new());
        store.apply(vec![rec("r1", Duration::from_secs(120))]);
        run_once(&store, Duration::from_secs(30));
        assert!(store.snapshot()["r1"].stale);

        store.apply(vec![rec("r1", Duration::from_secs(0))]);
        run_once(&store, Duration::from_secs(30));
        assert!(!store.snapshot()["r1"].stale);
    }
}
