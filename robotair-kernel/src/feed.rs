/**
 * CONNECTION MANAGER - Cycle de vie de la connexion au flux amont
 *
 * RÔLE :
 * Machine à états Disconnected -> Connecting -> Connected, retour à
 * Disconnected sur close/erreur transport, reconnexion automatique avec
 * backoff exponentiel + jitter. ShutDown est terminal et ne s'entre que
 * sur demande explicite.
 *
 * FONCTIONNEMENT :
 * - Chaque trame texte passe par le décodeur puis store.apply()
 * - Trame malformée : comptée et loguée, la connexion reste ouverte
 * - Erreur transport : retour à Disconnected + cycle backoff/retry
 * - Le backoff ne revient à sa base qu'après une connexion ayant tenu
 *   min_uptime (une liaison qui retombe en rafale n'est pas "saine")
 * - Shutdown : stoppe la boucle retry, ferme le socket, coupe le timer ;
 *   un connect en vol qui aboutit après coup est ignoré
 *
 * UTILITÉ : le dashboard continue d'afficher le dernier état connu
 * (staleness croissante) pendant les coupures, il ne meurt jamais ici.
 */

use crate::config::FeedConf;
use crate::decode::decode;
use crate::health::FeedHealth;
use crate::models::ConnectionStatus;
use crate::store::SharedFleetStore;
use futures_util::StreamExt;
use rand::Rng;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

/// Délai de reconnexion : exponentiel borné, jitter appliqué au tirage.
pub struct Backoff {
    base: Duration,
    cap: Duration,
    factor: f64,
    current: Duration,
}

impl Backoff {
    pub fn new(base_ms: u64, cap_ms: u64, factor: f64) -> Self {
        let base = Duration::from_millis(base_ms);
        Self {
            base,
            cap: Duration::from_millis(cap_ms),
            factor,
            current: base,
        }
    }

    /// Délai brut courant, puis avance l'exponentielle (bornée au cap).
    fn advance(&mut self) -> Duration {
        let delay = self.current;
        self.current = self.current.mul_f64(self.factor).min(self.cap);
        delay
    }

    pub fn reset(&mut self) {
        self.current = self.base;
    }

    /// Prochain délai avec jitter ±50% (anti thundering-herd côté amont).
    pub fn next_delay(&mut self) -> Duration {
        let raw = self.advance();
        raw.mul_f64(rand::thread_rng().gen_range(0.5..1.5))
    }
}

/// Poignée de contrôle de la tâche feed (arrêt explicite).
pub struct FeedHandle {
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl FeedHandle {
    /// Entre dans ShutDown : plus aucune reconnexion, socket relâché.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        let _ = self.task.await;
    }
}

pub fn spawn_feed_listener(
    conf: FeedConf,
    store: SharedFleetStore,
    health: FeedHealth,
) -> FeedHandle {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let task = tokio::spawn(feed_loop(conf, store, health, shutdown_rx));
    FeedHandle { shutdown_tx, task }
}

async fn feed_loop(
    conf: FeedConf,
    store: SharedFleetStore,
    health: FeedHealth,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut backoff = Backoff::new(conf.backoff_base_ms, conf.backoff_cap_ms, conf.backoff_factor);
    let min_uptime = Duration::from_millis(conf.min_uptime_ms);

    'retry: loop {
        if *shutdown.borrow() {
            break;
        }
        health.set_status(ConnectionStatus::Connecting);
        println!("[feed] connexion à {}", conf.endpoint_url);

        let connect = tokio::select! {
            res = connect_async(conf.endpoint_url.as_str()) => res,
            _ = shutdown.changed() => break 'retry,
        };

        match connect {
            Ok((mut ws, _)) => {
                health.set_status(ConnectionStatus::Connected);
                println!("[feed] connecté au flux amont");
                let connected_at = Instant::now();

                loop {
                    tokio::select! {
                        msg = ws.next() => match msg {
                            Some(Ok(Message::Text(txt))) => handle_frame(&txt, &store, &health),
                            Some(Ok(Message::Close(_))) => {
                                eprintln!("[feed] close reçu de l'amont");
                                break;
                            }
                            Some(Ok(_)) => {} // ping/pong/binaire : rien à faire
                            Some(Err(e)) => {
                                eprintln!("[feed] erreur transport: {e}");
                                break;
                            }
                            None => {
                                eprintln!("[feed] flux amont terminé");
                                break;
                            }
                        },
                        _ = shutdown.changed() => {
                            let _ = ws.close(None).await;
                            break 'retry;
                        }
                    }
                }

                // Une connexion qui a tenu assez longtemps réarme le backoff.
                if connected_at.elapsed() >= min_uptime {
                    backoff.reset();
                }
            }
            Err(e) => eprintln!("[feed] connexion échouée: {e}"),
        }

        if *shutdown.borrow() {
            break;
        }
        health.set_status(ConnectionStatus::Disconnected);
        health.increment_reconnects();
        let delay = backoff.next_delay();
        println!("[feed] nouvelle tentative dans {delay:?}");
        tokio::select! {
            _ = sleep(delay) => {}
            _ = shutdown.changed() => break 'retry,
        }
    }

    health.set_status(ConnectionStatus::ShutDown);
    println!("[feed] arrêté (shutdown)");
}

fn handle_frame(raw: &str, store: &SharedFleetStore, health: &FeedHealth) {
    match decode(raw) {
        Ok(snap) => {
            if snap.dropped > 0 {
                eprintln!("[feed] {} entrée(s) invalide(s) droppée(s)", snap.dropped);
                store.note_dropped_entries(snap.dropped);
            }
            store.apply(snap.records);
        }
        Err(e) => {
            // Trame entière illisible : comptée, la connexion survit.
            eprintln!("[feed] trame illisible: {e}");
            health.increment_malformed();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::FleetStore;
    use std::sync::Arc;

    #[test]
    fn backoff_doubles_then_caps() {
        let mut b = Backoff::new(1_000, 30_000, 2.0);
        let raw: Vec<u64> = (0..7).map(|_| b.advance().as_millis() as u64).collect();
        assert_eq!(raw, vec![1_000, 2_000, 4_000, 8_000, 16_000, 30_000, 30_000]);
    }

    #[test]
    fn backoff_reset_returns_to_base() {
        let mut b = Backoff::new(1_000, 30_000, 2.0);
        for _ in 0..5 {
            b.advance();
        }
        b.reset();
        assert_eq!(b.advance(), Duration::from_millis(1_000));
    }

    #[test]
    fn jitter_stays_within_half_to_one_and_a_half() {
        for _ in 0..100 {
            let mut b = Backoff::new(1_000, 30_000, 2.0);
            let d = b.next_delay();
            assert!(d >= Duration::from_millis(500), "délai trop court: {d:?}");
            assert!(d < Duration::from_millis(1_500), "délai trop long: {d:?}");
        }
    }

    #[test]
    fn malformed_frame_is_counted_not_applied() {
        let store = Arc::new(FleetStore::new());
        let health = FeedHealth::new();
        handle_frame("{\"pas\":\"un tableau\"}", &store, &health);
        assert_eq!(store.len(), 0);
        assert_eq!(health.get_health(&store).malformed_frames, 1);
    }

    #[test]
    fn frame_with_invalid_entry_applies_the_valid_ones() {
        let store = Arc::new(FleetStore::new());
        let health = FeedHealth::new();
        let raw = r#"[
            {"Robot ID":"r1","Online/Offline":true,"Battery Percentage":90,"CPU Usage":10,"RAM Consumption":1000,"Location Coordinates":[1.0,2.0],"Last Updated":"2025-01-15T10:00:00Z"},
            {"Online/Offline":true,"Battery Percentage":90,"CPU Usage":10,"RAM Consumption":1000,"Location Coordinates":[1.0,2.0],"Last Updated":"2025-01-15T10:00:00Z"}
        ]"#;
        handle_frame(raw, &store, &health);
        assert_eq!(store.len(), 1);
        let stats = store.stats();
        assert_eq!(stats.entries_dropped, 1);
        assert_eq!(health.get_health(&store).malformed_frames, 0);
    }
}
