/**
 * ROBOTAIR KERNEL - Point d'entrée du backend dashboard
 *
 * RÔLE : Orchestration des modules : config, flux amont, store flotte,
 * staleness monitor, API REST. Bootstrap complet avec arrêt propre.
 *
 * ARCHITECTURE : ingestion WebSocket → décodeur → store (merge-by-id),
 * monitor périodique qui annote la staleness, Axum qui sert la vue au
 * front. Le front (table + carte Leaflet) est un consommateur externe.
 */

use robotair_kernel::config::load_config;
use robotair_kernel::feed::spawn_feed_listener;
use robotair_kernel::health::FeedHealth;
use robotair_kernel::http::{self, AppState};
use robotair_kernel::models::FilterPredicate;
use robotair_kernel::monitor::spawn_staleness_monitor;
use robotair_kernel::state::new_state;
use robotair_kernel::store::FleetStore;

use anyhow::{bail, Context};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Variables d'environnement depuis .env (si présent)
    dotenvy::dotenv().ok();

    let cfg = load_config().await;

    // Seule erreur fatale du système : une config de connexion inutilisable.
    match url::Url::parse(&cfg.feed.endpoint_url) {
        Ok(u) if u.scheme() == "ws" || u.scheme() == "wss" => {}
        Ok(u) => bail!("endpoint_url invalide (schéma {} au lieu de ws/wss)", u.scheme()),
        Err(e) => bail!("endpoint_url invalide: {e}"),
    }

    let store = Arc::new(FleetStore::new());
    let health = FeedHealth::new();
    let filter = new_state(FilterPredicate::default());

    // Staleness monitor (tick périodique, arrêté via watch)
    let (monitor_stop, monitor_stop_rx) = watch::channel(false);
    let monitor_task = spawn_staleness_monitor(store.clone(), cfg.monitor.clone(), monitor_stop_rx);

    // Ingestion du flux amont (reconnexion automatique)
    let feed_handle = spawn_feed_listener(cfg.feed.clone(), store.clone(), health.clone());

    let app_state = AppState {
        store,
        filter,
        health,
        low_battery_default: cfg.filter.low_battery_threshold,
    };
    let app = http::build_router(app_state);

    println!("[kernel] listening on http://{}", cfg.http.bind);
    let listener = TcpListener::bind(&cfg.http.bind)
        .await
        .with_context(|| format!("bind {} impossible", cfg.http.bind))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            println!("[kernel] ctrl-c reçu, arrêt...");
        })
        .await
        .unwrap_or_else(|e| eprintln!("[kernel] serveur HTTP: {e}"));

    // Arrêt propre : feed (ShutDown terminal) puis monitor.
    feed_handle.shutdown().await;
    let _ = monitor_stop.send(true);
    let _ = monitor_task.await;
    println!("[kernel] arrêt terminé");
    Ok(())
}
