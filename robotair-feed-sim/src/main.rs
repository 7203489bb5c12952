/**
 * ROBOTAIR FEED SIM - Simulateur de flux amont pour le développement
 *
 * RÔLE :
 * Sert sur /ws le flux télémétrie au format de production (tableau JSON,
 * clés historiques "Robot ID", "Battery Percentage"...) avec une flotte
 * factice dont les métriques dérivent aléatoirement.
 *
 * FONCTIONNEMENT :
 * - Flotte générée au démarrage (8 robots, 2 offline)
 * - Tick de mutation toutes les 5s : batterie qui draine, CPU/RAM
 *   aléatoires, marche aléatoire sur la position — robots offline figés,
 *   ce qui exerce la staleness côté kernel
 * - Chaque client WebSocket reçoit le snapshot complet toutes les 5s
 *
 * UTILISATION : cargo run -p robotair-feed-sim (port 8000 par défaut)
 */

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use parking_lot::Mutex;
use rand::Rng;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use time::macros::format_description;
use time::OffsetDateTime;
use tokio::net::TcpListener;

/// Robot au format du flux de production (clés avec espaces).
#[derive(Debug, Clone, Serialize)]
struct SimRobot {
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
    last_updated: String,
}

type SharedFleet = Arc<Mutex<Vec<SimRobot>>>;

fn now_wire() -> String {
    // Format du backend historique, volontairement pas RFC3339
    let fmt = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
    OffsetDateTime::now_utc().format(&fmt).unwrap_or_default()
}

fn seed_fleet(count: usize) -> Vec<SimRobot> {
    let mut rng = rand::thread_rng();
    (0..count)
        .map(|i| SimRobot {
            robot_id: format!("robot-{:03}", i + 1),
            online: i % 4 != 3, // un robot sur quatre démarre offline
            battery: rng.gen_range(40.0..100.0_f64).round(),
            cpu: rng.gen_range(10.0..100.0_f64).round(),
            ram: rng.gen_range(1_000.0..8_000.0_f64).round(),
            location: [rng.gen_range(-60.0..60.0), rng.gen_range(-150.0..150.0)],
            last_updated: now_wire(),
        })
        .collect()
}

/// Un tick de simulation : seuls les robots online bougent.
fn tick(fleet: &SharedFleet) {
    let mut rng = rand::thread_rng();
    for robot in fleet.lock().iter_mut() {
        if !robot.online {
            continue;
        }
        robot.battery = (robot.battery - rng.gen_range(0.0..5.0_f64)).max(0.0).round();
        robot.cpu = rng.gen_range(10.0..100.0_f64).round();
        robot.ram = rng.gen_range(1_000.0..8_000.0_f64).round();
        robot.location[0] = (robot.location[0] + rng.gen_range(-0.05..0.05)).clamp(-90.0, 90.0);
        robot.location[1] = (robot.location[1] + rng.gen_range(-0.05..0.05)).clamp(-180.0, 180.0);
        robot.last_updated = now_wire();
    }
}

async fn ws_upgrade(ws: WebSocketUpgrade, State(fleet): State<SharedFleet>) -> Response {
    ws.on_upgrade(move |socket| push_loop(socket, fleet))
}

/// Pousse le snapshot complet toutes les 5s jusqu'à déconnexion du client.
async fn push_loop(mut socket: WebSocket, fleet: SharedFleet) {
    println!("[sim] client connecté");
    loop {
        let payload = {
            let robots = fleet.lock();
            serde_json::to_string(&*robots).unwrap_or_else(|_| "[]".into())
        };
        if socket.send(Message::Text(payload.into())).await.is_err() {
            println!("[sim] client déconnecté");
            return;
        }
        tokio::time::sleep(Duration::from_secs(5)).await;
    }
}

#[tokio::main]
async fn main() {
    let fleet: SharedFleet = Arc::new(Mutex::new(seed_fleet(8)));
    println!("[sim] flotte factice de {} robots", fleet.lock().len());

    // Mutation périodique, indépendante des clients connectés
    let fleet_tick = fleet.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(5));
        loop {
            interval.tick().await;
            tick(&fleet_tick);
        }
    });

    let app = Router::new().route("/ws", get(ws_upgrade)).with_state(fleet);

    let bind = std::env::var("ROBOTAIR_SIM_BIND").unwrap_or_else(|_| "0.0.0.0:8000".into());
    println!("[sim] feed disponible sur ws://{bind}/ws");
    let listener = TcpListener::bind(&bind).await.unwrap_or_else(|e| {
        eprintln!("[sim] bind {bind} impossible: {e}");
        std::process::exit(1);
    });
    axum::serve(listener, app).await.unwrap();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_format_uses_historical_keys() {
        let fleet = seed_fleet(1);
        let json = serde_json::to_value(&fleet[0]).unwrap();
        for key in [
            "Robot ID",
            "Online/Offline",
            "Battery Percentage",
            "CPU Usage",
            "RAM Consumption",
            "Location Coordinates",
            "Last Updated",
        ] {
            assert!(json.get(key).is_some(), "clé manquante: {key}");
        }
    }

    #[test]
    fn tick_moves_only_online_robots() {
        let fleet: SharedFleet = Arc::new(Mutex::new(seed_fleet(8)));
        let before = fleet.lock().clone();
        tick(&fleet);
        let after = fleet.lock();
        for (b, a) in before.iter().zip(after.iter()) {
            if !b.online {
                assert_eq!(b.last_updated, a.last_updated);
            }
            assert!(a.battery >= 0.0 && a.battery <= 100.0);
            assert!(a.location[0].abs() <= 90.0 && a.location[1].abs() <= 180.0);
        }
    }
}
