/**
 * API REST ROBOTAIR - Vue aval servie au front (table + carte)
 *
 * RÔLE :
 * Expose au rendu (collaborateur externe) tout ce dont il a besoin :
 * snapshot complet de la flotte, filtre opérateur courant, vue filtrée
 * ordonnée, et statut de connexion pour l'indicateur.
 *
 * FONCTIONNEMENT :
 * - Serveur Axum, routes : /health, /system/health, /fleet, /robots,
 *   /robots/{id}, /filter (get/post)
 * - /robots applique le filtre sélectionné, surchageable par query params
 *   (?filter=low_battery&threshold=25)
 * - Pendant une coupure amont, les routes continuent de servir le dernier
 *   état connu avec l'âge et le flag stale par robot — jamais de page vide
 */

use crate::health::{FeedHealth, KernelHealth};
use crate::models::{FilterPredicate, RobotRecord};
use crate::state::SharedFilter;
use crate::store::SharedFleetStore;
use crate::filter::evaluate;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use std::collections::HashMap;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

#[derive(Clone)]
pub struct AppState {
    pub store: SharedFleetStore,
    pub filter: SharedFilter,
    pub health: FeedHealth,
    pub low_battery_default: f64,
}

#[derive(serde::Serialize)]
struct RobotView {
    robot_id: String,
    online: bool,
    battery_percent: f64,
    cpu_percent: f64,
    ram_mb: f64,
    location: (f64, f64),
    last_updated: String, // RFC3339 pour l'API
    stale: bool,
    age_seconds: i64,
    low_battery: bool, // le front surligne ces lignes
}

fn to_view(r: &RobotRecord, low_battery_threshold: f64) -> RobotView {
    let age = OffsetDateTime::now_utc() - r.last_updated;
    RobotView {
        robot_id: r.robot_id.clone(),
        online: r.online,
        battery_percent: r.battery_percent,
        cpu_percent: r.cpu_percent,
        ram_mb: r.ram_mb,
        location: r.location,
        last_updated: r.last_updated.format(&Rfc3339).unwrap_or_default(),
        stale: r.stale,
        age_seconds: age.whole_seconds().max(0),
        low_battery: r.battery_percent < low_battery_threshold,
    }
}

/// Filtre entrant côté API : threshold optionnel, défaut pris dans la conf.
#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum FilterIn {
    All,
    OnlineOnly,
    OfflineOnly,
    LowBattery { threshold: Option<f64> },
}

impl FilterIn {
    fn into_predicate(self, default_threshold: f64) -> FilterPredicate {
        match self {
            FilterIn::All => FilterPredicate::All,
            FilterIn::OnlineOnly => FilterPredicate::OnlineOnly,
            FilterIn::OfflineOnly => FilterPredicate::OfflineOnly,
            FilterIn::LowBattery { threshold } => FilterPredicate::LowBattery {
                threshold: threshold.unwrap_or(default_threshold),
            },
        }
    }
}

pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/system/health", get(get_system_health))
        .route("/fleet", get(get_fleet))
        .route("/robots", get(get_robots))
        .route("/robots/{id}", get(get_robot))
        .route("/filter", get(get_filter).post(set_filter))
        .with_state(app_state)
}

// GET /system/health (statut connexion + compteurs)
async fn get_system_health(State(app): State<AppState>) -> Json<KernelHealth> {
    Json(app.health.get_health(&app.store))
}

// GET /fleet (snapshot complet, non filtré)
async fn get_fleet(State(app): State<AppState>) -> Json<Vec<RobotView>> {
    let fleet = app.store.snapshot();
    let views = evaluate(FilterPredicate::All, &fleet)
        .iter()
        .map(|r| to_view(r, app.low_battery_default))
        .collect();
    Json(views)
}

// GET /robots (vue filtrée ordonnée ; query params surchargent le filtre courant)
async fn get_robots(
    State(app): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Vec<RobotView>>, StatusCode> {
    let predicate = match params.get("filter").map(String::as_str) {
        None => *app.filter.lock(),
        Some("all") => FilterPredicate::All,
        Some("online") => FilterPredicate::OnlineOnly,
        Some("offline") => FilterPredicate::OfflineOnly,
        Some("low_battery") => {
            let threshold = match params.get("threshold") {
                Some(t) => t.parse::<f64>().map_err(|_| StatusCode::BAD_REQUEST)?,
                None => app.low_battery_default,
            };
            FilterPredicate::LowBattery { threshold }
        }
        Some(_) => return Err(StatusCode::BAD_REQUEST),
    };

    let fleet = app.store.snapshot();
    let views = evaluate(predicate, &fleet)
        .iter()
        .map(|r| to_view(r, app.low_battery_default))
        .collect();
    Ok(Json(views))
}

// GET /robots/:id (détail)
async fn get_robot(
    State(app): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<RobotView>, StatusCode> {
    let Some(rec) = app.store.get(&id) else {
        return Err(StatusCode::NOT_FOUND);
    };
    Ok(Json(to_view(&rec, app.low_battery_default)))
}

// GET /filter (filtre opérateur courant)
async fn get_filter(State(app): State<AppState>) -> Json<FilterPredicate> {
    Json(*app.filter.lock())
}

// POST /filter (sélection opérateur)
async fn set_filter(
    State(app): State<AppState>,
    Json(filter_in): Json<FilterIn>,
) -> Json<FilterPredicate> {
    let predicate = filter_in.into_predicate(app.low_battery_default);
    *app.filter.lock() = predicate;
    println!("[http] filtre opérateur: {predicate:?}");
    Json(predicate)
}
