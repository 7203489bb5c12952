/**
 * FILTER ENGINE - Évaluation du filtre opérateur
 *
 * RÔLE : Produit la vue dérivée (table + carte) à partir de l'état flotte.
 * Évalué à chaque lecture, jamais mis en cache contre le store. Ordre stable
 * par robot_id pour que le front ne voie pas les lignes sauter.
 *
 * NOTE : aucun variant ne filtre sur `stale` — un robot stale mais matchant
 * doit rester visible (choix produit assumé).
 */

use crate::models::{FleetMap, FilterPredicate, RobotRecord};

impl FilterPredicate {
    pub fn matches(&self, rec: &RobotRecord) -> bool {
        match self {
            FilterPredicate::All => true,
            FilterPredicate::OnlineOnly => rec.online,
            FilterPredicate::OfflineOnly => !rec.online,
            FilterPredicate::LowBattery { threshold } => rec.battery_percent < *threshold,
        }
    }
}

/// Vue filtrée et ordonnée (tri par id) de l'état flotte.
pub fn evaluate(predicate: FilterPredicate, fleet: &FleetMap) -> Vec<RobotRecord> {
    let mut out: Vec<RobotRecord> = fleet
        .values()
        .filter(|rec| predicate.matches(rec))
        .cloned()
        .collect();
    out.sort_by(|a, b| a.robot_id.cmp(&b.robot_id));
    out
}
