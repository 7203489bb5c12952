use parking_lot::Mutex;
use std::sync::Arc;

pub type Shared<T> = Arc<Mutex<T>>;

/// Filtre opérateur courant, partagé entre l'API et le rendu aval.
pub type SharedFilter = Shared<crate::models::FilterPredicate>;

pub fn new_state<T>(value: T) -> Shared<T> {
    Arc::new(Mutex::new(value))
}
