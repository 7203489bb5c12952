/*!
Backend dashboard RobotAir : ingestion du flux télémétrie, état flotte,
staleness, filtres et API REST. Le binaire `robotair-kernel` assemble le
tout ; la lib expose les modules pour les tests d'intégration.
*/

pub mod config;
pub mod decode;
pub mod feed;
pub mod filter;
pub mod health;
pub mod http;
pub mod models;
pub mod monitor;
pub mod state;
pub mod store;
