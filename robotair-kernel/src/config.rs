use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct KernelConfig {
    #[serde(default)]
    pub feed: FeedConf,
    #[serde(default)]
    pub monitor: MonitorConf,
    #[serde(default)]
    pub filter: FilterConf,
    #[serde(default)]
    pub http: HttpConf,
}

/// Connexion au flux amont + politique de reconnexion.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct FeedConf {
    #[serde(default = "default_endpoint")]
    pub endpoint_url: String,
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
    #[serde(default = "default_backoff_cap_ms")]
    pub backoff_cap_ms: u64,
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: f64,
    /// Durée minimale de connexion pour considérer la liaison "saine"
    /// et remettre le backoff à sa base.
    #[serde(default = "default_min_uptime_ms")]
    pub min_uptime_ms: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MonitorConf {
    #[serde(default = "default_stale_threshold_ms")]
    pub stale_threshold_ms: u64,
    #[serde(default = "default_monitor_interval_ms")]
    pub interval_ms: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct FilterConf {
    #[serde(default = "default_low_battery_threshold")]
    pub low_battery_threshold: f64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct HttpConf {
    #[serde(default = "default_http_bind")]
    pub bind: String,
}

fn default_endpoint() -> String { "ws://127.0.0.1:8000/ws".into() }
fn default_backoff_base_ms() -> u64 { 1_000 }
fn default_backoff_cap_ms() -> u64 { 30_000 }
fn default_backoff_factor() -> f64 { 2.0 }
fn default_min_uptime_ms() -> u64 { 5_000 }
fn default_stale_threshold_ms() -> u64 { 30_000 }
fn default_monitor_interval_ms() -> u64 { 5_000 }
fn default_low_battery_threshold() -> f64 { 20.0 }
fn default_http_bind() -> String { "0.0.0.0:8080".into() }

impl Default for FeedConf {
    fn default() -> Self {
        Self {
            endpoint_url: default_endpoint(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_cap_ms: default_backoff_cap_ms(),
            backoff_factor: default_backoff_factor(),
            min_uptime_ms: default_min_uptime_ms(),
        }
    }
}

impl Default for MonitorConf {
    fn default() -> Self {
        Self {
            stale_threshold_ms: default_stale_threshold_ms(),
            interval_ms: default_monitor_interval_ms(),
        }
    }
}

impl Default for FilterConf {
    fn default() -> Self {
        Self { low_battery_threshold: default_low_battery_threshold() }
    }
}

impl Default for HttpConf {
    fn default() -> Self {
        Self { bind: default_http_bind() }
    }
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            feed: FeedConf::default(),
            monitor: MonitorConf::default(),
            filter: FilterConf::default(),
            http: HttpConf::default(),
        }
    }
}

pub async fn load_config() -> KernelConfig {
    let path = std::env::var("ROBOTAIR_KERNEL_CONFIG").unwrap_or_else(|_| "kernel.yaml".into());
    if Path::new(&path).exists() {
        let txt = fs::read_to_string(&path).await.unwrap_or_default();
        if txt.trim().is_empty() { return KernelConfig::default(); }
        serde_yaml::from_str(&txt).unwrap_or_else(|e| {
            eprintln!("[kernel] config invalide: {e}");
            KernelConfig::default()
        })
    } else {
        eprintln!("[kernel] pas de kernel.yaml, usage config par défaut");
        KernelConfig::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_yaml_gives_builtin_defaults() {
        let cfg: KernelConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(cfg.monitor.stale_threshold_ms, 30_000);
        assert_eq!(cfg.monitor.interval_ms, 5_000);
        assert_eq!(cfg.feed.backoff_base_ms, 1_000);
        assert_eq!(cfg.feed.backoff_cap_ms, 30_000);
        assert_eq!(cfg.filter.low_battery_threshold, 20.0);
    }

    #[test]
    fn partial_yaml_overrides_only_named_fields() {
        let cfg: KernelConfig = serde_yaml::from_str(
            "feed:\n  endpoint_url: ws://fleet.local:9000/ws\nmonitor:\n  stale_threshold_ms: 10000\n",
        )
        .unwrap();
        assert_eq!(cfg.feed.endpoint_url, "ws://fleet.local:9000/ws");
        assert_eq!(cfg.feed.backoff_factor, 2.0);
        assert_eq!(cfg.monitor.stale_threshold_ms, 10_000);
        assert_eq!(cfg.monitor.interval_ms, 5_000);
    }
}
