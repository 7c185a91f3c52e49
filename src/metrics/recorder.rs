// Prometheus metrics recorder initialization

use metrics_exporter_prometheus::PrometheusBuilder;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

use crate::domain::error::{IngestError, Result};

/// Metrics configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Enable metrics collection
    pub enabled: bool,

    /// Prometheus exporter bind address
    pub prometheus_addr: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            prometheus_addr: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Installs the Prometheus recorder on its own HTTP listener, kept separate
/// from the ingestion-control API's axum router so scraping survives an
/// API-layer outage.
pub fn init_metrics(config: &MetricsConfig) -> Result<()> {
    if !config.enabled {
        tracing::info!("metrics collection is disabled");
        return Ok(());
    }

    let addr: SocketAddr = config
        .prometheus_addr
        .parse()
        .map_err(|e| IngestError::config(format!("invalid prometheus address: {e}")))?;

    tracing::info!(addr = %addr, "initializing prometheus metrics exporter");

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| IngestError::config(format!("failed to install prometheus exporter: {e}")))?;

    metrics::counter!("venue_ingest_info").increment(1);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_enabled() {
        let config = MetricsConfig::default();
        assert!(config.enabled);
        assert_eq!(config.prometheus_addr, "0.0.0.0:9090");
    }

    #[test]
    fn disabled_config_skips_installation() {
        let config = MetricsConfig { enabled: false, ..MetricsConfig::default() };
        assert!(init_metrics(&config).is_ok());
    }
}
