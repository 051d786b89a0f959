//! Server configuration

use std::fs;

use anyhow::Context;
use clap::Parser;
use distboard::controller::SamplingLimits;
use distboard::dash::DashboardConfig;
use distboard::prelude::AppCatalog;
use tracing::info;

/// Upper bound on `--session-ttl`: one year.
const MAX_SESSION_TTL: u64 = 365 * 24 * 60 * 60;

/// Distribution dashboard server
#[derive(Parser, Clone, Debug)]
#[command(name = "distboard-server")]
#[command(about = "Serves interactive probability distribution dashboards")]
pub struct Config {
    /// Host to bind to
    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, default_value = "5006")]
    pub port: u16,

    /// Path to static files directory
    #[arg(long, default_value = "distboard-server/static")]
    pub static_dir: String,

    /// Seconds an idle session is kept alive
    #[arg(long, default_value = "1800", value_parser = clap::value_parser!(u64).range(0..=MAX_SESSION_TTL))]
    pub session_ttl: u64,

    /// Cleanup interval in seconds
    #[arg(long, default_value = "60")]
    pub cleanup_interval: u64,

    /// JSON file with extra dashboard configurations
    #[arg(long)]
    pub apps: Option<String>,

    /// Seed every session's sampler for reproducible output
    #[arg(long)]
    pub seed: Option<u64>,

    /// Upper bound on the sample size control
    #[arg(long, default_value = "100000")]
    pub max_sample_size: usize,

    /// Upper bound on the bin count control
    #[arg(long, default_value = "100")]
    pub max_bins: usize,
}

impl Config {
    pub fn limits(&self) -> SamplingLimits {
        SamplingLimits {
            max_sample_size: self.max_sample_size.max(1),
            max_bins: self.max_bins.max(1),
        }
    }

    /// Built-in presets plus any dashboards from `--apps`.
    pub fn load_catalog(&self) -> anyhow::Result<AppCatalog> {
        let mut catalog = AppCatalog::with_presets();
        if let Some(path) = &self.apps {
            let text = fs::read_to_string(path).with_context(|| format!("reading {path}"))?;
            let configs: Vec<DashboardConfig> =
                serde_json::from_str(&text).with_context(|| format!("parsing {path}"))?;
            info!("Loaded {} dashboards from {}", configs.len(), path);
            catalog
                .extend(configs)
                .map_err(|report| anyhow::anyhow!("{}", report.current_context()))?;
        }
        Ok(catalog)
    }

    /// Apply server-wide limits and seed to a catalog entry.
    pub fn instance_config(&self, base: &DashboardConfig) -> DashboardConfig {
        let mut config = base.clone();
        config.sampling.limits = self.limits();
        if self.seed.is_some() {
            config.seed = self.seed;
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::parse_from(["distboard-server"]);
        assert_eq!(config.port, 5006);
        assert_eq!(config.session_ttl, 1800);
        assert_eq!(config.limits(), SamplingLimits::default());
        assert_eq!(config.load_catalog().unwrap().len(), 4);
    }

    #[test]
    fn session_ttl_is_bounded() {
        assert!(Config::try_parse_from(["distboard-server", "--session-ttl", "99999999999999"]).is_err());
        let config = Config::try_parse_from(["distboard-server", "--session-ttl", "0"]).unwrap();
        assert_eq!(config.session_ttl, 0);
    }

    #[test]
    fn instance_config_applies_overrides() {
        let config = Config::parse_from(["distboard-server", "--seed", "7", "--max-bins", "20"]);
        let catalog = config.load_catalog().unwrap();
        let instance = config.instance_config(catalog.get("normal").unwrap());
        assert_eq!(instance.seed, Some(7));
        assert_eq!(instance.sampling.limits.max_bins, 20);
    }
}
