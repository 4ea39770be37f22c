use anyhow::Result;
use figment::{providers::{Env, Format, Toml}, Figment};
use serde::Deserialize;
use std::net::SocketAddr;
use std::time::Duration;

use crate::controller::DEFAULT_RETAINED_RUNS;
use crate::dichotomy::DEFAULT_MAX_BRACKET_STEPS;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub solver: SolverConfig,
    pub dichotomy: DichotomyConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Completed runs kept for status queries
    #[serde(default = "default_retained_runs")]
    pub retained_runs: usize,
}
impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        Ok(format!("{}:{}", self.host, self.port).parse()?)
    }
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_retained_runs() -> usize {
    DEFAULT_RETAINED_RUNS
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SolverMode {
    #[cfg(feature = "sim")]
    Simulated,
    Remote,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SolverConfig {
    pub mode: SolverMode,
    #[serde(default)]
    pub base_url: String,
    /// Per-probe deadline, 0 disables it
    #[serde(default)]
    pub timeout_seconds: u64,
    #[serde(default = "default_connect_timeout_seconds")]
    pub connect_timeout_seconds: u64,
    #[serde(default)]
    pub simulated_latency_ms: u64,
    #[serde(default = "default_divergence_threshold_mw")]
    pub divergence_threshold_mw: f64,
}

impl SolverConfig {
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_seconds > 0).then(|| Duration::from_secs(self.timeout_seconds))
    }
}

fn default_connect_timeout_seconds() -> u64 {
    5
}

fn default_divergence_threshold_mw() -> f64 {
    20_000.0
}

/// Defaults for requests that leave search parameters out
#[derive(Debug, Clone, Deserialize)]
pub struct DichotomyConfig {
    pub precision_mw: f64,
    #[serde(default)]
    pub min_value_mw: f64,
    pub max_value_mw: f64,
    pub step_mw: f64,
    #[serde(default = "default_max_bracket_steps")]
    pub max_bracket_steps: u32,
}

fn default_max_bracket_steps() -> u32 {
    DEFAULT_MAX_BRACKET_STEPS
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::from_figment(
            Figment::new()
                .merge(Toml::file("config/default.toml"))
                .merge(Env::prefixed("CAPACITY__").split("__")),
        )
    }

    pub fn from_figment(figment: Figment) -> Result<Self> {
        Ok(figment.extract()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn test_env_overrides_file() {
        Jail::expect_with(|jail| {
            jail.create_dir("config")?;
            jail.create_file(
                "config/default.toml",
                r#"
                [server]
                host = "127.0.0.1"
                port = 8080

                [solver]
                mode = "remote"
                base_url = "http://solver:9000"
                timeout_seconds = 600

                [dichotomy]
                precision_mw = 50.0
                max_value_mw = 19999.0
                step_mw = 650.0
                "#,
            )?;
            jail.set_env("CAPACITY__SERVER__PORT", "9090");
            jail.set_env("CAPACITY__DICHOTOMY__PRECISION_MW", "10");

            let cfg = Config::load().expect("config loads");
            assert_eq!(cfg.server.port, 9090);
            assert_eq!(cfg.server.request_timeout_secs, 30);
            assert_eq!(cfg.server.retained_runs, DEFAULT_RETAINED_RUNS);
            assert_eq!(cfg.solver.mode, SolverMode::Remote);
            assert_eq!(cfg.solver.timeout(), Some(Duration::from_secs(600)));
            assert_eq!(cfg.dichotomy.precision_mw, 10.0);
            assert_eq!(cfg.dichotomy.min_value_mw, 0.0);
            assert_eq!(cfg.dichotomy.max_bracket_steps, DEFAULT_MAX_BRACKET_STEPS);
            Ok(())
        });
    }

    #[test]
    fn test_zero_timeout_disables_deadline() {
        let solver = SolverConfig {
            mode: SolverMode::Remote,
            base_url: String::new(),
            timeout_seconds: 0,
            connect_timeout_seconds: 5,
            simulated_latency_ms: 0,
            divergence_threshold_mw: 1.0,
        };
        assert_eq!(solver.timeout(), None);
    }
}
