use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result};

use mercury_handlers::HandlerConfig;

use crate::worker::SendWorkerConfig;

/// Process configuration, read from the environment with code defaults.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub addr: SocketAddr,
    /// Default callback domain handed to providers.
    pub domain: String,
    /// Server-wide switch suppressing non-failure delivery reports.
    pub ignore_delivery_reports: bool,
    pub send_workers: usize,
    pub send_timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            domain: "localhost".into(),
            ignore_delivery_reports: false,
            send_workers: 4,
            send_timeout: Duration::from_secs(35),
            poll_interval: Duration::from_millis(500),
        }
    }
}

impl GatewayConfig {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let addr = match std::env::var("BIND") {
            Ok(raw) => raw.parse().context("invalid BIND address")?,
            Err(_) => defaults.addr,
        };
        let domain = std::env::var("DOMAIN").unwrap_or(defaults.domain);
        let ignore_delivery_reports = match std::env::var("IGNORE_DELIVERY_REPORTS") {
            Ok(raw) => raw.parse().context("invalid IGNORE_DELIVERY_REPORTS flag")?,
            Err(_) => defaults.ignore_delivery_reports,
        };
        let send_workers = match std::env::var("SEND_WORKERS") {
            Ok(raw) => raw.parse().context("invalid SEND_WORKERS count")?,
            Err(_) => defaults.send_workers,
        };
        let send_timeout = match std::env::var("SEND_TIMEOUT_SECS") {
            Ok(raw) => Duration::from_secs(raw.parse().context("invalid SEND_TIMEOUT_SECS")?),
            Err(_) => defaults.send_timeout,
        };
        let poll_interval = match std::env::var("SEND_POLL_MS") {
            Ok(raw) => Duration::from_millis(raw.parse().context("invalid SEND_POLL_MS")?),
            Err(_) => defaults.poll_interval,
        };
        Ok(Self {
            addr,
            domain,
            ignore_delivery_reports,
            send_workers,
            send_timeout,
            poll_interval,
        })
    }

    pub fn handler_config(&self) -> HandlerConfig {
        HandlerConfig {
            domain: self.domain.clone(),
            ignore_delivery_reports: self.ignore_delivery_reports,
        }
    }

    pub fn worker_config(&self) -> SendWorkerConfig {
        SendWorkerConfig {
            workers: self.send_workers,
            send_timeout: self.send_timeout,
            poll_interval: self.poll_interval,
        }
    }
}
