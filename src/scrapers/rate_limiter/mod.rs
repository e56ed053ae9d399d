//! Per-domain admission control.
//!
//! Caps in-flight requests per hostname and spaces consecutive request
//! starts to the same hostname by a minimum delay. Domain state is created
//! lazily under a mutex so two workers racing on a new host share one
//! token pool.

mod domain_state;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, OwnedSemaphorePermit};
use tracing::debug;
use url::Url;

use domain_state::DomainState;

/// Admission limits applied to every hostname.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdmissionConfig {
    /// Maximum concurrent in-flight requests per hostname.
    pub max_concurrent: usize,
    /// Minimum spacing between request starts to the same hostname.
    pub delay: Duration,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 5,
            delay: Duration::from_secs(1),
        }
    }
}

/// Held for the duration of a request; dropping it frees the domain token.
#[derive(Debug)]
pub struct AdmissionPermit {
    domain: String,
    _permit: OwnedSemaphorePermit,
}

impl AdmissionPermit {
    pub fn domain(&self) -> &str {
        &self.domain
    }
}

/// Per-domain admission controller shared by all crawl workers.
#[derive(Debug, Clone)]
pub struct DomainAdmission {
    config: AdmissionConfig,
    domains: Arc<Mutex<HashMap<String, DomainState>>>,
}

impl DomainAdmission {
    pub fn new(config: AdmissionConfig) -> Self {
        Self {
            config,
            domains: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn config(&self) -> AdmissionConfig {
        self.config
    }

    /// Extract the lowercase hostname from a URL.
    pub fn extract_domain(url: &str) -> Option<String> {
        Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(|s| s.to_ascii_lowercase()))
    }

    /// Wait for a token and the inter-request delay for the URL's domain.
    /// Returns `None` for URLs without a host.
    pub async fn acquire(&self, url: &str) -> Option<AdmissionPermit> {
        let domain = Self::extract_domain(url)?;

        let permits = {
            let mut domains = self.domains.lock().await;
            domains
                .entry(domain.clone())
                .or_insert_with(|| DomainState::new(self.config.max_concurrent))
                .permits
                .clone()
        };

        // The semaphore is never closed, so this only fails on shutdown races.
        let permit = permits.acquire_owned().await.ok()?;

        let start = {
            let mut domains = self.domains.lock().await;
            let state = domains
                .entry(domain.clone())
                .or_insert_with(|| DomainState::new(self.config.max_concurrent));
            state.reserve_start(self.config.delay)
        };

        let wait = start.saturating_duration_since(tokio::time::Instant::now());
        if !wait.is_zero() {
            debug!("Admission for {}: waiting {:?}", domain, wait);
            tokio::time::sleep_until(start).await;
        }

        Some(AdmissionPermit {
            domain,
            _permit: permit,
        })
    }

    /// In-flight request count for a domain.
    pub async fn in_flight(&self, domain: &str) -> usize {
        let domains = self.domains.lock().await;
        domains
            .get(domain)
            .map(|s| s.in_flight(self.config.max_concurrent))
            .unwrap_or(0)
    }

    /// Total requests admitted per domain.
    pub async fn request_counts(&self) -> HashMap<String, u64> {
        let domains = self.domains.lock().await;
        domains
            .iter()
            .map(|(d, s)| (d.clone(), s.total_requests))
            .collect()
    }
}
