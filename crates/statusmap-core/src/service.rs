use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::config::ServiceConfig;
use crate::dataset::{self, DatasetError, Site};
use crate::nagios::MonitoringBackend;
use crate::snapshot::{AggregateSnapshot, HostStatus, SiteStatus};
use crate::watcher::SourceWatcher;

pub struct StatusService<B: MonitoringBackend> {
    backend: B,
    config: ServiceConfig,
    state: Mutex<ServiceState>,
}

struct ServiceState {
    watcher: SourceWatcher,
    sites: Arc<Vec<Site>>,
    cached: Option<CachedSnapshot>,
}

struct CachedSnapshot {
    snapshot: Arc<AggregateSnapshot>,
    computed: Instant,
}

impl<B: MonitoringBackend> StatusService<B> {
    pub fn new(
        backend: B,
        config: ServiceConfig,
        locations: impl Into<PathBuf>,
        hosts: impl Into<PathBuf>,
    ) -> Result<Self, DatasetError> {
        let locations = locations.into();
        let hosts = hosts.into();

        let sites = dataset::load_sites(&locations, &hosts)?;
        info!(
            sites = sites.len(),
            locations = %locations.display(),
            hosts = %hosts.display(),
            "site list loaded"
        );

        let sources = format!("{}, {}", locations.display(), hosts.display());
        let watcher = SourceWatcher::new(locations, hosts).map_err(|err| DatasetError::Read {
            path: sources,
            reason: err.to_string(),
        })?;

        Ok(Self {
            backend,
            config,
            state: Mutex::new(ServiceState {
                watcher,
                sites: Arc::new(sites),
                cached: None,
            }),
        })
    }

    // The one lock spans reload check, cache check and recompute, so
    // concurrent callers during a miss wait for the single in-flight pass
    // and a reload can never interleave with a running computation.
    pub async fn get_status(&self) -> Arc<AggregateSnapshot> {
        let mut state = self.state.lock().await;

        self.refresh_sites(&mut state);

        if let Some(cached) = &state.cached {
            if cached.computed.elapsed() < self.config.freshness_window {
                debug!("serving cached snapshot");
                return cached.snapshot.clone();
            }
        }

        let sites = state.sites.clone();
        let snapshot = Arc::new(self.compute(&sites).await);
        state.cached = Some(CachedSnapshot {
            snapshot: snapshot.clone(),
            computed: Instant::now(),
        });

        snapshot
    }

    fn refresh_sites(&self, state: &mut ServiceState) {
        let fingerprint = match state.watcher.probe() {
            Ok(Some(fingerprint)) => fingerprint,
            Ok(None) => return,
            Err(err) => {
                warn!(error = %err, "source fingerprint check failed");
                return;
            }
        };

        match dataset::load_sites(state.watcher.locations_path(), state.watcher.hosts_path()) {
            Ok(sites) => {
                info!(sites = sites.len(), "sources changed, site list reloaded");
                state.sites = Arc::new(sites);
                state.watcher.commit(fingerprint);
                // The cached snapshot was computed from the replaced list.
                state.cached = None;
            }
            Err(err) => {
                warn!(error = %err, "source reload failed, keeping previous site list");
            }
        }
    }

    async fn compute(&self, sites: &[Site]) -> AggregateSnapshot {
        let entries = stream::iter(sites.iter().cloned())
            .map(|site| self.probe_site(site))
            .buffered(self.config.probe_concurrency.max(1))
            .collect::<Vec<_>>()
            .await;

        AggregateSnapshot {
            computed_at: Utc::now(),
            entries,
        }
    }

    async fn probe_site(&self, site: Site) -> SiteStatus {
        let status = match timeout(self.config.probe_timeout, self.backend.query(&site.host_id)).await {
            Ok(Ok(status)) => status,
            Ok(Err(err)) => {
                warn!(host = %site.host_id, error = %err, "monitoring query failed");
                HostStatus::unknown()
            }
            Err(_) => {
                warn!(
                    host = %site.host_id,
                    timeout_ms = %self.config.probe_timeout.as_millis(),
                    "monitoring query timed out"
                );
                HostStatus::unknown()
            }
        };

        SiteStatus { site, status }
    }
}
