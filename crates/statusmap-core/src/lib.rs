pub mod config;
pub mod dataset;
pub mod nagios;
pub mod normalize;
pub mod service;
pub mod snapshot;
pub mod watcher;

#[cfg(test)]
mod service_tests;

pub use config::ServiceConfig;
pub use dataset::{load_sites, DatasetError, Site};
pub use nagios::{Credentials, MonitoringBackend, NagiosClient, QueryError};
pub use service::StatusService;
pub use snapshot::{
    format_duration_dhms, AggregateSnapshot, HostState, HostStatus, SiteStatus, StatusRow,
};
pub use watcher::{SourceFingerprint, SourceWatcher};
