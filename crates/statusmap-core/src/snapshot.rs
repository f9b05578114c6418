use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::dataset::Site;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HostState {
    Up,
    Down,
    Warning,
    Unknown,
}

impl HostState {
    pub fn as_str(&self) -> &'static str {
        match self {
            HostState::Up => "UP",
            HostState::Down => "DOWN",
            HostState::Warning => "WARNING",
            HostState::Unknown => "UNKNOWN",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostStatus {
    pub state: HostState,
    pub is_flapping: bool,
    pub last_time_down: i64,
    pub last_time_up: i64,
    pub downtime_secs: i64,
    pub plugin_output: String,
}

impl HostStatus {
    // Served for a host that could not be queried at all.
    pub fn unknown() -> Self {
        Self {
            state: HostState::Unknown,
            is_flapping: false,
            last_time_down: 0,
            last_time_up: 0,
            downtime_secs: 0,
            plugin_output: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteStatus {
    pub site: Site,
    pub status: HostStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregateSnapshot {
    pub computed_at: DateTime<Utc>,
    pub entries: Vec<SiteStatus>,
}

impl AggregateSnapshot {
    pub fn to_rows(&self) -> Vec<StatusRow> {
        self.entries.iter().map(SiteStatus::to_row).collect()
    }
}

impl SiteStatus {
    pub fn to_row(&self) -> StatusRow {
        StatusRow {
            nome: self.site.name.clone(),
            lat: self.site.latitude,
            lng: self.site.longitude,
            host: self.site.host_id.clone(),
            status: self.status.state,
            status_nagios: self.status.state,
            is_flapping: self.status.is_flapping,
            last_time_down: self.status.last_time_down,
            last_time_up: self.status.last_time_up,
            // Seconds, not milliseconds. The dashboard reads this key by
            // name, so the misnomer is part of the contract.
            last_downtime_duration_ms: self.status.downtime_secs,
            last_downtime_duration_human: format_duration_dhms(self.status.downtime_secs),
            plugin_output: self.status.plugin_output.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusRow {
    pub nome: String,
    pub lat: f64,
    pub lng: f64,
    pub host: String,
    pub status: HostState,
    pub status_nagios: HostState,
    pub is_flapping: bool,
    pub last_time_down: i64,
    pub last_time_up: i64,
    pub last_downtime_duration_ms: i64,
    pub last_downtime_duration_human: String,
    pub plugin_output: String,
}

pub fn format_duration_dhms(total_secs: i64) -> String {
    let total = total_secs.max(0);
    let days = total / 86_400;
    let hours = (total % 86_400) / 3_600;
    let minutes = (total % 3_600) / 60;
    let seconds = total % 60;

    if days > 0 {
        format!("{days}d {hours:02}h {minutes:02}m {seconds:02}s")
    } else {
        format!("{hours:02}h {minutes:02}m {seconds:02}s")
    }
}
