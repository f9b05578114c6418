use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use thiserror::Error;

use crate::snapshot::{HostState, HostStatus};

#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("no host record in response")]
    Payload,
}

#[async_trait]
pub trait MonitoringBackend: Send + Sync {
    async fn query(&self, host_id: &str) -> Result<HostStatus, QueryError>;
}

pub struct NagiosClient {
    http: reqwest::Client,
    base_url: String,
    credentials: Credentials,
}

impl NagiosClient {
    pub fn new(
        base_url: impl Into<String>,
        credentials: Credentials,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            http,
            base_url: base_url.into(),
            credentials,
        })
    }
}

#[async_trait]
impl MonitoringBackend for NagiosClient {
    async fn query(&self, host_id: &str) -> Result<HostStatus, QueryError> {
        let response = self
            .http
            .get(&self.base_url)
            .query(&[("query", "host"), ("hostname", host_id)])
            .basic_auth(&self.credentials.username, Some(&self.credentials.password))
            .send()
            .await?
            .error_for_status()?;

        let body: Value = response.json().await?;
        let record = body
            .get("data")
            .and_then(|data| data.get("host"))
            .and_then(Value::as_object)
            .filter(|host| !host.is_empty())
            .ok_or(QueryError::Payload)?;

        Ok(host_status_from_record(record, Utc::now().timestamp()))
    }
}

pub fn classify_status(code: Option<i64>) -> HostState {
    match code {
        Some(2) => HostState::Up,
        Some(4) => HostState::Down,
        Some(0) => HostState::Unknown,
        _ => HostState::Warning,
    }
}

pub fn host_status_from_record(record: &serde_json::Map<String, Value>, now_epoch: i64) -> HostStatus {
    let state = classify_status(record.get("status").and_then(Value::as_i64));
    let is_flapping = record
        .get("is_flapping")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let last_time_down = record
        .get("last_time_down")
        .and_then(Value::as_i64)
        .unwrap_or(0);
    let last_time_up = record
        .get("last_time_up")
        .and_then(Value::as_i64)
        .unwrap_or(0);
    let plugin_output = record
        .get("plugin_output")
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string();

    // A host that never went down reports last_time_down == 0; the naive
    // now - last_time_down would claim an epoch-sized outage.
    let downtime_secs = if last_time_down <= 0 {
        0
    } else {
        (now_epoch - last_time_down).max(0)
    };

    HostStatus {
        state,
        is_flapping,
        last_time_down,
        last_time_up,
        downtime_secs,
        plugin_output,
    }
}
