use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::normalize::{normalize_key, strip_nbsp};

// Column-resolution rule table: a column binds to a field when its
// normalized header contains one of the fragments, first match wins.
// Header renames survive as long as the fragment does.
const NAME_KEYWORDS: &[&str] = &["municipio"];
const LATITUDE_KEYWORDS: &[&str] = &["latitude"];
const LONGITUDE_KEYWORDS: &[&str] = &["longitude"];
const HOST_KEYWORDS: &[&str] = &["host"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Site {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub host_id: String,
}

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("failed to read {path}: {reason}")]
    Read { path: String, reason: String },
    #[error("no {field} column in {path} (headers: {headers})")]
    Schema {
        path: String,
        field: &'static str,
        headers: String,
    },
    #[error("duplicate host key {key:?} in {path}")]
    DuplicateKey { key: String, path: String },
}

struct Table {
    path: String,
    headers: Vec<String>,
    rows: Vec<csv::StringRecord>,
}

impl Table {
    fn read(path: &Path) -> Result<Self, DatasetError> {
        let read_err = |err: csv::Error| DatasetError::Read {
            path: path.display().to_string(),
            reason: err.to_string(),
        };

        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(path)
            .map_err(read_err)?;

        let headers = reader
            .headers()
            .map_err(read_err)?
            .iter()
            .map(str::to_string)
            .collect();

        let mut rows = Vec::new();
        for record in reader.records() {
            rows.push(record.map_err(read_err)?);
        }

        Ok(Self {
            path: path.display().to_string(),
            headers,
            rows,
        })
    }

    fn find_column(&self, keywords: &[&str]) -> Option<usize> {
        self.headers.iter().position(|header| {
            let normalized = normalize_key(header);
            keywords.iter().any(|kw| normalized.contains(kw))
        })
    }

    fn require_column(&self, field: &'static str, keywords: &[&str]) -> Result<usize, DatasetError> {
        self.find_column(keywords).ok_or_else(|| DatasetError::Schema {
            path: self.path.clone(),
            field,
            headers: self.headers.join(", "),
        })
    }
}

pub fn load_sites(locations_path: &Path, hosts_path: &Path) -> Result<Vec<Site>, DatasetError> {
    let locations = Table::read(locations_path)?;
    let hosts = Table::read(hosts_path)?;

    let name_col = locations.require_column("location name", NAME_KEYWORDS)?;
    let lat_col = locations.require_column("latitude", LATITUDE_KEYWORDS)?;
    let lng_col = locations.require_column("longitude", LONGITUDE_KEYWORDS)?;
    let host_col = hosts.require_column("host", HOST_KEYWORDS)?;

    // The hosts table may carry its own location column; when it does not,
    // the host identifier doubles as the join key.
    let host_key_col = hosts.find_column(NAME_KEYWORDS);

    let mut host_by_key: HashMap<String, String> = HashMap::new();
    for record in &hosts.rows {
        let host_id = strip_nbsp(record.get(host_col).unwrap_or(""));
        if host_id.is_empty() {
            warn!(file = %hosts.path, "skipping host row without a host id");
            continue;
        }

        let raw_key = match host_key_col {
            Some(col) => record.get(col).unwrap_or(""),
            None => host_id.as_str(),
        };
        let key = normalize_key(raw_key);
        if key.is_empty() {
            warn!(file = %hosts.path, host = %host_id, "skipping host row without a join key");
            continue;
        }

        if host_by_key.insert(key.clone(), host_id).is_some() {
            return Err(DatasetError::DuplicateKey {
                key,
                path: hosts.path.clone(),
            });
        }
    }

    let mut sites = Vec::new();
    for record in &locations.rows {
        let raw_name = record.get(name_col).unwrap_or("");
        let name = strip_nbsp(raw_name);

        let Some(host_id) = host_by_key.get(&normalize_key(raw_name)) else {
            debug!(location = %name, "no monitored host for location, dropped");
            continue;
        };

        let lat = parse_coordinate(record.get(lat_col));
        let lng = parse_coordinate(record.get(lng_col));
        let (Some(latitude), Some(longitude)) = (lat, lng) else {
            warn!(location = %name, "unparseable coordinates, location dropped");
            continue;
        };

        sites.push(Site {
            name,
            latitude,
            longitude,
            host_id: host_id.clone(),
        });
    }

    Ok(sites)
}

fn parse_coordinate(field: Option<&str>) -> Option<f64> {
    field?
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
}
