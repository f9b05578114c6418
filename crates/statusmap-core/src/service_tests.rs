use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;

use crate::config::ServiceConfig;
use crate::dataset::DatasetError;
use crate::nagios::{MonitoringBackend, QueryError};
use crate::service::StatusService;
use crate::snapshot::{HostState, HostStatus};

fn make_temp_dir(name: &str) -> PathBuf {
    let mut path = env::temp_dir();
    let uniq = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .expect("unix epoch")
        .as_nanos();
    path.push(format!("statusmap-tests-{name}-{uniq}"));
    fs::create_dir_all(&path).expect("create temp dir");
    path
}

const ONE_LOCATION: &str = "Municipio,Latitude,Longitude\nAlegrete,-29.78,-55.79\n";
const ONE_HOST: &str = "Host\nalegrete\n";
const TWO_LOCATIONS: &str =
    "Municipio,Latitude,Longitude\nAlegrete,-29.78,-55.79\nBage,-31.33,-54.10\n";
const TWO_HOSTS: &str = "Host\nalegrete\nbage\n";

fn write_sources(dir: &Path, locations: &str, hosts: &str) -> (PathBuf, PathBuf) {
    let locations_path = dir.join("locations.csv");
    let hosts_path = dir.join("hosts.csv");
    fs::write(&locations_path, locations).expect("write locations");
    fs::write(&hosts_path, hosts).expect("write hosts");
    (locations_path, hosts_path)
}

#[derive(Default)]
struct ScriptedBackend {
    calls: Arc<AtomicUsize>,
    fail: Vec<String>,
    slow: Vec<String>,
    slow_for: Duration,
}

impl ScriptedBackend {
    fn up_status() -> HostStatus {
        HostStatus {
            state: HostState::Up,
            is_flapping: false,
            last_time_down: 1_755_000_000,
            last_time_up: 1_755_003_600,
            downtime_secs: 60,
            plugin_output: "PING OK - Packet loss = 0%".to_string(),
        }
    }
}

#[async_trait]
impl MonitoringBackend for ScriptedBackend {
    async fn query(&self, host_id: &str) -> Result<HostStatus, QueryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if self.slow.iter().any(|h| h == host_id) {
            tokio::time::sleep(self.slow_for).await;
        }
        if self.fail.iter().any(|h| h == host_id) {
            return Err(QueryError::Payload);
        }

        Ok(Self::up_status())
    }
}

fn config(freshness: Duration) -> ServiceConfig {
    ServiceConfig {
        freshness_window: freshness,
        probe_timeout: Duration::from_secs(1),
        probe_concurrency: 2,
    }
}

#[tokio::test]
async fn snapshot_is_cached_within_the_freshness_window() {
    // Arrange
    let dir = make_temp_dir("cache-hit");
    let (locations, hosts) = write_sources(&dir, ONE_LOCATION, ONE_HOST);
    let calls = Arc::new(AtomicUsize::new(0));
    let backend = ScriptedBackend {
        calls: calls.clone(),
        ..ScriptedBackend::default()
    };
    let service =
        StatusService::new(backend, config(Duration::from_secs(60)), &locations, &hosts)
            .expect("service");

    // Act
    let first = service.get_status().await;
    let second = service.get_status().await;

    // Assert
    assert!(Arc::ptr_eq(&first, &second), "same snapshot served");
    assert_eq!(calls.load(Ordering::SeqCst), 1, "one query per host per pass");

    let _ = fs::remove_dir_all(dir);
}

#[tokio::test]
async fn expired_cache_triggers_a_new_pass() {
    // Arrange
    let dir = make_temp_dir("cache-expiry");
    let (locations, hosts) = write_sources(&dir, ONE_LOCATION, ONE_HOST);
    let calls = Arc::new(AtomicUsize::new(0));
    let backend = ScriptedBackend {
        calls: calls.clone(),
        ..ScriptedBackend::default()
    };
    let service =
        StatusService::new(backend, config(Duration::from_millis(30)), &locations, &hosts)
            .expect("service");

    // Act
    let first = service.get_status().await;
    tokio::time::sleep(Duration::from_millis(60)).await;
    let second = service.get_status().await;

    // Assert
    assert!(!Arc::ptr_eq(&first, &second), "new snapshot after expiry");
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    let _ = fs::remove_dir_all(dir);
}

#[tokio::test]
async fn backend_failure_degrades_only_that_host() {
    // Arrange
    let dir = make_temp_dir("degrade");
    let (locations, hosts) = write_sources(&dir, TWO_LOCATIONS, TWO_HOSTS);
    let backend = ScriptedBackend {
        fail: vec!["bage".to_string()],
        ..ScriptedBackend::default()
    };
    let service =
        StatusService::new(backend, config(Duration::from_secs(60)), &locations, &hosts)
            .expect("service");

    // Act
    let snapshot = service.get_status().await;

    // Assert
    assert_eq!(snapshot.entries.len(), 2, "site order and count preserved");
    assert_eq!(snapshot.entries[0].site.name, "Alegrete");
    assert_eq!(snapshot.entries[0].status.state, HostState::Up);
    assert_eq!(snapshot.entries[1].site.name, "Bage");
    assert_eq!(snapshot.entries[1].status, HostStatus::unknown());

    let _ = fs::remove_dir_all(dir);
}

#[tokio::test]
async fn slow_host_times_out_without_poisoning_the_pass() {
    // Arrange
    let dir = make_temp_dir("timeout");
    let (locations, hosts) = write_sources(&dir, TWO_LOCATIONS, TWO_HOSTS);
    let backend = ScriptedBackend {
        slow: vec!["bage".to_string()],
        slow_for: Duration::from_secs(5),
        ..ScriptedBackend::default()
    };
    let service = StatusService::new(
        backend,
        ServiceConfig {
            freshness_window: Duration::from_secs(60),
            probe_timeout: Duration::from_millis(50),
            probe_concurrency: 2,
        },
        &locations,
        &hosts,
    )
    .expect("service");

    // Act
    let snapshot = service.get_status().await;

    // Assert
    assert_eq!(snapshot.entries[0].status.state, HostState::Up);
    assert_eq!(snapshot.entries[1].status, HostStatus::unknown());

    let _ = fs::remove_dir_all(dir);
}

#[tokio::test]
async fn concurrent_callers_share_one_computation() {
    // Arrange
    let dir = make_temp_dir("single-flight");
    let (locations, hosts) = write_sources(&dir, ONE_LOCATION, ONE_HOST);
    let calls = Arc::new(AtomicUsize::new(0));
    let backend = ScriptedBackend {
        calls: calls.clone(),
        slow: vec!["alegrete".to_string()],
        slow_for: Duration::from_millis(100),
        ..ScriptedBackend::default()
    };
    let service =
        StatusService::new(backend, config(Duration::from_secs(60)), &locations, &hosts)
            .expect("service");

    // Act
    let (a, b, c) = tokio::join!(
        service.get_status(),
        service.get_status(),
        service.get_status()
    );

    // Assert
    assert_eq!(calls.load(Ordering::SeqCst), 1, "one underlying pass");
    assert!(Arc::ptr_eq(&a, &b));
    assert!(Arc::ptr_eq(&b, &c));

    let _ = fs::remove_dir_all(dir);
}

#[tokio::test]
async fn source_change_is_visible_on_the_next_request() {
    // Arrange
    let dir = make_temp_dir("reload");
    let (locations, hosts) = write_sources(&dir, ONE_LOCATION, ONE_HOST);
    let calls = Arc::new(AtomicUsize::new(0));
    let backend = ScriptedBackend {
        calls: calls.clone(),
        ..ScriptedBackend::default()
    };
    let service =
        StatusService::new(backend, config(Duration::from_secs(3_600)), &locations, &hosts)
            .expect("service");

    let first = service.get_status().await;
    assert_eq!(first.entries.len(), 1);

    // Act
    tokio::time::sleep(Duration::from_millis(25)).await;
    write_sources(&dir, TWO_LOCATIONS, TWO_HOSTS);
    let second = service.get_status().await;

    // Assert
    assert_eq!(second.entries.len(), 2, "reload wins over a fresh cache");
    assert_eq!(second.entries[0].site.name, "Alegrete");
    assert_eq!(second.entries[1].site.name, "Bage");
    assert_eq!(calls.load(Ordering::SeqCst), 3, "one pass of one, one pass of two");

    let _ = fs::remove_dir_all(dir);
}

#[tokio::test]
async fn failed_reload_keeps_the_previous_site_list_and_retries() {
    // Arrange
    let dir = make_temp_dir("reload-fail");
    let (locations, hosts) = write_sources(&dir, ONE_LOCATION, ONE_HOST);
    let calls = Arc::new(AtomicUsize::new(0));
    let backend = ScriptedBackend {
        calls: calls.clone(),
        ..ScriptedBackend::default()
    };
    let service = StatusService::new(backend, config(Duration::ZERO), &locations, &hosts)
        .expect("service");

    let first = service.get_status().await;
    assert_eq!(first.entries.len(), 1);

    // Act: break the hosts file, the service must keep serving
    tokio::time::sleep(Duration::from_millis(25)).await;
    fs::write(&hosts, "Equipamento\nx\n").expect("break hosts");
    let degraded = service.get_status().await;

    // and pick the fix up afterwards without a restart
    fs::write(&hosts, TWO_HOSTS).expect("fix hosts");
    fs::write(&locations, TWO_LOCATIONS).expect("grow locations");
    let repaired = service.get_status().await;

    // Assert
    assert_eq!(degraded.entries.len(), 1, "previous list kept on bad reload");
    assert_eq!(repaired.entries.len(), 2, "retry succeeded after the fix");

    let _ = fs::remove_dir_all(dir);
}

#[tokio::test]
async fn empty_join_produces_an_empty_snapshot() {
    // Arrange
    let dir = make_temp_dir("empty");
    let (locations, hosts) = write_sources(
        &dir,
        "Municipio,Latitude,Longitude\nSem Host,-30.0,-50.0\n",
        ONE_HOST,
    );
    let calls = Arc::new(AtomicUsize::new(0));
    let backend = ScriptedBackend {
        calls: calls.clone(),
        ..ScriptedBackend::default()
    };
    let service =
        StatusService::new(backend, config(Duration::from_secs(60)), &locations, &hosts)
            .expect("service");

    // Act
    let snapshot = service.get_status().await;

    // Assert
    assert!(snapshot.entries.is_empty());
    assert_eq!(calls.load(Ordering::SeqCst), 0, "nothing to query");

    let _ = fs::remove_dir_all(dir);
}

#[tokio::test]
async fn unloadable_sources_refuse_to_start() {
    // Arrange
    let dir = make_temp_dir("no-start");
    let hosts = dir.join("hosts.csv");
    fs::write(&hosts, ONE_HOST).expect("write hosts");

    // Act
    let result = StatusService::new(
        ScriptedBackend::default(),
        config(Duration::from_secs(60)),
        dir.join("missing.csv"),
        &hosts,
    );

    // Assert
    assert!(matches!(result, Err(DatasetError::Read { .. })));

    let _ = fs::remove_dir_all(dir);
}
