use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceFingerprint {
    locations_modified: SystemTime,
    hosts_modified: SystemTime,
}

pub struct SourceWatcher {
    locations: PathBuf,
    hosts: PathBuf,
    committed: SourceFingerprint,
}

impl SourceWatcher {
    pub fn new(locations: impl Into<PathBuf>, hosts: impl Into<PathBuf>) -> io::Result<Self> {
        let locations = locations.into();
        let hosts = hosts.into();
        let committed = Self::stat(&locations, &hosts)?;

        Ok(Self {
            locations,
            hosts,
            committed,
        })
    }

    pub fn locations_path(&self) -> &Path {
        &self.locations
    }

    pub fn hosts_path(&self) -> &Path {
        &self.hosts
    }

    // Any mtime difference counts as a change, newer or older.
    pub fn probe(&self) -> io::Result<Option<SourceFingerprint>> {
        let current = Self::stat(&self.locations, &self.hosts)?;
        if current == self.committed {
            Ok(None)
        } else {
            Ok(Some(current))
        }
    }

    // A failed reload must not commit, so the change is retried on the
    // next probe.
    pub fn commit(&mut self, fingerprint: SourceFingerprint) {
        self.committed = fingerprint;
    }

    fn stat(locations: &Path, hosts: &Path) -> io::Result<SourceFingerprint> {
        Ok(SourceFingerprint {
            locations_modified: fs::metadata(locations)?.modified()?,
            hosts_modified: fs::metadata(hosts)?.modified()?,
        })
    }
}
