use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;

use crate::error::{Result, SessionGuardError};

/// Small JSON payload written next to the lockfile so a competing process can
/// inspect who holds it without parsing `/proc`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockSidecar {
    pub pid: u32,
    pub purpose: String,
    pub acquired_at: DateTime<Utc>,
}

impl LockSidecar {
    pub fn new(purpose: &str) -> Self {
        Self {
            pid: std::process::id(),
            purpose: purpose.to_string(),
            acquired_at: Utc::now(),
        }
    }

    pub fn is_stale(&self, max_age: chrono::Duration) -> bool {
        Utc::now() - self.acquired_at > max_age
    }

    /// Write atomically: write to a temp file in the same directory, then
    /// rename over the destination. This avoids a reader ever observing a
    /// half-written sidecar.
    pub fn write_atomic(&self, path: &Path) -> Result<()> {
        let tmp_path = path.with_extension("tmp");
        let body = serde_json::to_vec_pretty(self)
            .map_err(|e| SessionGuardError::CorruptSidecar(e.to_string()))?;
        {
            let mut f = std::fs::File::create(&tmp_path)?;
            f.write_all(&body)?;
            f.sync_all()?;
        }
        std::fs::rename(&tmp_path, path)?;
        Ok(())
    }

    pub fn read(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let body = std::fs::read(path)?;
        let sidecar: LockSidecar = serde_json::from_slice(&body)
            .map_err(|e| SessionGuardError::CorruptSidecar(e.to_string()))?;
        Ok(Some(sidecar))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrips_through_atomic_write() {
        let dir = std::env::temp_dir().join(format!("sentinel-sidecar-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("session.lock.json");

        let sidecar = LockSidecar::new("fetch");
        sidecar.write_atomic(&path).unwrap();

        let read_back = LockSidecar::read(&path).unwrap().unwrap();
        assert_eq!(read_back.pid, sidecar.pid);
        assert_eq!(read_back.purpose, "fetch");
        assert!(!read_back.is_stale(chrono::Duration::minutes(5)));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn missing_sidecar_reads_as_none() {
        let result = LockSidecar::read(Path::new("/nonexistent/sidecar.json")).unwrap();
        assert!(result.is_none());
    }
}
