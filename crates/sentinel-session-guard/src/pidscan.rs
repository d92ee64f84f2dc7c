use std::path::Path;

use crate::sidecar::LockSidecar;

/// Check whether a process with the given pid is currently alive, using the
/// POSIX `kill(pid, 0)` liveness probe (sends no signal, only checks
/// existence/permission).
fn pid_is_alive(pid: u32) -> bool {
    let rc = unsafe { libc::kill(pid as libc::pid_t, 0) };
    rc == 0
}

/// Scan `dir` for `*.worker.pid` sidecar files and return the first one that
/// names a still-alive process, other than `exclude_purpose == "worker"`
/// callers (who are themselves a worker and exempt from the check per
/// SPEC_FULL.md §4.2).
///
/// This is a redundant safety net on top of the flock: it catches a worker
/// whose lifecycle never goes through `with_session` at all (e.g. a stray
/// long-running process holding the upstream connection open outside the
/// guard's scope).
pub fn find_alive_worker(dir: &Path) -> Option<LockSidecar> {
    let entries = std::fs::read_dir(dir).ok()?;
    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("pid") {
            continue;
        }
        if let Ok(Some(sidecar)) = LockSidecar::read(&path) {
            if sidecar.purpose == "worker" && pid_is_alive(sidecar.pid) {
                return Some(sidecar);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_no_worker_in_empty_directory() {
        let dir = std::env::temp_dir().join(format!("sentinel-pidscan-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        assert!(find_alive_worker(&dir).is_none());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn finds_alive_worker_pidfile() {
        let dir = std::env::temp_dir().join(format!("sentinel-pidscan2-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let sidecar = LockSidecar::new("worker");
        sidecar.write_atomic(&dir.join("monitor.worker.pid")).unwrap();

        let found = find_alive_worker(&dir);
        assert!(found.is_some());
        assert_eq!(found.unwrap().pid, std::process::id());

        std::fs::remove_dir_all(&dir).ok();
    }
}
