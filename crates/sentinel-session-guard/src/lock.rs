use std::fs::{File, OpenOptions};
use std::os::unix::io::AsRawFd;
use std::path::Path;

use crate::error::Result;

/// Thin wrapper over a POSIX advisory `flock(2)` exclusive lock.
///
/// The lock is released automatically when the OS closes the underlying file
/// descriptor, which happens on both clean drop and process crash — this is
/// what makes flock suitable for crash-safe exclusivity without relying on
/// Rust destructor ordering across a panic unwind.
pub struct FileLock {
    file: File,
}

impl FileLock {
    /// Open (creating if needed) the lockfile at `path` without acquiring it.
    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .open(path)?;
        Ok(Self { file })
    }

    /// Attempt a single non-blocking exclusive lock acquisition.
    ///
    /// Returns `Ok(true)` if the lock was acquired, `Ok(false)` if another
    /// process currently holds it.
    pub fn try_acquire(&self) -> Result<bool> {
        let fd = self.file.as_raw_fd();
        let rc = unsafe { libc::flock(fd, libc::LOCK_EX | libc::LOCK_NB) };
        if rc == 0 {
            Ok(true)
        } else {
            let errno = std::io::Error::last_os_error();
            match errno.raw_os_error() {
                Some(libc::EWOULDBLOCK) => Ok(false),
                _ => Err(errno.into()),
            }
        }
    }

    /// Release the lock explicitly. Also happens implicitly on drop via fd close.
    pub fn release(&self) -> Result<()> {
        let fd = self.file.as_raw_fd();
        let rc = unsafe { libc::flock(fd, libc::LOCK_UN) };
        if rc != 0 {
            return Err(std::io::Error::last_os_error().into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_handle_cannot_acquire_while_first_holds() {
        let dir = std::env::temp_dir().join(format!("sentinel-lock-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("flock.test");

        let first = FileLock::open(&path).unwrap();
        assert!(first.try_acquire().unwrap());

        let second = FileLock::open(&path).unwrap();
        assert!(!second.try_acquire().unwrap());

        first.release().unwrap();
        assert!(second.try_acquire().unwrap());

        std::fs::remove_dir_all(&dir).ok();
    }
}
