//! Cross-process lock around the persisted session (fs2 flock).
//!
//! Two CLI invocations touching the same scene would otherwise interleave
//! their read-modify-write of `session.json`.

use anyhow::Result;
use fs2::FileExt;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

use crate::paths::Paths;

/// Advisory file lock next to the session file.
#[derive(Debug, Clone)]
pub struct SessionLock {
    path: PathBuf,
}

/// RAII guard that releases the lock on drop.
pub struct SessionLockGuard {
    file: File,
}

impl Drop for SessionLockGuard {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

impl SessionLock {
    pub fn new(paths: &Paths) -> Result<Self> {
        Self::at(&paths.session_lock())
    }

    pub fn at(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    /// Blocking acquire.
    pub fn acquire(&self) -> Result<SessionLockGuard> {
        let file = File::create(&self.path)?;
        file.lock_exclusive()?;
        Ok(SessionLockGuard { file })
    }

    /// Non-blocking acquire; `None` if another process holds the lock.
    pub fn try_acquire(&self) -> Result<Option<SessionLockGuard>> {
        let file = File::create(&self.path)?;
        match file.try_lock_exclusive() {
            Ok(()) => Ok(Some(SessionLockGuard { file })),
            Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => Ok(None),
            #[cfg(unix)]
            Err(ref e) if e.raw_os_error() == Some(libc::EWOULDBLOCK) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Barrier};

    #[test]
    fn acquire_and_release() {
        let tmp = tempfile::tempdir().unwrap();
        let lock = SessionLock::at(&tmp.path().join("session.lock")).unwrap();

        let guard = lock.acquire().unwrap();
        drop(guard);
        let _again = lock.acquire().unwrap();
    }

    #[test]
    fn try_acquire_returns_none_when_held() {
        let tmp = tempfile::tempdir().unwrap();
        let lock_path = tmp.path().join("session.lock");

        let file = File::create(&lock_path).unwrap();
        file.lock_exclusive().unwrap();

        let lock = SessionLock::at(&lock_path).unwrap();
        assert!(lock.try_acquire().unwrap().is_none());

        file.unlock().unwrap();
        drop(file);
        assert!(lock.try_acquire().unwrap().is_some());
    }

    #[test]
    fn creates_parent_directories() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = Paths::under(tmp.path());
        let lock = SessionLock::new(&paths).unwrap();
        let _guard = lock.acquire().unwrap();
        assert!(paths.session_lock().exists());
    }

    #[test]
    fn concurrent_threads_serialize() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("session.lock");
        let counter = Arc::new(AtomicU32::new(0));
        let barrier = Arc::new(Barrier::new(3));

        let handles: Vec<_> = (0..3)
            .map(|_| {
                let p = path.clone();
                let c = counter.clone();
                let b = barrier.clone();
                std::thread::spawn(move || {
                    let lock = SessionLock::at(&p).unwrap();
                    b.wait();
                    let _guard = lock.acquire().unwrap();
                    c.fetch_add(1, Ordering::SeqCst);
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }
}
