use anyhow::{Context, Result};
use fs2::FileExt;
use std::fs::File;
use std::path::Path;

/// Exclusive advisory lock serializing IP-map and site-registry mutations
/// across concurrently-running invocations against the same workspace.
/// Released unconditionally on drop.
#[derive(Debug)]
pub struct WorkflowLock {
    file: File,
}

impl WorkflowLock {
    /// Blocks until the lock is held.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock file cannot be created or locked.
    pub fn acquire(path: &Path) -> Result<Self> {
        let file = File::create(path)
            .with_context(|| format!("failed to create lock file {}", path.display()))?;
        file.lock_exclusive()
            .with_context(|| format!("failed to lock {}", path.display()))?;
        Ok(Self { file })
    }
}

impl Drop for WorkflowLock {
    fn drop(&mut self) {
        let _ = fs2::FileExt::unlock(&self.file);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_is_reacquirable_after_drop() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join(".dockdev.lock");
        {
            let _guard = WorkflowLock::acquire(&path).unwrap();
        }
        let _guard = WorkflowLock::acquire(&path).unwrap();
    }
}
