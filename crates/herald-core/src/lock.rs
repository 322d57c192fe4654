//! Named mutual-exclusion contract and a process-local implementation.
//!
//! Acquisition never waits: a held name is reported as unavailable and the
//! caller decides whether to retry.

use std::collections::HashSet;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::Mutex;

/// Non-blocking named lock.
#[async_trait]
pub trait LockService: Send + Sync {
    /// Take `name` if nobody holds it. Returns `false` if it is held.
    async fn try_acquire(&self, name: &str) -> Result<bool>;

    /// Give up `name`. Releasing a name that is not held is not an error.
    async fn release(&self, name: &str) -> Result<()>;
}

const _: () = {
    fn _assert_object_safe(_: &dyn LockService) {}
};

/// Lock names held within this process.
#[derive(Debug, Default)]
pub struct MemoryLockService {
    held: Mutex<HashSet<String>>,
}

impl MemoryLockService {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn is_held(&self, name: &str) -> bool {
        self.held.lock().await.contains(name)
    }
}

#[async_trait]
impl LockService for MemoryLockService {
    async fn try_acquire(&self, name: &str) -> Result<bool> {
        Ok(self.held.lock().await.insert(name.to_string()))
    }

    async fn release(&self, name: &str) -> Result<()> {
        self.held.lock().await.remove(name);
        Ok(())
    }
}
