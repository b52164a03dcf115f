use std::ops::{Deref, DerefMut};
use std::sync::Mutex;

use thiserror::Error;
use tokio::sync::{Semaphore, SemaphorePermit};

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("Session pool is closed")]
    Closed,

    #[error("Session pool has no idle session")]
    Exhausted,
}

/// Fixed set of sessions, each held by at most one worker at a time
pub struct SessionPool<T> {
    idle: Mutex<Vec<T>>,
    permits: Semaphore,
}

impl<T> SessionPool<T> {
    pub fn new(sessions: Vec<T>) -> Self {
        let permits = Semaphore::new(sessions.len());
        Self {
            idle: Mutex::new(sessions),
            permits,
        }
    }

    /// Build `size` sessions (at least one) with `make`
    #[cfg(test)]
    fn with_size(size: usize, make: impl FnMut(usize) -> T) -> Self {
        Self::new((0..size.max(1)).map(make).collect())
    }

    /// Wait for an idle session and take exclusive ownership of it
    pub async fn checkout(&self) -> Result<PooledSession<'_, T>, PoolError> {
        let permit = self.permits.acquire().await.map_err(|_| PoolError::Closed)?;
        let session = self
            .idle
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pop()
            .ok_or(PoolError::Exhausted)?;

        Ok(PooledSession {
            session: Some(session),
            pool: self,
            _permit: permit,
        })
    }

    #[cfg(test)]
    fn available(&self) -> usize {
        self.permits.available_permits()
    }
}

/// A checked-out session; returned to the pool on drop
pub struct PooledSession<'a, T> {
    session: Option<T>,
    pool: &'a SessionPool<T>,
    _permit: SemaphorePermit<'a>,
}

impl<T> Deref for PooledSession<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.session.as_ref().expect("session present until drop")
    }
}

impl<T> DerefMut for PooledSession<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        self.session.as_mut().expect("session present until drop")
    }
}

impl<T> Drop for PooledSession<'_, T> {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            self.pool
                .idle
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .push(session);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_checkout_is_exclusive() {
        let pool = SessionPool::with_size(1, |i| i);

        let first = pool.checkout().await.unwrap();
        assert_eq!(*first, 0);
        assert_eq!(pool.available(), 0);

        let blocked = tokio::time::timeout(Duration::from_millis(20), pool.checkout()).await;
        assert!(blocked.is_err());

        drop(first);
        assert_eq!(pool.available(), 1);
        let again = pool.checkout().await.unwrap();
        assert_eq!(*again, 0);
    }

    #[tokio::test]
    async fn test_sessions_are_returned_with_state() {
        let pool = SessionPool::with_size(2, |_| 0u32);
        {
            let mut a = pool.checkout().await.unwrap();
            let mut b = pool.checkout().await.unwrap();
            *a += 1;
            *b += 10;
        }
        let mut total = 0;
        let a = pool.checkout().await.unwrap();
        let b = pool.checkout().await.unwrap();
        total += *a + *b;
        assert_eq!(total, 11);
    }
}
