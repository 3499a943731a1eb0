//! Generic bounded object pool
//!
//! Hands out shared objects built by an asynchronous factory, grows up to an
//! optional maximum and recycles released objects. When the pool is full,
//! callers wait in FIFO order and a released object is handed straight to
//! the oldest waiter without ever being marked free in between.

use crate::{Error, Result};
use futures::future::BoxFuture;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// Asynchronous constructor of pooled objects
pub type ObjectFactory<T> = Arc<dyn Fn() -> BoxFuture<'static, Result<Arc<T>>> + Send + Sync>;

/// Snapshot of a pool's occupancy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolStats {
    /// Buckets alive, including ones whose object is still being built
    pub size: usize,
    /// Buckets holding an object nobody uses
    pub free: usize,
    /// Callers waiting for a release
    pub waiting: usize,
}

struct Bucket<T: ?Sized> {
    id: u64,
    /// `None` while the factory is still building the object
    payload: Option<Arc<T>>,
    free: bool,
}

/// What a waiter receives
enum Handoff<T: ?Sized> {
    /// Ownership of a released object
    Object(Arc<T>),
    /// A construction failed and freed capacity; try again
    Retry,
}

struct PoolInner<T: ?Sized> {
    buckets: Vec<Bucket<T>>,
    waiters: VecDeque<oneshot::Sender<Handoff<T>>>,
    next_id: u64,
}

enum Plan<T: ?Sized> {
    Ready(Arc<T>),
    Grow(u64),
    Wait(oneshot::Receiver<Handoff<T>>),
}

/// Pool of `Arc<T>` objects, identified by pointer
pub struct ObjectsPool<T: ?Sized + Send + Sync + 'static> {
    name: String,
    factory: ObjectFactory<T>,
    /// `None` means unbounded
    max: Option<usize>,
    inner: Mutex<PoolInner<T>>,
}

impl<T: ?Sized + Send + Sync + 'static> ObjectsPool<T> {
    pub fn new(name: impl Into<String>, factory: ObjectFactory<T>, max: Option<usize>) -> Self {
        Self {
            name: name.into(),
            factory,
            max,
            inner: Mutex::new(PoolInner {
                buckets: Vec::new(),
                waiters: VecDeque::new(),
                next_id: 0,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn max(&self) -> Option<usize> {
        self.max
    }

    /// Get an object: a free one if any, a new one while under the maximum,
    /// otherwise the next one released (first come, first served).
    ///
    /// A construction failure frees the capacity it reserved and is returned
    /// to this caller only; the oldest waiter then gets a chance to grow the
    /// pool itself.
    pub async fn acquire(&self) -> Result<Arc<T>> {
        loop {
            match self.plan() {
                Plan::Ready(object) => return Ok(object),
                Plan::Grow(id) => return self.grow(id).await,
                Plan::Wait(receiver) => {
                    let mut waiter = Waiter {
                        pool: self,
                        receiver: Some(receiver),
                    };
                    match waiter.wait().await? {
                        Handoff::Object(object) => return Ok(object),
                        Handoff::Retry => continue,
                    }
                }
            }
        }
    }

    /// Give an object back. It goes to the oldest waiter, or becomes free.
    pub fn release(&self, object: &Arc<T>) -> Result<()> {
        let mut inner = self.lock();
        let target = object_key(object);

        let bucket = inner
            .buckets
            .iter()
            .position(|b| b.payload.as_ref().map(object_key) == Some(target))
            .ok_or_else(|| {
                Error::ForeignObject(format!("object does not belong to pool {}", self.name))
            })?;

        if inner.buckets[bucket].free {
            return Err(Error::ForeignObject(format!(
                "object already released to pool {}",
                self.name
            )));
        }

        while let Some(waiter) = inner.waiters.pop_front() {
            // A closed receiver means that acquisition was cancelled
            if waiter.send(Handoff::Object(Arc::clone(object))).is_ok() {
                debug!(
                    "Pool {}: bucket {} handed to a waiter",
                    self.name, inner.buckets[bucket].id
                );
                return Ok(());
            }
        }

        inner.buckets[bucket].free = true;
        Ok(())
    }

    pub fn stats(&self) -> PoolStats {
        let inner = self.lock();
        PoolStats {
            size: inner.buckets.len(),
            free: inner.buckets.iter().filter(|b| b.free).count(),
            waiting: inner.waiters.iter().filter(|w| !w.is_closed()).count(),
        }
    }

    fn plan(&self) -> Plan<T> {
        let mut inner = self.lock();

        if let Some(bucket) = inner.buckets.iter_mut().find(|b| b.free) {
            if let Some(object) = &bucket.payload {
                bucket.free = false;
                return Plan::Ready(Arc::clone(object));
            }
        }

        if self.max.map_or(true, |max| inner.buckets.len() < max) {
            let id = inner.next_id;
            inner.next_id += 1;
            inner.buckets.push(Bucket {
                id,
                payload: None,
                free: false,
            });
            return Plan::Grow(id);
        }

        let (sender, receiver) = oneshot::channel();
        inner.waiters.push_back(sender);
        Plan::Wait(receiver)
    }

    async fn grow(&self, id: u64) -> Result<Arc<T>> {
        let pending = PendingBucket {
            pool: self,
            id,
            filled: false,
        };

        debug!("Pool {}: building object for bucket {}", self.name, id);
        let object = (self.factory)().await?;
        pending.fill(&object);
        Ok(object)
    }

    fn remove_bucket(&self, id: u64) {
        let mut inner = self.lock();
        inner.buckets.retain(|b| b.id != id);
        Self::wake_for_retry(&mut inner);
    }

    fn wake_for_retry(inner: &mut PoolInner<T>) {
        while let Some(waiter) = inner.waiters.pop_front() {
            if waiter.send(Handoff::Retry).is_ok() {
                return;
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, PoolInner<T>> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn object_key<T: ?Sized>(object: &Arc<T>) -> *const () {
    Arc::as_ptr(object) as *const ()
}

/// Reserved bucket; removed again unless the object gets built
struct PendingBucket<'a, T: ?Sized + Send + Sync + 'static> {
    pool: &'a ObjectsPool<T>,
    id: u64,
    filled: bool,
}

impl<T: ?Sized + Send + Sync + 'static> PendingBucket<'_, T> {
    fn fill(mut self, object: &Arc<T>) {
        let mut inner = self.pool.lock();
        if let Some(bucket) = inner.buckets.iter_mut().find(|b| b.id == self.id) {
            bucket.payload = Some(Arc::clone(object));
        }
        self.filled = true;
    }
}

impl<T: ?Sized + Send + Sync + 'static> Drop for PendingBucket<'_, T> {
    fn drop(&mut self) {
        if !self.filled {
            warn!(
                "Pool {}: construction for bucket {} failed or was abandoned",
                self.pool.name, self.id
            );
            self.pool.remove_bucket(self.id);
        }
    }
}

/// Queued acquisition; if dropped before completing, whatever was already
/// handed over is passed on so nothing leaks.
struct Waiter<'a, T: ?Sized + Send + Sync + 'static> {
    pool: &'a ObjectsPool<T>,
    receiver: Option<oneshot::Receiver<Handoff<T>>>,
}

impl<T: ?Sized + Send + Sync + 'static> Waiter<'_, T> {
    async fn wait(&mut self) -> Result<Handoff<T>> {
        let receiver = match self.receiver.as_mut() {
            Some(receiver) => receiver,
            None => return Err(Error::Internal("waiter polled twice".to_string())),
        };
        let handoff = receiver
            .await
            .map_err(|_| Error::PoolClosed(self.pool.name.clone()))?;
        self.receiver = None;
        Ok(handoff)
    }
}

impl<T: ?Sized + Send + Sync + 'static> Drop for Waiter<'_, T> {
    fn drop(&mut self) {
        let Some(mut receiver) = self.receiver.take() else {
            return;
        };
        receiver.close();
        match receiver.try_recv() {
            Ok(Handoff::Object(object)) => {
                if let Err(e) = self.pool.release(&object) {
                    warn!("Pool {}: could not pass on object: {}", self.pool.name, e);
                }
            }
            Ok(Handoff::Retry) => {
                let mut inner = self.pool.lock();
                ObjectsPool::<T>::wake_for_retry(&mut inner);
            }
            Err(_) => {}
        }
    }
}
