//! # Worker Pool
//!
//! Bounded queue plus a set of tokio worker tasks draining it.
//!
//! ## Overview
//!
//! - `core_pool_size` workers are spawned by [`WorkerPool::start`] and live
//!   until shutdown.
//! - When an item is enqueued and no worker is idle, an extra worker is
//!   spawned, up to `max_pool_size`. Extra workers exit after sitting idle
//!   for the keep-alive period.
//! - The queue is a bounded `mpsc` channel shared by all workers behind an
//!   async mutex, so items are taken strictly in FIFO order.
//!
//! ## Shutdown
//!
//! [`WorkerPool::shutdown`] closes the queue, lets workers drain it for the
//! grace period, then raises the force-stop signal. Workers still executing
//! at that point abandon their item, which is handed to
//! [`QueueHandler::on_interrupted`]. Items never picked up are handed to
//! [`QueueHandler::on_discarded`]. Every dequeued or discarded item gets
//! exactly one [`QueueHandler::release`], even when its worker is aborted.

use async_trait::async_trait;
use futures::future::join_all;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// How long forced termination waits for workers before aborting them
const FORCE_STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// Consumer side of the pool
#[async_trait]
pub trait QueueHandler: Send + Sync + 'static {
    /// Run one dequeued item. Dropped mid-way on forced termination.
    async fn process(&self, item: Uuid);

    /// Item whose processing was cut short by forced termination
    fn on_interrupted(&self, item: Uuid);

    /// Item still queued when the pool shut down
    fn on_discarded(&self, item: Uuid);

    /// Item left the queue for good
    fn release(&self, item: Uuid);
}

/// Sizing for the pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSettings {
    pub core_pool_size: usize,
    pub max_pool_size: usize,
    pub keep_alive: Duration,
    pub queue_capacity: usize,
}

/// Why an item was not enqueued
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueError {
    Full,
    Closed,
}

/// Outcome of [`WorkerPool::shutdown`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShutdownReport {
    /// Every worker finished within the grace period
    pub graceful: bool,
    /// Items whose execution was cut short
    pub interrupted: usize,
    /// Items that were still queued and never started
    pub discarded: usize,
}

struct PoolShared {
    receiver: tokio::sync::Mutex<mpsc::Receiver<Uuid>>,
    idle: AtomicUsize,
    live: AtomicUsize,
    force_stop: watch::Sender<bool>,
    in_flight: Mutex<HashSet<Uuid>>,
    handler: Arc<dyn QueueHandler>,
}

/// Releases its item when dropped, including when the worker is aborted
/// Tracks one dequeued item. Released on drop however processing ends; an
/// interrupted item stays in `in_flight` for the shutdown report.
struct InFlightGuard {
    shared: Arc<PoolShared>,
    item: Uuid,
    interrupted: bool,
}

impl InFlightGuard {
    fn new(shared: Arc<PoolShared>, item: Uuid) -> Self {
        shared.in_flight.lock().insert(item);
        Self {
            shared,
            item,
            interrupted: false,
        }
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if !self.interrupted {
            self.shared.in_flight.lock().remove(&self.item);
        }
        self.shared.handler.release(self.item);
    }
}

/// Keeps `live` accurate even when a worker task unwinds
struct LiveGuard {
    shared: Arc<PoolShared>,
    worker_id: usize,
}

impl Drop for LiveGuard {
    fn drop(&mut self) {
        self.shared.live.fetch_sub(1, Ordering::AcqRel);
        if std::thread::panicking() {
            error!(worker_id = self.worker_id, "❌ POOL: Worker panicked");
        } else {
            debug!(worker_id = self.worker_id, "👷 POOL: Worker exited");
        }
    }
}

pub struct WorkerPool {
    settings: PoolSettings,
    shared: Arc<PoolShared>,
    sender: Mutex<Option<mpsc::Sender<Uuid>>>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    next_worker_id: AtomicUsize,
    started: AtomicBool,
    shutting_down: AtomicBool,
}

impl fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerPool")
            .field("settings", &self.settings)
            .field("live_workers", &self.live_workers())
            .field("idle_workers", &self.idle_workers())
            .field("started", &self.started.load(Ordering::Acquire))
            .field("shutting_down", &self.is_shutting_down())
            .finish()
    }
}

impl WorkerPool {
    /// Create the pool and its queue. No workers run until [`WorkerPool::start`].
    pub fn new(settings: PoolSettings, handler: Arc<dyn QueueHandler>) -> Self {
        let (sender, receiver) = mpsc::channel(settings.queue_capacity.max(1));
        let (force_stop, _) = watch::channel(false);

        Self {
            settings,
            shared: Arc::new(PoolShared {
                receiver: tokio::sync::Mutex::new(receiver),
                idle: AtomicUsize::new(0),
                live: AtomicUsize::new(0),
                force_stop,
                in_flight: Mutex::new(HashSet::new()),
                handler,
            }),
            sender: Mutex::new(Some(sender)),
            handles: Mutex::new(Vec::new()),
            next_worker_id: AtomicUsize::new(1),
            started: AtomicBool::new(false),
            shutting_down: AtomicBool::new(false),
        }
    }

    pub fn settings(&self) -> &PoolSettings {
        &self.settings
    }

    pub fn live_workers(&self) -> usize {
        self.shared.live.load(Ordering::Acquire)
    }

    pub fn idle_workers(&self) -> usize {
        self.shared.idle.load(Ordering::Acquire)
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::Acquire)
    }

    /// Spawn the core workers. Must be called from within a tokio runtime.
    pub fn start(&self) {
        if self.is_shutting_down() {
            warn!("⚠️ POOL: start() called after shutdown, ignoring");
            return;
        }
        if self.started.swap(true, Ordering::AcqRel) {
            debug!("POOL: Already started");
            return;
        }

        info!(
            core_pool_size = self.settings.core_pool_size,
            max_pool_size = self.settings.max_pool_size,
            queue_capacity = self.settings.queue_capacity,
            "🚀 POOL: Starting worker pool"
        );

        let mut handles = self.handles.lock();
        for _ in 0..self.settings.core_pool_size {
            handles.push(self.spawn_worker(true));
        }
    }

    /// Non-blocking enqueue
    pub fn try_enqueue(&self, item: Uuid) -> Result<(), EnqueueError> {
        {
            let sender = self.sender.lock();
            let Some(sender) = sender.as_ref() else {
                return Err(EnqueueError::Closed);
            };
            sender.try_send(item).map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => EnqueueError::Full,
                mpsc::error::TrySendError::Closed(_) => EnqueueError::Closed,
            })?;
        }

        self.maybe_spawn_extra_worker();
        Ok(())
    }

    fn maybe_spawn_extra_worker(&self) {
        if !self.is_started() || self.idle_workers() > 0 {
            return;
        }

        let mut handles = self.handles.lock();
        if self.is_shutting_down() || self.live_workers() >= self.settings.max_pool_size {
            return;
        }

        handles.retain(|h| !h.is_finished());
        handles.push(self.spawn_worker(false));
        debug!(
            live_workers = self.live_workers(),
            max_pool_size = self.settings.max_pool_size,
            "🔼 POOL: Spawned extra worker"
        );
    }

    fn spawn_worker(&self, core: bool) -> JoinHandle<()> {
        let worker_id = self.next_worker_id.fetch_add(1, Ordering::Relaxed);
        let keep_alive = (!core).then_some(self.settings.keep_alive);
        let shared = self.shared.clone();

        // Counted before the task runs so concurrent spawn checks see it
        shared.live.fetch_add(1, Ordering::AcqRel);
        tokio::spawn(run_worker(shared, worker_id, keep_alive))
    }

    /// Close the queue, drain for `grace`, then force termination
    pub async fn shutdown(&self, grace: Duration) -> ShutdownReport {
        let mut handles = {
            let mut handles = self.handles.lock();
            if self.shutting_down.swap(true, Ordering::AcqRel) {
                debug!("POOL: Shutdown already performed");
                return ShutdownReport {
                    graceful: true,
                    ..Default::default()
                };
            }
            std::mem::take(&mut *handles)
        };

        info!(
            workers = handles.len(),
            grace_seconds = grace.as_secs_f64(),
            "🛑 POOL: Shutting down worker pool"
        );

        // Dropping the only sender lets workers see the end of the queue
        drop(self.sender.lock().take());

        let graceful = handles.is_empty()
            || tokio::time::timeout(grace, join_all(handles.iter_mut()))
                .await
                .is_ok();

        if !graceful {
            warn!(
                grace_seconds = grace.as_secs_f64(),
                "⚠️ POOL: Workers still busy after grace period, forcing termination"
            );
            self.shared.force_stop.send_replace(true);

            let mut remaining: Vec<_> = handles.into_iter().filter(|h| !h.is_finished()).collect();
            let stopped = tokio::time::timeout(FORCE_STOP_TIMEOUT, join_all(remaining.iter_mut()))
                .await
                .is_ok();
            if !stopped {
                remaining.retain(|h| !h.is_finished());
                warn!(
                    stragglers = remaining.len(),
                    "⚠️ POOL: Aborting workers that ignored the stop signal"
                );
                for handle in &remaining {
                    handle.abort();
                }
                let _ = tokio::time::timeout(FORCE_STOP_TIMEOUT, join_all(remaining)).await;
            }
        }

        let interrupted: Vec<Uuid> = self.shared.in_flight.lock().drain().collect();
        for item in &interrupted {
            self.shared.handler.on_interrupted(*item);
        }

        let mut discarded = 0;
        {
            let mut receiver = self.shared.receiver.lock().await;
            receiver.close();
            while let Ok(item) = receiver.try_recv() {
                self.shared.handler.on_discarded(item);
                self.shared.handler.release(item);
                discarded += 1;
            }
        }

        let report = ShutdownReport {
            graceful,
            interrupted: interrupted.len(),
            discarded,
        };
        info!(
            graceful = report.graceful,
            interrupted = report.interrupted,
            discarded = report.discarded,
            "🛑 POOL: Worker pool stopped"
        );
        report
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        if self.is_shutting_down() {
            return;
        }
        let handles = std::mem::take(&mut *self.handles.lock());
        if handles.is_empty() {
            return;
        }
        warn!(
            workers = handles.len(),
            "⚠️ POOL: Dropped without shutdown, aborting workers"
        );
        for handle in handles {
            handle.abort();
        }
    }
}

async fn run_worker(shared: Arc<PoolShared>, worker_id: usize, keep_alive: Option<Duration>) {
    let mut force = shared.force_stop.subscribe();
    let _live = LiveGuard {
        shared: shared.clone(),
        worker_id,
    };
    debug!(worker_id = worker_id, core = keep_alive.is_none(), "👷 POOL: Worker started");

    loop {
        shared.idle.fetch_add(1, Ordering::AcqRel);
        let next = tokio::select! {
            _ = force_requested(&mut force) => None,
            item = next_item(&shared, keep_alive) => item,
        };
        shared.idle.fetch_sub(1, Ordering::AcqRel);

        let Some(item) = next else {
            break;
        };

        let mut guard = InFlightGuard::new(shared.clone(), item);

        let finished = tokio::select! {
            _ = shared.handler.process(item) => true,
            _ = force_requested(&mut force) => false,
        };

        if !finished {
            guard.interrupted = true;
            debug!(worker_id = worker_id, item = %item, "POOL: Worker interrupted");
            break;
        }
    }
}

/// Next queued item. `None` when the queue is closed and empty, or when an
/// extra worker has been idle for its keep-alive.
async fn next_item(shared: &PoolShared, keep_alive: Option<Duration>) -> Option<Uuid> {
    let receive = async { shared.receiver.lock().await.recv().await };
    match keep_alive {
        None => receive.await,
        Some(keep_alive) => tokio::time::timeout(keep_alive, receive).await.ok().flatten(),
    }
}

async fn force_requested(force: &mut watch::Receiver<bool>) {
    loop {
        if *force.borrow_and_update() {
            return;
        }
        if force.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
