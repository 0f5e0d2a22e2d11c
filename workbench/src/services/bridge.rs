//! Worker bridge
//!
//! Background jobs run on the tokio blocking pool and never touch dashboard
//! state. They hand results back through a bounded FIFO queue that the
//! dashboard drains on its own thread, one bounded batch per tick.
//!
//! The bridge expects a multi-threaded runtime: shutdown waits on worker
//! handles from outside the runtime.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, error::TryRecvError, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use shared::{AnalysisRequest, Snapshot, TabularView};

use crate::config::BridgeConfig;
use crate::error::{ErrorDetail, WorkbenchError, WorkbenchResult};

/// Pause between enqueue attempts while the queue is full
const SEND_RETRY_INTERVAL: Duration = Duration::from_millis(10);

/// A computed view together with the request that produced it
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisOutput {
    pub request: AnalysisRequest,
    pub view: TabularView,
}

/// Everything a worker can report back
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerMessage {
    AnalysisComplete(Box<AnalysisOutput>),
    AnalysisError(ErrorDetail),
    DeleteComplete,
    LoadData(Vec<Snapshot>),
    UpdateCombos(Vec<String>),
    ComparisonComplete { left: Box<Snapshot>, right: Box<Snapshot> },
}

impl WorkerMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            WorkerMessage::AnalysisComplete(_) => "analysis_complete",
            WorkerMessage::AnalysisError(_) => "analysis_error",
            WorkerMessage::DeleteComplete => "delete_complete",
            WorkerMessage::LoadData(_) => "load_data",
            WorkerMessage::UpdateCombos(_) => "update_combos",
            WorkerMessage::ComparisonComplete { .. } => "comparison_complete",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WorkerId(Uuid);

impl WorkerId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

type Registry = Arc<Mutex<HashMap<WorkerId, &'static str>>>;

fn lock(registry: &Registry) -> MutexGuard<'_, HashMap<WorkerId, &'static str>> {
    registry.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Sending half handed to each worker
#[derive(Debug, Clone)]
pub struct Outbox {
    sender: mpsc::Sender<WorkerMessage>,
    closing: Arc<AtomicBool>,
}

impl Outbox {
    /// Enqueue a message, waiting while the queue is full.
    ///
    /// Returns `false` without enqueueing once the bridge is closing.
    pub fn send(&self, message: WorkerMessage) -> bool {
        let kind = message.kind();
        let mut pending = message;
        loop {
            if self.closing.load(Ordering::SeqCst) {
                debug!(kind, "Bridge closing, message dropped");
                return false;
            }
            match self.sender.try_send(pending) {
                Ok(()) => return true,
                Err(TrySendError::Full(message)) => {
                    pending = message;
                    std::thread::sleep(SEND_RETRY_INTERVAL);
                }
                Err(TrySendError::Closed(_)) => {
                    debug!(kind, "Bridge queue closed, message dropped");
                    return false;
                }
            }
        }
    }

    pub fn is_closing(&self) -> bool {
        self.closing.load(Ordering::SeqCst)
    }
}

/// Queue, live-worker registry and shutdown for one dashboard
pub struct WorkerBridge {
    runtime: Handle,
    sender: mpsc::Sender<WorkerMessage>,
    receiver: mpsc::Receiver<WorkerMessage>,
    overflow: VecDeque<WorkerMessage>,
    closing: Arc<AtomicBool>,
    live: Registry,
    handles: Vec<(WorkerId, JoinHandle<()>)>,
    max_batch: usize,
    join_timeout: Duration,
}

impl WorkerBridge {
    pub fn new(runtime: Handle, config: &BridgeConfig) -> Self {
        let (sender, receiver) = mpsc::channel(config.queue_capacity.max(1));
        Self {
            runtime,
            sender,
            receiver,
            overflow: VecDeque::new(),
            closing: Arc::new(AtomicBool::new(false)),
            live: Arc::new(Mutex::new(HashMap::new())),
            handles: Vec::new(),
            max_batch: config.max_batch.max(1),
            join_timeout: config.join_timeout(),
        }
    }

    pub fn outbox(&self) -> Outbox {
        Outbox {
            sender: self.sender.clone(),
            closing: Arc::clone(&self.closing),
        }
    }

    /// Run `job` on the blocking pool.
    ///
    /// The worker is registered before it starts and removes itself when it
    /// finishes. A panic inside the job is reported as `AnalysisError`.
    pub fn spawn<F>(&mut self, name: &'static str, job: F) -> WorkbenchResult<WorkerId>
    where
        F: FnOnce(&Outbox) + Send + 'static,
    {
        if self.is_closing() {
            return Err(WorkbenchError::WorkerUnavailable);
        }

        let id = WorkerId::new();
        lock(&self.live).insert(id, name);

        let outbox = self.outbox();
        let live = Arc::clone(&self.live);
        let handle = self.runtime.spawn_blocking(move || {
            debug!(worker = %id, name, "Worker started");
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| job(&outbox))) {
                let reason = panic_message(payload.as_ref());
                error!(worker = %id, name, %reason, "Worker panicked");
                outbox.send(WorkerMessage::AnalysisError(WorkbenchError::Compute(reason).detail()));
            }
            lock(&live).remove(&id);
            debug!(worker = %id, name, "Worker finished");
        });

        self.handles.retain(|(_, h)| !h.is_finished());
        self.handles.push((id, handle));
        info!(worker = %id, name, "Worker spawned");
        Ok(id)
    }

    /// Enqueue a message from the dashboard thread itself. Never blocks.
    pub fn post(&mut self, message: WorkerMessage) -> WorkbenchResult<()> {
        if self.is_closing() {
            return Err(WorkbenchError::WorkerUnavailable);
        }
        // Once anything is parked, later posts queue behind it.
        if !self.overflow.is_empty() {
            self.overflow.push_back(message);
            return Ok(());
        }
        match self.sender.try_send(message) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(message)) => {
                self.overflow.push_back(message);
                Ok(())
            }
            Err(TrySendError::Closed(_)) => Err(WorkbenchError::WorkerUnavailable),
        }
    }

    /// Take up to the configured batch without blocking
    pub fn drain(&mut self) -> Vec<WorkerMessage> {
        let max_batch = self.max_batch;
        self.drain_up_to(max_batch)
    }

    pub fn drain_up_to(&mut self, max_batch: usize) -> Vec<WorkerMessage> {
        if self.is_closing() {
            return Vec::new();
        }

        let mut batch = Vec::new();
        while batch.len() < max_batch {
            match self.receiver.try_recv() {
                Ok(message) => batch.push(message),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        while batch.len() < max_batch {
            match self.overflow.pop_front() {
                Some(message) => batch.push(message),
                None => break,
            }
        }

        if !batch.is_empty() {
            debug!(count = batch.len(), "Drained worker messages");
        }
        batch
    }

    pub fn live_workers(&self) -> usize {
        lock(&self.live).len()
    }

    pub fn is_closing(&self) -> bool {
        self.closing.load(Ordering::SeqCst)
    }

    /// Stop accepting work, wait for live workers and clear the queue.
    ///
    /// Each worker gets the configured join timeout; stragglers are left
    /// running and their later sends are dropped.
    pub fn shutdown(&mut self) {
        if self.closing.swap(true, Ordering::SeqCst) {
            return;
        }
        info!(live = self.live_workers(), "Shutting down worker bridge");

        for (id, handle) in std::mem::take(&mut self.handles) {
            if handle.is_finished() {
                continue;
            }
            let timeout = self.join_timeout;
            let joined = self
                .runtime
                .block_on(async move { tokio::time::timeout(timeout, handle).await });
            match joined {
                Ok(Ok(())) => debug!(worker = %id, "Worker joined"),
                Ok(Err(e)) => warn!(worker = %id, error = %e, "Worker ended abnormally"),
                Err(_) => warn!(worker = %id, ?timeout, "Worker did not finish in time, abandoning"),
            }
        }

        while self.receiver.try_recv().is_ok() {}
        self.overflow.clear();
        info!("Worker bridge stopped");
    }
}

impl Drop for WorkerBridge {
    fn drop(&mut self) {
        self.closing.store(true, Ordering::SeqCst);
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "worker panicked".to_string()
    }
}
