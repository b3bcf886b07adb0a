use crate::constants::DEVICE_PER_MESSAGE;
use crate::errors::DiscoveryError;
use crate::model::{AddressItem, DeviceBatch, DiscoveredDevice};
use crate::pipeline::{probe_address, ProbeContext};
use crate::spool::ResultSpool;
use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::{debug, error};

/// Worker lifecycle state, published by the worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WorkerState {
    Pause = 0,
    Run = 1,
    Stop = 2,
}

/// Command flag written by the coordinator (and reset by the worker at the
/// end of a drained block)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WorkerAction {
    Pause = 0,
    Run = 1,
    Stop = 2,
    Delete = 3,
}

/// One worker's handshake channel: the coordinator writes `action`, the
/// worker answers through `state`. Single-word atomics are all the
/// discipline this two-party protocol needs.
pub struct WorkerSlot {
    state: AtomicU8,
    action: AtomicU8,
}

impl Default for WorkerSlot {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkerSlot {
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(WorkerState::Pause as u8),
            action: AtomicU8::new(WorkerAction::Pause as u8),
        }
    }

    pub fn state(&self) -> WorkerState {
        match self.state.load(Ordering::SeqCst) {
            0 => WorkerState::Pause,
            1 => WorkerState::Run,
            _ => WorkerState::Stop,
        }
    }

    pub fn set_state(&self, state: WorkerState) {
        self.state.store(state as u8, Ordering::SeqCst);
    }

    pub fn action(&self) -> WorkerAction {
        match self.action.load(Ordering::SeqCst) {
            0 => WorkerAction::Pause,
            1 => WorkerAction::Run,
            2 => WorkerAction::Stop,
            _ => WorkerAction::Delete,
        }
    }

    pub fn set_action(&self, action: WorkerAction) {
        self.action.store(action as u8, Ordering::SeqCst);
    }

    /// True once the worker has parked again after a block: it reset its
    /// own action to PAUSE and published state PAUSE.
    pub fn is_parked(&self) -> bool {
        self.action() == WorkerAction::Pause && self.state() == WorkerState::Pause
    }
}

/// State shared between the coordinator and every worker of a job
pub struct WorkerShared {
    /// Addresses of the current block; workers pop under the lock
    pub block: Mutex<Vec<AddressItem>>,
    /// Spool key allocator, shared-monotonic within a cycle
    pub batch_counter: AtomicU32,
    pub spool: Arc<dyn ResultSpool>,
    pub context: ProbeContext,
    pub module_version: String,
    pub process_number: String,
    /// Idle poll interval while parked
    pub poll_interval: Duration,
    /// First spool failure seen by any worker, surfaced after the job
    pub failure: parking_lot::Mutex<Option<DiscoveryError>>,
}

impl WorkerShared {
    fn record_failure(&self, error: DiscoveryError) {
        error!("spool flush failed: {error}");
        let mut slot = self.failure.lock();
        if slot.is_none() {
            *slot = Some(error);
        }
    }
}

/// Long-lived worker task: cycles through the PAUSE/RUN/STOP protocol until
/// told to exit, probing addresses and flushing device batches to the spool.
pub async fn run_worker(shared: Arc<WorkerShared>, slot: Arc<WorkerSlot>, worker_id: usize) {
    debug!("worker {worker_id} up");
    loop {
        match slot.action() {
            WorkerAction::Pause => {
                slot.set_state(WorkerState::Pause);
                sleep(shared.poll_interval).await;
            }
            WorkerAction::Stop | WorkerAction::Delete => {
                debug!("worker {worker_id} exiting");
                slot.set_state(WorkerState::Stop);
                return;
            }
            WorkerAction::Run => {
                slot.set_state(WorkerState::Run);
                run_block(&shared, worker_id).await;

                // Block drained: hand the slot back. Resetting our own
                // action is the signal the coordinator polls for.
                let stopping = matches!(
                    slot.action(),
                    WorkerAction::Stop | WorkerAction::Delete
                );
                slot.set_action(WorkerAction::Pause);
                if stopping {
                    debug!("worker {worker_id} exiting after final block");
                    slot.set_state(WorkerState::Stop);
                    return;
                }
                slot.set_state(WorkerState::Pause);
            }
        }
    }
}

/// Consume the shared block until it is empty, batching accepted devices
async fn run_block(shared: &WorkerShared, worker_id: usize) {
    let mut buffer: Vec<DiscoveredDevice> = Vec::with_capacity(DEVICE_PER_MESSAGE);

    loop {
        let item = { shared.block.lock().await.pop() };
        let Some(item) = item else {
            break;
        };

        if let Some(device) = probe_address(&shared.context, &item).await {
            debug!("worker {worker_id} found device at {}", item.ip);
            buffer.push(device);
            if buffer.len() >= DEVICE_PER_MESSAGE {
                flush(shared, &mut buffer);
            }
        }
    }

    if !buffer.is_empty() {
        flush(shared, &mut buffer);
    }
}

/// Reserve the next spool key and persist the buffered devices as one batch
fn flush(shared: &WorkerShared, buffer: &mut Vec<DiscoveredDevice>) {
    let idx = shared.batch_counter.fetch_add(1, Ordering::SeqCst) + 1;
    let batch = DeviceBatch {
        devices: std::mem::take(buffer),
        module_version: shared.module_version.clone(),
        process_number: shared.process_number.clone(),
    };

    let entry = match serde_json::to_value(&batch) {
        Ok(entry) => entry,
        Err(e) => {
            shared.record_failure(e.into());
            return;
        }
    };
    if let Err(e) = shared.spool.save(idx, &entry) {
        shared.record_failure(e);
    }
}
