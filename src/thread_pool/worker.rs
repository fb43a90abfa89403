use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;

use parking_lot::{Condvar, Mutex};

use crate::error::{Result, RuntimeError};
use crate::interop::CompletionToken;

pub type Job = Box<dyn FnOnce() -> Result<()> + Send + 'static>;

pub struct WorkItem {
    pub job: Job,
    pub token: CompletionToken,
}

struct QueueState {
    items: VecDeque<WorkItem>,
    shutdown: bool,
}

pub struct WorkQueue {
    state: Mutex<QueueState>,
    condvar: Condvar,
}

impl WorkQueue {
    pub fn new() -> Self {
        WorkQueue {
            state: Mutex::new(QueueState {
                items: VecDeque::new(),
                shutdown: false,
            }),
            condvar: Condvar::new(),
        }
    }

    pub fn submit_work_item(&self, work_item: WorkItem) {
        self.state.lock().items.push_back(work_item);
        self.condvar.notify_one();
    }

    pub fn submit_work_batch(&self, work_items: Vec<WorkItem>) {
        let batch_size = work_items.len();
        {
            let mut state = self.state.lock();
            state.items.reserve(batch_size);
            state.items.extend(work_items);
        }
        self.condvar.notify_all();
    }

    pub fn shutdown(&self) {
        self.state.lock().shutdown = true;
        self.condvar.notify_all();
    }

    // Queued work is finished before a worker honours shutdown.
    fn wait_and_get_next_work(&self) -> Option<WorkItem> {
        let mut state = self.state.lock();
        loop {
            if let Some(item) = state.items.pop_front() {
                return Some(item);
            }
            if state.shutdown {
                return None;
            }
            self.condvar.wait(&mut state);
        }
    }
}

pub struct Worker {
    pub id: usize,
    pub thread: Option<thread::JoinHandle<()>>,
}

impl Worker {
    pub fn new(id: usize, work_queue: Arc<WorkQueue>) -> Result<Worker> {
        let thread = thread::Builder::new()
            .name(format!("flowrt-transfer-{}", id))
            .spawn(move || {
                while let Some(work_item) = work_queue.wait_and_get_next_work() {
                    Self::process_work(work_item);
                }
            })
            .map_err(|e| RuntimeError::Config(format!("failed to spawn worker {}: {}", id, e)))?;

        Ok(Worker {
            id,
            thread: Some(thread),
        })
    }

    fn process_work(work_item: WorkItem) {
        let outcome = panic::catch_unwind(AssertUnwindSafe(work_item.job))
            .unwrap_or_else(|payload| Err(RuntimeError::WorkerPanic(panic_message(&*payload))));

        if let Err(e) = &outcome {
            tracing::debug!(error = %e, "transfer job failed");
        }
        work_item.token.complete(outcome);
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
