mod worker;

use std::sync::Arc;

use crate::error::Result;
use crate::interop::CompletionToken;

pub use worker::Job;
use worker::{WorkItem, WorkQueue, Worker};

/// Fixed set of threads that run deferred transfers.
///
/// Each job completes its own [`CompletionToken`]. Dropping the pool finishes
/// the queued work and joins every thread.
pub struct TransferPool {
    workers: Vec<Worker>,
    work_queue: Arc<WorkQueue>,
}

impl TransferPool {
    pub fn new(size: usize) -> Result<Self> {
        let size = size.max(1);
        let work_queue = Arc::new(WorkQueue::new());

        let mut workers = Vec::with_capacity(size);
        for id in 0..size {
            workers.push(Worker::new(id, work_queue.clone())?);
        }

        tracing::debug!(workers = size, "transfer pool started");

        Ok(TransferPool {
            workers,
            work_queue,
        })
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }

    pub fn submit(&self, job: Job) -> CompletionToken {
        let token = CompletionToken::new();
        self.work_queue.submit_work_item(WorkItem {
            job,
            token: token.clone(),
        });
        token
    }

    pub fn submit_batch(&self, jobs: Vec<Job>) -> Vec<CompletionToken> {
        let mut tokens = Vec::with_capacity(jobs.len());
        let items = jobs
            .into_iter()
            .map(|job| {
                let token = CompletionToken::new();
                tokens.push(token.clone());
                WorkItem { job, token }
            })
            .collect();

        self.work_queue.submit_work_batch(items);
        tokens
    }
}

impl Drop for TransferPool {
    fn drop(&mut self) {
        self.work_queue.shutdown();
        for worker in &mut self.workers {
            if let Some(thread) = worker.thread.take() {
                if thread.join().is_err() {
                    tracing::warn!(worker = worker.id, "transfer worker exited abnormally");
                }
            }
        }
    }
}

impl std::fmt::Debug for TransferPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransferPool")
            .field("workers", &self.workers.len())
            .finish()
    }
}
