//! Per-job completion signalling.
//!
//! Each job id gets its own one-shot channel. Subscribers register before the
//! job starts; a successful job publishes exactly one `Job {id} finished`
//! message and then closes the channel. A failed job only closes it, so a
//! waiting subscriber observes the disconnect instead of a message.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, unbounded};
use tracing::debug;

use crate::domain::JobId;

pub fn finished_message(job_id: &JobId) -> String {
    format!("Job {job_id} finished")
}

pub trait CompletionNotifier: Send + Sync {
    fn publish(&self, job_id: &JobId, message: &str);

    /// Drops the channel for `job_id` without sending anything.
    fn close(&self, _job_id: &JobId) {}
}

impl<T: CompletionNotifier + ?Sized> CompletionNotifier for Arc<T> {
    fn publish(&self, job_id: &JobId, message: &str) {
        (**self).publish(job_id, message)
    }

    fn close(&self, job_id: &JobId) {
        (**self).close(job_id)
    }
}

/// In-process completion channels keyed by job id.
#[derive(Clone, Default)]
pub struct CompletionBus {
    channels: Arc<Mutex<HashMap<JobId, Vec<Sender<String>>>>>,
}

impl CompletionBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, job_id: &JobId) -> CompletionReceiver {
        let (sender, receiver) = unbounded();
        self.lock()
            .entry(job_id.clone())
            .or_default()
            .push(sender);
        CompletionReceiver {
            job_id: job_id.clone(),
            receiver,
        }
    }

    pub fn subscriber_count(&self, job_id: &JobId) -> usize {
        self.lock().get(job_id).map(Vec::len).unwrap_or(0)
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<JobId, Vec<Sender<String>>>> {
        match self.channels.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl CompletionNotifier for CompletionBus {
    fn publish(&self, job_id: &JobId, message: &str) {
        let senders = self.lock().remove(job_id).unwrap_or_default();
        if senders.is_empty() {
            debug!(job_id = %job_id, "completion published with no subscribers");
        }
        for sender in senders {
            let _ = sender.send(message.to_string());
        }
    }

    fn close(&self, job_id: &JobId) {
        self.lock().remove(job_id);
    }
}

pub struct CompletionReceiver {
    job_id: JobId,
    receiver: Receiver<String>,
}

impl CompletionReceiver {
    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    /// Blocks until the job publishes or its channel is closed.
    pub fn wait(&self) -> Option<String> {
        self.receiver.recv().ok()
    }

    pub fn wait_timeout(&self, timeout: Duration) -> Option<String> {
        match self.receiver.recv_timeout(timeout) {
            Ok(message) => Some(message),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    pub fn try_recv(&self) -> Option<String> {
        self.receiver.try_recv().ok()
    }
}
