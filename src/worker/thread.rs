//! Background threads for consumer loops.
//!
//! `WorkerThread` runs one `Worker` on its own thread; `Consumer` groups
//! several so they can be stopped together.

use std::sync::mpsc::{channel, Sender};
use std::thread::{self, JoinHandle};

use tracing::error;

use super::worker::{Worker, WorkerStats};

/// A background thread running a `Worker` until stopped.
///
/// ## Example
///
/// ```ignore
/// let handle = WorkerThread::spawn(worker);
///
/// // ... dispatch messages routed to the worker's transport ...
///
/// let stats = handle.stop();
/// println!("Handled {} messages", stats.messages_handled);
/// ```
pub struct WorkerThread {
    transport_name: String,
    stop_tx: Sender<()>,
    handle: Option<JoinHandle<WorkerStats>>,
}

impl WorkerThread {
    pub fn spawn(mut worker: Worker) -> Self {
        let (stop_tx, stop_rx) = channel();
        let transport_name = worker.transport_name().to_string();

        let handle = thread::Builder::new()
            .name(format!("worker-{}", transport_name))
            .spawn(move || worker.run(&stop_rx));

        let handle = match handle {
            Ok(handle) => Some(handle),
            Err(err) => {
                error!(transport = %transport_name, error = %err, "failed to spawn worker thread");
                None
            }
        };

        Self {
            transport_name,
            stop_tx,
            handle,
        }
    }

    pub fn transport_name(&self) -> &str {
        &self.transport_name
    }

    /// Whether the loop has exited on its own (limits reached).
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Signal the worker to stop and wait for it to finish.
    /// A message in progress is settled first.
    pub fn stop(mut self) -> WorkerStats {
        let _ = self.stop_tx.send(());
        self.join()
    }

    /// Wait for the worker to exit on its own.
    pub fn wait(mut self) -> WorkerStats {
        self.join()
    }

    /// Signal the worker to stop without waiting.
    pub fn signal_stop(&self) {
        let _ = self.stop_tx.send(());
    }

    fn join(&mut self) -> WorkerStats {
        match self.handle.take() {
            Some(handle) => handle.join().unwrap_or_else(|_| {
                error!(transport = %self.transport_name, "worker thread panicked");
                WorkerStats::default()
            }),
            None => WorkerStats::default(),
        }
    }
}

impl Drop for WorkerThread {
    fn drop(&mut self) {
        let _ = self.stop_tx.send(());
    }
}

/// A set of worker threads, one per consumed transport.
#[derive(Default)]
pub struct Consumer {
    threads: Vec<WorkerThread>,
}

impl Consumer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn a thread for `worker` and add it to the set.
    pub fn spawn(mut self, worker: Worker) -> Self {
        self.threads.push(WorkerThread::spawn(worker));
        self
    }

    pub fn len(&self) -> usize {
        self.threads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.threads.is_empty()
    }

    /// Whether every worker has exited on its own.
    pub fn is_finished(&self) -> bool {
        self.threads.iter().all(WorkerThread::is_finished)
    }

    /// Stop every worker, then join them. Stats are returned per transport,
    /// in spawn order.
    pub fn stop(self) -> Vec<(String, WorkerStats)> {
        for thread in &self.threads {
            thread.signal_stop();
        }
        self.threads
            .into_iter()
            .map(|thread| (thread.transport_name().to_string(), thread.stop()))
            .collect()
    }

    /// Wait for every worker to exit on its own.
    pub fn wait(self) -> Vec<(String, WorkerStats)> {
        self.threads
            .into_iter()
            .map(|thread| (thread.transport_name().to_string(), thread.wait()))
            .collect()
    }
}
