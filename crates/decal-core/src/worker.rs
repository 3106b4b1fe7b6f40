//! Single background thread for rendering and export jobs.
//!
//! A [`Worker`] owns one named thread and a bounded FIFO queue of boxed
//! closures. Jobs run strictly one after another, which is what keeps
//! preview renders and exports from ever running in parallel: a job
//! submitted while another is running waits its turn.
//!
//! ```no_run
//! use decal_core::worker::Worker;
//!
//! let worker = Worker::new();
//! worker.send(|| println!("on the worker")).unwrap();
//!
//! let (tx, rx) = crossbeam_channel::unbounded();
//! worker
//!     .send_with_callback(|| 6 * 7, move |v| {
//!         let _ = tx.send(v);
//!     })
//!     .unwrap();
//! assert_eq!(rx.recv().unwrap(), 42);
//!
//! worker.stop_and_join();
//! ```

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError, bounded};
use parking_lot::Mutex;

use crate::error::{CoreError, Result};
use crate::logging::targets;

/// Jobs that may wait in the queue before `send` reports `QueueFull`.
const QUEUE_DEPTH: usize = 256;

/// How often an idle worker rechecks whether it was stopped.
const IDLE_POLL: Duration = Duration::from_millis(100);

/// Thread and queue settings.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub name: String,
    /// `None` keeps the platform default.
    pub stack_size: Option<usize>,
    pub queue_capacity: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            name: "decal-worker".to_string(),
            stack_size: None,
            queue_capacity: QUEUE_DEPTH,
        }
    }
}

impl WorkerConfig {
    /// Defaults with a custom thread name.
    pub fn with_name(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// Fluent construction of a [`Worker`].
#[derive(Debug, Default)]
pub struct WorkerBuilder {
    config: WorkerConfig,
}

impl WorkerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    pub fn stack_size(mut self, bytes: usize) -> Self {
        self.config.stack_size = Some(bytes);
        self
    }

    pub fn queue_capacity(mut self, jobs: usize) -> Self {
        self.config.queue_capacity = jobs;
        self
    }

    /// Spawn the thread.
    pub fn build(self) -> Worker {
        Worker::with_config(self.config)
    }
}

type BoxedJob = Box<dyn FnOnce() + Send>;

enum Job {
    Run(BoxedJob),
    Quit,
}

/// Counters shared with the thread.
struct Shared {
    accepting: AtomicBool,
    /// Queued plus running.
    outstanding: AtomicUsize,
    /// Finished, including jobs that panicked.
    finished: AtomicU64,
}

/// Handle to the background thread.
///
/// `Worker` is `Send + Sync`; owners share it through an `Arc`. Submitting
/// never blocks.
pub struct Worker {
    jobs: Sender<Job>,
    thread: Mutex<Option<JoinHandle<()>>>,
    shared: Arc<Shared>,
}

impl Worker {
    /// Spawn a worker with the default configuration.
    pub fn new() -> Self {
        Self::with_config(WorkerConfig::default())
    }

    /// Spawn a worker.
    ///
    /// # Panics
    ///
    /// If the OS refuses to create the thread.
    pub fn with_config(config: WorkerConfig) -> Self {
        let (jobs, queue) = bounded(config.queue_capacity);
        let shared = Arc::new(Shared {
            accepting: AtomicBool::new(true),
            outstanding: AtomicUsize::new(0),
            finished: AtomicU64::new(0),
        });

        let mut spawner = thread::Builder::new().name(config.name.clone());
        if let Some(bytes) = config.stack_size {
            spawner = spawner.stack_size(bytes);
        }

        let name = config.name;
        let for_thread = Arc::clone(&shared);
        let thread = spawner
            .spawn(move || {
                tracing::debug!(target: targets::WORKER, name = %name, "worker started");
                drain_queue(&queue, &for_thread);
                for_thread.accepting.store(false, Ordering::Release);
                tracing::debug!(
                    target: targets::WORKER,
                    name = %name,
                    finished = for_thread.finished.load(Ordering::Acquire),
                    "worker exited"
                );
            })
            .expect("Failed to spawn worker thread");

        Self {
            jobs,
            thread: Mutex::new(Some(thread)),
            shared,
        }
    }

    /// Whether new jobs are accepted.
    pub fn is_running(&self) -> bool {
        self.shared.accepting.load(Ordering::Acquire)
    }

    /// Jobs queued or running.
    pub fn pending_tasks(&self) -> usize {
        self.shared.outstanding.load(Ordering::Acquire)
    }

    /// Jobs that have finished, including ones that panicked.
    pub fn completed_tasks(&self) -> u64 {
        self.shared.finished.load(Ordering::Acquire)
    }

    /// Queue `task` behind everything already submitted.
    pub fn send<F>(&self, task: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        if !self.is_running() {
            return Err(CoreError::WorkerStopped);
        }

        self.shared.outstanding.fetch_add(1, Ordering::AcqRel);
        self.jobs.try_send(Job::Run(Box::new(task))).map_err(|err| {
            self.shared.outstanding.fetch_sub(1, Ordering::AcqRel);
            match err {
                TrySendError::Full(_) => CoreError::QueueFull,
                TrySendError::Disconnected(_) => CoreError::WorkerStopped,
            }
        })
    }

    /// Queue `task` and hand its result to `callback`.
    ///
    /// The callback runs on the worker thread right after the task; owners
    /// that need the value elsewhere forward it through a channel.
    pub fn send_with_callback<T, F, C>(&self, task: F, callback: C) -> Result<()>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
        C: FnOnce(T) + Send + 'static,
    {
        self.send(move || callback(task()))
    }

    /// Queue `task` and block for its result.
    ///
    /// `None` if the job was not accepted or panicked.
    pub fn send_sync<T, F>(&self, task: F) -> Option<T>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let (reply, answer) = bounded(1);
        self.send(move || {
            let _ = reply.send(task());
        })
        .ok()?;
        answer.recv().ok()
    }

    /// Stop accepting jobs. Already queued jobs still run.
    pub fn stop(&self) {
        self.shared.accepting.store(false, Ordering::Release);
        // A full queue drops the marker; the idle poll notices the stop.
        let _ = self.jobs.try_send(Job::Quit);
    }

    /// Wait for the thread to exit.
    ///
    /// `false` if it was already joined or panicked.
    pub fn join(&self) -> bool {
        match self.thread.lock().take() {
            Some(thread) => thread.join().is_ok(),
            None => false,
        }
    }

    /// [`stop`](Self::stop) then [`join`](Self::join).
    pub fn stop_and_join(&self) -> bool {
        self.stop();
        self.join()
    }
}

impl Default for Worker {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for Worker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Worker")
            .field("running", &self.is_running())
            .field("pending", &self.pending_tasks())
            .field("completed", &self.completed_tasks())
            .finish_non_exhaustive()
    }
}

fn drain_queue(queue: &Receiver<Job>, shared: &Shared) {
    loop {
        match queue.recv_timeout(IDLE_POLL) {
            Ok(Job::Run(job)) => run_job(job, shared),
            Ok(Job::Quit) => {
                for job in queue.try_iter() {
                    if let Job::Run(job) = job {
                        run_job(job, shared);
                    }
                }
                return;
            }
            Err(RecvTimeoutError::Timeout) => {
                let stopped = !shared.accepting.load(Ordering::Acquire);
                if stopped && shared.outstanding.load(Ordering::Acquire) == 0 {
                    return;
                }
            }
            Err(RecvTimeoutError::Disconnected) => return,
        }
    }
}

fn run_job(job: BoxedJob, shared: &Shared) {
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(job)) {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_string());
        tracing::error!(target: targets::WORKER, error = %CoreError::TaskPanicked(message), "job failed");
    }
    shared.finished.fetch_add(1, Ordering::AcqRel);
    shared.outstanding.fetch_sub(1, Ordering::AcqRel);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_running_and_idle() {
        let worker = WorkerBuilder::new().name("decal-test").queue_capacity(8).build();
        assert!(worker.is_running());
        assert_eq!(worker.pending_tasks(), 0);
        assert!(worker.stop_and_join());
        assert!(!worker.is_running());
        assert!(!worker.join());
    }

    #[test]
    fn jobs_run_in_submission_order() {
        let worker = Worker::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for i in 0..10 {
            let order = Arc::clone(&order);
            worker
                .send(move || {
                    thread::sleep(Duration::from_millis(1));
                    order.lock().push(i);
                })
                .unwrap();
        }

        worker.stop_and_join();
        assert_eq!(*order.lock(), (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn callback_receives_result() {
        let worker = Worker::new();
        let (tx, rx) = crossbeam_channel::bounded(1);

        worker
            .send_with_callback(|| "rendered".to_string(), move |v| tx.send(v).unwrap())
            .unwrap();

        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), "rendered");
        worker.stop_and_join();
    }

    #[test]
    fn sync_send_returns_value() {
        let worker = Worker::new();
        assert_eq!(worker.send_sync(|| 21 * 2), Some(42));
        worker.stop_and_join();
    }

    #[test]
    fn stop_runs_queued_jobs_first() {
        let worker = Worker::new();
        let done = Arc::new(AtomicUsize::new(0));

        for _ in 0..5 {
            let done = Arc::clone(&done);
            worker
                .send(move || {
                    thread::sleep(Duration::from_millis(10));
                    done.fetch_add(1, Ordering::SeqCst);
                })
                .unwrap();
        }

        worker.stop_and_join();
        assert_eq!(done.load(Ordering::SeqCst), 5);
        assert_eq!(worker.completed_tasks(), 5);
        assert_eq!(worker.pending_tasks(), 0);
    }

    #[test]
    fn stopped_worker_rejects_jobs() {
        let worker = Worker::new();
        worker.stop();

        assert_eq!(worker.send(|| {}), Err(CoreError::WorkerStopped));
        assert_eq!(worker.send_sync(|| 1), None);
        worker.join();
    }

    #[test]
    fn panicking_job_keeps_worker_alive() {
        let worker = Worker::new();
        worker.send(|| panic!("boom")).unwrap();
        assert_eq!(worker.send_sync(|| 7), Some(7));
        worker.stop_and_join();
        assert_eq!(worker.completed_tasks(), 2);
    }

    #[test]
    fn full_queue_is_reported() {
        let worker = WorkerBuilder::new().queue_capacity(1).build();
        let (release_tx, release_rx) = crossbeam_channel::bounded::<()>(0);
        let (started_tx, started_rx) = crossbeam_channel::bounded::<()>(1);

        worker
            .send(move || {
                started_tx.send(()).unwrap();
                let _ = release_rx.recv();
            })
            .unwrap();
        started_rx.recv().unwrap();

        worker.send(|| {}).unwrap();
        assert_eq!(worker.send(|| {}), Err(CoreError::QueueFull));

        release_tx.send(()).unwrap();
        worker.stop_and_join();
    }
}
