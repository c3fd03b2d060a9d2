//! The device thread.
//!
//! All device calls happen on one dedicated worker thread that owns the
//! backend. Other threads hand it closures through a FIFO channel, either
//! waiting for the result ([`Executor::submit`]) or not
//! ([`Executor::submit_async`]).
//!
//! | Guarantee | How |
//! |-----------|-----|
//! | Tasks run in submission order | single `mpsc` queue, single consumer |
//! | Tasks never overlap | one worker thread |
//! | A panicking task does not stop the worker | `catch_unwind` around every task |
//! | Shutdown runs everything submitted before it | shutdown is itself a queued message |
//!
//! # Example
//!
//! ```ignore
//! let executor = Executor::spawn(ExecutorConfig::default(), || Ok(DummyBackend::new()))?;
//!
//! executor.submit_async(|device| device.bind(BindingTarget::ArrayBuffer, None))?;
//! let name = executor.submit(|device| device.name());
//!
//! executor.shutdown();
//! ```

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};

use parking_lot::Mutex;
use thiserror::Error;

use crate::backend::{BackendError, BackendResult, DeviceBackend};

/// Executor error type
#[derive(Error, Debug)]
pub enum ExecutorError {
    #[error("Device thread is not running")]
    Disconnected,
    #[error("Device task panicked: {0}")]
    TaskPanicked(String),
    #[error("Blocking submission from the device thread would deadlock")]
    Reentrant,
    #[error("Device queue is full")]
    QueueFull,
    #[error("Failed to spawn device thread: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("Failed to create device: {0}")]
    Backend(#[from] BackendError),
}

/// Configuration for the device thread
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Name of the worker thread
    pub thread_name: String,
    /// Maximum number of queued tasks; `None` for an unbounded queue
    pub queue_capacity: Option<usize>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            thread_name: "device".to_string(),
            queue_capacity: None,
        }
    }
}

impl ExecutorConfig {
    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = Some(capacity);
        self
    }
}

/// Type-erased work closure run on the device thread.
type Task<B> = Box<dyn FnOnce(&mut B) + Send>;

enum Job<B> {
    Run(Task<B>),
    Shutdown,
}

enum JobSender<B> {
    Unbounded(mpsc::Sender<Job<B>>),
    Bounded(mpsc::SyncSender<Job<B>>),
}

impl<B> Clone for JobSender<B> {
    fn clone(&self) -> Self {
        match self {
            Self::Unbounded(sender) => Self::Unbounded(sender.clone()),
            Self::Bounded(sender) => Self::Bounded(sender.clone()),
        }
    }
}

struct Worker {
    thread_id: ThreadId,
    handle: Mutex<Option<JoinHandle<()>>>,
}

/// Handle to the device thread.
///
/// Cloning is cheap; all clones feed the same queue. The worker stops when
/// [`shutdown`](Self::shutdown) is called or when every handle is dropped,
/// after running everything queued before that point.
pub struct Executor<B: DeviceBackend> {
    sender: JobSender<B>,
    worker: Arc<Worker>,
}

impl<B: DeviceBackend> Clone for Executor<B> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            worker: Arc::clone(&self.worker),
        }
    }
}

impl<B: DeviceBackend> Executor<B> {
    /// Start the device thread.
    ///
    /// `factory` runs on the new thread and creates the backend there, so a
    /// thread-affine device never leaves the thread that created it. Its error
    /// is returned from here and no thread is left running.
    pub fn spawn<F>(config: ExecutorConfig, factory: F) -> Result<Self, ExecutorError>
    where
        F: FnOnce() -> BackendResult<B> + Send + 'static,
    {
        let (sender, receiver) = match config.queue_capacity {
            Some(capacity) => {
                let (tx, rx) = mpsc::sync_channel(capacity);
                (JobSender::Bounded(tx), rx)
            }
            None => {
                let (tx, rx) = mpsc::channel();
                (JobSender::Unbounded(tx), rx)
            }
        };
        let (ready_tx, ready_rx) = mpsc::sync_channel::<BackendResult<()>>(1);

        let handle = thread::Builder::new()
            .name(config.thread_name.clone())
            .spawn(move || match factory() {
                Ok(device) => {
                    let _ = ready_tx.send(Ok(()));
                    run_loop(device, receiver);
                }
                Err(err) => {
                    let _ = ready_tx.send(Err(err));
                }
            })?;

        let thread_id = handle.thread().id();
        match ready_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                let _ = handle.join();
                return Err(ExecutorError::Backend(err));
            }
            Err(_) => {
                let _ = handle.join();
                return Err(ExecutorError::Backend(BackendError::InitializationFailed(
                    "device factory panicked".to_string(),
                )));
            }
        }

        log::info!(
            "Device thread '{}' started ({})",
            config.thread_name,
            match config.queue_capacity {
                Some(capacity) => format!("queue capacity {capacity}"),
                None => "unbounded queue".to_string(),
            }
        );

        Ok(Self {
            sender,
            worker: Arc::new(Worker {
                thread_id,
                handle: Mutex::new(Some(handle)),
            }),
        })
    }

    /// Whether the calling thread is the device thread.
    pub fn is_device_thread(&self) -> bool {
        thread::current().id() == self.worker.thread_id
    }

    /// Queue `task` and return without waiting for it.
    pub fn submit_async<F>(&self, task: F) -> Result<(), ExecutorError>
    where
        F: FnOnce(&mut B) + Send + 'static,
    {
        self.send(Job::Run(Box::new(task)))
    }

    /// Queue `task` and block until it has run, returning its result.
    ///
    /// # Panics
    ///
    /// Panics if the task panicked, if the device thread has stopped, or if
    /// called from the device thread. Use [`try_submit`](Self::try_submit) to
    /// handle these cases.
    pub fn submit<R, F>(&self, task: F) -> R
    where
        R: Send + 'static,
        F: FnOnce(&mut B) -> R + Send + 'static,
    {
        match self.try_submit(task) {
            Ok(result) => result,
            Err(err) => panic!("device submit: {err}"),
        }
    }

    /// Queue `task` and block until it has run.
    pub fn try_submit<R, F>(&self, task: F) -> Result<R, ExecutorError>
    where
        R: Send + 'static,
        F: FnOnce(&mut B) -> R + Send + 'static,
    {
        if self.is_device_thread() {
            return Err(ExecutorError::Reentrant);
        }

        let (result_tx, result_rx) = mpsc::sync_channel::<Result<R, String>>(1);
        self.send(Job::Run(Box::new(move |device: &mut B| {
            match panic::catch_unwind(AssertUnwindSafe(|| task(device))) {
                Ok(result) => {
                    let _ = result_tx.send(Ok(result));
                }
                Err(payload) => {
                    let _ = result_tx.send(Err(panic_message(payload.as_ref())));
                    panic::resume_unwind(payload);
                }
            }
        })))?;

        match result_rx.recv() {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(message)) => Err(ExecutorError::TaskPanicked(message)),
            // dropped unrun: the queue was shut down ahead of this task
            Err(_) => Err(ExecutorError::Disconnected),
        }
    }

    /// Stop the device thread after everything queued so far has run.
    ///
    /// Blocks until the worker has exited and the device has been dropped on
    /// it. Later submissions fail with [`ExecutorError::Disconnected`].
    /// Calling this more than once is harmless.
    pub fn shutdown(&self) {
        if self.is_device_thread() {
            log::error!("Executor::shutdown called from the device thread; ignored");
            return;
        }
        let Some(handle) = self.worker.handle.lock().take() else {
            return;
        };
        if self.send(Job::Shutdown).is_err() {
            log::debug!("Device thread already stopped");
        }
        if handle.join().is_err() {
            log::error!("Device thread panicked during shutdown");
        }
    }

    fn send(&self, job: Job<B>) -> Result<(), ExecutorError> {
        match &self.sender {
            JobSender::Unbounded(sender) => {
                sender.send(job).map_err(|_| ExecutorError::Disconnected)
            }
            // the device thread cannot wait for room in its own queue
            JobSender::Bounded(sender) if self.is_device_thread() => {
                sender.try_send(job).map_err(|err| match err {
                    mpsc::TrySendError::Full(_) => ExecutorError::QueueFull,
                    mpsc::TrySendError::Disconnected(_) => ExecutorError::Disconnected,
                })
            }
            JobSender::Bounded(sender) => {
                sender.send(job).map_err(|_| ExecutorError::Disconnected)
            }
        }
    }
}

impl<B: DeviceBackend> std::fmt::Debug for Executor<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor")
            .field("thread_id", &self.worker.thread_id)
            .field("bounded", &matches!(self.sender, JobSender::Bounded(_)))
            .finish()
    }
}

fn run_loop<B: DeviceBackend>(mut device: B, receiver: mpsc::Receiver<Job<B>>) {
    log::debug!("Device thread running on {} backend", device.name());

    while let Ok(job) = receiver.recv() {
        match job {
            Job::Run(task) => {
                if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| task(&mut device))) {
                    log::error!("Device task panicked: {}", panic_message(payload.as_ref()));
                }
            }
            Job::Shutdown => break,
        }
    }

    log::info!("Device thread stopping, releasing {} backend", device.name());
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BindingTarget, DummyBackend};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn dummy_executor() -> Executor<DummyBackend> {
        Executor::spawn(ExecutorConfig::default(), || Ok(DummyBackend::new())).unwrap()
    }

    #[test]
    fn submit_returns_task_result() {
        let executor = dummy_executor();
        assert_eq!(executor.submit(|device| device.name()), "Dummy");
        executor.shutdown();
    }

    #[test]
    fn tasks_run_on_device_thread() {
        let executor = Executor::spawn(
            ExecutorConfig::default().with_thread_name("gl-worker"),
            || Ok(DummyBackend::new()),
        )
        .unwrap();

        let name = executor.submit(|_| thread::current().name().map(str::to_string));
        assert_eq!(name.as_deref(), Some("gl-worker"));
        assert!(!executor.is_device_thread());
        executor.shutdown();
    }

    #[test]
    fn async_tasks_keep_submission_order() {
        let executor = dummy_executor();
        let order = Arc::new(Mutex::new(Vec::new()));

        for i in 0..100 {
            let order = Arc::clone(&order);
            executor.submit_async(move |_| order.lock().push(i)).unwrap();
        }
        executor.submit(|_| ());

        assert_eq!(*order.lock(), (0..100).collect::<Vec<_>>());
        executor.shutdown();
    }

    #[test]
    fn panicking_task_does_not_stop_worker() {
        let executor = dummy_executor();

        executor.submit_async(|_| panic!("async fault")).unwrap();
        let result = executor.try_submit(|_| -> u32 { panic!("sync fault") });
        assert!(matches!(result, Err(ExecutorError::TaskPanicked(ref msg)) if msg == "sync fault"));

        assert_eq!(executor.submit(|_| 7), 7);
        executor.shutdown();
    }

    #[test]
    fn shutdown_drains_queue() {
        let executor = dummy_executor();
        let ran = Arc::new(AtomicUsize::new(0));

        for _ in 0..50 {
            let ran = Arc::clone(&ran);
            executor
                .submit_async(move |_| {
                    ran.fetch_add(1, Ordering::SeqCst);
                })
                .unwrap();
        }
        executor.shutdown();

        assert_eq!(ran.load(Ordering::SeqCst), 50);
        assert!(matches!(
            executor.submit_async(|_| {}),
            Err(ExecutorError::Disconnected)
        ));
        assert!(matches!(
            executor.try_submit(|_| ()),
            Err(ExecutorError::Disconnected)
        ));
        executor.shutdown();
    }

    #[test]
    fn blocking_submit_from_device_thread_is_rejected() {
        let executor = dummy_executor();
        let inner = executor.clone();

        let result = executor.submit(move |_| inner.try_submit(|_| ()));
        assert!(matches!(result, Err(ExecutorError::Reentrant)));
        executor.shutdown();
    }

    #[test]
    fn factory_error_is_returned() {
        let result = Executor::<DummyBackend>::spawn(ExecutorConfig::default(), || {
            Err(BackendError::InitializationFailed("no context".to_string()))
        });
        assert!(matches!(
            result,
            Err(ExecutorError::Backend(BackendError::InitializationFailed(_)))
        ));
    }

    #[test]
    fn bounded_queue_runs_everything() {
        let executor = Executor::spawn(
            ExecutorConfig::default().with_queue_capacity(2),
            || Ok(DummyBackend::new()),
        )
        .unwrap();
        let ran = Arc::new(AtomicUsize::new(0));

        for _ in 0..20 {
            let ran = Arc::clone(&ran);
            executor
                .submit_async(move |device| {
                    device.bind(BindingTarget::Program, None);
                    ran.fetch_add(1, Ordering::SeqCst);
                })
                .unwrap();
        }

        assert_eq!(executor.submit(move |_| ran.load(Ordering::SeqCst)), 20);
        executor.shutdown();
    }
}
