//! Thread pool that runs the simulated callers.

use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread;

use crossbeam_channel::{unbounded, Sender};
use tracing::trace;

struct Job(Box<dyn FnOnce() + Send + 'static>);

#[derive(Debug)]
struct Worker {
    id: usize,
    thread: Option<thread::JoinHandle<()>>,
}

impl Drop for Worker {
    /// When dropped, the thread's `JoinHandle` is `join`ed. If the worker panicked, the panic is
    /// propagated, unless this thread is already unwinding.
    fn drop(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };
        if let Err(panic) = thread.join() {
            if !thread::panicking() {
                trace!(worker = self.id, "propagating worker panic");
                std::panic::resume_unwind(panic);
            }
        }
    }
}

/// Internal data structure for tracking the current job status. This is shared by the worker
/// closures via `Arc` so that the workers can report to the pool that they started/finished a
/// job.
#[derive(Debug, Default)]
struct ThreadPoolInner {
    job_count: Mutex<usize>,
    empty_condvar: Condvar,
}

impl ThreadPoolInner {
    /// Increment the job count.
    fn start_job(&self) {
        *self.job_count.lock().unwrap_or_else(PoisonError::into_inner) += 1;
    }

    /// Decrement the job count, waking up `wait_empty` callers when it drops to zero.
    fn finish_job(&self) {
        let mut job_count = self.job_count.lock().unwrap_or_else(PoisonError::into_inner);
        *job_count -= 1;
        if *job_count == 0 {
            self.empty_condvar.notify_all();
        }
    }

    /// Wait until the job count becomes 0.
    fn wait_empty(&self) {
        let job_count = self.job_count.lock().unwrap_or_else(PoisonError::into_inner);
        let _guard = self
            .empty_condvar
            .wait_while(job_count, |job_count| *job_count > 0)
            .unwrap_or_else(PoisonError::into_inner);
    }
}

/// Decrements the job count when a job returns or unwinds.
struct FinishJob<'a>(&'a ThreadPoolInner);

impl Drop for FinishJob<'_> {
    fn drop(&mut self) {
        self.0.finish_job();
    }
}

/// Thread pool.
#[derive(Debug)]
pub struct ThreadPool {
    _workers: Vec<Worker>,
    job_sender: Option<Sender<Job>>,
    pool_inner: Arc<ThreadPoolInner>,
}

impl std::fmt::Debug for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Job")
    }
}

impl ThreadPool {
    /// Create a new ThreadPool with `size` threads.
    ///
    /// # Panics
    ///
    /// Panics if `size` is 0 or the OS refuses to spawn a thread.
    pub fn new(size: usize) -> Self {
        assert!(size > 0, "a thread pool needs at least one worker");

        let (job_sender, job_receiver) = unbounded::<Job>();
        let pool_inner = Arc::new(ThreadPoolInner::default());

        let workers = (0..size)
            .map(|id| {
                let job_receiver = job_receiver.clone();
                let pool_inner = pool_inner.clone();
                let thread = thread::Builder::new()
                    .name(format!("caller-{id}"))
                    .spawn(move || {
                        for Job(job) in job_receiver {
                            let _finish = FinishJob(&pool_inner);
                            job();
                        }
                    })
                    .expect("failed to spawn a worker thread");
                Worker {
                    id,
                    thread: Some(thread),
                }
            })
            .collect();

        ThreadPool {
            _workers: workers,
            job_sender: Some(job_sender),
            pool_inner,
        }
    }

    /// Execute a new job in the thread pool.
    pub fn execute<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let Some(job_sender) = &self.job_sender else {
            return;
        };
        self.pool_inner.start_job();
        if job_sender.send(Job(Box::new(f))).is_err() {
            // Every worker is gone; nobody will ever finish this job.
            self.pool_inner.finish_job();
        }
    }

    /// Block the current thread until all jobs in the pool have been executed.
    ///
    /// NOTE: This method has nothing to do with `JoinHandle::join`.
    pub fn join(&self) {
        self.pool_inner.wait_empty();
    }
}

impl Drop for ThreadPool {
    /// When dropped, all worker threads' `JoinHandle` must be `join`ed. If the thread panicked,
    /// then this function should panic too.
    fn drop(&mut self) {
        // Closing the channel lets the workers drain the queue and exit.
        drop(self.job_sender.take());
    }
}
