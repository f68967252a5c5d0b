//! The single background worker.
//!
//! All access to the remote session goes through jobs run here, one at a
//! time, so the session never sees concurrent use.

mod queue;

pub use queue::{Job, JobQueue};

use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, info};

use crate::error::KeeperError;
use crate::signal::ProcessSignal;

/// How long the worker blocks on an empty queue before re-checking its stop flag.
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Handle to the worker thread. The thread owns the context `C` and gives it
/// back on [`join`](Worker::join).
pub struct Worker<C: Send + 'static> {
    queue: JobQueue<C>,
    stop: ProcessSignal,
    handle: Option<JoinHandle<C>>,
}

impl<C: Send + 'static> Worker<C> {
    /// Start draining `queue` on a new thread.
    pub fn spawn(context: C, queue: JobQueue<C>) -> Result<Self, KeeperError> {
        Self::spawn_with_poll(context, queue, POLL_INTERVAL)
    }

    pub fn spawn_with_poll(
        context: C,
        queue: JobQueue<C>,
        poll: Duration,
    ) -> Result<Self, KeeperError> {
        let stop = ProcessSignal::new();
        let handle = {
            let queue = queue.clone();
            let stop = stop.clone();
            thread::Builder::new()
                .name("job-worker".into())
                .spawn(move || drain(context, queue, stop, poll))?
        };
        Ok(Self {
            queue,
            stop,
            handle: Some(handle),
        })
    }

    pub fn queue(&self) -> &JobQueue<C> {
        &self.queue
    }

    /// Ask the worker to stop. A job already running is not interrupted;
    /// pending and later jobs are dropped.
    pub fn finish(&self) {
        self.stop.signal();
        self.queue.close();
    }

    /// Wait for the worker thread and take its context back.
    pub fn join(mut self) -> Result<C, KeeperError> {
        self.finish();
        match self.handle.take() {
            Some(handle) => handle.join().map_err(|_| KeeperError::WorkerPanicked),
            None => Err(KeeperError::WorkerPanicked),
        }
    }
}

impl<C: Send + 'static> Drop for Worker<C> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.finish();
            let _ = handle.join();
        }
    }
}

fn drain<C>(mut context: C, queue: JobQueue<C>, stop: ProcessSignal, poll: Duration) -> C {
    info!("job worker started");
    let mut executed: u64 = 0;

    while stop.is_running() {
        let Some(job) = queue.pop_timeout(poll) else {
            continue;
        };
        // Anything handed over after finish() is discarded, not run.
        if !stop.is_running() {
            break;
        }
        if let Err(e) = job(&mut context) {
            debug!("job ended early: {e}");
        }
        executed += 1;
    }

    let discarded = queue.clear();
    info!(executed, discarded, "job worker stopped");
    context
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LoggedError;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    #[derive(Default)]
    struct Tracker {
        running: Arc<AtomicUsize>,
        max_running: Arc<AtomicUsize>,
        done: Arc<AtomicUsize>,
    }

    fn tracked_job(tracker: &mut Tracker) -> Result<(), LoggedError> {
        let now = tracker.running.fetch_add(1, Ordering::SeqCst) + 1;
        tracker.max_running.fetch_max(now, Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(2));
        tracker.running.fetch_sub(1, Ordering::SeqCst);
        tracker.done.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn wait_for(cond: impl Fn() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(10);
        while !cond() {
            assert!(Instant::now() < deadline, "condition not reached in time");
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn never_runs_two_jobs_at_once() {
        let tracker = Tracker::default();
        let max_running = Arc::clone(&tracker.max_running);
        let done = Arc::clone(&tracker.done);
        let queue = JobQueue::new();
        let worker =
            Worker::spawn_with_poll(tracker, queue.clone(), Duration::from_millis(20)).unwrap();

        let producers: Vec<_> = (0..4)
            .map(|_| {
                let queue = queue.clone();
                std::thread::spawn(move || {
                    for _ in 0..10 {
                        queue.put(tracked_job);
                    }
                })
            })
            .collect();
        for p in producers {
            p.join().unwrap();
        }

        wait_for(|| done.load(Ordering::SeqCst) == 40);
        worker.join().unwrap();
        assert_eq!(max_running.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn jobs_after_finish_never_run() {
        let queue: JobQueue<Vec<u32>> = JobQueue::new();
        queue.put(|v: &mut Vec<u32>| {
            v.push(1);
            Ok(())
        });
        let worker =
            Worker::spawn_with_poll(Vec::new(), queue.clone(), Duration::from_millis(20)).unwrap();
        wait_for(|| queue.is_empty());

        worker.finish();
        queue.put(|v: &mut Vec<u32>| {
            v.push(2);
            Ok(())
        });

        let started = Instant::now();
        let seen = worker.join().unwrap();
        assert!(started.elapsed() < Duration::from_millis(500));
        assert!(!seen.contains(&2));
        assert!(queue.is_empty());
    }

    #[test]
    fn failing_job_does_not_stop_worker() {
        let hits = Arc::new(AtomicUsize::new(0));
        let queue: JobQueue<Arc<AtomicUsize>> = JobQueue::new();
        queue.put(|_: &mut Arc<AtomicUsize>| Err(LoggedError::new("test job")));
        queue.put(|hits: &mut Arc<AtomicUsize>| {
            hits.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        let worker =
            Worker::spawn_with_poll(Arc::clone(&hits), queue, Duration::from_millis(20)).unwrap();
        wait_for(|| hits.load(Ordering::SeqCst) == 1);
        worker.join().unwrap();
    }

    #[test]
    fn finish_wakes_idle_worker_promptly() {
        let queue: JobQueue<()> = JobQueue::new();
        let worker = Worker::spawn((), queue).unwrap();
        std::thread::sleep(Duration::from_millis(50));

        let started = Instant::now();
        worker.join().unwrap();
        assert!(started.elapsed() < Duration::from_millis(500));
    }

    #[test]
    fn join_does_not_wait_out_a_long_poll() {
        let queue: JobQueue<()> = JobQueue::new();
        let worker = Worker::spawn_with_poll((), queue, Duration::from_secs(3)).unwrap();
        std::thread::sleep(Duration::from_millis(100));

        let started = Instant::now();
        worker.join().unwrap();
        assert!(started.elapsed() < Duration::from_millis(500));
    }
}
