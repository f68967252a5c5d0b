use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::debug;

use crate::error::LoggedError;

/// A unit of work run exactly once by the worker, with exclusive access to the
/// worker's context. Jobs report their own failures before returning `Err`.
pub type Job<C> = Box<dyn FnOnce(&mut C) -> Result<(), LoggedError> + Send + 'static>;

/// Unbounded FIFO shared between the scheduler thread and the worker.
///
/// Once [`close`](Self::close)d the queue hands nothing out and accepts
/// nothing new.
pub struct JobQueue<C> {
    inner: Arc<Inner<C>>,
}

struct Inner<C> {
    state: Mutex<State<C>>,
    ready: Condvar,
}

struct State<C> {
    jobs: VecDeque<Job<C>>,
    closed: bool,
}

impl<C> Clone for JobQueue<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C> Default for JobQueue<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> JobQueue<C> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State {
                    jobs: VecDeque::new(),
                    closed: false,
                }),
                ready: Condvar::new(),
            }),
        }
    }

    /// Enqueue a job. Never blocks beyond the queue lock. Dropped if the queue
    /// is closed.
    pub fn put<F>(&self, job: F)
    where
        F: FnOnce(&mut C) -> Result<(), LoggedError> + Send + 'static,
    {
        let mut state = self.inner.state.lock();
        if state.closed {
            debug!("queue closed, job dropped");
            return;
        }
        state.jobs.push_back(Box::new(job));
        drop(state);
        self.inner.ready.notify_one();
    }

    /// Drop every pending job without running it. Returns how many were dropped.
    pub fn clear(&self) -> usize {
        let mut state = self.inner.state.lock();
        let dropped = state.jobs.len();
        state.jobs.clear();
        dropped
    }

    pub fn len(&self) -> usize {
        self.inner.state.lock().jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.state.lock().jobs.is_empty()
    }

    /// Take the oldest job, waiting at most `timeout` for one to arrive.
    /// Returns `None` as soon as the queue is closed.
    pub fn pop_timeout(&self, timeout: Duration) -> Option<Job<C>> {
        let deadline = Instant::now().checked_add(timeout);
        let mut state = self.inner.state.lock();
        loop {
            if state.closed {
                return None;
            }
            if let Some(job) = state.jobs.pop_front() {
                return Some(job);
            }
            match deadline {
                Some(deadline) => {
                    if self.inner.ready.wait_until(&mut state, deadline).timed_out() {
                        return if state.closed {
                            None
                        } else {
                            state.jobs.pop_front()
                        };
                    }
                }
                None => self.inner.ready.wait(&mut state),
            }
        }
    }

    /// Close the queue and wake every thread blocked in
    /// [`pop_timeout`](Self::pop_timeout).
    pub fn close(&self) {
        self.inner.state.lock().closed = true;
        self.inner.ready.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(queue: &JobQueue<Vec<&'static str>>) -> Vec<&'static str> {
        let mut seen = Vec::new();
        while let Some(job) = queue.pop_timeout(Duration::ZERO) {
            job(&mut seen).unwrap();
        }
        seen
    }

    #[test]
    fn fifo_order() {
        let queue = JobQueue::new();
        for tag in ["verify", "check", "check"] {
            queue.put(move |seen: &mut Vec<&'static str>| {
                seen.push(tag);
                Ok(())
            });
        }
        assert_eq!(queue.len(), 3);
        assert_eq!(run(&queue), vec!["verify", "check", "check"]);
        assert!(queue.is_empty());
    }

    #[test]
    fn clear_then_put_leaves_only_new_job() {
        let queue = JobQueue::new();
        for _ in 0..5 {
            queue.put(|seen: &mut Vec<&'static str>| {
                seen.push("stale");
                Ok(())
            });
        }
        assert_eq!(queue.clear(), 5);
        queue.put(|seen: &mut Vec<&'static str>| {
            seen.push("fresh");
            Ok(())
        });
        assert_eq!(queue.len(), 1);
        assert_eq!(run(&queue), vec!["fresh"]);
    }

    #[test]
    fn clear_on_empty_queue() {
        let queue: JobQueue<Vec<&'static str>> = JobQueue::new();
        assert_eq!(queue.clear(), 0);
        assert_eq!(queue.clear(), 0);
    }

    #[test]
    fn pop_times_out_empty() {
        let queue: JobQueue<()> = JobQueue::new();
        let started = Instant::now();
        assert!(queue.pop_timeout(Duration::from_millis(50)).is_none());
        assert!(started.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn pop_wakes_on_put_from_other_thread() {
        let queue: JobQueue<u32> = JobQueue::new();
        let producer = queue.clone();
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            producer.put(|n: &mut u32| {
                *n += 1;
                Ok(())
            });
        });

        let job = queue.pop_timeout(Duration::from_secs(5)).expect("job arrives");
        let mut n = 0;
        job(&mut n).unwrap();
        assert_eq!(n, 1);
        handle.join().unwrap();
    }

    #[test]
    fn close_releases_a_blocked_pop() {
        let queue: JobQueue<()> = JobQueue::new();
        let waiting = queue.clone();
        let handle = std::thread::spawn(move || {
            let started = Instant::now();
            let job = waiting.pop_timeout(Duration::from_secs(10));
            (job.is_none(), started.elapsed())
        });
        std::thread::sleep(Duration::from_millis(50));

        queue.close();
        let (empty, waited) = handle.join().unwrap();
        assert!(empty);
        assert!(waited < Duration::from_secs(2));
    }

    #[test]
    fn closed_queue_drops_new_and_hides_pending_jobs() {
        let queue: JobQueue<u32> = JobQueue::new();
        queue.put(|_: &mut u32| Ok(()));
        queue.close();
        queue.put(|_: &mut u32| Ok(()));
        assert_eq!(queue.len(), 1);
        assert!(queue.pop_timeout(Duration::ZERO).is_none());
        assert_eq!(queue.clear(), 1);
    }

    #[test]
    fn huge_timeout_still_returns_the_job() {
        let queue: JobQueue<u32> = JobQueue::new();
        queue.put(|n: &mut u32| {
            *n += 1;
            Ok(())
        });
        assert!(queue.pop_timeout(Duration::MAX).is_some());
    }
}
