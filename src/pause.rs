use std::time::Duration;

/// Where the keeper's fixed waits (retry backoff, login settle time) go.
pub trait Sleeper: Send {
    fn sleep(&self, duration: Duration);
}

/// Blocks the calling thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

#[cfg(test)]
pub mod testing {
    use std::sync::Arc;
    use std::time::Duration;

    use parking_lot::Mutex;

    use super::Sleeper;

    /// Records requested sleeps instead of sleeping.
    #[derive(Debug, Default, Clone)]
    pub struct RecordingSleeper {
        pub slept: Arc<Mutex<Vec<Duration>>>,
    }

    impl RecordingSleeper {
        pub fn count(&self, duration: Duration) -> usize {
            self.slept.lock().iter().filter(|d| **d == duration).count()
        }
    }

    impl Sleeper for RecordingSleeper {
        fn sleep(&self, duration: Duration) {
            self.slept.lock().push(duration);
        }
    }

    /// Runs a hook instead of sleeping.
    pub struct HookSleeper<F>(pub F);

    impl<F: Fn(Duration) + Send> Sleeper for HookSleeper<F> {
        fn sleep(&self, duration: Duration) {
            (self.0)(duration);
        }
    }
}
