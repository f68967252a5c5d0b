//! Process lifecycle.
//!
//! The supervisor owns the scheduler and the worker handle. Its own thread
//! only ticks the scheduler; the remote session lives inside the worker's
//! [`Station`] and is touched by jobs alone.

use std::fmt;
use std::sync::Arc;
use std::thread;

use tracing::{info, warn};

use crate::config::Settings;
use crate::error::{KeeperError, LoggedError};
use crate::keeper::SessionKeeper;
use crate::remote::RemoteSession;
use crate::scheduler::{Now, Scheduler};
use crate::signal::ProcessSignal;
use crate::watcher::EventWatcher;
use crate::worker::{JobQueue, Worker};

/// Lifecycle states, entered strictly in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    Starting,
    Running,
    Stopping,
    Stopped,
}

impl fmt::Display for SupervisorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SupervisorState::Starting => write!(f, "STARTING"),
            SupervisorState::Running => write!(f, "RUNNING"),
            SupervisorState::Stopping => write!(f, "STOPPING"),
            SupervisorState::Stopped => write!(f, "STOPPED"),
        }
    }
}

/// Everything a job may touch. Owned by the worker thread.
pub struct Station<S> {
    pub keeper: SessionKeeper<S>,
    pub watcher: EventWatcher,
}

impl<S: RemoteSession> Station<S> {
    pub fn new(session: S, settings: &Settings, signal: ProcessSignal) -> Self {
        Self {
            keeper: SessionKeeper::new(session, Arc::clone(&settings.credentials), signal)
                .with_timing(settings.timing),
            watcher: EventWatcher::new(settings.whitelist.clone(), settings.answer_wait),
        }
    }

    pub fn verify(&mut self) -> Result<(), LoggedError> {
        self.keeper.verify()
    }

    pub fn check(&mut self) -> Result<(), LoggedError> {
        self.watcher.check(self.keeper.session_mut()).map(|_| ())
    }

    /// Release the remote session. Failures are logged, not returned.
    pub fn close(self) {
        if let Err(e) = self.keeper.into_session().close() {
            warn!("closing remote session failed: {e}");
        }
    }
}

pub struct Supervisor {
    settings: Settings,
    signal: ProcessSignal,
    state: SupervisorState,
}

impl Supervisor {
    pub fn new(settings: Settings, signal: ProcessSignal) -> Self {
        Self {
            settings,
            signal,
            state: SupervisorState::Starting,
        }
    }

    pub fn state(&self) -> SupervisorState {
        self.state
    }

    fn enter(&mut self, next: SupervisorState) {
        info!(from = %self.state, to = %next, "supervisor state change");
        self.state = next;
    }

    /// Drive `session` until the process signal asks to stop, then shut down
    /// in order and close the session.
    pub fn run<S: RemoteSession + 'static>(&mut self, session: S) -> Result<(), KeeperError> {
        self.state = SupervisorState::Starting;
        info!(
            user = %self.settings.credentials.username,
            dashboard = %self.settings.credentials.base_url,
            whitelisted = self.settings.whitelist.len(),
            "supervisor starting"
        );
        let station = Station::new(session, &self.settings, self.signal.clone());
        let worker = Worker::spawn(station, JobQueue::new())?;
        // Cold start: do not wait for the first daily slot.
        worker.queue().put(Station::verify);

        self.enter(SupervisorState::Running);
        let now = Now::read();
        let mut scheduler = self.schedule_at(now, worker.queue());
        for entry in scheduler.entries() {
            info!(
                label = entry.label,
                cadence = %entry.cadence,
                next_run = ?entry.next_run().to_wall(now),
                "scheduled"
            );
        }
        while self.signal.is_running() {
            scheduler.run_pending();
            thread::sleep(self.settings.poll_interval);
        }

        self.enter(SupervisorState::Stopping);
        scheduler.clear();
        info!(pending = worker.queue().len(), "waiting for the worker to finish");
        let station = worker.join()?;

        self.enter(SupervisorState::Stopped);
        station.close();
        Ok(())
    }

    /// Register the three recurring entries, counting from `now`.
    fn schedule_at<S: RemoteSession + 'static>(
        &self,
        now: Now,
        queue: &JobQueue<Station<S>>,
    ) -> Scheduler {
        let mut scheduler = Scheduler::new();

        let jobs = queue.clone();
        scheduler.register_at(now, "verify session", self.settings.daily_verify, move || {
            jobs.put(Station::verify)
        });

        // Runs here rather than on the worker so it drops the backlog instead
        // of waiting behind it.
        let jobs = queue.clone();
        scheduler.register_at(now, "clear queue", self.settings.hourly_clear, move || {
            if jobs.is_empty() {
                return;
            }
            let dropped = jobs.clear();
            info!(dropped, "cleared pending jobs");
        });

        let jobs = queue.clone();
        scheduler.register_at(now, "check calls", self.settings.check_every, move || {
            jobs.put(Station::check)
        });

        scheduler
    }
}
