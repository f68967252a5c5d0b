//! Keeps the dashboard session logged in as the configured user.
//!
//! [`SessionKeeper::verify`] is the heart of the daemon: it fetches the
//! dashboard, logs in again when the welcome banner is missing or greets
//! someone else, and retries forever (with a fixed backoff) on anything the
//! remote side throws at it. Only a process stop makes it give up.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::Credentials;
use crate::dashboard;
use crate::error::LoggedError;
use crate::pause::{Sleeper, ThreadSleeper};
use crate::remote::{Locator, RemoteError, RemoteSession};
use crate::signal::ProcessSignal;

pub const USERNAME_FIELD: &str = "input[name='username']";
pub const PASSWORD_FIELD: &str = "input[name='password']";
pub const LOGIN_BUTTON: &str = "#btn-login";
pub const LOGIN_PATH: &str = "/index.php";
pub const DASHBOARD_PATH: &str = "/index.php?display=dashboard";

pub const PHONE_WIDGET: &str = "//a[@data-widget_type_id='phone' and @data-name='Phone']";

/// Fixed waits used by the keeper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeeperTiming {
    /// Pause between a failed verification attempt and the next one.
    pub retry_backoff: Duration,
    /// Pause after loading the login page and after submitting it.
    pub login_settle: Duration,
}

impl Default for KeeperTiming {
    fn default() -> Self {
        Self {
            retry_backoff: Duration::from_secs(3),
            login_settle: Duration::from_secs(3),
        }
    }
}

/// What one look at the dashboard tells us about the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DashboardStatus {
    /// Greeted as the configured user; carries the banner text.
    Authenticated(String),
    /// Logged out, or logged in as somebody else.
    NeedsReauth,
    /// The dashboard could not be read this time.
    TransientFailure(RemoteError),
}

/// Why a single verification attempt did not succeed.
#[derive(Debug, Error)]
enum AttemptError {
    #[error("{step}: {source}")]
    Remote {
        step: &'static str,
        source: RemoteError,
    },

    #[error("login submitted but dashboard still does not greet {0}")]
    NotConfirmed(String),
}

pub struct SessionKeeper<S> {
    session: S,
    credentials: Arc<Credentials>,
    signal: ProcessSignal,
    timing: KeeperTiming,
    sleeper: Box<dyn Sleeper>,
}

impl<S: RemoteSession> SessionKeeper<S> {
    pub fn new(session: S, credentials: Arc<Credentials>, signal: ProcessSignal) -> Self {
        Self {
            session,
            credentials,
            signal,
            timing: KeeperTiming::default(),
            sleeper: Box::new(ThreadSleeper),
        }
    }

    pub fn with_timing(mut self, timing: KeeperTiming) -> Self {
        self.timing = timing;
        self
    }

    #[cfg(test)]
    pub fn with_sleeper(mut self, sleeper: impl Sleeper + 'static) -> Self {
        self.sleeper = Box::new(sleeper);
        self
    }

    pub fn session_mut(&mut self) -> &mut S {
        &mut self.session
    }

    pub fn into_session(self) -> S {
        self.session
    }

    pub fn login_url(&self) -> String {
        format!("{}{LOGIN_PATH}", self.credentials.base_url)
    }

    pub fn dashboard_url(&self) -> String {
        format!("{}{DASHBOARD_PATH}", self.credentials.base_url)
    }

    /// Make sure the session is logged in as the configured user.
    ///
    /// Returns `Ok` once the dashboard greets the user. Transient failures
    /// are logged and retried after [`KeeperTiming::retry_backoff`] with no
    /// upper bound; the only way out besides success is a stop request on the
    /// process signal, which yields `Err`.
    pub fn verify(&mut self) -> Result<(), LoggedError> {
        let mut attempt: u32 = 0;
        loop {
            if !self.signal.is_running() {
                info!(attempt, "stop requested, abandoning session verification");
                return Err(LoggedError::new("session verification"));
            }
            attempt += 1;

            match self.attempt() {
                Ok(banner) => {
                    info!(attempt, "{banner}");
                    self.enable_phone_widget();
                    return Ok(());
                }
                Err(e) => {
                    warn!(attempt, "session verification failed at {e}");
                    warn!(
                        "retry after waiting for {} seconds",
                        self.timing.retry_backoff.as_secs_f64()
                    );
                    self.sleeper.sleep(self.timing.retry_backoff);
                }
            }
        }
    }

    /// Load the dashboard and classify what it shows.
    pub fn inspect(&mut self) -> DashboardStatus {
        let url = self.dashboard_url();
        let document = match self
            .session
            .navigate(&url)
            .and_then(|()| self.session.current_document())
        {
            Ok(document) => document,
            Err(e) => return DashboardStatus::TransientFailure(e),
        };

        match dashboard::welcome_banner(&document) {
            Some(banner) if dashboard::greets(&banner, &self.credentials.username) => {
                DashboardStatus::Authenticated(banner)
            }
            Some(banner) => {
                debug!(%banner, "dashboard greets someone else");
                DashboardStatus::NeedsReauth
            }
            None => DashboardStatus::NeedsReauth,
        }
    }

    /// Submit the login form once. No retries here; `verify` owns them.
    pub fn authenticate(&mut self) -> Result<(), RemoteError> {
        info!("[start] login process");
        let url = self.login_url();
        self.session.navigate(&url)?;
        self.sleeper.sleep(self.timing.login_settle);

        let username = self.session.find_element(&Locator::css(USERNAME_FIELD))?;
        self.session
            .send_keys(&username, &self.credentials.username)?;
        let password = self.session.find_element(&Locator::css(PASSWORD_FIELD))?;
        self.session
            .send_keys(&password, self.credentials.password())?;

        let button = self.session.find_element(&Locator::css(LOGIN_BUTTON))?;
        self.session.click(&button)?;
        self.sleeper.sleep(self.timing.login_settle);
        info!("[ end ] login process");
        Ok(())
    }

    fn attempt(&mut self) -> Result<String, AttemptError> {
        match self.inspect() {
            DashboardStatus::Authenticated(banner) => Ok(banner),
            DashboardStatus::TransientFailure(source) => Err(AttemptError::Remote {
                step: "dashboard",
                source,
            }),
            DashboardStatus::NeedsReauth => {
                info!(user = %self.credentials.username, "not logged in, authenticating");
                self.authenticate()
                    .map_err(|source| AttemptError::Remote { step: "login", source })?;
                match self.inspect() {
                    DashboardStatus::Authenticated(banner) => Ok(banner),
                    DashboardStatus::NeedsReauth => {
                        Err(AttemptError::NotConfirmed(self.credentials.username.clone()))
                    }
                    DashboardStatus::TransientFailure(source) => Err(AttemptError::Remote {
                        step: "dashboard after login",
                        source,
                    }),
                }
            }
        }
    }

    // Best effort: the session is already verified whether or not this works.
    fn enable_phone_widget(&mut self) {
        let result = self
            .session
            .find_element(&Locator::xpath(PHONE_WIDGET))
            .and_then(|widget| self.session.click(&widget));
        match result {
            Ok(()) => debug!("phone widget enabled"),
            Err(e) => warn!("could not enable phone widget: {e}"),
        }
    }
}
