use std::collections::HashSet;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use tracing::{debug, info, warn};

use crate::error::LoggedError;
use crate::remote::{Locator, RemoteError, RemoteSession};

pub const CALL_INDICATOR: &str = "//div[@class='contactImage' and contains(@style,'did')]";
pub const ANSWER_BUTTON: &str = "//button[text()='Answer']";

static LINE_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"did=([0-9*]+)").expect("valid line id pattern"));

/// Call-line identifiers allowed to be answered automatically.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Whitelist(HashSet<String>);

impl Whitelist {
    pub fn contains(&self, line: &str) -> bool {
        self.0.contains(line)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Entries in sorted order.
    pub fn sorted(&self) -> Vec<&str> {
        let mut lines: Vec<&str> = self.0.iter().map(String::as_str).collect();
        lines.sort_unstable();
        lines
    }
}

impl<S: AsRef<str>> FromIterator<S> for Whitelist {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|s| s.as_ref().trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        )
    }
}

/// Pull the call-line identifier out of the indicator's `style` attribute.
pub fn extract_line_id(style: &str) -> Option<&str> {
    LINE_ID
        .captures(style)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Result of one incoming-call check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallCheck {
    /// No incoming call on screen.
    Idle,
    /// A call from a line that is not whitelisted.
    Unlisted(String),
    /// Whitelisted call, but the Answer control was not clickable in time.
    NotReady(String),
    Answered(String),
}

/// Watches the dashboard for an incoming call and answers whitelisted lines.
#[derive(Debug, Clone)]
pub struct EventWatcher {
    whitelist: Whitelist,
    answer_wait: Duration,
}

impl EventWatcher {
    pub fn new(whitelist: Whitelist, answer_wait: Duration) -> Self {
        Self {
            whitelist,
            answer_wait,
        }
    }

    /// Look once for an incoming call. Never fails loudly: unexpected remote
    /// errors are logged here and reported as [`LoggedError`].
    pub fn check<S: RemoteSession>(&self, session: &mut S) -> Result<CallCheck, LoggedError> {
        match self.inspect(session) {
            Ok(outcome) => {
                match &outcome {
                    CallCheck::Idle => {}
                    CallCheck::Unlisted(line) => debug!(%line, "incoming call not whitelisted"),
                    CallCheck::NotReady(line) => {
                        debug!(%line, "answer control not clickable yet")
                    }
                    CallCheck::Answered(line) => info!(%line, "answered incoming call"),
                }
                Ok(outcome)
            }
            Err(e) => {
                warn!("incoming call check failed: {e}");
                Err(LoggedError::new("incoming call check"))
            }
        }
    }

    fn inspect<S: RemoteSession>(&self, session: &mut S) -> Result<CallCheck, RemoteError> {
        let Some(indicator) = absent_as_none(session.find_element(&Locator::xpath(CALL_INDICATOR)))?
        else {
            return Ok(CallCheck::Idle);
        };
        let Some(style) = absent_as_none(session.attribute(&indicator, "style"))?.flatten() else {
            return Ok(CallCheck::Idle);
        };
        let Some(line) = extract_line_id(&style).map(str::to_owned) else {
            return Ok(CallCheck::Idle);
        };

        if !self.whitelist.contains(&line) {
            return Ok(CallCheck::Unlisted(line));
        }

        let answer = Locator::xpath(ANSWER_BUTTON);
        let Some(button) = absent_as_none(session.wait_until_clickable(&answer, self.answer_wait))?
        else {
            return Ok(CallCheck::NotReady(line));
        };
        match absent_as_none(session.click(&button))? {
            Some(()) => Ok(CallCheck::Answered(line)),
            None => Ok(CallCheck::NotReady(line)),
        }
    }
}

// Missing elements and timeouts are the normal steady state here.
fn absent_as_none<T>(result: Result<T, RemoteError>) -> Result<Option<T>, RemoteError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_absent() => Ok(None),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::testing::FakeSession;

    fn watcher(lines: &[&str]) -> EventWatcher {
        EventWatcher::new(lines.iter().collect(), Duration::from_millis(10))
    }

    fn ringing(line: &str) -> FakeSession {
        let fake = FakeSession::new("alice", "s3cret").logged_in();
        fake.with(|s| {
            s.incoming_line = Some(line.into());
            s.answer_clickable = true;
        });
        fake
    }

    #[test]
    fn extracts_line_id() {
        assert_eq!(
            extract_line_id(r#"background-image: url("avatar.php?did=001&s=48");"#),
            Some("001")
        );
        assert_eq!(extract_line_id("url(avatar.php?did=*68)"), Some("*68"));
        assert_eq!(extract_line_id("url(avatar.php?uid=5)"), None);
        assert_eq!(extract_line_id("did=abc"), None);
    }

    #[test]
    fn whitelist_trims_and_skips_blanks() {
        let wl: Whitelist = ["*68", " 001 ", ""].iter().collect();
        assert_eq!(wl.len(), 2);
        assert!(wl.contains("001"));
        assert_eq!(wl.sorted(), vec!["*68", "001"]);
    }

    #[test]
    fn answers_whitelisted_line() {
        let mut fake = ringing("001");
        let outcome = watcher(&["*68", "001"]).check(&mut fake).unwrap();
        assert_eq!(outcome, CallCheck::Answered("001".into()));
        assert_eq!(fake.read(|s| s.answered), 1);
    }

    #[test]
    fn ignores_unlisted_line_without_error() {
        let mut fake = ringing("999");
        let outcome = watcher(&["*68", "001"]).check(&mut fake).unwrap();
        assert_eq!(outcome, CallCheck::Unlisted("999".into()));
        assert_eq!(fake.read(|s| s.answered), 0);
    }

    #[test]
    fn no_call_is_idle() {
        let mut fake = FakeSession::new("alice", "s3cret").logged_in();
        let outcome = watcher(&["001"]).check(&mut fake).unwrap();
        assert_eq!(outcome, CallCheck::Idle);
    }

    #[test]
    fn empty_whitelist_never_answers() {
        let mut fake = ringing("*68");
        let outcome = watcher(&[]).check(&mut fake).unwrap();
        assert_eq!(outcome, CallCheck::Unlisted("*68".into()));
        assert_eq!(fake.read(|s| s.answered), 0);
    }

    #[test]
    fn answer_control_not_ready_is_a_no_op() {
        let mut fake = ringing("001");
        fake.with(|s| s.answer_clickable = false);
        let outcome = watcher(&["001"]).check(&mut fake).unwrap();
        assert_eq!(outcome, CallCheck::NotReady("001".into()));
        assert_eq!(fake.read(|s| s.answered), 0);
    }

    struct BrokenSession;

    impl RemoteSession for BrokenSession {
        fn navigate(&mut self, _: &str) -> Result<(), RemoteError> {
            Ok(())
        }
        fn current_document(&mut self) -> Result<String, RemoteError> {
            Ok(String::new())
        }
        fn find_element(&mut self, _: &Locator) -> Result<crate::remote::ElementRef, RemoteError> {
            Err(RemoteError::Transport("invalid session id".into()))
        }
        fn click(&mut self, _: &crate::remote::ElementRef) -> Result<(), RemoteError> {
            Ok(())
        }
        fn send_keys(&mut self, _: &crate::remote::ElementRef, _: &str) -> Result<(), RemoteError> {
            Ok(())
        }
        fn attribute(
            &mut self,
            _: &crate::remote::ElementRef,
            _: &str,
        ) -> Result<Option<String>, RemoteError> {
            Ok(None)
        }
        fn wait_until_clickable(
            &mut self,
            locator: &Locator,
            _: Duration,
        ) -> Result<crate::remote::ElementRef, RemoteError> {
            Err(RemoteError::Timeout(locator.to_string()))
        }
        fn close(&mut self) -> Result<(), RemoteError> {
            Ok(())
        }
    }

    #[test]
    fn transport_failure_is_logged_and_swallowed() {
        let err = watcher(&["001"]).check(&mut BrokenSession).unwrap_err();
        assert_eq!(err.origin, "incoming call check");
    }
}
