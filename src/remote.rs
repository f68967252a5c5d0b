//! The capability the daemon needs from a browser: navigate, read the page,
//! find and poke elements. Everything above this module talks to the remote
//! dashboard only through [`RemoteSession`].

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Failures a remote session can surface. All of them are transient from the
/// daemon's point of view.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    #[error("element not found: {0}")]
    NotFound(String),

    #[error("timed out: {0}")]
    Timeout(String),

    #[error("transport error: {0}")]
    Transport(String),
}

impl RemoteError {
    /// True when the element simply isn't there (yet).
    pub fn is_absent(&self) -> bool {
        matches!(self, RemoteError::NotFound(_) | RemoteError::Timeout(_))
    }
}

/// How to find an element on the current page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    Css(String),
    XPath(String),
}

impl Locator {
    pub fn css(selector: impl Into<String>) -> Self {
        Locator::Css(selector.into())
    }

    pub fn xpath(expr: impl Into<String>) -> Self {
        Locator::XPath(expr.into())
    }

    /// Locator kind, as shown in logs and errors.
    pub fn strategy(&self) -> &'static str {
        match self {
            Locator::Css(_) => "css selector",
            Locator::XPath(_) => "xpath",
        }
    }

    pub fn value(&self) -> &str {
        match self {
            Locator::Css(v) | Locator::XPath(v) => v,
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.strategy(), self.value())
    }
}

/// Opaque handle to an element located on the current page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementRef(pub String);

/// A live, single-user browser session. Not safe for concurrent use, so it is
/// only ever driven from the worker thread.
pub trait RemoteSession: Send {
    fn navigate(&mut self, url: &str) -> Result<(), RemoteError>;

    /// Serialized DOM of the current page.
    fn current_document(&mut self) -> Result<String, RemoteError>;

    fn find_element(&mut self, locator: &Locator) -> Result<ElementRef, RemoteError>;

    fn click(&mut self, element: &ElementRef) -> Result<(), RemoteError>;

    fn send_keys(&mut self, element: &ElementRef, text: &str) -> Result<(), RemoteError>;

    fn attribute(&mut self, element: &ElementRef, name: &str)
    -> Result<Option<String>, RemoteError>;

    /// Wait until the element is present, displayed and enabled.
    fn wait_until_clickable(
        &mut self,
        locator: &Locator,
        timeout: Duration,
    ) -> Result<ElementRef, RemoteError>;

    fn close(&mut self) -> Result<(), RemoteError>;
}
