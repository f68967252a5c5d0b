//! [`RemoteSession`](crate::remote::RemoteSession) over the Chrome DevTools
//! Protocol, driving a local Chrome through `chromiumoxide`.

mod error;
mod launch;
mod session;

pub use launch::LaunchOptions;
pub use session::BrowserSession;
