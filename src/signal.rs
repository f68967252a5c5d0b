//! Process-wide run flag.
//!
//! Every loop in the daemon polls a [`ProcessSignal`]. The OS handlers only
//! store into the flag; nothing else happens in signal context.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use signal_hook::consts::{SIGINT, SIGTERM};
use tracing::info;

/// Shared "keep going" flag. Cloning shares the same flag.
#[derive(Debug, Clone, Default)]
pub struct ProcessSignal {
    // Set once a stop has been requested; never cleared.
    stop: Arc<AtomicBool>,
}

impl ProcessSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a stop.
    pub fn signal(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        !self.stop.load(Ordering::SeqCst)
    }

    /// Flip this flag on SIGINT or SIGTERM.
    pub fn install_os_handlers(&self) -> std::io::Result<()> {
        for sig in [SIGINT, SIGTERM] {
            signal_hook::flag::register(sig, Arc::clone(&self.stop))?;
        }
        info!("SIGINT/SIGTERM handlers installed");
        Ok(())
    }
}
