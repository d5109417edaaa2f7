//! Operator interrupt handling.
//!
//! A [`Shutdown`] handle is a shared flag.  The signal listener sets it; the
//! wait loops and the main poll loop check it and unwind with
//! [`RunError::Cancelled`](crate::error::RunError::Cancelled).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use anyhow::{Context, Result};

#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    requested: Arc<AtomicBool>,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request shutdown.  Idempotent.
    pub fn request(&self) {
        if !self.requested.swap(true, Ordering::SeqCst) {
            tracing::info!("shutdown requested");
        }
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }
}

/// Listen for Ctrl+C on a background thread and flip `shutdown` when it
/// arrives.  The rest of the program stays synchronous.
pub fn install_ctrl_c(shutdown: Shutdown) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build the signal runtime")?;

    thread::Builder::new()
        .name("ctrl-c".into())
        .spawn(move || {
            runtime.block_on(async {
                match tokio::signal::ctrl_c().await {
                    Ok(()) => {
                        tracing::warn!("Ctrl+C received");
                        shutdown.request();
                    }
                    Err(e) => tracing::error!(error = %e, "unable to listen for Ctrl+C"),
                }
            });
        })
        .context("failed to spawn the signal listener")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_flag() {
        let shutdown = Shutdown::new();
        let other = shutdown.clone();
        assert!(!other.is_requested());

        shutdown.request();
        assert!(other.is_requested());

        // second request is a no-op
        other.request();
        assert!(shutdown.is_requested());
    }
}
