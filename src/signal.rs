//! SIGINT handling: installs a single process-wide `ctrlc` handler and
//! hands back a shared flag the Coordinator polls once per frame.
//!
//! Grounded on `orig/main.cpp`'s `signal(SIGINT, ...)` registration,
//! which simply flips a `std::atomic_bool` read by the render loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{AppError, Result};

/// Installs the handler and returns a flag that flips to `true` the
/// first time SIGINT arrives. Registering more than one handler per
/// process is a `ctrlc` error, surfaced as `AppError::RuntimeMisconfig`
/// since it only happens if `main` calls this twice.
pub fn install() -> Result<Arc<AtomicBool>> {
    let stop = Arc::new(AtomicBool::new(false));
    let flag = stop.clone();
    ctrlc::set_handler(move || {
        tracing::info!("received SIGINT, shutting down");
        flag.store(true, Ordering::Relaxed);
    })
    .map_err(|e| AppError::RuntimeMisconfig(format!("failed to install SIGINT handler: {e}")))?;
    Ok(stop)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_starts_unset() {
        // `ctrlc::set_handler` can only be called once per process,
        // which collides with other tests in this binary doing the
        // same; exercise only the flag's initial state here.
        let stop = Arc::new(AtomicBool::new(false));
        assert!(!stop.load(Ordering::Relaxed));
    }
}
