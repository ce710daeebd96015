//! Signal bridge
//!
//! Translates SIGINT/SIGTERM into the server's stop flag. Process signals
//! are global, so exactly one bridge may exist at a time: the registration
//! slot is claimed with a compare-and-swap and a second registration is
//! rejected. Dropping the bridge unregisters the hooks, restoring the
//! signal disposition that was in place before.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use grind_core::{GrindError, GrindResult};
use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::SigId;
use tracing::info;

/// Process-wide registration slot
static BRIDGE_ACTIVE: AtomicBool = AtomicBool::new(false);

pub struct SignalBridge {
    ids: Vec<SigId>,
}

impl SignalBridge {
    /// Arrange for SIGINT and SIGTERM to set `stop`.
    ///
    /// Registering a second bridge while one is active is an
    /// assertion-level violation and fails with a `Fatal` error.
    pub fn register(stop: Arc<AtomicBool>) -> GrindResult<Self> {
        if BRIDGE_ACTIVE
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(GrindError::fatal(
                "a signal bridge is already registered for another instance",
            ));
        }

        let mut ids = Vec::with_capacity(2);
        for signal in [SIGINT, SIGTERM] {
            match signal_hook::flag::register(signal, Arc::clone(&stop)) {
                Ok(id) => ids.push(id),
                Err(error) => {
                    for id in ids.drain(..) {
                        signal_hook::low_level::unregister(id);
                    }
                    BRIDGE_ACTIVE.store(false, Ordering::SeqCst);
                    return Err(error.into());
                }
            }
        }
        info!("signal bridge installed");
        Ok(Self { ids })
    }
}

impl Drop for SignalBridge {
    fn drop(&mut self) {
        for id in self.ids.drain(..) {
            signal_hook::low_level::unregister(id);
        }
        BRIDGE_ACTIVE.store(false, Ordering::SeqCst);
        info!("signal bridge removed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_registration_is_rejected() {
        let stop = Arc::new(AtomicBool::new(false));
        let bridge = SignalBridge::register(Arc::clone(&stop)).unwrap();

        let second = SignalBridge::register(Arc::clone(&stop));
        assert!(matches!(second, Err(GrindError::Fatal { .. })));

        drop(bridge);
        // After teardown the slot is free again.
        let third = SignalBridge::register(stop).unwrap();
        drop(third);
    }
}
