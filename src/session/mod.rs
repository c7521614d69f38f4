//! DeviceSessionManager - Scanner lifecycle and exclusive access
//!
//! ## Responsibilities
//!
//! - Bring up the driver subsystems in order (scanner, mosaic engine,
//!   splitter, matcher) and tear them down in reverse
//! - Unwind partially-initialized subsystems when init fails midway
//! - Hand out the single device lease that serializes hardware access
//!
//! The splitter and matcher are optional: the device is still usable for
//! flat captures when either fails to open.

use std::sync::{Arc, RwLock};

use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::device::{DeviceDriver, DRIVER_OK};
use crate::error::{Error, Result};

/// Capture window the splitter is calibrated against.
pub const PLATEN_WIDTH: i32 = 1600;
pub const PLATEN_HEIGHT: i32 = 1500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Ready,
    Closed,
}

struct SessionInner {
    state: SessionState,
    matcher_handle: Option<i32>,
    splitter_available: bool,
}

/// Owns the driver and the exclusive device lease.
pub struct DeviceSessionManager {
    driver: Arc<dyn DeviceDriver>,
    inner: RwLock<SessionInner>,
    device_lock: Arc<Mutex<()>>,
}

impl DeviceSessionManager {
    pub fn new(driver: Arc<dyn DeviceDriver>) -> Self {
        Self {
            driver,
            inner: RwLock::new(SessionInner {
                state: SessionState::Uninitialized,
                matcher_handle: None,
                splitter_available: false,
            }),
            device_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn driver(&self) -> &Arc<dyn DeviceDriver> {
        &self.driver
    }

    pub fn state(&self) -> SessionState {
        self.inner.read().unwrap().state
    }

    /// Acquire the device lease. Released when the guard drops.
    pub async fn acquire(&self) -> OwnedMutexGuard<()> {
        self.device_lock.clone().lock_owned().await
    }

    /// Try to acquire the device lease without waiting.
    pub fn try_acquire(&self) -> Option<OwnedMutexGuard<()>> {
        self.device_lock.clone().try_lock_owned().ok()
    }

    pub fn ensure_ready(&self) -> Result<()> {
        if self.state() != SessionState::Ready {
            return Err(Error::DeviceNotConnected);
        }
        Ok(())
    }

    pub fn matcher_available(&self) -> bool {
        self.inner.read().unwrap().matcher_handle.is_some()
    }

    pub fn splitter_available(&self) -> bool {
        self.inner.read().unwrap().splitter_available
    }

    /// Matcher handle, or an error when the matcher library never opened.
    pub fn matcher_handle(&self) -> Result<i32> {
        self.inner
            .read()
            .unwrap()
            .matcher_handle
            .ok_or_else(|| Error::Internal("matcher library not available".to_string()))
    }

    /// Open all driver subsystems. Idempotent once Ready.
    pub fn init(&self) -> Result<()> {
        {
            let inner = self.inner.read().unwrap();
            if inner.state == SessionState::Ready {
                return Ok(());
            }
        }

        if self.driver.open_scanner() != DRIVER_OK {
            tracing::error!("scanner init failed");
            return Err(Error::DeviceNotConnected);
        }

        if self.driver.open_mosaic() != DRIVER_OK {
            // Unwind the scanner before reporting failure
            self.driver.close_scanner();
            tracing::error!("mosaic engine init failed");
            return Err(Error::AcquisitionFailed("mosaic engine init failed".to_string()));
        }

        let splitter_available = self.driver.open_splitter(PLATEN_WIDTH, PLATEN_HEIGHT) == DRIVER_OK;
        if !splitter_available {
            tracing::warn!("splitter init failed, multi-finger split disabled");
        }

        let handle = self.driver.open_matcher();
        let matcher_handle = if handle != 0 {
            Some(handle)
        } else {
            tracing::warn!("matcher library unavailable, template functions disabled");
            None
        };

        self.driver.set_dry_wet(4);
        self.driver.beep(1);

        let mut inner = self.inner.write().unwrap();
        inner.state = SessionState::Ready;
        inner.matcher_handle = matcher_handle;
        inner.splitter_available = splitter_available;

        tracing::info!(
            channels = self.driver.channel_count(),
            matcher = matcher_handle.is_some(),
            splitter = splitter_available,
            "scanner session ready"
        );
        Ok(())
    }

    /// Close all subsystems in reverse of init order.
    pub fn close(&self) {
        let mut inner = self.inner.write().unwrap();
        if inner.state != SessionState::Ready {
            inner.state = SessionState::Closed;
            return;
        }
        if let Some(handle) = inner.matcher_handle.take() {
            self.driver.close_matcher(handle);
        }
        if inner.splitter_available {
            self.driver.close_splitter();
            inner.splitter_available = false;
        }
        self.driver.close_mosaic();
        self.driver.close_scanner();
        inner.state = SessionState::Closed;
        tracing::info!("scanner session closed");
    }
}

impl Drop for DeviceSessionManager {
    fn drop(&mut self) {
        if self.inner.read().unwrap().state == SessionState::Ready {
            self.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::SimulatedDriver;

    fn session_with_sim() -> (Arc<SimulatedDriver>, DeviceSessionManager) {
        let sim = Arc::new(SimulatedDriver::new());
        let session = DeviceSessionManager::new(sim.clone());
        (sim, session)
    }

    #[test]
    fn init_brings_session_ready_and_is_idempotent() {
        let (sim, session) = session_with_sim();
        assert_eq!(session.state(), SessionState::Uninitialized);

        session.init().unwrap();
        assert_eq!(session.state(), SessionState::Ready);
        assert!(session.matcher_available());
        assert!(session.splitter_available());
        assert_eq!(sim.beep_history(), vec![1]);

        session.init().unwrap();
        assert_eq!(sim.scanner_open_count(), 1);
    }

    #[test]
    fn scanner_failure_reports_device_not_connected() {
        let (sim, session) = session_with_sim();
        sim.set_scanner_ok(false);

        let err = session.init().unwrap_err();
        assert!(matches!(err, Error::DeviceNotConnected));
        assert_eq!(session.state(), SessionState::Uninitialized);
        assert_eq!(sim.mosaic_open_count(), 0);
    }

    #[test]
    fn mosaic_failure_unwinds_scanner() {
        let (sim, session) = session_with_sim();
        sim.set_mosaic_ok(false);

        assert!(session.init().is_err());
        assert_eq!(sim.scanner_close_count(), 1);
        assert_eq!(session.state(), SessionState::Uninitialized);
    }

    #[test]
    fn optional_subsystem_failures_are_tolerated() {
        let (sim, session) = session_with_sim();
        sim.set_splitter_ok(false);
        sim.set_matcher_available(false);

        session.init().unwrap();
        assert_eq!(session.state(), SessionState::Ready);
        assert!(!session.splitter_available());
        assert!(session.matcher_handle().is_err());
    }

    #[test]
    fn close_tears_down_in_reverse_order() {
        let (sim, session) = session_with_sim();
        session.init().unwrap();
        session.close();

        assert_eq!(session.state(), SessionState::Closed);
        assert_eq!(sim.matcher_close_count(), 1);
        assert_eq!(sim.splitter_close_count(), 1);
        assert_eq!(sim.mosaic_close_count(), 1);
        assert_eq!(sim.scanner_close_count(), 1);
        assert!(session.ensure_ready().is_err());
    }

    #[tokio::test]
    async fn device_lease_is_exclusive() {
        let (_sim, session) = session_with_sim();
        let guard = session.acquire().await;
        assert!(session.try_acquire().is_none());
        drop(guard);
        assert!(session.try_acquire().is_some());
    }
}
