//! Web API - REST and WebSocket surface
//!
//! ## Responsibilities
//!
//! - Route table and HTTP handlers (`routes`)
//! - WebSocket command channel (`ws`)

pub mod routes;
pub mod ws;

use crate::models::DeviceStatus;
use crate::session::SessionState;
use crate::state::AppState;

/// Assemble the current device status snapshot.
pub fn device_status(state: &AppState) -> DeviceStatus {
    let connected = state.session.state() == SessionState::Ready;
    let channel_count = if connected {
        state.session.driver().channel_count()
    } else {
        0
    };
    DeviceStatus {
        connected,
        device_info: if connected {
            format!("BIO600 live-scan scanner ({} channel)", channel_count)
        } else {
            "BIO600 live-scan scanner (disconnected)".to_string()
        },
        matcher_available: state.session.matcher_available(),
        channel_count,
        preview_active: state.preview.is_active(),
        preview_fps: state.preview.current_fps(),
        connected_clients: state.registry.client_count(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::device::SimulatedDriver;
    use crate::state::{AppConfig, AppState};

    #[test]
    fn status_reports_device_info() {
        let state = AppState::new(AppConfig::default(), Arc::new(SimulatedDriver::new()));

        let status = device_status(&state);
        assert!(!status.connected);
        assert_eq!(status.device_info, "BIO600 live-scan scanner (disconnected)");

        state.session.init().unwrap();
        let status = device_status(&state);
        assert!(status.connected);
        assert_eq!(status.device_info, "BIO600 live-scan scanner (1 channel)");
        assert_eq!(status.channel_count, 1);
    }
}
