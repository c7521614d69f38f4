//! Application state shared across handlers

use std::sync::Arc;
use std::time::Instant;

use crate::capture::CaptureOrchestrator;
use crate::device::DeviceDriver;
use crate::preview::{PreviewSettings, PreviewStreamingLoop};
use crate::realtime_hub::ConnectionRegistry;
use crate::session::DeviceSessionManager;
use crate::template_store::TemplateStore;

/// Runtime configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    pub static_dir: String,
    pub preview_channel: i32,
    pub preview_width: i32,
    pub preview_height: i32,
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_or_i32(key: &str, default: i32) -> i32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: env_or("BIND_ADDR", "0.0.0.0:5000"),
            static_dir: env_or("STATIC_DIR", "static"),
            preview_channel: env_or_i32("PREVIEW_CHANNEL", 0),
            preview_width: env_or_i32("PREVIEW_WIDTH", 1600),
            preview_height: env_or_i32("PREVIEW_HEIGHT", 1500),
        }
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub session: Arc<DeviceSessionManager>,
    pub orchestrator: Arc<CaptureOrchestrator>,
    pub registry: Arc<ConnectionRegistry>,
    pub preview: Arc<PreviewStreamingLoop>,
    pub store: Arc<TemplateStore>,
    pub start_time: Instant,
}

impl AppState {
    /// Wire every component together over one driver instance.
    pub fn new(config: AppConfig, driver: Arc<dyn DeviceDriver>) -> Self {
        let session = Arc::new(DeviceSessionManager::new(driver));
        let orchestrator = Arc::new(CaptureOrchestrator::new(session.clone()));
        let registry = Arc::new(ConnectionRegistry::new());
        let preview = Arc::new(PreviewStreamingLoop::new(
            session.clone(),
            registry.clone(),
            PreviewSettings {
                channel: config.preview_channel,
                width: config.preview_width,
                height: config.preview_height,
            },
        ));

        // The preview pump only makes sense while someone is watching.
        let hook_preview = preview.clone();
        registry.set_last_disconnect_hook(move || {
            hook_preview.stop();
        });

        Self {
            config,
            session,
            orchestrator,
            registry,
            preview,
            store: Arc::new(TemplateStore::new()),
            start_time: Instant::now(),
        }
    }

    pub fn uptime_sec(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
