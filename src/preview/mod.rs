//! PreviewStreamingLoop - Live platen preview
//!
//! ## Responsibilities
//!
//! - Background frame pump broadcasting preview frames to the hub
//! - Frame pacing (about 30fps locally, 25fps with remote clients)
//! - Per-frame device lease so capture operations interleave cleanly
//!
//! The loop acquires the device lease for each frame and releases it
//! before pacing, so a pending capture request wins the lock between
//! frames instead of waiting for the preview to stop.

use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use tokio::sync::watch;

use crate::capture::bmp;
use crate::device::DRIVER_OK;
use crate::models::PreviewFrame;
use crate::realtime_hub::{ConnectionRegistry, HubMessage};
use crate::session::{DeviceSessionManager, PLATEN_HEIGHT, PLATEN_WIDTH};

/// Frames below this quality are read but not broadcast.
const EMIT_QUALITY_FLOOR: i32 = -10;
/// Pacing for clients on the same host (about 30fps).
const LOCAL_FRAME_DELAY: Duration = Duration::from_millis(33);
/// Pacing when any remote client is connected (about 25fps).
const REMOTE_FRAME_DELAY: Duration = Duration::from_millis(40);
/// Backoff after a failed frame read.
const RETRY_BACKOFF: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy)]
pub struct PreviewSettings {
    pub channel: i32,
    pub width: i32,
    pub height: i32,
}

impl Default for PreviewSettings {
    fn default() -> Self {
        Self {
            channel: 0,
            width: PLATEN_WIDTH,
            height: PLATEN_HEIGHT,
        }
    }
}

/// Background preview pump.
pub struct PreviewStreamingLoop {
    session: Arc<DeviceSessionManager>,
    registry: Arc<ConnectionRegistry>,
    settings: PreviewSettings,
    active: AtomicBool,
    fps: AtomicI32,
    /// Bumped on every start/stop; a pump task may only clean up state
    /// while its own generation is still current.
    generation: AtomicU64,
    cancel: Mutex<Option<watch::Sender<bool>>>,
}

impl PreviewStreamingLoop {
    pub fn new(
        session: Arc<DeviceSessionManager>,
        registry: Arc<ConnectionRegistry>,
        settings: PreviewSettings,
    ) -> Self {
        Self {
            session,
            registry,
            settings,
            active: AtomicBool::new(false),
            fps: AtomicI32::new(0),
            generation: AtomicU64::new(0),
            cancel: Mutex::new(None),
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    pub fn current_fps(&self) -> i32 {
        self.fps.load(Ordering::SeqCst)
    }

    /// Start the pump. Returns false when it is already running or the
    /// device session is not ready.
    pub fn start(self: &Arc<Self>) -> bool {
        if self.session.ensure_ready().is_err() {
            return false;
        }
        if self.active.swap(true, Ordering::SeqCst) {
            return false;
        }
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let (tx, rx) = watch::channel(false);
        *self.cancel.lock().unwrap() = Some(tx);

        let this = self.clone();
        tokio::spawn(async move {
            this.run(rx, generation).await;
        });

        self.registry.broadcast(&HubMessage::PreviewStarted { active: true });
        tracing::info!(
            width = self.settings.width,
            height = self.settings.height,
            "preview streaming started"
        );
        true
    }

    /// Stop the pump. Returns false when it was not running.
    pub fn stop(&self) -> bool {
        if !self.active.swap(false, Ordering::SeqCst) {
            return false;
        }
        self.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(tx) = self.cancel.lock().unwrap().take() {
            let _ = tx.send(true);
        }
        self.fps.store(0, Ordering::SeqCst);
        self.registry.broadcast(&HubMessage::PreviewStopped { active: false });
        tracing::info!("preview streaming stopped");
        true
    }

    async fn run(self: Arc<Self>, mut cancel: watch::Receiver<bool>, generation: u64) {
        let settings = self.settings;
        let frame_len = settings.width as usize * settings.height as usize;
        let mut raw = vec![0u8; frame_len * 2];
        let mut window_start = Instant::now();
        let mut window_frames = 0i32;

        while !*cancel.borrow() {
            if self.session.ensure_ready().is_err() {
                break;
            }
            let remote = self.registry.has_remote_clients();

            let (quality, finger_present) = {
                let _lease = self.session.acquire().await;
                let driver = self.session.driver();
                if driver.read_frame(settings.channel, &mut raw) != DRIVER_OK {
                    drop(_lease);
                    if Self::pace(&mut cancel, RETRY_BACKOFF).await {
                        break;
                    }
                    continue;
                }
                let quality =
                    driver.finger_quality(&raw[..frame_len], settings.width, settings.height);
                let present = driver.is_finger(&raw[..frame_len], settings.width, settings.height) > 0;
                (quality, present)
            };

            window_frames += 1;
            if window_start.elapsed() >= Duration::from_secs(1) {
                self.fps.store(window_frames, Ordering::SeqCst);
                window_start = Instant::now();
                window_frames = 0;
            }

            if quality >= EMIT_QUALITY_FLOOR {
                let mut pixels = raw[..frame_len].to_vec();
                bmp::flip_vertical(&mut pixels, settings.width, settings.height);
                let (pixels, width, height) = if remote {
                    let (p, w, h) = downsample_half(&pixels, settings.width, settings.height);
                    (p, w, h)
                } else {
                    (pixels, settings.width, settings.height)
                };
                let frame = PreviewFrame {
                    image_data: BASE64.encode(bmp::encode_bmp(&pixels, width, height)),
                    width,
                    height,
                    quality,
                    finger_present,
                    fps: self.current_fps(),
                };
                self.registry.broadcast(&HubMessage::Preview(frame));
            }

            let delay = if remote {
                REMOTE_FRAME_DELAY
            } else {
                LOCAL_FRAME_DELAY
            };
            if Self::pace(&mut cancel, delay).await {
                break;
            }
        }

        // A superseded task (stop() or a later start() bumped the
        // generation) must not clobber the current pump's state.
        if self.generation.load(Ordering::SeqCst) == generation {
            self.active.store(false, Ordering::SeqCst);
            self.fps.store(0, Ordering::SeqCst);
            self.registry.broadcast(&HubMessage::PreviewStopped { active: false });
        }
    }

    /// Sleep for `delay` unless cancelled first. Returns true on cancel.
    async fn pace(cancel: &mut watch::Receiver<bool>, delay: Duration) -> bool {
        tokio::select! {
            changed = cancel.changed() => changed.is_err() || *cancel.borrow(),
            _ = tokio::time::sleep(delay) => false,
        }
    }
}

/// Drop every other row and column. Widths stay even for BMP alignment.
fn downsample_half(pixels: &[u8], width: i32, height: i32) -> (Vec<u8>, i32, i32) {
    let width = width as usize;
    let height = height as usize;
    let out_w = width / 2;
    let out_h = height / 2;
    let mut out = Vec::with_capacity(out_w * out_h);
    for row in 0..out_h {
        let src = row * 2 * width;
        for col in 0..out_w {
            out.push(pixels[src + col * 2]);
        }
    }
    (out, out_w as i32, out_h as i32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::SimulatedDriver;
    use tokio::time::timeout;

    fn preview_fixture() -> (Arc<SimulatedDriver>, Arc<ConnectionRegistry>, Arc<PreviewStreamingLoop>) {
        let sim = Arc::new(SimulatedDriver::new());
        let session = Arc::new(DeviceSessionManager::new(sim.clone()));
        session.init().unwrap();
        let registry = Arc::new(ConnectionRegistry::new());
        let settings = PreviewSettings {
            channel: 0,
            width: 8,
            height: 8,
        };
        let preview = Arc::new(PreviewStreamingLoop::new(session, registry.clone(), settings));
        (sim, registry, preview)
    }

    #[tokio::test]
    async fn double_start_and_idle_stop_return_false() {
        let (_sim, _registry, preview) = preview_fixture();
        assert!(!preview.stop());

        assert!(preview.start());
        assert!(!preview.start());

        assert!(preview.stop());
        assert!(!preview.stop());
        assert_eq!(preview.current_fps(), 0);
    }

    #[tokio::test]
    async fn restart_keeps_second_pump_active() {
        let (_sim, _registry, preview) = preview_fixture();

        assert!(preview.start());
        assert!(preview.stop());
        assert!(preview.start());

        // Give the first (cancelled) task time to unwind; it must not
        // reset the state owned by the second pump.
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(preview.is_active());
        assert!(preview.stop());
    }

    #[tokio::test]
    async fn start_requires_ready_session() {
        let sim = Arc::new(SimulatedDriver::new());
        let session = Arc::new(DeviceSessionManager::new(sim));
        let registry = Arc::new(ConnectionRegistry::new());
        let preview = Arc::new(PreviewStreamingLoop::new(
            session,
            registry,
            PreviewSettings::default(),
        ));

        assert!(!preview.start());
        assert!(!preview.is_active());
    }

    #[tokio::test]
    async fn frames_are_broadcast_to_clients() {
        let (_sim, registry, preview) = preview_fixture();
        let (_id, mut rx) = registry.register(false);

        assert!(preview.start());
        // First message is the start notification
        let started = timeout(Duration::from_secs(1), rx.recv()).await.unwrap().unwrap();
        assert!(started.contains("preview_started"));

        let frame = timeout(Duration::from_secs(1), rx.recv()).await.unwrap().unwrap();
        assert!(frame.contains("\"type\":\"preview\""));
        assert!(frame.contains("\"quality\":80"));
        preview.stop();
    }

    #[tokio::test]
    async fn remote_clients_get_downsampled_frames() {
        let (_sim, registry, preview) = preview_fixture();
        let (_id, mut rx) = registry.register(true);

        assert!(preview.start());
        let _started = timeout(Duration::from_secs(1), rx.recv()).await.unwrap().unwrap();
        let frame = timeout(Duration::from_secs(1), rx.recv()).await.unwrap().unwrap();
        assert!(frame.contains("\"width\":4"));
        assert!(frame.contains("\"height\":4"));
        preview.stop();
    }

    #[tokio::test]
    async fn last_client_disconnect_stops_preview() {
        let (_sim, registry, preview) = preview_fixture();
        let hook_preview = preview.clone();
        registry.set_last_disconnect_hook(move || {
            hook_preview.stop();
        });

        let (id, _rx) = registry.register(false);
        assert!(preview.start());
        assert!(preview.is_active());

        registry.unregister(id);
        assert!(!preview.is_active());
    }

    #[test]
    fn downsample_takes_every_other_pixel() {
        let pixels: Vec<u8> = (0..16).collect();
        let (out, w, h) = downsample_half(&pixels, 4, 4);
        assert_eq!((w, h), (2, 2));
        assert_eq!(out, vec![0, 2, 8, 10]);
    }
}
