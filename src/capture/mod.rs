//! CaptureOrchestrator - Acquisition workflows
//!
//! ## Responsibilities
//!
//! - Flat, split, template, guided and rolled capture flows
//! - Template comparison and device control commands
//! - Holding the device lease for exactly the span each flow needs
//!
//! Single-frame flows take the lease once. The guided flow re-acquires
//! it per polling attempt so the preview loop can interleave frames; the
//! rolled flow holds it for the whole roll because the mosaic engine is
//! stateful across frames.

pub mod bmp;

use std::sync::Arc;
use std::time::{Duration, Instant};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

use crate::device::DRIVER_OK;
use crate::error::{Error, Result};
use crate::models::{
    CaptureRequest, CaptureResult, CompareRequest, CompareResult, ControlResult,
    DeviceSettingsRequest, FingerTemplate, FingerTypeRequest, FingerTypeResult,
    MultiTemplateResult, RollRequest, SplitFinger, SplitRequest, SplitResult, TemplateRequest,
    TemplateResult,
};
use crate::session::{DeviceSessionManager, PLATEN_HEIGHT, PLATEN_WIDTH};
use crate::split::{SlotGeometry, SplitArena, SplitRecord, DEFAULT_SPLIT_SLOT, TEMPLATE_SLOT};
use crate::template::{
    self, TemplateEncoding, TemplateFormat, MATCH_THRESHOLD, TEMPLATE_BUF_LEN,
};

const POLL_INTERVAL: Duration = Duration::from_millis(25);
const DEFAULT_GUIDED_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_ROLL_TIMEOUT: Duration = Duration::from_secs(10);

const RIGHT_FOUR_NAMES: [&str; 4] = ["right_index", "right_middle", "right_ring", "right_little"];
const LEFT_FOUR_NAMES: [&str; 4] = ["left_little", "left_ring", "left_middle", "left_index"];
const THUMB_NAMES: [&str; 2] = ["left_thumb", "right_thumb"];

/// Which hand a four-finger operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandSide {
    Right,
    Left,
}

impl HandSide {
    fn finger_names(&self) -> &'static [&'static str] {
        match self {
            HandSide::Right => &RIGHT_FOUR_NAMES,
            HandSide::Left => &LEFT_FOUR_NAMES,
        }
    }
}

/// Naming scheme applied to split slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitKind {
    FourRight,
    FourLeft,
    TwoThumbs,
}

impl SplitKind {
    fn slot_names(&self) -> &'static [&'static str] {
        match self {
            SplitKind::FourRight => &RIGHT_FOUR_NAMES,
            SplitKind::FourLeft => &LEFT_FOUR_NAMES,
            SplitKind::TwoThumbs => &THUMB_NAMES,
        }
    }
}

/// Runs every acquisition flow against the shared device session.
pub struct CaptureOrchestrator {
    session: Arc<DeviceSessionManager>,
    guided_timeout: Duration,
    roll_timeout: Duration,
}

impl CaptureOrchestrator {
    pub fn new(session: Arc<DeviceSessionManager>) -> Self {
        Self {
            session,
            guided_timeout: DEFAULT_GUIDED_TIMEOUT,
            roll_timeout: DEFAULT_ROLL_TIMEOUT,
        }
    }

    pub fn with_timeouts(mut self, guided: Duration, roll: Duration) -> Self {
        self.guided_timeout = guided;
        self.roll_timeout = roll;
        self
    }

    pub fn session(&self) -> &Arc<DeviceSessionManager> {
        &self.session
    }

    /// Capture one flat frame and return it as a base64 BMP.
    pub async fn capture_flat(&self, req: &CaptureRequest) -> Result<CaptureResult> {
        self.session.ensure_ready()?;
        let _lease = self.session.acquire().await;

        let mut frame = self.read_frame(req.channel, req.width, req.height, 2)?;
        let quality = self
            .session
            .driver()
            .finger_quality(&frame, req.width, req.height);
        if quality < 0 {
            return Err(Error::PoorQuality(quality));
        }
        bmp::flip_vertical(&mut frame, req.width, req.height);

        Ok(CaptureResult {
            success: true,
            message: "OK".to_string(),
            image_data: Some(encode_base64_bmp(&frame, req.width, req.height)),
            quality,
            width: req.width,
            height: req.height,
        })
    }

    /// Capture a frame and split it into per-finger images, named after
    /// the expected hand position.
    pub async fn capture_split(&self, req: &SplitRequest, kind: SplitKind) -> Result<SplitResult> {
        check_dimensions(req.split_width, req.split_height)?;
        let geometry = SlotGeometry::new(req.split_width, req.split_height);
        let _lease = self.session.acquire().await;
        let records = self.split_frame(req.channel, req.width, req.height, geometry, 1)?;

        Ok(SplitResult {
            success: true,
            message: "OK".to_string(),
            finger_count: records.len() as i32,
            fingers: records
                .iter()
                .map(|r| split_finger_dto(r, geometry, kind.slot_names()))
                .collect(),
        })
    }

    /// Capture a frame and encode the first finger as a standard template.
    pub async fn capture_template(&self, req: &TemplateRequest) -> Result<TemplateResult> {
        let format: TemplateFormat = req.format.parse()?;
        let handle = self.session.matcher_handle()?;
        let _lease = self.session.acquire().await;

        let records = self.split_frame(req.channel, PLATEN_WIDTH, PLATEN_HEIGHT, TEMPLATE_SLOT, 2)?;
        let record = records.first().ok_or(Error::NoFingerDetected)?;
        template::gate_finger_quality(record.quality, req.min_quality)?;

        self.encode_template_result(handle, format, record)
    }

    /// Capture one frame of a four-finger hand position and encode an
    /// individual template for every finger that passes the quality gate.
    pub async fn capture_four_templates(
        &self,
        side: HandSide,
        req: &TemplateRequest,
    ) -> Result<MultiTemplateResult> {
        let format: TemplateFormat = req.format.parse()?;
        let encoding = primary_encoding(format);
        let handle = self.session.matcher_handle()?;
        let _lease = self.session.acquire().await;

        let records = self.split_frame(req.channel, PLATEN_WIDTH, PLATEN_HEIGHT, TEMPLATE_SLOT, 2)?;
        let names = side.finger_names();

        let mut templates = Vec::new();
        let mut best_rejected = i32::MIN;
        for record in records.iter().take(names.len()) {
            if record.quality < req.min_quality {
                best_rejected = best_rejected.max(record.quality);
                tracing::debug!(
                    slot = record.index,
                    quality = record.quality,
                    "finger below template quality floor, skipped"
                );
                continue;
            }
            let (template, _) = self.encode_template(handle, encoding, &record.image, TEMPLATE_SLOT)?;
            templates.push(FingerTemplate {
                index: record.index as i32,
                finger_name: names.get(record.index).map(|n| n.to_string()),
                quality: record.quality,
                template,
            });
        }
        if templates.is_empty() {
            return Err(Error::LowFingerQuality(best_rejected));
        }

        Ok(MultiTemplateResult {
            success: true,
            message: "OK".to_string(),
            finger_count: records.len() as i32,
            templates,
        })
    }

    /// Capture one frame of a four-finger hand position and encode a
    /// single template from the best-quality finger.
    pub async fn capture_full_four(
        &self,
        side: HandSide,
        req: &TemplateRequest,
    ) -> Result<TemplateResult> {
        let format: TemplateFormat = req.format.parse()?;
        let handle = self.session.matcher_handle()?;
        let _lease = self.session.acquire().await;

        let records = self.split_frame(req.channel, PLATEN_WIDTH, PLATEN_HEIGHT, TEMPLATE_SLOT, 2)?;
        let best = records
            .iter()
            .max_by_key(|r| r.quality)
            .ok_or(Error::NoFingerDetected)?;
        template::gate_finger_quality(best.quality, req.min_quality)?;
        tracing::debug!(side = ?side, slot = best.index, quality = best.quality, "best finger selected");

        self.encode_template_result(handle, format, best)
    }

    /// Guided capture: poll until the expected number of fingers for the
    /// requested hand position shows up, or time out.
    pub async fn capture_finger_type(&self, req: &FingerTypeRequest) -> Result<FingerTypeResult> {
        self.session.ensure_ready()?;
        let expected = expected_finger_count(req.finger_type);
        let names = guidance_names(req.finger_type);
        let driver = self.session.driver().clone();

        {
            let _lease = self.session.acquire().await;
            driver.set_led(guidance_led(req.finger_type));
            driver.beep(1);
        }

        let deadline = Instant::now() + self.guided_timeout;
        loop {
            let attempt = {
                let _lease = self.session.acquire().await;
                self.try_guided_attempt(req.channel, expected)
            };
            if let Some(records) = attempt {
                let _lease = self.session.acquire().await;
                driver.set_led(success_led(req.finger_type));
                driver.beep(1);
                return Ok(FingerTypeResult {
                    success: true,
                    message: "OK".to_string(),
                    finger_type: req.finger_type,
                    finger_count: records.len() as i32,
                    fingers: records
                        .iter()
                        .map(|r| split_finger_dto(r, DEFAULT_SPLIT_SLOT, names))
                        .collect(),
                });
            }
            if Instant::now() >= deadline {
                return Err(Error::Timeout(format!(
                    "guided capture for finger type {} did not complete",
                    req.finger_type
                )));
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// Rolled capture: wait for a finger, then feed frames to the mosaic
    /// engine until it reports a complete roll.
    pub async fn capture_roll(&self, req: &RollRequest) -> Result<CaptureResult> {
        self.session.ensure_ready()?;
        check_dimensions(req.width, req.height)?;
        let driver = self.session.driver().clone();
        let _lease = self.session.acquire().await;

        let frame_len = req.width as usize * req.height as usize;
        let mut raw = vec![0u8; frame_len * 2];
        let deadline = Instant::now() + self.roll_timeout;

        // Phase 1: wait for finger placement
        loop {
            if driver.read_frame(req.channel, &mut raw) == DRIVER_OK
                && driver.is_finger(&raw[..frame_len], req.width, req.height) > 0
            {
                break;
            }
            if Instant::now() >= deadline {
                return Err(Error::Timeout("no finger placed for rolled capture".to_string()));
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }

        // Phase 2: stitch frames until the engine reports completion
        let mut rolled = vec![0u8; frame_len];
        if driver.mosaic_start(&mut rolled, req.width, req.height) != DRIVER_OK {
            return Err(Error::AcquisitionFailed("mosaic start failed".to_string()));
        }
        loop {
            if driver.read_frame(req.channel, &mut raw) != DRIVER_OK {
                driver.mosaic_stop();
                return Err(Error::AcquisitionFailed("frame read failed during roll".to_string()));
            }
            let status = driver.mosaic_feed(&raw[..frame_len], &mut rolled, req.width, req.height);
            if status < 0 {
                driver.mosaic_stop();
                return Err(Error::AcquisitionFailed(format!(
                    "roll aborted by mosaic engine (status {})",
                    status
                )));
            }
            if status == 0 {
                driver.mosaic_stop();
                let quality = driver.mosaic_quality(&rolled, req.width, req.height);
                bmp::flip_vertical(&mut rolled, req.width, req.height);
                return Ok(CaptureResult {
                    success: true,
                    message: "OK".to_string(),
                    image_data: Some(encode_base64_bmp(&rolled, req.width, req.height)),
                    quality,
                    width: req.width,
                    height: req.height,
                });
            }
            if Instant::now() >= deadline {
                driver.mosaic_stop();
                return Err(Error::Timeout("rolled capture did not complete".to_string()));
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// Compare two base64 templates with the matcher.
    pub async fn compare(&self, req: &CompareRequest) -> Result<CompareResult> {
        let handle = self.session.matcher_handle()?;
        let a = BASE64
            .decode(&req.template1)
            .map_err(|_| Error::InvalidFormat("template1 is not valid base64".to_string()))?;
        let b = BASE64
            .decode(&req.template2)
            .map_err(|_| Error::InvalidFormat("template2 is not valid base64".to_string()))?;

        let score = self.session.driver().compare_templates(handle, &a, &b);
        Ok(CompareResult {
            success: true,
            message: "OK".to_string(),
            score,
            is_match: score >= MATCH_THRESHOLD,
        })
    }

    /// Apply a device settings bundle in one lease.
    pub async fn set_device_settings(&self, req: &DeviceSettingsRequest) -> Result<ControlResult> {
        if !(0..=7).contains(&req.dry_wet_level) {
            return Err(Error::InvalidFormat(format!(
                "dry/wet level {} out of range 0-7",
                req.dry_wet_level
            )));
        }
        self.session.ensure_ready()?;
        let _lease = self.session.acquire().await;
        let driver = self.session.driver();
        driver.set_dry_wet(req.dry_wet_level);
        if let Some(index) = req.led_index {
            driver.set_led(index);
        }
        if let Some(index) = req.lcd_index {
            driver.set_lcd(index);
        }
        if let Some(beep) = req.beep_type {
            driver.beep(beep);
        }
        Ok(ControlResult::ok())
    }

    pub async fn play_beep(&self, beep_type: i32) -> Result<ControlResult> {
        self.session.ensure_ready()?;
        let _lease = self.session.acquire().await;
        self.session.driver().beep(beep_type);
        Ok(ControlResult::ok())
    }

    pub async fn set_led(&self, image_index: i32) -> Result<ControlResult> {
        self.session.ensure_ready()?;
        let _lease = self.session.acquire().await;
        self.session.driver().set_led(image_index);
        Ok(ControlResult::ok())
    }

    pub async fn set_lcd(&self, image_index: i32) -> Result<ControlResult> {
        self.session.ensure_ready()?;
        let _lease = self.session.acquire().await;
        self.session.driver().set_lcd(image_index);
        Ok(ControlResult::ok())
    }

    pub async fn set_dry_wet(&self, level: i32) -> Result<ControlResult> {
        if !(0..=7).contains(&level) {
            return Err(Error::InvalidFormat(format!(
                "dry/wet level {} out of range 0-7",
                level
            )));
        }
        self.session.ensure_ready()?;
        let _lease = self.session.acquire().await;
        self.session.driver().set_dry_wet(level);
        Ok(ControlResult::ok())
    }

    // ---- internals --------------------------------------------------

    /// Read one raw frame at the given byte depth. Flat and template
    /// pulls use the vendor's 2-byte-deep buffer; split pulls are 1-byte.
    /// Only the first `width * height` bytes are image data.
    fn read_frame(&self, channel: i32, width: i32, height: i32, depth: usize) -> Result<Vec<u8>> {
        check_dimensions(width, height)?;
        let driver = self.session.driver();
        driver.set_capture_window(channel, 0, 0, width, height);
        let len = width as usize * height as usize;
        let mut raw = vec![0u8; len * depth];
        if driver.read_frame(channel, &mut raw) != DRIVER_OK {
            return Err(Error::AcquisitionFailed("frame read failed".to_string()));
        }
        raw.truncate(len);
        Ok(raw)
    }

    /// Shared split pipeline: read, gate, flip, enhance, split, decode.
    /// Caller must hold the device lease.
    fn split_frame(
        &self,
        channel: i32,
        width: i32,
        height: i32,
        geometry: SlotGeometry,
        depth: usize,
    ) -> Result<Vec<SplitRecord>> {
        self.session.ensure_ready()?;
        if !self.session.splitter_available() {
            return Err(Error::Internal("splitter not available".to_string()));
        }
        let driver = self.session.driver();

        let mut frame = self.read_frame(channel, width, height, depth)?;
        let quality = driver.finger_quality(&frame, width, height);
        if quality < 0 {
            return Err(Error::PoorQuality(quality));
        }
        bmp::flip_vertical(&mut frame, width, height);
        driver.enhance(&mut frame, width, height);

        let mut arena = SplitArena::new(geometry);
        let count = driver.split_fingers(&frame, width, height, geometry, &mut arena);
        if count < 0 {
            return Err(Error::AcquisitionFailed(format!("split failed (status {})", count)));
        }
        if count == 0 {
            return Err(Error::NoFingerDetected);
        }
        Ok(arena.decode_records(count as usize))
    }

    /// One guided-capture attempt. Returns records only when the frame
    /// holds exactly the expected number of fingers.
    fn try_guided_attempt(&self, channel: i32, expected: usize) -> Option<Vec<SplitRecord>> {
        match self.split_frame(channel, PLATEN_WIDTH, PLATEN_HEIGHT, DEFAULT_SPLIT_SLOT, 2) {
            Ok(records) if records.len() == expected => Some(records),
            Ok(_) => None,
            Err(Error::PoorQuality(_)) | Err(Error::NoFingerDetected) | Err(Error::AcquisitionFailed(_)) => None,
            Err(e) => {
                tracing::warn!(error = %e, "guided capture attempt failed");
                None
            }
        }
    }

    /// Encode one template; returns the base64 payload and its trimmed size.
    fn encode_template(
        &self,
        handle: i32,
        encoding: TemplateEncoding,
        image: &[u8],
        geometry: SlotGeometry,
    ) -> Result<(String, usize)> {
        let mut buf = [0u8; TEMPLATE_BUF_LEN];
        let ret = self.session.driver().create_template(
            handle,
            encoding,
            image,
            geometry.width,
            geometry.height,
            &mut buf,
        );
        if ret != DRIVER_OK {
            return Err(Error::AcquisitionFailed("template encoding failed".to_string()));
        }
        let trimmed = template::optimize(&buf);
        Ok((BASE64.encode(&trimmed), trimmed.len()))
    }

    fn encode_template_result(
        &self,
        handle: i32,
        format: TemplateFormat,
        record: &SplitRecord,
    ) -> Result<TemplateResult> {
        let mut optimized_size = 0usize;
        let iso = if format.wants_iso() {
            let (payload, size) =
                self.encode_template(handle, TemplateEncoding::Iso, &record.image, TEMPLATE_SLOT)?;
            optimized_size = size;
            Some(payload)
        } else {
            None
        };
        let ansi = if format.wants_ansi() {
            let (payload, size) =
                self.encode_template(handle, TemplateEncoding::Ansi, &record.image, TEMPLATE_SLOT)?;
            optimized_size = optimized_size.max(size);
            Some(payload)
        } else {
            None
        };
        Ok(TemplateResult {
            success: true,
            message: "OK".to_string(),
            iso_template: iso,
            ansi_template: ansi,
            quality: record.quality,
            format: format.to_string(),
            optimized_size: optimized_size as i32,
        })
    }
}

/// Caller-supplied dimensions size frame buffers, so they must be
/// positive before any allocation happens.
fn check_dimensions(width: i32, height: i32) -> Result<()> {
    if width <= 0 || height <= 0 {
        return Err(Error::InvalidFormat(format!(
            "invalid capture dimensions {}x{}",
            width, height
        )));
    }
    Ok(())
}

/// Fingers expected on the platen for each guided position type.
fn expected_finger_count(finger_type: i32) -> usize {
    if finger_type == 3 {
        2
    } else {
        4
    }
}

/// LED pattern prompting for the requested hand position.
fn guidance_led(finger_type: i32) -> i32 {
    finger_type + 1
}

/// LED pattern confirming a successful guided capture.
fn success_led(finger_type: i32) -> i32 {
    match finger_type {
        2 => 17,
        3 => 19,
        _ => 15,
    }
}

fn guidance_names(finger_type: i32) -> &'static [&'static str] {
    match finger_type {
        2 => &LEFT_FOUR_NAMES,
        3 => &THUMB_NAMES,
        _ => &RIGHT_FOUR_NAMES,
    }
}

fn primary_encoding(format: TemplateFormat) -> TemplateEncoding {
    if format.wants_iso() {
        TemplateEncoding::Iso
    } else {
        TemplateEncoding::Ansi
    }
}

fn split_finger_dto(
    record: &SplitRecord,
    geometry: SlotGeometry,
    names: &[&'static str],
) -> SplitFinger {
    SplitFinger {
        index: record.index as i32,
        finger_name: names.get(record.index).map(|n| n.to_string()),
        quality: record.quality,
        angle: record.angle,
        top: record.top,
        left: record.left,
        image_data: encode_base64_bmp(&record.image, geometry.width, geometry.height),
        width: geometry.width,
        height: geometry.height,
    }
}

fn encode_base64_bmp(pixels: &[u8], width: i32, height: i32) -> String {
    BASE64.encode(bmp::encode_bmp(pixels, width, height))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::SimulatedDriver;
    use crate::models::TemplateRequest;

    fn ready_orchestrator() -> (Arc<SimulatedDriver>, CaptureOrchestrator) {
        let sim = Arc::new(SimulatedDriver::new());
        let session = Arc::new(DeviceSessionManager::new(sim.clone()));
        session.init().unwrap();
        (sim, CaptureOrchestrator::new(session))
    }

    #[tokio::test]
    async fn flat_capture_returns_base64_bmp() {
        let (_sim, orch) = ready_orchestrator();
        let req = CaptureRequest {
            channel: 0,
            width: 8,
            height: 8,
        };
        let result = orch.capture_flat(&req).await.unwrap();
        assert!(result.success);
        assert_eq!(result.quality, 80);

        let bytes = BASE64.decode(result.image_data.unwrap()).unwrap();
        assert_eq!(bytes.len(), bmp::BMP_HEADER_LEN + 64);
        assert_eq!(&bytes[0..2], b"BM");
        assert_eq!(u32::from_le_bytes(bytes[18..22].try_into().unwrap()), 8);
    }

    #[tokio::test]
    async fn uninitialized_session_makes_no_driver_calls() {
        let sim = Arc::new(SimulatedDriver::new());
        let session = Arc::new(DeviceSessionManager::new(sim.clone()));
        let orch = CaptureOrchestrator::new(session);

        let err = orch.capture_flat(&CaptureRequest::default()).await.unwrap_err();
        assert!(matches!(err, Error::DeviceNotConnected));
        assert_eq!(sim.read_frame_calls(), 0);
    }

    #[tokio::test]
    async fn non_positive_dimensions_are_rejected() {
        let (sim, orch) = ready_orchestrator();

        let err = orch
            .capture_flat(&CaptureRequest {
                channel: 0,
                width: -1,
                height: 8,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidFormat(_)));

        let err = orch
            .capture_roll(&RollRequest {
                channel: 0,
                width: 8,
                height: 0,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidFormat(_)));

        let err = orch
            .capture_split(
                &SplitRequest {
                    split_width: -300,
                    split_height: 400,
                    ..Default::default()
                },
                SplitKind::FourRight,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidFormat(_)));
        assert_eq!(sim.read_frame_calls(), 0);
    }

    #[tokio::test]
    async fn negative_quality_fails_before_split() {
        let (sim, orch) = ready_orchestrator();
        sim.script_qualities([-5]);

        let err = orch
            .capture_split(&SplitRequest::default(), SplitKind::FourRight)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::PoorQuality(-5)));
        assert_eq!(sim.split_calls(), 0);
    }

    #[tokio::test]
    async fn empty_platen_reports_no_finger() {
        let (sim, orch) = ready_orchestrator();
        sim.script_split_counts([0]);

        let err = orch
            .capture_split(&SplitRequest::default(), SplitKind::FourRight)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NoFingerDetected));
    }

    #[tokio::test]
    async fn split_names_slots_for_the_hand_position() {
        let (sim, orch) = ready_orchestrator();
        sim.script_split_counts([4, 2]);

        let result = orch
            .capture_split(&SplitRequest::default(), SplitKind::FourRight)
            .await
            .unwrap();
        assert_eq!(result.finger_count, 4);
        assert_eq!(result.fingers[0].finger_name.as_deref(), Some("right_index"));
        assert_eq!(result.fingers[3].finger_name.as_deref(), Some("right_little"));
        assert_eq!(result.fingers[0].quality, 75);
        assert_eq!(result.fingers[2].width, 300);

        let thumbs = orch
            .capture_split(&SplitRequest::default(), SplitKind::TwoThumbs)
            .await
            .unwrap();
        assert_eq!(thumbs.finger_count, 2);
        assert_eq!(thumbs.fingers[1].finger_name.as_deref(), Some("right_thumb"));
    }

    #[tokio::test]
    async fn template_quality_gate_rejects_weak_finger() {
        let (sim, orch) = ready_orchestrator();
        sim.set_slot_qualities(vec![20]);

        let err = orch.capture_template(&TemplateRequest::default()).await.unwrap_err();
        assert!(matches!(err, Error::LowFingerQuality(20)));
    }

    #[tokio::test]
    async fn template_both_formats_are_trimmed() {
        let (sim, orch) = ready_orchestrator();
        sim.set_template_fill(480);
        let req = TemplateRequest {
            format: "both".to_string(),
            ..Default::default()
        };

        let result = orch.capture_template(&req).await.unwrap();
        assert_eq!(result.format, "BOTH");
        assert_eq!(result.optimized_size, 480);
        let iso = BASE64.decode(result.iso_template.unwrap()).unwrap();
        let ansi = BASE64.decode(result.ansi_template.unwrap()).unwrap();
        assert_eq!(iso.len(), 480);
        assert_eq!(ansi.len(), 480);
        assert!(iso.iter().all(|&b| b == 0xA5));
        assert!(ansi.iter().all(|&b| b == 0x5A));
    }

    #[tokio::test]
    async fn template_without_matcher_fails() {
        let sim = Arc::new(SimulatedDriver::new());
        sim.set_matcher_available(false);
        let session = Arc::new(DeviceSessionManager::new(sim.clone()));
        session.init().unwrap();
        let orch = CaptureOrchestrator::new(session);

        let err = orch.capture_template(&TemplateRequest::default()).await.unwrap_err();
        assert!(matches!(err, Error::Internal(_)));
    }

    #[tokio::test]
    async fn four_templates_skip_weak_fingers() {
        let (sim, orch) = ready_orchestrator();
        sim.set_slot_qualities(vec![75, 20, 65, 10]);

        let result = orch
            .capture_four_templates(HandSide::Right, &TemplateRequest::default())
            .await
            .unwrap();
        assert_eq!(result.finger_count, 4);
        assert_eq!(result.templates.len(), 2);
        assert_eq!(result.templates[0].finger_name.as_deref(), Some("right_index"));
        assert_eq!(result.templates[1].index, 2);
        assert_eq!(result.templates[1].finger_name.as_deref(), Some("right_ring"));
    }

    #[tokio::test]
    async fn four_templates_all_weak_is_low_quality() {
        let (sim, orch) = ready_orchestrator();
        sim.set_slot_qualities(vec![10, 25, 5, 15]);

        let err = orch
            .capture_four_templates(HandSide::Left, &TemplateRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::LowFingerQuality(25)));
    }

    #[tokio::test]
    async fn full_four_uses_best_quality_finger() {
        let (sim, orch) = ready_orchestrator();
        sim.set_slot_qualities(vec![40, 90, 55, 60]);

        let result = orch
            .capture_full_four(HandSide::Right, &TemplateRequest::default())
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.quality, 90);
        assert!(result.iso_template.is_some());
        assert!(result.ansi_template.is_none());
    }

    #[tokio::test]
    async fn guided_capture_retries_until_expected_count() {
        let (sim, orch) = ready_orchestrator();
        sim.script_split_counts([1, 2, 4]);

        let req = FingerTypeRequest {
            channel: 0,
            finger_type: 1,
        };
        let result = orch.capture_finger_type(&req).await.unwrap();
        assert!(result.success);
        assert_eq!(result.finger_count, 4);
        assert_eq!(result.fingers[1].finger_name.as_deref(), Some("right_middle"));
        assert_eq!(sim.split_calls(), 3);
        assert_eq!(sim.led_history(), vec![2, 15]);
    }

    #[tokio::test]
    async fn guided_capture_times_out() {
        let (sim, orch) = ready_orchestrator();
        let orch = orch.with_timeouts(Duration::from_millis(120), DEFAULT_ROLL_TIMEOUT);
        sim.script_split_counts(std::iter::repeat(1).take(64));

        let err = orch
            .capture_finger_type(&FingerTypeRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Timeout(_)));
    }

    #[tokio::test]
    async fn two_thumbs_guided_expects_two_fingers() {
        let (sim, orch) = ready_orchestrator();
        sim.script_split_counts([4, 2]);

        let req = FingerTypeRequest {
            channel: 0,
            finger_type: 3,
        };
        let result = orch.capture_finger_type(&req).await.unwrap();
        assert_eq!(result.finger_count, 2);
        assert_eq!(result.fingers[0].finger_name.as_deref(), Some("left_thumb"));
        assert_eq!(sim.led_history(), vec![4, 19]);
    }

    #[tokio::test]
    async fn roll_completes_after_scripted_progress() {
        let (sim, orch) = ready_orchestrator();
        sim.script_mosaic_steps([2, 1, 0]);

        let req = RollRequest {
            channel: 0,
            width: 8,
            height: 6,
        };
        let result = orch.capture_roll(&req).await.unwrap();
        assert!(result.success);
        assert_eq!(result.quality, 80);
        assert_eq!(result.width, 8);
    }

    #[tokio::test]
    async fn roll_aborts_on_negative_mosaic_status() {
        let (sim, orch) = ready_orchestrator();
        sim.script_mosaic_steps([-1]);

        let err = orch
            .capture_roll(&RollRequest {
                channel: 0,
                width: 8,
                height: 6,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AcquisitionFailed(_)));
    }

    #[tokio::test]
    async fn compare_applies_match_threshold() {
        let (sim, orch) = ready_orchestrator();
        let t = BASE64.encode([1u8; 64]);

        sim.set_compare_score(45);
        let req = CompareRequest {
            template1: t.clone(),
            template2: t.clone(),
        };
        let result = orch.compare(&req).await.unwrap();
        assert!(result.is_match);
        assert_eq!(result.score, 45);

        sim.set_compare_score(44);
        let result = orch.compare(&req).await.unwrap();
        assert!(!result.is_match);
    }

    #[tokio::test]
    async fn compare_rejects_bad_base64() {
        let (_sim, orch) = ready_orchestrator();
        let err = orch
            .compare(&CompareRequest {
                template1: "%%%".to_string(),
                template2: String::new(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidFormat(_)));
    }

    #[tokio::test]
    async fn dry_wet_level_is_range_checked() {
        let (_sim, orch) = ready_orchestrator();
        let err = orch.set_dry_wet(9).await.unwrap_err();
        assert!(matches!(err, Error::InvalidFormat(_)));
        assert!(orch.set_dry_wet(4).await.is_ok());
    }

    #[tokio::test]
    async fn settings_bundle_applies_optional_controls() {
        let (sim, orch) = ready_orchestrator();
        let req = DeviceSettingsRequest {
            dry_wet_level: 5,
            led_index: Some(7),
            lcd_index: None,
            beep_type: Some(2),
        };
        let result = orch.set_device_settings(&req).await.unwrap();
        assert!(result.success);
        assert_eq!(sim.led_history(), vec![7]);
        assert_eq!(sim.beep_history(), vec![1, 2]);
    }
}
