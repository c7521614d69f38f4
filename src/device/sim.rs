//! Simulated scanner driver
//!
//! Stands in for the vendor libraries on machines without the scanner
//! attached. Every status a method returns can be scripted ahead of
//! time, which is how the orchestration tests drive failure paths.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::split::{SlotGeometry, SplitArena, MAX_SPLIT_FINGERS};
use crate::template::TemplateEncoding;

use super::{DeviceDriver, DRIVER_OK};

const SIM_MATCHER_HANDLE: i32 = 0x5151;

struct SimState {
    scanner_ok: bool,
    mosaic_ok: bool,
    splitter_ok: bool,
    matcher_available: bool,
    channel_count: i32,
    read_results: VecDeque<i32>,
    qualities: VecDeque<i32>,
    finger_presence: VecDeque<i32>,
    split_counts: VecDeque<i32>,
    slot_qualities: Vec<i32>,
    mosaic_steps: VecDeque<i32>,
    compare_score: i32,
    template_fill: usize,
    led_history: Vec<i32>,
    beep_history: Vec<i32>,
}

impl Default for SimState {
    fn default() -> Self {
        Self {
            scanner_ok: true,
            mosaic_ok: true,
            splitter_ok: true,
            matcher_available: true,
            channel_count: 1,
            read_results: VecDeque::new(),
            qualities: VecDeque::new(),
            finger_presence: VecDeque::new(),
            split_counts: VecDeque::new(),
            slot_qualities: vec![75, 70, 65, 60],
            mosaic_steps: VecDeque::new(),
            compare_score: 90,
            template_fill: 480,
            led_history: Vec::new(),
            beep_history: Vec::new(),
        }
    }
}

/// Scriptable in-memory driver.
#[derive(Default)]
pub struct SimulatedDriver {
    state: Mutex<SimState>,
    read_calls: AtomicUsize,
    split_calls: AtomicUsize,
    scanner_opens: AtomicUsize,
    scanner_closes: AtomicUsize,
    mosaic_opens: AtomicUsize,
    mosaic_closes: AtomicUsize,
    splitter_opens: AtomicUsize,
    splitter_closes: AtomicUsize,
    matcher_opens: AtomicUsize,
    matcher_closes: AtomicUsize,
}

impl SimulatedDriver {
    pub fn new() -> Self {
        Self::default()
    }

    // ---- scripting --------------------------------------------------

    pub fn set_scanner_ok(&self, ok: bool) {
        self.state.lock().unwrap().scanner_ok = ok;
    }

    pub fn set_mosaic_ok(&self, ok: bool) {
        self.state.lock().unwrap().mosaic_ok = ok;
    }

    pub fn set_splitter_ok(&self, ok: bool) {
        self.state.lock().unwrap().splitter_ok = ok;
    }

    pub fn set_matcher_available(&self, available: bool) {
        self.state.lock().unwrap().matcher_available = available;
    }

    pub fn set_compare_score(&self, score: i32) {
        self.state.lock().unwrap().compare_score = score;
    }

    pub fn set_template_fill(&self, bytes: usize) {
        self.state.lock().unwrap().template_fill = bytes;
    }

    /// Queue outcomes for the next `read_frame` calls. Once the queue is
    /// drained, reads succeed.
    pub fn script_read_results(&self, results: impl IntoIterator<Item = i32>) {
        self.state.lock().unwrap().read_results.extend(results);
    }

    /// Queue quality scores. Drained queue yields 80.
    pub fn script_qualities(&self, qualities: impl IntoIterator<Item = i32>) {
        self.state.lock().unwrap().qualities.extend(qualities);
    }

    /// Queue finger-presence polls. Drained queue yields 1.
    pub fn script_finger_presence(&self, polls: impl IntoIterator<Item = i32>) {
        self.state.lock().unwrap().finger_presence.extend(polls);
    }

    /// Queue split counts. Drained queue yields 4.
    pub fn script_split_counts(&self, counts: impl IntoIterator<Item = i32>) {
        self.state.lock().unwrap().split_counts.extend(counts);
    }

    /// Per-slot qualities reported for split fingers.
    pub fn set_slot_qualities(&self, qualities: Vec<i32>) {
        self.state.lock().unwrap().slot_qualities = qualities;
    }

    /// Queue mosaic feed statuses. Drained queue yields 0 (complete).
    pub fn script_mosaic_steps(&self, steps: impl IntoIterator<Item = i32>) {
        self.state.lock().unwrap().mosaic_steps.extend(steps);
    }

    // ---- introspection ----------------------------------------------

    pub fn read_frame_calls(&self) -> usize {
        self.read_calls.load(Ordering::SeqCst)
    }

    pub fn split_calls(&self) -> usize {
        self.split_calls.load(Ordering::SeqCst)
    }

    pub fn scanner_open_count(&self) -> usize {
        self.scanner_opens.load(Ordering::SeqCst)
    }

    pub fn scanner_close_count(&self) -> usize {
        self.scanner_closes.load(Ordering::SeqCst)
    }

    pub fn mosaic_open_count(&self) -> usize {
        self.mosaic_opens.load(Ordering::SeqCst)
    }

    pub fn mosaic_close_count(&self) -> usize {
        self.mosaic_closes.load(Ordering::SeqCst)
    }

    pub fn splitter_close_count(&self) -> usize {
        self.splitter_closes.load(Ordering::SeqCst)
    }

    pub fn matcher_open_count(&self) -> usize {
        self.matcher_opens.load(Ordering::SeqCst)
    }

    pub fn matcher_close_count(&self) -> usize {
        self.matcher_closes.load(Ordering::SeqCst)
    }

    pub fn led_history(&self) -> Vec<i32> {
        self.state.lock().unwrap().led_history.clone()
    }

    pub fn beep_history(&self) -> Vec<i32> {
        self.state.lock().unwrap().beep_history.clone()
    }
}

impl DeviceDriver for SimulatedDriver {
    fn open_scanner(&self) -> i32 {
        self.scanner_opens.fetch_add(1, Ordering::SeqCst);
        if self.state.lock().unwrap().scanner_ok {
            DRIVER_OK
        } else {
            0
        }
    }

    fn close_scanner(&self) -> i32 {
        self.scanner_closes.fetch_add(1, Ordering::SeqCst);
        DRIVER_OK
    }

    fn channel_count(&self) -> i32 {
        self.state.lock().unwrap().channel_count
    }

    fn set_capture_window(&self, _channel: i32, _left: i32, _top: i32, _width: i32, _height: i32) -> i32 {
        DRIVER_OK
    }

    fn read_frame(&self, channel: i32, buf: &mut [u8]) -> i32 {
        self.read_calls.fetch_add(1, Ordering::SeqCst);
        let result = self
            .state
            .lock()
            .unwrap()
            .read_results
            .pop_front()
            .unwrap_or(DRIVER_OK);
        if result == DRIVER_OK {
            // Deterministic non-zero ramp so flips and crops are visible.
            for (i, b) in buf.iter_mut().enumerate() {
                *b = ((i + channel as usize) % 251 + 1) as u8;
            }
        }
        result
    }

    fn open_mosaic(&self) -> i32 {
        self.mosaic_opens.fetch_add(1, Ordering::SeqCst);
        if self.state.lock().unwrap().mosaic_ok {
            DRIVER_OK
        } else {
            0
        }
    }

    fn close_mosaic(&self) -> i32 {
        self.mosaic_closes.fetch_add(1, Ordering::SeqCst);
        DRIVER_OK
    }

    fn finger_quality(&self, _buf: &[u8], _width: i32, _height: i32) -> i32 {
        self.state.lock().unwrap().qualities.pop_front().unwrap_or(80)
    }

    fn is_finger(&self, _buf: &[u8], _width: i32, _height: i32) -> i32 {
        self.state
            .lock()
            .unwrap()
            .finger_presence
            .pop_front()
            .unwrap_or(1)
    }

    fn enhance(&self, _buf: &mut [u8], _width: i32, _height: i32) -> i32 {
        DRIVER_OK
    }

    fn mosaic_start(&self, out: &mut [u8], _width: i32, _height: i32) -> i32 {
        out.fill(0);
        DRIVER_OK
    }

    fn mosaic_feed(&self, frame: &[u8], out: &mut [u8], _width: i32, _height: i32) -> i32 {
        let step = self.state.lock().unwrap().mosaic_steps.pop_front().unwrap_or(0);
        if step >= 0 {
            let n = frame.len().min(out.len());
            out[..n].copy_from_slice(&frame[..n]);
        }
        step
    }

    fn mosaic_stop(&self) -> i32 {
        DRIVER_OK
    }

    fn mosaic_quality(&self, _buf: &[u8], _width: i32, _height: i32) -> i32 {
        self.state.lock().unwrap().qualities.pop_front().unwrap_or(80)
    }

    fn open_splitter(&self, _width: i32, _height: i32) -> i32 {
        self.splitter_opens.fetch_add(1, Ordering::SeqCst);
        if self.state.lock().unwrap().splitter_ok {
            DRIVER_OK
        } else {
            0
        }
    }

    fn close_splitter(&self) -> i32 {
        self.splitter_closes.fetch_add(1, Ordering::SeqCst);
        DRIVER_OK
    }

    fn split_fingers(
        &self,
        _image: &[u8],
        _width: i32,
        _height: i32,
        geometry: SlotGeometry,
        arena: &mut SplitArena,
    ) -> i32 {
        self.split_calls.fetch_add(1, Ordering::SeqCst);
        let (count, slot_qualities) = {
            let mut state = self.state.lock().unwrap();
            let count = state.split_counts.pop_front().unwrap_or(4);
            (count, state.slot_qualities.clone())
        };
        if count <= 0 {
            return count;
        }
        let stride = geometry.stride();
        let n = (count as usize).min(MAX_SPLIT_FINGERS);
        for slot in 0..n {
            let fill = (40 + slot) as u8;
            arena.image_mut()[slot * stride..(slot + 1) * stride].fill(fill);
            let meta = &mut arena.meta_mut()[slot];
            meta.top = 100 + slot as i32 * 10;
            meta.left = 50 + slot as i32 * geometry.width;
            meta.angle = 0;
            meta.quality = slot_qualities.get(slot).copied().unwrap_or(60);
        }
        count
    }

    fn open_matcher(&self) -> i32 {
        self.matcher_opens.fetch_add(1, Ordering::SeqCst);
        if self.state.lock().unwrap().matcher_available {
            SIM_MATCHER_HANDLE
        } else {
            0
        }
    }

    fn close_matcher(&self, _handle: i32) {
        self.matcher_closes.fetch_add(1, Ordering::SeqCst);
    }

    fn create_template(
        &self,
        _handle: i32,
        encoding: TemplateEncoding,
        _image: &[u8],
        _width: i32,
        _height: i32,
        out: &mut [u8],
    ) -> i32 {
        let fill = self.state.lock().unwrap().template_fill.min(out.len());
        out.fill(0);
        let marker = match encoding {
            TemplateEncoding::Iso => 0xA5,
            TemplateEncoding::Ansi => 0x5A,
        };
        out[..fill].fill(marker);
        DRIVER_OK
    }

    fn compare_templates(&self, _handle: i32, _a: &[u8], _b: &[u8]) -> i32 {
        self.state.lock().unwrap().compare_score
    }

    fn set_led(&self, image_index: i32) -> i32 {
        self.state.lock().unwrap().led_history.push(image_index);
        DRIVER_OK
    }

    fn set_lcd(&self, _image_index: i32) -> i32 {
        DRIVER_OK
    }

    fn beep(&self, beep_type: i32) -> i32 {
        self.state.lock().unwrap().beep_history.push(beep_type);
        DRIVER_OK
    }

    fn set_dry_wet(&self, _level: i32) -> i32 {
        DRIVER_OK
    }
}
