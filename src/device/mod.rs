//! Scanner driver abstraction
//!
//! ## Responsibilities
//!
//! - Trait boundary over the vendor driver surface (scanner, mosaic,
//!   splitter, matcher, device controls)
//! - Simulated driver for development and tests
//!
//! The vendor libraries are blocking C calls; the trait mirrors their
//! integer status conventions so the orchestration layer can translate
//! them into typed errors in exactly one place.

use crate::split::{SlotGeometry, SplitArena};
use crate::template::TemplateEncoding;

pub mod sim;

pub use sim::SimulatedDriver;

/// Status code the driver returns on success.
pub const DRIVER_OK: i32 = 1;

/// Blocking driver surface for the scanner hardware.
///
/// Integer return conventions follow the vendor libraries: `1` is
/// success unless a method documents otherwise. Matcher handles are
/// opaque; `0` means the matcher is unavailable.
pub trait DeviceDriver: Send + Sync {
    // Scanner (frame acquisition)
    fn open_scanner(&self) -> i32;
    fn close_scanner(&self) -> i32;
    fn channel_count(&self) -> i32;
    fn set_capture_window(&self, channel: i32, left: i32, top: i32, width: i32, height: i32) -> i32;
    /// Read one raw frame into `buf`. The buffer must hold `width * height * 2` bytes.
    fn read_frame(&self, channel: i32, buf: &mut [u8]) -> i32;

    // Mosaic (image analysis and rolled-capture stitching)
    fn open_mosaic(&self) -> i32;
    fn close_mosaic(&self) -> i32;
    /// Quality score of a frame. Negative scores mean no usable finger.
    fn finger_quality(&self, buf: &[u8], width: i32, height: i32) -> i32;
    /// Positive when a finger is present on the platen.
    fn is_finger(&self, buf: &[u8], width: i32, height: i32) -> i32;
    fn enhance(&self, buf: &mut [u8], width: i32, height: i32) -> i32;
    fn mosaic_start(&self, out: &mut [u8], width: i32, height: i32) -> i32;
    /// Feed one frame into an in-progress roll. Negative aborts the
    /// roll, `0` completes it, positive asks for more frames.
    fn mosaic_feed(&self, frame: &[u8], out: &mut [u8], width: i32, height: i32) -> i32;
    fn mosaic_stop(&self) -> i32;
    fn mosaic_quality(&self, buf: &[u8], width: i32, height: i32) -> i32;

    // Splitter (multi-finger segmentation)
    fn open_splitter(&self, width: i32, height: i32) -> i32;
    fn close_splitter(&self) -> i32;
    /// Split `image` into per-finger slots inside `arena`. Returns the
    /// number of fingers found, or a negative status on failure.
    fn split_fingers(
        &self,
        image: &[u8],
        width: i32,
        height: i32,
        geometry: SlotGeometry,
        arena: &mut SplitArena,
    ) -> i32;

    // Matcher (template creation and comparison)
    fn open_matcher(&self) -> i32;
    fn close_matcher(&self, handle: i32);
    /// Encode a template from a slot image into `out` (fixed 1024 bytes).
    fn create_template(
        &self,
        handle: i32,
        encoding: TemplateEncoding,
        image: &[u8],
        width: i32,
        height: i32,
        out: &mut [u8],
    ) -> i32;
    /// Similarity score between two templates.
    fn compare_templates(&self, handle: i32, a: &[u8], b: &[u8]) -> i32;

    // Device controls
    fn set_led(&self, image_index: i32) -> i32;
    fn set_lcd(&self, image_index: i32) -> i32;
    fn beep(&self, beep_type: i32) -> i32;
    fn set_dry_wet(&self, level: i32) -> i32;
}
