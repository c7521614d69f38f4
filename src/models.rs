//! Shared models and wire types for the BIO600 scan server
//!
//! All client-facing DTOs serialize with camelCase field names to match
//! the device's existing integration clients.

use serde::{Deserialize, Serialize};

/// Standard API response wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            ok: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            ok: false,
            data: None,
            error: Some(msg.into()),
        }
    }
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_sec: u64,
    pub device_connected: bool,
    pub matcher_available: bool,
}

// ========================================
// Request DTOs
// ========================================

fn default_channel() -> i32 {
    0
}
fn default_capture_width() -> i32 {
    1600
}
fn default_capture_height() -> i32 {
    1500
}
fn default_split_width() -> i32 {
    300
}
fn default_split_height() -> i32 {
    400
}
fn default_roll_width() -> i32 {
    800
}
fn default_roll_height() -> i32 {
    750
}
fn default_min_quality() -> i32 {
    30
}
fn default_format() -> String {
    "ISO".to_string()
}

/// Flat-capture request (single frame from one channel)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CaptureRequest {
    pub channel: i32,
    pub width: i32,
    pub height: i32,
}

impl Default for CaptureRequest {
    fn default() -> Self {
        Self {
            channel: default_channel(),
            width: default_capture_width(),
            height: default_capture_height(),
        }
    }
}

/// Multi-finger split request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SplitRequest {
    pub channel: i32,
    pub width: i32,
    pub height: i32,
    pub split_width: i32,
    pub split_height: i32,
}

impl Default for SplitRequest {
    fn default() -> Self {
        Self {
            channel: default_channel(),
            width: default_capture_width(),
            height: default_capture_height(),
            split_width: default_split_width(),
            split_height: default_split_height(),
        }
    }
}

/// Template capture request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TemplateRequest {
    pub channel: i32,
    pub format: String,
    pub min_quality: i32,
}

impl Default for TemplateRequest {
    fn default() -> Self {
        Self {
            channel: default_channel(),
            format: default_format(),
            min_quality: default_min_quality(),
        }
    }
}

/// Guided capture request for a specific finger position group
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FingerTypeRequest {
    pub channel: i32,
    /// 1 = right four, 2 = left four, 3 = two thumbs
    pub finger_type: i32,
}

impl Default for FingerTypeRequest {
    fn default() -> Self {
        Self {
            channel: default_channel(),
            finger_type: 1,
        }
    }
}

/// Settings bundle applied in one call
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeviceSettingsRequest {
    pub dry_wet_level: i32,
    pub led_index: Option<i32>,
    pub lcd_index: Option<i32>,
    pub beep_type: Option<i32>,
}

impl Default for DeviceSettingsRequest {
    fn default() -> Self {
        Self {
            dry_wet_level: 4,
            led_index: None,
            lcd_index: None,
            beep_type: None,
        }
    }
}

/// Rolled-capture request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RollRequest {
    pub channel: i32,
    pub width: i32,
    pub height: i32,
}

impl Default for RollRequest {
    fn default() -> Self {
        Self {
            channel: default_channel(),
            width: default_roll_width(),
            height: default_roll_height(),
        }
    }
}

/// Template comparison request (both templates base64)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompareRequest {
    pub template1: String,
    pub template2: String,
}

/// Store a template under the id given in the route
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreTemplateRequest {
    pub template: String,
}

/// Buzzer request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BeepRequest {
    pub beep_type: i32,
}

impl Default for BeepRequest {
    fn default() -> Self {
        Self { beep_type: 1 }
    }
}

/// LED indicator request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LedRequest {
    pub image_index: i32,
}

impl Default for LedRequest {
    fn default() -> Self {
        Self { image_index: 0 }
    }
}

/// LCD image request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LcdRequest {
    pub image_index: i32,
}

impl Default for LcdRequest {
    fn default() -> Self {
        Self { image_index: 0 }
    }
}

/// Dry/wet sensitivity request (0-7)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DryWetRequest {
    pub level: i32,
}

impl Default for DryWetRequest {
    fn default() -> Self {
        Self { level: 4 }
    }
}

// ========================================
// Result DTOs
// ========================================

/// Flat-capture result
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureResult {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_data: Option<String>,
    pub quality: i32,
    pub width: i32,
    pub height: i32,
}

impl CaptureResult {
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            image_data: None,
            quality: 0,
            width: 0,
            height: 0,
        }
    }
}

/// A single finger cut out of a multi-finger frame
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SplitFinger {
    pub index: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finger_name: Option<String>,
    pub quality: i32,
    pub angle: i32,
    pub top: i32,
    pub left: i32,
    pub image_data: String,
    pub width: i32,
    pub height: i32,
}

/// Multi-finger split result
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SplitResult {
    pub success: bool,
    pub message: String,
    pub finger_count: i32,
    pub fingers: Vec<SplitFinger>,
}

impl SplitResult {
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            finger_count: 0,
            fingers: Vec::new(),
        }
    }
}

/// Template capture result
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateResult {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iso_template: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ansi_template: Option<String>,
    pub quality: i32,
    pub format: String,
    /// Bytes kept after trailing-zero trimming.
    pub optimized_size: i32,
}

impl TemplateResult {
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            iso_template: None,
            ansi_template: None,
            quality: 0,
            format: String::new(),
            optimized_size: 0,
        }
    }
}

/// A template captured for one finger within a multi-finger operation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FingerTemplate {
    pub index: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finger_name: Option<String>,
    pub quality: i32,
    pub template: String,
}

/// Result of capturing templates for every finger in a frame
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultiTemplateResult {
    pub success: bool,
    pub message: String,
    pub finger_count: i32,
    pub templates: Vec<FingerTemplate>,
}

impl MultiTemplateResult {
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            finger_count: 0,
            templates: Vec::new(),
        }
    }
}

/// Template comparison result
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompareResult {
    pub success: bool,
    pub message: String,
    pub score: i32,
    pub is_match: bool,
}

impl CompareResult {
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            score: 0,
            is_match: false,
        }
    }
}

/// Guided finger-type capture result
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FingerTypeResult {
    pub success: bool,
    pub message: String,
    pub finger_type: i32,
    pub finger_count: i32,
    pub fingers: Vec<SplitFinger>,
}

impl FingerTypeResult {
    pub fn failure(finger_type: i32, message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            finger_type,
            finger_count: 0,
            fingers: Vec::new(),
        }
    }
}

/// Device status snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceStatus {
    pub connected: bool,
    pub device_info: String,
    pub matcher_available: bool,
    pub channel_count: i32,
    pub preview_active: bool,
    pub preview_fps: i32,
    pub connected_clients: u64,
}

/// One frame of the live preview stream
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewFrame {
    pub image_data: String,
    pub width: i32,
    pub height: i32,
    pub quality: i32,
    pub finger_present: bool,
    pub fps: i32,
}

/// Simple acknowledgement for device control commands
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlResult {
    pub success: bool,
    pub message: String,
}

impl ControlResult {
    pub fn ok() -> Self {
        Self {
            success: true,
            message: "OK".to_string(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}
