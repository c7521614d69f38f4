//! Template formats, quality gating, and size optimization
//!
//! ## Responsibilities
//!
//! - Parsing the client-requested template format
//! - Quality gate applied before any template is created
//! - Trimming trailing zero padding from fixed-size template buffers

use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Fixed size of the buffer the matcher fills with a template.
pub const TEMPLATE_BUF_LEN: usize = 1024;

/// Smallest number of bytes ever kept from a template buffer. Headers of
/// both ISO and ANSI templates fit within this prefix.
pub const TEMPLATE_HEADER_MIN: usize = 32;

/// Comparison scores at or above this count as a match.
pub const MATCH_THRESHOLD: i32 = 45;

/// Default minimum finger quality required to create a template.
pub const DEFAULT_MIN_FINGER_QUALITY: i32 = 30;

/// Which standard(s) the client wants templates in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateFormat {
    Iso,
    Ansi,
    Both,
}

impl TemplateFormat {
    pub fn wants_iso(&self) -> bool {
        matches!(self, TemplateFormat::Iso | TemplateFormat::Both)
    }

    pub fn wants_ansi(&self) -> bool {
        matches!(self, TemplateFormat::Ansi | TemplateFormat::Both)
    }
}

impl FromStr for TemplateFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "ISO" => Ok(TemplateFormat::Iso),
            "ANSI" => Ok(TemplateFormat::Ansi),
            "BOTH" => Ok(TemplateFormat::Both),
            other => Err(Error::InvalidFormat(format!(
                "unknown template format '{}', expected ISO, ANSI or BOTH",
                other
            ))),
        }
    }
}

impl fmt::Display for TemplateFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemplateFormat::Iso => write!(f, "ISO"),
            TemplateFormat::Ansi => write!(f, "ANSI"),
            TemplateFormat::Both => write!(f, "BOTH"),
        }
    }
}

/// Concrete encoding asked of the matcher for one template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateEncoding {
    Iso,
    Ansi,
}

/// Reject a finger whose quality is below the given floor.
pub fn gate_finger_quality(quality: i32, min_quality: i32) -> Result<(), Error> {
    if quality < min_quality {
        return Err(Error::LowFingerQuality(quality));
    }
    Ok(())
}

/// Number of bytes worth keeping from a fixed-size template buffer.
///
/// Scans backward for the last non-zero byte, keeps at least the header
/// prefix, and rounds the cut point up to a 16-byte boundary so trimmed
/// templates stay alignment-friendly for downstream matchers.
pub fn optimized_len(buf: &[u8]) -> usize {
    let last_non_zero = buf.iter().rposition(|&b| b != 0);
    let keep = match last_non_zero {
        Some(pos) => (pos + 1).max(TEMPLATE_HEADER_MIN),
        None => TEMPLATE_HEADER_MIN,
    };
    let rounded = (keep + 15) & !15;
    rounded.min(buf.len())
}

/// Copy of the meaningful prefix of a template buffer.
pub fn optimize(buf: &[u8]) -> Vec<u8> {
    buf[..optimized_len(buf)].to_vec()
}
