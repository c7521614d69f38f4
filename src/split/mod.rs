//! Multi-finger split arena and record decoding
//!
//! ## Responsibilities
//!
//! - Fixed-size slot arena handed to the splitter
//! - Decoding per-finger records out of the arena after a split call
//!
//! The splitter writes up to [`MAX_SPLIT_FINGERS`] cut-out finger images
//! into one contiguous buffer, one fixed-stride slot per finger, plus a
//! metadata entry per slot. Only the first `finger_count` slots are
//! meaningful after a call; the rest hold stale bytes and must never be
//! decoded.

/// Maximum number of fingers a single frame can be split into.
pub const MAX_SPLIT_FINGERS: usize = 10;

/// Width/height of one arena slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotGeometry {
    pub width: i32,
    pub height: i32,
}

impl SlotGeometry {
    pub const fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }

    /// Bytes occupied by one slot (8-bit grayscale).
    pub fn stride(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// Slot geometry used when cutting fingers for template creation.
pub const TEMPLATE_SLOT: SlotGeometry = SlotGeometry::new(256, 360);

/// Default slot geometry for split and guided captures.
pub const DEFAULT_SPLIT_SLOT: SlotGeometry = SlotGeometry::new(300, 400);

/// Per-slot metadata written by the splitter.
#[derive(Debug, Clone, Copy, Default)]
pub struct SlotMeta {
    pub x: i32,
    pub y: i32,
    pub top: i32,
    pub left: i32,
    pub angle: i32,
    pub quality: i32,
}

/// One decoded finger: metadata plus an owned copy of its slot image.
#[derive(Debug, Clone)]
pub struct SplitRecord {
    pub index: usize,
    pub top: i32,
    pub left: i32,
    pub angle: i32,
    pub quality: i32,
    pub image: Vec<u8>,
}

/// Arena the splitter writes into.
pub struct SplitArena {
    geometry: SlotGeometry,
    image: Vec<u8>,
    meta: [SlotMeta; MAX_SPLIT_FINGERS],
}

impl SplitArena {
    pub fn new(geometry: SlotGeometry) -> Self {
        Self {
            geometry,
            image: vec![0u8; geometry.stride() * MAX_SPLIT_FINGERS],
            meta: [SlotMeta::default(); MAX_SPLIT_FINGERS],
        }
    }

    pub fn geometry(&self) -> SlotGeometry {
        self.geometry
    }

    pub fn image_mut(&mut self) -> &mut [u8] {
        &mut self.image
    }

    pub fn meta_mut(&mut self) -> &mut [SlotMeta; MAX_SPLIT_FINGERS] {
        &mut self.meta
    }

    /// Image bytes of one slot.
    pub fn slot(&self, index: usize) -> &[u8] {
        let stride = self.geometry.stride();
        &self.image[index * stride..(index + 1) * stride]
    }

    /// Decode exactly `finger_count` records, copying slot images out of
    /// the arena. Slots beyond `finger_count` are never touched.
    pub fn decode_records(&self, finger_count: usize) -> Vec<SplitRecord> {
        let count = finger_count.min(MAX_SPLIT_FINGERS);
        (0..count)
            .map(|i| {
                let meta = &self.meta[i];
                SplitRecord {
                    index: i,
                    top: meta.top,
                    left: meta.left,
                    angle: meta.angle,
                    quality: meta.quality,
                    image: self.slot(i).to_vec(),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled_arena() -> SplitArena {
        let geometry = SlotGeometry::new(4, 3);
        let mut arena = SplitArena::new(geometry);
        let stride = geometry.stride();
        for slot in 0..MAX_SPLIT_FINGERS {
            let value = (slot + 1) as u8;
            arena.image_mut()[slot * stride..(slot + 1) * stride].fill(value);
            arena.meta_mut()[slot] = SlotMeta {
                x: slot as i32,
                y: slot as i32,
                top: 10 + slot as i32,
                left: 20 + slot as i32,
                angle: slot as i32,
                quality: 50 + slot as i32,
            };
        }
        arena
    }

    #[test]
    fn decode_reads_only_requested_slots() {
        let arena = filled_arena();

        assert!(arena.decode_records(0).is_empty());

        let records = arena.decode_records(3);
        assert_eq!(records.len(), 3);
        for (i, record) in records.iter().enumerate() {
            assert_eq!(record.index, i);
            assert_eq!(record.quality, 50 + i as i32);
            assert_eq!(record.top, 10 + i as i32);
            assert!(record.image.iter().all(|&b| b == (i + 1) as u8));
            assert_eq!(record.image.len(), arena.geometry().stride());
        }
    }

    #[test]
    fn decode_caps_at_max_slots() {
        let arena = filled_arena();
        let records = arena.decode_records(MAX_SPLIT_FINGERS + 5);
        assert_eq!(records.len(), MAX_SPLIT_FINGERS);
        assert!(records[9].image.iter().all(|&b| b == 10));
    }

    #[test]
    fn slot_stride_matches_geometry() {
        assert_eq!(TEMPLATE_SLOT.stride(), 256 * 360);
        assert_eq!(DEFAULT_SPLIT_SLOT.stride(), 300 * 400);
    }
}
