//! 8-bit grayscale BMP encoding
//!
//! The scanner produces raw 8bpp luminance frames. Clients expect them
//! wrapped in the classic 1078-byte BMP header (54-byte file/info header
//! plus a 256-entry grayscale palette). File-size fields are left zero,
//! matching what the vendor tooling emits; every known client ignores
//! them.

/// Total header length: 14 + 40 + 256 * 4.
pub const BMP_HEADER_LEN: usize = 1078;

fn write_u32_le(buf: &mut [u8], offset: usize, value: u32) {
    buf[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

fn write_u16_le(buf: &mut [u8], offset: usize, value: u16) {
    buf[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
}

/// Build the 1078-byte header for a `width` x `height` grayscale image.
pub fn bmp_header(width: i32, height: i32) -> [u8; BMP_HEADER_LEN] {
    let mut header = [0u8; BMP_HEADER_LEN];
    header[0] = b'B';
    header[1] = b'M';
    write_u32_le(&mut header, 10, BMP_HEADER_LEN as u32);
    write_u32_le(&mut header, 14, 40);
    write_u32_le(&mut header, 18, width as u32);
    write_u32_le(&mut header, 22, height as u32);
    write_u16_le(&mut header, 26, 1);
    write_u16_le(&mut header, 28, 8);
    for i in 0..256 {
        let base = 54 + i * 4;
        header[base] = i as u8;
        header[base + 1] = i as u8;
        header[base + 2] = i as u8;
    }
    header
}

/// Wrap raw grayscale pixels in a BMP container.
///
/// The pixel rows are written as-is; callers flip the frame beforehand
/// so the image displays upright despite BMP's bottom-up row order.
pub fn encode_bmp(pixels: &[u8], width: i32, height: i32) -> Vec<u8> {
    let mut out = Vec::with_capacity(BMP_HEADER_LEN + pixels.len());
    out.extend_from_slice(&bmp_header(width, height));
    out.extend_from_slice(pixels);
    out
}

/// Reverse the row order of a grayscale frame in place.
pub fn flip_vertical(pixels: &mut [u8], width: i32, height: i32) {
    let width = width as usize;
    let height = height as usize;
    for row in 0..height / 2 {
        let (top, rest) = pixels.split_at_mut((height - row - 1) * width);
        let upper = &mut top[row * width..row * width + width];
        let lower = &mut rest[..width];
        upper.swap_with_slice(lower);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_encodes_dimensions_little_endian() {
        let header = bmp_header(1600, 1500);
        assert_eq!(&header[0..2], b"BM");
        assert_eq!(u32::from_le_bytes(header[10..14].try_into().unwrap()), 1078);
        assert_eq!(u32::from_le_bytes(header[14..18].try_into().unwrap()), 40);
        assert_eq!(u32::from_le_bytes(header[18..22].try_into().unwrap()), 1600);
        assert_eq!(u32::from_le_bytes(header[22..26].try_into().unwrap()), 1500);
        assert_eq!(u16::from_le_bytes(header[26..28].try_into().unwrap()), 1);
        assert_eq!(u16::from_le_bytes(header[28..30].try_into().unwrap()), 8);
        // File-size field stays zero
        assert_eq!(&header[2..6], &[0, 0, 0, 0]);
        // Grayscale palette
        assert_eq!(&header[54..58], &[0, 0, 0, 0]);
        assert_eq!(&header[54 + 255 * 4..54 + 255 * 4 + 4], &[255, 255, 255, 0]);
    }

    #[test]
    fn encode_prepends_header_to_pixels() {
        let pixels = vec![7u8; 12];
        let bmp = encode_bmp(&pixels, 4, 3);
        assert_eq!(bmp.len(), BMP_HEADER_LEN + 12);
        assert_eq!(&bmp[BMP_HEADER_LEN..], &pixels[..]);
    }

    #[test]
    fn flip_reverses_row_order() {
        let mut pixels = vec![
            1, 1, 1, //
            2, 2, 2, //
            3, 3, 3, //
            4, 4, 4,
        ];
        flip_vertical(&mut pixels, 3, 4);
        assert_eq!(
            pixels,
            vec![
                4, 4, 4, //
                3, 3, 3, //
                2, 2, 2, //
                1, 1, 1,
            ]
        );
    }
}
