// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies
#![forbid(unsafe_code)]

/// Convert YUYV (YUV 4:2:2) to RGBA
///
/// YUYV format: Y0 U Y1 V - each 4-byte group encodes 2 pixels sharing the
/// same chroma. Uses a fixed-point approximation with 8 fractional bits:
///
/// ```text
/// r = y + (359 * v >> 8)
/// g = y - (88 * u + 183 * v >> 8)
/// b = y + (454 * u >> 8)
/// ```
///
/// where `u` and `v` are the chroma bytes minus 128. Results are clamped to
/// `0..=255` and alpha is always 255. Conversion stops at whichever of the
/// two buffers runs out first; the number of pixels written is returned.
pub fn yuyv_to_rgba(src: &[u8], dst: &mut [u8]) -> usize {
    let mut pixels = 0;
    for (yuyv, rgba) in src.chunks_exact(4).zip(dst.chunks_exact_mut(8)) {
        let y0 = yuyv[0] as i32;
        let u = yuyv[1] as i32 - 128;
        let y1 = yuyv[2] as i32;
        let v = yuyv[3] as i32 - 128;

        let dr = (359 * v) >> 8;
        let dg = (88 * u + 183 * v) >> 8;
        let db = (454 * u) >> 8;

        rgba[0] = clamp(y0 + dr);
        rgba[1] = clamp(y0 - dg);
        rgba[2] = clamp(y0 + db);
        rgba[3] = 255;
        rgba[4] = clamp(y1 + dr);
        rgba[5] = clamp(y1 - dg);
        rgba[6] = clamp(y1 + db);
        rgba[7] = 255;
        pixels += 2;
    }
    pixels
}

#[inline]
fn clamp(value: i32) -> u8 {
    value.clamp(0, 255) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn test_known_pair() {
        let src = [100u8, 90, 200, 160];
        let mut dst = [0u8; 8];
        assert_eq!(yuyv_to_rgba(&src, &mut dst), 2);
        assert_eq!(dst, [144, 91, 32, 255, 244, 191, 132, 255]);
    }

    #[test]
    fn test_neutral_chroma_is_grey() {
        let src = [128u8, 128, 16, 128];
        let mut dst = [0u8; 8];
        yuyv_to_rgba(&src, &mut dst);
        assert_eq!(dst, [128, 128, 128, 255, 16, 16, 16, 255]);
    }

    #[test]
    fn test_clamping() {
        // Saturated chroma pushes channels out of range in both directions.
        let src = [255u8, 255, 0, 255];
        let mut dst = [0u8; 8];
        yuyv_to_rgba(&src, &mut dst);
        assert_eq!(&dst[0..4], &[255, 121, 255, 255]);
        assert_eq!(dst[4], 178);
        assert_eq!(dst[5], 0);
        assert_eq!(dst[6], 225);
    }

    #[test]
    fn test_short_destination() {
        let src = [128u8; 16];
        let mut dst = [0u8; 12];
        assert_eq!(yuyv_to_rgba(&src, &mut dst), 2);
        assert_eq!(&dst[8..], &[0, 0, 0, 0]);
    }

    #[test]
    fn test_deterministic() {
        let mut rng = rand::rng();
        let mut src = vec![0u8; 640 * 4];
        rng.fill(&mut src[..]);

        let mut first = vec![0u8; 640 * 8];
        let mut second = vec![0u8; 640 * 8];
        assert_eq!(yuyv_to_rgba(&src, &mut first), 1280);
        assert_eq!(yuyv_to_rgba(&src, &mut second), 1280);
        assert_eq!(first, second);

        for (group, out) in src.chunks_exact(4).zip(first.chunks_exact(8)) {
            let u = group[1] as i32 - 128;
            let v = group[3] as i32 - 128;
            let expected_r0 = (group[0] as i32 + ((359 * v) >> 8)).clamp(0, 255) as u8;
            let expected_b1 = (group[2] as i32 + ((454 * u) >> 8)).clamp(0, 255) as u8;
            assert_eq!(out[0], expected_r0);
            assert_eq!(out[6], expected_b1);
            assert_eq!(out[3], 255);
            assert_eq!(out[7], 255);
        }
    }
}
