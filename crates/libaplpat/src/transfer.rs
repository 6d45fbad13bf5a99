
use crate::pixel::Rgb8Image;
use crate::tiff::Endianness;

/// PQ reference luminance in nits; a PQ signal of 1.0 maps to this.
pub const PQ_REFERENCE_NITS: f64 = 10_000.0;

/// sRGB EOTF: electrical signal [0, 1] to linear light [0, 1].
pub fn srgb_eotf(x: f64) -> f64 {
    if x <= 0.04045 {
        x / 12.92
    } else {
        ((x + 0.055) / 1.055).powf(2.4)
    }
}

/// SMPTE ST 2084 PQ OETF: linear light [0, 1] (1 = 10 000 nits) to PQ
/// signal [0, 1]. Also in Rec. ITU-R BT.2100.
pub fn pq_oetf(l: f64) -> f64 {
    const M1: f64 = 2610.0 / 16384.0;
    const M2: f64 = 2523.0 / 32.0;
    const C1: f64 = 3424.0 / 4096.0;
    const C2: f64 = 2413.0 / 128.0;
    const C3: f64 = 2392.0 / 128.0;

    let lm1 = l.clamp(0.0, 1.0).powf(M1);
    ((C1 + C2 * lm1) / (1.0 + C3 * lm1)).powf(M2)
}

/// One channel of the still/video HDR pipeline:
/// sRGB code value -> linear light -> absolute luminance at `peak_nits`
/// -> PQ signal -> 16-bit code value.
pub fn pq_encode_u16(srgb: u8, peak_nits: u32) -> u16 {
    let linear = srgb_eotf(srgb as f64 / 255.0);
    let l = (linear * (peak_nits as f64 / PQ_REFERENCE_NITS)).clamp(0.0, 1.0);
    (pq_oetf(l) * 65535.0).round().clamp(0.0, 65535.0) as u16
}

/// PQ-encode a whole frame as interleaved RGB48 samples. Big-endian for the
/// PNG emitter, little-endian (`rgb48le`) for the raw video pipe. Channels
/// are handled independently; there is no cross-channel matrixing.
pub fn pq_encode_rgb48(img: &Rgb8Image, peak_nits: u32, endianness: Endianness) -> Vec<u8> {
    let lut: [u16; 256] = std::array::from_fn(|i| pq_encode_u16(i as u8, peak_nits));

    let mut out = Vec::with_capacity(img.as_bytes().len() * 2);
    for &sample in img.as_bytes() {
        endianness.put_u16(&mut out, lut[sample as usize]);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pq_oetf_bounds() {
        // PQ(0) is not exactly zero but quantizes to zero.
        assert!(pq_oetf(0.0) < 1e-6);
        assert_eq!(pq_oetf(1.0), 1.0);
        assert_eq!(pq_encode_u16(0, 1000), 0);
    }

    #[test]
    fn srgb_eotf_bounds() {
        assert_eq!(srgb_eotf(0.0), 0.0);
        assert!((srgb_eotf(1.0) - 1.0).abs() < 1e-12);
        // Linear segment below the knee.
        assert!((srgb_eotf(0.04045) - 0.04045 / 12.92).abs() < 1e-12);
    }

    #[test]
    fn white_at_1000_nits() {
        // PQ(1000 / 10000) * 65535, rounded.
        assert_eq!(pq_encode_u16(255, 1000), 49271);
    }

    #[test]
    fn encode_rgb48_layout() {
        let mut img = Rgb8Image::with_extent(2, 1);
        img.set_at(0, 0, [255, 255, 255]);

        let be = pq_encode_rgb48(&img, 1000, Endianness::BigEndian);
        assert_eq!(be.len(), 2 * 3 * 2);
        assert_eq!(u16::from_be_bytes([be[0], be[1]]), 49271);
        assert_eq!(u16::from_be_bytes([be[6], be[7]]), 0);

        let le = pq_encode_rgb48(&img, 1000, Endianness::LittleEndian);
        assert_eq!(u16::from_le_bytes([le[0], le[1]]), 49271);
    }

    #[test]
    fn peak_scales_monotonically() {
        let low = pq_encode_u16(255, 200);
        let mid = pq_encode_u16(255, 1000);
        let high = pq_encode_u16(255, 10_000);
        assert!(low < mid && mid < high);
        assert_eq!(high, 65535);
    }
}
