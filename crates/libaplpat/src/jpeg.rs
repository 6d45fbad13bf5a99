
use crate::error::ExportError;

/// Start-of-image marker every JPEG begins with.
pub const SOI: [u8; 2] = [0xFF, 0xD8];

/// Prefix of an XMP APP1 payload.
pub const XMP_HEADER: &[u8] = b"http://ns.adobe.com/xap/1.0/\0";

const EXIF_HEADER: &[u8] = b"Exif\0\0";

const MARKER_APP1: u8 = 0xE1;
const MARKER_APP2: u8 = 0xE2;
const MARKER_SOS: u8 = 0xDA;
const MARKER_EOI: u8 = 0xD9;

/// Wrap a payload in an APP1 segment: marker, big-endian length (which
/// counts the length bytes themselves), payload.
pub fn app1_segment(payload: &[u8]) -> Result<Vec<u8>, ExportError> {
    segment(MARKER_APP1, payload)
}

pub fn app2_segment(payload: &[u8]) -> Result<Vec<u8>, ExportError> {
    segment(MARKER_APP2, payload)
}

fn segment(marker: u8, payload: &[u8]) -> Result<Vec<u8>, ExportError> {
    let length = payload.len() + 2;
    if length > u16::MAX as usize {
        return Err(ExportError::assertion(format!(
            "APP segment payload of {} bytes exceeds the 16-bit length field",
            payload.len()
        )));
    }
    let mut out = Vec::with_capacity(2 + length);
    out.extend_from_slice(&[0xFF, marker]);
    out.extend_from_slice(&(length as u16).to_be_bytes());
    out.extend_from_slice(payload);
    Ok(out)
}

/// Insert an APP1 segment with the given payload directly after SOI.
pub fn inject_app1_after_soi(jpeg: &[u8], payload: &[u8]) -> Result<Vec<u8>, ExportError> {
    inject_after_soi(jpeg, app1_segment(payload)?)
}

/// Insert an APP2 segment with the given payload directly after SOI.
pub fn inject_app2_after_soi(jpeg: &[u8], payload: &[u8]) -> Result<Vec<u8>, ExportError> {
    inject_after_soi(jpeg, app2_segment(payload)?)
}

/// Insert an XMP APP1 (standard namespace prefix + packet) after SOI.
pub fn inject_xmp(jpeg: &[u8], xmp_packet: &[u8]) -> Result<Vec<u8>, ExportError> {
    let mut payload = Vec::with_capacity(XMP_HEADER.len() + xmp_packet.len());
    payload.extend_from_slice(XMP_HEADER);
    payload.extend_from_slice(xmp_packet);
    inject_app1_after_soi(jpeg, &payload)
}

fn inject_after_soi(jpeg: &[u8], segment: Vec<u8>) -> Result<Vec<u8>, ExportError> {
    if jpeg.len() < 2 || jpeg[..2] != SOI {
        return Err(ExportError::InvalidSourceJpeg);
    }
    let mut out = Vec::with_capacity(jpeg.len() + segment.len());
    out.extend_from_slice(&SOI);
    out.extend_from_slice(&segment);
    out.extend_from_slice(&jpeg[2..]);
    Ok(out)
}

/// Whether the stream already carries an `Exif\0\0` APP1. Walks the marker
/// stream from just after SOI; stops at SOS or EOI. RSTn markers are
/// zero-length, every other marker carries a big-endian length that counts
/// the two length bytes.
pub fn has_exif_app1(jpeg: &[u8]) -> bool {
    if jpeg.len() < 2 || jpeg[..2] != SOI {
        return false;
    }
    let mut pos = 2;
    while pos + 2 <= jpeg.len() {
        if jpeg[pos] != 0xFF {
            return false;
        }
        let marker = jpeg[pos + 1];
        match marker {
            MARKER_EOI | MARKER_SOS => return false,
            0xD0..=0xD7 => {
                pos += 2;
                continue;
            }
            _ => {}
        }
        let Some(raw) = jpeg.get(pos + 2..pos + 4) else {
            return false;
        };
        let length = u16::from_be_bytes([raw[0], raw[1]]) as usize;
        if marker == MARKER_APP1 {
            let payload = &jpeg[pos + 4..(pos + 2 + length).min(jpeg.len())];
            if payload.starts_with(EXIF_HEADER) {
                return true;
            }
        }
        pos += 2 + length;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_jpeg() -> Vec<u8> {
        // SOI, APP0 JFIF stub, SOS, entropy data, EOI.
        let mut jpeg = Vec::new();
        jpeg.extend_from_slice(&SOI);
        jpeg.extend_from_slice(&[0xFF, 0xE0, 0x00, 0x04, b'J', b'F']);
        jpeg.extend_from_slice(&[0xFF, 0xDA, 0x00, 0x02]);
        jpeg.extend_from_slice(&[0x12, 0x34]);
        jpeg.extend_from_slice(&[0xFF, 0xD9]);
        jpeg
    }

    #[test]
    fn injection_preserves_layout() {
        let jpeg = minimal_jpeg();
        let out = inject_app1_after_soi(&jpeg, b"payload").unwrap();
        assert_eq!(&out[..2], &SOI);
        assert_eq!(out[2], 0xFF);
        assert_eq!(out[3], 0xE1);
        assert_eq!(u16::from_be_bytes([out[4], out[5]]), 7 + 2);
        assert_eq!(&out[6..13], b"payload");
        assert_eq!(&out[13..], &jpeg[2..]);
    }

    #[test]
    fn rejects_blob_without_soi() {
        assert!(matches!(
            inject_app1_after_soi(b"not a jpeg", b"x"),
            Err(ExportError::InvalidSourceJpeg)
        ));
    }

    #[test]
    fn rejects_oversized_payload() {
        let jpeg = minimal_jpeg();
        let payload = vec![0u8; 0x1_0000];
        assert!(matches!(
            inject_app1_after_soi(&jpeg, &payload),
            Err(ExportError::AssertionViolation(_))
        ));
    }

    #[test]
    fn xmp_injection_adds_namespace_prefix() {
        let out = inject_xmp(&minimal_jpeg(), b"<packet/>").unwrap();
        let needle = b"http://ns.adobe.com/xap/1.0/\0<packet/>";
        assert!(out.windows(needle.len()).any(|w| w == needle));
    }

    #[test]
    fn detects_existing_exif_app1() {
        let mut jpeg = Vec::new();
        jpeg.extend_from_slice(&SOI);
        let payload = b"Exif\0\0MM";
        jpeg.extend_from_slice(&[0xFF, 0xE1]);
        jpeg.extend_from_slice(&((payload.len() + 2) as u16).to_be_bytes());
        jpeg.extend_from_slice(payload);
        jpeg.extend_from_slice(&[0xFF, 0xDA, 0x00, 0x02]);
        assert!(has_exif_app1(&jpeg));
    }

    #[test]
    fn xmp_app1_is_not_mistaken_for_exif() {
        let out = inject_xmp(&minimal_jpeg(), b"<packet/>").unwrap();
        assert!(!has_exif_app1(&out));
    }

    #[test]
    fn walk_skips_restart_markers() {
        let mut jpeg = Vec::new();
        jpeg.extend_from_slice(&SOI);
        jpeg.extend_from_slice(&[0xFF, 0xD0]);
        jpeg.extend_from_slice(&[0xFF, 0xD3]);
        let payload = b"Exif\0\0II";
        jpeg.extend_from_slice(&[0xFF, 0xE1]);
        jpeg.extend_from_slice(&((payload.len() + 2) as u16).to_be_bytes());
        jpeg.extend_from_slice(payload);
        assert!(has_exif_app1(&jpeg));
    }
}
