
// https://www.itu.int/itudoc/itu-t/com16/tiff-fx/docs/tiff6.pdf

use num_derive::FromPrimitive;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endianness {
    /// `0x4949` ("II", little-endian)
    LittleEndian,
    /// `0x4D4D` ("MM", big-endian)
    BigEndian,
}

impl Endianness {
    pub fn byte_order_mark(self) -> [u8; 2] {
        match self {
            Endianness::LittleEndian => *b"II",
            Endianness::BigEndian => *b"MM",
        }
    }

    pub fn put_u16(self, buf: &mut Vec<u8>, value: u16) {
        match self {
            Endianness::LittleEndian => buf.extend_from_slice(&value.to_le_bytes()),
            Endianness::BigEndian => buf.extend_from_slice(&value.to_be_bytes()),
        }
    }

    pub fn put_u32(self, buf: &mut Vec<u8>, value: u32) {
        match self {
            Endianness::LittleEndian => buf.extend_from_slice(&value.to_le_bytes()),
            Endianness::BigEndian => buf.extend_from_slice(&value.to_be_bytes()),
        }
    }

    pub fn put_f32(self, buf: &mut Vec<u8>, value: f32) {
        match self {
            Endianness::LittleEndian => buf.extend_from_slice(&value.to_le_bytes()),
            Endianness::BigEndian => buf.extend_from_slice(&value.to_be_bytes()),
        }
    }

    pub fn read_u16(self, bytes: &[u8], pos: usize) -> Option<u16> {
        let raw: [u8; 2] = bytes.get(pos..pos + 2)?.try_into().ok()?;
        Some(match self {
            Endianness::LittleEndian => u16::from_le_bytes(raw),
            Endianness::BigEndian => u16::from_be_bytes(raw),
        })
    }

    pub fn read_u32(self, bytes: &[u8], pos: usize) -> Option<u32> {
        let raw: [u8; 4] = bytes.get(pos..pos + 4)?.try_into().ok()?;
        Some(match self {
            Endianness::LittleEndian => u32::from_le_bytes(raw),
            Endianness::BigEndian => u32::from_be_bytes(raw),
        })
    }
}

/// TIFF magic number, second header field after the byte order mark.
pub const TIFF_MAGIC: u16 = 42;

#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive)]
#[repr(u16)]
pub enum TiffFieldType {
    BYTE = 1,
    ASCII = 2,
    SHORT = 3,
    LONG = 4,
    RATIONAL = 5,
    SBYTE = 6,
    UNDEFINED = 7,
    SSHORT = 8,
    SLONG = 9,
    SRATIONAL = 10,
    FLOAT = 11,
    DOUBLE = 12,
}

/// Append one 12-byte IFD entry. `value` is the raw 4-byte value/offset
/// field; values shorter than 4 bytes must be left-packed by the caller.
pub fn put_ifd_entry(
    buf: &mut Vec<u8>,
    endianness: Endianness,
    tag: u16,
    field_type: TiffFieldType,
    count: u32,
    value: [u8; 4],
) {
    endianness.put_u16(buf, tag);
    endianness.put_u16(buf, field_type as u16);
    endianness.put_u32(buf, count);
    buf.extend_from_slice(&value);
}

// MakerApple tags that make iOS honor a gain map regardless of the picture's
// APL ("type II" rendering in toGainMapHDR's terms).
const MAKER_APPLE_TAG_VERSION: u16 = 0x0021;
const MAKER_APPLE_TAG_HEADROOM: u16 = 0x0030;
const MAKER_APPLE_VERSION_VALUE: f32 = 1.01;
const MAKER_APPLE_HEADROOM_VALUE: f32 = 0.009986;

/// Build a minimal EXIF APP1 payload carrying only a MakerNote with Apple's
/// gain-map tags: `Exif\0\0`, a big-endian TIFF header, IFD0 with a single
/// MakerNote entry, then the `Apple\0\0\0`-signed inner IFD.
pub fn maker_apple_exif() -> Vec<u8> {
    let endianness = Endianness::BigEndian;

    let maker_note = {
        let mut buf = Vec::new();
        buf.extend_from_slice(b"Apple\0\0\0");
        endianness.put_u16(&mut buf, 2);
        let mut version = Vec::new();
        endianness.put_f32(&mut version, MAKER_APPLE_VERSION_VALUE);
        put_ifd_entry(
            &mut buf,
            endianness,
            MAKER_APPLE_TAG_VERSION,
            TiffFieldType::FLOAT,
            1,
            [version[0], version[1], version[2], version[3]],
        );
        let mut headroom = Vec::new();
        endianness.put_f32(&mut headroom, MAKER_APPLE_HEADROOM_VALUE);
        put_ifd_entry(
            &mut buf,
            endianness,
            MAKER_APPLE_TAG_HEADROOM,
            TiffFieldType::FLOAT,
            1,
            [headroom[0], headroom[1], headroom[2], headroom[3]],
        );
        endianness.put_u32(&mut buf, 0);
        buf
    };

    let mut payload = Vec::new();
    payload.extend_from_slice(b"Exif\0\0");

    // TIFF header: byte order, magic, offset of IFD0.
    payload.extend_from_slice(&endianness.byte_order_mark());
    endianness.put_u16(&mut payload, TIFF_MAGIC);
    endianness.put_u32(&mut payload, 8);

    // IFD0: one MakerNote entry whose value sits right after the IFD,
    // at offset 8 + 2 + 12 + 4 = 26 from the byte order mark.
    endianness.put_u16(&mut payload, 1);
    let mut offset = Vec::new();
    endianness.put_u32(&mut offset, 26);
    put_ifd_entry(
        &mut payload,
        endianness,
        0x927C, // MakerNote
        TiffFieldType::UNDEFINED,
        maker_note.len() as u32,
        [offset[0], offset[1], offset[2], offset[3]],
    );
    endianness.put_u32(&mut payload, 0);

    payload.extend_from_slice(&maker_note);
    payload
}
