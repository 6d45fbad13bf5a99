
// https://web.archive.org/web/20160405200235/http://cipa.jp/std/documents/e/DC-007_E.pdf

use crate::error::ExportError;
use crate::jpeg;
use crate::tiff::{Endianness, TIFF_MAGIC, TiffFieldType, put_ifd_entry};

const MPF_SIGNATURE: &[u8] = b"MPF\0";
const MPF_VERSION: [u8; 4] = *b"0100";

const TAG_MPF_VERSION: u16 = 0xB000;
const TAG_NUMBER_OF_IMAGES: u16 = 0xB001;
const TAG_MP_ENTRY: u16 = 0xB002;

/// Representative image bit + baseline MP primary image type code.
const PRIMARY_IMAGE_ATTRIBUTE: u32 = 0x2003_0000;

const IFD_ENTRY_COUNT: u16 = 3;

/// Offset of the MP entry block from the byte order mark:
/// IFD offset (8) + entry count (2) + 3 entries (36) + next-IFD (4).
const MP_ENTRY_DATA_OFFSET: u32 = 8 + 2 + IFD_ENTRY_COUNT as u32 * 12 + 4;

/// A two-image MPF APP2 under construction.
///
/// The primary image's total size and the gain map's offset are only known
/// after the surrounding file is laid out, so the builder emits placeholder
/// zeros and [`MpfApp2::patch`] writes the real values. `patch` consumes the
/// builder and is the only way to obtain bytes: an unpatched table can never
/// reach a file.
pub struct MpfApp2 {
    payload: Vec<u8>,
    entry1_size_pos: usize,
    entry2_offset_pos: usize,
}

impl MpfApp2 {
    /// Byte offset of the `MM` byte order mark within the APP2 segment:
    /// marker (2) + length (2) + `MPF\0` (4).
    pub const BOM_OFFSET_IN_SEGMENT: usize = 2 + 2 + 4;

    /// File offset of the secondary-image offset field, relative to the
    /// byte order mark: MP entry block (50) + entry 1 (16) + attribute and
    /// size of entry 2 (8).
    pub const ENTRY2_OFFSET_FROM_BOM: usize = MP_ENTRY_DATA_OFFSET as usize + 16 + 8;

    pub fn new(gainmap_size: u32) -> Self {
        let endianness = Endianness::BigEndian;
        let mut payload = Vec::with_capacity(86);

        payload.extend_from_slice(MPF_SIGNATURE);

        // TIFF header; offsets below are relative to this byte order mark.
        payload.extend_from_slice(&endianness.byte_order_mark());
        endianness.put_u16(&mut payload, TIFF_MAGIC);
        endianness.put_u32(&mut payload, 8);

        // MP index IFD.
        endianness.put_u16(&mut payload, IFD_ENTRY_COUNT);
        put_ifd_entry(
            &mut payload,
            endianness,
            TAG_MPF_VERSION,
            TiffFieldType::UNDEFINED,
            4,
            MPF_VERSION,
        );
        put_ifd_entry(
            &mut payload,
            endianness,
            TAG_NUMBER_OF_IMAGES,
            TiffFieldType::LONG,
            1,
            2u32.to_be_bytes(),
        );
        put_ifd_entry(
            &mut payload,
            endianness,
            TAG_MP_ENTRY,
            TiffFieldType::UNDEFINED,
            32,
            MP_ENTRY_DATA_OFFSET.to_be_bytes(),
        );
        endianness.put_u32(&mut payload, 0);

        // MP entry 1: the primary image. Size is patched after layout;
        // its offset is always zero.
        endianness.put_u32(&mut payload, PRIMARY_IMAGE_ATTRIBUTE);
        let entry1_size_pos = payload.len();
        endianness.put_u32(&mut payload, 0);
        endianness.put_u32(&mut payload, 0);
        endianness.put_u16(&mut payload, 0);
        endianness.put_u16(&mut payload, 0);

        // MP entry 2: the gain map. Offset is patched after layout.
        endianness.put_u32(&mut payload, 0);
        endianness.put_u32(&mut payload, gainmap_size);
        let entry2_offset_pos = payload.len();
        endianness.put_u32(&mut payload, 0);
        endianness.put_u16(&mut payload, 0);
        endianness.put_u16(&mut payload, 0);

        Self { payload, entry1_size_pos, entry2_offset_pos }
    }

    /// Total length of the APP2 segment this builder will emit.
    pub fn segment_len(&self) -> usize {
        2 + 2 + self.payload.len()
    }

    /// Write the deferred values and emit the APP2 segment.
    ///
    /// `primary_total` is the byte length of the whole primary image section
    /// (from the file's SOI up to the byte before the gain map JPEG);
    /// `bo_pos` is the file offset of the byte order mark inside this
    /// segment. The secondary image then sits `primary_total - bo_pos`
    /// bytes past the mark.
    pub fn patch(mut self, primary_total: u32, bo_pos: u32) -> Result<Vec<u8>, ExportError> {
        let secondary_offset = primary_total.checked_sub(bo_pos).ok_or_else(|| {
            ExportError::assertion(format!(
                "byte order mark at {bo_pos} lies past the primary image end {primary_total}"
            ))
        })?;

        self.payload[self.entry1_size_pos..self.entry1_size_pos + 4]
            .copy_from_slice(&primary_total.to_be_bytes());
        self.payload[self.entry2_offset_pos..self.entry2_offset_pos + 4]
            .copy_from_slice(&secondary_offset.to_be_bytes());

        jpeg::app2_segment(&self.payload)
    }
}
