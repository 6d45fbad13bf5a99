
// PNG (ISO/IEC 15948), plus the cICP chunk from the PNG third edition draft.

use miniz_oxide::deflate::compress_to_vec_zlib;

use crate::pixel::Rgb8Image;
use crate::tiff::Endianness;
use crate::transfer;

pub const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// cICP payload for HDR10 stills: BT.2020 primaries, PQ transfer,
/// identity matrix, full range.
pub const CICP_BT2020_PQ: [u8; 4] = [9, 16, 0, 1];

const ICC_PROFILE_NAME: &[u8] = b"ICC Profile\0";

const COLOR_TYPE_RGB: u8 = 2;

/// 16-bit RGB PNG carrying a PQ-encoded frame: IHDR, cICP, optional iCCP,
/// IDAT, IEND. Samples are big-endian, one filter byte (None) per row,
/// whole stream zlib-compressed at level 9.
pub fn encode_pq_png(img: &Rgb8Image, peak_nits: u32, icc: Option<&[u8]>) -> Vec<u8> {
    let samples = transfer::pq_encode_rgb48(img, peak_nits, Endianness::BigEndian);
    let row_len = img.width() * 6;
    let mut raw = Vec::with_capacity(img.height() * (1 + row_len));
    for row in samples.chunks_exact(row_len) {
        raw.push(0);
        raw.extend_from_slice(row);
    }

    let mut out = Vec::new();
    out.extend_from_slice(&PNG_SIGNATURE);
    push_chunk(&mut out, b"IHDR", &ihdr(img.width() as u32, img.height() as u32, 16));
    push_chunk(&mut out, b"cICP", &CICP_BT2020_PQ);
    if let Some(icc) = icc {
        push_chunk(&mut out, b"iCCP", &iccp_payload(icc));
    }
    push_chunk(&mut out, b"IDAT", &compress_to_vec_zlib(&raw, 9));
    push_chunk(&mut out, b"IEND", &[]);
    out
}

/// 8-bit RGB PNG for the plain SDR export path. No cICP; the optional iCCP
/// chunk carries the working space's profile.
pub fn encode_sdr_png(img: &Rgb8Image, icc: Option<&[u8]>) -> Vec<u8> {
    let row_len = img.width() * 3;
    let mut raw = Vec::with_capacity(img.height() * (1 + row_len));
    for row in img.as_bytes().chunks_exact(row_len) {
        raw.push(0);
        raw.extend_from_slice(row);
    }

    let mut out = Vec::new();
    out.extend_from_slice(&PNG_SIGNATURE);
    push_chunk(&mut out, b"IHDR", &ihdr(img.width() as u32, img.height() as u32, 8));
    if let Some(icc) = icc {
        push_chunk(&mut out, b"iCCP", &iccp_payload(icc));
    }
    push_chunk(&mut out, b"IDAT", &compress_to_vec_zlib(&raw, 9));
    push_chunk(&mut out, b"IEND", &[]);
    out
}

fn ihdr(width: u32, height: u32, bit_depth: u8) -> Vec<u8> {
    let mut data = Vec::with_capacity(13);
    data.extend_from_slice(&width.to_be_bytes());
    data.extend_from_slice(&height.to_be_bytes());
    data.push(bit_depth);
    data.push(COLOR_TYPE_RGB);
    data.push(0); // compression
    data.push(0); // filter
    data.push(0); // interlace
    data
}

fn iccp_payload(icc: &[u8]) -> Vec<u8> {
    let mut data = Vec::new();
    data.extend_from_slice(ICC_PROFILE_NAME);
    data.push(0); // compression method: zlib
    data.extend_from_slice(&compress_to_vec_zlib(icc, 7));
    data
}

/// Append one chunk: length, type, data, CRC32 over type and data.
fn push_chunk(out: &mut Vec<u8>, chunk_type: &[u8; 4], data: &[u8]) {
    out.extend_from_slice(&(data.len() as u32).to_be_bytes());
    out.extend_from_slice(chunk_type);
    out.extend_from_slice(data);

    let mut hasher = crc32fast::Hasher::new();
    hasher.update(chunk_type);
    hasher.update(data);
    out.extend_from_slice(&hasher.finalize().to_be_bytes());
}

#[cfg(test)]
pub(crate) fn walk_chunks(png: &[u8]) -> Vec<([u8; 4], Vec<u8>)> {
    assert_eq!(&png[..8], &PNG_SIGNATURE);
    let mut chunks = Vec::new();
    let mut pos = 8;
    while pos < png.len() {
        let length = u32::from_be_bytes(png[pos..pos + 4].try_into().unwrap()) as usize;
        let chunk_type: [u8; 4] = png[pos + 4..pos + 8].try_into().unwrap();
        let data = png[pos + 8..pos + 8 + length].to_vec();

        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&chunk_type);
        hasher.update(&data);
        let crc = u32::from_be_bytes(png[pos + 8 + length..pos + 12 + length].try_into().unwrap());
        assert_eq!(crc, hasher.finalize(), "bad CRC for {:?}", chunk_type);

        chunks.push((chunk_type, data));
        pos += 12 + length;
    }
    chunks
}
