
// Gain-map JPEG assembly for the two dominant conventions:
// Apple (HDRGainMap XMP + MakerApple EXIF) and Ultra HDR / ISO 21496-1
// (hdrgm XMP + Container:Directory).
// See: https://developer.android.com/media/platform/hdr-image-format

use jpeg_encoder::{ColorType, Encoder};
use log::debug;

use crate::error::ExportError;
use crate::jpeg;
use crate::mpf::MpfApp2;
use crate::pixel::{Luma8Image, Raster, Rgb8Image};
use crate::tiff;
use crate::tiff::Endianness;
use crate::xmp;

/// Reference SDR white level in nits.
pub const SDR_WHITE_NITS: f64 = 203.0;

/// Gain map downscale factor per axis for Ultra HDR output.
pub const GAINMAP_SCALE: usize = 4;

const SDR_JPEG_QUALITY: u8 = 98;
const GAINMAP_JPEG_QUALITY: u8 = 90;

/// Stops of boost above SDR white the gain map can reach:
/// `log2(peak / 203)`.
pub fn headroom(peak_nits: u32) -> f64 {
    (peak_nits as f64 / SDR_WHITE_NITS).log2()
}

/// Build an Apple gain-map JPEG: SOI, MakerApple EXIF APP1, HDRGainMap XMP
/// APP1, MPF APP2, the primary SDR JPEG body, then the full-resolution
/// gain-map JPEG.
pub fn apple_gainmap_jpeg<R: Raster>(
    img: &R,
    peak_nits: u32,
    icc: Option<&[u8]>,
) -> Result<Vec<u8>, ExportError> {
    let sdr = img.to_rgb();
    let gain_map = generate_gain_map(img, 1);

    let sdr_jpeg = encode_rgb_jpeg(&sdr, SDR_JPEG_QUALITY, icc)?;
    let gainmap_jpeg = {
        let encoded = encode_luma_jpeg(&gain_map, GAINMAP_JPEG_QUALITY)?;
        jpeg::inject_xmp(&encoded, &xmp::apple_gainmap_xmp(peak_nits))?
    };

    // When the encoder already wrote its own Exif APP1 we leave it alone and
    // skip the MakerApple tags rather than splice into a foreign IFD; the
    // XMP headroom still flags the file as HDR for most consumers.
    let exif_app1 = if jpeg::has_exif_app1(&sdr_jpeg) {
        debug!("primary JPEG already carries an Exif APP1; skipping MakerApple tags");
        None
    } else {
        Some(jpeg::app1_segment(&tiff::maker_apple_exif())?)
    };

    assemble_mpf_jpeg(
        &sdr_jpeg,
        &gainmap_jpeg,
        &xmp::apple_primary_xmp(peak_nits),
        exif_app1.as_deref(),
    )
}

/// Build an Ultra HDR (ISO 21496-1) JPEG: SOI, Container:Directory XMP APP1,
/// MPF APP2, the primary SDR JPEG body, then the quarter-resolution gain-map
/// JPEG. No EXIF is synthesized for this variant.
pub fn ultra_hdr_jpeg<R: Raster>(
    img: &R,
    peak_nits: u32,
    icc: Option<&[u8]>,
) -> Result<Vec<u8>, ExportError> {
    let sdr = img.to_rgb();
    let gain_map = generate_gain_map(img, GAINMAP_SCALE);

    let sdr_jpeg = encode_rgb_jpeg(&sdr, SDR_JPEG_QUALITY, icc)?;
    let gainmap_jpeg = {
        let encoded = encode_luma_jpeg(&gain_map, GAINMAP_JPEG_QUALITY)?;
        jpeg::inject_xmp(&encoded, &xmp::ultra_hdr_gainmap_xmp(peak_nits))?
    };

    assemble_mpf_jpeg(
        &sdr_jpeg,
        &gainmap_jpeg,
        &xmp::ultra_hdr_primary_xmp(gainmap_jpeg.len()),
        None,
    )
}

/// Derive the gain map from the SDR base. White pixels get the maximum
/// boost, black pixels none; for the bilevel patterns this system renders,
/// the luminance channel *is* the gain map.
fn generate_gain_map<R: Raster>(img: &R, downscale: usize) -> Luma8Image {
    let gain_map = img.to_luma();
    if downscale > 1 {
        gain_map.downscaled(downscale)
    } else {
        gain_map
    }
}

pub(crate) fn encode_rgb_jpeg(
    img: &Rgb8Image,
    quality: u8,
    icc: Option<&[u8]>,
) -> Result<Vec<u8>, ExportError> {
    let mut out = Vec::new();
    let mut encoder = Encoder::new(&mut out, quality);
    if let Some(icc) = icc {
        encoder.add_icc_profile(icc)?;
    }
    encoder.encode(
        img.as_bytes(),
        img.width() as u16,
        img.height() as u16,
        ColorType::Rgb,
    )?;
    Ok(out)
}

fn encode_luma_jpeg(img: &Luma8Image, quality: u8) -> Result<Vec<u8>, ExportError> {
    let mut out = Vec::new();
    let encoder = Encoder::new(&mut out, quality);
    encoder.encode(
        img.as_bytes(),
        img.width() as u16,
        img.height() as u16,
        ColorType::Luma,
    )?;
    Ok(out)
}

/// Stitch primary and gain-map JPEGs through an MPF APP2.
///
/// Layout: SOI, optional EXIF APP1, XMP APP1, MPF APP2, remainder of the
/// primary JPEG, gain-map JPEG. The MP entries are patched once the layout
/// is known, then the secondary offset is read back out of the emitted
/// bytes and must land on the gain map's SOI.
fn assemble_mpf_jpeg(
    sdr_jpeg: &[u8],
    gainmap_jpeg: &[u8],
    primary_xmp: &[u8],
    exif_app1: Option<&[u8]>,
) -> Result<Vec<u8>, ExportError> {
    if sdr_jpeg.len() < 2 || sdr_jpeg[..2] != jpeg::SOI {
        return Err(ExportError::InvalidSourceJpeg);
    }
    if gainmap_jpeg.len() < 2 || gainmap_jpeg[..2] != jpeg::SOI {
        return Err(ExportError::InvalidSourceJpeg);
    }

    let xmp_app1 = {
        let mut payload = Vec::with_capacity(jpeg::XMP_HEADER.len() + primary_xmp.len());
        payload.extend_from_slice(jpeg::XMP_HEADER);
        payload.extend_from_slice(primary_xmp);
        jpeg::app1_segment(&payload)?
    };

    let exif_len = exif_app1.map_or(0, |segment| segment.len());
    let mpf = MpfApp2::new(gainmap_jpeg.len() as u32);

    let primary_total = 2 + exif_len + xmp_app1.len() + mpf.segment_len() + (sdr_jpeg.len() - 2);
    let bo_pos = 2 + exif_len + xmp_app1.len() + MpfApp2::BOM_OFFSET_IN_SEGMENT;
    let mpf_app2 = mpf.patch(primary_total as u32, bo_pos as u32)?;

    let mut out = Vec::with_capacity(primary_total + gainmap_jpeg.len());
    out.extend_from_slice(&jpeg::SOI);
    if let Some(segment) = exif_app1 {
        out.extend_from_slice(segment);
    }
    out.extend_from_slice(&xmp_app1);
    out.extend_from_slice(&mpf_app2);
    out.extend_from_slice(&sdr_jpeg[2..]);
    out.extend_from_slice(gainmap_jpeg);

    // Re-read the patched offset and make sure it seeks to the gain map's
    // SOI; a malformed table must never leave this function.
    let secondary_offset = Endianness::BigEndian
        .read_u32(&out, bo_pos + MpfApp2::ENTRY2_OFFSET_FROM_BOM)
        .ok_or_else(|| ExportError::assertion("MP entry 2 offset out of bounds".to_owned()))?;
    let secondary_start = bo_pos + secondary_offset as usize;
    if out.get(secondary_start..secondary_start + 2) != Some(&jpeg::SOI[..]) {
        return Err(ExportError::assertion(format!(
            "secondary image offset {secondary_offset} does not land on an SOI marker"
        )));
    }

    Ok(out)
}
