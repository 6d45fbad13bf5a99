
use std::fs;
use std::path::{Path, PathBuf};

use log::info;

use crate::colorspace;
use crate::error::ExportError;
use crate::gainmap;
use crate::models::{ExportFormat, GenerateRequest, GenerateResponse, HdrMode};
use crate::pattern;
use crate::png;
use crate::video;

/// Generate and export a single test pattern per the request. Returns the
/// path written and its size.
pub fn export_single(request: &GenerateRequest) -> Result<GenerateResponse, ExportError> {
    request.validate()?;

    let img = pattern::generate_pattern_rgb(
        request.width,
        request.height,
        request.apl_percent,
        request.shape,
    );
    let icc = colorspace::icc_profile(request.color_space)?;
    let stem = build_filename(request);

    fs::create_dir_all(&request.output_directory)?;

    let output_path = match (request.hdr_mode, request.export_format) {
        (_, ExportFormat::Heif) => return Err(ExportError::HeifUnavailable),
        (_, ExportFormat::H264 | ExportFormat::H265) => video::export_video(&img, request)?,

        (HdrMode::None, ExportFormat::Png) => write_file(
            &request.output_directory,
            &stem,
            "png",
            &png::encode_sdr_png(&img, Some(icc)),
        )?,
        (HdrMode::None, ExportFormat::Jpeg) => write_file(
            &request.output_directory,
            &stem,
            "jpg",
            &gainmap::encode_rgb_jpeg(&img, 98, Some(icc))?,
        )?,

        (HdrMode::AppleGainmap, ExportFormat::Png | ExportFormat::Jpeg) => write_file(
            &request.output_directory,
            &stem,
            "jpg",
            &gainmap::apple_gainmap_jpeg(&img, request.hdr_peak_nits, Some(icc))?,
        )?,
        (HdrMode::UltraHdr, ExportFormat::Png | ExportFormat::Jpeg) => write_file(
            &request.output_directory,
            &stem,
            "jpg",
            &gainmap::ultra_hdr_jpeg(&img, request.hdr_peak_nits, Some(icc))?,
        )?,

        (HdrMode::Hdr10Pq, ExportFormat::Png) => write_file(
            &request.output_directory,
            &stem,
            "png",
            &png::encode_pq_png(&img, request.hdr_peak_nits, Some(icc)),
        )?,
        (HdrMode::Hdr10Pq, ExportFormat::Jpeg) => {
            return Err(ExportError::UnsupportedExport(
                "hdr10-pq output requires the PNG or video formats".to_owned(),
            ));
        }
    };

    let file_size = fs::metadata(&output_path)?.len();
    info!(
        "exported APL {}% to {} ({} bytes)",
        request.apl_percent,
        output_path.display(),
        file_size
    );
    Ok(GenerateResponse { output_path, file_size })
}

/// Output filename stem, e.g.
/// `APL_050pct_1920x1080_rectangle_rec709_ultra-hdr_1000nits`.
pub(crate) fn build_filename(request: &GenerateRequest) -> String {
    let mut parts = vec![
        format!("APL_{:03}pct", request.apl_percent),
        format!("{}x{}", request.width, request.height),
        request.shape.to_string(),
        request.color_space.to_string(),
    ];
    if request.hdr_mode != HdrMode::None {
        parts.push(request.hdr_mode.to_string());
        parts.push(format!("{}nits", request.hdr_peak_nits));
    }
    parts.join("_")
}

fn write_file(
    directory: &Path,
    stem: &str,
    extension: &str,
    bytes: &[u8],
) -> Result<PathBuf, ExportError> {
    let path = directory.join(format!("{stem}.{extension}"));
    fs::write(&path, bytes)?;
    Ok(path)
}
