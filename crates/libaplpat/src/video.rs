
// Still-frame video export through FFmpeg.
//
// SDR: a temporary PNG looped into 8-bit yuv420p with VUI colour flags.
// HDR10: PQ-encoded RGB48LE raw frames piped on stdin, 10-bit yuv420p10le;
// x265 additionally gets SMPTE ST 2086 mastering metadata and MaxCLL.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

use log::{debug, info};

use crate::error::ExportError;
use crate::export;
use crate::models::{ColorSpaceId, ExportFormat, GenerateRequest, HdrMode};
use crate::pixel::Rgb8Image;
use crate::png;
use crate::tiff::Endianness;
use crate::transfer;

const DURATION_SECONDS: u32 = 5;
const OUTPUT_FPS: u32 = 30;

/// Locate the FFmpeg executable: `PATH` first, then the usual Windows
/// install locations.
pub fn find_ffmpeg() -> Option<PathBuf> {
    let names: &[&str] = if cfg!(windows) { &["ffmpeg.exe"] } else { &["ffmpeg"] };

    if let Some(path_var) = std::env::var_os("PATH") {
        for dir in std::env::split_paths(&path_var) {
            for name in names {
                let candidate = dir.join(name);
                if candidate.is_file() {
                    return Some(candidate);
                }
            }
        }
    }

    for var in ["PROGRAMFILES", "LOCALAPPDATA"] {
        if let Some(base) = std::env::var_os(var) {
            let candidate = PathBuf::from(base).join("ffmpeg").join("bin").join("ffmpeg.exe");
            if candidate.is_file() {
                return Some(candidate);
            }
        }
    }

    None
}

/// Export a 5-second still-frame video of the pattern.
pub(crate) fn export_video(
    img: &Rgb8Image,
    request: &GenerateRequest,
) -> Result<PathBuf, ExportError> {
    let ffmpeg = find_ffmpeg().ok_or(ExportError::EncoderMissing)?;

    let codec = match request.export_format {
        ExportFormat::H265 => "libx265",
        _ => "libx264",
    };
    let stem = format!(
        "{}_{}",
        export::build_filename(request),
        codec.trim_start_matches("lib")
    );
    let output_path = request.output_directory.join(format!("{stem}.mp4"));

    if request.hdr_mode != HdrMode::None {
        export_hdr(img, request, &ffmpeg, codec, &output_path)?;
    } else {
        export_sdr(img, request, &ffmpeg, codec, &output_path)?;
    }

    info!("encoded {} with {}", output_path.display(), codec);
    Ok(output_path)
}

/// FFmpeg VUI colour metadata flags for the request.
fn color_params(request: &GenerateRequest) -> [(&'static str, &'static str); 3] {
    if request.hdr_mode != HdrMode::None {
        return [
            ("-colorspace", "bt2020nc"),
            ("-color_primaries", "bt2020"),
            ("-color_trc", "smpte2084"),
        ];
    }
    match request.color_space {
        ColorSpaceId::Rec2020 => [
            ("-colorspace", "bt2020nc"),
            ("-color_primaries", "bt2020"),
            ("-color_trc", "bt709"),
        ],
        ColorSpaceId::DisplayP3 => [
            ("-colorspace", "bt709"),
            ("-color_primaries", "smpte432"),
            ("-color_trc", "bt709"),
        ],
        ColorSpaceId::Rec709 => [
            ("-colorspace", "bt709"),
            ("-color_primaries", "bt709"),
            ("-color_trc", "bt709"),
        ],
    }
}

// CIE 1931 chromaticities scaled by 50 000, the x265 master-display
// convention (SMPTE ST 2086).
struct MasteringPrimaries {
    red: (u32, u32),
    green: (u32, u32),
    blue: (u32, u32),
    white: (u32, u32),
}

const MASTERING_BT2020: MasteringPrimaries = MasteringPrimaries {
    red: (35400, 14600),
    green: (8500, 39850),
    blue: (6550, 2300),
    white: (15635, 16450),
};

const MASTERING_P3: MasteringPrimaries = MasteringPrimaries {
    red: (34000, 16000),
    green: (13250, 34500),
    blue: (7500, 3000),
    white: (15635, 16450),
};

/// x265 `master-display` string:
/// `G(x,y)B(x,y)R(x,y)WP(x,y)L(maxLum,minLum)` with chromaticity in units
/// of 0.00002 and luminance in units of 0.0001 cd/m².
fn mastering_display_string(color_space: ColorSpaceId, peak_nits: u32) -> String {
    let p = match color_space {
        ColorSpaceId::DisplayP3 => &MASTERING_P3,
        _ => &MASTERING_BT2020,
    };
    let max_lum = peak_nits as u64 * 10_000;
    let min_lum = 50; // 0.005 cd/m²
    format!(
        "G({},{})B({},{})R({},{})WP({},{})L({},{})",
        p.green.0, p.green.1, p.blue.0, p.blue.1, p.red.0, p.red.1, p.white.0, p.white.1,
        max_lum, min_lum
    )
}

fn export_sdr(
    img: &Rgb8Image,
    request: &GenerateRequest,
    ffmpeg: &Path,
    codec: &str,
    output_path: &Path,
) -> Result<(), ExportError> {
    let temp_path = std::env::temp_dir().join(format!("aplpat-{}.png", unique_suffix()));
    std::fs::write(&temp_path, png::encode_sdr_png(img, None))?;

    let mut command = Command::new(ffmpeg);
    command
        .arg("-y")
        .args(["-loop", "1"])
        .arg("-i")
        .arg(&temp_path)
        .args(["-c:v", codec])
        .args(["-t", &DURATION_SECONDS.to_string()])
        .args(["-r", &OUTPUT_FPS.to_string()])
        .args(["-pix_fmt", "yuv420p"]);
    for (flag, value) in color_params(request) {
        command.args([flag, value]);
    }
    let crf = if codec == "libx264" { "18" } else { "20" };
    command.args(["-preset", "medium", "-crf", crf]);
    command.arg(output_path);

    debug!("running {command:?}");
    let output = command.output();
    std::fs::remove_file(&temp_path).ok();

    let output = output.map_err(|e| ExportError::EncoderFailed(e.to_string()))?;
    if !output.status.success() {
        return Err(ExportError::EncoderFailed(stderr_tail(&output.stderr)));
    }
    Ok(())
}

fn export_hdr(
    img: &Rgb8Image,
    request: &GenerateRequest,
    ffmpeg: &Path,
    codec: &str,
    output_path: &Path,
) -> Result<(), ExportError> {
    let peak = request.hdr_peak_nits;
    let frame = transfer::pq_encode_rgb48(img, peak, Endianness::LittleEndian);

    // Feed 1 fps; FFmpeg duplicates each frame to reach the output rate.
    let input_frames = DURATION_SECONDS;

    let mut command = Command::new(ffmpeg);
    command
        .arg("-y")
        .args(["-f", "rawvideo"])
        .args(["-pix_fmt", "rgb48le"])
        .args(["-s", &format!("{}x{}", img.width(), img.height())])
        .args(["-r", "1"])
        .args(["-i", "pipe:0"])
        .args(["-t", &DURATION_SECONDS.to_string()])
        .args(["-r", &OUTPUT_FPS.to_string()])
        .args(["-c:v", codec])
        .args(["-pix_fmt", "yuv420p10le"]);
    for (flag, value) in color_params(request) {
        command.args([flag, value]);
    }

    if codec == "libx265" {
        // x265 ignores the container-level colour flags for VUI/SEI; the
        // HDR10 metadata has to go through x265-params.
        let max_fall = ((request.apl_percent as u64 * peak as u64) / 100).max(1);
        let x265_params = [
            "colorprim=bt2020".to_owned(),
            "transfer=smpte2084".to_owned(),
            "colormatrix=bt2020nc".to_owned(),
            format!(
                "master-display={}",
                mastering_display_string(request.color_space, peak)
            ),
            format!("max-cll={peak},{max_fall}"),
            "hdr10-opt=1".to_owned(),
            "repeat-headers=1".to_owned(),
        ]
        .join(":");
        command.args(["-preset", "medium", "-crf", "20"]);
        command.args(["-x265-params", &x265_params]);
    } else {
        // x264 carries VUI flags only; it has no HDR10 SEI support.
        command.args(["-preset", "medium", "-crf", "18"]);
    }
    command.arg(output_path);
    command.stdin(Stdio::piped()).stdout(Stdio::piped()).stderr(Stdio::piped());

    debug!("running {command:?}");
    let mut child = command
        .spawn()
        .map_err(|e| ExportError::EncoderFailed(e.to_string()))?;
    {
        use std::io::Write as _;
        let Some(mut stdin) = child.stdin.take() else {
            child.kill().ok();
            return Err(ExportError::EncoderFailed("no stdin pipe".to_owned()));
        };
        for _ in 0..input_frames {
            if let Err(e) = stdin.write_all(&frame) {
                child.kill().ok();
                return Err(ExportError::EncoderFailed(format!(
                    "writing raw frames failed: {e}"
                )));
            }
        }
    }
    let output = child
        .wait_with_output()
        .map_err(|e| ExportError::EncoderFailed(e.to_string()))?;
    if !output.status.success() {
        return Err(ExportError::EncoderFailed(stderr_tail(&output.stderr)));
    }
    Ok(())
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let start = text.char_indices().rev().nth(499).map_or(0, |(i, _)| i);
    text[start..].to_owned()
}

fn unique_suffix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}
