
use std::path::PathBuf;
use std::str::FromStr;

use derive_more::Display;

use crate::error::ExportError;

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    #[display("rectangle")]
    Rectangle,
    #[display("circle")]
    Circle,
}

impl FromStr for Shape {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rectangle" => Ok(Self::Rectangle),
            "circle" => Ok(Self::Circle),
            _ => Err(ExportError::InvalidRequest(format!("unknown shape: {s}"))),
        }
    }
}

/// The RGB color spaces an export can be tagged with.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum ColorSpaceId {
    /// sRGB primaries and white point, same as ITU-R BT.709.
    #[display("rec709")]
    Rec709,
    #[display("displayP3")]
    DisplayP3,
    #[display("rec2020")]
    Rec2020,
}

impl ColorSpaceId {
    pub(crate) const fn index(self) -> usize {
        match self {
            Self::Rec709 => 0,
            Self::DisplayP3 => 1,
            Self::Rec2020 => 2,
        }
    }
}

impl FromStr for ColorSpaceId {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rec709" => Ok(Self::Rec709),
            "displayP3" => Ok(Self::DisplayP3),
            "rec2020" => Ok(Self::Rec2020),
            _ => Err(ExportError::UnsupportedColorSpace(s.to_owned())),
        }
    }
}

/// How the extra dynamic range is carried in the output container.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum HdrMode {
    #[display("none")]
    None,
    /// Gain-map JPEG with Apple's `HDRGainMap` XMP and MakerApple EXIF tags.
    #[display("apple-gainmap")]
    AppleGainmap,
    /// Gain-map JPEG per ISO 21496-1 (`hdrgm` XMP + `Container:Directory`).
    #[display("ultra-hdr")]
    UltraHdr,
    /// PQ-encoded 16-bit still, BT.2020 primaries, carried in a PNG.
    #[display("hdr10-pq")]
    Hdr10Pq,
}

impl FromStr for HdrMode {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Self::None),
            "apple-gainmap" => Ok(Self::AppleGainmap),
            "ultra-hdr" => Ok(Self::UltraHdr),
            "hdr10-pq" => Ok(Self::Hdr10Pq),
            _ => Err(ExportError::InvalidRequest(format!("unknown HDR mode: {s}"))),
        }
    }
}

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    #[display("png")]
    Png,
    #[display("jpeg")]
    Jpeg,
    #[display("heif")]
    Heif,
    #[display("h264")]
    H264,
    #[display("h265")]
    H265,
}

impl FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "png" => Ok(Self::Png),
            "jpeg" | "jpg" => Ok(Self::Jpeg),
            "heif" | "heic" => Ok(Self::Heif),
            "h264" => Ok(Self::H264),
            "h265" => Ok(Self::H265),
            _ => Err(ExportError::InvalidRequest(format!(
                "unknown export format: {s}"
            ))),
        }
    }
}

pub const MAX_DIMENSION: u32 = 8192;
pub const MIN_PEAK_NITS: u32 = 200;
pub const MAX_PEAK_NITS: u32 = 10_000;

/// A single-image export request.
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub width: u32,
    pub height: u32,
    /// White area as a percentage of the frame, 1..=100.
    pub apl_percent: u8,
    pub shape: Shape,
    pub color_space: ColorSpaceId,
    pub hdr_mode: HdrMode,
    pub hdr_peak_nits: u32,
    pub export_format: ExportFormat,
    pub output_directory: PathBuf,
}

impl GenerateRequest {
    pub fn validate(&self) -> Result<(), ExportError> {
        validate_dimensions(self.width, self.height)?;
        validate_apl(self.apl_percent)?;
        validate_peak_nits(self.hdr_peak_nits)?;
        Ok(())
    }
}

/// An export request over a range of APL values.
#[derive(Debug, Clone)]
pub struct BatchRequest {
    pub width: u32,
    pub height: u32,
    pub apl_range_start: u8,
    pub apl_range_end: u8,
    pub apl_step: u8,
    pub shape: Shape,
    pub color_space: ColorSpaceId,
    pub hdr_mode: HdrMode,
    pub hdr_peak_nits: u32,
    pub export_format: ExportFormat,
    pub output_directory: PathBuf,
}

impl BatchRequest {
    pub fn validate(&self) -> Result<(), ExportError> {
        validate_dimensions(self.width, self.height)?;
        validate_apl(self.apl_range_start)?;
        validate_apl(self.apl_range_end)?;
        validate_peak_nits(self.hdr_peak_nits)?;
        if !(1..=99).contains(&self.apl_step) {
            return Err(ExportError::InvalidRequest(format!(
                "APL step must be 1..=99, got {}",
                self.apl_step
            )));
        }
        Ok(())
    }

    /// The APL values the batch will iterate, in order.
    pub fn apl_values(&self) -> Vec<u8> {
        (self.apl_range_start..=self.apl_range_end)
            .step_by(self.apl_step as usize)
            .collect()
    }

    pub fn single(&self, apl_percent: u8) -> GenerateRequest {
        GenerateRequest {
            width: self.width,
            height: self.height,
            apl_percent,
            shape: self.shape,
            color_space: self.color_space,
            hdr_mode: self.hdr_mode,
            hdr_peak_nits: self.hdr_peak_nits,
            export_format: self.export_format,
            output_directory: self.output_directory.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GenerateResponse {
    pub output_path: PathBuf,
    pub file_size: u64,
}

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum BatchState {
    #[display("running")]
    Running,
    #[display("completed")]
    Completed,
    #[display("failed")]
    Failed,
    #[display("cancelled")]
    Cancelled,
}

/// Snapshot of a batch job. `completed` and `failed` only ever increase;
/// `state` leaves `Running` exactly once.
#[derive(Debug, Clone)]
pub struct BatchStatus {
    pub batch_id: String,
    pub state: BatchState,
    pub total: u32,
    pub completed: u32,
    pub failed: u32,
    pub current_apl: Option<u8>,
}

fn validate_dimensions(width: u32, height: u32) -> Result<(), ExportError> {
    if width == 0 || width > MAX_DIMENSION || height == 0 || height > MAX_DIMENSION {
        return Err(ExportError::InvalidRequest(format!(
            "dimensions must be 1..={MAX_DIMENSION}, got {width}x{height}"
        )));
    }
    Ok(())
}

fn validate_apl(apl_percent: u8) -> Result<(), ExportError> {
    if !(1..=100).contains(&apl_percent) {
        return Err(ExportError::InvalidRequest(format!(
            "APL must be 1..=100, got {apl_percent}"
        )));
    }
    Ok(())
}

fn validate_peak_nits(peak_nits: u32) -> Result<(), ExportError> {
    if !(MIN_PEAK_NITS..=MAX_PEAK_NITS).contains(&peak_nits) {
        return Err(ExportError::InvalidRequest(format!(
            "peak nits must be {MIN_PEAK_NITS}..={MAX_PEAK_NITS}, got {peak_nits}"
        )));
    }
    Ok(())
}
