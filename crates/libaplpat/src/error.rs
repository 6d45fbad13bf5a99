
use derive_more::{Display, Error, From};

/// Errors surfaced by the container layer and the export surface above it.
///
/// Byte-layout violations are never recoverable: emitting a malformed
/// container is worse than emitting nothing.
#[derive(Debug, Display, Error, From)]
pub enum ExportError {
    #[display("source JPEG does not begin with an SOI marker")]
    InvalidSourceJpeg,
    #[display("container layout assertion failed: {_0}")]
    AssertionViolation(#[error(not(source))] String),
    #[display("unsupported color space: {_0}")]
    UnsupportedColorSpace(#[error(not(source))] String),
    #[display("invalid request: {_0}")]
    InvalidRequest(#[error(not(source))] String),
    #[display("unsupported export combination: {_0}")]
    UnsupportedExport(#[error(not(source))] String),
    #[display("HEIF output is not available in this build")]
    HeifUnavailable,
    #[display("FFmpeg not found; install it and add it to PATH")]
    EncoderMissing,
    #[display("FFmpeg failed: {_0}")]
    EncoderFailed(#[error(not(source))] String),
    #[display("JPEG encoding failed: {_0}")]
    #[from]
    JpegEncode(jpeg_encoder::EncodingError),
    #[display("write failed: {_0}")]
    #[from]
    WriteFailed(std::io::Error),
}

impl ExportError {
    pub(crate) fn assertion(message: impl Into<String>) -> Self {
        Self::AssertionViolation(message.into())
    }
}
