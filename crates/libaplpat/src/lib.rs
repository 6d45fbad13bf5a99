
//! APL test-pattern synthesis and container assembly.
//!
//! Renders monochrome test frames (black background, white shape covering a
//! target percentage of the frame) and wraps them in color-managed output
//! containers: plain PNG/JPEG, PQ-encoded 16-bit PNG for HDR10 stills,
//! Apple and Ultra HDR gain-map JPEGs, and FFmpeg-encoded still videos.
//! Every container is assembled byte by byte; ICC profiles are synthesized
//! from chromaticities rather than bundled.

pub mod batch;
pub mod colorspace;
pub mod error;
pub mod export;
pub mod gainmap;
pub mod icc;
pub mod jpeg;
pub mod models;
pub mod mpf;
pub mod pattern;
pub mod pixel;
pub mod png;
pub mod tiff;
pub mod transfer;
pub mod video;
pub mod xmp;

pub use batch::BatchManager;
pub use error::ExportError;
pub use export::export_single;
pub use models::{
    BatchRequest, BatchState, BatchStatus, ColorSpaceId, ExportFormat, GenerateRequest,
    GenerateResponse, HdrMode, Shape,
};
