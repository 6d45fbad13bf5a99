
mod logging;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use log::{error, info};

use libaplpat::models::{BatchState, ColorSpaceId, ExportFormat, HdrMode, Shape};
use libaplpat::{BatchManager, BatchRequest, GenerateRequest, pattern};

#[derive(Parser, Debug)]
#[command(version, about = "APL test pattern generator", long_about = None)]
struct Cli {
    /// Log debug output.
    #[arg(short, long, global = true)]
    verbose: bool,
    /// Also write logs to aplpat.log in the working directory.
    #[arg(long, global = true)]
    log_file: bool,
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand, Debug)]
enum CliCommand {
    /// Render and export a single test pattern.
    Generate(GenerateArgs),
    /// Export a range of APL values.
    Batch(BatchArgs),
    /// Print the computed pattern geometry without writing files.
    Preview(PreviewArgs),
}

#[derive(Args, Debug)]
struct CommonArgs {
    /// Frame width in pixels.
    #[arg(long, default_value_t = 1920)]
    width: u32,
    /// Frame height in pixels.
    #[arg(long, default_value_t = 1080)]
    height: u32,
    /// Foreground shape: rectangle or circle.
    #[arg(long, default_value = "rectangle")]
    shape: Shape,
    /// Output color space: rec709, displayP3 or rec2020.
    #[arg(long = "color-space", default_value = "rec709")]
    color_space: ColorSpaceId,
    /// HDR mode: none, apple-gainmap, ultra-hdr or hdr10-pq.
    #[arg(long = "hdr-mode", default_value = "none")]
    hdr_mode: HdrMode,
    /// Peak display luminance in nits for the HDR modes.
    #[arg(long = "peak-nits", default_value_t = 1000)]
    hdr_peak_nits: u32,
    /// Output container: png, jpeg, heif, h264 or h265.
    #[arg(long, default_value = "png")]
    format: ExportFormat,
    /// Directory the output files are written to.
    #[arg(short, long = "output-dir", default_value = "out")]
    output_directory: PathBuf,
}

#[derive(Args, Debug)]
struct GenerateArgs {
    /// White area as a percentage of the frame, 1..=100.
    #[arg(long)]
    apl: u8,
    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Args, Debug)]
struct BatchArgs {
    /// First APL value of the range.
    #[arg(long = "apl-start")]
    apl_start: u8,
    /// Last APL value of the range (inclusive).
    #[arg(long = "apl-end")]
    apl_end: u8,
    /// Step between APL values.
    #[arg(long = "apl-step", default_value_t = 1)]
    apl_step: u8,
    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Args, Debug)]
struct PreviewArgs {
    /// White area as a percentage of the frame, 1..=100.
    #[arg(long)]
    apl: u8,
    #[arg(long, default_value_t = 1920)]
    width: u32,
    #[arg(long, default_value_t = 1080)]
    height: u32,
    #[arg(long, default_value = "rectangle")]
    shape: Shape,
}

fn main() {
    let cli = Cli::parse();
    logging::LoggingConfig::default()
        .verbose(cli.verbose)
        .output_to_file(cli.log_file)
        .apply();

    let result = match cli.command {
        CliCommand::Generate(args) => run_generate(args),
        CliCommand::Batch(args) => run_batch(args),
        CliCommand::Preview(args) => run_preview(args),
    };

    if let Err(e) = result {
        error!("{e}");
        std::process::exit(1);
    }
}

fn run_generate(args: GenerateArgs) -> Result<(), libaplpat::ExportError> {
    let request = GenerateRequest {
        width: args.common.width,
        height: args.common.height,
        apl_percent: args.apl,
        shape: args.common.shape,
        color_space: args.common.color_space,
        hdr_mode: args.common.hdr_mode,
        hdr_peak_nits: args.common.hdr_peak_nits,
        export_format: args.common.format,
        output_directory: args.common.output_directory,
    };
    let response = libaplpat::export_single(&request)?;
    info!(
        "wrote {} ({} bytes)",
        response.output_path.display(),
        response.file_size
    );
    Ok(())
}

fn run_batch(args: BatchArgs) -> Result<(), libaplpat::ExportError> {
    let request = BatchRequest {
        width: args.common.width,
        height: args.common.height,
        apl_range_start: args.apl_start,
        apl_range_end: args.apl_end,
        apl_step: args.apl_step,
        shape: args.common.shape,
        color_space: args.common.color_space,
        hdr_mode: args.common.hdr_mode,
        hdr_peak_nits: args.common.hdr_peak_nits,
        export_format: args.common.format,
        output_directory: args.common.output_directory,
    };

    let manager = BatchManager::default();
    manager.set_progress_observer(Box::new(|status| {
        if let Some(apl) = status.current_apl {
            info!(
                "batch {}: APL {}% ({}/{} done, {} failed)",
                status.batch_id, apl, status.completed, status.total, status.failed
            );
        }
    }));

    let batch_id = manager.start(request)?;
    manager.wait(&batch_id);

    match manager.status(&batch_id) {
        Some(status) => {
            info!(
                "batch {}: {} ({} completed, {} failed of {})",
                status.batch_id, status.state, status.completed, status.failed, status.total
            );
            if status.state == BatchState::Failed {
                std::process::exit(1);
            }
            Ok(())
        }
        None => {
            error!("batch {batch_id} vanished from the registry");
            std::process::exit(1);
        }
    }
}

fn run_preview(args: PreviewArgs) -> Result<(), libaplpat::ExportError> {
    if !(1..=100).contains(&args.apl) {
        return Err(libaplpat::ExportError::InvalidRequest(format!(
            "APL must be 1..=100, got {}",
            args.apl
        )));
    }
    match args.shape {
        Shape::Rectangle => {
            let (x, y, rect_w, rect_h) =
                pattern::calc_rectangle(args.width, args.height, args.apl);
            println!(
                "rectangle {}x{} at ({}, {}) in a {}x{} frame",
                rect_w, rect_h, x, y, args.width, args.height
            );
        }
        Shape::Circle => {
            let (cx, cy, radius) = pattern::calc_circle(args.width, args.height, args.apl);
            println!(
                "circle of radius {:.2} at ({}, {}) in a {}x{} frame",
                radius, cx, cy, args.width, args.height
            );
        }
    }
    Ok(())
}
