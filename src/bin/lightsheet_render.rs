//! Render a sequence of light-sheet frames of a synthetic sample to PNG
//!
//! Sweeps the light sheets and the detection focus through the sample in
//! `--frames` steps and writes one image per detection path and step.

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use lightsheet_sim::image_proc::{save_u8_image, u16_to_u8_auto_scale};
use lightsheet_sim::parameters::{DetectionParameter, IlluminationParameter, UnitConversion};
use lightsheet_sim::shared_args::SharedSimulationArgs;
use lightsheet_sim::SpheroidSample;
use log::info;

/// Command line arguments for the light-sheet renderer
#[derive(Parser, Debug)]
#[command(version, about = "Light-sheet microscope frame renderer")]
struct Args {
    #[command(flatten)]
    shared: SharedSimulationArgs,

    /// Number of z steps to render
    #[arg(long, default_value_t = 5)]
    frames: usize,

    /// Number of nuclei in the synthetic sample
    #[arg(long, default_value_t = 200)]
    nuclei: usize,

    /// Output directory
    #[arg(long, default_value = "test_output/lightsheet")]
    output: PathBuf,
}

fn main() -> Result<()> {
    let args = Args::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(
        if args.shared.debug { "debug" } else { "info" },
    ))
    .init();

    let config = args
        .shared
        .microscope_config()
        .context("failed to load microscope configuration")?;
    let mut microscope = config
        .build_host_microscope()
        .context("failed to build microscope")?;
    let parameters = microscope.parameters().clone();
    if let Some(preset) = args.shared.preset().context("failed to load preset")? {
        parameters.apply_preset(&preset)?;
    }

    info!(
        "Rendering {} frame(s) of a {:?} volume with {} light sheet(s) and {} detection path(s)",
        args.frames,
        microscope.dimensions(),
        microscope.number_of_light_sheets(),
        microscope.number_of_detection_paths()
    );

    let seed = config.noise_seed.unwrap_or(42);
    let mut sample = SpheroidSample::new(microscope.dimensions(), args.nuclei, seed);

    std::fs::create_dir_all(&args.output)
        .with_context(|| format!("failed to create {}", args.output.display()))?;

    let length = parameters.number(UnitConversion::Length, 0);
    for frame in 0..args.frames {
        // sweep from -0.3 to +0.3 of the volume depth
        let fraction = if args.frames > 1 {
            -0.3 + 0.6 * frame as f64 / (args.frames - 1) as f64
        } else {
            0.0
        };
        let z = fraction * length;

        for arm in 0..microscope.number_of_light_sheets() {
            parameters.set_number(IlluminationParameter::Z, arm, z);
        }
        for path in 0..microscope.number_of_detection_paths() {
            parameters.set_number(DetectionParameter::FocusZ, path, z);
        }

        let start = Instant::now();
        microscope
            .render_sample(&mut sample, true)
            .with_context(|| format!("failed to render frame {frame}"))?;
        info!("Frame {frame} (z = {z:.3}) rendered in {:?}", start.elapsed());

        for path in 0..microscope.number_of_detection_paths() {
            let raw = microscope.camera_raw_buffer(path)?;
            let file = args.output.join(format!("frame_{frame:03}_path_{path}.png"));
            save_u8_image(&u16_to_u8_auto_scale(&raw), &file)
                .with_context(|| format!("failed to write {}", file.display()))?;
        }
    }

    microscope.close();
    info!("Frames written to {}", args.output.display());
    Ok(())
}
